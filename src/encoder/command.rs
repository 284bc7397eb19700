use super::{EncodeJob, EncodeParam, QualityMode, is_hardware_encoder};
use std::path::Path;

/// Build the HandBrakeCLI argument list for a full-file encode
pub fn build_encode_args(
    input: &Path,
    output: &Path,
    param: EncodeParam,
    job: &EncodeJob,
    selected_tracks: &[usize],
) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-o".to_string(),
        output.to_string_lossy().to_string(),
    ];

    if let Some(preset) = &job.preset {
        args.extend([
            "--preset-import-file".to_string(),
            preset.file.to_string_lossy().to_string(),
            "-Z".to_string(),
            preset.name.clone(),
        ]);
    }

    match param {
        EncodeParam::Quality(q) => {
            args.extend(["-q".to_string(), format!("{}", q)]);
        }
        EncodeParam::Bitrate(kbps) => {
            args.extend(["-b".to_string(), kbps.to_string()]);
        }
    }

    // Multi-pass only makes sense for fixed-bitrate software encodes
    if job.quality_mode == QualityMode::FixedBitrate && !job_uses_hardware_encoder(job) {
        if job.multi_pass {
            args.push("--multi-pass".to_string());
        } else {
            args.push("--no-multi-pass".to_string());
        }
    }

    // Without a preset, keep all subtitle tracks
    if job.preset.is_none() {
        args.push("--all-subtitles".to_string());
    }

    if let Some(encoder) = &job.video_encoder {
        args.extend(["-e".to_string(), encoder.clone()]);
    }

    if !selected_tracks.is_empty() {
        // HandBrake numbers audio tracks from 1
        let track_list = selected_tracks
            .iter()
            .map(|i| (i + 1).to_string())
            .collect::<Vec<_>>()
            .join(",");
        args.extend(["-a".to_string(), track_list]);

        // The bitrate list is passed through as configured
        if !job.is_audio_passthrough()
            && let Some(bitrates) = &job.audio_bitrates_kbps
        {
            let bitrate_list = bitrates
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(",");
            args.extend(["-B".to_string(), bitrate_list]);
        }
    }

    args.extend(["-E".to_string(), job.audio_encoder.clone()]);

    args
}

/// Build the HandBrakeCLI argument list for an estimation sample encode.
/// Reuses the job's audio and encoder options so the sample predicts the
/// behavior of the final encode.
pub fn build_sample_args(
    input: &Path,
    output: &Path,
    quality: f64,
    job: &EncodeJob,
) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-o".to_string(),
        output.to_string_lossy().to_string(),
        "-q".to_string(),
        format!("{}", quality),
    ];

    if let Some(encoder) = &job.video_encoder {
        args.extend(["-e".to_string(), encoder.clone()]);
    }

    if let Some(preset) = &job.preset {
        args.extend([
            "--preset-import-file".to_string(),
            preset.file.to_string_lossy().to_string(),
            "-Z".to_string(),
            preset.name.clone(),
        ]);
    } else {
        args.push("--all-subtitles".to_string());
    }

    args.extend(["-E".to_string(), job.audio_encoder.clone()]);
    if !job.is_audio_passthrough()
        && let Some(bitrates) = &job.audio_bitrates_kbps
    {
        let bitrate_list = bitrates
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(",");
        args.extend(["-B".to_string(), bitrate_list]);
    }

    args
}

/// Build the ffmpeg argument list that stream-copies a sample segment
pub fn build_extract_args(
    input: &Path,
    output: &Path,
    start_secs: f64,
    duration_secs: f64,
) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-ss".to_string(),
        format!("{}", start_secs),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-t".to_string(),
        format!("{}", duration_secs),
        "-c".to_string(),
        "copy".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

fn job_uses_hardware_encoder(job: &EncodeJob) -> bool {
    job.video_encoder
        .as_deref()
        .map(is_hardware_encoder)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::DeletePolicy;
    use std::path::PathBuf;

    fn base_job() -> EncodeJob {
        EncodeJob {
            target_size_mb: 1000.0,
            audio_bitrates_kbps: Some(vec![320, 192]),
            video_encoder: Some("x265".to_string()),
            audio_encoder: "av_aac".to_string(),
            quality_mode: QualityMode::FixedBitrate,
            preset: None,
            multi_pass: true,
            destination: PathBuf::from("/out"),
            delete_source: DeletePolicy::Never,
        }
    }

    fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
    }

    #[test]
    fn fixed_bitrate_encode_args() {
        let job = base_job();
        let args = build_encode_args(
            Path::new("/in/movie.mkv"),
            Path::new("/out/movie.mkv"),
            EncodeParam::Bitrate(2500),
            &job,
            &[0, 2],
        );

        assert_eq!(arg_value(&args, "-i"), Some("/in/movie.mkv"));
        assert_eq!(arg_value(&args, "-o"), Some("/out/movie.mkv"));
        assert_eq!(arg_value(&args, "-b"), Some("2500"));
        assert!(args.contains(&"--multi-pass".to_string()));
        // Track indices are converted to HandBrake's 1-based numbering
        assert_eq!(arg_value(&args, "-a"), Some("1,3"));
        assert_eq!(arg_value(&args, "-B"), Some("320,192"));
        assert_eq!(arg_value(&args, "-E"), Some("av_aac"));
        // No preset configured, subtitles are kept
        assert!(args.contains(&"--all-subtitles".to_string()));
    }

    #[test]
    fn quality_mode_omits_multi_pass() {
        let mut job = base_job();
        job.quality_mode = QualityMode::ConstantQuality;
        let args = build_encode_args(
            Path::new("/in/a.mkv"),
            Path::new("/out/a.mkv"),
            EncodeParam::Quality(24.5),
            &job,
            &[0],
        );

        assert_eq!(arg_value(&args, "-q"), Some("24.5"));
        assert!(!args.contains(&"--multi-pass".to_string()));
        assert!(!args.contains(&"--no-multi-pass".to_string()));
    }

    #[test]
    fn hardware_encoder_suppresses_multi_pass() {
        let mut job = base_job();
        job.video_encoder = Some("nvenc_h265".to_string());
        let args = build_encode_args(
            Path::new("/in/a.mkv"),
            Path::new("/out/a.mkv"),
            EncodeParam::Bitrate(2000),
            &job,
            &[0],
        );
        assert!(!args.contains(&"--multi-pass".to_string()));
        assert!(!args.contains(&"--no-multi-pass".to_string()));
    }

    #[test]
    fn preset_replaces_all_subtitles() {
        let mut job = base_job();
        job.preset = Some(crate::encoder::PresetRef {
            file: PathBuf::from("/presets/p.json"),
            name: "Fast 1080p".to_string(),
        });
        let args = build_encode_args(
            Path::new("/in/a.mkv"),
            Path::new("/out/a.mkv"),
            EncodeParam::Bitrate(2000),
            &job,
            &[0],
        );
        assert_eq!(arg_value(&args, "--preset-import-file"), Some("/presets/p.json"));
        assert_eq!(arg_value(&args, "-Z"), Some("Fast 1080p"));
        assert!(!args.contains(&"--all-subtitles".to_string()));
    }

    #[test]
    fn passthrough_audio_skips_bitrate_list() {
        let mut job = base_job();
        job.audio_encoder = "copy".to_string();
        let args = build_encode_args(
            Path::new("/in/a.mkv"),
            Path::new("/out/a.mkv"),
            EncodeParam::Bitrate(2000),
            &job,
            &[0, 1],
        );
        assert!(arg_value(&args, "-B").is_none());
        assert_eq!(arg_value(&args, "-E"), Some("copy"));
    }

    #[test]
    fn extract_args_stream_copy() {
        let args = build_extract_args(
            Path::new("/in/a.mkv"),
            Path::new("/tmp/sample.mkv"),
            120.5,
            30.25,
        );
        assert_eq!(args[0], "-y");
        assert_eq!(arg_value(&args, "-ss"), Some("120.5"));
        assert_eq!(arg_value(&args, "-t"), Some("30.25"));
        assert_eq!(arg_value(&args, "-c"), Some("copy"));
        assert_eq!(args.last().map(|s| s.as_str()), Some("/tmp/sample.mkv"));
    }
}
