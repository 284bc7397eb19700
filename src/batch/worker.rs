use super::WorkerMessage;
use super::progress::{overall_progress, parse_percent, read_console_line};
use crate::config::ToolsConfig;
use crate::encoder::command::build_encode_args;
use crate::encoder::{
    EncodeJob, EncodeParam, QualityMode, compute_video_bitrate_kbps, estimate_quality,
};
use crate::error::AppError;
use crate::inspector::MediaDescriptor;
use crate::utils::format_duration;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use tracing::{info, warn};

/// One file of a batch, with its inspected metadata and track selection
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub path: PathBuf,
    pub descriptor: MediaDescriptor,
    /// Selected audio track indices (0-based, order preserved)
    pub selected_audio: Vec<usize>,
}

/// Result of one file's encode, produced and reported per file
#[derive(Debug)]
pub struct EncodeOutcome {
    pub param: EncodeParam,
    pub output: PathBuf,
}

/// Per-file values resolved before the encode parameter is computed
#[derive(Debug)]
pub(crate) struct EncodePlan {
    pub duration_secs: f64,
    pub total_audio_kbps: f64,
    pub audio_summary: String,
}

/// Resolve duration and the audio bitrate total for one file, validating
/// the track selection against the configured bitrates.
pub(crate) fn plan_file(item: &BatchItem, job: &EncodeJob) -> Result<EncodePlan, AppError> {
    let duration_secs = item.descriptor.duration_secs.ok_or_else(|| {
        AppError::Inspection(format!(
            "duration unavailable for {}",
            item.descriptor.filename()
        ))
    })?;

    let track_count = item.descriptor.audio_tracks.len();
    if let Some(&bad) = item.selected_audio.iter().find(|&&i| i >= track_count) {
        return Err(AppError::ConfigurationMismatch(format!(
            "selected audio track {} does not exist ({} tracks in {})",
            bad + 1,
            track_count,
            item.descriptor.filename()
        )));
    }

    if job.is_audio_passthrough() {
        // Pass-through: the source tells us what the audio costs
        let total = item.descriptor.total_audio_bitrate_kbps() as f64;
        return Ok(EncodePlan {
            duration_secs,
            total_audio_kbps: total,
            audio_summary: format!("{} kbps (source, copy)", total as u32),
        });
    }

    let configured = job.audio_bitrates_kbps.as_ref().ok_or_else(|| {
        AppError::InvalidInput(format!(
            "no audio bitrate specified while using encoder '{}'",
            job.audio_encoder
        ))
    })?;

    // Every selected track must map onto a configured bitrate, no partial mapping
    let values: Vec<u32> = item
        .selected_audio
        .iter()
        .filter_map(|&i| configured.get(i).copied())
        .collect();
    if values.len() != item.selected_audio.len() {
        return Err(AppError::ConfigurationMismatch(format!(
            "{} audio tracks selected but only {} bitrate values configured for {}",
            item.selected_audio.len(),
            configured.len(),
            item.descriptor.filename()
        )));
    }

    let total: u32 = values.iter().sum();
    let listed = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Ok(EncodePlan {
        duration_secs,
        total_audio_kbps: total as f64,
        audio_summary: format!("{} kbps (specified)", listed),
    })
}

/// Compute the fixed-bitrate encode parameter, rejecting budgets the audio
/// alone already exceeds.
pub(crate) fn fixed_bitrate_param(
    plan: &EncodePlan,
    job: &EncodeJob,
) -> Result<EncodeParam, AppError> {
    let kbps =
        compute_video_bitrate_kbps(plan.duration_secs, job.target_size_mb, plan.total_audio_kbps)?;
    if kbps < 0 {
        return Err(AppError::InvalidInput(format!(
            "target size too small for this audio configuration (video bitrate {} kbps)",
            kbps
        )));
    }
    Ok(EncodeParam::Bitrate(kbps))
}

/// Run the encode batch sequentially on the calling thread.
/// Spawned on a dedicated worker thread by the caller; per-file failures are
/// reported and never abort the remaining batch.
pub fn run_encode_worker(
    items: Vec<BatchItem>,
    job: EncodeJob,
    tools: ToolsConfig,
    cancel_flag: Arc<AtomicBool>,
    tx: Sender<WorkerMessage>,
) {
    let total_files = items.len();
    let mut completed = 0usize;
    let mut cancelled = false;

    let _ = tx.send(WorkerMessage::Log("Starting encoding...".to_string()));

    for (index, item) in items.iter().enumerate() {
        if cancel_flag.load(Ordering::Relaxed) {
            cancelled = true;
            let _ = tx.send(WorkerMessage::Cancelled);
            break;
        }

        let name = item.descriptor.filename();
        let _ = tx.send(WorkerMessage::FileStarted {
            index,
            name: name.clone(),
        });
        let _ = tx.send(WorkerMessage::FileProgress {
            index,
            percent: 0.0,
        });

        match process_file(index, item, &job, &tools, &cancel_flag, completed, total_files, &tx) {
            Ok(outcome) => {
                let _ = tx.send(WorkerMessage::FileProgress {
                    index,
                    percent: 100.0,
                });
                let _ = tx.send(WorkerMessage::Log(format!(
                    "Completed: {} ({})",
                    name, outcome.param
                )));
                let _ = tx.send(WorkerMessage::FileDone { index });
                // Deletion policy is the caller's decision
                let _ = tx.send(WorkerMessage::SourceCompleted {
                    path: item.path.clone(),
                });
                info!(
                    "Encoded {} -> {}",
                    item.path.display(),
                    outcome.output.display()
                );
            }
            Err(e) => {
                if cancel_flag.load(Ordering::Relaxed) {
                    cancelled = true;
                    let _ = tx.send(WorkerMessage::Cancelled);
                    break;
                }
                warn!("File {} failed: {}", name, e);
                let _ = tx.send(WorkerMessage::FileFailed {
                    index,
                    message: e.to_string(),
                });
            }
        }

        completed += 1;
        let _ = tx.send(WorkerMessage::OverallProgress(overall_progress(
            completed,
            0.0,
            total_files,
        )));
    }

    if !cancelled {
        let _ = tx.send(WorkerMessage::OverallProgress(100.0));
        let _ = tx.send(WorkerMessage::Finished);
    }
}

#[allow(clippy::too_many_arguments)]
fn process_file(
    index: usize,
    item: &BatchItem,
    job: &EncodeJob,
    tools: &ToolsConfig,
    cancel_flag: &Arc<AtomicBool>,
    completed: usize,
    total_files: usize,
    tx: &Sender<WorkerMessage>,
) -> Result<EncodeOutcome, AppError> {
    let plan = plan_file(item, job)?;

    let param = match job.quality_mode {
        QualityMode::FixedBitrate => fixed_bitrate_param(&plan, job)?,
        QualityMode::ConstantQuality => {
            let mut log = |msg: String| {
                let _ = tx.send(WorkerMessage::Log(msg));
            };
            let estimate = estimate_quality(
                &item.path,
                plan.duration_secs,
                plan.total_audio_kbps,
                job,
                tools,
                cancel_flag,
                &mut log,
            )?;
            if !estimate.is_converged() {
                let _ = tx.send(WorkerMessage::Log(format!(
                    "Estimation did not converge; proceeding with approximate quality {:.2}",
                    estimate.value()
                )));
            }
            EncodeParam::Quality(estimate.value())
        }
    };

    let _ = tx.send(WorkerMessage::Log(format!(
        "Duration: {} | Target: {} MB | Audio: {} | Parameter: {} | Encoder: {} | Audio encoder: {}",
        format_duration(plan.duration_secs),
        job.target_size_mb,
        plan.audio_summary,
        param,
        job.video_encoder.as_deref().unwrap_or("preset default"),
        job.audio_encoder,
    )));

    let file_name = item
        .path
        .file_name()
        .ok_or_else(|| AppError::InvalidInput(format!("bad input path {}", item.path.display())))?;
    let output = job.destination.join(file_name);

    let args = build_encode_args(&item.path, &output, param, job, &item.selected_audio);
    info!("Transcoder command: {} {}", tools.handbrake, args.join(" "));

    run_transcode(
        &tools.handbrake,
        &args,
        index,
        completed,
        total_files,
        cancel_flag,
        tx,
    )?;
    Ok(EncodeOutcome { param, output })
}

/// Spawn the transcoder and stream its stdout, extracting percent tokens
/// into per-file and overall progress updates.
fn run_transcode(
    handbrake_exe: &str,
    args: &[String],
    index: usize,
    completed: usize,
    total_files: usize,
    cancel_flag: &Arc<AtomicBool>,
    tx: &Sender<WorkerMessage>,
) -> Result<(), AppError> {
    let mut child = Command::new(handbrake_exe)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AppError::ExternalTool(format!("Failed to start transcoder: {}", e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::ExternalTool("Failed to capture transcoder output".to_string()))?;

    // Drain stderr concurrently: HandBrake writes its scan and encode log
    // there, and an undrained pipe fills up and blocks the child mid-encode.
    let stderr = child.stderr.take();
    let stderr_drain = std::thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut err) = stderr {
            let _ = err.read_to_string(&mut text);
        }
        text
    });

    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        if cancel_flag.load(Ordering::Relaxed) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AppError::ExternalTool("Cancelled".to_string()));
        }

        match read_console_line(&mut reader, &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        if let Some(percent) = parse_percent(line) {
            let _ = tx.send(WorkerMessage::FileProgress { index, percent });
            let _ = tx.send(WorkerMessage::OverallProgress(overall_progress(
                completed,
                percent / 100.0,
                total_files,
            )));
        }
        let _ = tx.send(WorkerMessage::ToolOutput(line.to_string()));
    }

    let status = child
        .wait()
        .map_err(|e| AppError::ExternalTool(format!("Failed to wait for transcoder: {}", e)))?;

    let stderr = stderr_drain.join().unwrap_or_default();
    if !status.success() {
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        return Err(AppError::ExternalTool(format!(
            "transcoder exited with {}: {}",
            status,
            tail.into_iter().rev().collect::<Vec<_>>().join("\n")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::DeletePolicy;
    use crate::inspector::AudioTrackInfo;

    fn item_with_tracks(name: &str, track_count: usize, selected: Vec<usize>) -> BatchItem {
        let audio_tracks = (0..track_count)
            .map(|_| AudioTrackInfo {
                codec: "AAC".to_string(),
                bitrate_bps: Some(192_000),
                language: None,
                title: None,
            })
            .collect();
        BatchItem {
            path: PathBuf::from(format!("/in/{}", name)),
            descriptor: MediaDescriptor {
                path: PathBuf::from(format!("/in/{}", name)),
                duration_secs: Some(3600.0),
                size_bytes: 0,
                video: None,
                audio_tracks,
            },
            selected_audio: selected,
        }
    }

    fn job_with_bitrates(bitrates: Vec<u32>) -> EncodeJob {
        EncodeJob {
            target_size_mb: 1000.0,
            audio_bitrates_kbps: Some(bitrates),
            video_encoder: Some("x265".to_string()),
            audio_encoder: "av_aac".to_string(),
            quality_mode: QualityMode::FixedBitrate,
            preset: None,
            multi_pass: false,
            destination: PathBuf::from("/out"),
            delete_source: DeletePolicy::Never,
        }
    }

    #[test]
    fn plan_resolves_configured_bitrates() {
        let item = item_with_tracks("a.mkv", 2, vec![0, 1]);
        let job = job_with_bitrates(vec![320, 192]);
        let plan = plan_file(&item, &job).unwrap();
        assert_eq!(plan.total_audio_kbps, 512.0);
        assert_eq!(plan.duration_secs, 3600.0);
    }

    #[test]
    fn plan_uses_source_bitrates_for_passthrough() {
        let item = item_with_tracks("a.mkv", 3, vec![0]);
        let mut job = job_with_bitrates(vec![]);
        job.audio_encoder = "copy".to_string();
        job.audio_bitrates_kbps = None;
        let plan = plan_file(&item, &job).unwrap();
        // All three source tracks at 192 kbps
        assert_eq!(plan.total_audio_kbps, 576.0);
    }

    #[test]
    fn missing_duration_fails_the_file() {
        let mut item = item_with_tracks("a.mkv", 1, vec![0]);
        item.descriptor.duration_secs = None;
        let job = job_with_bitrates(vec![320]);
        assert!(matches!(
            plan_file(&item, &job),
            Err(AppError::Inspection(_))
        ));
    }

    #[test]
    fn short_bitrate_list_is_a_configuration_mismatch() {
        let item = item_with_tracks("a.mkv", 2, vec![0, 1]);
        let job = job_with_bitrates(vec![320]); // one value, two selected tracks
        assert!(matches!(
            plan_file(&item, &job),
            Err(AppError::ConfigurationMismatch(_))
        ));
    }

    #[test]
    fn out_of_range_track_selection_is_a_configuration_mismatch() {
        let item = item_with_tracks("a.mkv", 1, vec![0, 3]);
        let job = job_with_bitrates(vec![320, 192, 128, 96]);
        assert!(matches!(
            plan_file(&item, &job),
            Err(AppError::ConfigurationMismatch(_))
        ));
    }

    #[test]
    fn batch_continues_past_mismatched_file() {
        // Three files; the second selects two tracks against one configured
        // bitrate. Planning fails file 2 and succeeds for 1 and 3.
        let items = vec![
            item_with_tracks("one.mkv", 1, vec![0]),
            item_with_tracks("two.mkv", 2, vec![0, 1]),
            item_with_tracks("three.mkv", 1, vec![0]),
        ];
        let job = job_with_bitrates(vec![320]);

        let results: Vec<Result<EncodePlan, AppError>> =
            items.iter().map(|item| plan_file(item, &job)).collect();

        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(AppError::ConfigurationMismatch(_))
        ));
        assert!(results[2].is_ok());
    }

    #[test]
    fn negative_fixed_bitrate_is_rejected() {
        let item = item_with_tracks("a.mkv", 1, vec![0]);
        let mut job = job_with_bitrates(vec![640]);
        job.target_size_mb = 10.0; // audio alone exceeds this budget over an hour
        let plan = plan_file(&item, &job).unwrap();
        assert!(matches!(
            fixed_bitrate_param(&plan, &job),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn plausible_fixed_bitrate_is_accepted() {
        let item = item_with_tracks("a.mkv", 1, vec![0]);
        let job = job_with_bitrates(vec![320]);
        let plan = plan_file(&item, &job).unwrap();
        match fixed_bitrate_param(&plan, &job).unwrap() {
            EncodeParam::Bitrate(kbps) => assert!(kbps > 0),
            other => panic!("expected bitrate param, got {:?}", other),
        }
    }

    #[cfg(unix)]
    fn stub_transcoder(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("transcoder.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn heavy_stderr_and_cr_progress_do_not_stall_the_transcode() {
        // The stub writes well past the pipe buffer on stderr, then a single
        // carriage-return-terminated progress line on stdout. The run must
        // complete and the percent token must come through.
        let dir = tempfile::tempdir().unwrap();
        let script = stub_transcoder(
            dir.path(),
            "i=0\nwhile [ $i -lt 4000 ]; do echo 'libhb: scan thread chatter for the log' >&2; i=$((i+1)); done\nprintf 'Encoding: task 1 of 1, 50.00 %%\\r'",
        );
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = std::sync::mpsc::channel();

        run_transcode(&script, &[], 0, 0, 1, &cancel, &tx).unwrap();
        drop(tx);

        let saw_progress = rx.iter().any(|m| {
            matches!(m, WorkerMessage::FileProgress { percent, .. } if percent == 50.0)
        });
        assert!(saw_progress, "progress token on a \\r-terminated line was not seen");
    }

    #[cfg(unix)]
    #[test]
    fn worker_continues_past_failed_file_and_finishes() {
        // Three files; planning fails file 2 (two selected tracks against one
        // configured bitrate). The loop must report the failure, encode files
        // 1 and 3 with the stub, signal their sources, and finish.
        let dir = tempfile::tempdir().unwrap();
        let script = stub_transcoder(
            dir.path(),
            "printf 'Encoding: task 1 of 1, 100.00 %%\\n'",
        );
        let items = vec![
            item_with_tracks("one.mkv", 1, vec![0]),
            item_with_tracks("two.mkv", 2, vec![0, 1]),
            item_with_tracks("three.mkv", 1, vec![0]),
        ];
        let mut job = job_with_bitrates(vec![320]);
        job.destination = dir.path().to_path_buf();
        let tools = ToolsConfig {
            handbrake: script,
            ..ToolsConfig::default()
        };
        let (tx, rx) = std::sync::mpsc::channel();

        run_encode_worker(items, job, tools, Arc::new(AtomicBool::new(false)), tx);

        let messages: Vec<WorkerMessage> = rx.iter().collect();
        let done: Vec<usize> = messages
            .iter()
            .filter_map(|m| match m {
                WorkerMessage::FileDone { index } => Some(*index),
                _ => None,
            })
            .collect();
        let failed: Vec<usize> = messages
            .iter()
            .filter_map(|m| match m {
                WorkerMessage::FileFailed { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        let sources = messages
            .iter()
            .filter(|m| matches!(m, WorkerMessage::SourceCompleted { .. }))
            .count();

        assert_eq!(done, vec![0, 2]);
        assert_eq!(failed, vec![1]);
        assert_eq!(sources, 2);
        assert!(matches!(messages.last(), Some(WorkerMessage::Finished)));
    }
}
