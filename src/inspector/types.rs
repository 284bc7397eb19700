use std::path::{Path, PathBuf};

/// Metadata of a media file, built once from inspector output.
/// Immutable until the file is re-inspected (e.g. after a repair pass).
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    pub path: PathBuf,
    /// Container duration in seconds, absent when the inspector could not read it
    pub duration_secs: Option<f64>,
    pub size_bytes: u64,
    pub video: Option<VideoTrackInfo>,
    /// Audio tracks in container order
    pub audio_tracks: Vec<AudioTrackInfo>,
}

#[derive(Debug, Clone)]
pub struct VideoTrackInfo {
    pub codec: String,
    /// Bitrate in bits per second, absent when missing or reported as "N/A"
    pub bitrate_bps: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct AudioTrackInfo {
    pub codec: String,
    /// Bitrate in bits per second, absent when missing or reported as "N/A"
    pub bitrate_bps: Option<u64>,
    pub language: Option<String>,
    pub title: Option<String>,
}

impl MediaDescriptor {
    /// Get the filename
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Sum of the known audio track bitrates in kbps.
    /// Tracks with unknown bitrate contribute nothing.
    pub fn total_audio_bitrate_kbps(&self) -> u32 {
        let total_bps: u64 = self
            .audio_tracks
            .iter()
            .filter_map(|t| t.bitrate_bps)
            .sum();
        (total_bps / 1000) as u32
    }

    /// True when the video track or any audio track lacks bitrate statistics
    pub fn has_missing_bitrates(&self) -> bool {
        let video_missing = self
            .video
            .as_ref()
            .map(|v| v.bitrate_bps.is_none())
            .unwrap_or(false);
        let audio_missing = self.audio_tracks.iter().any(|t| t.bitrate_bps.is_none());
        video_missing || audio_missing
    }
}

impl VideoTrackInfo {
    /// One-line summary like "HEVC 4500 kbps 1920x1080 23.976 fps"
    pub fn summary(&self) -> String {
        let bitrate = self
            .bitrate_bps
            .map(|b| format!("{} kbps", b / 1000))
            .unwrap_or_else(|| "unknown bitrate".to_string());
        let resolution = match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ => "unknown resolution".to_string(),
        };
        let fps = self
            .frame_rate
            .map(|r| format!("{:.3} fps", r))
            .unwrap_or_else(|| "unknown fps".to_string());
        format!("{} {} {} {}", self.codec, bitrate, resolution, fps)
    }
}

impl AudioTrackInfo {
    /// One-line summary like "2: Commentary - AAC 192 kbps [eng]"
    pub fn summary(&self, index: usize) -> String {
        let bitrate = self
            .bitrate_bps
            .map(|b| format!("{} kbps", b / 1000))
            .unwrap_or_else(|| "unknown bitrate".to_string());
        let language = self.language.as_deref().unwrap_or("Unknown");
        match &self.title {
            Some(title) if !title.is_empty() => {
                format!(
                    "{}: {} - {} {} [{}]",
                    index + 1,
                    title,
                    self.codec,
                    bitrate,
                    language
                )
            }
            _ => format!("{}: {} {} [{}]", index + 1, self.codec, bitrate, language),
        }
    }
}

/// Check if a path looks like a media file we can process
pub fn is_media_file(path: &Path) -> bool {
    const MEDIA_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "avi", "mov"];

    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MEDIA_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_with_audio(bitrates: &[Option<u64>]) -> MediaDescriptor {
        MediaDescriptor {
            path: PathBuf::from("/tmp/movie.mkv"),
            duration_secs: Some(3600.0),
            size_bytes: 0,
            video: None,
            audio_tracks: bitrates
                .iter()
                .map(|b| AudioTrackInfo {
                    codec: "AAC".to_string(),
                    bitrate_bps: *b,
                    language: None,
                    title: None,
                })
                .collect(),
        }
    }

    #[test]
    fn sums_known_audio_bitrates() {
        let desc = descriptor_with_audio(&[Some(320_000), Some(192_000), None]);
        assert_eq!(desc.total_audio_bitrate_kbps(), 512);
    }

    #[test]
    fn missing_audio_bitrate_flags_repair() {
        let desc = descriptor_with_audio(&[Some(320_000), None]);
        assert!(desc.has_missing_bitrates());

        let complete = descriptor_with_audio(&[Some(320_000)]);
        assert!(!complete.has_missing_bitrates());
    }

    #[test]
    fn media_file_filter() {
        assert!(is_media_file(Path::new("a/movie.MKV")));
        assert!(is_media_file(Path::new("clip.mp4")));
        assert!(!is_media_file(Path::new("notes.txt")));
        assert!(!is_media_file(Path::new("noext")));
    }
}
