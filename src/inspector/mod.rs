pub mod repair;
pub mod types;

pub use types::{AudioTrackInfo, MediaDescriptor, VideoTrackInfo, is_media_file};

use crate::error::AppError;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::process::Command;

/// Inspect a media file with MediaInfo and build its descriptor
pub fn inspect(mediainfo_exe: &str, path: &Path) -> Result<MediaDescriptor, AppError> {
    let output = Command::new(mediainfo_exe)
        .arg("--Output=JSON")
        .arg(path)
        .output()
        .map_err(|e| AppError::Inspection(format!("Failed to execute mediainfo: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Inspection(format!(
            "mediainfo failed for {}: {}",
            path.display(),
            stderr
        )));
    }

    let size_bytes = std::fs::metadata(path)
        .map_err(|e| AppError::Inspection(format!("Failed to stat {}: {}", path.display(), e)))?
        .len();

    descriptor_from_json(path, size_bytes, &String::from_utf8_lossy(&output.stdout))
}

/// Parse MediaInfo JSON output into a descriptor.
/// Split out from [`inspect`] so the parsing is testable without the binary.
pub fn descriptor_from_json(
    path: &Path,
    size_bytes: u64,
    json: &str,
) -> Result<MediaDescriptor, AppError> {
    let parsed: MediaInfoOutput = serde_json::from_str(json)
        .map_err(|e| AppError::Inspection(format!("Failed to parse mediainfo output: {}", e)))?;

    let tracks = parsed.media.map(|m| m.track).unwrap_or_default();
    if tracks.is_empty() {
        return Err(AppError::Inspection(format!(
            "mediainfo returned no tracks for {}",
            path.display()
        )));
    }

    let mut duration_secs = None;
    let mut video = None;
    let mut audio_tracks = Vec::new();

    for track in tracks {
        match track.kind.as_str() {
            "General" => {
                duration_secs = numeric_field(&track.duration);
            }
            "Video" if video.is_none() => {
                video = Some(VideoTrackInfo {
                    codec: track.format.clone().unwrap_or_else(|| "Unknown".to_string()),
                    bitrate_bps: numeric_field(&track.bit_rate).map(|b| b as u64),
                    width: numeric_field(&track.width).map(|w| w as u32),
                    height: numeric_field(&track.height).map(|h| h as u32),
                    frame_rate: numeric_field(&track.frame_rate),
                });
            }
            "Audio" => {
                audio_tracks.push(AudioTrackInfo {
                    codec: track.format.clone().unwrap_or_else(|| "Unknown".to_string()),
                    bitrate_bps: numeric_field(&track.bit_rate).map(|b| b as u64),
                    language: track.language_string.clone().or(track.language.clone()),
                    title: track.title.clone().filter(|t| !t.trim().is_empty()),
                });
            }
            _ => {}
        }
    }

    Ok(MediaDescriptor {
        path: path.to_path_buf(),
        duration_secs,
        size_bytes,
        video,
        audio_tracks,
    })
}

/// MediaInfo emits numeric fields as decimal strings, sometimes as JSON
/// numbers, and sometimes as the literal "N/A". Normalize all of them.
fn numeric_field(value: &Option<Value>) -> Option<f64> {
    match value {
        Some(Value::String(s)) => {
            if s.trim().eq_ignore_ascii_case("n/a") {
                None
            } else {
                s.trim().parse::<f64>().ok()
            }
        }
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    }
}

// JSON deserialization structures

#[derive(Debug, Deserialize)]
struct MediaInfoOutput {
    media: Option<MediaNode>,
}

#[derive(Debug, Deserialize)]
struct MediaNode {
    #[serde(default)]
    track: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "Duration")]
    duration: Option<Value>,
    #[serde(rename = "BitRate")]
    bit_rate: Option<Value>,
    #[serde(rename = "Format")]
    format: Option<String>,
    #[serde(rename = "Width")]
    width: Option<Value>,
    #[serde(rename = "Height")]
    height: Option<Value>,
    #[serde(rename = "FrameRate")]
    frame_rate: Option<Value>,
    #[serde(rename = "Language")]
    language: Option<String>,
    #[serde(rename = "Language/String")]
    language_string: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
}
