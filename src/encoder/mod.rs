pub mod bitrate;
pub mod command;
pub mod estimator;

pub use bitrate::compute_video_bitrate_kbps;
pub use estimator::{QualityEstimate, estimate_quality, search_quality};

use std::path::PathBuf;

/// How the video encode parameter is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityMode {
    /// Constant bitrate computed from the target size
    FixedBitrate,
    /// Constant-quality value found via sample bisection search
    ConstantQuality,
}

/// What to do with the source file after a successful encode.
/// The orchestrator only signals completion; the caller executes the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    #[default]
    Never,
    Auto,
    Prompt,
}

/// Reference to a HandBrake preset file and the preset name inside it
#[derive(Debug, Clone)]
pub struct PresetRef {
    pub file: PathBuf,
    pub name: String,
}

/// One job configuration, applied to every file of a batch
#[derive(Debug, Clone)]
pub struct EncodeJob {
    /// Target output size in megabytes
    pub target_size_mb: f64,
    /// Requested audio bitrates in kbps, parallel to the source track list.
    /// Required unless the audio encoder is "copy".
    pub audio_bitrates_kbps: Option<Vec<u32>>,
    /// Video encoder passed with -e, None lets HandBrake/preset decide
    pub video_encoder: Option<String>,
    /// Audio encoder passed with -E; "copy" passes audio through
    pub audio_encoder: String,
    pub quality_mode: QualityMode,
    pub preset: Option<PresetRef>,
    /// Multi-pass encoding (fixed-bitrate software encodes only)
    pub multi_pass: bool,
    pub destination: PathBuf,
    pub delete_source: DeletePolicy,
}

impl EncodeJob {
    /// True when audio streams are copied rather than re-encoded
    pub fn is_audio_passthrough(&self) -> bool {
        self.audio_encoder == "copy"
    }
}

/// The per-file encode parameter the job mode resolved to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncodeParam {
    /// Video bitrate in kbps
    Bitrate(i64),
    /// Constant-quality value
    Quality(f64),
}

impl std::fmt::Display for EncodeParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeParam::Bitrate(kbps) => write!(f, "{} kbps", kbps),
            EncodeParam::Quality(q) => write!(f, "quality {:.2}", q),
        }
    }
}

/// Encoders that run on dedicated hardware. Multi-pass is not supported
/// for these, so the flag is suppressed when one is selected.
pub const HARDWARE_ENCODERS: [&str; 3] = ["nvenc_h264", "nvenc_h265", "nvenc_h265_10bit"];

/// Check whether an encoder name refers to a hardware encoder
pub fn is_hardware_encoder(name: &str) -> bool {
    HARDWARE_ENCODERS.contains(&name)
}
