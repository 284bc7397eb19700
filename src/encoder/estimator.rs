use super::EncodeJob;
use super::command::{build_extract_args, build_sample_args};
use crate::config::ToolsConfig;
use crate::error::AppError;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::Builder;
use tracing::info;

/// Search bounds for the constant-quality value. Lower value means higher
/// quality and larger output for the encoders this targets.
pub const QUALITY_FLOOR: f64 = 18.0;
pub const QUALITY_CEILING: f64 = 40.0;

/// Iteration cap for the bisection search
const MAX_ITERATIONS: u32 = 10;

/// Fraction of the full duration used for the sample segment
const SAMPLE_FRACTION: f64 = 0.05;

/// Acceptance band around the target size
const SIZE_TOLERANCE: f64 = 0.05;

/// Outcome of the quality search, rounded to 2 decimal places.
///
/// `Approximate` means the iteration cap elapsed without the size estimate
/// entering the acceptance band. The last candidate is still returned as a
/// deliberate best-effort value, but it is unverified against the band, so
/// callers see it as a distinct status rather than a converged result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityEstimate {
    Converged(f64),
    Approximate(f64),
}

impl QualityEstimate {
    pub fn value(&self) -> f64 {
        match self {
            QualityEstimate::Converged(q) | QualityEstimate::Approximate(q) => *q,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, QualityEstimate::Converged(_))
    }
}

/// Bisection search for the quality value whose extrapolated full-file size
/// lands within ±5% of the target.
///
/// `encode_probe` encodes the sample at the given quality and returns the
/// encoded sample size in bytes; any probe error aborts the search. The
/// probe's failure is a hard failure for the file being estimated, there is
/// no fallback to a default quality value.
pub fn search_quality<F>(
    target_size_mb: f64,
    full_duration_secs: f64,
    sample_duration_secs: f64,
    total_audio_kbps: f64,
    mut encode_probe: F,
) -> Result<QualityEstimate, AppError>
where
    F: FnMut(f64) -> Result<u64, AppError>,
{
    if !target_size_mb.is_finite() || target_size_mb <= 0.0 {
        return Err(AppError::InvalidInput(format!(
            "target size must be positive, got {}",
            target_size_mb
        )));
    }
    if sample_duration_secs <= 0.0 || full_duration_secs <= 0.0 {
        return Err(AppError::InvalidInput(
            "durations must be positive for quality estimation".to_string(),
        ));
    }

    let lower_band = target_size_mb * (1.0 - SIZE_TOLERANCE);
    let upper_band = target_size_mb * (1.0 + SIZE_TOLERANCE);

    let mut lower = QUALITY_FLOOR;
    let mut upper = QUALITY_CEILING;
    let mut quality = (lower + upper) / 2.0;

    for iteration in 1..=MAX_ITERATIONS {
        let sample_bytes = encode_probe(quality)?;

        // Extrapolate the full-file size from the sample, then add the audio
        let video_bytes = sample_bytes as f64 * (full_duration_secs / sample_duration_secs);
        let audio_bytes = total_audio_kbps * 1000.0 / 8.0 * full_duration_secs;
        let estimated_mb = (video_bytes + audio_bytes) / (1024.0 * 1024.0);

        info!(
            "Iteration {}: quality {:.2} gives estimated size {:.2} MB (target {:.2} MB)",
            iteration, quality, estimated_mb, target_size_mb
        );

        if estimated_mb >= lower_band && estimated_mb <= upper_band {
            return Ok(QualityEstimate::Converged(round2(quality)));
        }

        if estimated_mb > upper_band {
            // Too large, need worse quality
            lower = quality;
        } else {
            // Too small, need better quality
            upper = quality;
        }
        quality = (lower + upper) / 2.0;
    }

    // Best effort: the cap elapsed, hand back the last candidate as-is
    info!(
        "Quality search did not converge in {} iterations, using {:.2}",
        MAX_ITERATIONS,
        round2(quality)
    );
    Ok(QualityEstimate::Approximate(round2(quality)))
}

/// Estimate the constant-quality value for a file by encoding a short sample.
///
/// A 5% segment centered at the file midpoint is stream-copied out once and
/// reused for every iteration. Both temp artifacts live in the destination
/// folder and are removed on every exit path.
pub fn estimate_quality(
    input: &Path,
    duration_secs: f64,
    total_audio_kbps: f64,
    job: &EncodeJob,
    tools: &ToolsConfig,
    cancel_flag: &Arc<AtomicBool>,
    log: &mut dyn FnMut(String),
) -> Result<QualityEstimate, AppError> {
    if duration_secs <= 0.0 {
        return Err(AppError::InvalidInput(
            "duration must be positive for quality estimation".to_string(),
        ));
    }

    let sample_duration = duration_secs * SAMPLE_FRACTION;
    let sample_start = (duration_secs - sample_duration) / 2.0;

    // TempPath removes the file when dropped, covering every exit path
    let sample_path = Builder::new()
        .prefix("brakesize_sample_")
        .suffix(".mkv")
        .tempfile_in(&job.destination)
        .map_err(|e| AppError::ExternalTool(format!("Failed to create sample file: {}", e)))?
        .into_temp_path();

    log("Extracting sample segment for estimation...".to_string());
    let mut extract = Command::new(&tools.ffmpeg);
    extract.args(build_extract_args(
        input,
        &sample_path,
        sample_start,
        sample_duration,
    ));
    run_cancellable(extract, cancel_flag)
        .map_err(|e| AppError::ExternalTool(format!("Sample extraction failed: {}", e)))?;

    search_quality(
        job.target_size_mb,
        duration_secs,
        sample_duration,
        total_audio_kbps,
        |quality| {
            let encoded_path = Builder::new()
                .prefix("brakesize_encoded_")
                .suffix(".mkv")
                .tempfile_in(&job.destination)
                .map_err(|e| {
                    AppError::ExternalTool(format!("Failed to create encoded sample file: {}", e))
                })?
                .into_temp_path();

            log(format!(
                "Encoding sample segment for estimation (quality={:.2})...",
                quality
            ));
            let mut encode = Command::new(&tools.handbrake);
            encode.args(build_sample_args(&sample_path, &encoded_path, quality, job));
            run_cancellable(encode, cancel_flag)?;

            let size = std::fs::metadata(&encoded_path)
                .map(|m| m.len())
                .unwrap_or(0);
            if size == 0 {
                return Err(AppError::ExternalTool(
                    "Encoded sample was not created despite a successful exit".to_string(),
                ));
            }
            Ok(size)
            // encoded_path drops here, deleting the per-iteration sample
        },
    )
    // sample_path drops here, deleting the extracted source sample
}

/// Run an external process to completion, killing it if cancellation is
/// requested while it is in flight.
fn run_cancellable(mut command: Command, cancel_flag: &AtomicBool) -> Result<(), AppError> {
    let mut child = command
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AppError::ExternalTool(format!("Failed to start process: {}", e)))?;

    // Drain stderr while the process runs; ffmpeg and HandBrake both write
    // enough there to fill the pipe and block the child otherwise.
    let stderr = child.stderr.take();
    let drain = std::thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut err) = stderr {
            use std::io::Read;
            let _ = err.read_to_string(&mut text);
        }
        text
    });

    loop {
        if cancel_flag.load(Ordering::Relaxed) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AppError::ExternalTool("Cancelled".to_string()));
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                let stderr = drain.join().unwrap_or_default();
                if !status.success() {
                    let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
                    return Err(AppError::ExternalTool(format!(
                        "process exited with {}: {}",
                        status,
                        tail.into_iter().rev().collect::<Vec<_>>().join("\n")
                    )));
                }
                return Ok(());
            }
            Ok(None) => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                return Err(AppError::ExternalTool(format!(
                    "Failed to wait for process: {}",
                    e
                )));
            }
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
