use crate::batch::WorkerMessage;
use crate::config::ToolsConfig;
use crate::error::AppError;
use crate::inspector;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use tracing::{info, warn};

/// How many repair-then-reinspect rounds to try per file
pub const MAX_REPAIR_ATTEMPTS: u32 = 2;

/// Force recomputation of track statistics tags with mkvpropedit.
/// The tool is run twice per attempt; the first pass does not always
/// leave the tags in place.
pub fn repair_statistics(mkvpropedit_exe: &str, path: &Path) -> Result<(), AppError> {
    for _ in 0..2 {
        let output = Command::new(mkvpropedit_exe)
            .arg(path)
            .arg("--add-track-statistics-tags")
            .output()
            .map_err(|e| {
                AppError::ExternalTool(format!("Failed to execute mkvpropedit: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::ExternalTool(format!(
                "mkvpropedit failed for {}: {}",
                path.display(),
                stderr
            )));
        }
    }
    Ok(())
}

/// Check every file for missing bitrate statistics and repair where needed.
/// Per-file failures are reported and never abort the remaining batch.
pub fn run_check_worker(
    files: Vec<PathBuf>,
    tools: ToolsConfig,
    cancel_flag: Arc<AtomicBool>,
    tx: Sender<WorkerMessage>,
) {
    let _ = tx.send(WorkerMessage::Log("Starting media check...".to_string()));

    for (index, path) in files.iter().enumerate() {
        if cancel_flag.load(Ordering::Relaxed) {
            let _ = tx.send(WorkerMessage::Cancelled);
            break;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let _ = tx.send(WorkerMessage::FileStarted {
            index,
            name: name.clone(),
        });

        match check_and_repair(&tools, path, &tx) {
            Ok(RepairOutcome::NotNeeded) => {
                let _ = tx.send(WorkerMessage::Log(format!("No update needed for {}", name)));
                let _ = tx.send(WorkerMessage::FileDone { index });
            }
            Ok(RepairOutcome::Repaired { attempts }) => {
                info!("Repaired statistics for {} after {} attempts", name, attempts);
                let _ = tx.send(WorkerMessage::Log(format!(
                    "Updated statistics for {} after {} attempt(s)",
                    name, attempts
                )));
                let _ = tx.send(WorkerMessage::FileDone { index });
            }
            Ok(RepairOutcome::StillMissing) => {
                warn!("Statistics still missing for {} after repair", name);
                let _ = tx.send(WorkerMessage::FileFailed {
                    index,
                    message: format!(
                        "Statistics still missing after {} attempts",
                        MAX_REPAIR_ATTEMPTS
                    ),
                });
            }
            Err(e) => {
                let _ = tx.send(WorkerMessage::FileFailed {
                    index,
                    message: e.to_string(),
                });
            }
        }
    }

    let _ = tx.send(WorkerMessage::Log("Media check completed.".to_string()));
    let _ = tx.send(WorkerMessage::Finished);
}

enum RepairOutcome {
    NotNeeded,
    Repaired { attempts: u32 },
    StillMissing,
}

fn check_and_repair(
    tools: &ToolsConfig,
    path: &Path,
    tx: &Sender<WorkerMessage>,
) -> Result<RepairOutcome, AppError> {
    let descriptor = inspector::inspect(&tools.mediainfo, path)?;
    if !descriptor.has_missing_bitrates() {
        return Ok(RepairOutcome::NotNeeded);
    }

    for attempt in 1..=MAX_REPAIR_ATTEMPTS {
        let _ = tx.send(WorkerMessage::Log(format!(
            "Updating statistics for {} (attempt {})",
            path.display(),
            attempt
        )));
        repair_statistics(&tools.mkvpropedit, path)?;

        // Re-inspect to see whether the statistics took
        let refreshed = inspector::inspect(&tools.mediainfo, path)?;
        if !refreshed.has_missing_bitrates() {
            return Ok(RepairOutcome::Repaired { attempts: attempt });
        }
    }

    Ok(RepairOutcome::StillMissing)
}
