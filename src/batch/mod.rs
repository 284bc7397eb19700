pub mod progress;
pub mod worker;

pub use progress::{overall_progress, parse_percent};
pub use worker::{BatchItem, EncodeOutcome, run_encode_worker};

use std::path::PathBuf;

/// Messages sent from a worker thread to its caller.
/// The caller decides how to render or log them.
pub enum WorkerMessage {
    /// Human-readable status line
    Log(String),
    /// Raw line of external tool output, passed through for display
    ToolOutput(String),
    /// A file began processing
    FileStarted { index: usize, name: String },
    /// Per-file progress percentage (0..=100)
    FileProgress { index: usize, percent: f32 },
    /// Batch-overall progress percentage (0..=100)
    OverallProgress(f32),
    /// A file finished successfully
    FileDone { index: usize },
    /// A file failed; the batch continues
    FileFailed { index: usize, message: String },
    /// A source file completed successfully and is eligible for the
    /// caller's deletion policy. The worker never deletes anything itself.
    SourceCompleted { path: PathBuf },
    /// The batch was cancelled
    Cancelled,
    /// The batch finished (all files reached a terminal state)
    Finished,
}
