mod batch;
mod config;
mod encoder;
mod error;
mod inspector;
mod utils;

use anyhow::{Context, Result, bail};
use batch::{BatchItem, WorkerMessage, run_encode_worker};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::AppConfig;
use encoder::{DeletePolicy, EncodeJob, PresetRef, QualityMode};
use inspector::repair::run_check_worker;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use tracing::warn;
use utils::{check_tools, format_duration, format_file_size, init_logging};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "brakesize",
    version,
    about = "Batch-transcode video files to a target output size with HandBrakeCLI"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode files or folders to the target size
    Encode(EncodeArgs),
    /// Repair missing bitrate statistics with mkvpropedit
    Check {
        /// Files or directories to check
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print inspected media details
    Inspect {
        /// Files or directories to inspect
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct EncodeArgs {
    /// Files or directories to encode
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Destination directory for encoded files
    #[arg(short, long)]
    destination: PathBuf,

    /// Target output size in megabytes (defaults to the configured value)
    #[arg(short = 's', long)]
    target_size: Option<f64>,

    /// Find a constant-quality value via sample search instead of a fixed bitrate
    #[arg(long)]
    constant_quality: bool,

    /// Audio bitrates in kbps, parallel to the source track list (e.g. 320,192)
    #[arg(short = 'B', long, value_delimiter = ',')]
    audio_bitrates: Option<Vec<u32>>,

    /// Audio tracks to keep, 1-based, applied to every file (default: all)
    #[arg(short = 'a', long, value_delimiter = ',')]
    audio_tracks: Option<Vec<usize>>,

    /// Video encoder passed to HandBrake with -e
    #[arg(short = 'e', long)]
    encoder: Option<String>,

    /// Audio encoder passed with -E; "copy" passes audio through
    #[arg(short = 'E', long)]
    audio_encoder: Option<String>,

    /// HandBrake preset file to import
    #[arg(long, requires = "preset_name")]
    preset_file: Option<PathBuf>,

    /// Preset name inside the preset file
    #[arg(long, requires = "preset_file")]
    preset_name: Option<String>,

    /// Multi-pass encoding for fixed-bitrate software encodes
    #[arg(long)]
    multi_pass: bool,

    /// What to do with source files after a successful encode
    #[arg(long, value_enum, default_value_t = DeleteSourceArg::Never)]
    delete_source: DeleteSourceArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum DeleteSourceArg {
    Never,
    Auto,
    Prompt,
}

impl From<DeleteSourceArg> for DeletePolicy {
    fn from(arg: DeleteSourceArg) -> Self {
        match arg {
            DeleteSourceArg::Never => DeletePolicy::Never,
            DeleteSourceArg::Auto => DeletePolicy::Auto,
            DeleteSourceArg::Prompt => DeletePolicy::Prompt,
        }
    }
}

fn main() -> Result<()> {
    let _guard = init_logging();
    let cli = Cli::parse();
    let config = AppConfig::load();
    config.validate()?;

    match cli.command {
        Commands::Encode(args) => run_encode(args, &config),
        Commands::Check { inputs } => run_check(inputs, &config),
        Commands::Inspect { inputs } => run_inspect(inputs, &config),
    }
}

/// Expand files and directories into the list of media files to process
fn collect_media_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if path.is_file() && inspector::is_media_file(path) {
                    files.push(path.to_path_buf());
                }
            }
        } else if inspector::is_media_file(input) {
            files.push(input.clone());
        } else {
            eprintln!("Skipping {}: not a media file", input.display());
        }
    }
    files
}

fn run_encode(args: EncodeArgs, config: &AppConfig) -> Result<()> {
    let files = collect_media_files(&args.inputs);
    if files.is_empty() {
        bail!("no media files to encode");
    }

    std::fs::create_dir_all(&args.destination).with_context(|| {
        format!(
            "failed to create destination directory {}",
            args.destination.display()
        )
    })?;

    check_tools(&config.tools)?;

    let target_size_mb = args.target_size.unwrap_or(config.defaults.target_size_mb);
    if !target_size_mb.is_finite() || target_size_mb <= 0.0 {
        bail!("target size must be a positive number of megabytes");
    }

    let audio_encoder = args
        .audio_encoder
        .unwrap_or_else(|| config.defaults.audio_encoder.clone());
    if audio_encoder != "copy" && args.audio_bitrates.is_none() {
        bail!(
            "audio encoder '{}' requires --audio-bitrates (or use -E copy)",
            audio_encoder
        );
    }

    let preset = match (args.preset_file, args.preset_name) {
        (Some(file), Some(name)) => Some(PresetRef { file, name }),
        _ => None,
    };

    let job = EncodeJob {
        target_size_mb,
        audio_bitrates_kbps: args.audio_bitrates,
        video_encoder: args.encoder.or_else(|| config.defaults.video_encoder.clone()),
        audio_encoder,
        quality_mode: if args.constant_quality {
            QualityMode::ConstantQuality
        } else {
            QualityMode::FixedBitrate
        },
        preset,
        multi_pass: args.multi_pass || config.defaults.multi_pass,
        destination: args.destination.clone(),
        delete_source: args.delete_source.into(),
    };

    // Inspect every file up front; files that cannot be inspected are
    // reported and left out of the batch
    let mut items = Vec::new();
    for path in files {
        match inspector::inspect(&config.tools.mediainfo, &path) {
            Ok(descriptor) => {
                let selected_audio = match &args.audio_tracks {
                    Some(tracks) => tracks.iter().map(|t| t.saturating_sub(1)).collect(),
                    None => (0..descriptor.audio_tracks.len()).collect(),
                };
                items.push(BatchItem {
                    path,
                    descriptor,
                    selected_audio,
                });
            }
            Err(e) => {
                warn!("Inspection failed for {}: {}", path.display(), e);
                eprintln!("Skipping {}: {}", path.display(), e);
            }
        }
    }
    if items.is_empty() {
        bail!("no inspectable media files to encode");
    }

    let total_files = items.len();
    let delete_policy = job.delete_source;
    let tools = config.tools.clone();
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let worker_cancel = cancel_flag.clone();
    let (tx, rx) = mpsc::channel();

    let worker =
        std::thread::spawn(move || run_encode_worker(items, job, tools, worker_cancel, tx));

    let mut failures = 0usize;
    for message in rx {
        match message {
            WorkerMessage::Log(text) => println!("{}", text),
            WorkerMessage::ToolOutput(line) => println!("{}", line),
            WorkerMessage::FileStarted { index, name } => {
                println!("Encoding file {} of {}: {}", index + 1, total_files, name);
            }
            WorkerMessage::FileProgress { .. } => {}
            WorkerMessage::OverallProgress(percent) => {
                println!("Overall progress: {:.0}%", percent);
            }
            WorkerMessage::FileDone { .. } => {}
            WorkerMessage::FileFailed { message, .. } => {
                failures += 1;
                eprintln!("Failed: {}", message);
            }
            WorkerMessage::SourceCompleted { path } => {
                apply_delete_policy(delete_policy, &path);
            }
            WorkerMessage::Cancelled => println!("Batch cancelled."),
            WorkerMessage::Finished => println!("Encoding completed."),
        }
    }

    let _ = worker.join();
    if failures > 0 {
        bail!("{} file(s) failed", failures);
    }
    Ok(())
}

/// Execute the source-deletion policy. The worker only signals completion;
/// this decision stays with the caller.
fn apply_delete_policy(policy: DeletePolicy, path: &Path) {
    match policy {
        DeletePolicy::Never => {}
        DeletePolicy::Auto => match std::fs::remove_file(path) {
            Ok(()) => println!("Deleted source {}", path.display()),
            Err(e) => eprintln!("Could not delete {}: {}", path.display(), e),
        },
        DeletePolicy::Prompt => {
            print!("Delete source {}? [y/N] ", path.display());
            let _ = std::io::stdout().flush();
            let mut answer = String::new();
            if std::io::stdin().read_line(&mut answer).is_ok()
                && answer.trim().eq_ignore_ascii_case("y")
            {
                match std::fs::remove_file(path) {
                    Ok(()) => println!("Deleted source {}", path.display()),
                    Err(e) => eprintln!("Could not delete {}: {}", path.display(), e),
                }
            }
        }
    }
}

fn run_check(inputs: Vec<PathBuf>, config: &AppConfig) -> Result<()> {
    let files = collect_media_files(&inputs);
    if files.is_empty() {
        bail!("no media files to check");
    }
    check_tools(&config.tools)?;

    let tools = config.tools.clone();
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let worker = std::thread::spawn(move || run_check_worker(files, tools, cancel_flag, tx));

    let mut failures = 0usize;
    for message in rx {
        match message {
            WorkerMessage::Log(text) => println!("{}", text),
            WorkerMessage::FileStarted { name, .. } => println!("Checking: {}", name),
            WorkerMessage::FileFailed { message, .. } => {
                failures += 1;
                eprintln!("Failed: {}", message);
            }
            WorkerMessage::Cancelled => println!("Check cancelled."),
            _ => {}
        }
    }

    let _ = worker.join();
    if failures > 0 {
        bail!("{} file(s) failed the check", failures);
    }
    Ok(())
}

fn run_inspect(inputs: Vec<PathBuf>, config: &AppConfig) -> Result<()> {
    let files = collect_media_files(&inputs);
    if files.is_empty() {
        bail!("no media files to inspect");
    }

    for path in files {
        match inspector::inspect(&config.tools.mediainfo, &path) {
            Ok(descriptor) => {
                println!("{}", descriptor.filename());
                match descriptor.duration_secs {
                    Some(secs) => println!("  Duration: {}", format_duration(secs)),
                    None => println!("  Duration: unknown"),
                }
                println!("  Size: {}", format_file_size(descriptor.size_bytes));
                match &descriptor.video {
                    Some(video) => println!("  Video: {}", video.summary()),
                    None => println!("  Video: none"),
                }
                for (index, track) in descriptor.audio_tracks.iter().enumerate() {
                    println!("  Audio {}", track.summary(index));
                }
                println!(
                    "  Total audio bitrate: {} kbps",
                    descriptor.total_audio_bitrate_kbps()
                );
            }
            Err(e) => eprintln!("Failed to inspect {}: {}", path.display(), e),
        }
    }
    Ok(())
}
