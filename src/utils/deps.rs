use crate::config::ToolsConfig;
use crate::error::AppError;
use std::process::{Command, Stdio};

/// Verify that every external tool a batch needs can be launched.
/// Called before a batch starts; a missing tool blocks the start entirely.
pub fn check_tools(tools: &ToolsConfig) -> Result<(), AppError> {
    probe(&tools.handbrake, "--version")?;
    probe(&tools.mediainfo, "--Version")?;
    probe(&tools.mkvpropedit, "--version")?;
    probe(&tools.ffmpeg, "-version")?;
    Ok(())
}

fn probe(cmd: &str, version_arg: &str) -> Result<(), AppError> {
    let ok = Command::new(cmd)
        .arg(version_arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success());

    if ok {
        Ok(())
    } else {
        Err(AppError::ExternalTool(format!("{} is not available", cmd)))
    }
}
