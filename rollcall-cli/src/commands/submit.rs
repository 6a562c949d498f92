//! Submit command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use rollcall_core::{
    FileCapture, HttpUploader, ReloadPolicy, RollcallError, SubmitConfig, SubmitController,
    SubmitOutcome,
};
use tracing::{debug, info};

use crate::utils::open_gate;

/// Execute the submit command.
pub async fn execute(
    state_dir: &Path,
    roll: String,
    image: PathBuf,
    server: String,
    send_auth_key: bool,
    ceiling_secs: u64,
    quiet: bool,
) -> Result<()> {
    // Same order as the capture page: the roll number is checked before the photo
    if roll.trim().is_empty() {
        return Err(RollcallError::Validation("Please enter your roll number".into()).into());
    }

    let gate = open_gate(state_dir, ceiling_secs, ReloadPolicy::default());
    let uploader = HttpUploader::new(&server).context("Invalid server URL")?;
    debug!(endpoint = uploader.endpoint(), "Using upload endpoint");

    let controller = SubmitController::new(
        gate,
        uploader,
        SubmitConfig {
            send_auth_key,
            ..SubmitConfig::default()
        },
    );
    controller
        .capture_from(&FileCapture::new(&image))
        .with_context(|| format!("Failed to read selfie {}", image.display()))?;

    if !quiet {
        println!("{}", "Submitting attendance...".cyan());
    }

    let SubmitOutcome::Recorded { filename, subject } = controller
        .submit(&roll)
        .await
        .context("Submission failed")?;
    info!(filename = %filename, "Attendance recorded");

    if quiet {
        println!("{}", filename);
    } else {
        println!("{}", "Attendance submitted".green().bold());
        println!("   {} {}", "Subject:".dimmed(), subject.bold());
        println!("   {} {}", "Roll:".dimmed(), roll.trim());
        println!("   {} {}", "Stored as:".dimmed(), filename);
    }
    Ok(())
}
