//! Status command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use rollcall_core::{Navigation, RecordSource, ReloadPolicy};

use crate::utils::{format_remaining, format_timestamp, mask_key, open_gate};

/// Execute the status command.
///
/// Runs the same gate the capture page runs on entry, so an expired or
/// missing authorization fails here exactly as it would there.
pub fn execute(
    state_dir: &Path,
    reload: bool,
    reload_policy: ReloadPolicy,
    ceiling_secs: u64,
    quiet: bool,
) -> Result<()> {
    let gate = open_gate(state_dir, ceiling_secs, reload_policy);
    let navigation = if reload {
        Navigation::Reload
    } else {
        Navigation::Fresh
    };

    let session = gate
        .enter(navigation)
        .context("Capture page unavailable")?;
    let remaining = session.remaining_ms(gate.now_ms());

    if quiet {
        println!("{}", session.subject);
        return Ok(());
    }

    println!("{}", "Authorized".green().bold());
    println!("   {} {}", "Subject:".dimmed(), session.subject.bold());
    println!("   {} {}", "Key:".dimmed(), mask_key(&session.key));
    println!("   {} {}", "Verified:".dimmed(), format_timestamp(session.verified_at));
    println!("   {} {}", "Expires in:".dimmed(), format_remaining(remaining));
    if session.source == RecordSource::Fallback {
        println!(
            "   {} {}",
            "Source:".dimmed(),
            "recovered from durable storage".yellow()
        );
    }
    Ok(())
}
