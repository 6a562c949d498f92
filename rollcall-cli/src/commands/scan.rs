//! Scan command implementation.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use rollcall_core::{ConsumerConfig, QrConsumer, SystemClock};
use tracing::info;

use crate::utils::{format_timestamp, mask_key, open_session};

/// Execute the scan command.
pub fn execute(state_dir: &Path, payload: String, threshold_ms: u64, quiet: bool) -> Result<()> {
    let payload = if payload == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read payload from stdin")?;
        buf
    } else {
        payload
    };
    // A piped `issue -q` may carry several codes, the last one is the newest
    let payload = payload
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or_default();

    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("Failed to create state directory {}", state_dir.display()))?;

    let consumer = QrConsumer::new(
        ConsumerConfig {
            freshness_threshold: Duration::from_millis(threshold_ms),
        },
        Arc::new(SystemClock),
    );
    let record = consumer
        .consume(payload, &open_session(state_dir))
        .context("Scan rejected")?;

    info!(subject = %record.subject, "Authorization stored");

    if quiet {
        println!("{}", record.subject);
    } else {
        println!("{}", "Scan accepted".green().bold());
        println!("   {} {}", "Subject:".dimmed(), record.subject.bold());
        println!("   {} {}", "Key:".dimmed(), mask_key(&record.key));
        println!("   {} {}", "Verified:".dimmed(), format_timestamp(record.verified_at));
        println!();
        println!("{}", "Next: rollcall submit --roll <ROLL> --image <FILE>".dimmed());
    }
    Ok(())
}
