//! Issue command implementation.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use rollcall_core::{IssuedCode, IssuerConfig, QrIssuer};
use tracing::info;

use crate::utils::format_timestamp;

/// Execute the issue command.
///
/// Prints every code as it is minted. In quiet mode only the raw payloads are
/// printed, one per line, so they can be piped into `rollcall scan -`.
pub async fn execute(
    subject: String,
    period_ms: u64,
    window_ms: u64,
    count: Option<u64>,
    quiet: bool,
) -> Result<()> {
    let config = IssuerConfig {
        period: Duration::from_millis(period_ms),
        window: Duration::from_millis(window_ms),
        ..IssuerConfig::default()
    };
    let issuer = QrIssuer::with_config(config);

    let first = issuer.start(&subject).context("Failed to start issuing")?;
    let mut codes = issuer.subscribe();
    let mut countdown = issuer.countdown();

    if !quiet {
        println!();
        println!(
            "{} {}",
            "Issuing attendance codes for".green().bold(),
            first.credential.subject.bold()
        );
        println!(
            "   {} every {} ms, Ctrl+C to stop",
            "New code".dimmed(),
            period_ms
        );
    }
    print_code(&first, quiet);

    let mut printed = 1u64;
    while count.map_or(true, |limit| printed < limit) {
        tokio::select! {
            changed = codes.changed() => {
                changed.context("Issuer stopped unexpectedly")?;
                let code = codes.borrow_and_update().clone();
                if let Some(code) = code {
                    print_code(&code, quiet);
                    printed += 1;
                }
            }
            changed = countdown.changed(), if !quiet => {
                if changed.is_ok() {
                    let secs = *countdown.borrow_and_update();
                    eprint!("\r   {} {}s ", "Next code in".dimmed(), secs);
                    let _ = std::io::stderr().flush();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    issuer.stop();
    if !quiet {
        eprintln!();
        println!("{} {} code(s) issued", "Stopped.".yellow(), printed);
    }
    Ok(())
}

fn print_code(code: &IssuedCode, quiet: bool) {
    if quiet {
        println!("{}", code.payload);
        return;
    }
    println!();
    println!(
        "   {} #{}  {} {}",
        "Code".cyan().bold(),
        code.sequence,
        "valid until".dimmed(),
        format_timestamp(code.credential.valid_until)
    );
    println!("   {} {}", "Payload:".dimmed(), code.payload);
}
