//! Logout command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use rollcall_core::ReloadPolicy;

use crate::utils::open_gate;

/// Execute the logout command.
pub fn execute(state_dir: &Path, quiet: bool) -> Result<()> {
    open_gate(state_dir, 0, ReloadPolicy::default())
        .logout()
        .context("Failed to clear authorization")?;

    if !quiet {
        println!("{}", "Logged out".green().bold());
    }
    Ok(())
}
