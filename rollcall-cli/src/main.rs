//! Rollcall CLI - rotating QR attendance from the terminal.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rollcall_core::ReloadPolicy;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (missing roll number, empty subject)
  65  Data error (malformed or expired code)
  66  Cannot read the selfie image
  69  Upload server unavailable or upload rejected
  74  I/O error (state directory)
  75  A submission is already in progress
  77  Not authorized (scan a code first, or the session expired)";

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(author, version, about = "Rotating QR classroom attendance", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Directory holding the scan authorization between invocations
    #[arg(long, global = true, env = "ROLLCALL_STATE_DIR", default_value = ".rollcall")]
    state_dir: PathBuf,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print what scripts need
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// When to use colors
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

/// What a page reload does to a stored authorization
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ReloadArg {
    /// Keep a still-valid authorization
    Recover,
    /// Drop the authorization and require a new scan
    StartOver,
}

impl From<ReloadArg> for ReloadPolicy {
    fn from(arg: ReloadArg) -> Self {
        match arg {
            ReloadArg::Recover => ReloadPolicy::Recover,
            ReloadArg::StartOver => ReloadPolicy::StartOver,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Teacher side: show a rotating code for a subject
    Issue {
        /// Subject the codes are bound to
        #[arg(value_name = "SUBJECT")]
        subject: String,

        /// Re-mint period in milliseconds
        #[arg(long, default_value_t = 2000)]
        period_ms: u64,

        /// Advisory validity window written into each code, in milliseconds
        #[arg(long, default_value_t = 2000)]
        window_ms: u64,

        /// Stop after this many codes (default: run until Ctrl+C)
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Student side: accept a scanned code
    Scan {
        /// Scanned payload, or "-" to read it from stdin
        #[arg(value_name = "PAYLOAD")]
        payload: String,

        /// Maximum accepted code age in milliseconds
        #[arg(long, default_value_t = 2500)]
        threshold_ms: u64,
    },

    /// Show whether the capture page would let you in
    Status {
        /// Treat this as a page reload
        #[arg(long)]
        reload: bool,

        /// What a reload does to the authorization
        #[arg(long, value_enum, default_value_t = ReloadArg::Recover)]
        on_reload: ReloadArg,

        /// Session lifetime in seconds
        #[arg(long, default_value_t = 300)]
        ceiling_secs: u64,
    },

    /// Submit a selfie for the scanned subject
    Submit {
        /// Your roll number
        #[arg(short, long)]
        roll: String,

        /// Selfie image (JPEG, PNG, GIF or WebP)
        #[arg(short, long, value_name = "FILE")]
        image: PathBuf,

        /// Upload server base URL
        #[arg(long, env = "ROLLCALL_SERVER", default_value = "http://localhost:3000")]
        server: String,

        /// Do not send the auth-key header
        #[arg(long)]
        no_auth_key: bool,

        /// Session lifetime in seconds
        #[arg(long, default_value_t = 300)]
        ceiling_secs: u64,
    },

    /// Forget the stored authorization
    Logout,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    let state_dir = cli.state_dir;

    match cli.command {
        Commands::Issue {
            subject,
            period_ms,
            window_ms,
            count,
        } => commands::issue::execute(subject, period_ms, window_ms, count, quiet).await,
        Commands::Scan {
            payload,
            threshold_ms,
        } => commands::scan::execute(&state_dir, payload, threshold_ms, quiet),
        Commands::Status {
            reload,
            on_reload,
            ceiling_secs,
        } => commands::status::execute(&state_dir, reload, on_reload.into(), ceiling_secs, quiet),
        Commands::Submit {
            roll,
            image,
            server,
            no_auth_key,
            ceiling_secs,
        } => {
            commands::submit::execute(
                &state_dir,
                roll,
                image,
                server,
                !no_auth_key,
                ceiling_secs,
                quiet,
            )
            .await
        }
        Commands::Logout => commands::logout::execute(&state_dir, quiet),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    init_tracing(cli.verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}
