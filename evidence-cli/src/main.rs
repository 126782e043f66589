//! Evidence CLI - tamper-evident image evidence tool.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "evidence")]
#[command(author, version, about = "Tamper-evident image evidence capture", long_about = None)]
#[command(after_help = exit_codes::HELP)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watermark an image, timestamp its digest and write an evidence bundle
    Capture {
        /// Image file used as the captured frame
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Output resolution as a fraction of the input, in (0, 1]
        #[arg(long, default_value_t = 1.0)]
        scale: f64,

        /// Latitude in decimal degrees
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude in decimal degrees
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Calendar URL (repeatable; defaults to EVIDENCE_CALENDARS or the public pool)
        #[arg(long = "calendar", value_name = "URL")]
        calendars: Vec<String>,

        /// Per-calendar timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Calendars to wait for before writing the bundle
        #[arg(long, value_name = "N")]
        min_attestations: Option<usize>,

        /// Directory the bundle is written to
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Use an in-process calendar instead of remote servers (for testing)
        #[arg(long)]
        mock_calendar: bool,

        /// Accept plain-HTTP calendar URLs
        #[arg(long)]
        allow_http: bool,

        /// Suppress the summary, printing only the bundle path
        #[arg(short, long)]
        quiet: bool,
    },

    /// Check a bundle's parts against each other and show its proof
    Inspect {
        /// Path to the evidence bundle (.zip)
        #[arg(value_name = "BUNDLE")]
        bundle: PathBuf,

        /// Print nothing; report through the exit code only
        #[arg(short, long)]
        quiet: bool,
    },

    /// Fetch anchored attestations for a bundle's pending proof
    Upgrade {
        /// Path to the evidence bundle (.zip)
        #[arg(value_name = "BUNDLE")]
        bundle: PathBuf,

        /// Per-calendar timeout in seconds
        #[arg(long, value_name = "SECS", default_value_t = 10)]
        timeout: u64,

        /// Accept plain-HTTP calendar URLs
        #[arg(long)]
        allow_http: bool,

        /// Print nothing on success
        #[arg(short, long)]
        quiet: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Capture {
            image,
            scale,
            lat,
            lon,
            calendars,
            timeout,
            min_attestations,
            out,
            mock_calendar,
            allow_http,
            quiet,
        } => {
            commands::capture::execute(commands::capture::CaptureArgs {
                image,
                scale,
                position: lat.zip(lon),
                calendars,
                timeout,
                min_attestations,
                out,
                mock_calendar,
                allow_http,
                quiet,
            })
            .await
        }
        Commands::Inspect { bundle, quiet } => commands::inspect::execute(bundle, quiet),
        Commands::Upgrade {
            bundle,
            timeout,
            allow_http,
            quiet,
        } => commands::upgrade::execute(bundle, timeout, allow_http, quiet).await,
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };
    if let Some(message) = exit.message {
        eprintln!("Error: {message}");
    }
    std::process::exit(exit.code);
}
