#![forbid(unsafe_code)]

mod cmd;
mod output;
mod remote;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "orphan-finder: recover certificates the CA signed but never stored",
    long_about = None
)]
struct Cli {
    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a CA log for orphaning records and store every missing one.
    #[command(name = "parse-ca-log")]
    ParseCaLog(cmd::parse_ca_log::ParseCaLogArgs),

    /// Recover a single DER certificate or precertificate.
    #[command(name = "parse-der")]
    ParseDer(cmd::parse_der::ParseDerArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ORPHAN_FINDER_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "orphan=debug,info"
        } else {
            "orphan=info,warn"
        })
    });

    let format = env::var("ORPHAN_FINDER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so `--json` output on stdout stays parseable.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let output = cli.output_mode();

    match cli.command {
        Commands::ParseCaLog(ref args) => cmd::parse_ca_log::run_parse_ca_log(args, output),
        Commands::ParseDer(ref args) => cmd::parse_der::run_parse_der(args, output),
    }
}
