//! `orphan-finder parse-ca-log` — batch recovery from a CA log.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use orphan_core::reconcile::Reconciler;
use orphan_core::tally::Tally;

use super::setup::open_session;
use crate::output::{OutputMode, pretty_kv, render};

/// Arguments for `orphan-finder parse-ca-log`.
#[derive(Args, Debug)]
pub struct ParseCaLogArgs {
    /// Path to the TOML configuration file.
    #[arg(long)]
    pub config: PathBuf,

    /// CA log file to scan for orphaning records.
    #[arg(long = "log-file")]
    pub log_file: PathBuf,

    /// Lines processed concurrently; overrides `workers` in the config.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub workers: Option<usize>,
}

/// Execute `orphan-finder parse-ca-log`.
pub fn run_parse_ca_log(args: &ParseCaLogArgs, output: OutputMode) -> Result<()> {
    let session = open_session(&args.config)?;

    let bytes = std::fs::read(&args.log_file)
        .with_context(|| format!("Failed to read {}", args.log_file.display()))?;
    let log = String::from_utf8_lossy(&bytes);

    let workers = args.workers.unwrap_or(session.config.workers);
    let tally = Reconciler::new(
        session.storage.as_ref(),
        session.ocsp.as_ref(),
        session.config.backdate,
    )
    .with_workers(workers)
    .run_batch(&log);

    render(output, &tally, write_tally)
}

fn write_tally(tally: &Tally, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_kv(
        w,
        "certificates",
        format!(
            "found {}, added {}",
            tally.certificates_found, tally.certificates_added
        ),
    )?;
    pretty_kv(
        w,
        "precertificates",
        format!(
            "found {}, added {}",
            tally.precertificates_found, tally.precertificates_added
        ),
    )
}
