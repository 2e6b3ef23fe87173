//! `orphan-finder parse-der` — recover one DER file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use orphan_core::orphan::OrphanType;
use orphan_core::persist::Persisted;
use orphan_core::reconcile::{Reconciler, Recovered, report_failure};
use serde::Serialize;
use tracing::info;

use super::setup::open_session;
use crate::output::{OutputMode, pretty_kv, render};

/// Arguments for `orphan-finder parse-der`.
#[derive(Args, Debug)]
pub struct ParseDerArgs {
    /// Path to the TOML configuration file.
    #[arg(long)]
    pub config: PathBuf,

    /// File holding the raw DER certificate or precertificate.
    #[arg(long = "der-file")]
    pub der_file: PathBuf,

    /// Registration that requested the certificate (must be non-zero).
    #[arg(
        long = "regID",
        visible_alias = "reg-id",
        value_parser = clap::value_parser!(i64).range(1..)
    )]
    pub reg_id: i64,
}

#[derive(Debug, Serialize)]
struct RecoveryReport {
    serial: String,
    orphan_type: OrphanType,
    #[serde(skip_serializing_if = "Option::is_none")]
    issued_at: Option<DateTime<Utc>>,
    stored: bool,
}

impl From<Recovered> for RecoveryReport {
    fn from(recovered: Recovered) -> Self {
        Self {
            serial: recovered.serial,
            orphan_type: recovered.orphan_type,
            issued_at: recovered.issued_at,
            stored: recovered.disposition == Persisted::Stored,
        }
    }
}

/// Execute `orphan-finder parse-der`. Any failure is fatal.
pub fn run_parse_der(args: &ParseDerArgs, output: OutputMode) -> Result<()> {
    let session = open_session(&args.config)?;

    let der = std::fs::read(&args.der_file)
        .with_context(|| format!("Failed to read {}", args.der_file.display()))?;

    let reconciler = Reconciler::new(
        session.storage.as_ref(),
        session.ocsp.as_ref(),
        session.config.backdate,
    );
    let recovered = match reconciler.recover(&der, args.reg_id) {
        Ok(recovered) => recovered,
        Err(err) => {
            let source = args.der_file.display().to_string();
            report_failure(&err, &source);
            return Err(err).with_context(|| format!("Failed to recover {source}"));
        }
    };

    if recovered.disposition == Persisted::AlreadyExists {
        info!(
            serial = %recovered.serial,
            orphan_type = %recovered.orphan_type,
            "{} already exists in storage",
            recovered.orphan_type
        );
    }

    render(output, &RecoveryReport::from(recovered), |report, w| {
        pretty_kv(w, "serial", &report.serial)?;
        pretty_kv(w, "type", report.orphan_type.as_str())?;
        if let Some(issued_at) = report.issued_at {
            pretty_kv(w, "issued", issued_at.to_rfc3339())?;
        }
        pretty_kv(
            w,
            "result",
            if report.stored {
                "stored"
            } else {
                "already present"
            },
        )
    })
}
