//! orphan-core library.
//!
//! Reconciles certificates and precertificates that were signed by the CA
//! but never written to storage. Each candidate flows through the same
//! pipeline: [`scan`] → [`classify`] → [`existence`] → [`ocsp`] →
//! [`backdate`] → [`persist`], orchestrated by [`reconcile`].
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums per module; `anyhow::Result` at the
//!   configuration edge.
//! - **Logging**: `tracing` macros. Diagnostics operators must act on are
//!   emitted at `error!` level on the [`AUDIT_TARGET`] target.

pub mod backdate;
pub mod classify;
pub mod config;
pub mod doubles;
pub mod error;
pub mod existence;
pub mod ocsp;
pub mod orphan;
pub mod persist;
pub mod reconcile;
pub mod scan;
pub mod storage;
pub mod tally;

/// Tracing target for audit-level diagnostics.
pub const AUDIT_TARGET: &str = "audit";
