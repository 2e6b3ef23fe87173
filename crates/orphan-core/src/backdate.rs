//! Issuance-time reconstruction.
//!
//! The CA sets `NotBefore` to the signing instant minus its configured
//! backdate. Recovery adds the same offset back so recovered records carry
//! their historical issuance time instead of "now". The offset is signed so
//! that deployments which record the backdate as a negative duration keep
//! working unchanged.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A fixed, signed duration applied to every candidate in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackdateOffset(TimeDelta);

/// Errors parsing or applying a backdate offset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackdateError {
    #[error("invalid backdate duration '{raw}': {reason}")]
    Invalid { raw: String, reason: String },

    #[error("NotBefore {not_before} shifted by {offset} is out of range")]
    OutOfRange {
        not_before: DateTime<Utc>,
        offset: BackdateOffset,
    },
}

impl BackdateOffset {
    pub const ZERO: Self = Self(TimeDelta::zero());

    #[must_use]
    pub const fn new(delta: TimeDelta) -> Self {
        Self(delta)
    }

    #[must_use]
    pub const fn as_delta(self) -> TimeDelta {
        self.0
    }

    /// Parse a humantime duration with an optional leading `-`
    /// (`"1h"`, `"-1h"`, `"1h 30m"`).
    ///
    /// # Errors
    ///
    /// Returns [`BackdateError::Invalid`] if the text is not a duration or
    /// does not fit in a [`TimeDelta`].
    pub fn parse(raw: &str) -> Result<Self, BackdateError> {
        let trimmed = raw.trim();
        let (negative, magnitude) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };

        let invalid = |reason: String| BackdateError::Invalid {
            raw: raw.to_string(),
            reason,
        };
        let std = humantime::parse_duration(magnitude).map_err(|err| invalid(err.to_string()))?;
        let delta = TimeDelta::from_std(std).map_err(|err| invalid(err.to_string()))?;

        Ok(Self(if negative { -delta } else { delta }))
    }

    /// `not_before + offset`.
    ///
    /// # Errors
    ///
    /// Returns [`BackdateError::OutOfRange`] if the result cannot be
    /// represented.
    pub fn issued_time(self, not_before: DateTime<Utc>) -> Result<DateTime<Utc>, BackdateError> {
        not_before
            .checked_add_signed(self.0)
            .ok_or(BackdateError::OutOfRange {
                not_before,
                offset: self,
            })
    }
}

impl fmt::Display for BackdateOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_zero() {
            return f.write_str("0s");
        }
        let sign = if self.0 < TimeDelta::zero() { "-" } else { "" };
        match self.0.abs().to_std() {
            Ok(std) => write!(f, "{sign}{}", humantime::format_duration(std)),
            Err(_) => write!(f, "{sign}{}s", self.0.num_seconds().unsigned_abs()),
        }
    }
}

impl FromStr for BackdateOffset {
    type Err = BackdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BackdateOffset {
    type Error = BackdateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BackdateOffset> for String {
    fn from(value: BackdateOffset) -> Self {
        value.to_string()
    }
}
