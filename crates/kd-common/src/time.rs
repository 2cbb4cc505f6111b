//! Time-window primitive for telemetry queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open time interval `[from, to)` with sub-second precision.
///
/// Every telemetry query and bundle request is bounded by a window;
/// `from < to` is required and validated before any work starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window without validating it. Call [`TimeWindow::validate`]
    /// before use in a request.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        TimeWindow { from, to }
    }

    /// Check the `from < to` invariant.
    pub fn validate(&self) -> crate::Result<()> {
        if self.from >= self.to {
            return Err(crate::Error::InvalidWindow {
                from: self.from,
                to: self.to,
            });
        }
        Ok(())
    }

    /// Whether a timestamp falls inside the half-open interval.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.from && ts < self.to
    }

    /// Window length.
    pub fn duration(&self) -> chrono::Duration {
        self.to - self.from
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from.to_rfc3339(), self.to.to_rfc3339())
    }
}
