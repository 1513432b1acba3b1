//! Wall-clock timestamps and freshness display.
//!
//! The cache orders entries and reports freshness purely by wall time, so a
//! plain milliseconds-since-epoch value is sufficient; no logical clock is
//! needed.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp at the current time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before Unix epoch")
            .as_millis() as u64;
        Self(millis)
    }

    /// Creates a timestamp from raw epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the raw epoch milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed from this timestamp to `later`.
    /// Saturates at zero if `later` is earlier (clock skew).
    #[must_use]
    pub const fn elapsed_until(&self, later: Timestamp) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

/// Formats an elapsed duration (milliseconds) as a coarse freshness label.
///
/// Buckets: under a minute is `"just now"`, then whole minutes, hours, days.
#[must_use]
pub fn format_age(elapsed_ms: u64) -> String {
    if elapsed_ms < MINUTE_MS {
        "just now".to_string()
    } else if elapsed_ms < HOUR_MS {
        format!("{}m ago", elapsed_ms / MINUTE_MS)
    } else if elapsed_ms < DAY_MS {
        format!("{}h ago", elapsed_ms / HOUR_MS)
    } else {
        format!("{}d ago", elapsed_ms / DAY_MS)
    }
}
