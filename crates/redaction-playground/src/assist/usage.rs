//! Usage metadata carried in assist response headers.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header carrying the number of requests used in the current window.
pub const USAGE_COUNT_HEADER: &str = "x-usage-count";
/// Header carrying the request allowance for the current window.
pub const USAGE_LIMIT_HEADER: &str = "x-usage-limit";
/// Header carrying when the current window resets.
pub const USAGE_RESET_HEADER: &str = "x-usage-reset";

/// Timestamps above this are taken to be milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Quota usage reported by the most recent assist call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    /// Requests used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Requests allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// When the window resets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<DateTime<Utc>>,
}

impl UsageInfo {
    /// Extract usage from response headers.
    ///
    /// Returns `None` when none of the three headers are present. Headers that
    /// are present but unparseable are ignored individually.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        };

        let count = header(USAGE_COUNT_HEADER).and_then(|v| v.parse().ok());
        let limit = header(USAGE_LIMIT_HEADER).and_then(|v| v.parse().ok());
        let reset = header(USAGE_RESET_HEADER).and_then(parse_reset);

        if count.is_none() && limit.is_none() && reset.is_none() {
            None
        } else {
            Some(Self { count, limit, reset })
        }
    }

    /// Requests left in the current window, when both figures are known.
    #[must_use]
    pub fn remaining(&self) -> Option<u64> {
        Some(self.limit?.saturating_sub(self.count?))
    }
}

impl std::fmt::Display for UsageInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.count, self.limit) {
            (Some(count), Some(limit)) => write!(f, "{count}/{limit} requests")?,
            (Some(count), None) => write!(f, "{count} requests")?,
            (None, Some(limit)) => write!(f, "limit {limit} requests")?,
            (None, None) => write!(f, "usage unknown")?,
        }
        if let Some(reset) = self.reset {
            write!(f, ", resets {}", reset.format("%Y-%m-%d %H:%M UTC"))?;
        }
        Ok(())
    }
}

/// Parse a reset value given as unix seconds, unix milliseconds, or RFC 3339.
fn parse_reset(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(n) = raw.parse::<i64>() {
        return if n > MILLIS_THRESHOLD {
            Utc.timestamp_millis_opt(n).single()
        } else {
            Utc.timestamp_opt(n, 0).single()
        };
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
