use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One end of a temporal filter.
///
/// Search forms hand out either plain calendar dates or full timestamps;
/// both are kept as entered so they encode back to the same text.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateBound {
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

impl DateBound {
    /// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (any offset, normalized to UTC).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(DateBound::Day(day));
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| DateBound::Instant(t.with_timezone(&Utc)))
    }

    pub fn to_param(&self) -> String {
        match self {
            DateBound::Day(day) => day.format("%Y-%m-%d").to_string(),
            DateBound::Instant(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

impl std::fmt::Display for DateBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_param())
    }
}
