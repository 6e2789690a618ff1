use crate::models::LiveElapsed;
use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Formats banked minutes, e.g. `1d 2h 5m`.
pub fn format_minutes(minutes: u32) -> String {
    let days = minutes / 1440;
    let hours = (minutes % 1440) / 60;
    let mins = minutes % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if mins > 0 || (days == 0 && hours == 0) {
        parts.push(format!("{}m", mins));
    }

    parts.join(" ")
}

/// Live stopwatch text: `12m 5s`, or just `5s` under a minute.
pub fn format_live(live: LiveElapsed) -> String {
    if live.minutes > 0 {
        format!("{}m {}s", live.minutes, live.seconds)
    } else {
        format!("{}s", live.seconds)
    }
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_deadline(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    bail!("Invalid deadline '{}', expected YYYY-MM-DD or RFC 3339", raw)
}
