//! Value formatting for tables and key/value output.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Cut `s` to at most `max` characters, ending in "..." when shortened.
pub fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some(_) if max <= 3 => s.chars().take(max).collect(),
        Some(_) => {
            let keep: String = s.chars().take(max - 3).collect();
            keep + "..."
        }
    }
}

/// First group of a record UUID, enough to pass back as a prefix.
pub fn short_id(id: &Uuid) -> String {
    let simple = id.simple().to_string();
    simple[..8].to_string()
}

pub fn format_datetime(dt: &DateTime<Utc>, pretty: bool) -> String {
    if pretty {
        dt.format("%Y-%m-%d %H:%M UTC").to_string()
    } else {
        dt.to_rfc3339()
    }
}

/// Key slot timestamps are Unix seconds with 0 meaning "never".
pub fn format_timestamp(secs: u64, pretty: bool) -> String {
    if secs == 0 {
        let never = if pretty { "never" } else { "0" };
        return never.to_string();
    }
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map_or_else(|| secs.to_string(), |dt| format_datetime(&dt, pretty))
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Mail", 10), "Mail");
        assert_eq!(truncate("Mail", 4), "Mail");
        assert_eq!(truncate("Online banking", 9), "Online...");
        assert_eq!(truncate("Mail", 2), "Ma");
        assert_eq!(truncate("Ünïcödé account", 8), "Ünïcö...");
    }

    #[test]
    fn test_short_id() {
        let id = Uuid::parse_str("7a2e3c0b-1234-5678-9abc-def012345678").unwrap();
        assert_eq!(short_id(&id), "7a2e3c0b");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0, true), "never");
        assert_eq!(format_timestamp(0, false), "0");
        assert_eq!(format_timestamp(1_700_000_000, true), "2023-11-14 22:13 UTC");
        assert_eq!(format_timestamp(1_700_000_000, false), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(812), "812 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }
}
