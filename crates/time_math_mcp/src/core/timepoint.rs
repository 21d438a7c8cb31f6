use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::core::utils::CANONICAL_FORMAT;

/// Naive (zone-less) layouts accepted by the resolver.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const NAIVE_DATE_FORMAT: &str = "%Y-%m-%d";

/// An absolute instant plus the zone used to display and interpret it.
///
/// A `TimePoint` is either valid (arithmetic-safe) or carries the reason it
/// could not be resolved. Invalid points never participate in arithmetic;
/// they only surface in per-item error reporting.
#[derive(Debug, Clone)]
pub struct TimePoint {
    raw: String,
    resolved: Result<DateTime<Tz>, String>,
}

impl TimePoint {
    /// The input string exactly as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_valid(&self) -> bool {
        self.resolved.is_ok()
    }

    pub fn instant(&self) -> Option<&DateTime<Tz>> {
        self.resolved.as_ref().ok()
    }

    pub fn invalid_reason(&self) -> Option<&str> {
        self.resolved.as_ref().err().map(String::as_str)
    }

    /// Canonical RFC 3339 rendering in the display zone.
    pub fn canonical(&self) -> Option<String> {
        self.instant()
            .map(|dt| dt.format(CANONICAL_FORMAT).to_string())
    }

    pub fn unix_ms(&self) -> Option<i64> {
        self.instant().map(DateTime::timestamp_millis)
    }
}

/// True when the string carries its own zone information: a trailing `Z` or a
/// numeric UTC offset after the time portion. A `-` in the date part must not
/// count, so only the text past the first date/time separator is inspected.
pub fn has_explicit_offset(s: &str) -> bool {
    let s = s.trim();
    if s.ends_with('Z') || s.ends_with('z') {
        return true;
    }
    match s.find(|c: char| c == 'T' || c == 't' || c == ' ') {
        Some(idx) => {
            let time_part = &s[idx + 1..];
            time_part.contains('+') || time_part.contains('-')
        }
        None => false,
    }
}

/// Resolve a timestamp string into a `TimePoint`.
///
/// Zone-less strings are interpreted as wall-clock time in `explicit_zone`
/// (falling back to `default_zone`). Strings that carry an offset keep their
/// instant and are re-expressed in the explicit zone when one was supplied,
/// otherwise in UTC. Never fails: unparseable input yields an invalid
/// `TimePoint` and the caller decides whether that is fatal.
pub fn resolve(raw: &str, explicit_zone: Option<Tz>, default_zone: Tz) -> TimePoint {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return invalid(raw, "empty timestamp string".to_string());
    }

    if has_explicit_offset(trimmed) {
        return match DateTime::parse_from_rfc3339(trimmed) {
            Ok(dt) => {
                let zone = explicit_zone.unwrap_or(chrono_tz::UTC);
                TimePoint {
                    raw: raw.to_string(),
                    resolved: Ok(dt.with_timezone(&zone)),
                }
            }
            Err(_) => invalid(raw, format!("unrecognized timestamp format: {}", trimmed)),
        };
    }

    let zone = explicit_zone.unwrap_or(default_zone);
    match parse_naive(trimmed) {
        Some(naive) => match zone.from_local_datetime(&naive) {
            LocalResult::Single(dt) => TimePoint {
                raw: raw.to_string(),
                resolved: Ok(dt),
            },
            // Ambiguous wall-clock times (DST fall-back) take the earlier
            // candidate.
            LocalResult::Ambiguous(earliest, _) => TimePoint {
                raw: raw.to_string(),
                resolved: Ok(earliest),
            },
            LocalResult::None => invalid(
                raw,
                format!("nonexistent local time in {}: {}", zone.name(), trimmed),
            ),
        },
        None => invalid(raw, format!("unrecognized timestamp format: {}", trimmed)),
    }
}

fn invalid(raw: &str, reason: String) -> TimePoint {
    TimePoint {
        raw: raw.to_string(),
        resolved: Err(reason),
    }
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, NAIVE_DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
