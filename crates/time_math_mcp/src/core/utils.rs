// Constants for format strings and shared unit math

/// Canonical rendering for resolved timestamps (RFC 3339 with milliseconds).
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

pub const MS_PER_SECOND: i64 = 1_000;
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Cascading day/time decomposition of a non-negative millisecond magnitude.
///
/// Units are remainders of the next-larger unit, not independent totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParts {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub milliseconds: i64,
}

pub fn decompose_ms(magnitude_ms: i64) -> TimeParts {
    let days = magnitude_ms / MS_PER_DAY;
    let mut rem = magnitude_ms % MS_PER_DAY;
    let hours = rem / MS_PER_HOUR;
    rem %= MS_PER_HOUR;
    let minutes = rem / MS_PER_MINUTE;
    rem %= MS_PER_MINUTE;
    let seconds = rem / MS_PER_SECOND;
    let milliseconds = rem % MS_PER_SECOND;

    TimeParts {
        days,
        hours,
        minutes,
        seconds,
        milliseconds,
    }
}

fn push_unit(rendered: &mut Vec<String>, value: i64, unit: &str) {
    if value != 0 {
        let suffix = if value == 1 { "" } else { "s" };
        rendered.push(format!("{} {}{}", value, unit, suffix));
    }
}

/// Render non-zero units as `"<n> <unit>[s]"` in descending order, joined by
/// ", ". Falls back to `"0 milliseconds"` when every unit is zero so the
/// rendering is never empty.
pub fn humanize_units(years: i64, months: i64, parts: &TimeParts) -> String {
    let mut rendered = Vec::new();
    push_unit(&mut rendered, years, "year");
    push_unit(&mut rendered, months, "month");
    push_unit(&mut rendered, parts.days, "day");
    push_unit(&mut rendered, parts.hours, "hour");
    push_unit(&mut rendered, parts.minutes, "minute");
    push_unit(&mut rendered, parts.seconds, "second");
    push_unit(&mut rendered, parts.milliseconds, "millisecond");

    if rendered.is_empty() {
        return "0 milliseconds".to_string();
    }
    rendered.join(", ")
}

/// Humanize a signed millisecond delta: magnitude in cascading units, with a
/// leading minus sign for negative values.
pub fn humanize_ms(delta_ms: i64) -> String {
    let magnitude = delta_ms.saturating_abs();
    let body = humanize_units(0, 0, &decompose_ms(magnitude));
    if delta_ms < 0 {
        format!("-{}", body)
    } else {
        body
    }
}
