use chrono::{DateTime, Datelike, Duration, Months};
use chrono_tz::Tz;

use crate::core::error::{TimeMathError, TimeMathResult};
use crate::core::models::{
    BreakdownResult, DiffResult, DurationPairStats, DurationSpec, DurationStat, IntervalStats,
    ShiftResult, SortResult, TimestampStats,
};
use crate::core::timepoint::TimePoint;
use crate::core::utils::{CANONICAL_FORMAT, decompose_ms, humanize_ms, humanize_units};

/// Apply a sparse calendar duration to one resolved timestamp, preserving its
/// display zone.
///
/// Years and months are collapsed into a single clamped calendar shift
/// (wall-clock preserving, end-of-month clamped); days and time units are
/// exact durations added to the instant. Errors are returned as plain
/// strings so the batch runner can capture them per index.
pub fn apply_duration(
    point: &TimePoint,
    spec: &DurationSpec,
    negate: bool,
) -> Result<ShiftResult, String> {
    let instant = match point.instant() {
        Some(dt) => *dt,
        None => {
            return Err(point
                .invalid_reason()
                .unwrap_or("invalid timestamp")
                .to_string());
        }
    };

    let sign: i64 = if negate { -1 } else { 1 };
    let shifted = shift_months(instant, spec.total_months().saturating_mul(sign))
        .and_then(|dt| tick_duration(spec, sign).and_then(|ticks| dt.checked_add_signed(ticks)))
        .ok_or_else(|| "timestamp arithmetic overflow".to_string())?;

    Ok(ShiftResult {
        input: point.raw().to_string(),
        result: shifted.format(CANONICAL_FORMAT).to_string(),
        timezone: shifted.timezone().name().to_string(),
        unix_ms: shifted.timestamp_millis(),
    })
}

/// Clamped calendar month shift; zero months is the identity.
fn shift_months(dt: DateTime<Tz>, months: i64) -> Option<DateTime<Tz>> {
    if months == 0 {
        return Some(dt);
    }
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months > 0 {
        dt.checked_add_months(Months::new(magnitude))
    } else {
        dt.checked_sub_months(Months::new(magnitude))
    }
}

/// Day and time units as one exact signed duration on the instant.
fn tick_duration(spec: &DurationSpec, sign: i64) -> Option<Duration> {
    type Ctor = fn(i64) -> Option<Duration>;
    let units: [(Option<i64>, Ctor); 4] = [
        (spec.days, Duration::try_days),
        (spec.hours, Duration::try_hours),
        (spec.minutes, Duration::try_minutes),
        (spec.seconds, Duration::try_seconds),
    ];

    let mut total = Duration::zero();
    for (value, ctor) in units {
        if let Some(value) = value {
            total = total.checked_add(&ctor(value.checked_mul(sign)?)?)?;
        }
    }
    Some(total)
}

fn both_valid<'a>(
    base: &'a TimePoint,
    compare: &'a TimePoint,
) -> Result<(&'a DateTime<Tz>, &'a DateTime<Tz>), String> {
    let b = base.instant().ok_or_else(|| {
        format!(
            "invalid base timestamp '{}': {}",
            base.raw(),
            base.invalid_reason().unwrap_or("unparseable")
        )
    })?;
    let c = compare.instant().ok_or_else(|| {
        format!(
            "invalid compare timestamp '{}': {}",
            compare.raw(),
            compare.invalid_reason().unwrap_or("unparseable")
        )
    })?;
    Ok((b, c))
}

/// Cascading day/time difference; sign follows compare minus base.
pub fn diff(base: &TimePoint, compare: &TimePoint) -> Result<DiffResult, String> {
    let (b, c) = both_valid(base, compare)?;
    let total_ms = c.timestamp_millis() - b.timestamp_millis();
    let parts = decompose_ms(total_ms.saturating_abs());

    Ok(DiffResult {
        base: base.raw().to_string(),
        compare: compare.raw().to_string(),
        days: parts.days,
        hours: parts.hours,
        minutes: parts.minutes,
        seconds: parts.seconds,
        milliseconds: parts.milliseconds,
        total_milliseconds: total_ms,
    })
}

/// Calendar-aware breakdown: whole years and months first (clamped calendar
/// stepping from the earlier point), then the exact day/time cascade of the
/// remainder.
pub fn duration_between(base: &TimePoint, compare: &TimePoint) -> Result<BreakdownResult, String> {
    let (b, c) = both_valid(base, compare)?;
    let total_ms = c.timestamp_millis() - b.timestamp_millis();
    let negative = total_ms < 0;
    let (earlier, later) = if negative { (c, b) } else { (b, c) };

    let whole_months = count_whole_months(earlier, later);
    let anchored = shift_months(*earlier, whole_months)
        .ok_or_else(|| "timestamp arithmetic overflow".to_string())?;
    let remainder_ms = later.timestamp_millis() - anchored.timestamp_millis();
    let parts = decompose_ms(remainder_ms);

    let years = whole_months / 12;
    let months = whole_months % 12;
    let body = humanize_units(years, months, &parts);
    let human_readable = if negative {
        format!("-{}", body)
    } else {
        body
    };

    Ok(BreakdownResult {
        base: base.raw().to_string(),
        compare: compare.raw().to_string(),
        years,
        months,
        days: parts.days,
        hours: parts.hours,
        minutes: parts.minutes,
        seconds: parts.seconds,
        milliseconds: parts.milliseconds,
        total_milliseconds: total_ms,
        human_readable,
    })
}

/// Largest m >= 0 such that `earlier` shifted by m clamped months does not
/// pass `later`.
fn count_whole_months(earlier: &DateTime<Tz>, later: &DateTime<Tz>) -> i64 {
    let approx = (later.year() as i64 * 12 + later.month() as i64)
        - (earlier.year() as i64 * 12 + earlier.month() as i64);
    let mut months = approx.max(0);
    while months > 0 {
        if let Some(shifted) = shift_months(*earlier, months) {
            if shifted <= *later {
                break;
            }
        }
        months -= 1;
    }
    months
}

fn median_of_sorted(sorted: &[i64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

fn population_std_dev(values: &[i64], mean: f64) -> f64 {
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

fn render_unix_ms(ms: i64, zone: Tz) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&zone).format(CANONICAL_FORMAT).to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Dispersion statistics over a set of timestamps (stats without compare).
/// The caller guarantees every point resolved; fewer than 2 samples is a
/// validation error.
pub fn timestamp_stats(points: &[TimePoint], zone: Tz) -> TimeMathResult<TimestampStats> {
    let mut ms: Vec<i64> = points.iter().filter_map(TimePoint::unix_ms).collect();
    if ms.len() < 2 {
        return Err(TimeMathError::InsufficientSamples {
            required: 2,
            actual: ms.len(),
        });
    }
    ms.sort_unstable();

    let count = ms.len();
    let earliest = ms[0];
    let latest = ms[count - 1];
    let mean = ms.iter().map(|&v| v as f64).sum::<f64>() / count as f64;
    let median = median_of_sorted(&ms);
    let std_dev_ms = population_std_dev(&ms, mean);

    let intervals: Vec<i64> = ms.windows(2).map(|w| w[1] - w[0]).collect();
    let interval_total: i64 = intervals.iter().sum();
    let interval_min = intervals.iter().copied().min().unwrap_or(0);
    let interval_max = intervals.iter().copied().max().unwrap_or(0);
    let interval_mean = interval_total as f64 / intervals.len() as f64;

    Ok(TimestampStats {
        count,
        earliest: render_unix_ms(earliest, zone),
        latest: render_unix_ms(latest, zone),
        mean: render_unix_ms(mean.round() as i64, zone),
        mean_unix_ms: mean.round() as i64,
        median: render_unix_ms(median.round() as i64, zone),
        median_unix_ms: median.round() as i64,
        std_dev_ms,
        intervals: IntervalStats {
            count: intervals.len(),
            mean_ms: interval_mean,
            min_ms: interval_min,
            max_ms: interval_max,
            total_ms: interval_total,
            total_human: humanize_ms(interval_total),
        },
    })
}

/// Statistics over index-wise `compare - base` millisecond deltas up to the
/// shorter length. Indices where either side failed to resolve are skipped;
/// fewer than 2 usable pairs is a validation error.
pub fn duration_pair_stats(
    base: &[TimePoint],
    compare: &[TimePoint],
) -> TimeMathResult<DurationPairStats> {
    let paired = base.len().min(compare.len());
    let mut deltas = Vec::with_capacity(paired);
    let mut skipped = 0usize;
    for i in 0..paired {
        match (base[i].unix_ms(), compare[i].unix_ms()) {
            (Some(b), Some(c)) => deltas.push(c - b),
            _ => skipped += 1,
        }
    }

    if deltas.len() < 2 {
        return Err(TimeMathError::InsufficientSamples {
            required: 2,
            actual: deltas.len(),
        });
    }

    let mut sorted = deltas.clone();
    sorted.sort_unstable();
    let count = deltas.len();
    let total: i64 = deltas.iter().sum();
    let mean = total as f64 / count as f64;
    let median = median_of_sorted(&sorted);
    let std_dev = population_std_dev(&deltas, mean);

    Ok(DurationPairStats {
        count,
        skipped,
        min: DurationStat::from_ms(sorted[0] as f64),
        max: DurationStat::from_ms(sorted[count - 1] as f64),
        mean: DurationStat::from_ms(mean),
        median: DurationStat::from_ms(median),
        std_dev: DurationStat::from_ms(std_dev),
        total: DurationStat::from_ms(total as f64),
    })
}

/// Stable chronological sort with parallel views and span metadata. The
/// caller guarantees every point resolved; fewer than 2 elements is a
/// validation error.
pub fn sort_timestamps(points: &[TimePoint], zone: Tz) -> TimeMathResult<SortResult> {
    if points.len() < 2 {
        return Err(TimeMathError::InsufficientSamples {
            required: 2,
            actual: points.len(),
        });
    }

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by_key(|&i| points[i].unix_ms().unwrap_or(i64::MIN));

    let sorted_input: Vec<String> = order
        .iter()
        .map(|&i| points[i].raw().to_string())
        .collect();
    let sorted_canonical: Vec<String> = order
        .iter()
        .filter_map(|&i| points[i].canonical())
        .collect();
    let sorted_unix_ms: Vec<i64> = order.iter().filter_map(|&i| points[i].unix_ms()).collect();

    let earliest_ms = sorted_unix_ms.first().copied().unwrap_or(0);
    let latest_ms = sorted_unix_ms.last().copied().unwrap_or(0);
    let span_ms = latest_ms - earliest_ms;

    Ok(SortResult {
        count: points.len(),
        earliest: sorted_canonical.first().cloned().unwrap_or_default(),
        latest: sorted_canonical.last().cloned().unwrap_or_default(),
        sorted_input,
        sorted_canonical,
        sorted_unix_ms,
        span_ms,
        span_human: humanize_ms(span_ms),
        timezone: zone.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timepoint::resolve;
    use crate::core::utils::MS_PER_DAY;

    fn point(s: &str) -> TimePoint {
        resolve(s, None, chrono_tz::UTC)
    }

    fn zoned(s: &str, zone: &str) -> TimePoint {
        resolve(s, Some(zone.parse().unwrap()), chrono_tz::UTC)
    }

    fn spec(
        years: Option<i64>,
        months: Option<i64>,
        days: Option<i64>,
        hours: Option<i64>,
    ) -> DurationSpec {
        DurationSpec {
            years,
            months,
            days,
            hours,
            minutes: None,
            seconds: None,
        }
    }

    #[test]
    fn test_add_hours() {
        let result = apply_duration(&point("2024-01-01T10:00:00Z"), &spec(None, None, None, Some(3)), false)
            .unwrap();
        assert_eq!(result.result, "2024-01-01T13:00:00.000+00:00");
        assert_eq!(result.timezone, "UTC");
    }

    #[test]
    fn test_subtract_negates() {
        let result = apply_duration(&point("2024-01-01T10:00:00Z"), &spec(None, None, Some(1), None), true)
            .unwrap();
        assert_eq!(result.result, "2023-12-31T10:00:00.000+00:00");
    }

    #[test]
    fn test_add_month_clamps_end_of_month() {
        // Jan 31 + 1 month lands on the last day of February
        let result = apply_duration(&point("2024-01-31T12:00:00Z"), &spec(None, Some(1), None, None), false)
            .unwrap();
        assert_eq!(result.result, "2024-02-29T12:00:00.000+00:00");

        let result = apply_duration(&point("2023-01-31T12:00:00Z"), &spec(None, Some(1), None, None), false)
            .unwrap();
        assert_eq!(result.result, "2023-02-28T12:00:00.000+00:00");
    }

    #[test]
    fn test_years_and_months_shift_once() {
        // 1 year + 1 month from Jan 31 is a single 13-month clamped shift
        let result = apply_duration(
            &point("2024-01-31T00:00:00Z"),
            &spec(Some(1), Some(1), None, None),
            false,
        )
        .unwrap();
        assert_eq!(result.result, "2025-02-28T00:00:00.000+00:00");
    }

    #[test]
    fn test_add_month_preserves_wall_clock_across_dst() {
        // Paris enters DST between Mar 15 and Apr 15; local noon is kept
        let result = apply_duration(
            &zoned("2024-03-15T12:00:00", "Europe/Paris"),
            &spec(None, Some(1), None, None),
            false,
        )
        .unwrap();
        assert_eq!(result.result, "2024-04-15T12:00:00.000+02:00");
    }

    #[test]
    fn test_add_day_is_exact_across_dst() {
        // One day is exactly 24h of absolute time, so the wall clock lands
        // an hour later after the spring-forward transition
        let result = apply_duration(
            &zoned("2024-03-30T12:00:00", "Europe/Paris"),
            &spec(None, None, Some(1), None),
            false,
        )
        .unwrap();
        assert_eq!(result.result, "2024-03-31T13:00:00.000+02:00");
    }

    #[test]
    fn test_apply_duration_invalid_point() {
        let err = apply_duration(&point("garbage"), &spec(None, None, Some(1), None), false)
            .unwrap_err();
        assert!(err.contains("unrecognized"));
    }

    #[test]
    fn test_apply_duration_overflow() {
        let err = apply_duration(
            &point("2024-01-01T00:00:00Z"),
            &spec(None, None, Some(i64::MAX / 2), None),
            false,
        )
        .unwrap_err();
        assert!(err.contains("overflow"));
    }

    #[test]
    fn test_diff_two_hours() {
        let result = diff(&point("2024-01-01T10:00:00Z"), &point("2024-01-01T12:00:00Z")).unwrap();
        assert_eq!(result.days, 0);
        assert_eq!(result.hours, 2);
        assert_eq!(result.minutes, 0);
        assert_eq!(result.total_milliseconds, 7_200_000);
    }

    #[test]
    fn test_diff_sign_consistency() {
        let a = point("2024-01-01T10:00:00Z");
        let b = point("2024-03-05T23:45:12Z");
        let forward = diff(&a, &b).unwrap();
        let backward = diff(&b, &a).unwrap();
        assert_eq!(forward.total_milliseconds, -backward.total_milliseconds);
        // Magnitude components match in both directions
        assert_eq!(forward.days, backward.days);
        assert_eq!(forward.hours, backward.hours);
    }

    #[test]
    fn test_diff_cascades_remainders() {
        let result = diff(
            &point("2024-01-01T00:00:00Z"),
            &point("2024-01-03T04:05:06.789Z"),
        )
        .unwrap();
        assert_eq!(result.days, 2);
        assert_eq!(result.hours, 4);
        assert_eq!(result.minutes, 5);
        assert_eq!(result.seconds, 6);
        assert_eq!(result.milliseconds, 789);
    }

    #[test]
    fn test_duration_between_whole_months() {
        let result = duration_between(
            &point("2023-01-15T00:00:00Z"),
            &point("2024-03-20T06:30:00Z"),
        )
        .unwrap();
        assert_eq!(result.years, 1);
        assert_eq!(result.months, 2);
        assert_eq!(result.days, 5);
        assert_eq!(result.hours, 6);
        assert_eq!(result.minutes, 30);
        assert_eq!(
            result.human_readable,
            "1 year, 2 months, 5 days, 6 hours, 30 minutes"
        );
    }

    #[test]
    fn test_duration_between_round_trip() {
        let base = point("2023-01-31T10:00:00Z");
        let compare = point("2024-03-15T14:30:45.123Z");
        let breakdown = duration_between(&base, &compare).unwrap();

        // Reconstructing compare from base plus the breakdown units must be
        // exact: one clamped month shift, then the remainder as a duration
        let reconstructed = shift_months(
            *base.instant().unwrap(),
            breakdown.years * 12 + breakdown.months,
        )
        .unwrap()
        .checked_add_signed(
            Duration::try_days(breakdown.days).unwrap()
                + Duration::try_hours(breakdown.hours).unwrap()
                + Duration::try_minutes(breakdown.minutes).unwrap()
                + Duration::try_seconds(breakdown.seconds).unwrap()
                + Duration::try_milliseconds(breakdown.milliseconds).unwrap(),
        )
        .unwrap();

        assert_eq!(
            reconstructed.timestamp_millis(),
            compare.instant().unwrap().timestamp_millis()
        );
    }

    #[test]
    fn test_duration_between_negative() {
        let result = duration_between(
            &point("2024-03-01T00:00:00Z"),
            &point("2024-01-01T00:00:00Z"),
        )
        .unwrap();
        assert!(result.total_milliseconds < 0);
        assert_eq!(result.months, 2);
        assert!(result.human_readable.starts_with('-'));
    }

    #[test]
    fn test_duration_between_zero() {
        let result = duration_between(
            &point("2024-01-01T00:00:00Z"),
            &point("2024-01-01T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(result.human_readable, "0 milliseconds");
    }

    #[test]
    fn test_timestamp_stats_basic() {
        let points = vec![
            point("2024-01-01T00:00:00Z"),
            point("2024-01-03T00:00:00Z"),
            point("2024-01-08T00:00:00Z"),
        ];
        let stats = timestamp_stats(&points, chrono_tz::UTC).unwrap();
        assert_eq!(stats.count, 3);
        assert!(stats.earliest.starts_with("2024-01-01"));
        assert!(stats.latest.starts_with("2024-01-08"));
        // Median of an odd count is the middle element
        assert!(stats.median.starts_with("2024-01-03"));
        assert_eq!(stats.intervals.count, 2);
        assert_eq!(stats.intervals.min_ms, 2 * MS_PER_DAY);
        assert_eq!(stats.intervals.max_ms, 5 * MS_PER_DAY);
        assert_eq!(stats.intervals.total_ms, 7 * MS_PER_DAY);
    }

    #[test]
    fn test_timestamp_stats_even_median_averages() {
        let points = vec![
            point("2024-01-01T00:00:00Z"),
            point("2024-01-02T00:00:00Z"),
            point("2024-01-04T00:00:00Z"),
            point("2024-01-05T00:00:00Z"),
        ];
        let stats = timestamp_stats(&points, chrono_tz::UTC).unwrap();
        // Average of Jan 2 and Jan 4 is Jan 3
        assert!(stats.median.starts_with("2024-01-03"));
    }

    #[test]
    fn test_timestamp_stats_requires_two() {
        let points = vec![point("2024-01-01T00:00:00Z")];
        let err = timestamp_stats(&points, chrono_tz::UTC).unwrap_err();
        assert!(matches!(
            err,
            TimeMathError::InsufficientSamples {
                required: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_duration_pair_stats_week_ladder() {
        let base = vec![
            point("2024-01-01T00:00:00Z"),
            point("2024-01-01T00:00:00Z"),
            point("2024-01-01T00:00:00Z"),
        ];
        let compare = vec![
            point("2024-01-08T00:00:00Z"),
            point("2024-01-15T00:00:00Z"),
            point("2024-01-22T00:00:00Z"),
        ];
        let stats = duration_pair_stats(&base, &compare).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min.milliseconds, 604_800_000.0);
        assert_eq!(stats.max.milliseconds, 1_814_400_000.0);
        assert_eq!(stats.mean.milliseconds, 1_209_600_000.0);
        assert_eq!(stats.median.milliseconds, 1_209_600_000.0);
        assert_eq!(stats.min.human_readable, "7 days");
        assert_eq!(stats.max.human_readable, "21 days");
        assert_eq!(stats.mean.human_readable, "14 days");
        assert_eq!(stats.median.human_readable, "14 days");
    }

    #[test]
    fn test_duration_pair_stats_skips_invalid_sides() {
        let base = vec![
            point("2024-01-01T00:00:00Z"),
            point("bad"),
            point("2024-01-01T00:00:00Z"),
        ];
        let compare = vec![
            point("2024-01-02T00:00:00Z"),
            point("2024-01-02T00:00:00Z"),
            point("2024-01-03T00:00:00Z"),
        ];
        let stats = duration_pair_stats(&base, &compare).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_duration_pair_stats_negative_human() {
        let base = vec![
            point("2024-01-05T00:00:00Z"),
            point("2024-01-06T00:00:00Z"),
        ];
        let compare = vec![
            point("2024-01-04T00:00:00Z"),
            point("2024-01-05T00:00:00Z"),
        ];
        let stats = duration_pair_stats(&base, &compare).unwrap();
        assert_eq!(stats.total.milliseconds, -2.0 * MS_PER_DAY as f64);
        assert_eq!(stats.total.human_readable, "-2 days");
    }

    #[test]
    fn test_sort_orders_all_views_chronologically() {
        let points = vec![
            point("2024-03-15T10:30:00Z"),
            point("2024-01-01T08:00:00Z"),
            point("2024-02-14T14:45:00Z"),
        ];
        let result = sort_timestamps(&points, chrono_tz::UTC).unwrap();
        assert_eq!(
            result.sorted_input,
            vec![
                "2024-01-01T08:00:00Z".to_string(),
                "2024-02-14T14:45:00Z".to_string(),
                "2024-03-15T10:30:00Z".to_string(),
            ]
        );
        assert!(result.sorted_canonical[0].starts_with("2024-01-01T08:00:00"));
        assert!(result.earliest.starts_with("2024-01-01T08:00:00"));
        assert!(result.latest.starts_with("2024-03-15T10:30:00"));
        assert!(
            result.sorted_unix_ms.windows(2).all(|w| w[0] <= w[1]),
            "millisecond view must be ordered"
        );
        assert_eq!(
            result.span_ms,
            points[0].unix_ms().unwrap() - points[1].unix_ms().unwrap()
        );
    }

    #[test]
    fn test_sort_is_stable_for_equal_instants() {
        let points = vec![
            point("2024-01-02T00:00:00Z"),
            point("2024-01-01T00:00:00+00:00"),
            point("2024-01-01T00:00:00Z"),
        ];
        let result = sort_timestamps(&points, chrono_tz::UTC).unwrap();
        assert_eq!(result.sorted_input[0], "2024-01-01T00:00:00+00:00");
        assert_eq!(result.sorted_input[1], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_sort_requires_two() {
        let points = vec![point("2024-01-01T00:00:00Z")];
        let err = sort_timestamps(&points, chrono_tz::UTC).unwrap_err();
        assert!(matches!(err, TimeMathError::InsufficientSamples { .. }));
    }
}
