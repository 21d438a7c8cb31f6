use std::str::FromStr;

use rmcp::schemars;
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::error::TimeMathError;
use crate::core::normalize::OneOrMany;
use crate::core::plan::InteractionMode;
use crate::core::utils::humanize_ms;

/// Helper function to deserialize and trim strings
fn deserialize_trimmed_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(s.trim().to_string())
}

/// Helper function to deserialize and trim optional strings
fn deserialize_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    Ok(s.map(|s| s.trim().to_string()))
}

/// The time-arithmetic operations the engine dispatches on.
///
/// Parsed from the raw request string so unknown names are rejected with a
/// typed error even when schema validation was bypassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Diff,
    DurationBetween,
    Stats,
    Sort,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Diff => "diff",
            Operation::DurationBetween => "duration_between",
            Operation::Stats => "stats",
            Operation::Sort => "sort",
        }
    }

    /// Pairing operations that cannot run without a compare sequence.
    pub fn requires_compare(&self) -> bool {
        matches!(self, Operation::Diff | Operation::DurationBetween)
    }
}

impl FromStr for Operation {
    type Err = TimeMathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Operation::Add),
            "subtract" => Ok(Operation::Subtract),
            "diff" => Ok(Operation::Diff),
            "duration_between" => Ok(Operation::DurationBetween),
            "stats" => Ok(Operation::Stats),
            "sort" => Ok(Operation::Sort),
            other => Err(TimeMathError::InvalidArguments {
                message: format!(
                    "unknown operation '{}'; expected one of add, subtract, diff, duration_between, stats, sort",
                    other
                ),
            }),
        }
    }
}

/// Sparse signed calendar duration; absent units contribute nothing.
///
/// An entirely empty spec is a validation error for add/subtract, never a
/// no-op.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DurationSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub months: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<i64>,
}

impl DurationSpec {
    pub fn is_empty(&self) -> bool {
        self.years.is_none()
            && self.months.is_none()
            && self.days.is_none()
            && self.hours.is_none()
            && self.minutes.is_none()
            && self.seconds.is_none()
    }

    /// Years and months collapsed into one month count so the end-of-month
    /// clamp is applied exactly once.
    pub fn total_months(&self) -> i64 {
        self.years.unwrap_or(0).saturating_mul(12) + self.months.unwrap_or(0)
    }
}

/// Arguments for the `time_math` tool.
#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct TimeMathRequest {
    /// Operation name: add, subtract, diff, duration_between, stats, sort
    #[serde(deserialize_with = "deserialize_trimmed_string")]
    pub operation: String,
    /// How base and compare sequences pair up (defaults to auto_detect)
    #[serde(default)]
    pub interaction_mode: Option<InteractionMode>,
    /// Base timestamp(s); defaults to the current instant when absent
    #[serde(default)]
    pub base_time: Option<OneOrMany>,
    /// Compare timestamp(s) for pairing operations
    #[serde(default)]
    pub compare_time: Option<OneOrMany>,
    /// IANA timezone for interpreting zone-less inputs and rendering results
    #[serde(default, deserialize_with = "deserialize_trimmed_opt")]
    pub timezone: Option<String>,
    /// Overrides `timezone` for the compare sequence
    #[serde(default, deserialize_with = "deserialize_trimmed_opt")]
    pub compare_time_timezone: Option<String>,
    /// Signed years for add/subtract
    #[serde(default)]
    pub years: Option<i64>,
    /// Signed months for add/subtract
    #[serde(default)]
    pub months: Option<i64>,
    /// Signed days for add/subtract
    #[serde(default)]
    pub days: Option<i64>,
    /// Signed hours for add/subtract
    #[serde(default)]
    pub hours: Option<i64>,
    /// Signed minutes for add/subtract
    #[serde(default)]
    pub minutes: Option<i64>,
    /// Signed seconds for add/subtract
    #[serde(default)]
    pub seconds: Option<i64>,
}

impl TimeMathRequest {
    pub fn duration_spec(&self) -> DurationSpec {
        DurationSpec {
            years: self.years,
            months: self.months,
            days: self.days,
            hours: self.hours,
            minutes: self.minutes,
            seconds: self.seconds,
        }
    }
}

/// One add/subtract application.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ShiftResult {
    /// Input timestamp as received
    pub input: String,
    /// Shifted timestamp, canonical form in the display zone
    pub result: String,
    /// IANA zone the result is rendered in
    pub timezone: String,
    /// Result instant in unix milliseconds
    pub unix_ms: i64,
}

/// Cascading day/time difference between one base/compare pair.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct DiffResult {
    pub base: String,
    pub compare: String,
    /// Whole days of the magnitude
    pub days: i64,
    /// Remaining hours after days
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub milliseconds: i64,
    /// Exact signed delta, compare minus base
    pub total_milliseconds: i64,
}

/// Calendar-aware breakdown between one base/compare pair, including whole
/// years and months.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct BreakdownResult {
    pub base: String,
    pub compare: String,
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub milliseconds: i64,
    /// Exact signed delta, compare minus base
    pub total_milliseconds: i64,
    /// Non-zero units in descending order, e.g. "1 year, 2 months, 5 days"
    pub human_readable: String,
}

/// First-difference intervals between chronologically sorted points.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct IntervalStats {
    pub count: usize,
    pub mean_ms: f64,
    pub min_ms: i64,
    pub max_ms: i64,
    /// Sum of all intervals; equals latest minus earliest
    pub total_ms: i64,
    pub total_human: String,
}

/// Dispersion summary over a set of timestamps (stats without compare).
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct TimestampStats {
    pub count: usize,
    pub earliest: String,
    pub latest: String,
    /// Arithmetic mean instant
    pub mean: String,
    pub mean_unix_ms: i64,
    /// Median instant; average of the two middle values for even counts
    pub median: String,
    pub median_unix_ms: i64,
    /// Population standard deviation of the instants, in milliseconds
    pub std_dev_ms: f64,
    pub intervals: IntervalStats,
}

/// One summarized statistic over paired durations.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct DurationStat {
    pub milliseconds: f64,
    pub human_readable: String,
}

impl DurationStat {
    pub fn from_ms(ms: f64) -> Self {
        Self {
            milliseconds: ms,
            human_readable: humanize_ms(ms.round() as i64),
        }
    }
}

/// Statistics over index-wise `compare - base` durations (stats with
/// compare, and the `aggregate` interaction mode).
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct DurationPairStats {
    /// Number of pairs that produced a delta
    pub count: usize,
    /// Indices dropped because either side failed to resolve
    pub skipped: usize,
    pub min: DurationStat,
    pub max: DurationStat,
    pub mean: DurationStat,
    pub median: DurationStat,
    pub std_dev: DurationStat,
    pub total: DurationStat,
}

/// Stable chronological ordering with parallel views and span metadata.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SortResult {
    pub count: usize,
    /// Input strings as received, rearranged chronologically
    pub sorted_input: Vec<String>,
    /// Canonical renderings, rearranged chronologically
    pub sorted_canonical: Vec<String>,
    /// Unix milliseconds, rearranged chronologically
    pub sorted_unix_ms: Vec<i64>,
    pub earliest: String,
    pub latest: String,
    pub span_ms: i64,
    pub span_human: String,
    /// IANA zone used to interpret zone-less inputs
    pub timezone: String,
}

/// Operation-specific success payload for one unit of work.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ItemPayload {
    Shift(ShiftResult),
    Diff(DiffResult),
    Breakdown(BreakdownResult),
    TimestampStats(TimestampStats),
    DurationPairStats(DurationPairStats),
    Sort(SortResult),
}

/// Per-index failure record; sibling items are unaffected.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemError {
    pub index: usize,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_time: Option<String>,
}

/// One slot of a batch: success payload or a captured failure.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Success(ItemPayload),
    Failure(BatchItemError),
}

/// Always-attached request echo and resolution metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMeta {
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_time: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_time: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_duration: Option<DurationSpec>,
    /// Resolved zone for the base sequence
    pub timezone: String,
    /// Resolved zone for the compare sequence, when one was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_time_timezone: Option<String>,
}

/// Verbose block attached only when the debug flag is enabled.
#[derive(Debug, Clone, Serialize)]
pub struct DebugMeta {
    /// Wall-clock instant captured at request entry
    pub computed_at: String,
    pub resolution_timezone: String,
}

/// Single results are unwrapped to the bare payload; batches carry a
/// count/results envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Single(ItemPayload),
    Batch {
        count: usize,
        interaction_mode: InteractionMode,
        results: Vec<BatchItem>,
    },
}

/// The engine's structured result.
#[derive(Debug, Clone, Serialize)]
pub struct TimeMathResponse {
    #[serde(flatten)]
    pub body: ResponseBody,
    pub meta: ResponseMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugMeta>,
}
