use rmcp::ErrorData as McpError;
use rmcp::serde_json::json;

// Error codes
const ERROR_INVALID_ARGUMENTS: &str = "invalid_arguments";
const ERROR_INVALID_TIMESTAMP: &str = "invalid_timestamp";
const ERROR_INVALID_TIMEZONE: &str = "invalid_timezone";
const ERROR_EMPTY_DURATION: &str = "empty_duration";
const ERROR_MISSING_COMPARE_TIME: &str = "missing_compare_time";
const ERROR_CARDINALITY_MISMATCH: &str = "cardinality_mismatch";
const ERROR_OPERATION_COUNT_EXCEEDED: &str = "operation_count_exceeded";
const ERROR_INSUFFICIENT_SAMPLES: &str = "insufficient_samples";
const ERROR_RESOURCE_NOT_FOUND: &str = "resource_not_found";

/// Custom error types for better error handling
#[derive(Debug, thiserror::Error)]
pub enum TimeMathError {
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },
    #[error("Invalid timestamp: {timestamp}")]
    InvalidTimestamp { timestamp: String },
    #[error("Invalid timezone: {timezone}")]
    InvalidTimezone { timezone: String },
    #[error(
        "add/subtract requires at least one duration unit (years, months, days, hours, minutes, seconds)"
    )]
    EmptyDuration,
    #[error("Operation '{operation}' requires compare_time")]
    MissingCompareTime { operation: String },
    #[error("Cardinality mismatch for mode '{mode}': {message}")]
    CardinalityMismatch { mode: String, message: String },
    #[error("Operation count {requested} exceeds the maximum of {limit}")]
    OperationCountExceeded { requested: usize, limit: usize },
    #[error("At least {required} samples are required, got {actual}")]
    InsufficientSamples { required: usize, actual: usize },
    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },
}

impl From<TimeMathError> for McpError {
    fn from(err: TimeMathError) -> Self {
        match err {
            TimeMathError::InvalidArguments { message } => {
                McpError::invalid_params(ERROR_INVALID_ARGUMENTS, Some(json!({"message": message})))
            }
            TimeMathError::InvalidTimestamp { timestamp } => McpError::invalid_params(
                ERROR_INVALID_TIMESTAMP,
                Some(json!({"timestamp": timestamp})),
            ),
            TimeMathError::InvalidTimezone { timezone } => McpError::invalid_params(
                ERROR_INVALID_TIMEZONE,
                Some(json!({"timezone": timezone})),
            ),
            TimeMathError::EmptyDuration => McpError::invalid_params(
                ERROR_EMPTY_DURATION,
                Some(json!({
                    "valid_units": ["years", "months", "days", "hours", "minutes", "seconds"]
                })),
            ),
            TimeMathError::MissingCompareTime { operation } => McpError::invalid_params(
                ERROR_MISSING_COMPARE_TIME,
                Some(json!({"operation": operation})),
            ),
            TimeMathError::CardinalityMismatch { mode, message } => McpError::invalid_params(
                ERROR_CARDINALITY_MISMATCH,
                Some(json!({"mode": mode, "message": message})),
            ),
            TimeMathError::OperationCountExceeded { requested, limit } => McpError::invalid_params(
                ERROR_OPERATION_COUNT_EXCEEDED,
                Some(json!({"requested": requested, "limit": limit})),
            ),
            TimeMathError::InsufficientSamples { required, actual } => McpError::invalid_params(
                ERROR_INSUFFICIENT_SAMPLES,
                Some(json!({"required": required, "actual": actual})),
            ),
            TimeMathError::ResourceNotFound { uri } => McpError::resource_not_found(
                ERROR_RESOURCE_NOT_FOUND,
                Some(json!({
                    "uri": uri,
                    "available_resources": crate::server::AVAILABLE_RESOURCES
                })),
            ),
        }
    }
}

pub type TimeMathResult<T> = Result<T, TimeMathError>;
pub type McpResult<T> = Result<T, McpError>;
