use rmcp::schemars;
use serde::{Deserialize, Serialize};

use crate::core::error::{TimeMathError, TimeMathResult};

/// Hard ceiling on units of work in a single request.
pub const MAX_OPERATIONS: usize = 10_000;

/// How the base and compare sequences pair up.
///
/// `AutoDetect` is a meta-value resolved against observed cardinalities
/// before planning; every `OperationPlan` carries a concrete mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    SingleToSingle,
    SingleToMany,
    ManyToSingle,
    Pairwise,
    CrossProduct,
    Aggregate,
    AutoDetect,
}

impl InteractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionMode::SingleToSingle => "single_to_single",
            InteractionMode::SingleToMany => "single_to_many",
            InteractionMode::ManyToSingle => "many_to_single",
            InteractionMode::Pairwise => "pairwise",
            InteractionMode::CrossProduct => "cross_product",
            InteractionMode::Aggregate => "aggregate",
            InteractionMode::AutoDetect => "auto_detect",
        }
    }
}

/// The resolved shape of one batch: concrete mode, unit-of-work count, and
/// the sequences the runner will consume. Built once per request; immutable.
#[derive(Debug, Clone)]
pub struct OperationPlan {
    pub mode: InteractionMode,
    pub op_count: usize,
    pub base: Vec<String>,
    pub compare: Option<Vec<String>>,
}

/// Resolve `auto_detect` against observed cardinalities.
pub fn detect_mode(base_len: usize, compare_len: usize) -> InteractionMode {
    match (base_len, compare_len) {
        (0..=1, 0..=1) => InteractionMode::SingleToSingle,
        (1, _) => InteractionMode::SingleToMany,
        (_, 0..=1) => InteractionMode::ManyToSingle,
        _ => InteractionMode::Pairwise,
    }
}

/// Validate mode-specific cardinality preconditions and produce the request's
/// `OperationPlan`. Pairwise and aggregate plans truncate both sequences to
/// the shorter length; unmatched trailing elements are dropped silently.
pub fn build_plan(
    requested: InteractionMode,
    mut base: Vec<String>,
    mut compare: Option<Vec<String>>,
) -> TimeMathResult<OperationPlan> {
    let base_len = base.len();
    let compare_len = compare.as_ref().map_or(0, Vec::len);

    let mode = match requested {
        InteractionMode::AutoDetect => detect_mode(base_len, compare_len),
        explicit => explicit,
    };

    let op_count = match mode {
        InteractionMode::SingleToSingle => 1,
        InteractionMode::SingleToMany => {
            if base_len != 1 || compare_len <= 1 {
                return Err(TimeMathError::CardinalityMismatch {
                    mode: mode.as_str().to_string(),
                    message: format!(
                        "requires exactly 1 base and more than 1 compare, got {} and {}",
                        base_len, compare_len
                    ),
                });
            }
            compare_len
        }
        InteractionMode::ManyToSingle => {
            if base_len <= 1 || compare_len != 1 {
                return Err(TimeMathError::CardinalityMismatch {
                    mode: mode.as_str().to_string(),
                    message: format!(
                        "requires more than 1 base and exactly 1 compare, got {} and {}",
                        base_len, compare_len
                    ),
                });
            }
            base_len
        }
        InteractionMode::Pairwise | InteractionMode::Aggregate => {
            if base_len == 0 || compare_len == 0 {
                return Err(TimeMathError::CardinalityMismatch {
                    mode: mode.as_str().to_string(),
                    message: "requires non-empty base and compare sequences".to_string(),
                });
            }
            let effective = base_len.min(compare_len);
            base.truncate(effective);
            if let Some(compare) = compare.as_mut() {
                compare.truncate(effective);
            }
            effective
        }
        InteractionMode::CrossProduct => {
            if base_len == 0 || compare_len == 0 {
                return Err(TimeMathError::CardinalityMismatch {
                    mode: mode.as_str().to_string(),
                    message: "requires non-empty base and compare sequences".to_string(),
                });
            }
            base_len.saturating_mul(compare_len)
        }
        InteractionMode::AutoDetect => unreachable!("auto_detect resolves before planning"),
    };

    if op_count > MAX_OPERATIONS {
        return Err(TimeMathError::OperationCountExceeded {
            requested: op_count,
            limit: MAX_OPERATIONS,
        });
    }

    Ok(OperationPlan {
        mode,
        op_count,
        base,
        compare,
    })
}
