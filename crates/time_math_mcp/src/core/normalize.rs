use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rmcp::schemars;
use serde::{Deserialize, Serialize};

use crate::core::utils::CANONICAL_FORMAT;

/// A field that accepts either a single timestamp string or an array of them.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Canonical rendering of the captured request instant in `zone`.
pub fn render_now(now: DateTime<Utc>, zone: Tz) -> String {
    now.with_timezone(&zone).format(CANONICAL_FORMAT).to_string()
}

/// Coerce a single-or-array field into a non-empty ordered sequence.
///
/// Absent fields (and empty arrays) default to one element: the captured
/// request instant rendered canonically. A lone string that is itself a JSON
/// array literal is expanded into its elements, so callers restricted to flat
/// string parameters keep full batch capability. Timestamp validity is
/// deferred entirely to the resolver; this never fails.
pub fn normalize(field: Option<&OneOrMany>, now: DateTime<Utc>, zone: Tz) -> Vec<String> {
    let values = match field {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => {
            expand_array_literal(s).unwrap_or_else(|| vec![s.clone()])
        }
        Some(OneOrMany::Many(items)) => items.clone(),
    };

    if values.is_empty() {
        vec![render_now(now, zone)]
    } else {
        values
    }
}

/// Parse `s` as a JSON array of strings, if it syntactically is one.
fn expand_array_literal(s: &str) -> Option<Vec<String>> {
    let trimmed = s.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    let items = value.as_array()?;
    items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}
