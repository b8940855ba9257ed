// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Structured view of an archiver record's `error` payload.
///
/// Parsing is lenient per field: an unparseable field is skipped (dates
/// degrade to the verbatim string under `extra`), the rest of the payload is
/// kept, and a report is never aborted for one bad record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchivalDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_count: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

const FIRST_FAILURE: &str = "first_failure";
const LAST_SUCCESS: &str = "last_success";
const FAILURE_COUNT: &str = "failure_count";

impl ArchivalDetails {
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        let mut details = Self::default();
        if raw.trim().is_empty() {
            return details;
        }
        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(raw) else {
            return details;
        };
        for (key, value) in fields {
            match key.as_str() {
                FIRST_FAILURE | LAST_SUCCESS => {
                    let text = json_scalar_text(&value);
                    match text.as_deref().and_then(parse_timestamp_lenient) {
                        Some(ts) if key == FIRST_FAILURE => details.first_failure = Some(ts),
                        Some(ts) => details.last_success = Some(ts),
                        None => {
                            if let Some(text) = text {
                                if !text.is_empty() {
                                    details.extra.insert(key, text);
                                }
                            }
                        }
                    }
                }
                FAILURE_COUNT => match json_count(&value) {
                    Some(count) => details.failure_count = Some(count),
                    None => {
                        if let Some(text) = json_scalar_text(&value) {
                            details.extra.insert(key, text);
                        }
                    }
                },
                _ => {
                    if let Some(text) = json_scalar_text(&value) {
                        details.extra.insert(key, text);
                    } else {
                        details.extra.insert(key, value.to_string());
                    }
                }
            }
        }
        details
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_failure.is_none()
            && self.last_success.is_none()
            && self.failure_count.is_none()
            && self.extra.is_empty()
    }
}

fn json_scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn json_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Accepts RFC 3339 and the archiver's legacy `YYYY-MM-DD HH:MM:SS[.ffffff]`
/// shape, which is tolerated by splitting on non-digit runs.
fn parse_timestamp_lenient(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }
    let mut parts = trimmed
        .split(|c: char| !c.is_ascii_digit())
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u32>().ok());
    let year = parts.next().flatten()?;
    let month = parts.next().flatten()?;
    let day = parts.next().flatten()?;
    let hour = parts.next().flatten().unwrap_or(0);
    let minute = parts.next().flatten().unwrap_or(0);
    let second = parts.next().flatten().unwrap_or(0);
    let date = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?;
    let time = date.and_hms_opt(hour, minute, second)?;
    Some(DateTime::from_naive_utc_and_offset(time, Utc))
}
