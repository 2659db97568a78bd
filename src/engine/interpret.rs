// src/engine/interpret.rs

//! Output interpreter.
//!
//! The evaluator prints one JSON document on stdout:
//!
//! ```json
//! { "success": true, "results": { "hellaswag": { "acc": 0.42 } } }
//! { "success": false, "error": "timeout contacting endpoint" }
//! ```
//!
//! A process can exit 0 and still report failure in-band, so the document
//! is checked even when the exit code is clean.

use serde_json::Value;

use crate::engine::FailureKind;

const UNKNOWN_ERROR: &str = "Unknown error";

/// Verdict derived from the evaluator's stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Success { payload: Value },
    Failure { kind: FailureKind, reason: String },
}

/// Parse `raw_stdout` and decide whether the evaluation succeeded.
///
/// `excerpt_chars` bounds how much raw output is quoted when parsing fails.
pub fn interpret(raw_stdout: &str, excerpt_chars: usize) -> Interpretation {
    let document: Value = match serde_json::from_str(raw_stdout.trim()) {
        Ok(doc) => doc,
        Err(err) => {
            return Interpretation::Failure {
                kind: FailureKind::MalformedOutput,
                reason: format!(
                    "Failed to parse results: {err}\nOutput: {}",
                    excerpt(raw_stdout, excerpt_chars)
                ),
            };
        }
    };

    let success = document
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match document.get("results") {
        Some(results) if success && !results.is_null() => Interpretation::Success {
            payload: results.clone(),
        },
        _ => Interpretation::Failure {
            kind: FailureKind::InBandEvaluationFailure,
            reason: in_band_error(&document),
        },
    }
}

fn in_band_error(document: &Value) -> String {
    match document.get("error") {
        None | Some(Value::Null) => UNKNOWN_ERROR.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => UNKNOWN_ERROR.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// First `max_chars` characters of `text`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
