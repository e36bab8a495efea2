//! Description and transcript extraction from analyzer artifacts.
//!
//! Both analyzers are read through the same contract. Keys are tried in
//! priority order and the first non-empty one wins:
//! `final_description`, `video_description`, `analysis.description`, `description`.
//! A value is either a string or an object carrying a `response` string.
//! Anything else is `MalformedOutput`.

use crate::error::AnalyzeError;
use serde_json::Value;

/// Description keys, highest priority first; dotted keys descend into objects
pub const DESCRIPTION_KEYS: &[&str] = &[
    "final_description",
    "video_description",
    "analysis.description",
    "description",
];

/// What the batch driver keeps from an artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedAnalysis {
    pub description: String,
    pub transcript: Option<String>,
}

pub fn extract(artifact: &Value) -> Result<ExtractedAnalysis, AnalyzeError> {
    if !artifact.is_object() {
        return Err(AnalyzeError::MalformedOutput(
            "analysis artifact is not a JSON object".to_string(),
        ));
    }

    if let Some(error) = artifact.get("error").and_then(Value::as_str) {
        return Err(AnalyzeError::MalformedOutput(format!(
            "analyzer reported an error: {}",
            error
        )));
    }

    Ok(ExtractedAnalysis {
        description: extract_description(artifact)?,
        transcript: extract_transcript(artifact)?,
    })
}

pub fn extract_description(artifact: &Value) -> Result<String, AnalyzeError> {
    for key in DESCRIPTION_KEYS {
        let Some(value) = lookup(artifact, key) else {
            continue;
        };
        if is_empty_value(value) {
            continue;
        }
        return description_text(key, value);
    }

    Err(AnalyzeError::MalformedOutput(format!(
        "no description found (tried {})",
        DESCRIPTION_KEYS.join(", ")
    )))
}

/// `transcript` as a string or `{ "text": ... }`; absent or empty is `None`
pub fn extract_transcript(artifact: &Value) -> Result<Option<String>, AnalyzeError> {
    match artifact.get("transcript") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(non_empty(text)),
        Some(Value::Object(map)) => match map.get("text") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(non_empty(text)),
            Some(other) => Err(AnalyzeError::MalformedOutput(format!(
                "transcript.text must be a string, got {}",
                type_name(other)
            ))),
        },
        Some(other) => Err(AnalyzeError::MalformedOutput(format!(
            "transcript must be a string or object, got {}",
            type_name(other)
        ))),
    }
}

fn lookup<'a>(artifact: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .try_fold(artifact, |node, part| node.get(part))
}

fn description_text(key: &str, value: &Value) -> Result<String, AnalyzeError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Object(map) => match map.get("response") {
            Some(Value::String(text)) if !text.is_empty() => Ok(text.clone()),
            _ => Err(AnalyzeError::MalformedOutput(format!(
                "{} has no non-empty 'response' string",
                key
            ))),
        },
        other => Err(AnalyzeError::MalformedOutput(format!(
            "{} must be a string or object, got {}",
            key,
            type_name(other)
        ))),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
