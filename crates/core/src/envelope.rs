//! Response envelope normalization.
//!
//! The API answers list endpoints in three shapes: a bare array,
//! `{ "success": true, "data": [...] }`, or the paginated
//! `{ "success": true, "data": { "data": [...], "total": .. } }`.
//! Anything else normalizes to an empty list; nothing here returns an error.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::FieldErrors;

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Bare(Vec<Value>),
    Wrapped(Vec<Value>),
    Paginated(Vec<Value>),
    Malformed,
}

impl Envelope {
    pub fn classify(raw: Value) -> Self {
        match raw {
            Value::Array(items) => Envelope::Bare(items),
            Value::Object(mut map) => {
                let succeeded = matches!(map.get("success"), Some(Value::Bool(true)));
                match map.remove("data") {
                    Some(Value::Array(items)) if succeeded => Envelope::Wrapped(items),
                    Some(Value::Object(mut page)) if succeeded => match page.remove("data") {
                        Some(Value::Array(items)) => Envelope::Paginated(items),
                        _ => Envelope::Malformed,
                    },
                    _ => Envelope::Malformed,
                }
            }
            _ => Envelope::Malformed,
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            Envelope::Bare(items) | Envelope::Wrapped(items) | Envelope::Paginated(items) => items,
            Envelope::Malformed => Vec::new(),
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Envelope::Bare(_) => "bare",
            Envelope::Wrapped(_) => "wrapped",
            Envelope::Paginated(_) => "paginated",
            Envelope::Malformed => "malformed",
        }
    }
}

/// Flatten any envelope into a list of entities. Items that fail to decode are skipped.
pub fn normalize<T: DeserializeOwned>(raw: Value) -> Vec<T> {
    let envelope = Envelope::classify(raw);
    let shape = envelope.shape();
    let items = envelope.into_items();
    let total = items.len();

    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(error = %err, "skipping undecodable entity in response");
                None
            }
        })
        .collect();

    tracing::debug!(shape, total, kept = decoded.len(), "normalized response envelope");
    decoded
}

/// Extract a single entity from `{ "success": true, "data": {...} }` or a bare object.
pub fn normalize_one<T: DeserializeOwned>(raw: Value) -> Option<T> {
    let candidate = match raw {
        Value::Object(mut map) => match map.remove("data") {
            Some(data @ Value::Object(_)) => data,
            Some(_) => return None,
            None if map.contains_key("success") => return None,
            None => Value::Object(map),
        },
        _ => return None,
    };

    serde_json::from_value(candidate)
        .map_err(|err| tracing::warn!(error = %err, "response entity did not decode"))
        .ok()
}

/// Error details carried by a failed response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
    pub errors: FieldErrors,
}

impl ErrorBody {
    pub fn parse(raw: &Value) -> Self {
        let text = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let errors = raw
            .get("errors")
            .and_then(Value::as_object)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(field, messages)| (field.clone(), field_messages(messages)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            message: text("message"),
            error: text("error"),
            errors,
        }
    }

    /// First message of the first field that reported one.
    pub fn first_field_error(&self) -> Option<&str> {
        self.errors
            .values()
            .find_map(|messages| messages.first())
            .map(String::as_str)
    }
}

fn field_messages(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(single) => vec![single.clone()],
        _ => Vec::new(),
    }
}
