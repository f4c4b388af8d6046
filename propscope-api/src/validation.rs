//! Request and callback payload validation
//!
//! Validators collect every field problem instead of stopping at the first,
//! so the workflow operator sees the full list in one 400 response.

use propscope_common::normalize::key_fields;
use reqwest::Url;
use serde_json::Value;

use crate::error::FieldError;

/// Callback kinds the workflow engine sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Started,
    Complete,
}

impl CallbackKind {
    /// Read the `status` discriminator of an unwrapped payload
    pub fn from_payload(payload: &Value) -> Result<Self, Option<String>> {
        match payload.get("status").and_then(Value::as_str) {
            Some("started") => Ok(CallbackKind::Started),
            Some("complete") => Ok(CallbackKind::Complete),
            Some(other) => Err(Some(other.to_string())),
            None => Err(None),
        }
    }
}

/// Identity fields every callback must carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackKey {
    pub super_id: String,
    pub property_url: String,
}

/// Parse and check an http(s) URL
pub fn validate_http_url(field: &str, value: &str) -> Result<Url, FieldError> {
    let url = Url::parse(value.trim())
        .map_err(|e| FieldError::new(field, format!("Invalid URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(FieldError::new(
            field,
            format!("URL must use http or https, got '{}'", scheme),
        )),
    }
}

/// Validate a `/api/trigger` body, returning the property URL
pub fn validate_trigger(body: &Value) -> Result<String, Vec<FieldError>> {
    match body.get("property_url") {
        Some(Value::String(url)) if !url.trim().is_empty() => validate_http_url("property_url", url)
            .map(|_| url.trim().to_string())
            .map_err(|e| vec![e]),
        Some(Value::String(_)) | None | Some(Value::Null) => Err(vec![FieldError::new(
            "property_url",
            "property_url is required",
        )]),
        Some(_) => Err(vec![FieldError::new("property_url", "property_url must be a string")]),
    }
}

/// Validate the identity of a callback payload.
///
/// Reads the same fallback paths as the normalizer, so a key accepted here
/// is the key the stored record ends up with.
pub fn validate_callback_key(raw: &Value) -> Result<CallbackKey, Vec<FieldError>> {
    let (super_id, property_url) = key_fields(raw);
    let mut errors = Vec::new();

    if super_id.is_none() {
        errors.push(FieldError::new("super_id", "super_id is required"));
    }
    match &property_url {
        None => errors.push(FieldError::new("property_url", "property_url is required")),
        Some(url) => {
            if let Err(e) = validate_http_url("property_url", url) {
                errors.push(e);
            }
        }
    }

    match (super_id, property_url) {
        (Some(super_id), Some(property_url)) if errors.is_empty() => Ok(CallbackKey {
            super_id,
            property_url,
        }),
        _ => Err(errors),
    }
}

/// `final_result` sent as a stringified JS object instead of JSON
pub fn is_stringified_object(payload: &Value) -> bool {
    payload
        .get("final_result")
        .and_then(Value::as_str)
        .is_some_and(|s| s.trim() == "[object Object]")
}
