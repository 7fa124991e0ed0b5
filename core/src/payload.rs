//! Submission payloads.
//!
//! # Design
//! A payload is either a JSON mapping or a multipart form container. The
//! shape is decided once, when the caller builds the payload, so the rest of
//! the pipeline matches on `Payload` instead of probing types at runtime.

use serde_json::{Map, Value};

use crate::error::{Result, SubmitError};

/// Form data being submitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Arbitrary key/value pairs, sent as a JSON object.
    Json(Map<String, Value>),
    /// Multipart form data, passed to the transport untouched apart from
    /// the injected session field.
    Multipart(FormData),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Json(Map::new())
    }
}

impl Payload {
    /// Wrap a JSON value. Only objects are valid submission payloads.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Payload::Json(map)),
            other => Err(SubmitError::configuration(format!(
                "submission data must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, Payload::Multipart(_))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Payload::Json(_) => "json",
            Payload::Multipart(_) => "multipart",
        }
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Payload::Json(map)
    }
}

impl From<FormData> for Payload {
    fn from(form: FormData) -> Self {
        Payload::Multipart(form)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A single multipart field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

/// An ordered multipart form. Field names may repeat, as in a browser
/// `FormData`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    parts: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, FormValue::Text(value.into()));
        self
    }

    /// Builder-style file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<&str>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.append(
            name,
            FormValue::File {
                file_name: file_name.into(),
                content_type: content_type.map(str::to_string),
                bytes: bytes.into(),
            },
        );
        self
    }

    /// Append a field, keeping any existing fields of the same name.
    pub fn append(&mut self, name: impl Into<String>, value: FormValue) {
        self.parts.push((name.into(), value));
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.parts.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Every value stored under `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FormValue> + 'a {
        self.parts.iter().filter(move |(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn parts(&self) -> &[(String, FormValue)] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<(String, FormValue)> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}
