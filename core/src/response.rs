//! Response normalization.
//!
//! The server answers with one of two JSON shapes regardless of status
//! code. `normalize` parses the body into `SubmissionBody` and keeps the raw
//! response next to it; telling success from validation failure is left to
//! the caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SubmitError};
use crate::http::HttpResponse;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Parsed submission response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmissionBody {
    Success { id: String, data: Map<String, Value> },
    Errors { errors: Vec<FieldError> },
}

/// Outcome of one submission: the parsed body plus the raw response.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    pub body: SubmissionBody,
    pub response: HttpResponse,
}

impl SubmissionResult {
    pub fn is_success(&self) -> bool {
        matches!(self.body, SubmissionBody::Success { .. })
    }

    /// Submission id on success.
    pub fn id(&self) -> Option<&str> {
        match &self.body {
            SubmissionBody::Success { id, .. } => Some(id),
            SubmissionBody::Errors { .. } => None,
        }
    }

    /// Validation errors, empty on success.
    pub fn errors(&self) -> &[FieldError] {
        match &self.body {
            SubmissionBody::Errors { errors } => errors,
            SubmissionBody::Success { .. } => &[],
        }
    }

    pub fn status(&self) -> u16 {
        self.response.status
    }
}

/// Parse `response` into a `SubmissionResult`.
/// A body that is not JSON, or JSON of neither shape, is a `Parse` error
/// carrying the response.
pub fn normalize(response: HttpResponse) -> Result<SubmissionResult> {
    let parsed = serde_json::from_str::<Value>(&response.body)
        .map_err(|e| e.to_string())
        .and_then(|value| {
            serde_json::from_value::<SubmissionBody>(value)
                .map_err(|_| "body is neither a submission nor an error list".to_string())
        });
    match parsed {
        Ok(body) => {
            debug!(
                status = response.status,
                success = matches!(body, SubmissionBody::Success { .. }),
                "normalized response"
            );
            Ok(SubmissionResult { body, response })
        }
        Err(message) => Err(SubmitError::parse(response, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_body() {
        let result = normalize(HttpResponse::new(200, r#"{"id":"sub_1","data":{}}"#)).unwrap();
        assert_eq!(
            result.body,
            SubmissionBody::Success {
                id: "sub_1".into(),
                data: Map::new()
            }
        );
        assert!(result.is_success());
        assert_eq!(result.id(), Some("sub_1"));
        assert!(result.errors().is_empty());
        assert_eq!(result.status(), 200);
    }

    #[test]
    fn error_body_keeps_status() {
        let body = json!({
            "errors": [
                {"field": "email", "message": "is required", "code": "REQUIRED", "properties": {}},
                {"field": "name", "message": "is too long", "code": null, "properties": {"max": 10}}
            ]
        });
        let result = normalize(HttpResponse::new(422, body.to_string())).unwrap();
        assert!(!result.is_success());
        assert_eq!(result.status(), 422);
        let errors = result.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].code.as_deref(), Some("REQUIRED"));
        assert_eq!(errors[1].code, None);
        assert_eq!(errors[1].properties["max"], 10);
    }

    #[test]
    fn status_is_not_interpreted() {
        let result = normalize(HttpResponse::new(500, r#"{"id":"sub_2","data":{"a":1}}"#)).unwrap();
        assert!(result.is_success());
        assert_eq!(result.response.status, 500);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = normalize(HttpResponse::new(502, "<html>Bad Gateway</html>")).unwrap_err();
        assert!(matches!(err, SubmitError::Parse { status: 502, .. }));
    }

    #[test]
    fn empty_body_is_a_parse_error() {
        let err = normalize(HttpResponse::new(204, "")).unwrap_err();
        assert!(matches!(err, SubmitError::Parse { status: 204, .. }));
    }

    #[test]
    fn unknown_shape_is_a_parse_error() {
        let err = normalize(HttpResponse::new(200, r#"{"ok":true}"#)).unwrap_err();
        assert!(matches!(err, SubmitError::Parse { .. }));
    }

    #[test]
    fn parse_error_keeps_the_response() {
        let mut response = HttpResponse::new(500, r#"{"error":"boom"}"#);
        response.headers.push(("x-request-id".into(), "r1".into()));
        let err = normalize(response.clone()).unwrap_err();
        assert!(matches!(err, SubmitError::Parse { status: 500, .. }));

        let kept = err.response().unwrap();
        assert_eq!(kept, &response);
        assert_eq!(kept.header("x-request-id"), Some("r1"));
        let body: Value = serde_json::from_str(&kept.body).unwrap();
        assert_eq!(body["error"], "boom");
    }

    #[test]
    fn only_parse_errors_carry_a_response() {
        assert!(SubmitError::configuration("x").response().is_none());
        assert!(SubmitError::network("down").response().is_none());
    }
}
