//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe a submission request and its response as plain
//! data. The core builds `HttpRequest` values and normalizes `HttpResponse`
//! values; executing the round-trip is the job of a `Fetch` implementation
//! or, across the FFI boundary, of the host.
//!
//! All fields use owned types so values can be moved into transports and
//! across FFI boundaries without lifetime concerns.

use crate::payload::FormData;

/// Name of the client identification header.
pub const CLIENT_HEADER: &str = "StaticKit-Client";

/// HTTP method for a request. Submissions are always POSTed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
        }
    }
}

/// Fetch request mode. Only meaningful to browser-backed transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Cors,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Cors => "cors",
        }
    }
}

/// Serialized request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// A JSON document; the request carries `Content-Type: application/json`.
    Json(String),
    /// A multipart form; the transport chooses the boundary and sets the
    /// content type itself.
    Multipart(FormData),
}

/// A submission request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub mode: RequestMode,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// Produced by a `Fetch` implementation after executing an `HttpRequest`
/// and kept verbatim in the `SubmissionResult` for status inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let mut response = HttpResponse::new(200, "{}");
        response
            .headers
            .push(("content-type".to_string(), "application/json".to_string()));
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn success_range_is_2xx() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(422, "").is_success());
        assert!(!HttpResponse::new(302, "").is_success());
    }
}
