//! Error types for the submission pipeline.
//!
//! # Design
//! Each variant corresponds to one terminal state of a submission. A
//! `Configuration` error is raised before any I/O is attempted; `Network`
//! and `Parse` are only produced once the request is in flight. Nothing in
//! the pipeline logs or swallows these; the caller decides what to do.

use thiserror::Error;

use crate::http::HttpResponse;

/// Boxed source error carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the submission pipeline.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The caller supplied an unusable submission, e.g. no `id` and no
    /// `site` + `form` pair.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The payload could not be encoded for the wire.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport did not produce a response.
    #[error("network error: {0}")]
    Network(#[source] BoxError),

    /// An encoded session token could not be decoded.
    #[error("invalid session token: {0}")]
    InvalidToken(String),

    /// A response arrived but its body is not a recognised submission body.
    /// The response is kept whole for inspection.
    #[error("could not parse response body: {message}")]
    Parse {
        status: u16,
        message: String,
        response: Box<HttpResponse>,
    },
}

impl SubmitError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        SubmitError::Configuration(msg.into())
    }

    pub fn network(err: impl Into<BoxError>) -> Self {
        SubmitError::Network(err.into())
    }

    pub fn parse(response: HttpResponse, message: impl Into<String>) -> Self {
        SubmitError::Parse {
            status: response.status,
            message: message.into(),
            response: Box::new(response),
        }
    }

    /// The raw response behind a `Parse` error.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            SubmitError::Parse { response, .. } => Some(response.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T, E = SubmitError> = std::result::Result<T, E>;
