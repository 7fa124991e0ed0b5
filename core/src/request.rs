//! Submission request construction.
//!
//! # Design
//! `Submission` carries everything a caller may set for one call. Building
//! the wire request is split into small pure functions (`resolve_url`,
//! `serialize`, `client_header`, `build_request`) so each rule can be
//! checked on its own; `StaticKit` strings them together with the session
//! stamp.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, SubmitError};
use crate::http::{HttpMethod, HttpRequest, RequestBody, RequestMode, CLIENT_HEADER};
use crate::payload::Payload;
use crate::transport::Fetch;

/// Version reported in the client header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package label reported in the client header.
pub const CLIENT_LABEL: &str = "@statickit/core";

/// Inputs for one `submit_form` call.
#[derive(Clone, Default)]
pub struct Submission {
    pub id: Option<String>,
    pub site: Option<String>,
    pub form: Option<String>,
    pub endpoint: Option<String>,
    pub data: Payload,
    pub client_name: Option<String>,
    pub fetch_impl: Option<Arc<dyn Fetch>>,
}

impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("id", &self.id)
            .field("site", &self.site)
            .field("form", &self.form)
            .field("endpoint", &self.endpoint)
            .field("data", &self.data.kind())
            .field("client_name", &self.client_name)
            .field("fetch_impl", &self.fetch_impl.is_some())
            .finish()
    }
}

impl Submission {
    /// An empty submission with no routing identifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit to a form addressed by its id.
    pub fn form(id: impl Into<String>) -> Self {
        Self::new().id(id)
    }

    /// Submit to a form addressed by site and form key.
    pub fn site_form(site: impl Into<String>, form: impl Into<String>) -> Self {
        let mut submission = Self::new();
        submission.site = Some(site.into());
        submission.form = Some(form.into());
        submission
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn form_key(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn data(mut self, data: impl Into<Payload>) -> Self {
        self.data = data.into();
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn fetch_impl(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch_impl = Some(fetch);
        self
    }

    /// Decide the routing mode. Empty identifiers count as missing.
    pub fn target(&self) -> Result<Target> {
        match (present(&self.site), present(&self.form), present(&self.id)) {
            (Some(site), Some(form), _) => Ok(Target::SiteForm {
                site: site.to_string(),
                form: form.to_string(),
            }),
            (_, _, Some(id)) => Ok(Target::Form { id: id.to_string() }),
            _ => Err(SubmitError::configuration(
                "you must set an `id` or `site` & `form` properties",
            )),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Where a submission is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Form { id: String },
    SiteForm { site: String, form: String },
}

impl Target {
    pub fn url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim_end_matches('/');
        match self {
            Target::Form { id } => format!("{endpoint}/j/forms/{id}/submissions"),
            Target::SiteForm { site, form } => {
                format!("{endpoint}/j/sites/{site}/forms/{form}/submissions")
            }
        }
    }
}

/// Destination URL for `submission`, using `default_endpoint` unless the
/// submission overrides it.
pub fn resolve_url(submission: &Submission, default_endpoint: &str) -> Result<String> {
    let endpoint = present(&submission.endpoint).unwrap_or(default_endpoint);
    Ok(submission.target()?.url(endpoint))
}

/// Turn a payload into a request body. Multipart forms pass through.
pub fn serialize(payload: Payload) -> Result<RequestBody> {
    match payload {
        Payload::Multipart(form) => Ok(RequestBody::Multipart(form)),
        Payload::Json(map) => Ok(RequestBody::Json(serde_json::to_string(&map)?)),
    }
}

/// Value of the `StaticKit-Client` header.
pub fn client_header(client_name: Option<&str>) -> String {
    let label = format!("{CLIENT_LABEL}@{VERSION}");
    match client_name.filter(|name| !name.is_empty()) {
        Some(name) => format!("{name} {label}"),
        None => label,
    }
}

/// Assemble the POST request for an already-resolved URL and payload.
pub fn build_request(url: String, payload: Payload, client_name: Option<&str>) -> Result<HttpRequest> {
    let body = serialize(payload)?;
    let mut headers = vec![(CLIENT_HEADER.to_string(), client_header(client_name))];
    if matches!(body, RequestBody::Json(_)) {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }
    debug!(
        %url,
        multipart = matches!(body, RequestBody::Multipart(_)),
        "built submission request"
    );
    Ok(HttpRequest {
        method: HttpMethod::Post,
        mode: RequestMode::Cors,
        url,
        headers,
        body,
    })
}
