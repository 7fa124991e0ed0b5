//! Transport adapters.
//!
//! # Design
//! `Fetch` is the only seam between the pipeline and the network. It gets a
//! fully built `HttpRequest`, performs exactly one round-trip and hands back
//! the raw `HttpResponse`. Retries, timeouts and redirects are whatever the
//! implementation does by default. Any failure to obtain a response is a
//! `SubmitError::Network`, returned as-is.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};

/// A fetch-compatible transport.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Adapter turning an async closure into a `Fetch`.
pub struct FetchFn<F>(F);

#[async_trait]
impl<F, Fut> Fetch for FetchFn<F>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        (self.0)(request).await
    }
}

/// Wrap a closure `|request| async { ... }` as a shareable transport.
pub fn fetch_fn<F, Fut>(f: F) -> Arc<dyn Fetch>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    Arc::new(FetchFn(f))
}

/// The transport used when neither the client nor the submission sets one.
pub fn default_fetch() -> Option<Arc<dyn Fetch>> {
    #[cfg(feature = "reqwest")]
    {
        Some(Arc::new(ReqwestFetch::new()))
    }
    #[cfg(not(feature = "reqwest"))]
    {
        None
    }
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_fetch::ReqwestFetch;

#[cfg(feature = "reqwest")]
mod reqwest_fetch {
    use async_trait::async_trait;
    use reqwest::multipart::{Form, Part};
    use tracing::debug;

    use super::Fetch;
    use crate::error::{Result, SubmitError};
    use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};
    use crate::payload::{FormData, FormValue};

    /// `Fetch` backed by a shared `reqwest::Client`.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestFetch {
        client: reqwest::Client,
    }

    impl ReqwestFetch {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Fetch for ReqwestFetch {
        async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
            let method = match request.method {
                HttpMethod::Post => reqwest::Method::POST,
            };
            let mut builder = self.client.request(method, request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder = match request.body {
                RequestBody::Json(body) => builder.body(body),
                RequestBody::Multipart(form) => builder.multipart(to_multipart(form)?),
            };

            let response = builder.send().await.map_err(SubmitError::network)?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.text().await.map_err(SubmitError::network)?;
            debug!(url = %request.url, status, "submission response received");

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }

    fn to_multipart(form: FormData) -> Result<Form> {
        let mut multipart = Form::new();
        for (name, value) in form.into_parts() {
            multipart = match value {
                FormValue::Text(text) => multipart.text(name, text),
                FormValue::File {
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let mut part = Part::bytes(bytes).file_name(file_name);
                    if let Some(content_type) = content_type {
                        part = part.mime_str(&content_type).map_err(|e| {
                            SubmitError::configuration(format!(
                                "invalid content type `{content_type}`: {e}"
                            ))
                        })?;
                    }
                    multipart.part(name, part)
                }
            };
        }
        Ok(multipart)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubmitError;
    use crate::http::{HttpMethod, RequestBody, RequestMode};

    fn request() -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            mode: RequestMode::Cors,
            url: "http://localhost/j/forms/a/submissions".to_string(),
            headers: Vec::new(),
            body: RequestBody::Json("{}".to_string()),
        }
    }

    #[tokio::test]
    async fn fetch_fn_forwards_request() {
        let fetch = fetch_fn(|req: HttpRequest| async move {
            Ok(HttpResponse::new(200, format!("\"{}\"", req.url)))
        });
        let response = fetch.fetch(request()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "\"http://localhost/j/forms/a/submissions\"");
    }

    #[tokio::test]
    async fn fetch_fn_propagates_network_errors() {
        let fetch = fetch_fn(|_req: HttpRequest| async move {
            Err(SubmitError::network("connection refused"))
        });
        let err = fetch.fetch(request()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Network(_)));
        assert_eq!(err.to_string(), "network error: connection refused");
    }

    #[test]
    fn default_fetch_follows_feature() {
        assert_eq!(default_fetch().is_some(), cfg!(feature = "reqwest"));
    }
}
