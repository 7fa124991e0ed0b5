//! The client handle tying the pipeline together.
//!
//! # Design
//! `StaticKit` owns one `SessionTracker` and the client configuration.
//! Creating it has no side effects; `start` attaches the tracker to an event
//! source and `teardown` detaches it.
//!
//! A submission is split at the I/O boundary. `build_request` validates,
//! stamps the session, merges it into the payload and serializes, all
//! synchronously, so a configuration error surfaces before anything is
//! sent. `submit_form` wraps that request in a `PendingSubmission`, which is
//! awaited to run the transport and normalize the response. Hosts that do
//! their own I/O call `build_request` and `response::normalize` directly.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::config::ClientConfig;
use crate::encoder::{append, encode, SESSION_KEY};
use crate::error::{Result, SubmitError};
use crate::http::HttpRequest;
use crate::request::{self, resolve_url, Submission};
use crate::response::{normalize, SubmissionResult};
use crate::session::{Clock, Environment, EventSource, Session, SessionTracker};
use crate::transport::{default_fetch, Fetch};

/// Form submission client for one page lifetime.
pub struct StaticKit {
    config: ClientConfig,
    tracker: SessionTracker,
    fetch: Option<Arc<dyn Fetch>>,
    default_fetch: OnceLock<Option<Arc<dyn Fetch>>>,
}

impl Default for StaticKit {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl fmt::Debug for StaticKit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKit")
            .field("config", &self.config)
            .field("tracker", &self.tracker)
            .finish()
    }
}

impl StaticKit {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            tracker: SessionTracker::new(),
            fetch: None,
            default_fetch: OnceLock::new(),
        }
    }

    /// Use `clock` for session timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.tracker = SessionTracker::with_clock(clock);
        self
    }

    /// Transport used when a submission does not bring its own. A later
    /// call replaces an earlier one.
    pub fn with_fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Begin session tracking. Returns false if tracking was already started
    /// or the client has been torn down.
    pub fn start(&mut self, source: Arc<dyn EventSource>, env: &dyn Environment) -> bool {
        self.tracker.start(source, env)
    }

    /// Detach the session listeners. Safe to call more than once.
    pub fn teardown(&mut self) {
        self.tracker.stop();
    }

    pub fn session(&self) -> Session {
        self.tracker.snapshot()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validate `submission` and build its wire request.
    pub fn build_request(&self, submission: Submission) -> Result<HttpRequest> {
        let url = resolve_url(&submission, &self.config.endpoint)?;
        let stamp = self.tracker.stamp();
        let token = encode(&stamp)?;

        let Submission {
            data, client_name, ..
        } = submission;
        let mut payload = data;
        append(&mut payload, SESSION_KEY, &token);

        let client_name = client_name.or_else(|| self.config.client_name.clone());
        request::build_request(url, payload, client_name.as_deref())
    }

    /// Prepare a submission. Configuration errors are returned here, before
    /// any I/O; await the `PendingSubmission` to send it.
    pub fn submit_form(&self, mut submission: Submission) -> Result<PendingSubmission> {
        submission.target()?;
        let fetch = match submission.fetch_impl.take() {
            Some(fetch) => fetch,
            None => self.default_transport()?,
        };
        let request = self.build_request(submission)?;
        debug!(url = %request.url, "submission prepared");
        Ok(PendingSubmission { request, fetch })
    }

    fn default_transport(&self) -> Result<Arc<dyn Fetch>> {
        if let Some(fetch) = &self.fetch {
            return Ok(fetch.clone());
        }
        self.default_fetch
            .get_or_init(default_fetch)
            .clone()
            .ok_or_else(|| {
                SubmitError::configuration("no transport configured; pass `fetch_impl` or enable the `reqwest` feature")
            })
    }
}

/// A built submission waiting to be sent.
pub struct PendingSubmission {
    request: HttpRequest,
    fetch: Arc<dyn Fetch>,
}

impl fmt::Debug for PendingSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSubmission")
            .field("request", &self.request)
            .finish()
    }
}

impl PendingSubmission {
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Perform the round-trip and normalize the response.
    pub async fn send(self) -> Result<SubmissionResult> {
        let response = self.fetch.fetch(self.request).await?;
        normalize(response)
    }
}

impl IntoFuture for PendingSubmission {
    type Output = Result<SubmissionResult>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.send())
    }
}
