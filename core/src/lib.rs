//! Form submission client core.
//!
//! # Overview
//! Submits form data to a collection endpoint and returns the parsed
//! result, attaching a small behavioral session record (pointer moves, key
//! presses, automation markers) to every submission for server-side spam
//! heuristics.
//!
//! # Design
//! - `session`: the tracker, fed by an injected `EventSource`.
//! - `encoder`: turns a session stamp into the `_t` token and merges it into
//!   the payload.
//! - `request`: routing, serialization and the client header.
//! - `transport`: the `Fetch` seam; `ReqwestFetch` is the default.
//! - `response`: parses the body into a `SubmissionResult`.
//! - `client`: `StaticKit`, which runs the steps in order.
//!
//! Every step before the transport is synchronous and pure apart from the
//! session read, so hosts can build requests and parse responses themselves
//! (host-does-IO) while async callers simply `.await` a submission.

pub mod client;
pub mod config;
pub mod encoder;
pub mod error;
pub mod http;
pub mod payload;
pub mod request;
pub mod response;
pub mod session;
pub mod transport;

pub use client::{PendingSubmission, StaticKit};
pub use config::{ClientConfig, DEFAULT_ENDPOINT};
pub use encoder::{append, decode, encode, SESSION_KEY};
pub use error::{Result, SubmitError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBody, RequestMode, CLIENT_HEADER};
pub use payload::{FormData, FormValue, Payload};
pub use request::{build_request, client_header, resolve_url, serialize, Submission, Target, VERSION};
pub use response::{normalize, FieldError, SubmissionBody, SubmissionResult};
pub use session::{
    detect_automation, Clock, Environment, EnvironmentSnapshot, EventSource, InputEvent,
    ManualClock, ManualEventSource, Session, SessionStamp, SessionTracker, SystemClock,
};
pub use transport::{default_fetch, fetch_fn, Fetch};

#[cfg(feature = "reqwest")]
pub use transport::ReqwestFetch;
