//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible representations: owned
//! `*mut c_char` strings, raw arrays with explicit lengths, and enums with
//! fixed discriminants. Conversion helpers live here so `lib.rs` stays
//! focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::Arc;

use statickit_core::{
    EnvironmentSnapshot, HttpMethod, HttpRequest, ManualEventSource, RequestBody, RequestMode,
    Session, StaticKit, SubmissionBody, SubmissionResult, SubmitError,
};
use statickit_core::session::HEADLESS_MARKERS;

/// Opaque client handle. The host forwards its input events through
/// `statickit_record_*`, which feed `events`.
pub struct FfiClient {
    pub(crate) inner: StaticKit,
    pub(crate) events: Arc<ManualEventSource>,
}

/// Move a Rust string into a C string owned by the caller. A string with an
/// interior NUL becomes empty.
pub(crate) fn c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

// ---------------------------------------------------------------------------
// Environment and session
// ---------------------------------------------------------------------------

/// Automation markers observed by the host.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfiEnvironment {
    /// `navigator.webdriver` is set.
    pub navigator_webdriver: bool,
    /// The document root carries a `webdriver` attribute.
    pub webdriver_attribute: bool,
    /// A headless automation global is defined.
    pub headless_global: bool,
}

impl From<FfiEnvironment> for EnvironmentSnapshot {
    fn from(env: FfiEnvironment) -> Self {
        let mut snapshot = EnvironmentSnapshot::new().with_navigator_webdriver(env.navigator_webdriver);
        if env.webdriver_attribute {
            snapshot = snapshot.with_root_attribute("webdriver", "");
        }
        if env.headless_global {
            snapshot = snapshot.with_global(HEADLESS_MARKERS[0]);
        }
        snapshot
    }
}

/// Session counters exposed to C.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfiSession {
    pub loaded_at: i64,
    pub mousemove: u64,
    pub keydown: u64,
    pub webdriver: bool,
}

impl From<Session> for FfiSession {
    fn from(s: Session) -> Self {
        Self {
            loaded_at: s.loaded_at,
            mousemove: s.mousemove,
            keydown: s.keydown,
            webdriver: s.webdriver,
        }
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Post = 0,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Post => FfiHttpMethod::Post,
        }
    }
}

/// Fetch mode as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiRequestMode {
    Cors = 0,
}

impl From<RequestMode> for FfiRequestMode {
    fn from(m: RequestMode) -> Self {
        match m {
            RequestMode::Cors => FfiRequestMode::Cors,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// A submission request as C-compatible plain data. The host executes it
/// and passes the response back through `statickit_parse_submission`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub mode: FfiRequestMode,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` carrying a JSON body.
    pub(crate) fn from_core(req: HttpRequest) -> Result<Self, SubmitError> {
        let body = match req.body {
            RequestBody::Json(body) => c_string(body),
            RequestBody::Multipart(_) => {
                return Err(SubmitError::configuration(
                    "multipart payloads are not supported over FFI",
                ))
            }
        };

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Vec<FfiHeader> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: c_string(k),
                    value: c_string(v),
                })
                .collect();
            // boxed slice so capacity == len when reclaimed
            Box::into_raw(ffi_headers.into_boxed_slice()) as *mut FfiHeader
        };

        Ok(FfiHttpRequest {
            method: req.method.into(),
            mode: req.mode.into(),
            url: c_string(req.url),
            headers,
            headers_len,
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response as C-compatible plain data.
///
/// The C caller constructs this after executing the request and passes a
/// pointer to `statickit_parse_submission`. The FFI layer reads but does
/// not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Parsed body
// ---------------------------------------------------------------------------

/// Which of the two server body shapes was returned.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiBodyKind {
    Success = 0,
    Errors = 1,
}

/// A normalized submission body.
///
/// For `Success`, `id` is the submission id and `json` the `data` object.
/// For `Errors`, `id` is null and `json` is the `errors` array.
#[repr(C)]
pub struct FfiSubmissionBody {
    pub kind: FfiBodyKind,
    pub id: *mut c_char,
    pub json: *mut c_char,
}

impl FfiSubmissionBody {
    pub(crate) fn from_core(result: SubmissionResult) -> Result<Self, SubmitError> {
        Ok(match result.body {
            SubmissionBody::Success { id, data } => FfiSubmissionBody {
                kind: FfiBodyKind::Success,
                id: c_string(id),
                json: c_string(serde_json::to_string(&data)?),
            },
            SubmissionBody::Errors { errors } => FfiSubmissionBody {
                kind: FfiBodyKind::Errors,
                id: std::ptr::null_mut(),
                json: c_string(serde_json::to_string(&errors)?),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Result envelope
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Configuration = 1,
    Serialization = 2,
    Network = 3,
    Parse = 4,
    InvalidToken = 5,
    Panic = 6,
    NullArg = 7,
}

/// Tag that tells `statickit_free_result` what `FfiResult::data` points to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    Request = 1,
    SubmissionBody = 2,
}

/// Result envelope for build and parse operations.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `data`
/// points to the payload tagged by `data_tag`. On failure `error_code`
/// describes the category, `error_message` is a C string, and `data` is
/// null. `http_status` is the response status for parse results.
#[repr(C)]
pub struct FfiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data_tag: FfiDataTag,
    pub data: *mut std::ffi::c_void,
}

impl FfiResult {
    fn new(
        error_code: FfiErrorCode,
        error_message: *mut c_char,
        http_status: u16,
        data_tag: FfiDataTag,
        data: *mut std::ffi::c_void,
    ) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_code,
            error_message,
            http_status,
            data_tag,
            data,
        }))
    }

    fn error(error_code: FfiErrorCode, msg: String, http_status: u16) -> *mut Self {
        Self::new(
            error_code,
            c_string(msg),
            http_status,
            FfiDataTag::None,
            std::ptr::null_mut(),
        )
    }

    /// Build a success result carrying an `FfiHttpRequest`.
    pub(crate) fn ok_request(req: FfiHttpRequest) -> *mut Self {
        Self::new(
            FfiErrorCode::Ok,
            std::ptr::null_mut(),
            0,
            FfiDataTag::Request,
            Box::into_raw(Box::new(req)) as *mut std::ffi::c_void,
        )
    }

    /// Build a success result carrying an `FfiSubmissionBody`.
    pub(crate) fn ok_body(body: FfiSubmissionBody, http_status: u16) -> *mut Self {
        Self::new(
            FfiErrorCode::Ok,
            std::ptr::null_mut(),
            http_status,
            FfiDataTag::SubmissionBody,
            Box::into_raw(Box::new(body)) as *mut std::ffi::c_void,
        )
    }

    /// Build an error result from a `SubmitError`.
    pub(crate) fn from_error(err: SubmitError) -> *mut Self {
        let (code, status) = match &err {
            SubmitError::Configuration(_) => (FfiErrorCode::Configuration, 0),
            SubmitError::Serialization(_) => (FfiErrorCode::Serialization, 0),
            SubmitError::Network(_) => (FfiErrorCode::Network, 0),
            SubmitError::InvalidToken(_) => (FfiErrorCode::InvalidToken, 0),
            SubmitError::Parse { status, .. } => (FfiErrorCode::Parse, *status),
        };
        Self::error(code, err.to_string(), status)
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, format!("null argument: {name}"), 0)
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, msg.to_string(), 0)
    }
}
