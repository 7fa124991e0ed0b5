//! C-ABI wrapper around `statickit-core`.
//!
//! # Overview
//! Exposes the sans-IO half of the submission pipeline through `extern "C"`
//! functions: the host forwards input events, asks for a built submission
//! request, performs the HTTP round-trip itself and hands the response back
//! for normalization.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Build and parse results share one `FfiResult` envelope with
//!   `FfiDataTag` + `void* data`.
//! - The C caller owns all returned pointers and must release them with the
//!   matching `statickit_*_free` / `statickit_free_*` function.
//! - Only JSON payloads cross the boundary.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use statickit_core::{
    normalize, ClientConfig, EnvironmentSnapshot, HttpResponse, InputEvent, ManualEventSource,
    Payload, StaticKit, Submission, SubmitError,
};

use types::*;

/// Borrow a nullable C string as `Option<&str>`. Invalid UTF-8 reads as
/// absent.
unsafe fn opt_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(s) }.to_str().ok()
    }
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client. `endpoint` and `client_name` may be null for defaults.
///
/// The client does not track anything until `statickit_client_start`.
/// The caller must free the returned pointer with `statickit_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn statickit_client_new(
    endpoint: *const c_char,
    client_name: *const c_char,
) -> *mut FfiClient {
    catch_unwind(|| {
        let mut config = ClientConfig::default();
        if let Some(endpoint) = unsafe { opt_str(endpoint) }.filter(|e| !e.is_empty()) {
            config = config.with_endpoint(endpoint);
        }
        if let Some(name) = unsafe { opt_str(client_name) }.filter(|n| !n.is_empty()) {
            config = config.with_client_name(name);
        }
        let client = FfiClient {
            inner: StaticKit::new(config),
            events: Arc::new(ManualEventSource::new()),
        };
        Box::into_raw(Box::new(client))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Start session tracking. `env` may be null when no automation markers
/// were observed. Returns false if `client` is null or already started.
#[unsafe(no_mangle)]
pub extern "C" fn statickit_client_start(
    client: *mut FfiClient,
    env: *const FfiEnvironment,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return false;
        }
        let client = unsafe { &mut *client };
        let env: EnvironmentSnapshot = if env.is_null() {
            EnvironmentSnapshot::new()
        } else {
            (unsafe { *env }).into()
        };
        let source = Arc::clone(&client.events);
        client.inner.start(source, &env)
    }))
    .unwrap_or(false)
}

/// Record one pointer-move event. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn statickit_record_mousemove(client: *const FfiClient) {
    record(client, InputEvent::MouseMove);
}

/// Record one key-down event. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn statickit_record_keydown(client: *const FfiClient) {
    record(client, InputEvent::KeyDown);
}

fn record(client: *const FfiClient, event: InputEvent) {
    if client.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let client = unsafe { &*client };
        client.events.emit(event);
    }));
}

/// Copy the current session counters into `out`. Returns false if either
/// pointer is null.
#[unsafe(no_mangle)]
pub extern "C" fn statickit_client_session(client: *const FfiClient, out: *mut FfiSession) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() || out.is_null() {
            return false;
        }
        let client = unsafe { &*client };
        unsafe { *out = client.inner.session().into() };
        true
    }))
    .unwrap_or(false)
}

/// Stop session tracking. Counters stay readable. Safe to call with null
/// and more than once.
#[unsafe(no_mangle)]
pub extern "C" fn statickit_client_teardown(client: *mut FfiClient) {
    if client.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let client = unsafe { &mut *client };
        client.inner.teardown();
    }));
}

/// Free a client created by `statickit_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn statickit_client_free(client: *mut FfiClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Build and parse
// ---------------------------------------------------------------------------

/// Build the request for one submission.
///
/// Set `id`, or both `site` and `form`; the others may be null.
/// `data_json` is a JSON object or null for an empty payload. On success
/// the result carries an `FfiHttpRequest` (`data_tag = Request`).
#[unsafe(no_mangle)]
pub extern "C" fn statickit_build_submission(
    client: *const FfiClient,
    id: *const c_char,
    site: *const c_char,
    form: *const c_char,
    data_json: *const c_char,
) -> *mut FfiResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiResult::null_arg("client");
        }
        let client = unsafe { &*client };

        let mut submission = Submission::new();
        submission.id = unsafe { opt_str(id) }.map(str::to_string);
        submission.site = unsafe { opt_str(site) }.map(str::to_string);
        submission.form = unsafe { opt_str(form) }.map(str::to_string);
        if let Some(raw) = unsafe { opt_str(data_json) } {
            let parsed = serde_json::from_str::<serde_json::Value>(raw)
                .map_err(|e| SubmitError::configuration(format!("invalid data JSON: {e}")))
                .and_then(Payload::from_value);
            match parsed {
                Ok(payload) => submission.data = payload,
                Err(e) => return FfiResult::from_error(e),
            }
        }

        match client
            .inner
            .build_request(submission)
            .and_then(FfiHttpRequest::from_core)
        {
            Ok(req) => FfiResult::ok_request(req),
            Err(e) => FfiResult::from_error(e),
        }
    }))
    .unwrap_or_else(|_| FfiResult::panic("panic in statickit_build_submission"))
}

/// Normalize a submission response. On success the result carries an
/// `FfiSubmissionBody` (`data_tag = SubmissionBody`); a body that is not
/// valid JSON yields `error_code = Parse`.
#[unsafe(no_mangle)]
pub extern "C" fn statickit_parse_submission(response: *const FfiHttpResponse) -> *mut FfiResult {
    catch_unwind(|| {
        if response.is_null() {
            return FfiResult::null_arg("response");
        }
        let resp = unsafe { &*response };
        let body = unsafe { opt_str(resp.body) }.unwrap_or_default();
        let status = resp.status;

        match normalize(HttpResponse::new(status, body)).and_then(FfiSubmissionBody::from_core) {
            Ok(body) => FfiResult::ok_body(body, status),
            Err(e) => FfiResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiResult::panic("panic in statickit_parse_submission"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiResult` returned by `statickit_build_submission` or
/// `statickit_parse_submission`. Safe to call with null. Uses `data_tag` to
/// determine what `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn statickit_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::Request => {
                let req = unsafe { Box::from_raw(result.data as *mut FfiHttpRequest) };
                free_request_fields(&req);
            }
            FfiDataTag::SubmissionBody => {
                let body = unsafe { Box::from_raw(result.data as *mut FfiSubmissionBody) };
                free_c_string(body.id);
                free_c_string(body.json);
            }
            FfiDataTag::None => {}
        }
    });
}

/// Free the C-string fields and header array of an `FfiHttpRequest`.
fn free_request_fields(req: &FfiHttpRequest) {
    free_c_string(req.url);
    free_c_string(req.body);
    if !req.headers.is_null() && req.headers_len > 0 {
        let headers = unsafe {
            Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                req.headers,
                req.headers_len as usize,
            ))
        };
        for h in headers.iter() {
            free_c_string(h.key);
            free_c_string(h.value);
        }
    }
}

fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn statickit_free_string(s: *mut c_char) {
    let _ = catch_unwind(|| free_c_string(s));
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn new_client(endpoint: Option<&str>) -> *mut FfiClient {
        let endpoint = endpoint.map(|e| CString::new(e).unwrap());
        let client = statickit_client_new(
            endpoint.as_ref().map_or(std::ptr::null(), |e| e.as_ptr()),
            std::ptr::null(),
        );
        assert!(!client.is_null());
        client
    }

    fn as_str<'a>(s: *mut c_char) -> &'a str {
        unsafe { CStr::from_ptr(s) }.to_str().unwrap()
    }

    fn request_of<'a>(result: *mut FfiResult) -> &'a FfiHttpRequest {
        let result = unsafe { &*result };
        assert_eq!(result.error_code, FfiErrorCode::Ok);
        assert_eq!(result.data_tag, FfiDataTag::Request);
        unsafe { &*(result.data as *const FfiHttpRequest) }
    }

    fn headers_of(req: &FfiHttpRequest) -> Vec<(String, String)> {
        let headers = unsafe { std::slice::from_raw_parts(req.headers, req.headers_len as usize) };
        headers
            .iter()
            .map(|h| (as_str(h.key).to_string(), as_str(h.value).to_string()))
            .collect()
    }

    #[test]
    fn client_new_and_free() {
        let client = new_client(None);
        statickit_client_free(client);
    }

    #[test]
    fn client_free_null_is_safe() {
        statickit_client_free(std::ptr::null_mut());
        statickit_client_teardown(std::ptr::null_mut());
        statickit_record_mousemove(std::ptr::null());
        statickit_free_result(std::ptr::null_mut());
        statickit_free_string(std::ptr::null_mut());
    }

    #[test]
    fn events_are_counted_between_start_and_teardown() {
        let client = new_client(None);
        statickit_record_mousemove(client);
        assert!(statickit_client_start(client, std::ptr::null()));
        assert!(!statickit_client_start(client, std::ptr::null()));

        statickit_record_mousemove(client);
        statickit_record_mousemove(client);
        statickit_record_keydown(client);
        statickit_client_teardown(client);
        statickit_record_keydown(client);

        let mut session = FfiSession::default();
        assert!(statickit_client_session(client, &mut session));
        assert_eq!(session.mousemove, 2);
        assert_eq!(session.keydown, 1);
        assert!(!session.webdriver);
        assert!(session.loaded_at > 0);

        statickit_client_free(client);
    }

    #[test]
    fn environment_flags_mark_automation() {
        let client = new_client(None);
        let env = FfiEnvironment {
            headless_global: true,
            ..Default::default()
        };
        assert!(statickit_client_start(client, &env));
        let mut session = FfiSession::default();
        statickit_client_session(client, &mut session);
        assert!(session.webdriver);
        statickit_client_free(client);
    }

    #[test]
    fn build_submission_by_id() {
        let client = new_client(Some("http://localhost:3000"));
        statickit_client_start(client, std::ptr::null());
        statickit_record_keydown(client);

        let id = CString::new("f1").unwrap();
        let data = CString::new(r#"{"email":"a@b.com"}"#).unwrap();
        let result = statickit_build_submission(
            client,
            id.as_ptr(),
            std::ptr::null(),
            std::ptr::null(),
            data.as_ptr(),
        );
        let req = request_of(result);
        assert_eq!(req.method, FfiHttpMethod::Post);
        assert_eq!(req.mode, FfiRequestMode::Cors);
        assert_eq!(as_str(req.url), "http://localhost:3000/j/forms/f1/submissions");

        let headers = headers_of(req);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "StaticKit-Client");
        assert!(headers[0].1.starts_with("@statickit/core@"));
        assert_eq!(headers[1], ("Content-Type".to_string(), "application/json".to_string()));

        let body: serde_json::Value = serde_json::from_str(as_str(req.body)).unwrap();
        assert_eq!(body["email"], "a@b.com");
        let stamp = statickit_core::decode(body["_t"].as_str().unwrap()).unwrap();
        assert_eq!(stamp.keydown, 1);

        statickit_free_result(result);
        statickit_client_free(client);
    }

    #[test]
    fn build_submission_by_site_and_form_without_data() {
        let client = new_client(None);
        let site = CString::new("s").unwrap();
        let form = CString::new("f").unwrap();
        let result = statickit_build_submission(
            client,
            std::ptr::null(),
            site.as_ptr(),
            form.as_ptr(),
            std::ptr::null(),
        );
        let req = request_of(result);
        assert_eq!(
            as_str(req.url),
            "https://api.statickit.com/j/sites/s/forms/f/submissions"
        );
        statickit_free_result(result);
        statickit_client_free(client);
    }

    #[test]
    fn build_submission_without_identifiers_is_a_configuration_error() {
        let client = new_client(None);
        let site = CString::new("s").unwrap();
        let result = statickit_build_submission(
            client,
            std::ptr::null(),
            site.as_ptr(),
            std::ptr::null(),
            std::ptr::null(),
        );
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Configuration);
        assert!(r.data.is_null());
        assert!(as_str(r.error_message).contains("`id`"));
        statickit_free_result(result);
        statickit_client_free(client);
    }

    #[test]
    fn build_submission_rejects_non_object_data() {
        let client = new_client(None);
        let id = CString::new("f1").unwrap();
        for raw in ["[1,2]", "{not json"] {
            let data = CString::new(raw).unwrap();
            let result = statickit_build_submission(
                client,
                id.as_ptr(),
                std::ptr::null(),
                std::ptr::null(),
                data.as_ptr(),
            );
            assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Configuration, "{raw}");
            statickit_free_result(result);
        }
        statickit_client_free(client);
    }

    #[test]
    fn build_submission_null_client() {
        let result = statickit_build_submission(
            std::ptr::null(),
            std::ptr::null(),
            std::ptr::null(),
            std::ptr::null(),
            std::ptr::null(),
        );
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        statickit_free_result(result);
    }

    #[test]
    fn parse_success_body() {
        let body = CString::new(r#"{"id":"sub_1","data":{"email":"a@b.com"}}"#).unwrap();
        let response = FfiHttpResponse {
            status: 200,
            body: body.as_ptr(),
        };
        let result = statickit_parse_submission(&response);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.http_status, 200);
        assert_eq!(r.data_tag, FfiDataTag::SubmissionBody);
        let parsed = unsafe { &*(r.data as *const FfiSubmissionBody) };
        assert_eq!(parsed.kind, FfiBodyKind::Success);
        assert_eq!(as_str(parsed.id), "sub_1");
        let data: serde_json::Value = serde_json::from_str(as_str(parsed.json)).unwrap();
        assert_eq!(data["email"], "a@b.com");
        statickit_free_result(result);
    }

    #[test]
    fn parse_error_body() {
        let body = CString::new(
            r#"{"errors":[{"field":"email","message":"should be an email","code":"TYPE_EMAIL","properties":{}}]}"#,
        )
        .unwrap();
        let response = FfiHttpResponse {
            status: 422,
            body: body.as_ptr(),
        };
        let result = statickit_parse_submission(&response);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.http_status, 422);
        let parsed = unsafe { &*(r.data as *const FfiSubmissionBody) };
        assert_eq!(parsed.kind, FfiBodyKind::Errors);
        assert!(parsed.id.is_null());
        let errors: serde_json::Value = serde_json::from_str(as_str(parsed.json)).unwrap();
        assert_eq!(errors[0]["field"], "email");
        statickit_free_result(result);
    }

    #[test]
    fn parse_invalid_body() {
        let body = CString::new("<html>oops</html>").unwrap();
        let response = FfiHttpResponse {
            status: 500,
            body: body.as_ptr(),
        };
        let result = statickit_parse_submission(&response);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Parse);
        assert_eq!(r.http_status, 500);
        assert!(r.data.is_null());
        statickit_free_result(result);
    }

    #[test]
    fn parse_null_response() {
        let result = statickit_parse_submission(std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        statickit_free_result(result);
    }
}
