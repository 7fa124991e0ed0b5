use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const SESSION_FIELD: &str = "_t";
pub const CLIENT_HEADER: &str = "statickit-client";

/// Session record decoded from the `_t` field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub loaded_at: i64,
    pub mousemove: u64,
    pub keydown: u64,
    pub webdriver: bool,
    pub submitted_at: i64,
}

/// A submission as received by the mock endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedSubmission {
    pub id: String,
    pub site: Option<String>,
    pub form: String,
    pub client: Option<String>,
    pub multipart: bool,
    pub fields: Map<String, Value>,
    pub session: Session,
}

pub type Db = Arc<RwLock<Vec<ReceivedSubmission>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Vec::new()));
    Router::new()
        .route("/j/forms/{id}/submissions", post(submit_form))
        .route("/j/sites/{site}/forms/{form}/submissions", post(submit_site_form))
        .route("/submissions", get(list_submissions))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Decode a `_t` token into a `Session`.
pub fn decode_session(token: &str) -> Option<Session> {
    let bytes = STANDARD.decode(token.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

async fn submit_form(State(db): State<Db>, Path(id): Path<String>, request: Request) -> Response {
    accept(db, None, id, request).await
}

async fn submit_site_form(
    State(db): State<Db>,
    Path((site, form)): Path<(String, String)>,
    request: Request,
) -> Response {
    accept(db, Some(site), form, request).await
}

async fn list_submissions(State(db): State<Db>) -> Json<Vec<ReceivedSubmission>> {
    Json(db.read().await.clone())
}

async fn accept(db: Db, site: Option<String>, form: String, request: Request) -> Response {
    let client = request
        .headers()
        .get(CLIENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let fields = if multipart {
        match read_multipart(request).await {
            Ok(fields) => fields,
            Err(response) => return response,
        }
    } else {
        match Json::<Map<String, Value>>::from_request(request, &()).await {
            Ok(Json(fields)) => fields,
            Err(rejection) => return rejection.into_response(),
        }
    };

    let mut errors = Vec::new();
    let session = fields
        .get(SESSION_FIELD)
        .and_then(Value::as_str)
        .and_then(decode_session);
    if session.is_none() {
        errors.push(field_error(SESSION_FIELD, "is missing or invalid", "INVALID_SESSION"));
    }
    if let Some(email) = fields.get("email") {
        if !email.as_str().is_some_and(|e| e.contains('@')) {
            errors.push(field_error("email", "should be an email", "TYPE_EMAIL"));
        }
    }
    let Some(session) = session.filter(|_| errors.is_empty()) else {
        info!(form = %form, errors = errors.len(), "submission rejected");
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "errors": errors }))).into_response();
    };

    let mut data = fields.clone();
    data.remove(SESSION_FIELD);
    let submission = ReceivedSubmission {
        id: format!("sub_{}", Uuid::new_v4().simple()),
        site,
        form,
        client,
        multipart,
        fields,
        session,
    };
    info!(
        id = %submission.id,
        form = %submission.form,
        multipart,
        mousemove = submission.session.mousemove,
        webdriver = submission.session.webdriver,
        "submission accepted"
    );
    let body = json!({ "id": submission.id, "data": data });
    db.write().await.push(submission);
    (StatusCode::OK, Json(body)).into_response()
}

/// Collect multipart fields. Text parts become strings, file parts a small
/// descriptor; for repeated names the last part wins.
async fn read_multipart(request: Request) -> Result<Map<String, Value>, Response> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    let mut fields = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let value = match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(IntoResponse::into_response)?;
                json!({ "fileName": file_name, "contentType": content_type, "size": bytes.len() })
            }
            None => Value::String(field.text().await.map_err(IntoResponse::into_response)?),
        };
        fields.insert(name, value);
    }
    Ok(fields)
}

fn field_error(field: &str, message: &str, code: &str) -> Value {
    json!({ "field": field, "message": message, "code": code, "properties": {} })
}
