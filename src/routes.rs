use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::i18n::{label_table, Language, LabelTable};
use crate::models::{ChatRequest, FaceDimensions, HairstyleRequest, LanguageChange, NewSession, ProfileUpdate, RelightRequest};
use crate::workflow::{SessionView, WorkflowController};

#[derive(Clone)]
pub struct AppState {
    pub workflow: WorkflowController,
}

type ViewResult = Result<Json<SessionView>, WorkflowError>;

fn view(session: crate::workflow::Session) -> Json<SessionView> {
    Json(SessionView::from(&session))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/labels", get(get_labels))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/profile", put(update_profile))
        .route("/api/sessions/:id/profile/confirm", post(confirm_profile))
        .route("/api/sessions/:id/language", put(set_language))
        .route("/api/sessions/:id/image", post(submit_image))
        .route("/api/sessions/:id/analysis/refine", post(refine_analysis))
        .route("/api/sessions/:id/analysis/continue", post(continue_to_styles))
        .route("/api/sessions/:id/styles/shuffle", post(shuffle_styles))
        .route("/api/sessions/:id/hairstyle", post(generate_hairstyle))
        .route("/api/sessions/:id/hairstyle/relight", post(relight))
        .route("/api/sessions/:id/hairstyle/chat", post(chat_edit))
        .route("/api/sessions/:id/hairstyle/image", get(download_image))
        .route("/api/sessions/:id/hairstyle/guide.pdf", get(export_guide))
        .route("/api/sessions/:id/back", post(back))
        .route("/api/sessions/:id/try-another", post(try_another))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct LabelQuery {
    #[serde(default)]
    lang: Option<String>,
}

pub async fn get_labels(Query(q): Query<LabelQuery>) -> Json<LabelTable> {
    let lang = q.lang.as_deref().and_then(Language::from_code).unwrap_or(Language::Zh);
    Json(label_table(lang))
}

pub async fn create_session(State(state): State<AppState>, body: Option<Json<NewSession>>) -> (StatusCode, Json<SessionView>) {
    let language = body.and_then(|Json(b)| b.language);
    (StatusCode::CREATED, view(state.workflow.create_session(language)))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    state.workflow.get(id).map(view)
}

pub async fn delete_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, WorkflowError> {
    state.workflow.remove_session(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_profile(Path(id): Path<Uuid>, State(state): State<AppState>, Json(body): Json<ProfileUpdate>) -> ViewResult {
    state.workflow.update_profile(id, body).map(view)
}

pub async fn confirm_profile(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    state.workflow.confirm_profile(id).map(view)
}

pub async fn set_language(Path(id): Path<Uuid>, State(state): State<AppState>, Json(body): Json<LanguageChange>) -> ViewResult {
    state.workflow.set_language(id, body.language).map(view)
}

pub async fn submit_image(Path(id): Path<Uuid>, State(state): State<AppState>, body: Bytes) -> ViewResult {
    tracing::info!("📸 Received {} byte upload for session {}", body.len(), id);
    state.workflow.submit_image(id, body).await.map(view)
}

pub async fn refine_analysis(Path(id): Path<Uuid>, State(state): State<AppState>, Json(body): Json<FaceDimensions>) -> ViewResult {
    state.workflow.refine_analysis(id, body).await.map(view)
}

pub async fn continue_to_styles(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    state.workflow.continue_to_styles(id).map(view)
}

pub async fn shuffle_styles(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    state.workflow.shuffle_styles(id).await.map(view)
}

pub async fn generate_hairstyle(Path(id): Path<Uuid>, State(state): State<AppState>, Json(body): Json<HairstyleRequest>) -> ViewResult {
    state.workflow.generate_hairstyle(id, body).await.map(view)
}

pub async fn relight(Path(id): Path<Uuid>, State(state): State<AppState>, Json(body): Json<RelightRequest>) -> ViewResult {
    state.workflow.relight(id, body.lighting).await.map(view)
}

pub async fn chat_edit(Path(id): Path<Uuid>, State(state): State<AppState>, Json(body): Json<ChatRequest>) -> ViewResult {
    state.workflow.chat_edit(id, &body.instruction).await.map(view)
}

pub async fn back(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    state.workflow.back(id).map(view)
}

pub async fn try_another(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    state.workflow.try_another(id).map(view)
}

fn attachment(filename: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

pub async fn download_image(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Response, WorkflowError> {
    let download = state.workflow.download_image(id)?;
    let content_type = HeaderValue::from_str(&download.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, attachment(&download.filename))],
        download.bytes,
    )
        .into_response())
}

pub async fn export_guide(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Response, WorkflowError> {
    let pdf_bytes = state.workflow.export_guide(id)?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, attachment(&format!("hairstyle_guide_{}.pdf", id))),
        ],
        pdf_bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GeminiGateway;
    use crate::config::Config;
    use crate::image::tests::{tiny_png, TINY_PNG_B64};
    use crate::workflow::tests::{request, ScriptedGateway};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_with(gateway: Arc<dyn crate::gateway::StylistGateway>) -> Router {
        router(AppState { workflow: WorkflowController::new(gateway, Language::En) })
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Body, json_body: bool) -> (StatusCode, Vec<u8>) {
        let mut req = Request::builder().method(method).uri(uri);
        if json_body {
            req = req.header("content-type", "application/json");
        }
        let response = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, bytes)
    }

    async fn call_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = match body {
            Some(v) => call(app, method, uri, Body::from(v.to_string()), true).await,
            None => call(app, method, uri, Body::empty(), false).await,
        };
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn full_flow_over_http() {
        let app = app_with(Arc::new(ScriptedGateway::default()));
        let (status, session) = call_json(&app, Method::POST, "/api/sessions", Some(json!({ "language": "en" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = session["id"].as_str().unwrap().to_string();
        assert_eq!(session["step_number"], 1);

        let (status, s) = call_json(
            &app,
            Method::PUT,
            &format!("/api/sessions/{id}/profile"),
            Some(json!({ "age": "abc", "hair_curl": "Wavy" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(s["profile"]["age"], 25);
        assert_eq!(s["profile"]["hair_curl"], "Wavy");

        call_json(&app, Method::POST, &format!("/api/sessions/{id}/profile/confirm"), None).await;
        let (status, bytes) = call(
            &app,
            Method::POST,
            &format!("/api/sessions/{id}/image"),
            Body::from(tiny_png().bytes().clone()),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let s: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(s["step"], "analysis");
        assert_eq!(s["analysis"]["face_shape"], "Oval");

        call_json(&app, Method::POST, &format!("/api/sessions/{id}/analysis/continue"), None).await;
        let (status, s) = call_json(
            &app,
            Method::POST,
            &format!("/api/sessions/{id}/hairstyle"),
            Some(serde_json::to_value(request()).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(s["step_number"], 5);
        assert!(s["generated"]["image_url"].as_str().unwrap().starts_with("data:image/png;base64,"));

        let (status, bytes) = call(&app, Method::GET, &format!("/api/sessions/{id}/hairstyle/image"), Body::empty(), false).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!bytes.is_empty());

        let (status, bytes) = call(&app, Method::GET, &format!("/api/sessions/{id}/hairstyle/guide.pdf"), Body::empty(), false).await;
        assert_eq!(status, StatusCode::OK);
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn upload_accepts_base64_text() {
        let gateway = Arc::new(ScriptedGateway::default());
        let app = app_with(gateway.clone());
        let (_, session) = call_json(&app, Method::POST, "/api/sessions", None).await;
        let id = session["id"].as_str().unwrap().to_string();
        call_json(&app, Method::POST, &format!("/api/sessions/{id}/profile/confirm"), None).await;

        let (status, bytes) = call(
            &app,
            Method::POST,
            &format!("/api/sessions/{id}/image"),
            Body::from(TINY_PNG_B64),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let s: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(s["step"], "analysis");
        let seen = gateway.seen_images.lock().clone();
        assert_eq!(seen[0].mime_type(), "image/jpeg");
        assert_eq!(seen[0].bytes(), tiny_png().bytes());
    }

    #[tokio::test]
    async fn upload_rejects_text_that_is_not_an_image() {
        let app = app_with(Arc::new(ScriptedGateway::default()));
        let (_, session) = call_json(&app, Method::POST, "/api/sessions", None).await;
        let id = session["id"].as_str().unwrap().to_string();
        call_json(&app, Method::POST, &format!("/api/sessions/{id}/profile/confirm"), None).await;

        let (status, err) = call(&app, Method::POST, &format!("/api/sessions/{id}/image"), Body::from("aGVsbG8="), false).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: Value = serde_json::from_slice(&err).unwrap();
        assert_eq!(err["error"], "INVALID_IMAGE");
    }

    #[tokio::test]
    async fn missing_api_key_surfaces_localized_alert() {
        let app = app_with(Arc::new(GeminiGateway::new(&Config::default())));
        let (_, session) = call_json(&app, Method::POST, "/api/sessions", Some(json!({ "language": "zh" }))).await;
        let id = session["id"].as_str().unwrap().to_string();
        call_json(&app, Method::POST, &format!("/api/sessions/{id}/profile/confirm"), None).await;

        let (status, bytes) = call(
            &app,
            Method::POST,
            &format!("/api/sessions/{id}/image"),
            Body::from(tiny_png().bytes().clone()),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let err: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err["message"], Language::Zh.texts().analysis_failed);

        let (_, s) = call_json(&app, Method::GET, &format!("/api/sessions/{id}"), None).await;
        assert_eq!(s["step"], "upload");
        assert_eq!(s["busy"]["analyzing"], false);
        assert_eq!(s["alert"], Language::Zh.texts().analysis_failed);
    }

    #[tokio::test]
    async fn errors_map_to_statuses() {
        let app = app_with(Arc::new(ScriptedGateway::default()));
        let (status, _) = call_json(&app, Method::GET, &format!("/api/sessions/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, session) = call_json(&app, Method::POST, "/api/sessions", None).await;
        let id = session["id"].as_str().unwrap().to_string();
        let (status, err) = call_json(&app, Method::POST, &format!("/api/sessions/{id}/styles/shuffle"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"], "WRONG_STEP");

        let (status, _) = call_json(&app, Method::GET, &format!("/api/sessions/{id}/hairstyle/image"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn deleted_session_is_not_found() {
        let app = app_with(Arc::new(ScriptedGateway::default()));
        let (_, session) = call_json(&app, Method::POST, "/api/sessions", None).await;
        let id = session["id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, Method::DELETE, &format!("/api/sessions/{id}"), Body::empty(), false).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call_json(&app, Method::GET, &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, Method::DELETE, &format!("/api/sessions/{id}"), Body::empty(), false).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chinese_guide_without_font_is_unprocessable() {
        let app = app_with(Arc::new(ScriptedGateway::default()));
        let (_, session) = call_json(&app, Method::POST, "/api/sessions", Some(json!({ "language": "zh" }))).await;
        let id = session["id"].as_str().unwrap().to_string();
        call_json(&app, Method::POST, &format!("/api/sessions/{id}/profile/confirm"), None).await;
        call(&app, Method::POST, &format!("/api/sessions/{id}/image"), Body::from(tiny_png().bytes().clone()), false).await;
        call_json(&app, Method::POST, &format!("/api/sessions/{id}/analysis/continue"), None).await;
        call_json(&app, Method::POST, &format!("/api/sessions/{id}/hairstyle"), Some(serde_json::to_value(request()).unwrap())).await;

        let (status, err) = call_json(&app, Method::GET, &format!("/api/sessions/{id}/hairstyle/guide.pdf"), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err["error"], "EXPORT_UNAVAILABLE");
    }

    #[tokio::test]
    async fn labels_follow_requested_language() {
        let app = app_with(Arc::new(ScriptedGateway::default()));
        let (status, table) = call_json(&app, Method::GET, "/api/labels?lang=en", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(table["steps"][3], "Style");
        let (_, table) = call_json(&app, Method::GET, "/api/labels", None).await;
        assert_eq!(table["language"], "zh");
    }
}
