// Loan Approval Gate - REST API with Axum
// Same operations as the TUI/CLI; credentials are checked on every
// prediction request (no session tokens).

use crate::applicant::RawApplicant;
use crate::credentials::{CredentialStore, RegisterOutcome};
use crate::db::SqliteUserStore;
use crate::error::PredictionError;
use crate::model::{Predictor, Verdict};
use crate::session::{MSG_BAD_LOGIN, MSG_EMPTY_FIELDS, MSG_TAKEN};
use crate::VERSION;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Shared application state
pub struct AppState {
    pub credentials: CredentialStore<SqliteUserStore>,
    pub predictor: Predictor,
    pub model_fingerprint: String,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub username: String,
    pub password: String,
    pub applicant: RawApplicant,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model_fingerprint: String,
    schema: Vec<String>,
}

#[derive(Serialize)]
struct UserResponse {
    username: String,
}

#[derive(Serialize)]
struct PredictResponse {
    verdict: Verdict,
    message: &'static str,
}

/// Run a store/model call on the blocking pool.
async fn blocking<T, F>(state: Arc<AppState>, f: F) -> Result<T, Response>
where
    F: FnOnce(&AppState) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!(error = %e, "Blocking task failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        })?
        .map_err(|e| {
            error!(error = %e, "Storage error");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
        })
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "OK",
        version: VERSION,
        model_fingerprint: state.model_fingerprint.clone(),
        schema: state.predictor.schema().to_vec(),
    }))
}

/// POST /api/register - Create a user
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Response {
    if req.username.is_empty() || req.password.is_empty() {
        return failure(StatusCode::BAD_REQUEST, MSG_EMPTY_FIELDS);
    }

    let username = req.username.clone();
    match blocking(state, move |s| s.credentials.register(&req.username, &req.password)).await {
        Ok(RegisterOutcome::Registered) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(UserResponse { username })),
        )
            .into_response(),
        Ok(RegisterOutcome::AlreadyExists) => failure(StatusCode::CONFLICT, MSG_TAKEN),
        Err(response) => response,
    }
}

/// POST /api/login - Check credentials
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Response {
    let username = req.username.clone();
    match blocking(state, move |s| s.credentials.login(&req.username, &req.password)).await {
        Ok(true) => Json(ApiResponse::ok(UserResponse { username })).into_response(),
        Ok(false) => failure(StatusCode::UNAUTHORIZED, MSG_BAD_LOGIN),
        Err(response) => response,
    }
}

/// GET /api/users - List usernames
async fn list_users(State(state): State<Arc<AppState>>) -> Response {
    match blocking(state, |s| s.credentials.list_users()).await {
        Ok(users) => Json(ApiResponse::ok(users)).into_response(),
        Err(response) => response,
    }
}

/// POST /api/predict - Authenticate, then predict one applicant
async fn predict(State(state): State<Arc<AppState>>, Json(req): Json<PredictRequest>) -> Response {
    let outcome = blocking(state, move |s| -> anyhow::Result<Option<Result<Verdict, PredictionError>>> {
        if !s.credentials.login(&req.username, &req.password)? {
            return Ok(None);
        }

        let result = s.predictor.predict(&req.applicant);
        match &result {
            Ok(verdict) => s.credentials.record_prediction(&req.username, verdict.as_str()),
            Err(e) if !e.is_user_input() => {
                warn!(username = %req.username, error = %e, "Prediction failed")
            }
            Err(_) => {}
        }
        Ok(Some(result))
    })
    .await;

    match outcome {
        Ok(None) => failure(StatusCode::UNAUTHORIZED, MSG_BAD_LOGIN),
        Ok(Some(Ok(verdict))) => Json(ApiResponse::ok(PredictResponse {
            verdict,
            message: verdict.message(),
        }))
        .into_response(),
        Ok(Some(Err(e))) if e.is_user_input() => {
            failure(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Ok(Some(Err(e))) => failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Prediction failed: {}", e),
        ),
        Err(response) => response,
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/users", get(list_users))
        .route("/predict", post(predict))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{reference_applicant, StubClassifier};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(label: i64) -> Router {
        let state = AppState {
            credentials: CredentialStore::new(SqliteUserStore::open_in_memory().unwrap()),
            predictor: Predictor::new(StubClassifier::returning(label)),
            model_fingerprint: "stub".to_string(),
        };
        router(Arc::new(state))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn creds(username: &str, password: &str) -> serde_json::Value {
        serde_json::json!({ "username": username, "password": password })
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(1);
        let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["data"]["model_fingerprint"], "stub");
        assert_eq!(json["data"]["schema"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_register_status_codes() {
        let app = app(1);

        let (status, json) = send(&app, "POST", "/api/register", creds("alice", "pw1")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["username"], "alice");

        let (status, json) = send(&app, "POST", "/api/register", creds("alice", "pw2")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], MSG_TAKEN);

        let (status, _) = send(&app, "POST", "/api/register", creds("bob", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(&app, "GET", "/api/users", serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], serde_json::json!(["alice"]));
    }

    #[tokio::test]
    async fn test_login() {
        let app = app(1);
        send(&app, "POST", "/api/register", creds("alice", "pw1")).await;

        let (status, json) = send(&app, "POST", "/api/login", creds("alice", "pw1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let (status, json) = send(&app, "POST", "/api/login", creds("alice", "wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], MSG_BAD_LOGIN);
    }

    #[tokio::test]
    async fn test_predict_flow() {
        let app = app(1);
        send(&app, "POST", "/api/register", creds("alice", "pw1")).await;

        let body = serde_json::json!({
            "username": "alice",
            "password": "pw1",
            "applicant": reference_applicant(),
        });
        let (status, json) = send(&app, "POST", "/api/predict", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["verdict"], "Approved");

        let body = serde_json::json!({
            "username": "alice",
            "password": "nope",
            "applicant": reference_applicant(),
        });
        let (status, _) = send(&app, "POST", "/api/predict", body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut applicant = reference_applicant();
        applicant.property_area = "Atlantis".to_string();
        let body = serde_json::json!({ "username": "alice", "password": "pw1", "applicant": applicant });
        let (status, json) = send(&app, "POST", "/api/predict", body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"], "Invalid value 'Atlantis' for Property_Area");
    }

    #[tokio::test]
    async fn test_predict_unexpected_label_is_server_error() {
        let app = app(3);
        send(&app, "POST", "/api/register", creds("alice", "pw1")).await;

        let body = serde_json::json!({
            "username": "alice",
            "password": "pw1",
            "applicant": reference_applicant(),
        });
        let (status, json) = send(&app, "POST", "/api/predict", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().starts_with("Prediction failed"));
    }
}
