use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::dispatcher::QueryDispatcher;
use crate::error::AssistantError;
use crate::modes::Mode;
use crate::session::{Exchange, Session};

/// Shared state: one dispatcher and one session per server process.
/// The session lock keeps a single request in flight.
pub struct AppState {
    dispatcher: QueryDispatcher,
    session: Mutex<Session>,
}

impl AppState {
    pub fn new(dispatcher: QueryDispatcher) -> Self {
        Self {
            dispatcher,
            session: Mutex::new(Session::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub mode: Mode,
    pub response: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModeInfo {
    pub name: Mode,
    pub heading: &'static str,
    pub input_label: &'static str,
    pub placeholder: &'static str,
    pub examples: &'static [&'static str],
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AssistantError {
    fn into_response(self) -> Response {
        let status = match &self {
            AssistantError::UnknownMode(_) => StatusCode::BAD_REQUEST,
            AssistantError::Http(_)
            | AssistantError::Provider { .. }
            | AssistantError::EmptyResponse => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn router(state: Arc<AppState>, bearer_token: Option<String>) -> Router {
    let mut router = Router::new()
        .route("/modes", get(list_modes))
        .route("/query", post(query))
        .route("/history", get(history))
        .route("/clear", post(clear))
        .with_state(state);

    if let Some(expected) = bearer_token {
        router = router.layer(middleware::from_fn_with_state(
            Arc::new(expected),
            require_bearer,
        ));
    }

    router.route("/health", get(|| async { "ok" }))
}

async fn list_modes() -> Json<Vec<ModeInfo>> {
    Json(
        Mode::ALL
            .iter()
            .map(|&mode| {
                let profile = mode.profile();
                ModeInfo {
                    name: mode,
                    heading: profile.heading,
                    input_label: profile.input_label,
                    placeholder: profile.placeholder,
                    examples: profile.examples,
                }
            })
            .collect(),
    )
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AssistantError> {
    let mode: Mode = body.mode.parse()?;
    let mut session = state.session.lock().await;
    let response = state
        .dispatcher
        .dispatch(&mut session, mode, &body.query)
        .await
        .inspect_err(|e| tracing::error!("Query failed: {}", e))?;
    Ok(Json(QueryResponse { mode, response }))
}

async fn history(State(state): State<Arc<AppState>>) -> Json<Vec<Exchange>> {
    let session = state.session.lock().await;
    Json(session.transcript().to_vec())
}

async fn clear(State(state): State<Arc<AppState>>) -> StatusCode {
    state.session.lock().await.clear();
    StatusCode::NO_CONTENT
}

async fn require_bearer(
    State(expected): State<Arc<String>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let headers: &HeaderMap = req.headers();
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", expected.as_str()))
        || req.uri().query().is_some_and(|q| {
            // Fallback for clients that cannot set headers
            q.split('&').any(|pair| {
                pair.split_once('=').is_some_and(|(k, v)| {
                    (k == "access_token" || k == "token") && v == expected.as_str()
                })
            })
        });
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(req).await
}
