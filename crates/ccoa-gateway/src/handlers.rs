use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use ccoa_core::types::{ChatRequest, ChatResponse, OnboardRequest, OnboardResponse};

use crate::error::ApiError;
use crate::server::AppState;

#[derive(serde::Serialize)]
struct RootResponse {
    message: &'static str,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|rejection| ApiError::invalid_request(rejection.status(), rejection.body_text()))
}

pub(crate) async fn root_handler() -> impl IntoResponse {
    Json(RootResponse {
        message: "CCOA Backend is running!",
    })
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub(crate) async fn onboard_handler(
    State(state): State<AppState>,
    body: Result<Json<OnboardRequest>, JsonRejection>,
) -> Result<Json<OnboardResponse>, ApiError> {
    let request = payload(body)?;
    tracing::info!(repo = %request.repo_url, "onboard request");
    let response = state.assistant.onboard(&request.repo_url).await?;
    Ok(Json(response))
}

pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = payload(body)?;
    tracing::info!(session_id = %request.session_id, "chat request");
    let response = state
        .assistant
        .chat(&request.session_id, &request.query)
        .await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok",
            uptime_secs: 42,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"uptime_secs\":42"));
    }

    #[test]
    fn root_response_serializes() {
        let json = serde_json::to_value(RootResponse {
            message: "CCOA Backend is running!",
        })
        .unwrap();
        assert_eq!(json["message"], "CCOA Backend is running!");
    }
}
