//! HTTP handlers for the operator-facing API

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::registry::HubStatus;
use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Hub status response: connections plus transcription capacity
#[derive(Serialize)]
pub struct HubStatusResponse {
    #[serde(flatten)]
    pub hub: HubStatus,
    pub transcription: TranscriptionStatus,
}

#[derive(Serialize)]
pub struct TranscriptionStatus {
    pub enabled: bool,
    /// Transcription calls that could dispatch right now without queueing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_slots: Option<usize>,
}

/// Live connection and session summary
pub async fn hub_status(State(state): State<Arc<AppState>>) -> Json<HubStatusResponse> {
    let transcription = TranscriptionStatus {
        enabled: state.transcriber.is_some(),
        available_slots: state
            .transcriber
            .as_ref()
            .map(|bridge| bridge.available_slots()),
    };

    Json(HubStatusResponse {
        hub: state.registry.status(),
        transcription,
    })
}
