use axum::{
    extract::{Multipart, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::{info, warn};

use crate::ingest::IncomingFile;
use crate::state::AppState;
use crate::ws;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Accepts a multipart batch, acknowledges immediately with the accepted
/// count, and ingests in a background task. Per-file outcomes are not part
/// of the acknowledgement; observers follow along over `/ws/progress`.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> impl IntoResponse {
    let mut batch = Vec::new();
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "unnamed".to_string());
                match field.bytes().await {
                    Ok(bytes) => batch.push(IncomingFile { filename, bytes }),
                    Err(e) => {
                        warn!(filename = %filename, error = %e, "failed to read multipart field");
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(serde_json::json!({"error": format!("unreadable field: {e}")})),
                        )
                            .into_response();
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": format!("invalid multipart body: {e}")})),
                )
                    .into_response();
            }
        }
    }

    if batch.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "no files in request"})),
        )
            .into_response();
    }

    let accepted = batch.len();
    info!(files = accepted, "upload accepted, scheduling ingestion");

    let ingestor = state.ingestor.clone();
    tokio::spawn(async move {
        ingestor.ingest(batch).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"accepted": accepted})),
    )
        .into_response()
}

pub async fn progress(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.progress.snapshot())
}

pub async fn ws_progress(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws::handle_observer(socket, state))
}
