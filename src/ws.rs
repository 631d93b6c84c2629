use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use crate::state::AppState;

/// Drives one progress observer: register, forward every snapshot from the
/// broadcaster, unregister on disconnect or delivery failure. A stuck
/// observer only ever loses its own snapshots; ingestion and the other
/// observers are unaffected.
pub async fn handle_observer(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (id, mut snapshots) = state.broadcaster.register();

    // Late joiners get the current state straight away.
    let current = state.progress.snapshot();
    if ws_tx
        .send(Message::Text(serde_json::to_string(&current).unwrap().into()))
        .await
        .is_err()
    {
        state.broadcaster.unregister(&id);
        return;
    }

    info!(observer = %id, "progress observer connected");

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => {
                match snapshot {
                    Some(snapshot) => {
                        let payload = serde_json::to_string(&snapshot).unwrap();
                        if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                            warn!(observer = %id, "snapshot delivery failed, dropping observer");
                            break;
                        }
                    }
                    None => break,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!(observer = %id, "observer disconnected");
                        break;
                    }
                    _ => continue,
                }
            }
        }
    }

    state.broadcaster.unregister(&id);
}
