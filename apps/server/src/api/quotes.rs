//! Quote delivery: polling REST, WebSocket and SSE on the same hub.
//!
//! `/api/quotes` serves both the synchronous JSON snapshot and, when the
//! Upgrade header is present, the WebSocket stream. Every transport
//! starts with the full current snapshot and then receives one
//! `{"items": [...]}` frame per broadcast.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_core::stream::Stream;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

use quotehub_market_data::{Quote, SnapshotFrame};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
    scheduler::cold_start_fetch,
};

/// SSE keep-alive period; bare comment frames hold intermediary proxies
/// open without being seen as data by EventSource clients.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Diagnostic tag for which path produced a polling response.
#[derive(Serialize)]
pub struct QuotesResponse {
    pub items: Vec<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
}

/// `GET /api/quotes`, WebSocket upgrade and JSON snapshot share the path.
/// A request without valid upgrade headers rejects the extractor and is
/// served the JSON snapshot instead.
pub async fn quotes_entry(
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    if let Ok(ws) = ws {
        return Ok(ws
            .on_upgrade(move |socket| handle_socket(socket, state))
            .into_response());
    }
    let body = poll_snapshot(&state).await?;
    Ok(Json(body).into_response())
}

/// Synchronous polling path with the cold-start fetch-if-empty guard.
async fn poll_snapshot(state: &Arc<AppState>) -> ApiResult<QuotesResponse> {
    let items = state.hub.get_all();
    if !items.is_empty() {
        return Ok(QuotesResponse {
            items,
            source: Some("cache"),
        });
    }

    // Empty cache. The daily throttle can forbid the inline fetch, in
    // which case "no data yet" is the valid answer.
    if !state.fetch_permitted() {
        return Ok(QuotesResponse {
            items: vec![],
            source: Some("empty"),
        });
    }

    debug!("Cold start: fetching through the fallback chain inline");
    cold_start_fetch(state).await;

    let items = state.hub.get_all();
    if items.is_empty() {
        return Err(ApiError::BadGateway(
            "no quotes available from any provider".to_string(),
        ));
    }
    Ok(QuotesResponse {
        items,
        source: Some("yahoo_or_fallback"),
    })
}

/// `GET /api/quotes/events` - Server-Sent Events stream.
pub async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let initial = SnapshotFrame {
        items: state.hub.get_all(),
    };
    let initial_event = SseEvent::default()
        .json_data(&initial)
        .unwrap_or_else(|_| SseEvent::default().data("{\"items\":[]}"));

    let receiver = BroadcastStream::new(state.hub.subscribe());
    let updates = tokio_stream::StreamExt::filter_map(receiver, |frame| match frame {
        Ok(frame) => match SseEvent::default().json_data(&frame) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                tracing::error!("Failed to serialize SSE snapshot frame: {}", err);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            debug!("SSE subscriber lagged, skipped {} frames", skipped);
            None
        }
    });
    let stream =
        tokio_stream::StreamExt::chain(tokio_stream::once(Ok(initial_event)), updates);

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL))
}

/// One connected WebSocket client: immediate snapshot, then every
/// broadcast until disconnect. Dropping the broadcast receiver on return
/// deregisters the client from the hub.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut receiver = state.hub.subscribe();
    debug!("WS client connected ({} total)", state.hub.subscriber_count());

    let initial = SnapshotFrame {
        items: state.hub.get_all(),
    };
    if send_frame(&mut socket, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            frame = receiver.recv() => match frame {
                Ok(frame) => {
                    if send_frame(&mut socket, &frame).await.is_err() {
                        // this client only; other subscribers are unaffected
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("WS subscriber lagged, skipped {} frames", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("WS client disconnected ({} remaining)", state.hub.subscriber_count().saturating_sub(1));
}

async fn send_frame(socket: &mut WebSocket, frame: &SnapshotFrame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(err) => {
            // serialization of our own frame failing is a bug, not flakiness
            tracing::error!("Failed to serialize WS snapshot frame: {}", err);
            return Err(());
        }
    };
    if let Err(err) = socket.send(Message::Text(json.into())).await {
        warn!("WS send failed: {}", err);
        return Err(());
    }
    Ok(())
}
