//! Server-Sent Events live-update stream
//!
//! One connection per dashboard tab, waiting on a single property URL.
//! Frames are unnamed `data:` events so `EventSource.onmessage` sees them.
//! The stream ends after the first terminal frame (ready or timeout);
//! dropping it deregisters the connection.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use propscope_common::StreamEvent;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub property_url: Option<String>,
}

fn frame(event: &StreamEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize {} event: {}", event.event_type(), e);
            None
        }
    }
}

/// GET /api/stream?property_url=
pub async fn analysis_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let property_url = query
        .property_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("property_url query parameter required".to_string()))?;

    let mut subscription = state.registry.add_client(&property_url);
    let timeout = state.config.stream_timeout();
    info!("SSE: Client {} connected for {}", subscription.id(), property_url);

    let stream = async_stream::stream! {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("SSE: Client {} timed out waiting for {}", subscription.id(), property_url);
                    if let Some(data) = frame(&StreamEvent::Timeout) {
                        yield Ok(data);
                    }
                    break;
                }

                received = subscription.recv() => {
                    let Some(event) = received else {
                        debug!("SSE: Client {} released by registry", subscription.id());
                        break;
                    };
                    debug!("SSE: Sending {} event to {}", event.event_type(), subscription.id());
                    if let Some(data) = frame(&event) {
                        yield Ok(data);
                    }
                    if event.is_terminal() {
                        break;
                    }
                }
            }
        }
        // Subscription drops here, or when the client disconnects mid-wait
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.config.heartbeat_interval())
            .text("heartbeat"),
    ))
}

pub fn stream_routes() -> Router<AppState> {
    Router::new().route("/stream", get(analysis_stream))
}
