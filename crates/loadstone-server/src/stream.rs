// crates/loadstone-server/src/stream.rs
// ============================================================================
// Module: Event Stream Bridge
// Description: Server-Sent Events bridge over the metric hub subscription.
// Purpose: Deliver live run events to HTTP clients without blocking the hub.
// Dependencies: axum, loadstone-core, serde_json, tokio, tokio-stream
// ============================================================================

//! ## Overview
//! A hub subscription is a blocking channel; this module forwards it through
//! a bounded tokio channel on a blocking task. When the HTTP client goes
//! away the tokio receiver closes, the forwarding loop exits, and the
//! dropped subscription is reaped by the hub on its next publish.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::handlers::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Size of the async forwarding channel per SSE client.
const FORWARD_BUFFER: usize = 256;
/// Poll interval used to notice departed clients.
const FORWARD_POLL: Duration = Duration::from_millis(500);

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Streams hub events to the client as Server-Sent Events.
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.coordinator.subscribe();
    let (sender, receiver) = tokio::sync::mpsc::channel(FORWARD_BUFFER);

    tokio::task::spawn_blocking(move || {
        loop {
            match subscription.recv_timeout(FORWARD_POLL) {
                Some(event) => {
                    if sender.blocking_send(event).is_err() {
                        debug!(subscriber = %subscription.id(), "sse client departed");
                        break;
                    }
                }
                None => {
                    if sender.is_closed() {
                        debug!(subscriber = %subscription.id(), "sse client departed");
                        break;
                    }
                }
            }
        }
    });

    let stream = ReceiverStream::new(receiver).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(data))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
