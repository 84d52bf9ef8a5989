use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use futures::stream::Stream;
use gismap_shared::MapEvent;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::config::SSE_KEEPALIVE_SECS;
use crate::state::AppState;

pub async fn map_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before reading the snapshot so nothing published in between is lost.
    let rx = state.events.subscribe();

    let stream = async_stream::stream! {
        if let Some(event) = snapshot_event(&state).await {
            yield Ok(event);
        }

        let mut stream = BroadcastStream::new(rx);
        while let Some(result) = stream.next().await {
            match result {
                Ok(event) => {
                    let Ok(payload) = std::str::from_utf8(event.json.as_ref()) else {
                        warn!(
                            seq = event.seq,
                            event = event.name,
                            "event payload is not valid utf-8; dropping SSE event"
                        );
                        continue;
                    };
                    yield Ok(
                        Event::default()
                            .id(event.seq.to_string())
                            .event(event.name)
                            .data(payload),
                    );
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(
                        skipped_events = skipped,
                        "SSE client lagged behind broadcast buffer; replaying snapshot"
                    );
                    if let Some(event) = snapshot_event(&state).await {
                        yield Ok(event);
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keep-alive"),
    )
}

/// Full session state, stamped with the last sequence number published.
async fn snapshot_event(state: &AppState) -> Option<Event> {
    let seq = state.events.last_seq();
    let snapshot = MapEvent::Snapshot {
        seq,
        session: state.session_snapshot().await,
    };
    match serde_json::to_string(&snapshot) {
        Ok(payload) => Some(
            Event::default()
                .id(seq.to_string())
                .event(snapshot.event_name())
                .data(payload),
        ),
        Err(e) => {
            warn!("failed to serialize session snapshot: {e}");
            None
        }
    }
}
