use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use gismap_shared::{MapEvent, SessionSnapshot, UnknownSridError};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use crate::config::MapConfig;
use crate::draw::DrawSessionController;
use crate::entry::GeometryEntry;
use crate::registry::{LayerRegistry, SharedRegistry};
use crate::services::boundary_source::HttpBoundarySource;
use crate::sync::{BoundarySource, BoundarySynchronizer};
use crate::viewport::ViewportTracker;

/// Event serialized once when published, shared by every SSE client via Arc.
#[derive(Debug, Clone)]
pub struct PreSerializedEvent {
    pub seq: u64,
    pub name: &'static str,
    pub json: Arc<Bytes>,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PreSerializedEvent>,
    // Held across stamp and send so subscribers see seq in increasing order.
    last_seq: Arc<Mutex<u64>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            last_seq: Arc::new(Mutex::new(0)),
        }
    }

    /// Stamps the next sequence number and fans the event out. Returns the
    /// sequence number used.
    pub fn publish(&self, mut event: MapEvent) -> u64 {
        let mut last_seq = self.last_seq.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = *last_seq + 1;
        *last_seq = seq;
        event.set_seq(seq);
        let json = match serde_json::to_vec(&event) {
            Ok(json) => Bytes::from(json),
            Err(e) => {
                warn!(seq, event = event.event_name(), "failed to serialize event: {e}");
                return seq;
            }
        };
        // No subscribers is fine; nobody is streaming yet.
        let _ = self.tx.send(PreSerializedEvent {
            seq,
            name: event.event_name(),
            json: Arc::new(json),
        });
        seq
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreSerializedEvent> {
        self.tx.subscribe()
    }

    pub fn last_seq(&self) -> u64 {
        *self.last_seq.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    view_changes_total: AtomicU64,
    boundary_fetches_total: AtomicU64,
    boundary_fetch_failures_total: AtomicU64,
    stale_boundary_responses_total: AtomicU64,
    draw_commits_total: AtomicU64,
    wkt_parse_failures_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ObservabilitySnapshot {
    pub view_changes_total: u64,
    pub boundary_fetches_total: u64,
    pub boundary_fetch_failures_total: u64,
    pub stale_boundary_responses_total: u64,
    pub draw_commits_total: u64,
    pub wkt_parse_failures_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            view_changes_total: self.view_changes_total.load(Ordering::Relaxed),
            boundary_fetches_total: self.boundary_fetches_total.load(Ordering::Relaxed),
            boundary_fetch_failures_total: self
                .boundary_fetch_failures_total
                .load(Ordering::Relaxed),
            stale_boundary_responses_total: self
                .stale_boundary_responses_total
                .load(Ordering::Relaxed),
            draw_commits_total: self.draw_commits_total.load(Ordering::Relaxed),
            wkt_parse_failures_total: self.wkt_parse_failures_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_view_change(&self) {
        self.view_changes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_boundary_fetch(&self) {
        self.boundary_fetches_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_boundary_fetch_failure(&self) {
        self.boundary_fetch_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_boundary_response(&self) {
        self.stale_boundary_responses_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_draw_commit(&self) {
        self.draw_commits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wkt_parse_failure(&self) {
        self.wkt_parse_failures_total.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    WorkingSrid(#[from] UnknownSridError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MapConfig>,
    pub registry: SharedRegistry,
    pub viewport: Arc<ViewportTracker>,
    pub boundaries: BoundarySynchronizer,
    pub draw: Arc<DrawSessionController>,
    pub entry: Arc<GeometryEntry>,
    pub events: EventBus,
    pub observability: Arc<ObservabilityCounters>,
}

impl AppState {
    pub fn new(config: MapConfig) -> Result<Self, StartupError> {
        let http_client = build_http_client(&config)?;
        let source = Arc::new(HttpBoundarySource::new(http_client));
        Ok(Self::with_source(config, source)?)
    }

    /// Same wiring as [`AppState::new`] with a caller-supplied boundary source.
    pub fn with_source(
        config: MapConfig,
        source: Arc<dyn BoundarySource>,
    ) -> Result<Self, UnknownSridError> {
        let config = Arc::new(config);
        let events = EventBus::new(config.event_buffer);
        let observability = Arc::new(ObservabilityCounters::default());
        let registry = LayerRegistry::shared();
        let viewport = Arc::new(ViewportTracker::new(&config)?);
        let boundaries = BoundarySynchronizer::new(
            &config,
            registry.clone(),
            viewport.clone(),
            source,
            events.clone(),
            observability.clone(),
        );
        let draw = Arc::new(DrawSessionController::new(
            registry.clone(),
            events.clone(),
            observability.clone(),
        ));
        let entry = Arc::new(GeometryEntry::new(
            &config,
            registry.clone(),
            events.clone(),
            observability.clone(),
        ));

        Ok(Self {
            config,
            registry,
            viewport,
            boundaries,
            draw,
            entry,
            events,
            observability,
        })
    }

    /// Everything a newly connected shell needs, read under one registry lock.
    pub async fn session_snapshot(&self) -> SessionSnapshot {
        let (base_map, layers) = {
            let registry = self.registry.read().await;
            (registry.base_map(), registry.summaries())
        };
        let draw = self.draw.status().await;
        SessionSnapshot {
            view: self.viewport.current(),
            base_map,
            layers,
            draw_type: draw.draw_type,
            draw_log_len: draw.log_len,
        }
    }
}

fn build_http_client(config: &MapConfig) -> Result<reqwest::Client, reqwest::Error> {
    let request_timeout = config.upstream_timeout;
    let connect_timeout = config.upstream_connect_timeout;
    reqwest::Client::builder()
        .user_agent(concat!("gismap/", env!("CARGO_PKG_VERSION")))
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        .build()
        .or_else(|e| {
            warn!(
                error = %e,
                "failed to build configured HTTP client, retrying without custom user-agent"
            );
            reqwest::Client::builder()
                .timeout(request_timeout)
                .connect_timeout(connect_timeout)
                .build()
        })
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;
    use gismap_shared::{BoundaryLayerConfig, BoundaryPayload, BoundaryQuery};

    use super::*;
    use crate::sync::FetchError;

    struct Unreachable;

    impl BoundarySource for Unreachable {
        fn fetch<'a>(
            &'a self,
            _layer: &'a BoundaryLayerConfig,
            _query: BoundaryQuery,
        ) -> BoxFuture<'a, Result<BoundaryPayload, FetchError>> {
            Box::pin(async { Err(FetchError::Transport("unreachable".into())) })
        }
    }

    #[tokio::test]
    async fn publish_stamps_increasing_sequence_numbers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(MapEvent::DrawLogCleared { seq: 0 });
        bus.publish(MapEvent::DrawLogCleared { seq: 0 });

        let first = rx.recv().await.expect("first event");
        let second = rx.recv().await.expect("second event");
        assert_eq!((first.seq, second.seq), (1, 2));
        assert_eq!(first.name, "draw_log_cleared");
        let decoded: MapEvent = serde_json::from_slice(&second.json).expect("valid json");
        assert_eq!(decoded.seq(), 2);
        assert_eq!(bus.last_seq(), 2);
    }

    #[test]
    fn concurrent_publishers_deliver_in_sequence_order() {
        let bus = EventBus::new(4096);
        let mut rx = bus.subscribe();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let bus = bus.clone();
                scope.spawn(move || {
                    for _ in 0..200 {
                        bus.publish(MapEvent::DrawLogCleared { seq: 0 });
                    }
                });
            }
        });

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.seq);
        }
        assert_eq!(seen, (1..=1600).collect::<Vec<u64>>());
    }

    #[test]
    fn event_buffer_comes_from_map_config() {
        let config = MapConfig {
            event_buffer: 1,
            ..MapConfig::default()
        };
        let state = AppState::with_source(config, Arc::new(Unreachable)).expect("state");
        let mut rx = state.events.subscribe();
        state.events.publish(MapEvent::DrawLogCleared { seq: 0 });
        state.events.publish(MapEvent::DrawLogCleared { seq: 0 });
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
    }

    #[test]
    fn publish_without_subscribers_still_advances() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(MapEvent::DrawLogCleared { seq: 0 }), 1);
    }

    #[test]
    fn counters_snapshot_reflects_records() {
        let counters = ObservabilityCounters::default();
        counters.record_boundary_fetch();
        counters.record_boundary_fetch();
        counters.record_stale_boundary_response();
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.boundary_fetches_total, 2);
        assert_eq!(snapshot.stale_boundary_responses_total, 1);
        assert_eq!(snapshot.draw_commits_total, 0);
    }
}
