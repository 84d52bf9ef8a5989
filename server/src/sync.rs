//! Keeps boundary layers in step with the viewport.
//!
//! Every fetch is tagged with a version drawn from one monotonically increasing
//! counter. A response is applied only while its version is still the latest
//! one issued for that layer and the layer is still enabled. The check and the
//! replacement happen under the registry write lock, and `disable` bumps the
//! version under the same lock, so an in-flight response can never resurrect a
//! disabled layer or overwrite a newer viewport's result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures::future::BoxFuture;
use gismap_shared::{
    BoundaryDecodeError, BoundaryLayerConfig, BoundaryPayload, BoundaryQuery, MapEvent, MapView,
    ProjectionError, Srid, reproject,
};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MapConfig;
use crate::registry::{LayerHandle, LayerOwner, RegistryError, SharedRegistry};
use crate::state::{EventBus, ObservabilityCounters};
use crate::viewport::ViewportTracker;

/// Where boundary geometry comes from.
pub trait BoundarySource: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        layer: &'a BoundaryLayerConfig,
        query: BoundaryQuery,
    ) -> BoxFuture<'a, Result<BoundaryPayload, FetchError>>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    /// Non-2xx response. `body` is the JSON body when it parses, otherwise
    /// the raw text as a JSON string.
    #[error("upstream returned {status}: {body}")]
    Status {
        status: u16,
        body: serde_json::Value,
    },
    #[error(transparent)]
    Decode(#[from] BoundaryDecodeError),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unknown boundary layer `{0}`")]
    UnknownLayer(String),
    #[error("boundary fetch for `{layer}` failed: {source}")]
    Fetch {
        layer: String,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Applied { version: u64, features: usize },
    /// A newer fetch was issued, or the layer was disabled, while this one
    /// was in flight.
    Discarded { version: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryLayerStatus {
    pub name: String,
    pub url: String,
    pub enabled: bool,
}

#[derive(Clone)]
pub struct BoundarySynchronizer {
    inner: Arc<Inner>,
}

struct Inner {
    layers: Vec<BoundaryLayerConfig>,
    working_srid: Srid,
    registry: SharedRegistry,
    viewport: Arc<ViewportTracker>,
    source: Arc<dyn BoundarySource>,
    events: EventBus,
    counters: Arc<ObservabilityCounters>,
    subscriptions: DashMap<String, LayerHandle>,
    issued: DashMap<String, u64>,
    next_version: AtomicU64,
}

impl BoundarySynchronizer {
    pub fn new(
        config: &MapConfig,
        registry: SharedRegistry,
        viewport: Arc<ViewportTracker>,
        source: Arc<dyn BoundarySource>,
        events: EventBus,
        counters: Arc<ObservabilityCounters>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                layers: config.boundary_layers.clone(),
                working_srid: config.working_srid,
                registry,
                viewport,
                source,
                events,
                counters,
                subscriptions: DashMap::new(),
                issued: DashMap::new(),
                next_version: AtomicU64::new(0),
            }),
        }
    }

    fn layer_config(&self, name: &str) -> Result<&BoundaryLayerConfig, SyncError> {
        self.inner
            .layers
            .iter()
            .find(|layer| layer.name == name)
            .ok_or_else(|| SyncError::UnknownLayer(name.to_string()))
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.inner.subscriptions.contains_key(name)
    }

    pub fn statuses(&self) -> Vec<BoundaryLayerStatus> {
        self.inner
            .layers
            .iter()
            .map(|layer| BoundaryLayerStatus {
                name: layer.name.clone(),
                url: layer.url.clone(),
                enabled: self.is_enabled(&layer.name),
            })
            .collect()
    }

    /// Subscribes the layer and fetches for the current view. On failure the
    /// layer keeps whatever it held before and stays subscribed.
    pub async fn enable(&self, name: &str) -> Result<SyncOutcome, SyncError> {
        let layer = self.layer_config(name)?.clone();
        let handle = {
            let mut registry = self.inner.registry.write().await;
            let handle = registry.get_or_create(name, LayerOwner::Boundary)?;
            self.inner.subscriptions.insert(layer.name.clone(), handle);
            handle
        };
        info!(layer = %name, "boundary layer enabled");

        let version = self.issue_version(name);
        let view = self.inner.viewport.current().view;
        self.sync_layer(&layer, handle, version, view).await
    }

    /// Drops the subscription and clears the layer. Returns whether the layer
    /// was enabled.
    pub async fn disable(&self, name: &str) -> Result<bool, SyncError> {
        self.layer_config(name)?;

        let mut registry = self.inner.registry.write().await;
        self.issue_version(name);
        let Some((_, handle)) = self.inner.subscriptions.remove(name) else {
            return Ok(false);
        };
        registry.clear(handle)?;
        self.inner.events.publish(MapEvent::LayerChanged {
            seq: 0,
            layer: name.to_string(),
            feature_count: 0,
        });
        drop(registry);

        info!(layer = %name, "boundary layer disabled");
        Ok(true)
    }

    /// Starts one independent fetch-and-replace per enabled layer. Versions are
    /// issued before anything is spawned, so delivery order decides which
    /// response wins.
    pub fn on_viewport_changed(
        &self,
        view: MapView,
    ) -> Vec<JoinHandle<Result<SyncOutcome, SyncError>>> {
        let targets: Vec<(String, LayerHandle)> = self
            .inner
            .subscriptions
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        targets
            .into_iter()
            .filter_map(|(name, handle)| {
                let layer = self.layer_config(&name).ok()?.clone();
                let version = self.issue_version(&name);
                let this = self.clone();
                Some(tokio::spawn(async move {
                    this.sync_layer(&layer, handle, version, view).await
                }))
            })
            .collect()
    }

    fn issue_version(&self, name: &str) -> u64 {
        let version = self.inner.next_version.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.issued.insert(name.to_string(), version);
        version
    }

    fn is_latest(&self, name: &str, version: u64) -> bool {
        self.inner.subscriptions.contains_key(name)
            && self
                .inner
                .issued
                .get(name)
                .is_some_and(|latest| *latest == version)
    }

    async fn sync_layer(
        &self,
        layer: &BoundaryLayerConfig,
        handle: LayerHandle,
        version: u64,
        view: MapView,
    ) -> Result<SyncOutcome, SyncError> {
        let inner = &self.inner;
        let query = BoundaryQuery::from_view(&view);
        inner.counters.record_boundary_fetch();
        debug!(
            layer = %layer.name,
            version,
            query = %query.to_query_string(),
            "fetching boundaries"
        );

        let payload = match inner.source.fetch(layer, query).await {
            Ok(payload) => payload,
            Err(e) => {
                inner.counters.record_boundary_fetch_failure();
                warn!(layer = %layer.name, version, error = %e, "boundary fetch failed");
                return Err(SyncError::Fetch {
                    layer: layer.name.clone(),
                    source: e,
                });
            }
        };

        let source_srid = payload.srid_or(inner.working_srid);
        let geometries = payload
            .geometries
            .iter()
            .map(|geometry| reproject(geometry, source_srid, inner.working_srid))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| {
                inner.counters.record_boundary_fetch_failure();
                warn!(layer = %layer.name, version, %source_srid, error = %e, "boundary reprojection failed");
            })?;

        let mut registry = inner.registry.write().await;
        if !self.is_latest(&layer.name, version) {
            inner.counters.record_stale_boundary_response();
            debug!(layer = %layer.name, version, "discarding stale boundary response");
            return Ok(SyncOutcome::Discarded { version });
        }
        let features = registry.replace_features(handle, geometries)?;
        inner.events.publish(MapEvent::LayerChanged {
            seq: 0,
            layer: layer.name.clone(),
            feature_count: features,
        });
        drop(registry);

        debug!(layer = %layer.name, version, features, "boundary layer replaced");
        Ok(SyncOutcome::Applied { version, features })
    }
}
