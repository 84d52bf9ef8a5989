use std::sync::Arc;

use gismap_shared::{AdapterError, FeatureRecord, GeometryKind, MapEvent, Projector, Srid};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::{MapConfig, WKT_LAYER};
use crate::registry::{Feature, LayerHandle, LayerOwner, RegistryError, SharedRegistry};
use crate::state::{EventBus, ObservabilityCounters};

#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Places hand-written WKT on the entry layer, one feature per geometry kind.
pub struct GeometryEntry {
    projector: Projector,
    registry: SharedRegistry,
    events: EventBus,
    counters: Arc<ObservabilityCounters>,
    layer: OnceCell<LayerHandle>,
}

impl GeometryEntry {
    pub fn new(
        config: &MapConfig,
        registry: SharedRegistry,
        events: EventBus,
        counters: Arc<ObservabilityCounters>,
    ) -> Self {
        Self {
            projector: Projector::new(config.working_srid),
            registry,
            events,
            counters,
            layer: OnceCell::new(),
        }
    }

    async fn handle(&self) -> Result<LayerHandle, RegistryError> {
        self.layer
            .get_or_try_init(|| async {
                self.registry
                    .write()
                    .await
                    .get_or_create(WKT_LAYER, LayerOwner::Entry)
            })
            .await
            .copied()
    }

    /// Parses `text` in `source`, reprojects it and replaces whatever
    /// geometry of the same kind was placed before. On error nothing changes.
    pub async fn place(&self, text: &str, source: Srid) -> Result<FeatureRecord, EntryError> {
        let geometry = self.projector.parse_text(text, source).inspect_err(|e| {
            if matches!(e, AdapterError::Parse(_)) {
                self.counters.record_wkt_parse_failure();
            }
            warn!(%source, error = %e, "rejected geometry text");
        })?;
        let id = geometry.kind().tag().to_string();
        let feature = Feature {
            id: Some(id.clone()),
            geometry,
        };
        let record = feature.to_record();

        let handle = self.handle().await?;
        let feature_count = self
            .registry
            .write()
            .await
            .upsert_feature(handle, feature.id, feature.geometry)?;
        self.publish(feature_count);

        debug!(%id, %source, "geometry placed");
        Ok(record)
    }

    /// Returns whether a geometry of `kind` was on the layer.
    pub async fn remove(&self, kind: GeometryKind) -> Result<bool, EntryError> {
        let handle = self.handle().await?;
        let mut registry = self.registry.write().await;
        let removed = registry.remove_feature(handle, kind.tag())?;
        if removed {
            let feature_count = registry.layer(handle)?.len();
            drop(registry);
            self.publish(feature_count);
        }
        Ok(removed)
    }

    pub async fn clear(&self) -> Result<(), EntryError> {
        let handle = self.handle().await?;
        self.registry.write().await.clear(handle)?;
        self.publish(0);
        Ok(())
    }

    fn publish(&self, feature_count: usize) {
        self.events.publish(MapEvent::LayerChanged {
            seq: 0,
            layer: WKT_LAYER.to_string(),
            feature_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use gismap_shared::{Coordinates, ParseErrorKind};

    use super::*;
    use crate::registry::LayerRegistry;

    fn entry() -> (GeometryEntry, SharedRegistry, Arc<ObservabilityCounters>) {
        let registry = LayerRegistry::shared();
        let counters = Arc::new(ObservabilityCounters::default());
        let entry = GeometryEntry::new(
            &MapConfig::default(),
            registry.clone(),
            EventBus::new(16),
            counters.clone(),
        );
        (entry, registry, counters)
    }

    async fn ids(registry: &SharedRegistry) -> Vec<Option<String>> {
        registry
            .read()
            .await
            .find_by_name(WKT_LAYER)
            .map(|layer| layer.features().iter().map(|f| f.id.clone()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn placing_same_kind_replaces_previous_geometry() {
        let (entry, registry, _) = entry();
        entry
            .place("POINT(139.7 35.7)", Srid::WGS84)
            .await
            .expect("first point");
        let record = entry
            .place("POINT(139.8 35.8)", Srid::WGS84)
            .await
            .expect("second point");
        entry
            .place("LINESTRING(139.7 35.7, 139.8 35.8)", Srid::WGS84)
            .await
            .expect("line");

        assert_eq!(record.id.as_deref(), Some("POINT"));
        assert_eq!(record.wkt.as_deref(), Some("POINT(139.8 35.8)"));
        assert_eq!(
            ids(&registry).await,
            [Some("POINT".to_string()), Some("LINESTRING".to_string())]
        );
    }

    #[tokio::test]
    async fn replaced_geometry_moves_to_the_end() {
        let (entry, registry, _) = entry();
        for text in ["POINT(1 2)", "LINESTRING(0 0, 1 1)", "POINT(3 4)"] {
            entry.place(text, Srid::WGS84).await.expect("place");
        }
        assert_eq!(
            ids(&registry).await,
            [Some("LINESTRING".to_string()), Some("POINT".to_string())]
        );
    }

    #[tokio::test]
    async fn geometry_is_reprojected_from_source_srid() {
        let (entry, _, _) = entry();
        let record = entry
            .place("POINT(0 0)", Srid::WEB_MERCATOR)
            .await
            .expect("mercator origin");
        let Coordinates::Position([x, y]) = record.geometry.coordinates else {
            panic!("expected a position");
        };
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);
    }

    #[tokio::test]
    async fn malformed_text_leaves_layer_untouched() {
        let (entry, registry, counters) = entry();
        entry
            .place("POINT(1 2)", Srid::WGS84)
            .await
            .expect("valid point");

        let err = entry
            .place("POLYGON((0 0, 1 0, 1 1, 0 0)", Srid::WGS84)
            .await
            .expect_err("unbalanced");
        assert!(matches!(
            err,
            EntryError::Adapter(AdapterError::Parse(ref e)) if e.kind == ParseErrorKind::Unbalanced
        ));
        assert_eq!(ids(&registry).await, [Some("POINT".to_string())]);
        assert_eq!(counters.snapshot().wkt_parse_failures_total, 1);
    }

    #[tokio::test]
    async fn unknown_source_srid_is_rejected() {
        let (entry, registry, _) = entry();
        let err = entry
            .place("POINT(1 2)", Srid(2193))
            .await
            .expect_err("no transform for 2193");
        assert!(matches!(err, EntryError::Adapter(AdapterError::UnknownSrid(_))));
        assert!(ids(&registry).await.is_empty());
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let (entry, registry, _) = entry();
        entry.place("POINT(1 2)", Srid::WGS84).await.expect("point");
        entry
            .place("POLYGON((0 0, 1 0, 1 1, 0 0))", Srid::WGS84)
            .await
            .expect("polygon");

        assert!(!entry.remove(GeometryKind::LineString).await.expect("remove"));
        assert!(entry.remove(GeometryKind::Point).await.expect("remove"));
        assert_eq!(ids(&registry).await, [Some("POLYGON".to_string())]);

        entry.clear().await.expect("clear");
        assert!(ids(&registry).await.is_empty());
        assert!(registry.read().await.find_by_name(WKT_LAYER).is_some());
    }
}
