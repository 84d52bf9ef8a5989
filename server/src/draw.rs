use std::sync::Arc;

use chrono::Utc;
use geo::{Coord, LineString, Point, Polygon};
use gismap_shared::{Circle, DrawLogEntry, DrawType, Geometry, GeometryKind, MapEvent};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::DRAW_LAYER;
use crate::registry::{LayerHandle, LayerOwner, RegistryError, SharedRegistry};
use crate::state::{EventBus, ObservabilityCounters};

#[derive(Debug, Error)]
pub enum DrawError {
    #[error("no draw session is active")]
    NoSession,
    #[error("{kind:?} needs at least {min} vertices, got {found}")]
    TooFewVertices {
        kind: GeometryKind,
        min: usize,
        found: usize,
    },
    #[error("vertex {index} is not a finite coordinate")]
    NonFiniteVertex { index: usize },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The pointer interaction currently installed on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interaction {
    pub id: u64,
    pub draw_type: DrawType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawStatus {
    pub draw_type: DrawType,
    /// Installed pointer interactions; never more than one.
    pub interactions: Vec<Interaction>,
    pub log_len: usize,
}

#[derive(Debug, Default)]
struct Session {
    draw_type: DrawType,
    interactions: Vec<Interaction>,
    next_interaction: u64,
    log: Vec<DrawLogEntry>,
    layer: Option<LayerHandle>,
}

pub struct DrawSessionController {
    registry: SharedRegistry,
    events: EventBus,
    counters: Arc<ObservabilityCounters>,
    session: Mutex<Session>,
}

impl DrawSessionController {
    pub fn new(
        registry: SharedRegistry,
        events: EventBus,
        counters: Arc<ObservabilityCounters>,
    ) -> Self {
        Self {
            registry,
            events,
            counters,
            session: Mutex::new(Session::default()),
        }
    }

    /// Tears down the current interaction, then installs one bound to
    /// `draw_type` unless it is `None`. The draw layer is attached on first use.
    pub async fn start(&self, draw_type: DrawType) -> Result<Option<Interaction>, DrawError> {
        let mut session = self.session.lock().await;
        session.interactions.clear();

        if draw_type != DrawType::None && session.layer.is_none() {
            let handle = self
                .registry
                .write()
                .await
                .get_or_create(DRAW_LAYER, LayerOwner::Draw)?;
            session.layer = Some(handle);
        }

        let installed = if draw_type == DrawType::None {
            None
        } else {
            session.next_interaction += 1;
            let interaction = Interaction {
                id: session.next_interaction,
                draw_type,
            };
            session.interactions.push(interaction);
            Some(interaction)
        };

        let changed = session.draw_type != draw_type;
        session.draw_type = draw_type;
        drop(session);

        if changed {
            info!(?draw_type, "draw type changed");
            self.events.publish(MapEvent::DrawTypeChanged { seq: 0, draw_type });
        }
        Ok(installed)
    }

    pub async fn stop(&self) -> Result<(), DrawError> {
        self.start(DrawType::None).await.map(|_| ())
    }

    /// Commits one finished gesture: the log entry first, then the feature.
    /// Circles use the first vertex as center and the last as rim point.
    pub async fn complete_gesture(&self, vertices: &[[f64; 2]]) -> Result<DrawLogEntry, DrawError> {
        let mut session = self.session.lock().await;
        let Some(handle) = session.layer else {
            return Err(DrawError::NoSession);
        };
        let geometry = gesture_geometry(session.draw_type, vertices)?;
        let kind = geometry.kind();

        let entry = DrawLogEntry {
            index: session.log.len(),
            kind,
            coordinates: geometry.coordinates(),
            recorded_at: Utc::now(),
        };
        session.log.push(entry.clone());
        self.events.publish(MapEvent::DrawCommitted {
            seq: 0,
            entry: entry.clone(),
        });

        let feature_count = self
            .registry
            .write()
            .await
            .upsert_feature(handle, None, geometry)?;
        self.events.publish(MapEvent::LayerChanged {
            seq: 0,
            layer: DRAW_LAYER.to_string(),
            feature_count,
        });
        drop(session);

        self.counters.record_draw_commit();
        debug!(index = entry.index, ?kind, "draw gesture committed");
        Ok(entry)
    }

    pub async fn log(&self) -> Vec<DrawLogEntry> {
        self.session.lock().await.log.clone()
    }

    /// Empties the log only; drawn features stay on the map.
    pub async fn clear_log(&self) {
        self.session.lock().await.log.clear();
        self.events.publish(MapEvent::DrawLogCleared { seq: 0 });
    }

    /// Removes drawn features; the log is untouched.
    pub async fn clear_layer(&self) -> Result<(), DrawError> {
        let session = self.session.lock().await;
        let Some(handle) = session.layer else {
            return Ok(());
        };
        self.registry.write().await.clear(handle)?;
        self.events.publish(MapEvent::LayerChanged {
            seq: 0,
            layer: DRAW_LAYER.to_string(),
            feature_count: 0,
        });
        Ok(())
    }

    pub async fn status(&self) -> DrawStatus {
        let session = self.session.lock().await;
        DrawStatus {
            draw_type: session.draw_type,
            interactions: session.interactions.clone(),
            log_len: session.log.len(),
        }
    }
}

fn min_vertices(draw_type: DrawType) -> usize {
    match draw_type {
        DrawType::None => 0,
        DrawType::Point => 1,
        DrawType::LineString | DrawType::Circle => 2,
        DrawType::Polygon => 3,
    }
}

fn gesture_geometry(draw_type: DrawType, vertices: &[[f64; 2]]) -> Result<Geometry, DrawError> {
    let kind = draw_type.geometry_kind().ok_or(DrawError::NoSession)?;
    let min = min_vertices(draw_type);
    if vertices.len() < min {
        return Err(DrawError::TooFewVertices {
            kind,
            min,
            found: vertices.len(),
        });
    }
    if let Some(index) = vertices
        .iter()
        .position(|[x, y]| !x.is_finite() || !y.is_finite())
    {
        return Err(DrawError::NonFiniteVertex { index });
    }

    let coords: Vec<Coord<f64>> = vertices.iter().map(|&[x, y]| Coord { x, y }).collect();
    let (Some(&first), Some(&last)) = (coords.first(), coords.last()) else {
        return Err(DrawError::TooFewVertices {
            kind,
            min,
            found: 0,
        });
    };
    let geometry = match draw_type {
        DrawType::Point => Geometry::Point(Point(first)),
        DrawType::Circle => Geometry::Circle(Circle::new(first, last)),
        DrawType::LineString => Geometry::LineString(LineString::new(coords)),
        // geo closes the ring.
        DrawType::Polygon => Geometry::Polygon(Polygon::new(LineString::new(coords), Vec::new())),
        DrawType::None => return Err(DrawError::NoSession),
    };
    Ok(geometry)
}
