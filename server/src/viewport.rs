use gismap_shared::view::initial_view;
use gismap_shared::{MapView, RawView, UnknownSridError, ViewSnapshot, ZoomLimits};
use tokio::sync::{broadcast, watch};

use crate::config::MapConfig;

const VIEW_CHANNEL_CAPACITY: usize = 64;

/// Holds the latest settled view and fans out every change in delivery order.
#[derive(Debug)]
pub struct ViewportTracker {
    precision: u32,
    limits: ZoomLimits,
    current: watch::Sender<ViewSnapshot>,
    changes: broadcast::Sender<ViewSnapshot>,
}

impl ViewportTracker {
    /// Starts at the configured center and zoom, with the extent a map of the
    /// configured pixel size would show. That first snapshot is version 0.
    pub fn new(config: &MapConfig) -> Result<Self, UnknownSridError> {
        let zoom = config.zoom_limits.clamp(config.initial_zoom);
        let raw = initial_view(
            config.working_srid,
            config.initial_center,
            zoom,
            config.viewport_size,
        )?;
        let snapshot = ViewSnapshot {
            version: 0,
            view: MapView::from_raw(&raw, config.precision),
        };
        let (current, _) = watch::channel(snapshot);
        let (changes, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
        Ok(Self {
            precision: config.precision,
            limits: config.zoom_limits,
            current,
            changes,
        })
    }

    /// Rounds and clamps a reported view, then publishes it as one snapshot.
    pub fn observe(&self, raw: RawView) -> ViewSnapshot {
        let mut view = MapView::from_raw(&raw, self.precision);
        view.zoom = self.limits.clamp(view.zoom);

        let mut published = None;
        self.current.send_modify(|snapshot| {
            snapshot.version += 1;
            snapshot.view = view;
            published = Some(*snapshot);
        });
        let snapshot = published.unwrap_or_else(|| *self.current.borrow());
        // No receivers just means nobody is listening yet.
        let _ = self.changes.send(snapshot);
        snapshot
    }

    pub fn current(&self) -> ViewSnapshot {
        *self.current.borrow()
    }

    /// Every snapshot published after this call, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewSnapshot> {
        self.changes.subscribe()
    }
}
