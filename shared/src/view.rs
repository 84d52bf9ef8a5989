use serde::{Deserialize, Serialize};

use crate::srid::{Srid, UnknownSridError, world_width};

const TILE_SIZE_PX: f64 = 256.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Extent {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn rounded(&self, precision: u32) -> Self {
        Self {
            left: round_to(self.left, precision),
            bottom: round_to(self.bottom, precision),
            right: round_to(self.right, precision),
            top: round_to(self.top, precision),
        }
    }
}

/// View state as reported by the map once an interaction settles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawView {
    pub center: [f64; 2],
    pub zoom: f64,
    pub extent: Extent,
}

/// Rounded view published to every consumer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: [f64; 2],
    pub zoom: f64,
    pub extent: Extent,
}

impl MapView {
    /// Rounds center and extent to `precision` decimals. Zoom is kept as the
    /// map reported it.
    pub fn from_raw(raw: &RawView, precision: u32) -> Self {
        Self {
            center: [
                round_to(raw.center[0], precision),
                round_to(raw.center[1], precision),
            ],
            zoom: raw.zoom,
            extent: raw.extent.rounded(precision),
        }
    }
}

/// A published view together with the number of view changes seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub version: u64,
    pub view: MapView,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
}

impl ZoomLimits {
    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min, self.max)
    }
}

pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10_f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Map units per pixel at `zoom` for 256-pixel tiles spanning the world.
pub fn resolution(srid: Srid, zoom: f64) -> Result<f64, UnknownSridError> {
    Ok(world_width(srid)? / TILE_SIZE_PX / 2_f64.powf(zoom))
}

/// Raw view a map of `size_px` pixels shows when centered on `center` at
/// `zoom`, before any interaction has been reported.
pub fn initial_view(
    srid: Srid,
    center: [f64; 2],
    zoom: f64,
    size_px: (u32, u32),
) -> Result<RawView, UnknownSridError> {
    let res = resolution(srid, zoom)?;
    let half_w = f64::from(size_px.0) * res / 2.0;
    let half_h = f64::from(size_px.1) * res / 2.0;
    Ok(RawView {
        center,
        zoom,
        extent: Extent {
            left: center[0] - half_w,
            bottom: center[1] - half_h,
            right: center[0] + half_w,
            top: center[1] + half_h,
        },
    })
}
