use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{Coordinates, GeometryKind, GeometryRecord};
use crate::style::LayerStyle;

/// Base imagery choices. Exactly one is visible at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BaseMap {
    #[default]
    Road,
    AerialWithLabels,
    #[serde(rename = "OSM")]
    Osm,
}

/// Geometry type a draw session is restricted to; `None` means no session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DrawType {
    #[default]
    None,
    Point,
    LineString,
    Polygon,
    Circle,
}

impl DrawType {
    pub fn geometry_kind(self) -> Option<GeometryKind> {
        match self {
            Self::None => None,
            Self::Point => Some(GeometryKind::Point),
            Self::LineString => Some(GeometryKind::LineString),
            Self::Polygon => Some(GeometryKind::Polygon),
            Self::Circle => Some(GeometryKind::Circle),
        }
    }
}

/// One committed draw gesture, as shown in the draw log panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawLogEntry {
    pub index: usize,
    pub kind: GeometryKind,
    pub coordinates: Coordinates,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub geometry: GeometryRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSummary {
    pub name: String,
    pub feature_count: usize,
    pub style: LayerStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDetail {
    pub name: String,
    pub style: LayerStyle,
    pub features: Vec<FeatureRecord>,
}
