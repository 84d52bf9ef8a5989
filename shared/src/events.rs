use serde::{Deserialize, Serialize};

use crate::session::{BaseMap, DrawLogEntry, DrawType, LayerSummary};
use crate::view::ViewSnapshot;

/// Session state changes pushed to the shell over the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MapEvent {
    Snapshot {
        #[serde(default)]
        seq: u64,
        session: SessionSnapshot,
    },
    ViewChanged {
        #[serde(default)]
        seq: u64,
        view: ViewSnapshot,
    },
    LayerChanged {
        #[serde(default)]
        seq: u64,
        layer: String,
        feature_count: usize,
    },
    BaseMapChanged {
        #[serde(default)]
        seq: u64,
        base_map: BaseMap,
    },
    DrawTypeChanged {
        #[serde(default)]
        seq: u64,
        draw_type: DrawType,
    },
    DrawCommitted {
        #[serde(default)]
        seq: u64,
        entry: DrawLogEntry,
    },
    DrawLogCleared {
        #[serde(default)]
        seq: u64,
    },
}

impl MapEvent {
    pub fn seq(&self) -> u64 {
        match self {
            Self::Snapshot { seq, .. }
            | Self::ViewChanged { seq, .. }
            | Self::LayerChanged { seq, .. }
            | Self::BaseMapChanged { seq, .. }
            | Self::DrawTypeChanged { seq, .. }
            | Self::DrawCommitted { seq, .. }
            | Self::DrawLogCleared { seq } => *seq,
        }
    }

    pub fn set_seq(&mut self, value: u64) {
        match self {
            Self::Snapshot { seq, .. }
            | Self::ViewChanged { seq, .. }
            | Self::LayerChanged { seq, .. }
            | Self::BaseMapChanged { seq, .. }
            | Self::DrawTypeChanged { seq, .. }
            | Self::DrawCommitted { seq, .. }
            | Self::DrawLogCleared { seq } => *seq = value,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::ViewChanged { .. } => "view",
            Self::LayerChanged { .. } => "layer",
            Self::BaseMapChanged { .. } => "base_map",
            Self::DrawTypeChanged { .. } => "draw_type",
            Self::DrawCommitted { .. } => "draw",
            Self::DrawLogCleared { .. } => "draw_log_cleared",
        }
    }
}

/// Everything a freshly connected shell needs to render the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub view: ViewSnapshot,
    pub base_map: BaseMap,
    pub layers: Vec<LayerSummary>,
    pub draw_type: DrawType,
    pub draw_log_len: usize,
}
