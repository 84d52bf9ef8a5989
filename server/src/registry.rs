use std::fmt;
use std::sync::Arc;

use gismap_shared::{
    BaseMap, FeatureRecord, Geometry, LayerDetail, LayerStyle, LayerSummary, wkt,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

pub type SharedRegistry = Arc<RwLock<LayerRegistry>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LayerId(u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Actor allowed to mutate a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LayerOwner {
    Entry,
    Draw,
    Boundary,
}

/// Capability to mutate one layer. Only the registry hands these out, and only
/// to the owner the layer was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerHandle {
    id: LayerId,
    owner: LayerOwner,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<String>,
    pub geometry: Geometry,
}

impl Feature {
    pub fn to_record(&self) -> FeatureRecord {
        FeatureRecord {
            id: self.id.clone(),
            geometry: self.geometry.to_record(),
            wkt: wkt::format(&self.geometry),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NamedLayer {
    id: LayerId,
    name: String,
    owner: LayerOwner,
    style: LayerStyle,
    features: Vec<Feature>,
}

impl NamedLayer {
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn summary(&self) -> LayerSummary {
        LayerSummary {
            name: self.name.clone(),
            feature_count: self.features.len(),
            style: self.style,
        }
    }

    pub fn detail(&self) -> LayerDetail {
        LayerDetail {
            name: self.name.clone(),
            style: self.style,
            features: self.features.iter().map(Feature::to_record).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("layer `{name}` is owned by {owner:?}")]
    NameTaken { name: String, owner: LayerOwner },
    #[error("layer handle {0} does not belong to this registry")]
    StaleHandle(LayerId),
}

/// Overlay layers in attach order, plus the base map selection.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    layers: Vec<NamedLayer>,
    next_id: u64,
    base_map: BaseMap,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Returns the existing layer's handle, or attaches a new empty layer.
    /// Boundary layers get a stroke color keyed to their name.
    pub fn get_or_create(
        &mut self,
        name: &str,
        owner: LayerOwner,
    ) -> Result<LayerHandle, RegistryError> {
        if let Some(layer) = self.find_by_name(name) {
            if layer.owner != owner {
                return Err(RegistryError::NameTaken {
                    name: name.to_string(),
                    owner: layer.owner,
                });
            }
            return Ok(LayerHandle {
                id: layer.id,
                owner,
            });
        }

        self.next_id += 1;
        let id = LayerId(self.next_id);
        let style = match owner {
            LayerOwner::Boundary => LayerStyle::keyed(name),
            LayerOwner::Entry | LayerOwner::Draw => LayerStyle::default(),
        };
        self.layers.push(NamedLayer {
            id,
            name: name.to_string(),
            owner,
            style,
            features: Vec::new(),
        });
        Ok(LayerHandle { id, owner })
    }

    pub fn find_by_name(&self, name: &str) -> Option<&NamedLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn layer(&self, handle: LayerHandle) -> Result<&NamedLayer, RegistryError> {
        self.layers
            .iter()
            .find(|layer| layer.id == handle.id && layer.owner == handle.owner)
            .ok_or(RegistryError::StaleHandle(handle.id))
    }

    fn layer_mut(&mut self, handle: LayerHandle) -> Result<&mut NamedLayer, RegistryError> {
        self.layers
            .iter_mut()
            .find(|layer| layer.id == handle.id && layer.owner == handle.owner)
            .ok_or(RegistryError::StaleHandle(handle.id))
    }

    /// Removes the feature carrying `id`, if any, then appends the new one.
    /// Features without an id are always appended. Returns the new feature
    /// count.
    pub fn upsert_feature(
        &mut self,
        handle: LayerHandle,
        id: Option<String>,
        geometry: Geometry,
    ) -> Result<usize, RegistryError> {
        let layer = self.layer_mut(handle)?;
        if let Some(id) = id.as_deref() {
            layer
                .features
                .retain(|feature| feature.id.as_deref() != Some(id));
        }
        layer.features.push(Feature { id, geometry });
        Ok(layer.features.len())
    }

    /// Clear and bulk load in one step.
    pub fn replace_features(
        &mut self,
        handle: LayerHandle,
        geometries: Vec<Geometry>,
    ) -> Result<usize, RegistryError> {
        let layer = self.layer_mut(handle)?;
        layer.features = geometries
            .into_iter()
            .map(|geometry| Feature { id: None, geometry })
            .collect();
        Ok(layer.features.len())
    }

    /// Returns whether a feature was removed.
    pub fn remove_feature(&mut self, handle: LayerHandle, id: &str) -> Result<bool, RegistryError> {
        let layer = self.layer_mut(handle)?;
        let before = layer.features.len();
        layer
            .features
            .retain(|feature| feature.id.as_deref() != Some(id));
        Ok(layer.features.len() != before)
    }

    pub fn clear(&mut self, handle: LayerHandle) -> Result<(), RegistryError> {
        self.layer_mut(handle)?.features.clear();
        Ok(())
    }

    pub fn base_map(&self) -> BaseMap {
        self.base_map
    }

    /// Returns whether the visible base map changed.
    pub fn set_base_map(&mut self, base_map: BaseMap) -> bool {
        std::mem::replace(&mut self.base_map, base_map) != base_map
    }

    pub fn summaries(&self) -> Vec<LayerSummary> {
        self.layers.iter().map(NamedLayer::summary).collect()
    }

    pub fn detail(&self, name: &str) -> Option<LayerDetail> {
        self.find_by_name(name).map(NamedLayer::detail)
    }
}
