use crate::path_network::id_allocator::DEFAULT_TRANSIENT_ID_OFFSET;
use crate::topology::geometry::{DEFAULT_COORDINATE_MARGIN, PlanarGeometry};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TrailnetConfig {
    /// First id handed to split nodes and edges.
    pub transient_id_offset: u64,
    // Reserved for drawing parallel paths side by side, written into every
    // sub-topology.
    pub topology_offset: f64,
    pub coordinate_margin: f64,
}

impl Default for TrailnetConfig {
    fn default() -> Self {
        Self {
            transient_id_offset: DEFAULT_TRANSIENT_ID_OFFSET,
            topology_offset: 0.0,
            coordinate_margin: DEFAULT_COORDINATE_MARGIN,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

impl TrailnetConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    pub fn geometry(&self) -> PlanarGeometry {
        PlanarGeometry::new(self.coordinate_margin)
    }
}
