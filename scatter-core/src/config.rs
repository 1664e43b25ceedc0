use crate::error::{Result, ScatterError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;
pub const DEFAULT_METADATA_FILE: &str = "metadata.json";
pub const DEFAULT_NODES: [&str; 3] = ["node1_storage", "node2_storage", "node3_storage"];

/// Node list, metadata location and chunk size. Missing JSON fields fall
/// back to the defaults.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ScatterConfig {
    pub nodes: Vec<PathBuf>,
    pub metadata_path: PathBuf,
    pub chunk_size: usize,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            nodes: DEFAULT_NODES.iter().map(PathBuf::from).collect(),
            metadata_path: PathBuf::from(DEFAULT_METADATA_FILE),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ScatterConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).map_err(|e| {
            ScatterError::InvalidConfig(format!("read {}: {}", path.display(), e))
        })?;
        let cfg: Self = serde_json::from_slice(&raw).map_err(|e| {
            ScatterError::InvalidConfig(format!("parse {}: {}", path.display(), e))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ScatterError::InvalidConfig("chunk size must be non-zero".into()));
        }
        if self.nodes.is_empty() {
            return Err(ScatterError::InvalidConfig("at least one node is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_three_local_nodes() {
        let cfg = ScatterConfig::default();
        assert_eq!(cfg.nodes.len(), 3);
        assert_eq!(cfg.chunk_size, 1024 * 1024);
        assert_eq!(cfg.metadata_path, PathBuf::from("metadata.json"));
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let td = tempfile::tempdir().unwrap();
        let p = td.path().join("scatter.json");
        std::fs::write(&p, br#"{ "chunk_size": 4096 }"#).unwrap();
        let cfg = ScatterConfig::from_json_file(&p).unwrap();
        assert_eq!(cfg.chunk_size, 4096);
        assert_eq!(cfg.nodes, ScatterConfig::default().nodes);
    }

    #[test]
    fn rejects_zero_chunk_and_no_nodes() {
        let cfg = ScatterConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = ScatterConfig {
            nodes: vec![],
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
