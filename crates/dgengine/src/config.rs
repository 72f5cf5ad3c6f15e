// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration of graph-wrapping facade nodes.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which plugs of a wrapped graph a graph node exposes, and how it treats
/// the graph it is given.
///
/// Include and exclude entries name either a whole node (`"node"`) or a
/// single plug (`"node.plug"`), using the nodes' ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphNodeConfig {
    /// Nodes or plugs to expose explicitly
    pub include: Vec<String>,
    /// Nodes or plugs never to expose
    pub exclude: Vec<String>,
    /// Work on a private copy of the wrapped graph
    pub duplicate_wrapped_graph: bool,
    /// Expose every plug of every wrapped node
    pub allow_auto_plugs: bool,
    /// Skip include entries that do not resolve instead of failing
    pub ignore_failed_includes: bool,
    /// Keep discovered plugs until explicitly cleared
    pub caching_enabled: bool,
}

impl Default for GraphNodeConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            duplicate_wrapped_graph: true,
            allow_auto_plugs: true,
            ignore_failed_includes: false,
            caching_enabled: true,
        }
    }
}

impl GraphNodeConfig {
    /// Expose only the given entries
    pub fn including<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: entries.into_iter().map(Into::into).collect(),
            allow_auto_plugs: false,
            ..Self::default()
        }
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Deserialize from RON
    pub fn from_ron(s: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }

    /// Load from a RON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save to a RON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = self
            .to_ron()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GraphNodeConfig::default();
        assert!(config.duplicate_wrapped_graph);
        assert!(config.allow_auto_plugs);
        assert!(!config.ignore_failed_includes);
        assert!(config.caching_enabled);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = GraphNodeConfig::from_ron(r#"(include: ["source.value"], allow_auto_plugs: false)"#).unwrap();
        assert_eq!(config.include, ["source.value"]);
        assert!(!config.allow_auto_plugs);
        assert!(config.duplicate_wrapped_graph);
    }

    #[test]
    fn test_ron_serialization() {
        let config = GraphNodeConfig {
            exclude: vec!["scratch".into()],
            ..GraphNodeConfig::including(["a.out", "b"])
        };
        let ron_str = config.to_ron().unwrap();
        assert_eq!(GraphNodeConfig::from_ron(&ron_str).unwrap(), config);
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("dgengine-config-{}.ron", uuid::Uuid::new_v4()));
        let config = GraphNodeConfig::including(["node"]);
        config.save(&path).unwrap();
        assert_eq!(GraphNodeConfig::load(&path).unwrap(), config);
        std::fs::remove_file(&path).unwrap();
    }
}
