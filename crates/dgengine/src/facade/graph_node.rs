// SPDX-License-Identifier: MIT OR Apache-2.0
//! Facade wrapping a whole graph.

use super::node::{FacadeNode, PlugSource};
use crate::config::GraphNodeConfig;
use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::node::NodeId;
use crate::plug::PlugRef;
use indexmap::IndexMap;
use std::sync::Arc;

/// Selects plugs of a wrapped graph according to a [`GraphNodeConfig`]
#[derive(Debug, Clone)]
pub struct GraphPlugSource {
    config: GraphNodeConfig,
}

impl GraphPlugSource {
    /// Source driven by `config`
    pub fn new(config: GraphNodeConfig) -> Self {
        Self { config }
    }

    /// The configuration
    pub fn config(&self) -> &GraphNodeConfig {
        &self.config
    }
}

fn split_entry(entry: &str) -> (&str, Option<&str>) {
    match entry.split_once('.') {
        Some((node, plug)) => (node, Some(plug)),
        None => (entry, None),
    }
}

impl PlugSource for GraphPlugSource {
    fn node_plugs(&self, wrapped: &Graph) -> Result<Vec<(NodeId, PlugRef)>> {
        let mut found: IndexMap<(NodeId, Arc<str>), PlugRef> = IndexMap::new();
        let mut missing = Vec::new();

        for entry in &self.config.include {
            let (node_name, plug_name) = split_entry(entry);
            let Some(id) = wrapped.node_by_id(node_name) else {
                missing.push(entry.as_str());
                continue;
            };
            match plug_name {
                None => {
                    for plug in wrapped.plugs(id, |_| true)? {
                        found.insert((id, plug.name_arc()), plug);
                    }
                }
                Some(plug_name) => match wrapped.node(id).and_then(|node| node.plug(plug_name)) {
                    Some(plug) => {
                        found.insert((id, plug.name_arc()), plug);
                    }
                    None => missing.push(entry.as_str()),
                },
            }
        }

        if !missing.is_empty() && !self.config.ignore_failed_includes {
            return Err(GraphError::Facade {
                node: wrapped.name.clone(),
                message: format!("could not find the following include plugs: {}", missing.join(", ")),
            });
        }

        if self.config.allow_auto_plugs {
            for (id, node) in wrapped.nodes() {
                for plug in node.plugs() {
                    found.entry((id, plug.name_arc())).or_insert(plug);
                }
            }
        }

        if !self.config.exclude.is_empty() {
            found.retain(|(id, plug_name), _| {
                let node_name = wrapped.node_name(*id);
                !self.config.exclude.iter().any(|entry| match split_entry(entry) {
                    (node, None) => node == node_name,
                    (node, Some(plug)) => node == node_name && plug == &**plug_name,
                })
            });
        }

        Ok(found.into_iter().map(|((id, _), plug)| (id, plug)).collect())
    }

    fn duplicate(&self) -> Box<dyn PlugSource> {
        Box::new(self.clone())
    }
}

impl FacadeNode {
    /// Facade exposing plugs of `graph` as configured.
    ///
    /// The graph is duplicated first if the configuration asks for it. Include
    /// entries are validated right away.
    pub fn wrap_graph(id: impl Into<String>, graph: Graph, config: GraphNodeConfig) -> Result<Self> {
        let wrapped = if config.duplicate_wrapped_graph {
            graph.duplicate()?
        } else {
            graph
        };
        let caching_enabled = config.caching_enabled;
        let node = FacadeNode::new(id, wrapped, Box::new(GraphPlugSource::new(config)), caching_enabled);
        node.discover()?;
        Ok(node)
    }

    /// Facade over `graph` with the default configuration
    pub fn over_graph(id: impl Into<String>, graph: Graph) -> Result<Self> {
        Self::wrap_graph(id, graph, GraphNodeConfig::default())
    }
}
