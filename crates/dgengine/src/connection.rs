// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions and the directed edge set of a graph.

use crate::node::NodeId;
use crate::shell::PlugShell;
use indexmap::IndexMap;

/// A directed connection between two plug shells
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Shell providing the value
    pub source: PlugShell,
    /// Shell receiving the value
    pub destination: PlugShell,
}

impl Connection {
    /// Create a new connection
    pub fn new(source: PlugShell, destination: PlugShell) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node: NodeId) -> bool {
        self.source.node == node || self.destination.node == node
    }

    /// Check if this connection involves a specific shell
    pub fn involves_shell(&self, shell: &PlugShell) -> bool {
        self.source == *shell || self.destination == *shell
    }
}

#[derive(Debug, Clone, Default)]
struct Adjacency {
    predecessors: Vec<PlugShell>,
    successors: Vec<PlugShell>,
}

impl Adjacency {
    fn is_isolated(&self) -> bool {
        self.predecessors.is_empty() && self.successors.is_empty()
    }
}

/// Directed edge relation over plug shells.
///
/// Only shells taking part in at least one connection are vertices; a shell
/// losing its last edge is dropped again.
#[derive(Debug, Clone, Default)]
pub(crate) struct EdgeSet {
    vertices: IndexMap<PlugShell, Adjacency>,
}

impl EdgeSet {
    /// Insert the edge `source -> destination`, returning false if it existed
    pub fn add(&mut self, source: PlugShell, destination: PlugShell) -> bool {
        let successors = &mut self.vertices.entry(source.clone()).or_default().successors;
        if successors.contains(&destination) {
            return false;
        }
        successors.push(destination.clone());
        self.vertices
            .entry(destination)
            .or_default()
            .predecessors
            .push(source);
        true
    }

    /// Remove the edge `source -> destination`, returning false if it was absent
    pub fn remove(&mut self, source: &PlugShell, destination: &PlugShell) -> bool {
        let Some(adjacency) = self.vertices.get_mut(source) else {
            return false;
        };
        let Some(index) = adjacency.successors.iter().position(|s| s == destination) else {
            return false;
        };
        adjacency.successors.remove(index);
        if let Some(adjacency) = self.vertices.get_mut(destination) {
            adjacency.predecessors.retain(|s| s != source);
        }

        for shell in [source, destination] {
            if self.vertices.get(shell).is_some_and(Adjacency::is_isolated) {
                self.vertices.shift_remove(shell);
            }
        }
        true
    }

    /// The shell feeding `shell`, if any
    pub fn input(&self, shell: &PlugShell) -> Option<&PlugShell> {
        self.vertices.get(shell)?.predecessors.first()
    }

    /// Shells fed by `shell`
    pub fn outputs(&self, shell: &PlugShell) -> &[PlugShell] {
        self.vertices
            .get(shell)
            .map(|a| a.successors.as_slice())
            .unwrap_or_default()
    }

    /// Whether `shell` takes part in any connection
    pub fn contains(&self, shell: &PlugShell) -> bool {
        self.vertices.contains_key(shell)
    }

    /// Shells taking part in at least one connection
    pub fn vertices(&self) -> impl Iterator<Item = &PlugShell> {
        self.vertices.keys()
    }

    /// All connections, in insertion order of their sources
    pub fn iter(&self) -> impl Iterator<Item = Connection> + '_ {
        self.vertices.iter().flat_map(|(source, adjacency)| {
            adjacency
                .successors
                .iter()
                .map(move |destination| Connection::new(source.clone(), destination.clone()))
        })
    }

    /// Connections with at least one endpoint on `node`
    pub fn touching_node(&self, node: NodeId) -> Vec<Connection> {
        self.iter().filter(|c| c.involves_node(node)).collect()
    }

    /// Number of connections
    pub fn len(&self) -> usize {
        self.vertices.values().map(|a| a.successors.len()).sum()
    }
}
