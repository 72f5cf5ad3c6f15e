// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph owning nodes, their plug caches and the connections between them.

use crate::attribute::RATE_NO;
use crate::connection::{Connection, EdgeSet};
use crate::error::{ConnectionError, GraphError, Result};
use crate::node::{Node, NodeId};
use crate::plug::PlugRef;
use crate::shell::PlugShell;
use crate::traversal::Direction;
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

/// A member node together with the cached values of its plugs.
///
/// The cache is borrowed only for single lookups and writes, never across a
/// compute, so evaluation can run on a shared graph and re-enter it.
#[derive(Debug)]
pub(crate) struct NodeEntry {
    pub(crate) node: Rc<dyn Node>,
    pub(crate) cache: RefCell<HashMap<Arc<str>, Value>>,
}

/// A dependency graph.
///
/// Nodes are owned by the graph and addressed through [`NodeId`] handles.
/// Membership is exclusive: a node lives in exactly one graph, and moves
/// between graphs through [`Graph::adopt`].
#[derive(Debug)]
pub struct Graph {
    /// Graph name
    pub name: String,
    pub(crate) nodes: IndexMap<NodeId, NodeEntry>,
    pub(crate) edges: EdgeSet,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            edges: EdgeSet::default(),
        }
    }

    /// Add a node to the graph
    pub fn add_node<N: Node + 'static>(&mut self, node: N) -> NodeId {
        self.add_boxed(Box::new(node))
    }

    /// Add a boxed node to the graph, e.g. one returned by [`Node::duplicate`]
    pub fn add_boxed(&mut self, node: Box<dyn Node>) -> NodeId {
        self.insert(NodeId::new(), Rc::from(node))
    }

    fn insert(&mut self, id: NodeId, node: Rc<dyn Node>) -> NodeId {
        tracing::debug!(graph = %self.name, node = node.id(), "adding node");
        self.nodes.insert(
            id,
            NodeEntry {
                node,
                cache: RefCell::default(),
            },
        );
        id
    }

    /// Move node `id` from `from` into this graph, keeping its handle.
    ///
    /// All connections of the node in `from` are broken and its caches dropped.
    pub fn adopt(&mut self, from: &mut Graph, id: NodeId) -> Result<NodeId> {
        let node = from.remove_node(id).ok_or(GraphError::NodeNotFound(id))?;
        Ok(self.insert(id, node))
    }

    /// Remove a node and all connections touching it
    pub fn remove_node(&mut self, id: NodeId) -> Option<Rc<dyn Node>> {
        if !self.nodes.contains_key(&id) {
            return None;
        }
        for connection in self.edges.touching_node(id) {
            self.disconnect(&connection.source, &connection.destination);
        }
        let entry = self.nodes.shift_remove(&id)?;
        tracing::debug!(graph = %self.name, node = entry.node.id(), "removed node");
        Some(entry.node)
    }

    /// Get a node by handle
    pub fn node(&self, id: NodeId) -> Option<&Rc<dyn Node>> {
        self.nodes.get(&id).map(|entry| &entry.node)
    }

    /// Handle of the first node whose [`Node::id`] equals `name`
    pub fn node_by_id(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, entry)| entry.node.id() == name)
            .map(|(id, _)| *id)
    }

    /// Get all nodes with their handles, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Rc<dyn Node>)> {
        self.nodes.iter().map(|(id, entry)| (*id, &entry.node))
    }

    /// Get all node handles
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether `id` is a member of this graph
    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes taking part in at least one connection and matching `predicate`
    pub fn connected_nodes(&self, predicate: impl Fn(&dyn Node) -> bool) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.edges
            .vertices()
            .map(|shell| shell.node)
            .filter(|id| seen.insert(*id))
            .filter(|id| self.node(*id).is_some_and(|node| predicate(node.as_ref())))
            .collect()
    }

    /// All connections
    pub fn connections(&self) -> Vec<Connection> {
        self.edges.iter().collect()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.edges.len()
    }

    /// Connections into (`input`) and out of (`output`) node `id`
    pub fn node_connections(&self, id: NodeId, input: bool, output: bool) -> Vec<Connection> {
        self.edges
            .iter()
            .filter(|c| (input && c.destination.node == id) || (output && c.source.node == id))
            .collect()
    }

    /// Clear the caches of all nodes without propagation, forcing
    /// re-evaluation on the next read
    pub fn clear_cache(&mut self) {
        let ids: Vec<NodeId> = self.node_ids().collect();
        for id in ids {
            self.clear_node_cache(id);
        }
    }

    /// Clear the caches of node `id`'s plugs without propagation
    pub fn clear_node_cache(&mut self, id: NodeId) {
        let Some(node) = self.node(id).cloned() else {
            return;
        };
        for plug in node.plugs() {
            self.clear_shell_cache(&PlugShell::new(id, plug.name_arc()), false);
        }
    }

    /// Copy of this graph with duplicated nodes and the same connections.
    /// Caches are not copied.
    pub fn duplicate(&self) -> Result<Graph> {
        let mut copy = Graph::new(self.name.clone());
        let mut mapping = HashMap::new();
        for (id, entry) in &self.nodes {
            let node = entry.node.duplicate()?;
            mapping.insert(*id, copy.add_boxed(node));
        }

        let remap = |shell: &PlugShell| -> Result<PlugShell> {
            let node = mapping.get(&shell.node).copied().ok_or(GraphError::NodeNotFound(shell.node))?;
            Ok(PlugShell::new(node, shell.plug.clone()))
        };
        for connection in self.edges.iter() {
            let source = remap(&connection.source)?;
            let destination = remap(&connection.destination)?;
            copy.connect(&source, &destination, false)?;
        }
        Ok(copy)
    }

    /// Connect `source` to `destination` so the destination pulls its value
    /// from the source.
    ///
    /// Fails if the attributes are incompatible or if the destination is fed
    /// by another shell and `force` is not set; with `force` the existing
    /// connection is broken first. Returns `source` to allow chaining.
    pub fn connect(&mut self, source: &PlugShell, destination: &PlugShell, force: bool) -> Result<PlugShell> {
        for shell in [source, destination] {
            if !self.has_node(shell.node) {
                return Err(ConnectionError::ForeignGraph(format!(
                    "{shell} is not part of graph {}",
                    self.name
                ))
                .into());
            }
        }

        let source_plug = self.plug_of(source)?;
        let destination_plug = self.plug_of(destination)?;
        if source_plug.attribute().connection_affinity(destination_plug.attribute()) == RATE_NO {
            return Err(ConnectionError::Incompatible {
                from: self.label(source),
                to: self.label(destination),
            }
            .into());
        }

        if let Some(existing) = self.input(destination).cloned() {
            if existing == *source {
                return Ok(source.clone());
            }
            if !force {
                return Err(ConnectionError::AlreadyConnected {
                    from: self.label(source),
                    to: self.label(destination),
                    existing: self.label(&existing),
                }
                .into());
            }
            self.disconnect(&existing, destination);
        }

        self.edges.add(source.clone(), destination.clone());
        tracing::debug!(
            from = %self.label(source),
            to = %self.label(destination),
            "connected"
        );
        self.clear_shell_cache(destination, true);
        Ok(source.clone())
    }

    /// Remove the connection `source -> destination`, returning whether it existed
    pub fn disconnect(&mut self, source: &PlugShell, destination: &PlugShell) -> bool {
        if !self.edges.remove(source, destination) {
            return false;
        }
        tracing::debug!(
            from = %self.label(source),
            to = %self.label(destination),
            "disconnected"
        );
        self.clear_shell_cache(destination, true);
        true
    }

    /// The shell feeding `shell`, if any
    pub fn input(&self, shell: &PlugShell) -> Option<&PlugShell> {
        self.edges.input(shell)
    }

    /// Shells fed by `shell`
    pub fn outputs(&self, shell: &PlugShell) -> &[PlugShell] {
        self.edges.outputs(shell)
    }

    /// Shells fed by `shell` that match `predicate`
    pub fn outputs_where(&self, shell: &PlugShell, predicate: impl Fn(&PlugShell) -> bool) -> Vec<PlugShell> {
        self.outputs(shell).iter().filter(|s| predicate(s)).cloned().collect()
    }

    /// Shell of the plug `name` on node `id`.
    ///
    /// Facade nodes also accept the short name of a wrapped plug when it is
    /// unique.
    pub fn shell(&self, id: NodeId, name: &str) -> Result<PlugShell> {
        let node = &self.entry(id)?.node;
        if let Some(facade) = node.as_facade() {
            return match facade.find_plug(name)? {
                Some(vplug) => Ok(PlugShell::new(id, vplug.name_arc().clone())),
                None => Err(self.missing_plug(id, name)),
            };
        }
        node.plug(name)
            .map(|plug| PlugShell::new(id, plug.name_arc()))
            .ok_or_else(|| self.missing_plug(id, name))
    }

    /// Shell of `plug` on node `id`
    pub fn to_shell(&self, id: NodeId, plug: &PlugRef) -> PlugShell {
        PlugShell::new(id, plug.name_arc())
    }

    /// Plugs of node `id` matching `predicate`
    pub fn plugs(&self, id: NodeId, predicate: impl Fn(&PlugRef) -> bool) -> Result<Vec<PlugRef>> {
        Ok(self.entry(id)?.node.plugs().into_iter().filter(|p| predicate(p)).collect())
    }

    /// Plugs of node `id` suitable as input
    pub fn input_plugs(&self, id: NodeId) -> Result<Vec<PlugRef>> {
        self.plugs(id, PlugRef::provides_input)
    }

    /// Plugs of node `id` suitable to deliver output
    pub fn output_plugs(&self, id: NodeId) -> Result<Vec<PlugRef>> {
        self.plugs(id, PlugRef::provides_output)
    }

    /// Shells on the same node that `shell` affects.
    ///
    /// Facade nodes report the relations their wrapped graph currently
    /// establishes between exposed plugs.
    pub fn affected(&self, shell: &PlugShell) -> Vec<PlugShell> {
        self.relations(shell, Direction::Down)
    }

    /// Shells on the same node affecting `shell`
    pub fn affected_by(&self, shell: &PlugShell) -> Vec<PlugShell> {
        self.relations(shell, Direction::Up)
    }

    fn relations(&self, shell: &PlugShell, direction: Direction) -> Vec<PlugShell> {
        let Ok(plug) = self.plug_of(shell) else {
            return Vec::new();
        };
        let names = match (&plug, self.node(shell.node).and_then(|n| n.as_facade())) {
            (PlugRef::Virtual(vplug), Some(facade)) => facade.virtual_affects(vplug, direction),
            (PlugRef::Static(plug), _) => match direction {
                Direction::Up => plug.affected_by().to_vec(),
                Direction::Down => plug.affected().to_vec(),
            },
            (PlugRef::Virtual(_), None) => Vec::new(),
        };
        names.into_iter().map(|name| PlugShell::new(shell.node, name)).collect()
    }

    /// Readable `node.plug` form of a shell using the node's id
    pub fn label(&self, shell: &PlugShell) -> String {
        format!("{}.{}", self.node_name(shell.node), shell.plug)
    }

    pub(crate) fn node_name(&self, id: NodeId) -> String {
        self.node(id).map_or_else(|| id.to_string(), |node| node.id().to_owned())
    }

    pub(crate) fn entry(&self, id: NodeId) -> Result<&NodeEntry> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Plug behind `shell`
    pub(crate) fn plug_of(&self, shell: &PlugShell) -> Result<PlugRef> {
        self.entry(shell.node)?
            .node
            .plug(&shell.plug)
            .ok_or_else(|| self.missing_plug(shell.node, &shell.plug))
    }

    fn missing_plug(&self, id: NodeId, name: &str) -> GraphError {
        GraphError::PlugNotFound {
            node: self.node_name(id),
            plug: name.to_owned(),
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Attribute, AttributeFlags};
    use crate::error::ComputeError;
    use crate::node::{ComputeContext, NodeType, NodeTypeBuilder};
    use crate::value::{Mode, INT, STRING};
    use std::sync::LazyLock;

    static PASS: LazyLock<Arc<NodeType>> = LazyLock::new(|| {
        NodeType::builder("Pass")
            .register_plug("value", Attribute::new(&INT, AttributeFlags::NONE).with_default(0).unwrap())
            .and_then(|b| b.register_plug("result", Attribute::new(&INT, AttributeFlags::NONE)))
            .and_then(|b| b.register_plug("text", Attribute::new(&STRING, AttributeFlags::NONE)))
            .and_then(|b| b.register_plug("locked", Attribute::new(&INT, AttributeFlags::UNCONNECTABLE)))
            .and_then(|b| b.affects("value", "result"))
            .map(NodeTypeBuilder::build)
            .unwrap()
    });

    #[derive(Debug)]
    struct Pass(String);

    impl Node for Pass {
        fn id(&self) -> &str {
            &self.0
        }

        fn plugs(&self) -> Vec<PlugRef> {
            PASS.plug_refs()
        }

        fn compute(&self, ctx: &mut ComputeContext<'_>, plug: &PlugRef, mode: &Mode) -> Result<Value> {
            match plug.name() {
                "result" => ctx.get("value", mode),
                other => Err(ComputeError::unhandled(other).into()),
            }
        }

        fn duplicate(&self) -> Result<Box<dyn Node>> {
            Ok(Box::new(Pass(self.0.clone())))
        }
    }

    fn chain() -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new("chain");
        let a = graph.add_node(Pass("a".into()));
        let b = graph.add_node(Pass("b".into()));
        graph
            .connect(&PlugShell::new(a, "result"), &PlugShell::new(b, "value"), false)
            .unwrap();
        (graph, a, b)
    }

    #[test]
    fn test_node_membership() {
        let (mut graph, a, b) = chain();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node_by_id("b"), Some(b));
        assert_eq!(graph.node_by_id("zz"), None);
        assert_eq!(graph.connected_nodes(|_| true), vec![a, b]);

        graph.remove_node(a).unwrap();
        assert!(!graph.has_node(a));
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.connected_nodes(|_| true).is_empty());
    }

    #[test]
    fn test_adopt_is_exclusive() {
        let (mut graph, a, _) = chain();
        let mut other = Graph::new("other");
        let moved = other.adopt(&mut graph, a).unwrap();
        assert_eq!(moved, a);
        assert!(other.has_node(a));
        assert!(!graph.has_node(a));
        assert_eq!(graph.connection_count(), 0);
        assert!(matches!(other.adopt(&mut graph, a), Err(GraphError::NodeNotFound(_))));
    }

    #[test]
    fn test_connect_rejections() {
        let (mut graph, a, b) = chain();
        let err = graph
            .connect(&PlugShell::new(a, "text"), &PlugShell::new(b, "value"), false)
            .unwrap_err();
        assert!(matches!(err, GraphError::Connection(ConnectionError::Incompatible { .. })));

        let err = graph
            .connect(&PlugShell::new(a, "result"), &PlugShell::new(b, "locked"), false)
            .unwrap_err();
        assert!(matches!(err, GraphError::Connection(ConnectionError::Incompatible { .. })));

        let mut other = Graph::new("other");
        let c = other.add_node(Pass("c".into()));
        let err = graph
            .connect(&PlugShell::new(a, "result"), &PlugShell::new(c, "value"), false)
            .unwrap_err();
        assert!(matches!(err, GraphError::Connection(ConnectionError::ForeignGraph(_))));
    }

    #[test]
    fn test_reconnecting_same_edge_is_noop() {
        let (mut graph, a, b) = chain();
        graph
            .connect(&PlugShell::new(a, "result"), &PlugShell::new(b, "value"), false)
            .unwrap();
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_shell_lookup_and_plug_queries() {
        let (graph, a, _) = chain();
        assert_eq!(graph.shell(a, "value").unwrap(), PlugShell::new(a, "value"));
        assert!(matches!(graph.shell(a, "nope"), Err(GraphError::PlugNotFound { .. })));
        assert_eq!(graph.output_plugs(a).unwrap().len(), 1);
        assert_eq!(graph.input_plugs(a).unwrap().len(), 3);
        assert_eq!(graph.label(&PlugShell::new(a, "value")), "a.value");

        let affected = graph.affected(&PlugShell::new(a, "value"));
        assert_eq!(affected, vec![PlugShell::new(a, "result")]);
        assert_eq!(graph.node_connections(a, true, false).len(), 0);
        assert_eq!(graph.node_connections(a, false, true).len(), 1);
    }

    #[test]
    fn test_duplicate_copies_edges_not_caches() {
        let (mut graph, a, _) = chain();
        graph.set(&PlugShell::new(a, "value"), Value::Int(3), false).unwrap();

        let mut copy = graph.duplicate().unwrap();
        assert_eq!(copy.node_count(), 2);
        assert_eq!(copy.connection_count(), 1);

        let a2 = copy.node_by_id("a").unwrap();
        let b2 = copy.node_by_id("b").unwrap();
        assert_ne!(a2, a);
        assert!(!copy.has_cache(&PlugShell::new(a2, "value")));
        assert_eq!(copy.get(&PlugShell::new(b2, "value"), &Mode::NONE).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_clear_cache_all_nodes() {
        let (mut graph, a, b) = chain();
        graph.set(&PlugShell::new(a, "value"), Value::Int(3), false).unwrap();
        graph.get(&PlugShell::new(b, "result"), &Mode::NONE).unwrap();
        assert!(graph.has_cache(&PlugShell::new(b, "result")));

        graph.clear_node_cache(b);
        assert!(!graph.has_cache(&PlugShell::new(b, "result")));
        assert!(graph.has_cache(&PlugShell::new(a, "value")));

        graph.clear_cache();
        assert!(!graph.has_cache(&PlugShell::new(a, "value")));
        assert!(!graph.has_cache(&PlugShell::new(b, "result")));
    }
}
