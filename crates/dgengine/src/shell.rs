// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plug shells and the pull-based evaluation running through them.
//!
//! A [`PlugShell`] is nothing but a `(node, plug name)` pair. All state it
//! appears to have lives in the [`Graph`]: cached values in the node's cache
//! map, connections in the edge set. Every operation therefore takes the graph
//! explicitly.

use crate::attribute::{AttributeFlags, RATE_NO};
use crate::connection::Connection;
use crate::error::{AccessError, GraphError, Result};
use crate::graph::Graph;
use crate::node::{ComputeContext, NodeId};
use crate::plug::PlugRef;
use crate::traversal::{Shells, Traversal};
use crate::value::{Mode, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Handle to one plug on one node instance.
///
/// Shells are plain values: cheap to clone, compared and hashed by
/// `(node, plug)`, and never own anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlugShell {
    /// Owning node
    pub node: NodeId,
    /// Name of the plug on that node
    pub plug: Arc<str>,
}

impl PlugShell {
    /// Create a shell
    pub fn new(node: NodeId, plug: impl Into<Arc<str>>) -> Self {
        Self {
            node,
            plug: plug.into(),
        }
    }

    /// See [`Graph::get`]
    pub fn get(&self, graph: &mut Graph, mode: &Mode) -> Result<Value> {
        graph.get(self, mode)
    }

    /// See [`Graph::set`]
    pub fn set(&self, graph: &mut Graph, value: impl Into<Value>, ignore_connection: bool) -> Result<()> {
        graph.set(self, value.into(), ignore_connection)
    }

    /// See [`Graph::set_cache`]
    pub fn set_cache(&self, graph: &mut Graph, value: impl Into<Value>) -> Result<()> {
        graph.set_cache(self, value.into())
    }

    /// See [`Graph::cache`]
    pub fn cache(&self, graph: &Graph) -> Result<Option<Value>> {
        graph.cache(self)
    }

    /// See [`Graph::has_cache`]
    pub fn has_cache(&self, graph: &Graph) -> bool {
        graph.has_cache(self)
    }

    /// See [`Graph::clear_shell_cache`]
    pub fn clear_cache(&self, graph: &mut Graph, propagate: bool) {
        graph.clear_shell_cache(self, propagate);
    }

    /// Connect this shell to `destination`, see [`Graph::connect`]
    pub fn connect(&self, graph: &mut Graph, destination: &PlugShell, force: bool) -> Result<PlugShell> {
        graph.connect(self, destination, force)
    }

    /// Remove the connection to `destination`, see [`Graph::disconnect`]
    pub fn disconnect(&self, graph: &mut Graph, destination: &PlugShell) -> bool {
        graph.disconnect(self, destination)
    }

    /// The shell feeding this one
    pub fn input(&self, graph: &Graph) -> Option<PlugShell> {
        graph.input(self).cloned()
    }

    /// Shells fed by this one
    pub fn outputs(&self, graph: &Graph) -> Vec<PlugShell> {
        graph.outputs(self).to_vec()
    }

    /// Whether this shell is the source or destination of any connection
    pub fn is_connected(&self, graph: &Graph) -> bool {
        graph.edges.contains(self)
    }

    /// Connections into (`input`) and out of (`output`) this shell
    pub fn connections(&self, graph: &Graph, input: bool, output: bool) -> Vec<Connection> {
        let mut connections = Vec::new();
        if input {
            if let Some(source) = graph.input(self) {
                connections.push(Connection::new(source.clone(), self.clone()));
            }
        }
        if output {
            connections.extend(
                graph
                    .outputs(self)
                    .iter()
                    .map(|destination| Connection::new(self.clone(), destination.clone())),
            );
        }
        connections
    }

    /// How well this shell's plug can hold `value`, 0 if the plug is unknown
    pub fn compatibility_rate(&self, graph: &Graph, value: &Value) -> u8 {
        graph
            .plug_of(self)
            .map_or(RATE_NO, |plug| plug.attribute().compatibility_rate(value))
    }

    /// Walk the graph starting at this shell
    pub fn iter<'g, 'p>(&self, graph: &'g Graph, traversal: Traversal<'p>) -> Shells<'g, 'p> {
        graph.iter_shells(self.clone(), traversal)
    }
}

impl fmt::Display for PlugShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.plug)
    }
}

/// Hooks of the graph level surrounding the one being evaluated.
///
/// The outermost graph uses [`TopLevel`], which has nothing around it. A
/// facade evaluating its wrapped graph passes a link back to the graph it
/// lives in, so reads can follow outside connections and invalidation can
/// leave the wrapped graph.
pub(crate) trait Boundary {
    /// Value feeding `shell` from outside the current level, if any
    fn external_input(&mut self, shell: &PlugShell, mode: &Mode) -> Option<Result<Value>>;

    /// Invalidate whatever outside the current level depends on `shell`
    fn invalidate_outward(&mut self, shell: &PlugShell, visited: &mut HashSet<PlugShell>);
}

/// Boundary of the outermost graph
pub(crate) struct TopLevel;

impl Boundary for TopLevel {
    fn external_input(&mut self, _shell: &PlugShell, _mode: &Mode) -> Option<Result<Value>> {
        None
    }

    fn invalidate_outward(&mut self, _shell: &PlugShell, _visited: &mut HashSet<PlugShell>) {}
}

fn check_passing(plug: &PlugRef, value: &Value, label: &str) -> Result<()> {
    if plug.attribute().has_flag(AttributeFlags::CHECK_PASSING_VALUES)
        && plug.attribute().compatibility_rate(value) == RATE_NO
    {
        return Err(GraphError::Type(format!(
            "value {value:?} coming from the input of {label} is not compatible with its plug"
        )));
    }
    Ok(())
}

impl Graph {
    /// Value of `shell`.
    ///
    /// Returns the cache if present. Output plugs are computed by their node
    /// and cached; input plugs pull from their upstream connection or fall
    /// back to the attribute's default.
    pub fn get(&mut self, shell: &PlugShell, mode: &Mode) -> Result<Value> {
        self.get_in(shell, mode, &mut TopLevel)
    }

    /// Write `value` into an input plug.
    ///
    /// Fails for read-only or output plugs and for inputs fed by a connection,
    /// unless `ignore_connection` is set. Writing an uncached plug is an error
    /// as the value would be lost.
    pub fn set(&mut self, shell: &PlugShell, value: Value, ignore_connection: bool) -> Result<()> {
        self.set_in(shell, value, ignore_connection, &mut TopLevel)
    }

    /// Store `value` as cache of `shell`, invalidating dependents first.
    ///
    /// The value is checked against the plug's attribute even when it comes
    /// from a compute. Uncached plugs ignore the call.
    pub fn set_cache(&mut self, shell: &PlugShell, value: Value) -> Result<()> {
        self.set_cache_in(shell, value, &mut TopLevel)
    }

    /// Invalidate the cache of `shell`. With `propagate`, everything depending
    /// on it through affects relations or connections is invalidated too.
    pub fn clear_shell_cache(&mut self, shell: &PlugShell, propagate: bool) {
        let mut visited = HashSet::new();
        self.clear_cache_in(shell, propagate, &mut visited, &mut TopLevel);
    }

    /// Cached value of `shell`, if any
    pub fn cache(&self, shell: &PlugShell) -> Result<Option<Value>> {
        let entry = self.entry(shell.node)?;
        match entry.node.as_facade() {
            Some(facade) => {
                let plug = self.plug_of(shell)?;
                match plug.as_virtual() {
                    Some(vplug) => facade.cache_inward(vplug),
                    None => Ok(None),
                }
            }
            None => Ok(entry.cache.borrow().get(&shell.plug).cloned()),
        }
    }

    /// Whether `shell` currently holds a cached value
    pub fn has_cache(&self, shell: &PlugShell) -> bool {
        matches!(self.cache(shell), Ok(Some(_)))
    }

    pub(crate) fn get_in(&self, shell: &PlugShell, mode: &Mode, boundary: &mut dyn Boundary) -> Result<Value> {
        let node = self.entry(shell.node)?.node.clone();
        let plug = self.plug_of(shell)?;

        if let Some(facade) = node.as_facade() {
            let vplug = plug.as_virtual().cloned().ok_or_else(|| self.plug_not_found(shell))?;
            return facade.get_inward(self, shell, &vplug, mode, boundary);
        }

        let cached = self.entry(shell.node)?.cache.borrow().get(&shell.plug).cloned();
        if let Some(value) = cached {
            return Ok(value);
        }

        let label = self.label(shell);
        if let Some(value) = boundary.external_input(shell, mode) {
            let value = value?;
            check_passing(&plug, &value, &label)?;
            return Ok(value);
        }

        if plug.provides_output() {
            tracing::trace!(shell = %label, "computing");
            let result = {
                let mut ctx = ComputeContext {
                    graph: self,
                    boundary: &mut *boundary,
                    node: shell.node,
                };
                node.compute(&mut ctx, &plug, mode)
            };
            let value = match result {
                Ok(value) => value,
                Err(GraphError::Compute(err)) => return Err(GraphError::Compute(err.within(&label))),
                Err(err) => return Err(err),
            };
            if value.is_null() {
                return Err(GraphError::NullResult(label));
            }
            self.set_cache_in(shell, value.clone(), boundary)?;
            return Ok(value);
        }

        match self.input(shell).cloned() {
            Some(upstream) => {
                let value = self.get_in(&upstream, mode, boundary)?;
                check_passing(&plug, &value, &label)?;
                Ok(value)
            }
            None => plug.attribute().default_value().map_err(|err| {
                if !err.is_missing_default() {
                    return err;
                }
                AccessError::MissingDefaultValue(format!(
                    "plug {label} failed to retrieve its default value and is not connected: {err}"
                ))
                .into()
            }),
        }
    }

    pub(crate) fn set_in(
        &self,
        shell: &PlugShell,
        value: Value,
        ignore_connection: bool,
        boundary: &mut dyn Boundary,
    ) -> Result<()> {
        let node = self.entry(shell.node)?.node.clone();
        let plug = self.plug_of(shell)?;

        if let Some(facade) = node.as_facade() {
            let vplug = plug.as_virtual().cloned().ok_or_else(|| self.plug_not_found(shell))?;
            return facade.set_inward(self, shell, &vplug, value, ignore_connection, boundary);
        }

        let label = self.label(shell);
        check_writable(&plug, &label)?;
        if !ignore_connection {
            if let Some(upstream) = self.input(shell) {
                return Err(AccessError::NotWritable(format!(
                    "plug {label} is connected to {} and thus not explicitly writable",
                    self.label(upstream)
                ))
                .into());
            }
        }

        self.set_cache_in(shell, value, boundary)
    }

    pub(crate) fn set_cache_in(&self, shell: &PlugShell, value: Value, boundary: &mut dyn Boundary) -> Result<()> {
        let node = self.entry(shell.node)?.node.clone();
        let plug = self.plug_of(shell)?;

        if plug.attribute().compatibility_rate(&value) == RATE_NO {
            return Err(GraphError::Type(format!(
                "plug {} cannot hold value {value:?} as it is not compatible",
                self.label(shell)
            )));
        }

        if let Some(facade) = node.as_facade() {
            let vplug = plug.as_virtual().cloned().ok_or_else(|| self.plug_not_found(shell))?;
            return facade.set_cache_inward(self, shell, &vplug, value, boundary);
        }

        if plug.attribute().has_flag(AttributeFlags::UNCACHED) {
            return Ok(());
        }

        // a new value may have different dependents than the previous one
        let mut visited = HashSet::new();
        self.clear_cache_in(shell, true, &mut visited, boundary);

        tracing::trace!(shell = %self.label(shell), "caching value");
        if let Some(entry) = self.nodes.get(&shell.node) {
            entry.cache.borrow_mut().insert(shell.plug.clone(), value);
        }
        Ok(())
    }

    pub(crate) fn clear_cache_in(
        &self,
        shell: &PlugShell,
        propagate: bool,
        visited: &mut HashSet<PlugShell>,
        boundary: &mut dyn Boundary,
    ) {
        let Some(node) = self.nodes.get(&shell.node).map(|entry| entry.node.clone()) else {
            return;
        };
        if propagate && !visited.insert(shell.clone()) {
            return;
        }

        let mut affected = Vec::new();
        match node.as_facade() {
            Some(facade) => {
                if let Some(vplug) = self.plug_of(shell).ok().and_then(|p| p.as_virtual().cloned()) {
                    facade.clear_inward(self, shell, &vplug, propagate, visited, boundary);
                }
            }
            None => {
                let removed = self
                    .nodes
                    .get(&shell.node)
                    .and_then(|entry| entry.cache.borrow_mut().remove(&shell.plug));
                if removed.is_some() {
                    tracing::trace!(shell = %self.label(shell), "cleared cache");
                }
                if propagate {
                    if let Some(plug) = node.plug(&shell.plug).and_then(|p| p.as_static().cloned()) {
                        affected = plug.affected().to_vec();
                    }
                }
            }
        }

        if !propagate {
            return;
        }

        boundary.invalidate_outward(shell, visited);

        let downstream: Vec<PlugShell> = affected
            .into_iter()
            .map(|name| PlugShell::new(shell.node, name))
            .chain(self.outputs(shell).iter().cloned())
            .collect();
        for next in downstream {
            self.clear_cache_in(&next, true, visited, boundary);
        }
    }

    fn plug_not_found(&self, shell: &PlugShell) -> GraphError {
        GraphError::PlugNotFound {
            node: self.node_name(shell.node),
            plug: shell.plug.to_string(),
        }
    }
}

/// Flag based write checks shared by plain and facade shells
pub(crate) fn check_writable(plug: &PlugRef, label: &str) -> Result<()> {
    let attribute = plug.attribute();
    if attribute.has_flag(AttributeFlags::READONLY) {
        return Err(AccessError::NotWritable(format!("plug {label} is not writable")).into());
    }
    if plug.provides_output() {
        return Err(AccessError::NotWritable(format!(
            "plug {label} is not writable as it provides an output itself"
        ))
        .into());
    }
    if attribute.has_flag(AttributeFlags::UNCACHED) {
        return Err(GraphError::UncachedWrite(label.to_owned()));
    }
    Ok(())
}
