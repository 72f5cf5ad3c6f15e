// SPDX-License-Identifier: MIT OR Apache-2.0
//! Facade node presenting plugs of a wrapped graph as its own.
//!
//! The facade never touches the wrapped nodes. Reads, writes and cache
//! operations on a virtual plug are forwarded to the wrapped shell, while a
//! link back to the outer graph lets the wrapped graph reach out: inputs fall
//! back to connections the facade has in its own graph, and invalidation
//! inside leaves through the facade's output connections.
//!
//! Evaluation only needs shared access to both graphs, so the outer graph may
//! route a facade's output back into one of its own inputs.

use super::plug::{ShellAdapter, VirtualPlug};
use crate::error::{AccessError, ComputeError, GraphError, Result};
use crate::graph::Graph;
use crate::node::{ComputeContext, Node, NodeId};
use crate::plug::PlugRef;
use crate::shell::{check_writable, Boundary, PlugShell};
use crate::traversal::{Direction, Traversal};
use crate::value::{Mode, Value};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Chooses which wrapped plugs a [`FacadeNode`] exposes
pub trait PlugSource: fmt::Debug {
    /// `(node, plug)` pairs of `wrapped` to expose, in order
    fn node_plugs(&self, wrapped: &Graph) -> Result<Vec<(NodeId, PlugRef)>>;

    /// Copy of this source for a duplicated facade
    fn duplicate(&self) -> Box<dyn PlugSource>;
}

/// A node whose plugs are virtual plugs of nodes in a wrapped graph
#[derive(Debug)]
pub struct FacadeNode {
    id: String,
    wrapped: Graph,
    source: Box<dyn PlugSource>,
    caching_enabled: bool,
    adapter: RefCell<ShellAdapter>,
}

impl FacadeNode {
    /// Facade over `wrapped`, exposing what `source` selects.
    ///
    /// With `caching_enabled`, plugs are discovered once until
    /// [`clear_plug_cache`](Self::clear_plug_cache) is called; otherwise on
    /// every enumeration.
    pub fn new(id: impl Into<String>, wrapped: Graph, source: Box<dyn PlugSource>, caching_enabled: bool) -> Self {
        Self {
            id: id.into(),
            wrapped,
            source,
            caching_enabled,
            adapter: RefCell::new(ShellAdapter::default()),
        }
    }

    /// The wrapped graph
    pub fn wrapped(&self) -> &Graph {
        &self.wrapped
    }

    /// Mutable access to the wrapped graph before the facade joins a graph,
    /// e.g. to rewire it. Call [`clear_plug_cache`](Self::clear_plug_cache)
    /// after adding or removing nodes.
    pub fn wrapped_mut(&mut self) -> &mut Graph {
        &mut self.wrapped
    }

    /// Whether discovered plugs are kept between enumerations
    pub fn caching_enabled(&self) -> bool {
        self.caching_enabled
    }

    /// Forget discovered plugs, forcing discovery on next use
    pub fn clear_plug_cache(&self) {
        *self.adapter.borrow_mut() = ShellAdapter::default();
    }

    /// Virtual plugs of this facade, discovering them if needed
    pub fn discover(&self) -> Result<Vec<Arc<VirtualPlug>>> {
        if self.caching_enabled {
            let adapter = self.adapter.borrow();
            if adapter.discovered {
                return Ok(adapter.plugs.clone());
            }
        }

        let mut adapter = ShellAdapter::default();
        for (node, plug) in self.source.node_plugs(&self.wrapped)? {
            adapter.insert(VirtualPlug::new(node, self.wrapped.node_name(node), plug));
        }
        adapter.discovered = true;
        tracing::trace!(facade = %self.id, plugs = adapter.plugs.len(), "discovered facade plugs");

        let plugs = adapter.plugs.clone();
        *self.adapter.borrow_mut() = adapter;
        Ok(plugs)
    }

    /// Virtual plug by long name, or by the wrapped plug's name if that is
    /// unique on this facade
    pub fn find_plug(&self, name: &str) -> Result<Option<Arc<VirtualPlug>>> {
        self.discover()?;
        let adapter = self.adapter.borrow();
        if let Some(plug) = adapter.by_name(name) {
            return Ok(Some(plug.clone()));
        }

        let matches: Vec<_> = adapter.by_short_name(name).collect();
        match matches.as_slice() {
            [] => Ok(None),
            [plug] => Ok(Some(Arc::clone(plug))),
            _ => Err(GraphError::Facade {
                node: self.id.clone(),
                message: format!(
                    "more than one plug with the local name {name} exists, use the long name, i.e. {}",
                    matches[0].name()
                ),
            }),
        }
    }

    /// Names of the virtual plugs `vplug` affects (`Down`) or is affected by
    /// (`Up`), following what the wrapped graph currently connects.
    pub(crate) fn virtual_affects(&self, vplug: &Arc<VirtualPlug>, direction: Direction) -> Vec<Arc<str>> {
        let adapter = self.adapter.borrow();
        let start = vplug.inner_shell();

        let traversal = Traversal::new(direction)
            .visit_once(true)
            .prune(|shell| *shell == start || adapter.by_inner(shell).is_none());
        let mut names: Vec<Arc<str>> = Vec::new();
        for shell in self.wrapped.iter_shells(start.clone(), traversal) {
            if let Some(found) = adapter.by_inner(&shell) {
                if !names.contains(found.name_arc()) {
                    names.push(found.name_arc().clone());
                }
            }
        }
        names
    }

    pub(crate) fn get_inward(
        &self,
        outer: &Graph,
        shell: &PlugShell,
        vplug: &Arc<VirtualPlug>,
        mode: &Mode,
        boundary: &mut dyn Boundary,
    ) -> Result<Value> {
        let mut link = FacadeLink {
            facade: self,
            facade_id: shell.node,
            outer,
            outer_boundary: boundary,
        };
        self.wrapped.get_in(&vplug.inner_shell(), mode, &mut link)
    }

    pub(crate) fn set_inward(
        &self,
        outer: &Graph,
        shell: &PlugShell,
        vplug: &Arc<VirtualPlug>,
        value: Value,
        ignore_connection: bool,
        boundary: &mut dyn Boundary,
    ) -> Result<()> {
        let label = outer.label(shell);
        check_writable(&PlugRef::Virtual(vplug.clone()), &label)?;
        if !ignore_connection {
            if let Some(upstream) = outer.input(shell) {
                return Err(AccessError::NotWritable(format!(
                    "plug {label} is connected to {} and thus not explicitly writable",
                    outer.label(upstream)
                ))
                .into());
            }
        }

        let mut link = FacadeLink {
            facade: self,
            facade_id: shell.node,
            outer,
            outer_boundary: boundary,
        };
        self.wrapped.set_in(&vplug.inner_shell(), value, ignore_connection, &mut link)
    }

    pub(crate) fn set_cache_inward(
        &self,
        outer: &Graph,
        shell: &PlugShell,
        vplug: &Arc<VirtualPlug>,
        value: Value,
        boundary: &mut dyn Boundary,
    ) -> Result<()> {
        let mut link = FacadeLink {
            facade: self,
            facade_id: shell.node,
            outer,
            outer_boundary: boundary,
        };
        self.wrapped.set_cache_in(&vplug.inner_shell(), value, &mut link)
    }

    pub(crate) fn cache_inward(&self, vplug: &Arc<VirtualPlug>) -> Result<Option<Value>> {
        self.wrapped.cache(&vplug.inner_shell())
    }

    pub(crate) fn clear_inward(
        &self,
        outer: &Graph,
        shell: &PlugShell,
        vplug: &Arc<VirtualPlug>,
        propagate: bool,
        visited: &mut HashSet<PlugShell>,
        boundary: &mut dyn Boundary,
    ) {
        let mut link = FacadeLink {
            facade: self,
            facade_id: shell.node,
            outer,
            outer_boundary: boundary,
        };
        self.wrapped.clear_cache_in(&vplug.inner_shell(), propagate, visited, &mut link);
    }
}

impl Node for FacadeNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn plugs(&self) -> Vec<PlugRef> {
        match self.discover() {
            Ok(plugs) => plugs.into_iter().map(PlugRef::Virtual).collect(),
            Err(err) => {
                tracing::warn!(facade = %self.id, error = %err, "plug discovery failed");
                Vec::new()
            }
        }
    }

    fn plug(&self, name: &str) -> Option<PlugRef> {
        if self.discover().is_err() {
            return None;
        }
        self.adapter.borrow().by_name(name).cloned().map(PlugRef::Virtual)
    }

    fn compute(&self, _ctx: &mut ComputeContext<'_>, plug: &PlugRef, _mode: &Mode) -> Result<Value> {
        // reads of virtual plugs are forwarded before a compute would be needed
        Err(ComputeError::unhandled(plug.name()).into())
    }

    fn duplicate(&self) -> Result<Box<dyn Node>> {
        let wrapped = self.wrapped.duplicate()?;
        Ok(Box::new(FacadeNode::new(
            self.id.clone(),
            wrapped,
            self.source.duplicate(),
            self.caching_enabled,
        )))
    }

    fn as_facade(&self) -> Option<&FacadeNode> {
        Some(self)
    }
}

/// Boundary handed to the wrapped graph while the facade operates on it
struct FacadeLink<'a> {
    facade: &'a FacadeNode,
    facade_id: NodeId,
    outer: &'a Graph,
    outer_boundary: &'a mut dyn Boundary,
}

impl FacadeLink<'_> {
    /// Shell on the facade node exposing the wrapped `shell`
    fn facade_shell(&self, shell: &PlugShell) -> Option<PlugShell> {
        let adapter = self.facade.adapter.borrow();
        let vplug = adapter.by_inner(shell)?;
        Some(PlugShell::new(self.facade_id, vplug.name_arc().clone()))
    }
}

impl Boundary for FacadeLink<'_> {
    fn external_input(&mut self, shell: &PlugShell, mode: &Mode) -> Option<Result<Value>> {
        let facade_shell = self.facade_shell(shell)?;
        // connections on higher levels override ours
        if let Some(value) = self.outer_boundary.external_input(&facade_shell, mode) {
            return Some(value);
        }
        let upstream = self.outer.input(&facade_shell)?.clone();
        Some(self.outer.get_in(&upstream, mode, &mut *self.outer_boundary))
    }

    fn invalidate_outward(&mut self, shell: &PlugShell, visited: &mut HashSet<PlugShell>) {
        let Some(facade_shell) = self.facade_shell(shell) else {
            return;
        };
        if !visited.insert(facade_shell.clone()) {
            return;
        }
        let downstream = self.outer.outputs(&facade_shell).to_vec();
        for next in downstream {
            self.outer.clear_cache_in(&next, true, visited, &mut *self.outer_boundary);
        }
        self.outer_boundary.invalidate_outward(&facade_shell, visited);
    }
}
