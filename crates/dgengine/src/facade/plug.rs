// SPDX-License-Identifier: MIT OR Apache-2.0
//! Virtual plugs standing in for wrapped plugs on a facade node.

use crate::node::NodeId;
use crate::plug::PlugRef;
use crate::shell::PlugShell;
use std::collections::HashMap;
use std::sync::Arc;

/// Prefix of every virtual plug name
pub const FACADE_PLUG_PREFIX: &str = "_FP_";

/// A plug of a wrapped node, exposed on a facade node.
///
/// Its name embeds the wrapped node's id so plugs of the same name on
/// different wrapped nodes stay apart: `_FP_<node>_<plug>`.
#[derive(Debug)]
pub struct VirtualPlug {
    name: Arc<str>,
    inner_node: NodeId,
    inner_node_name: String,
    inner_plug: PlugRef,
}

impl VirtualPlug {
    pub(crate) fn new(inner_node: NodeId, inner_node_name: String, inner_plug: PlugRef) -> Self {
        let name = format!("{FACADE_PLUG_PREFIX}{inner_node_name}_{}", inner_plug.name());
        Self {
            name: Arc::from(name),
            inner_node,
            inner_node_name,
            inner_plug,
        }
    }

    /// Name on the facade node
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the name
    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Name of the wrapped plug
    pub fn short_name(&self) -> &str {
        self.inner_plug.name()
    }

    /// Handle of the wrapped node inside the wrapped graph
    pub fn inner_node(&self) -> NodeId {
        self.inner_node
    }

    /// Id of the wrapped node
    pub fn inner_node_name(&self) -> &str {
        &self.inner_node_name
    }

    /// The wrapped plug
    pub fn inner_plug(&self) -> &PlugRef {
        &self.inner_plug
    }

    /// Shell of the wrapped plug inside the wrapped graph
    pub fn inner_shell(&self) -> PlugShell {
        PlugShell::new(self.inner_node, self.inner_plug.name_arc())
    }
}

/// Lookup tables between virtual plugs and the wrapped shells behind them
#[derive(Debug, Default)]
pub(crate) struct ShellAdapter {
    pub(crate) discovered: bool,
    pub(crate) plugs: Vec<Arc<VirtualPlug>>,
    by_name: HashMap<Arc<str>, Arc<VirtualPlug>>,
    by_inner: HashMap<PlugShell, Arc<VirtualPlug>>,
}

impl ShellAdapter {
    pub(crate) fn insert(&mut self, plug: VirtualPlug) {
        if self.by_name.contains_key(plug.name()) {
            return;
        }
        let plug = Arc::new(plug);
        self.by_name.insert(plug.name_arc().clone(), plug.clone());
        self.by_inner.insert(plug.inner_shell(), plug.clone());
        self.plugs.push(plug);
    }

    pub(crate) fn by_name(&self, name: &str) -> Option<&Arc<VirtualPlug>> {
        self.by_name.get(name)
    }

    /// Virtual plug exposing the wrapped `shell`
    pub(crate) fn by_inner(&self, shell: &PlugShell) -> Option<&Arc<VirtualPlug>> {
        self.by_inner.get(shell)
    }

    /// Plugs whose wrapped plug is called `short_name`
    pub(crate) fn by_short_name<'a>(&'a self, short_name: &'a str) -> impl Iterator<Item = &'a Arc<VirtualPlug>> + 'a {
        self.plugs.iter().filter(move |p| p.short_name() == short_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Attribute, AttributeFlags};
    use crate::plug::Plug;
    use crate::value::INT;

    fn plug(name: &str) -> PlugRef {
        PlugRef::Static(Arc::new(Plug::named(name, Attribute::new(&INT, AttributeFlags::NONE))))
    }

    #[test]
    fn test_long_name() {
        let node = NodeId::new();
        let vplug = VirtualPlug::new(node, "inner".into(), plug("value"));
        assert_eq!(vplug.name(), "_FP_inner_value");
        assert_eq!(vplug.short_name(), "value");
        assert_eq!(vplug.inner_shell(), PlugShell::new(node, "value"));
    }

    #[test]
    fn test_adapter_lookups() {
        let (a, b) = (NodeId::new(), NodeId::new());
        let mut adapter = ShellAdapter::default();
        adapter.insert(VirtualPlug::new(a, "a".into(), plug("value")));
        adapter.insert(VirtualPlug::new(b, "b".into(), plug("value")));
        adapter.insert(VirtualPlug::new(a, "a".into(), plug("value")));

        assert_eq!(adapter.plugs.len(), 2);
        assert_eq!(adapter.by_short_name("value").count(), 2);
        assert!(adapter.by_name("_FP_b_value").is_some());
        let found = adapter.by_inner(&PlugShell::new(a, "value")).unwrap();
        assert_eq!(found.name(), "_FP_a_value");
    }
}
