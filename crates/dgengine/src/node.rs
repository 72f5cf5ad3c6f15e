// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node contract, per-type plug registries and plug ranking.

use crate::attribute::{Attribute, Rate, RATE_NO};
use crate::error::{GraphError, RegistrationError, Result};
use crate::facade::FacadeNode;
use crate::graph::Graph;
use crate::plug::{Plug, PlugRef};
use crate::shell::{Boundary, PlugShell};
use crate::value::{Mode, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Handle of a node inside a [`Graph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contract every graph participant implements.
///
/// A node owns no plug state: its caches and connections live in the
/// [`Graph`] it was added to. Implementations only describe their plugs and
/// compute output plugs on request.
pub trait Node: fmt::Debug {
    /// Identifier used for display and lookups by name
    fn id(&self) -> &str;

    /// All plugs of this node
    fn plugs(&self) -> Vec<PlugRef>;

    /// Plug with the given name
    fn plug(&self, name: &str) -> Option<PlugRef> {
        self.plugs().into_iter().find(|p| p.name() == name)
    }

    /// Compute the value of an output `plug`.
    ///
    /// Read other plugs of this node through `ctx`. Returning
    /// [`Value::Null`] is a contract violation, report refusal through
    /// [`ComputeError`](crate::ComputeError) instead.
    fn compute(&self, ctx: &mut ComputeContext<'_>, plug: &PlugRef, mode: &Mode) -> Result<Value>;

    /// Fresh instance with the same configuration and no graph state
    fn duplicate(&self) -> Result<Box<dyn Node>>;

    /// Facade behavior, if this node is one
    fn as_facade(&self) -> Option<&FacadeNode> {
        None
    }
}

/// Access to the graph while a node computes one of its plugs
pub struct ComputeContext<'a> {
    pub(crate) graph: &'a Graph,
    pub(crate) boundary: &'a mut dyn Boundary,
    pub(crate) node: NodeId,
}

impl ComputeContext<'_> {
    /// Handle of the computing node
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Shell of one of the computing node's plugs
    pub fn shell(&self, plug: &str) -> PlugShell {
        PlugShell::new(self.node, plug)
    }

    /// Read a plug of the computing node
    pub fn get(&mut self, plug: &str, mode: &Mode) -> Result<Value> {
        let shell = self.shell(plug);
        self.graph.get_in(&shell, mode, &mut *self.boundary)
    }

    /// Store a value in the cache of one of the computing node's plugs,
    /// e.g. a sibling output computed as a by-product
    pub fn set_cache(&mut self, plug: &str, value: Value) -> Result<()> {
        let shell = self.shell(plug);
        self.graph.set_cache_in(&shell, value, &mut *self.boundary)
    }

    /// Read-only view of the graph
    pub fn graph(&self) -> &Graph {
        self.graph
    }
}

/// Plug registry of a node type, shared by all its instances.
///
/// Built once through [`NodeTypeBuilder`], usually into a `static`:
///
/// ```
/// use std::sync::{Arc, LazyLock};
/// use dgengine::{Attribute, AttributeFlags, NodeType};
/// use dgengine::value::INT;
///
/// static ADD: LazyLock<Arc<NodeType>> = LazyLock::new(|| {
///     NodeType::builder("Add")
///         .register_plug("a", Attribute::new(&INT, AttributeFlags::NONE))
///         .and_then(|b| b.register_plug("sum", Attribute::new(&INT, AttributeFlags::NONE)))
///         .and_then(|b| b.affects("a", "sum"))
///         .map(|b| b.build())
///         .expect("valid plug declarations")
/// });
///
/// assert!(ADD.plug("sum").unwrap().provides_output());
/// ```
#[derive(Debug)]
pub struct NodeType {
    name: String,
    plugs: IndexMap<Arc<str>, Arc<Plug>>,
}

impl NodeType {
    /// Start declaring a node type
    pub fn builder(name: impl Into<String>) -> NodeTypeBuilder {
        NodeTypeBuilder {
            name: name.into(),
            plugs: IndexMap::new(),
        }
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plug with the given name
    pub fn plug(&self, name: &str) -> Option<&Arc<Plug>> {
        self.plugs.get(name)
    }

    /// Plug with the given name as a [`PlugRef`]
    pub fn plug_ref(&self, name: &str) -> Option<PlugRef> {
        self.plug(name).cloned().map(PlugRef::Static)
    }

    /// All plugs as [`PlugRef`]s, in declaration order
    pub fn plug_refs(&self) -> Vec<PlugRef> {
        self.plugs.values().cloned().map(PlugRef::Static).collect()
    }

    /// Plugs matching `predicate`, in declaration order
    pub fn plugs_static(&self, predicate: impl Fn(&Plug) -> bool) -> Vec<Arc<Plug>> {
        self.plugs.values().filter(|p| predicate(p)).cloned().collect()
    }

    /// Plugs suitable as input
    pub fn input_plugs_static(&self) -> Vec<Arc<Plug>> {
        self.plugs_static(Plug::provides_input)
    }

    /// Plugs suitable to deliver output
    pub fn output_plugs_static(&self) -> Vec<Arc<Plug>> {
        self.plugs_static(Plug::provides_output)
    }
}

/// Builder registering the plugs of a [`NodeType`]
#[derive(Debug)]
pub struct NodeTypeBuilder {
    name: String,
    plugs: IndexMap<Arc<str>, Plug>,
}

impl NodeTypeBuilder {
    /// Register a new plug called `name`
    pub fn register_plug(self, name: &str, attribute: Attribute) -> std::result::Result<Self, RegistrationError> {
        self.insert_plug(name, Plug::new(attribute))
    }

    /// Register an existing plug under `key`. Unbound plugs are bound to `key`,
    /// plugs already bound to a different name are rejected.
    pub fn insert_plug(mut self, key: &str, mut plug: Plug) -> std::result::Result<Self, RegistrationError> {
        plug.bind_name(key)?;
        if self.plugs.contains_key(key) {
            return Err(RegistrationError::DuplicatePlug(key.to_owned()));
        }
        self.plugs.insert(Arc::from(key), plug);
        Ok(self)
    }

    /// Declare that plug `source` affects plug `target`. Idempotent.
    pub fn affects(mut self, source: &str, target: &str) -> std::result::Result<Self, RegistrationError> {
        let source_name = self.key(source)?;
        let target_name = self.key(target)?;
        if let Some(plug) = self.plugs.get_mut(source) {
            plug.add_affected(target_name);
        }
        if let Some(plug) = self.plugs.get_mut(target) {
            plug.add_affected_by(source_name);
        }
        Ok(self)
    }

    fn key(&self, name: &str) -> std::result::Result<Arc<str>, RegistrationError> {
        self.plugs
            .get_key_value(name)
            .map(|(k, _)| k.clone())
            .ok_or_else(|| RegistrationError::UnknownPlug(name.to_owned()))
    }

    /// Finish the type
    pub fn build(self) -> Arc<NodeType> {
        tracing::trace!(node_type = %self.name, plugs = self.plugs.len(), "registered node type");
        Arc::new(NodeType {
            name: self.name,
            plugs: self
                .plugs
                .into_iter()
                .map(|(name, plug)| (name, Arc::new(plug)))
                .collect(),
        })
    }
}

/// What [`rank_plugs`] compares plugs against
#[derive(Debug, Clone, Copy)]
pub enum RankTarget<'a> {
    /// Rate attribute compatibility
    Attribute(&'a Attribute),
    /// Rate how well each plug can hold the value
    Value(&'a Value),
}

/// Options of [`rank_plugs`]
#[derive(Debug, Clone, Copy)]
pub struct RankOptions {
    /// Fail if two compatible plugs share the same rating
    pub raise_on_ambiguity: bool,
    /// Rate attribute affinity only, ignoring whether a connection is possible
    pub attr_affinity: bool,
    /// Treat the target attribute as the source of values; otherwise the
    /// plugs feed the target
    pub attr_as_source: bool,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            raise_on_ambiguity: false,
            attr_affinity: false,
            attr_as_source: true,
        }
    }
}

/// Rate `plugs` against `target`, dropping incompatible ones, best match first.
///
/// Lets callers pick a suitable plug for a value or connection without
/// repeating the compatibility rules.
pub fn rank_plugs(
    plugs: impl IntoIterator<Item = PlugRef>,
    target: RankTarget<'_>,
    options: RankOptions,
) -> Result<Vec<(Rate, PlugRef)>> {
    let mut ranked: Vec<(Rate, PlugRef)> = plugs
        .into_iter()
        .filter_map(|plug| {
            let rate = match target {
                RankTarget::Value(value) => plug.attribute().compatibility_rate(value),
                RankTarget::Attribute(attribute) => {
                    let (source, destination) = if options.attr_as_source {
                        (attribute, plug.attribute())
                    } else {
                        (plug.attribute(), attribute)
                    };
                    if options.attr_affinity {
                        destination.affinity(source)
                    } else {
                        source.connection_affinity(destination)
                    }
                }
            };
            (rate != RATE_NO).then_some((rate, plug))
        })
        .collect();

    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    if options.raise_on_ambiguity {
        let mut by_rate: BTreeMap<Rate, Vec<&str>> = BTreeMap::new();
        for (rate, plug) in &ranked {
            by_rate.entry(*rate).or_default().push(plug.name());
        }
        let report: Vec<String> = by_rate
            .iter()
            .rev()
            .filter(|(_, names)| names.len() > 1)
            .map(|(rate, names)| format!("rate {rate}: {}", names.join(", ")))
            .collect();
        if !report.is_empty() {
            return Err(GraphError::Type(format!("ambiguous plugs found: {}", report.join("; "))));
        }
    }

    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeFlags, RATE_PERFECT};
    use crate::value::{FLOAT, INT, NUMBER, STRING};

    fn build() -> Arc<NodeType> {
        NodeType::builder("Test")
            .register_plug("a", Attribute::new(&INT, AttributeFlags::NONE))
            .and_then(|b| b.register_plug("b", Attribute::new(&NUMBER, AttributeFlags::NONE)))
            .and_then(|b| b.register_plug("label", Attribute::new(&STRING, AttributeFlags::NONE)))
            .and_then(|b| b.register_plug("out", Attribute::new(&FLOAT, AttributeFlags::NONE)))
            .and_then(|b| b.affects("a", "out"))
            .and_then(|b| b.affects("b", "out"))
            .and_then(|b| b.affects("a", "out"))
            .map(NodeTypeBuilder::build)
            .unwrap()
    }

    #[test]
    fn test_registry_declaration_order() {
        let ty = build();
        let names: Vec<_> = ty.plug_refs().iter().map(|p| p.name().to_owned()).collect();
        assert_eq!(names, ["a", "b", "label", "out"]);
        assert_eq!(ty.plug("out").unwrap().affected_by().len(), 2);
        assert_eq!(ty.output_plugs_static().len(), 1);
        assert_eq!(ty.input_plugs_static().len(), 3);
    }

    #[test]
    fn test_registration_errors() {
        let dup = NodeType::builder("Dup")
            .register_plug("a", Attribute::new(&INT, AttributeFlags::NONE))
            .and_then(|b| b.register_plug("a", Attribute::new(&INT, AttributeFlags::NONE)));
        assert_eq!(dup.unwrap_err(), RegistrationError::DuplicatePlug("a".into()));

        let unknown = NodeType::builder("Unknown")
            .register_plug("a", Attribute::new(&INT, AttributeFlags::NONE))
            .and_then(|b| b.affects("a", "missing"));
        assert_eq!(unknown.unwrap_err(), RegistrationError::UnknownPlug("missing".into()));
    }

    #[test]
    fn test_copied_plug_must_keep_its_name() {
        let ty = build();
        let copied = Plug::clone(ty.plug("a").unwrap());
        let err = NodeType::builder("Other").insert_plug("renamed", copied).unwrap_err();
        assert!(matches!(err, RegistrationError::NameMismatch { .. }));

        let copied = Plug::clone(ty.plug("a").unwrap());
        assert!(NodeType::builder("Other").insert_plug("a", copied).is_ok());
    }

    #[test]
    fn test_rank_by_value() {
        let ty = build();
        let ranked = rank_plugs(ty.plug_refs(), RankTarget::Value(&Value::Int(4)), RankOptions::default()).unwrap();
        let names: Vec<_> = ranked.iter().map(|(_, p)| p.name()).collect();
        // int and number both hold ints perfectly, string and float cannot
        assert_eq!(names, ["a", "b"]);
        assert!(ranked.iter().all(|(rate, _)| *rate == RATE_PERFECT));
    }

    #[test]
    fn test_rank_ambiguity() {
        let ty = build();
        let options = RankOptions {
            raise_on_ambiguity: true,
            ..RankOptions::default()
        };
        let err = rank_plugs(ty.plug_refs(), RankTarget::Value(&Value::Int(4)), options).unwrap_err();
        assert!(matches!(err, GraphError::Type(_)));
    }

    #[test]
    fn test_rank_by_attribute_direction() {
        let ty = build();
        let source = Attribute::new(&INT, AttributeFlags::NONE);
        let ranked = rank_plugs(ty.plug_refs(), RankTarget::Attribute(&source), RankOptions::default()).unwrap();
        assert_eq!(ranked.first().map(|(_, p)| p.name()), Some("a"));

        // the plugs feeding an int destination: number rates below int
        let options = RankOptions {
            attr_as_source: false,
            ..RankOptions::default()
        };
        let ranked = rank_plugs(ty.plug_refs(), RankTarget::Attribute(&source), options).unwrap();
        assert_eq!(ranked[0].1.name(), "a");
        assert_eq!(ranked[0].0, RATE_PERFECT);
        assert_eq!(ranked[1].1.name(), "b");
        assert!(ranked[1].0 < RATE_PERFECT);
    }
}
