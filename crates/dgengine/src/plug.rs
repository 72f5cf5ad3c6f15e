// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plug definitions shared by all instances of a node type.

use crate::attribute::{Attribute, AttributeFlags};
use crate::error::RegistrationError;
use crate::facade::VirtualPlug;
use std::sync::Arc;

/// A named, typed slot on a node type.
///
/// Plugs are either inputs or outputs, never both: a plug provides output when
/// another plug affects it or its attribute is [`COMPUTABLE`](AttributeFlags::COMPUTABLE).
#[derive(Debug, Clone)]
pub struct Plug {
    name: Option<Arc<str>>,
    attribute: Attribute,
    affects: Vec<Arc<str>>,
    affected_by: Vec<Arc<str>>,
}

impl Plug {
    /// Create an unnamed plug, to be bound when it is registered on a type
    pub fn new(attribute: Attribute) -> Self {
        Self {
            name: None,
            attribute,
            affects: Vec::new(),
            affected_by: Vec::new(),
        }
    }

    /// Create a plug bound to `name`
    pub fn named(name: &str, attribute: Attribute) -> Self {
        Self {
            name: Some(Arc::from(name)),
            ..Self::new(attribute)
        }
    }

    /// Bind the plug's name. A plug can be bound once; binding it again under
    /// another name is an error.
    pub fn bind_name(&mut self, name: &str) -> Result<(), RegistrationError> {
        match &self.name {
            None => {
                self.name = Some(Arc::from(name));
                Ok(())
            }
            Some(bound) if &**bound == name => Ok(()),
            Some(bound) => Err(RegistrationError::NameMismatch {
                bound: bound.to_string(),
                requested: name.to_owned(),
            }),
        }
    }

    /// Plug name, empty while unbound
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Shared handle to the name
    pub fn name_arc(&self) -> Option<&Arc<str>> {
        self.name.as_ref()
    }

    /// Whether a name has been bound
    pub fn is_bound(&self) -> bool {
        self.name.is_some()
    }

    /// Attribute describing the plug's values
    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    /// Record that this plug affects `other`. Idempotent.
    pub fn affects(&mut self, other: &mut Plug) -> Result<(), RegistrationError> {
        let (Some(mine), Some(theirs)) = (self.name.clone(), other.name.clone()) else {
            return Err(RegistrationError::Unbound);
        };
        self.add_affected(theirs);
        other.add_affected_by(mine);
        Ok(())
    }

    pub(crate) fn add_affected(&mut self, name: Arc<str>) {
        if !self.affects.contains(&name) {
            self.affects.push(name);
        }
    }

    pub(crate) fn add_affected_by(&mut self, name: Arc<str>) {
        if !self.affected_by.contains(&name) {
            self.affected_by.push(name);
        }
    }

    /// Names of plugs affected by this one
    pub fn affected(&self) -> &[Arc<str>] {
        &self.affects
    }

    /// Names of plugs affecting this one
    pub fn affected_by(&self) -> &[Arc<str>] {
        &self.affected_by
    }

    /// True if this plug is computed by its node
    pub fn provides_output(&self) -> bool {
        !self.affected_by.is_empty() || self.attribute.has_flag(AttributeFlags::COMPUTABLE)
    }

    /// True if this plug is never computed
    pub fn provides_input(&self) -> bool {
        !self.provides_output()
    }
}

/// Handle to either a registered plug or a facade's virtual plug
#[derive(Debug, Clone)]
pub enum PlugRef {
    /// Plug declared on a [`NodeType`](crate::NodeType)
    Static(Arc<Plug>),
    /// Plug exposed by a [`FacadeNode`](crate::FacadeNode)
    Virtual(Arc<VirtualPlug>),
}

impl PlugRef {
    /// Name identifying the plug on its node
    pub fn name(&self) -> &str {
        match self {
            Self::Static(p) => p.name(),
            Self::Virtual(v) => v.name(),
        }
    }

    /// Shared handle to the name
    pub fn name_arc(&self) -> Arc<str> {
        match self {
            Self::Static(p) => p.name_arc().cloned().unwrap_or_else(|| Arc::from("")),
            Self::Virtual(v) => v.name_arc().clone(),
        }
    }

    /// Attribute of the plug; virtual plugs report their wrapped plug's attribute
    pub fn attribute(&self) -> &Attribute {
        match self {
            Self::Static(p) => p.attribute(),
            Self::Virtual(v) => v.inner_plug().attribute(),
        }
    }

    /// True if this plug is computed by its node
    pub fn provides_output(&self) -> bool {
        match self {
            Self::Static(p) => p.provides_output(),
            Self::Virtual(v) => v.inner_plug().provides_output(),
        }
    }

    /// True if this plug is never computed
    pub fn provides_input(&self) -> bool {
        !self.provides_output()
    }

    /// The registered plug, if this is one
    pub fn as_static(&self) -> Option<&Arc<Plug>> {
        match self {
            Self::Static(p) => Some(p),
            Self::Virtual(_) => None,
        }
    }

    /// The virtual plug, if this is one
    pub fn as_virtual(&self) -> Option<&Arc<VirtualPlug>> {
        match self {
            Self::Static(_) => None,
            Self::Virtual(v) => Some(v),
        }
    }
}

impl From<Arc<Plug>> for PlugRef {
    fn from(plug: Arc<Plug>) -> Self {
        Self::Static(plug)
    }
}
