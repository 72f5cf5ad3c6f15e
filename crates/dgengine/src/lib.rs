// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependency graph engine.
//!
//! Nodes declare typed plugs on a per-type registry. Plugs are either inputs
//! (written by the user or fed through a connection) or outputs (computed by
//! the owning node on demand). Values are pulled lazily, cached per node and
//! invalidated eagerly whenever something upstream changes.
//!
//! ## Architecture
//!
//! - [`Attribute`] describes the value type and behavior flags of a plug and
//!   rates how well values or other attributes fit it
//! - [`Plug`] is a named slot on a [`NodeType`], with static affects relations
//! - [`PlugShell`] addresses one plug on one node instance
//! - [`Graph`] owns nodes, connections and plug caches
//! - [`facade`] lets a whole wrapped graph present itself as a single node

pub mod attribute;
pub mod config;
pub mod connection;
pub mod error;
pub mod facade;
pub mod graph;
pub mod node;
pub mod plug;
pub mod shell;
pub mod traversal;
pub mod value;

pub use attribute::{Attribute, AttributeFlags, Rate, RATE_GOOD, RATE_NO, RATE_PERFECT};
pub use config::GraphNodeConfig;
pub use connection::Connection;
pub use error::{AccessError, ComputeError, ConnectionError, GraphError, RegistrationError, Result};
pub use facade::{FacadeNode, GraphPlugSource, PlugSource, VirtualPlug};
pub use graph::Graph;
pub use node::{rank_plugs, ComputeContext, Node, NodeId, NodeType, NodeTypeBuilder, RankOptions, RankTarget};
pub use plug::{Plug, PlugRef};
pub use shell::PlugShell;
pub use traversal::{Direction, Shells, Traversal};
pub use value::{Mode, Object, Value, ValueType};
