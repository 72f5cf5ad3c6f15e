// SPDX-License-Identifier: MIT OR Apache-2.0
//! Facades: single nodes standing in for a group of wrapped nodes.
//!
//! A [`FacadeNode`] exposes selected plugs of the nodes in its wrapped graph
//! as [`VirtualPlug`]s. Connections, traversal and affects relations see the
//! facade as an ordinary node; values and invalidation flow through to the
//! wrapped graph and back out.

mod graph_node;
mod node;
mod plug;

pub use graph_node::GraphPlugSource;
pub use node::{FacadeNode, PlugSource};
pub use plug::{VirtualPlug, FACADE_PLUG_PREFIX};
