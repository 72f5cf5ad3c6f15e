// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types raised by graph construction, connection and evaluation.

use crate::node::NodeId;
use thiserror::Error;

/// Error when creating a connection between two plug shells
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The destination attribute cannot take values of the source attribute
    #[error("cannot connect {from} to {to} as they are incompatible")]
    Incompatible {
        /// Source shell
        from: String,
        /// Destination shell
        to: String,
    },

    /// The destination already has an input connection
    #[error("cannot connect {from} to {to} as it is already connected to {existing}")]
    AlreadyConnected {
        /// Source shell
        from: String,
        /// Destination shell
        to: String,
        /// Shell currently feeding the destination
        existing: String,
    },

    /// Source and destination do not live in the same graph
    #[error("cannot connect nodes from different graphs: {0}")]
    ForeignGraph(String),
}

/// Error when reading or writing a plug
#[derive(Debug, Error)]
pub enum AccessError {
    /// The plug is read-only, computed, or fed by a connection
    #[error("not writable: {0}")]
    NotWritable(String),

    /// The plug cannot be read
    #[error("not readable: {0}")]
    NotReadable(String),

    /// An unconnected input has no default value to fall back to
    #[error("missing default value: {0}")]
    MissingDefaultValue(String),
}

/// Error produced while a node computes a plug.
///
/// The message accumulates the shells the error travelled through, outermost
/// first, e.g. `consumer.out->producer.out->division by zero`.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// The node refused to produce a value
    #[error("{0}")]
    Failed(String),

    /// The node does not know how to compute the requested plug
    #[error("{0}")]
    PlugUnhandled(String),

    /// Any other failure inside a compute implementation
    #[error("{0}")]
    Other(String),
}

impl ComputeError {
    /// Create a [`ComputeError::Failed`]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Create a [`ComputeError::PlugUnhandled`] for the given plug name
    pub fn unhandled(plug: &str) -> Self {
        Self::PlugUnhandled(format!("plug {plug} is not handled by compute"))
    }

    /// The message without the variant
    pub fn message(&self) -> &str {
        match self {
            Self::Failed(m) | Self::PlugUnhandled(m) | Self::Other(m) => m,
        }
    }

    /// Prefix the message with the shell the error passed through, keeping the variant
    pub fn within(self, shell: &str) -> Self {
        let wrap = |m: String| format!("{shell}->{m}");
        match self {
            Self::Failed(m) => Self::Failed(wrap(m)),
            Self::PlugUnhandled(m) => Self::PlugUnhandled(wrap(m)),
            Self::Other(m) => Self::Other(wrap(m)),
        }
    }
}

/// Error when declaring plugs on a node type
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// A plug was stored under a different name than the one it is bound to
    #[error("plug is named {bound}, but is registered as {requested}")]
    NameMismatch {
        /// Name the plug is bound to
        bound: String,
        /// Name it was registered under
        requested: String,
    },

    /// The plug has not been bound to a name yet
    #[error("plug has no name")]
    Unbound,

    /// Two plugs share a name on the same type
    #[error("duplicate plug {0}")]
    DuplicatePlug(String),

    /// An affects relation names a plug the type does not have
    #[error("unknown plug {0}")]
    UnknownPlug(String),
}

/// Any error raised by the engine
#[derive(Debug, Error)]
pub enum GraphError {
    /// Connection failure
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Plug access failure
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Failure inside a node's compute
    #[error("compute error: {0}")]
    Compute(#[from] ComputeError),

    /// Invalid plug declaration
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A value does not fit the attribute it is stored in
    #[error("type error: {0}")]
    Type(String),

    /// A compute returned [`Value::Null`](crate::Value::Null)
    #[error("plug {0} returned no value - check the node's compute implementation")]
    NullResult(String),

    /// A value was written to an uncached plug
    #[error("plug {0} is uncached, a written value would never be held")]
    UncachedWrite(String),

    /// Node handle unknown to the graph
    #[error("node {0} is not part of this graph")]
    NodeNotFound(NodeId),

    /// Plug name unknown to the node
    #[error("plug {plug} does not exist on node {node}")]
    PlugNotFound {
        /// Node id
        node: String,
        /// Requested plug name
        plug: String,
    },

    /// Facade plug discovery failed
    #[error("facade {node}: {message}")]
    Facade {
        /// Facade node id
        node: String,
        /// Description
        message: String,
    },
}

impl GraphError {
    /// Whether this is a missing default value error
    pub fn is_missing_default(&self) -> bool {
        matches!(self, Self::Access(AccessError::MissingDefaultValue(_)))
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, GraphError>;
