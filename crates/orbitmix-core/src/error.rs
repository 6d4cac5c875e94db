//! Error types for orbitmix-core.

use crate::node::NodeId;
use thiserror::Error;

/// Error type for host and graph operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Failed to construct {kind} node: {reason}")]
    NodeConstruction { kind: &'static str, reason: String },

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Invalid port: node {node} has no {direction} {port}")]
    InvalidPort {
        node: NodeId,
        direction: &'static str,
        port: usize,
    },

    #[error("No {0} unit has been created on this orbit yet")]
    EffectNotReady(&'static str),

    #[error("Start failed: {0}")]
    StartFailed(String),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
