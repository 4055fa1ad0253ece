//! Host error types.

use thiserror::Error;

use crate::tree::NodeId;

/// Errors raised by the node tree, observation sessions and data objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The node does not belong to this document.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The operation needs an element but got a text node.
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    /// The operation needs a text node but got an element.
    #[error("node {0} is not a text node")]
    NotAText(NodeId),

    /// The node is not a child of the given parent.
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    /// Inserting the child would make a node its own ancestor.
    #[error("cannot insert {child} into {parent}: would create a cycle")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    /// Observer configuration that watches no mutation kind.
    #[error("observer configuration must watch childList, attributes or characterData")]
    EmptyObserverInit,

    /// A JSON value other than an object was used as a data object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(String),
}

/// Result alias for host operations.
pub type HostResult<T> = Result<T, HostError>;
