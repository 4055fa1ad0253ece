//! Mutation records produced by the node tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::NodeId;

/// The kind of tree mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    /// Children were added or removed.
    ChildList,
    /// An attribute was set or removed.
    Attributes,
    /// A text node's data changed.
    CharacterData,
}

impl MutationKind {
    /// The record type name (`childList`, `attributes`, `characterData`).
    pub const fn as_str(self) -> &'static str {
        match self {
            MutationKind::ChildList => "childList",
            MutationKind::Attributes => "attributes",
            MutationKind::CharacterData => "characterData",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded tree mutation.
///
/// `target` is the node the mutation happened on: the parent for child-list
/// changes, the element for attribute changes and the text node for
/// character-data changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeMutation {
    /// Mutation kind.
    #[serde(rename = "type")]
    pub kind: MutationKind,
    /// Node the mutation happened on.
    pub target: NodeId,
    /// Nodes inserted under `target`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added_nodes: Vec<NodeId>,
    /// Nodes removed from `target`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_nodes: Vec<NodeId>,
    /// Attribute name for attribute mutations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
    /// Previous attribute value or text, when requested by the observer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
}

impl TreeMutation {
    /// A child-list record.
    pub fn child_list(target: NodeId, added_nodes: Vec<NodeId>, removed_nodes: Vec<NodeId>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added_nodes,
            removed_nodes,
            attribute_name: None,
            old_value: None,
        }
    }

    /// An attribute record.
    pub fn attributes(target: NodeId, name: impl Into<String>, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::Attributes,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: Some(name.into()),
            old_value,
        }
    }

    /// A character-data record.
    pub fn character_data(target: NodeId, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::CharacterData,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: None,
            old_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(MutationKind::ChildList.as_str(), "childList");
        assert_eq!(MutationKind::Attributes.to_string(), "attributes");
        assert_eq!(MutationKind::CharacterData.as_str(), "characterData");
    }

    #[test]
    fn test_record_json_shape() {
        let record = TreeMutation::attributes(NodeId::from_raw(3), "class", Some("a".into()));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["type"], "attributes");
        assert_eq!(json["target"], 3);
        assert_eq!(json["attributeName"], "class");
        assert_eq!(json["oldValue"], "a");
        assert!(json.get("addedNodes").is_none());
    }
}
