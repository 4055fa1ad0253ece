//! Observer configuration for tree observation sessions.

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};
use crate::mutation::MutationKind;

/// Which mutations a session registration watches.
///
/// Field names serialize in camelCase (`childList`, `attributeOldValue`, ...)
/// and missing fields deserialize as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeFilter {
    /// Children added to or removed from the node.
    pub child_list: bool,
    /// Attribute changes on the node.
    pub attributes: bool,
    /// Text changes on a text node.
    pub character_data: bool,
    /// Extend the registration to every descendant of the node.
    pub subtree: bool,
    /// Record the previous attribute value.
    pub attribute_old_value: bool,
    /// Record the previous text.
    pub character_data_old_value: bool,
}

impl TreeFilter {
    /// A filter that watches nothing.
    pub const NONE: Self = Self {
        child_list: false,
        attributes: false,
        character_data: false,
        subtree: false,
        attribute_old_value: false,
        character_data_old_value: false,
    };

    /// Create an empty filter.
    pub fn new() -> Self {
        Self::NONE
    }

    /// Watch child-list changes.
    pub fn with_child_list(mut self) -> Self {
        self.child_list = true;
        self
    }

    /// Watch attribute changes.
    pub fn with_attributes(mut self) -> Self {
        self.attributes = true;
        self
    }

    /// Watch text changes.
    pub fn with_character_data(mut self) -> Self {
        self.character_data = true;
        self
    }

    /// Include descendants.
    pub fn with_subtree(mut self) -> Self {
        self.subtree = true;
        self
    }

    /// Record previous attribute values.
    pub fn with_attribute_old_value(mut self) -> Self {
        self.attribute_old_value = true;
        self
    }

    /// Record previous text.
    pub fn with_character_data_old_value(mut self) -> Self {
        self.character_data_old_value = true;
        self
    }

    /// Whether mutations of `kind` are watched.
    pub fn wants(&self, kind: MutationKind) -> bool {
        match kind {
            MutationKind::ChildList => self.child_list,
            MutationKind::Attributes => self.attributes,
            MutationKind::CharacterData => self.character_data,
        }
    }

    /// Whether records of `kind` should carry the previous value.
    pub fn wants_old_value(&self, kind: MutationKind) -> bool {
        match kind {
            MutationKind::ChildList => false,
            MutationKind::Attributes => self.attribute_old_value,
            MutationKind::CharacterData => self.character_data_old_value,
        }
    }

    /// Whether at least one mutation kind is watched.
    pub fn watches_anything(&self) -> bool {
        self.child_list || self.attributes || self.character_data
    }

    /// Whether every flag set in `other` is also set in `self`.
    pub fn covers(&self, other: &Self) -> bool {
        (!other.child_list || self.child_list)
            && (!other.attributes || self.attributes)
            && (!other.character_data || self.character_data)
            && (!other.subtree || self.subtree)
            && (!other.attribute_old_value || self.attribute_old_value)
            && (!other.character_data_old_value || self.character_data_old_value)
    }

    /// Set the mutation kind implied by each old-value flag.
    pub fn with_implied_kinds(mut self) -> Self {
        if self.attribute_old_value {
            self.attributes = true;
        }
        if self.character_data_old_value {
            self.character_data = true;
        }
        self
    }

    /// Apply the implications a session enforces before accepting a filter.
    ///
    /// Old-value flags imply their mutation kind. A filter that still watches
    /// no kind is rejected.
    pub fn normalized(self) -> HostResult<Self> {
        let filter = self.with_implied_kinds();
        if !filter.watches_anything() {
            return Err(HostError::EmptyObserverInit);
        }
        Ok(filter)
    }
}

impl BitOr for TreeFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            child_list: self.child_list || rhs.child_list,
            attributes: self.attributes || rhs.attributes,
            character_data: self.character_data || rhs.character_data,
            subtree: self.subtree || rhs.subtree,
            attribute_old_value: self.attribute_old_value || rhs.attribute_old_value,
            character_data_old_value: self.character_data_old_value
                || rhs.character_data_old_value,
        }
    }
}

impl BitOrAssign for TreeFilter {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}
