//! Synthesized property access events.

use serde::Serialize;
use serde_json::Value;
use watchmux_host::{Access, ObjectId};

use crate::filter::PropertyKind;

/// The values carried by a [`PropertyMutation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValues {
    /// The value at the time of a read or delete.
    Current {
        /// `None` when the property did not exist.
        curr: Option<Value>,
    },
    /// The value being replaced and its replacement.
    Change {
        /// `None` when the property did not exist.
        prev: Option<Value>,
        /// The value being written.
        next: Value,
    },
}

/// A property access on an observed object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyMutation {
    /// Access kind.
    #[serde(rename = "type")]
    pub kind: PropertyKind,
    /// The accessed object.
    pub target: ObjectId,
    /// The accessed property.
    pub property: String,
    /// Values before and after the access.
    pub values: PropertyValues,
}

impl PropertyMutation {
    /// Build the event describing `access` on `target`.
    pub fn from_access(target: ObjectId, access: Access) -> Self {
        match access {
            Access::Get { property, current } => Self {
                kind: PropertyKind::Get,
                target,
                property,
                values: PropertyValues::Current { curr: current },
            },
            Access::Set {
                property,
                previous,
                next,
            } => Self {
                kind: PropertyKind::Set,
                target,
                property,
                values: PropertyValues::Change {
                    prev: previous,
                    next,
                },
            },
            Access::Delete { property, current } => Self {
                kind: PropertyKind::Del,
                target,
                property,
                values: PropertyValues::Current { curr: current },
            },
        }
    }

    /// The current value of a read or delete.
    pub fn current(&self) -> Option<&Value> {
        match &self.values {
            PropertyValues::Current { curr } => curr.as_ref(),
            PropertyValues::Change { .. } => None,
        }
    }

    /// The replaced value of a write.
    pub fn previous(&self) -> Option<&Value> {
        match &self.values {
            PropertyValues::Change { prev, .. } => prev.as_ref(),
            PropertyValues::Current { .. } => None,
        }
    }

    /// The written value of a write.
    pub fn next(&self) -> Option<&Value> {
        match &self.values {
            PropertyValues::Change { next, .. } => Some(next),
            PropertyValues::Current { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use watchmux_host::DataObject;

    #[test]
    fn test_set_event_shape() {
        let obj = DataObject::new();
        let event = PropertyMutation::from_access(
            obj.id(),
            Access::Set {
                property: "foo".into(),
                previous: None,
                next: json!(1),
            },
        );

        assert_eq!(event.kind, PropertyKind::Set);
        assert_eq!(event.previous(), None);
        assert_eq!(event.next(), Some(&json!(1)));
        assert_eq!(event.current(), None);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "set");
        assert_eq!(value["property"], "foo");
        assert_eq!(value["values"], json!({"prev": null, "next": 1}));
    }

    #[test]
    fn test_delete_event_carries_current() {
        let obj = DataObject::new();
        let event = PropertyMutation::from_access(
            obj.id(),
            Access::Delete {
                property: "foo".into(),
                current: Some(json!("bar")),
            },
        );

        assert_eq!(event.kind, PropertyKind::Del);
        assert_eq!(event.current(), Some(&json!("bar")));
        assert_eq!(
            serde_json::to_value(&event).unwrap()["values"],
            json!({"curr": "bar"})
        );
    }
}
