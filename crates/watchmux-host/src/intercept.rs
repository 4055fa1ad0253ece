//! Interception wrapper for data objects.
//!
//! [`Intercepted`] forwards reads, writes and deletes to its target after
//! handing an [`Access`] description to an [`Interceptor`]. The hook cannot
//! veto or alter the operation; apart from running the hook, the wrapper
//! behaves exactly like the object it wraps.

use std::fmt;

use serde_json::Value;

use crate::object::DataObject;

/// A property access about to be performed.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// A read.
    Get {
        property: String,
        current: Option<Value>,
    },
    /// A write.
    Set {
        property: String,
        previous: Option<Value>,
        next: Value,
    },
    /// A delete.
    Delete {
        property: String,
        current: Option<Value>,
    },
}

impl Access {
    /// The accessed property name.
    pub fn property(&self) -> &str {
        match self {
            Access::Get { property, .. }
            | Access::Set { property, .. }
            | Access::Delete { property, .. } => property,
        }
    }
}

/// Hook run before every intercepted access.
pub trait Interceptor {
    /// Called with the target and the access, before the access is performed.
    fn intercept(&self, target: &DataObject, access: Access);
}

/// A data object whose reads, writes and deletes run a hook first.
pub struct Intercepted<H> {
    target: DataObject,
    hook: H,
}

impl<H: Interceptor> Intercepted<H> {
    /// Wrap `target`.
    pub fn new(target: DataObject, hook: H) -> Self {
        Self { target, hook }
    }

    /// The wrapped object.
    pub fn target(&self) -> &DataObject {
        &self.target
    }

    /// The hook.
    pub fn hook(&self) -> &H {
        &self.hook
    }

    /// Read a property.
    pub fn get(&self, property: &str) -> Option<Value> {
        self.hook.intercept(
            &self.target,
            Access::Get {
                property: property.to_string(),
                current: self.target.get(property),
            },
        );
        self.target.get(property)
    }

    /// Write a property, returning the value it replaced.
    pub fn set(&self, property: &str, value: impl Into<Value>) -> Option<Value> {
        let next = value.into();
        self.hook.intercept(
            &self.target,
            Access::Set {
                property: property.to_string(),
                previous: self.target.get(property),
                next: next.clone(),
            },
        );
        self.target.set(property, next)
    }

    /// Delete a property, returning the removed value.
    pub fn delete(&self, property: &str) -> Option<Value> {
        self.hook.intercept(
            &self.target,
            Access::Delete {
                property: property.to_string(),
                current: self.target.get(property),
            },
        );
        self.target.delete(property)
    }

    /// Whether the property exists. Not intercepted.
    pub fn contains_key(&self, property: &str) -> bool {
        self.target.contains_key(property)
    }

    /// Property names. Not intercepted.
    pub fn keys(&self) -> Vec<String> {
        self.target.keys()
    }
}

impl<H> fmt::Debug for Intercepted<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intercepted")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
