//! Shared plain data objects.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HostError, HostResult};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`DataObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object:{}", self.0)
    }
}

/// A mutable property bag with reference identity.
///
/// Cloning a `DataObject` creates a new handle to the **same** fields;
/// equality and hashing use the object's identity, never its contents.
#[derive(Clone)]
pub struct DataObject {
    id: ObjectId,
    fields: Rc<RefCell<Map<String, Value>>>,
}

impl DataObject {
    /// Create an empty object.
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    /// Create an object holding `fields`.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self {
            id: ObjectId::next(),
            fields: Rc::new(RefCell::new(fields)),
        }
    }

    /// Create an object from a JSON object value.
    pub fn from_json(value: Value) -> HostResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self::from_map(fields)),
            other => Err(HostError::NotAnObject(other.to_string())),
        }
    }

    /// The object's identity.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Read a property.
    pub fn get(&self, property: &str) -> Option<Value> {
        self.fields.borrow().get(property).cloned()
    }

    /// Write a property, returning the previous value.
    pub fn set(&self, property: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.borrow_mut().insert(property.into(), value.into())
    }

    /// Delete a property, returning the removed value.
    pub fn delete(&self, property: &str) -> Option<Value> {
        self.fields.borrow_mut().remove(property)
    }

    /// Whether the property exists.
    pub fn contains_key(&self, property: &str) -> bool {
        self.fields.borrow().contains_key(property)
    }

    /// Property names.
    pub fn keys(&self) -> Vec<String> {
        self.fields.borrow().keys().cloned().collect()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.fields.borrow().len()
    }

    /// Whether the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.fields.borrow().is_empty()
    }

    /// A JSON snapshot of the current fields.
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.borrow().clone())
    }
}

impl Default for DataObject {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for DataObject {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DataObject {}

impl Hash for DataObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataObject")
            .field("id", &self.id)
            .field("fields", &self.fields.borrow())
            .finish()
    }
}
