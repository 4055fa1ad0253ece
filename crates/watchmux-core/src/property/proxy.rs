//! Intercepting handles over data objects.
//!
//! A retired proxy keeps forwarding accesses to its object but no longer
//! reports them to the engine.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use watchmux_host::{Access, DataObject, Intercepted, Interceptor};

use super::engine::{PropertyEngine, Shared};
use super::event::PropertyMutation;
use crate::stats::DispatchStats;

pub(super) struct ProxyHook {
    engine: Weak<RefCell<Shared>>,
    stats: Rc<DispatchStats>,
    active: Cell<bool>,
}

impl Interceptor for ProxyHook {
    fn intercept(&self, target: &DataObject, access: Access) {
        if !self.active.get() {
            return;
        }
        let Some(inner) = self.engine.upgrade() else {
            return;
        };
        let engine = PropertyEngine::from_parts(inner, Rc::clone(&self.stats));
        engine.notify(&PropertyMutation::from_access(target.id(), access));
    }
}

/// An observed view of a [`DataObject`].
///
/// Reads, writes and deletes through the proxy notify the engine's
/// subscribers, then act on the underlying object. Cloning creates a new
/// handle to the same proxy. Once the object's last subscriber leaves, the
/// proxy still forwards every operation but no longer notifies.
#[derive(Clone)]
pub struct ObjectProxy {
    inner: Rc<Intercepted<ProxyHook>>,
}

impl ObjectProxy {
    pub(super) fn new(target: DataObject, engine: Weak<RefCell<Shared>>, stats: Rc<DispatchStats>) -> Self {
        let hook = ProxyHook {
            engine,
            stats,
            active: Cell::new(true),
        };
        Self {
            inner: Rc::new(Intercepted::new(target, hook)),
        }
    }

    pub(super) fn retire(&self) {
        self.inner.hook().active.set(false);
    }

    /// Whether accesses through this proxy still notify.
    pub fn is_active(&self) -> bool {
        self.inner.hook().active.get()
    }

    /// Read a property.
    pub fn get(&self, property: &str) -> Option<Value> {
        self.inner.get(property)
    }

    /// Write a property, returning the value it replaced.
    pub fn set(&self, property: &str, value: impl Into<Value>) -> Option<Value> {
        self.inner.set(property, value)
    }

    /// Delete a property, returning the removed value.
    pub fn delete(&self, property: &str) -> Option<Value> {
        self.inner.delete(property)
    }

    /// Whether the property exists. Does not notify.
    pub fn contains_key(&self, property: &str) -> bool {
        self.inner.contains_key(property)
    }

    /// Property names. Does not notify.
    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    /// The underlying object.
    pub fn target(&self) -> &DataObject {
        self.inner.target()
    }

    /// Whether both handles refer to the same proxy.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObjectProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectProxy")
            .field("target", &self.target().id())
            .field("active", &self.is_active())
            .finish()
    }
}
