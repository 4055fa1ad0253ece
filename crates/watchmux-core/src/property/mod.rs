//! Property mutation engine.
//!
//! Data objects have no native change notification, so the engine hands out
//! an [`ObjectProxy`] per observed object. Every read, write and delete made
//! through the proxy is turned into a [`PropertyMutation`] and dispatched to
//! the object's subscribers before the access is performed.

mod engine;
mod event;
mod proxy;

pub use engine::{PropertyCallback, PropertyEngine};
pub use event::{PropertyMutation, PropertyValues};
pub use proxy::ObjectProxy;
