//! Multi-subscriber change notification engines.
//!
//! Two engines share one subscription model. Many subscribers attach to the
//! same target, each with its own [`FilterOptions`], while the engine drives a
//! single underlying observation mechanism:
//!
//! - [`StructuralEngine`] multiplexes one [`ObservationSession`] over a node
//!   tree, widening it on subscribe and rebuilding it when a target loses its
//!   last subscriber.
//! - [`PropertyEngine`] hands out one [`ObjectProxy`] per data object and
//!   turns every read, write and delete through it into an event.
//!
//! [`EngineRegistry`] builds and memoizes one engine of each kind.
//!
//! [`ObservationSession`]: watchmux_host::ObservationSession

pub mod callback;
pub mod config;
mod dispatch;
pub mod engine;
pub mod error;
pub mod filter;
pub mod property;
pub mod registry;
pub mod stats;
pub mod structural;
pub mod table;

pub use watchmux_host as host;

pub use callback::Callback;
pub use config::{DeliveryPolicy, EngineConfig};
pub use engine::{ChangeEngine, EngineKind};
pub use error::{Error, Result};
pub use filter::{
    FilterOptions, PropertyFilter, PropertyKind, DEFAULT_PROPERTY_FILTER,
    DEFAULT_STRUCTURAL_FILTER,
};
pub use property::{ObjectProxy, PropertyCallback, PropertyEngine, PropertyMutation, PropertyValues};
pub use registry::{EngineHandle, EngineRegistry};
pub use stats::{DispatchStats, StatsSnapshot};
pub use structural::{MutationCallback, StructuralEngine};
pub use table::{Insertion, Removal, SubscriberTable};
