//! The contract shared by every change engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::callback::Callback;
use crate::error::{Error, Result};
use crate::filter::FilterOptions;

/// The kinds of engine a registry can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Node tree mutations. Also accepted as `structural`.
    Mutation,
    /// Data object property accesses. Also accepted as `property`.
    Object,
}

impl EngineKind {
    /// Every kind, in registry order.
    pub const ALL: [EngineKind; 2] = [EngineKind::Mutation, EngineKind::Object];

    /// The canonical kind name.
    pub const fn as_str(self) -> &'static str {
        match self {
            EngineKind::Mutation => "mutation",
            EngineKind::Object => "object",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mutation" | "structural" => Ok(EngineKind::Mutation),
            "object" | "property" => Ok(EngineKind::Object),
            other => Err(Error::UnsupportedKind(other.to_string())),
        }
    }
}

/// A multi-subscriber change engine.
///
/// Implementations multiplex many subscribers, each with its own options,
/// over one underlying observation mechanism, and dispatch every event to
/// exactly the subscribers it is relevant to.
pub trait ChangeEngine {
    /// The observed resource.
    type Target;
    /// The event delivered to subscribers.
    type Event;
    /// Per-subscriber options.
    type Filter: FilterOptions;

    /// The engine kind.
    fn kind(&self) -> EngineKind;

    /// Subscribe `callback` to `target`. `None` selects the engine defaults.
    fn subscribe(
        &self,
        target: &Self::Target,
        callback: Callback<Self::Event>,
        options: Option<Self::Filter>,
    ) -> Result<()>;

    /// Unsubscribe `callback` from `target`. Unknown pairs are ignored.
    fn unsubscribe(&self, target: &Self::Target, callback: &Callback<Self::Event>) -> Result<()>;

    /// Dispatch `events` to the relevant subscribers.
    fn notify(&self, events: &[Self::Event]);

    /// Stop the underlying observation.
    fn disconnect(&self);

    /// Forget every subscription.
    fn clear(&self);

    /// Number of targets with subscribers.
    fn target_count(&self) -> usize;

    /// Number of subscribers on `target`.
    fn subscriber_count(&self, target: &Self::Target) -> usize;
}
