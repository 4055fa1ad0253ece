//! Engine configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use watchmux_host::TreeFilter;

use crate::error::{Error, Result};
use crate::filter::{PropertyFilter, DEFAULT_PROPERTY_FILTER, DEFAULT_STRUCTURAL_FILTER};

/// What happens when a subscriber callback panics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryPolicy {
    /// Catch the panic, log it and keep delivering to the other subscribers.
    #[default]
    Isolate,
    /// Let the panic unwind out of the dispatching call.
    Propagate,
}

impl DeliveryPolicy {
    /// The policy name.
    pub const fn as_str(self) -> &'static str {
        match self {
            DeliveryPolicy::Isolate => "isolate",
            DeliveryPolicy::Propagate => "propagate",
        }
    }
}

impl fmt::Display for DeliveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "isolate" => Ok(DeliveryPolicy::Isolate),
            "propagate" => Ok(DeliveryPolicy::Propagate),
            other => Err(Error::Config(format!("unknown delivery policy: {other}"))),
        }
    }
}

/// Configuration shared by the engines a registry builds.
///
/// Missing fields deserialize to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Options used by structural subscribers that pass none.
    pub structural_defaults: TreeFilter,
    /// Options used by property subscribers that pass none.
    pub property_defaults: PropertyFilter,
    /// Subscriber failure handling.
    pub delivery: DeliveryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            structural_defaults: DEFAULT_STRUCTURAL_FILTER,
            property_defaults: DEFAULT_PROPERTY_FILTER,
            delivery: DeliveryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the structural defaults.
    pub fn with_structural_defaults(mut self, defaults: TreeFilter) -> Self {
        self.structural_defaults = defaults;
        self
    }

    /// Set the property defaults.
    pub fn with_property_defaults(mut self, defaults: PropertyFilter) -> Self {
        self.property_defaults = defaults;
        self
    }

    /// Set the delivery policy.
    pub fn with_delivery(mut self, delivery: DeliveryPolicy) -> Self {
        self.delivery = delivery;
        self
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Render the configuration as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
