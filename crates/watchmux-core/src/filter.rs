//! Filter options and their merge.
//!
//! Every subscriber carries its own options. The engines fold them, together
//! with the engine defaults, into one combined configuration per target by
//! OR-ing each flag. The result is always a superset of every input.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use watchmux_host::{MutationKind, TreeFilter};

/// Per-subscriber options that can be merged and matched against event kinds.
pub trait FilterOptions: Copy + PartialEq + fmt::Debug + BitOr<Output = Self> {
    /// The event kind these options select on.
    type Kind: Copy;

    /// Whether events of `kind` are wanted.
    fn wants(&self, kind: Self::Kind) -> bool;

    /// Whether every flag set in `other` is also set in `self`.
    fn covers(&self, other: &Self) -> bool;

    /// OR `defaults` with every option set in `options`.
    fn combine<'a, I>(defaults: Self, options: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
        Self: 'a,
    {
        options.into_iter().fold(defaults, |acc, opts| acc | *opts)
    }
}

impl FilterOptions for TreeFilter {
    type Kind = MutationKind;

    fn wants(&self, kind: MutationKind) -> bool {
        TreeFilter::wants(self, kind)
    }

    fn covers(&self, other: &Self) -> bool {
        TreeFilter::covers(self, other)
    }
}

/// Structural engine defaults: attribute and child-list changes on the target
/// itself.
pub const DEFAULT_STRUCTURAL_FILTER: TreeFilter = TreeFilter {
    child_list: true,
    attributes: true,
    ..TreeFilter::NONE
};

/// Property engine defaults: every access kind.
pub const DEFAULT_PROPERTY_FILTER: PropertyFilter = PropertyFilter::ALL;

/// Kind of a synthesized property access event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// A property read.
    Get,
    /// A property write.
    Set,
    /// A property delete.
    Del,
}

impl PropertyKind {
    /// The event type name (`get`, `set`, `del`).
    pub const fn as_str(self) -> &'static str {
        match self {
            PropertyKind::Get => "get",
            PropertyKind::Set => "set",
            PropertyKind::Del => "del",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which property accesses a subscriber wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyFilter {
    /// Reads.
    pub get: bool,
    /// Writes.
    pub set: bool,
    /// Deletes.
    pub del: bool,
}

impl PropertyFilter {
    /// Every access kind.
    pub const ALL: Self = Self {
        get: true,
        set: true,
        del: true,
    };

    /// No access kind.
    pub const NONE: Self = Self {
        get: false,
        set: false,
        del: false,
    };

    /// Create an empty filter.
    pub fn new() -> Self {
        Self::NONE
    }

    /// Want reads.
    pub fn with_get(mut self) -> Self {
        self.get = true;
        self
    }

    /// Want writes.
    pub fn with_set(mut self) -> Self {
        self.set = true;
        self
    }

    /// Want deletes.
    pub fn with_del(mut self) -> Self {
        self.del = true;
        self
    }
}

impl FilterOptions for PropertyFilter {
    type Kind = PropertyKind;

    fn wants(&self, kind: PropertyKind) -> bool {
        match kind {
            PropertyKind::Get => self.get,
            PropertyKind::Set => self.set,
            PropertyKind::Del => self.del,
        }
    }

    fn covers(&self, other: &Self) -> bool {
        (!other.get || self.get) && (!other.set || self.set) && (!other.del || self.del)
    }
}

impl BitOr for PropertyFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            get: self.get || rhs.get,
            set: self.set || rhs.set,
            del: self.del || rhs.del,
        }
    }
}

impl BitOrAssign for PropertyFilter {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}
