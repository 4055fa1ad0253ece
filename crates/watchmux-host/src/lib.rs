//! watchmux host capabilities.
//!
//! This crate provides the two single-listener observation primitives that the
//! `watchmux-core` engines multiplex:
//!
//! - [`tree`] - An arena-backed node tree that records structural, attribute
//!   and text mutations into observation sessions
//! - [`session`] - The observation session capability (`arm`, `disarm`,
//!   `drain`) and its document-backed implementation
//! - [`filter`] - Observer configuration accepted by a session
//! - [`mutation`] - Mutation records produced by the tree
//! - [`object`] - Shared, identity-keyed plain data objects
//! - [`intercept`] - A transparent wrapper that runs a hook before every read,
//!   write and delete on a data object
//! - [`error`] - Host error types
//!
//! # Delivery
//!
//! Mutations are queued on every session whose registrations cover them, as
//! they happen. Queued records are handed to each session's delivery callback
//! in one batch when [`Document::checkpoint`] runs, which plays the role of a
//! microtask checkpoint in a browser event loop.

pub mod error;
pub mod filter;
pub mod intercept;
pub mod mutation;
pub mod object;
pub mod session;
pub mod tree;

pub use error::{HostError, HostResult};
pub use filter::TreeFilter;
pub use intercept::{Access, Intercepted, Interceptor};
pub use mutation::{MutationKind, TreeMutation};
pub use object::{DataObject, ObjectId};
pub use session::{DocumentSession, ObservationSession};
pub use tree::{Document, NodeId, NodeKind};
