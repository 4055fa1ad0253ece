//! Structural mutation engine.
//!
//! One [`ObservationSession`] serves every subscriber of the engine. Each
//! subscribe widens the session's registration for its target to the
//! target's combined options. When a target loses its last subscriber the
//! session is drained, disarmed and armed again for the remaining targets,
//! which is the only way to narrow what it watches.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use watchmux_host::{Document, HostError, NodeId, ObservationSession, TreeFilter, TreeMutation};

use crate::callback::Callback;
use crate::config::{DeliveryPolicy, EngineConfig};
use crate::dispatch;
use crate::engine::{ChangeEngine, EngineKind};
use crate::error::Result;
use crate::filter::FilterOptions;
use crate::stats::{DispatchStats, StatsSnapshot};
use crate::table::{Removal, SubscriberTable};

const ENGINE: &str = "mutation";

/// Callback for structural subscribers.
pub type MutationCallback = Callback<TreeMutation>;

struct Inner {
    document: Document,
    session: Box<dyn ObservationSession>,
    table: SubscriberTable<NodeId, TreeMutation, TreeFilter>,
    config: EngineConfig,
}

/// Multiplexes tree observation across many subscribers.
///
/// Cloning the engine creates a new handle to the same engine.
#[derive(Clone)]
pub struct StructuralEngine {
    inner: Rc<RefCell<Inner>>,
    stats: Rc<DispatchStats>,
}

impl StructuralEngine {
    /// Create an engine observing `document` with the default configuration.
    pub fn new(document: &Document) -> Self {
        Self::with_config(document, EngineConfig::default())
    }

    /// Create an engine observing `document`.
    ///
    /// The engine opens its own session on the document and is notified at
    /// every [`Document::checkpoint`].
    pub fn with_config(document: &Document, config: EngineConfig) -> Self {
        let stats = Rc::new(DispatchStats::new());
        let inner = Rc::new_cyclic(|weak: &Weak<RefCell<Inner>>| {
            let weak = weak.clone();
            let session_stats = Rc::clone(&stats);
            let session = document.open_session(move |records| {
                if let Some(inner) = weak.upgrade() {
                    let engine = StructuralEngine {
                        inner,
                        stats: Rc::clone(&session_stats),
                    };
                    engine.notify(&records);
                }
            });
            RefCell::new(Inner {
                document: document.clone(),
                session: Box::new(session),
                table: SubscriberTable::new(),
                config,
            })
        });
        Self { inner, stats }
    }

    /// Create an engine driving a caller-supplied session.
    ///
    /// Records captured by `session` reach subscribers only through
    /// [`notify`](Self::notify) or [`flush`](Self::flush).
    pub fn with_session(
        document: &Document,
        session: impl ObservationSession + 'static,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                document: document.clone(),
                session: Box::new(session),
                table: SubscriberTable::new(),
                config,
            })),
            stats: Rc::new(DispatchStats::new()),
        }
    }

    /// Subscribe `callback` to mutations of `target`.
    ///
    /// `None` selects the engine defaults. Old-value flags imply their
    /// mutation kind. Subscribing an already subscribed callback replaces its
    /// options. Options that, together with the defaults, watch no mutation
    /// kind are rejected with `EmptyObserverInit`. On error the table keeps
    /// its previous state.
    pub fn subscribe(
        &self,
        target: NodeId,
        callback: MutationCallback,
        options: Option<TreeFilter>,
    ) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if !inner.document.has_node(target) {
            return Err(HostError::UnknownNode(target).into());
        }

        let defaults = inner.config.structural_defaults;
        let options = options.unwrap_or(defaults).with_implied_kinds();
        if let Err(err) = (defaults | options).normalized() {
            tracing::debug!(node = %target, error = %err, "subscription rejected");
            return Err(err.into());
        }
        let insertion = inner.table.insert(target, callback.clone(), options);

        let combined = inner
            .table
            .combined(&target, defaults)
            .unwrap_or(defaults);
        let armed = match inner.session.armed(target) {
            Some(current) => combined | current,
            None => combined,
        };
        if let Err(err) = inner.session.arm(target, armed) {
            inner.table.undo(&target, &callback, insertion);
            tracing::debug!(node = %target, error = %err, "subscription rejected");
            return Err(err.into());
        }

        tracing::debug!(
            node = %target,
            subscribers = inner.table.subscriber_count(&target),
            "subscription added"
        );
        Ok(())
    }

    /// Unsubscribe `callback` from `target`.
    ///
    /// Unknown targets and callbacks are ignored. Removing a target's last
    /// subscriber drains the session, delivers what was queued to the
    /// remaining targets, then rearms the session from the table.
    pub fn unsubscribe(&self, target: NodeId, callback: &MutationCallback) -> Result<()> {
        let removal = self.inner.borrow_mut().table.remove(&target, callback);
        match removal {
            Removal::UnknownTarget | Removal::UnknownSubscriber => Ok(()),
            Removal::Removed { remaining } => {
                tracing::debug!(node = %target, remaining, "subscription removed");
                Ok(())
            }
            Removal::TargetEmptied => {
                tracing::debug!(node = %target, "last subscription removed, rearming session");
                self.flush();
                self.disconnect();
                let rearmed = self.reconnect();
                self.stats.record_rearm();
                rearmed
            }
        }
    }

    /// Dispatch `records` to the relevant subscribers.
    ///
    /// A target is relevant to a record whose subject is the target or one of
    /// its descendants. Within a relevant target, a subscriber is invoked when
    /// its options want the record kind, and either the subject is the target
    /// itself or the subscriber asked for the subtree.
    pub fn notify(&self, records: &[TreeMutation]) {
        for record in records {
            self.stats.record_event();
            let (deliveries, policy) = self.deliveries_for(record);
            tracing::trace!(
                kind = %record.kind,
                subject = %record.target,
                subscribers = deliveries.len(),
                "dispatching mutation record"
            );
            for callback in &deliveries {
                dispatch::deliver(ENGINE, callback, record, policy, &self.stats);
            }
        }
    }

    fn deliveries_for(&self, record: &TreeMutation) -> (Vec<MutationCallback>, DeliveryPolicy) {
        let inner = self.inner.borrow();
        let subject = record.target;
        let mut deliveries = Vec::new();

        for (&target, subscribers) in inner.table.iter() {
            let is_target = subject == target;
            let in_subtree = !is_target && inner.document.is_descendant(target, subject);
            if !is_target && !in_subtree {
                continue;
            }
            deliveries.extend(
                subscribers
                    .iter()
                    .filter(|(_, options)| {
                        options.wants(record.kind) && (is_target || options.subtree)
                    })
                    .map(|(callback, _)| callback.clone()),
            );
        }

        (deliveries, inner.config.delivery)
    }

    /// Take the session's queued records and dispatch them now.
    ///
    /// Returns the number of records drained.
    pub fn flush(&self) -> usize {
        let records = self.inner.borrow_mut().session.drain();
        if records.is_empty() {
            return 0;
        }
        self.stats.record_drained(records.len());
        tracing::debug!(records = records.len(), "delivering drained records");
        self.notify(&records);
        records.len()
    }

    /// Stop observing. Queued records are discarded. Repeated calls are
    /// harmless.
    pub fn disconnect(&self) {
        self.inner.borrow_mut().session.disarm();
        tracing::debug!(engine = ENGINE, "session disarmed");
    }

    /// Arm the session for every target with its combined options.
    ///
    /// A target the session rejects does not stop the others from being
    /// armed; the first rejection is returned once every target was tried.
    pub fn reconnect(&self) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let defaults = inner.config.structural_defaults;
        let mut first_error = None;

        for (&target, subscribers) in inner.table.iter() {
            let combined =
                TreeFilter::combine(defaults, subscribers.iter().map(|(_, options)| options));
            if let Err(err) = inner.session.arm(target, combined) {
                tracing::warn!(node = %target, error = %err, "failed to rearm target");
                first_error.get_or_insert(err);
            }
        }

        tracing::debug!(targets = inner.table.target_count(), "session armed");
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Forget every subscription without touching the session.
    pub fn clear(&self) {
        self.inner.borrow_mut().table.clear();
        tracing::debug!(engine = ENGINE, "subscriptions cleared");
    }

    /// Number of targets with subscribers.
    pub fn target_count(&self) -> usize {
        self.inner.borrow().table.target_count()
    }

    /// Number of subscribers on `target`.
    pub fn subscriber_count(&self, target: NodeId) -> usize {
        self.inner.borrow().table.subscriber_count(&target)
    }

    /// Whether `target` has subscribers.
    pub fn has_target(&self, target: NodeId) -> bool {
        self.inner.borrow().table.contains(&target)
    }

    /// Targets with subscribers, in subscription order.
    pub fn targets(&self) -> Vec<NodeId> {
        self.inner.borrow().table.targets()
    }

    /// The defaults OR every subscriber's options for `target`.
    pub fn combined_filter(&self, target: NodeId) -> Option<TreeFilter> {
        let inner = self.inner.borrow();
        inner
            .table
            .combined(&target, inner.config.structural_defaults)
    }

    /// What the session currently watches on `target`.
    pub fn armed_filter(&self, target: NodeId) -> Option<TreeFilter> {
        self.inner.borrow().session.armed(target)
    }

    /// The engine configuration.
    pub fn config(&self) -> EngineConfig {
        self.inner.borrow().config
    }

    /// The observed document.
    pub fn document(&self) -> Document {
        self.inner.borrow().document.clone()
    }

    /// Dispatch counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether both handles refer to the same engine.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for StructuralEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("StructuralEngine")
            .field("targets", &inner.table.targets())
            .field("config", &inner.config)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

impl ChangeEngine for StructuralEngine {
    type Target = NodeId;
    type Event = TreeMutation;
    type Filter = TreeFilter;

    fn kind(&self) -> EngineKind {
        EngineKind::Mutation
    }

    fn subscribe(
        &self,
        target: &NodeId,
        callback: MutationCallback,
        options: Option<TreeFilter>,
    ) -> Result<()> {
        StructuralEngine::subscribe(self, *target, callback, options)
    }

    fn unsubscribe(&self, target: &NodeId, callback: &MutationCallback) -> Result<()> {
        StructuralEngine::unsubscribe(self, *target, callback)
    }

    fn notify(&self, events: &[TreeMutation]) {
        StructuralEngine::notify(self, events)
    }

    fn disconnect(&self) {
        StructuralEngine::disconnect(self)
    }

    fn clear(&self) {
        StructuralEngine::clear(self)
    }

    fn target_count(&self) -> usize {
        StructuralEngine::target_count(self)
    }

    fn subscriber_count(&self, target: &NodeId) -> usize {
        StructuralEngine::subscriber_count(self, *target)
    }
}
