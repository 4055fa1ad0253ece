//! The property engine: a subscriber table keyed by object identity plus one
//! memoized [`ObjectProxy`] per observed object.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use watchmux_host::{DataObject, ObjectId};

use super::event::PropertyMutation;
use super::proxy::ObjectProxy;
use crate::callback::Callback;
use crate::config::{DeliveryPolicy, EngineConfig};
use crate::dispatch;
use crate::engine::{ChangeEngine, EngineKind};
use crate::error::Result;
use crate::filter::{FilterOptions, PropertyFilter};
use crate::stats::{DispatchStats, StatsSnapshot};
use crate::table::{Removal, SubscriberTable};

const ENGINE: &str = "object";

/// Callback for property subscribers.
pub type PropertyCallback = Callback<PropertyMutation>;

pub(super) struct Shared {
    table: SubscriberTable<ObjectId, PropertyMutation, PropertyFilter>,
    proxies: HashMap<ObjectId, ObjectProxy>,
    config: EngineConfig,
}

/// Multiplexes property interception across many subscribers.
///
/// Cloning the engine creates a new handle to the same engine.
#[derive(Clone)]
pub struct PropertyEngine {
    inner: Rc<RefCell<Shared>>,
    stats: Rc<DispatchStats>,
}

impl Default for PropertyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyEngine {
    /// Create an engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::from_parts(
            Rc::new(RefCell::new(Shared {
                table: SubscriberTable::new(),
                proxies: HashMap::new(),
                config,
            })),
            Rc::new(DispatchStats::new()),
        )
    }

    pub(super) fn from_parts(inner: Rc<RefCell<Shared>>, stats: Rc<DispatchStats>) -> Self {
        Self { inner, stats }
    }

    /// The proxy for `target`, created on first use.
    ///
    /// Repeated calls return the same proxy until the object's last
    /// subscriber leaves.
    pub fn observe(&self, target: &DataObject) -> ObjectProxy {
        let mut inner = self.inner.borrow_mut();
        inner
            .proxies
            .entry(target.id())
            .or_insert_with(|| {
                tracing::debug!(object = %target.id(), "proxy created");
                ObjectProxy::new(
                    target.clone(),
                    Rc::downgrade(&self.inner),
                    Rc::clone(&self.stats),
                )
            })
            .clone()
    }

    /// Whether `target` currently has a proxy.
    pub fn is_observed(&self, target: &DataObject) -> bool {
        self.inner.borrow().proxies.contains_key(&target.id())
    }

    /// Subscribe `callback` to accesses on `target`.
    ///
    /// `None` selects the engine defaults. Subscribing an already subscribed
    /// callback replaces its options.
    pub fn subscribe(
        &self,
        target: &DataObject,
        callback: PropertyCallback,
        options: Option<PropertyFilter>,
    ) {
        let mut inner = self.inner.borrow_mut();
        let options = options.unwrap_or(inner.config.property_defaults);
        inner.table.insert(target.id(), callback, options);
        tracing::debug!(
            object = %target.id(),
            subscribers = inner.table.subscriber_count(&target.id()),
            "subscription added"
        );
    }

    /// Unsubscribe `callback` from `target`.
    ///
    /// Unknown pairs are ignored. Removing the last subscriber discards the
    /// object's proxy.
    pub fn unsubscribe(&self, target: &DataObject, callback: &PropertyCallback) {
        let id = target.id();
        let mut inner = self.inner.borrow_mut();
        match inner.table.remove(&id, callback) {
            Removal::UnknownTarget | Removal::UnknownSubscriber => {}
            Removal::Removed { remaining } => {
                tracing::debug!(object = %id, remaining, "subscription removed");
            }
            Removal::TargetEmptied => {
                if let Some(proxy) = inner.proxies.remove(&id) {
                    proxy.retire();
                }
                tracing::debug!(object = %id, "last subscription removed, proxy discarded");
            }
        }
    }

    /// Dispatch `event` to the subscribers of its target that want its kind.
    pub fn notify(&self, event: &PropertyMutation) {
        self.stats.record_event();
        let (deliveries, policy) = self.deliveries_for(event);
        tracing::trace!(
            kind = %event.kind,
            object = %event.target,
            property = %event.property,
            subscribers = deliveries.len(),
            "dispatching property access"
        );
        for callback in &deliveries {
            dispatch::deliver(ENGINE, callback, event, policy, &self.stats);
        }
    }

    fn deliveries_for(&self, event: &PropertyMutation) -> (Vec<PropertyCallback>, DeliveryPolicy) {
        let inner = self.inner.borrow();
        let deliveries = inner
            .table
            .subscribers(&event.target)
            .into_iter()
            .filter(|(_, options)| options.wants(event.kind))
            .map(|(callback, _)| callback)
            .collect();
        (deliveries, inner.config.delivery)
    }

    /// Nothing to stop: proxies notify for as long as they are subscribed.
    pub fn disconnect(&self) {}

    /// Forget every subscription.
    ///
    /// Memoized proxies are kept and stay active, so handles obtained before
    /// the clear resume notifying once their object is subscribed again. Use
    /// [`release_idle_proxies`](Self::release_idle_proxies) to drop them.
    pub fn clear(&self) {
        self.inner.borrow_mut().table.clear();
        tracing::debug!(engine = ENGINE, "subscriptions cleared");
    }

    /// Retire and forget every proxy whose object has no subscribers.
    ///
    /// Returns the number of proxies released.
    pub fn release_idle_proxies(&self) -> usize {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let table = &inner.table;
        let before = inner.proxies.len();
        inner.proxies.retain(|id, proxy| {
            let idle = !table.contains(id);
            if idle {
                proxy.retire();
            }
            !idle
        });
        let released = before - inner.proxies.len();
        tracing::debug!(engine = ENGINE, released, "idle proxies released");
        released
    }

    /// Number of objects with subscribers.
    pub fn target_count(&self) -> usize {
        self.inner.borrow().table.target_count()
    }

    /// Number of subscribers on `target`.
    pub fn subscriber_count(&self, target: &DataObject) -> usize {
        self.inner.borrow().table.subscriber_count(&target.id())
    }

    /// Whether `target` has subscribers.
    pub fn has_target(&self, target: &DataObject) -> bool {
        self.inner.borrow().table.contains(&target.id())
    }

    /// The defaults OR every subscriber's options for `target`.
    pub fn combined_filter(&self, target: &DataObject) -> Option<PropertyFilter> {
        let inner = self.inner.borrow();
        inner
            .table
            .combined(&target.id(), inner.config.property_defaults)
    }

    /// The engine configuration.
    pub fn config(&self) -> EngineConfig {
        self.inner.borrow().config
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

impl fmt::Debug for PropertyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("PropertyEngine")
            .field("targets", &inner.table.targets())
            .field("proxies", &inner.proxies.len())
            .field("config", &inner.config)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

impl ChangeEngine for PropertyEngine {
    type Target = DataObject;
    type Event = PropertyMutation;
    type Filter = PropertyFilter;

    fn kind(&self) -> EngineKind {
        EngineKind::Object
    }

    fn subscribe(
        &self,
        target: &DataObject,
        callback: PropertyCallback,
        options: Option<PropertyFilter>,
    ) -> Result<()> {
        PropertyEngine::subscribe(self, target, callback, options);
        Ok(())
    }

    fn unsubscribe(&self, target: &DataObject, callback: &PropertyCallback) -> Result<()> {
        PropertyEngine::unsubscribe(self, target, callback);
        Ok(())
    }

    fn notify(&self, events: &[PropertyMutation]) {
        for event in events {
            PropertyEngine::notify(self, event);
        }
    }

    fn disconnect(&self) {
        PropertyEngine::disconnect(self)
    }

    fn clear(&self) {
        PropertyEngine::clear(self)
    }

    fn target_count(&self) -> usize {
        PropertyEngine::target_count(self)
    }

    fn subscriber_count(&self, target: &DataObject) -> usize {
        PropertyEngine::subscriber_count(self, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PropertyKind;
    use serde_json::json;
    use std::cell::Cell;

    fn recorder() -> (PropertyCallback, Rc<RefCell<Vec<PropertyMutation>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (
            Callback::new(move |event: &PropertyMutation| sink.borrow_mut().push(event.clone())),
            seen,
        )
    }

    #[test]
    fn test_default_subscriber_sees_every_kind() {
        let engine = PropertyEngine::new();
        let obj = DataObject::new();
        let (callback, seen) = recorder();
        engine.subscribe(&obj, callback, None);

        let proxy = engine.observe(&obj);
        proxy.set("foo", "bar");
        proxy.get("foo");
        proxy.delete("foo");

        let kinds: Vec<PropertyKind> = seen.borrow().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![PropertyKind::Set, PropertyKind::Get, PropertyKind::Del]);
        assert_eq!(seen.borrow()[0].next(), Some(&json!("bar")));
        assert_eq!(seen.borrow()[2].current(), Some(&json!("bar")));
        assert!(!obj.contains_key("foo"));
    }

    #[test]
    fn test_get_only_subscriber() {
        let engine = PropertyEngine::new();
        let obj = DataObject::new();
        obj.set("foo", 1);
        let (callback, seen) = recorder();
        engine.subscribe(&obj, callback, Some(PropertyFilter::new().with_get()));

        let proxy = engine.observe(&obj);
        assert_eq!(proxy.get("foo"), Some(json!(1)));
        proxy.delete("foo");

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].kind, PropertyKind::Get);
        assert_eq!(seen.borrow()[0].property, "foo");
    }

    #[test]
    fn test_observe_is_idempotent() {
        let engine = PropertyEngine::new();
        let obj = DataObject::new();
        let (callback, seen) = recorder();
        engine.subscribe(&obj, callback, None);

        let first = engine.observe(&obj);
        let second = engine.observe(&obj);
        assert!(first.ptr_eq(&second));

        second.set("a", 1);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_last_unsubscribe_retires_proxy() {
        let engine = PropertyEngine::new();
        let obj = DataObject::new();
        let (callback, seen) = recorder();
        engine.subscribe(&obj, callback.clone(), None);
        let old = engine.observe(&obj);

        engine.unsubscribe(&obj, &callback);
        assert!(!engine.is_observed(&obj));
        assert!(!old.is_active());

        engine.subscribe(&obj, callback, None);
        let fresh = engine.observe(&obj);
        assert!(!fresh.ptr_eq(&old));

        old.set("x", 1);
        assert!(seen.borrow().is_empty());
        assert_eq!(obj.get("x"), Some(json!(1)));

        fresh.get("x");
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_objects_are_dispatched_separately() {
        let engine = PropertyEngine::new();
        let a = DataObject::new();
        let b = DataObject::new();
        let (callback, seen) = recorder();
        engine.subscribe(&a, callback, None);

        engine.observe(&b).set("k", true);
        assert!(seen.borrow().is_empty());

        engine.observe(&a).set("k", true);
        assert_eq!(seen.borrow()[0].target, a.id());
    }

    #[test]
    fn test_clear_keeps_proxies() {
        let engine = PropertyEngine::new();
        let obj = DataObject::new();
        let (callback, seen) = recorder();
        engine.subscribe(&obj, callback, None);
        let proxy = engine.observe(&obj);

        engine.clear();
        proxy.set("a", 1);

        assert!(seen.borrow().is_empty());
        assert!(engine.observe(&obj).ptr_eq(&proxy));
        assert_eq!(engine.target_count(), 0);
    }

    #[test]
    fn test_release_idle_proxies_after_clear() {
        let engine = PropertyEngine::new();
        let idle = DataObject::new();
        let busy = DataObject::new();
        let (callback, seen) = recorder();
        engine.subscribe(&idle, callback.clone(), None);
        engine.subscribe(&busy, callback.clone(), None);
        let stale = engine.observe(&idle);
        let kept = engine.observe(&busy);

        engine.clear();
        engine.subscribe(&busy, callback, None);

        assert_eq!(engine.release_idle_proxies(), 1);
        assert!(!engine.is_observed(&idle));
        assert!(!stale.is_active());
        assert!(engine.observe(&busy).ptr_eq(&kept));

        stale.set("a", 1);
        assert!(seen.borrow().is_empty());
        assert_eq!(engine.release_idle_proxies(), 0);
    }

    #[test]
    fn test_subscriber_count_and_replace() {
        let engine = PropertyEngine::new();
        let obj = DataObject::new();
        let (a, _) = recorder();
        let (b, _) = recorder();

        engine.subscribe(&obj, a.clone(), Some(PropertyFilter::new().with_get()));
        engine.subscribe(&obj, a.clone(), Some(PropertyFilter::new().with_set()));
        engine.subscribe(&obj, b.clone(), Some(PropertyFilter::new().with_del()));
        assert_eq!(engine.subscriber_count(&obj), 2);
        assert_eq!(
            engine.combined_filter(&obj),
            Some(PropertyFilter::ALL)
        );

        engine.unsubscribe(&obj, &a);
        engine.unsubscribe(&obj, &a);
        assert_eq!(engine.subscriber_count(&obj), 1);
        engine.unsubscribe(&obj, &b);
        assert!(!engine.has_target(&obj));
    }

    #[test]
    fn test_callback_may_write_through_proxy() {
        let engine = PropertyEngine::new();
        let obj = DataObject::new();
        let proxy = engine.observe(&obj);
        let writes = Rc::new(Cell::new(0));

        let sink = Rc::clone(&writes);
        let mirror = proxy.clone();
        let callback = Callback::new(move |event: &PropertyMutation| {
            sink.set(sink.get() + 1);
            if event.property == "source" {
                mirror.set("copy", event.next().cloned().unwrap_or_default());
            }
        });
        engine.subscribe(&obj, callback, Some(PropertyFilter::new().with_set()));

        proxy.set("source", 5);
        assert_eq!(writes.get(), 2);
        assert_eq!(obj.get("copy"), Some(json!(5)));
    }

    #[test]
    fn test_isolated_panic_does_not_stop_delivery() {
        let engine = PropertyEngine::new();
        let obj = DataObject::new();
        let (callback, seen) = recorder();
        engine.subscribe(&obj, Callback::new(|_| panic!("subscriber failed")), None);
        engine.subscribe(&obj, callback, None);

        engine.observe(&obj).set("a", 1);

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(obj.get("a"), Some(json!(1)));
        assert_eq!(engine.stats().failures, 1);
        assert_eq!(engine.stats().deliveries, 1);
    }
}
