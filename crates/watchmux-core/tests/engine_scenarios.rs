//! End-to-end scenarios for the engines and the registry.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;
use watchmux_core::host::{DataObject, Document, MutationKind, NodeId, TreeFilter, TreeMutation};
use watchmux_core::{
    Callback, ChangeEngine, DeliveryPolicy, EngineConfig, EngineRegistry, Error, MutationCallback,
    PropertyCallback, PropertyFilter, PropertyKind, PropertyMutation,
};

struct TestContext {
    document: Document,
    registry: EngineRegistry,
    parent: NodeId,
    child: NodeId,
}

impl TestContext {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        let document = Document::new();
        let parent = document.create_element("section");
        let child = document.create_element("p");
        document.append_child(document.root(), parent).unwrap();
        document.append_child(parent, child).unwrap();

        Self {
            registry: EngineRegistry::with_config(&document, config),
            document,
            parent,
            child,
        }
    }
}

fn counting<E: 'static>() -> (Callback<E>, Rc<Cell<usize>>) {
    let hits = Rc::new(Cell::new(0));
    let sink = Rc::clone(&hits);
    (Callback::new(move |_: &E| sink.set(sink.get() + 1)), hits)
}

#[test]
fn test_subtree_scenario() {
    let mut ctx = TestContext::new();
    let engine = ctx.registry.structural();

    let (x, x_hits) = counting::<TreeMutation>();
    let (y, y_hits) = counting::<TreeMutation>();
    engine
        .subscribe(ctx.parent, x, Some(TreeFilter::new().with_subtree().with_attributes()))
        .unwrap();
    engine
        .subscribe(ctx.parent, y, Some(TreeFilter::new().with_attributes()))
        .unwrap();

    ctx.document.set_attribute(ctx.child, "data-state", "open").unwrap();
    ctx.document.checkpoint();
    assert_eq!((x_hits.get(), y_hits.get()), (1, 0));

    ctx.document.set_attribute(ctx.parent, "data-state", "open").unwrap();
    ctx.document.checkpoint();
    assert_eq!((x_hits.get(), y_hits.get()), (2, 1));
}

#[test]
fn test_get_only_object_scenario() {
    let mut ctx = TestContext::new();
    let engine = ctx.registry.property();
    let object = DataObject::from_json(json!({"foo": "bar"})).unwrap();

    let (g, g_hits) = counting::<PropertyMutation>();
    engine.subscribe(&object, g, Some(PropertyFilter::new().with_get()));

    let proxy = engine.observe(&object);
    assert_eq!(proxy.get("foo"), Some(json!("bar")));
    assert_eq!(proxy.delete("foo"), Some(json!("bar")));

    assert_eq!(g_hits.get(), 1);
    assert!(object.is_empty());
}

#[test]
fn test_subscription_count_invariant() {
    let mut ctx = TestContext::new();
    let engine = ctx.registry.structural();
    let callbacks: Vec<MutationCallback> = (0..5).map(|_| counting().0).collect();

    for callback in &callbacks {
        engine.subscribe(ctx.child, callback.clone(), None).unwrap();
    }
    assert_eq!(engine.subscriber_count(ctx.child), 5);

    for callback in &callbacks {
        engine.unsubscribe(ctx.child, callback).unwrap();
    }
    assert!(!engine.has_target(ctx.child));
    assert_eq!(engine.target_count(), 0);
}

#[test]
fn test_each_access_emits_once() {
    let mut ctx = TestContext::new();
    let engine = ctx.registry.property();
    let object = DataObject::new();

    let kinds = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&kinds);
    let callback: PropertyCallback = Callback::new(move |event: &PropertyMutation| {
        sink.borrow_mut().push(event.kind);
    });
    engine.subscribe(&object, callback, None);

    engine.observe(&object).set("n", 1);
    engine.observe(&object).get("n");
    engine.observe(&object).delete("n");

    assert_eq!(
        *kinds.borrow(),
        vec![PropertyKind::Set, PropertyKind::Get, PropertyKind::Del]
    );
}

#[test]
fn test_old_proxy_goes_inert() {
    let mut ctx = TestContext::new();
    let engine = ctx.registry.property();
    let object = DataObject::new();
    let (callback, hits) = counting::<PropertyMutation>();

    engine.subscribe(&object, callback.clone(), None);
    let stale = engine.observe(&object);
    engine.unsubscribe(&object, &callback);
    engine.subscribe(&object, callback, None);

    stale.set("k", "v");
    assert_eq!(hits.get(), 0);
    assert_eq!(stale.get("k"), Some(json!("v")));

    engine.observe(&object).get("k");
    assert_eq!(hits.get(), 1);
}

#[test]
fn test_drain_on_last_unsubscribe() {
    let mut ctx = TestContext::new();
    let engine = ctx.registry.structural();

    let records = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&records);
    let watcher: MutationCallback = Callback::new(move |record: &TreeMutation| {
        sink.borrow_mut().push((record.kind, record.target));
    });
    let (leaving, leaving_hits) = counting::<TreeMutation>();

    engine
        .subscribe(
            ctx.parent,
            watcher,
            Some(TreeFilter::new().with_child_list().with_subtree()),
        )
        .unwrap();
    engine.subscribe(ctx.child, leaving.clone(), None).unwrap();

    let leaf = ctx.document.create_text("hi");
    ctx.document.append_child(ctx.child, leaf).unwrap();
    engine.unsubscribe(ctx.child, &leaving).unwrap();

    assert_eq!(*records.borrow(), vec![(MutationKind::ChildList, ctx.child)]);
    assert_eq!(leaving_hits.get(), 0);
    assert_eq!(ctx.document.checkpoint(), 0);

    let stats = engine.stats();
    assert_eq!(stats.drained, 1);
    assert_eq!(stats.rearms, 1);
}

#[test]
fn test_partial_unsubscribe_keeps_session_wide() {
    let mut ctx = TestContext::new();
    let engine = ctx.registry.structural();
    let (wide, _) = counting::<TreeMutation>();
    let (narrow, _) = counting::<TreeMutation>();

    engine
        .subscribe(
            ctx.parent,
            wide.clone(),
            Some(TreeFilter::new().with_character_data().with_subtree()),
        )
        .unwrap();
    engine.subscribe(ctx.parent, narrow, None).unwrap();
    assert!(engine.armed_filter(ctx.parent).unwrap().subtree);

    engine.unsubscribe(ctx.parent, &wide).unwrap();
    assert!(engine.armed_filter(ctx.parent).unwrap().subtree);

    engine.clear();
    engine.disconnect();
    engine.reconnect().unwrap();
    assert_eq!(engine.armed_filter(ctx.parent), None);
}

#[test]
fn test_isolate_keeps_delivering_after_panic() {
    let mut ctx = TestContext::new();
    let engine = ctx.registry.structural();
    let (after, after_hits) = counting::<TreeMutation>();

    engine
        .subscribe(ctx.parent, Callback::new(|_| panic!("subscriber failed")), None)
        .unwrap();
    engine.subscribe(ctx.parent, after, None).unwrap();

    ctx.document.set_attribute(ctx.parent, "x", "1").unwrap();
    ctx.document.checkpoint();

    assert_eq!(after_hits.get(), 1);
    assert_eq!(engine.stats().failures, 1);
}

#[test]
fn test_propagate_surfaces_panic() {
    let mut ctx =
        TestContext::with_config(EngineConfig::new().with_delivery(DeliveryPolicy::Propagate));
    let engine = ctx.registry.property();
    let object = DataObject::new();
    engine.subscribe(&object, Callback::new(|_| panic!("subscriber failed")), None);
    let proxy = engine.observe(&object);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| proxy.set("a", 1)));
    assert!(outcome.is_err());
    assert!(!object.contains_key("a"));
}

#[test]
fn test_registry_lifecycle() {
    let mut ctx = TestContext::new();

    let first = ctx.registry.get("mutation").unwrap();
    assert!(first.ptr_eq(&ctx.registry.get("mutation").unwrap()));
    assert!(matches!(ctx.registry.get("geometry"), Err(Error::UnsupportedKind(_))));

    let structural = first.as_structural().unwrap().clone();
    let (callback, hits) = counting::<TreeMutation>();
    structural.subscribe(ctx.parent, callback, None).unwrap();

    ctx.registry.disconnect("mutation");
    ctx.document.set_attribute(ctx.parent, "x", "1").unwrap();
    ctx.document.checkpoint();
    assert_eq!(hits.get(), 0);

    ctx.registry.clear();
    assert!(ctx.registry.list().is_empty());
    assert_eq!(structural.target_count(), 0);
    assert!(!ctx.registry.get("mutation").unwrap().ptr_eq(&first));
}

fn subscribe_generic<C: ChangeEngine>(
    engine: &C,
    target: &C::Target,
    callbacks: &[Callback<C::Event>],
) -> usize {
    for callback in callbacks {
        engine.subscribe(target, callback.clone(), None).unwrap();
    }
    engine.subscriber_count(target)
}

#[test]
fn test_engines_share_contract() {
    let mut ctx = TestContext::new();
    let structural = ctx.registry.structural();
    let property = ctx.registry.property();
    let object = DataObject::new();

    let tree_callbacks: Vec<MutationCallback> = (0..3).map(|_| counting().0).collect();
    let object_callbacks: Vec<PropertyCallback> = (0..2).map(|_| counting().0).collect();

    assert_eq!(subscribe_generic(&structural, &ctx.child, &tree_callbacks), 3);
    assert_eq!(subscribe_generic(&property, &object, &object_callbacks), 2);
    assert_eq!(structural.kind().as_str(), "mutation");
    assert_eq!(property.kind().as_str(), "object");
}
