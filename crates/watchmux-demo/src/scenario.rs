//! Scripted subscription scenarios.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use serde_json::json;
use watchmux_core::host::{DataObject, Document, TreeFilter, TreeMutation};
use watchmux_core::{
    Callback, EngineConfig, EngineRegistry, PropertyFilter, PropertyMutation, Result,
    StatsSnapshot,
};

use crate::config::ScenarioChoice;

/// What a scenario observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: &'static str,
    /// One line per callback invocation, in delivery order.
    pub deliveries: Vec<String>,
    /// Dispatch counters of the engine the scenario used.
    pub stats: StatsSnapshot,
}

type Log = Rc<RefCell<Vec<String>>>;

fn tree_logger(log: &Log, subscriber: &'static str) -> Callback<TreeMutation> {
    let log = Rc::clone(log);
    Callback::new(move |record: &TreeMutation| {
        log.borrow_mut()
            .push(format!("{subscriber}: {} on {}", record.kind, record.target));
    })
}

fn property_logger(log: &Log, subscriber: &'static str) -> Callback<PropertyMutation> {
    let log = Rc::clone(log);
    Callback::new(move |event: &PropertyMutation| {
        log.borrow_mut()
            .push(format!("{subscriber}: {} {}", event.kind, event.property));
    })
}

fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

type ScenarioFn = fn(EngineConfig) -> Result<ScenarioReport>;

fn selected(choice: ScenarioChoice) -> Vec<(ScenarioChoice, ScenarioFn)> {
    let every: [(ScenarioChoice, ScenarioFn); 3] = [
        (ScenarioChoice::Subtree, subtree),
        (ScenarioChoice::Object, object),
        (ScenarioChoice::Drain, drain),
    ];
    every
        .into_iter()
        .filter(|(scenario, _)| choice == ScenarioChoice::All || choice == *scenario)
        .collect()
}

/// Run the chosen scenarios, each against a fresh document and registry.
pub fn run(choice: ScenarioChoice, config: EngineConfig) -> Result<Vec<ScenarioReport>> {
    selected(choice)
        .into_iter()
        .map(|(scenario, scenario_fn)| {
            tracing::info!(scenario = ?scenario, "running scenario");
            scenario_fn(config)
        })
        .collect()
}

/// Two subscribers on a parent: one with subtree, one without. An attribute
/// change on the child reaches only the first; one on the parent reaches
/// both.
fn subtree(config: EngineConfig) -> Result<ScenarioReport> {
    let document = Document::new();
    let parent = document.create_element("section");
    let child = document.create_element("p");
    document.append_child(document.root(), parent)?;
    document.append_child(parent, child)?;

    let mut registry = EngineRegistry::with_config(&document, config);
    let engine = registry.structural();
    let log = Log::default();

    engine.subscribe(
        parent,
        tree_logger(&log, "x"),
        Some(TreeFilter::new().with_subtree().with_attributes()),
    )?;
    engine.subscribe(
        parent,
        tree_logger(&log, "y"),
        Some(TreeFilter::new().with_attributes()),
    )?;

    document.set_attribute(child, "data-state", "open")?;
    document.checkpoint();
    document.set_attribute(parent, "data-state", "open")?;
    document.checkpoint();

    Ok(ScenarioReport {
        name: "subtree",
        deliveries: take(&log),
        stats: engine.stats(),
    })
}

/// A get-only subscriber on an object sees the read but not the delete.
fn object(config: EngineConfig) -> Result<ScenarioReport> {
    let document = Document::new();
    let mut registry = EngineRegistry::with_config(&document, config);
    let engine = registry.property();
    let target = DataObject::from_json(json!({"foo": "bar"}))?;
    let log = Log::default();

    engine.subscribe(
        &target,
        property_logger(&log, "g"),
        Some(PropertyFilter::new().with_get()),
    );
    let proxy = engine.observe(&target);
    proxy.get("foo");
    proxy.delete("foo");

    Ok(ScenarioReport {
        name: "object",
        deliveries: take(&log),
        stats: engine.stats(),
    })
}

/// A record queued for a child is delivered to the parent's subtree
/// subscriber when the child's only subscriber leaves before the checkpoint.
fn drain(config: EngineConfig) -> Result<ScenarioReport> {
    let document = Document::new();
    let parent = document.create_element("ul");
    let child = document.create_element("li");
    document.append_child(document.root(), parent)?;
    document.append_child(parent, child)?;

    let mut registry = EngineRegistry::with_config(&document, config);
    let engine = registry.structural();
    let log = Log::default();
    let leaving = tree_logger(&log, "leaving");

    engine.subscribe(
        parent,
        tree_logger(&log, "watcher"),
        Some(TreeFilter::new().with_attributes().with_subtree()),
    )?;
    engine.subscribe(child, leaving.clone(), None)?;

    document.set_attribute(child, "aria-selected", "true")?;
    engine.unsubscribe(child, &leaving)?;
    document.checkpoint();

    Ok(ScenarioReport {
        name: "drain",
        deliveries: take(&log),
        stats: engine.stats(),
    })
}
