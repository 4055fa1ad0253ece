//! Engine registry.
//!
//! Builds at most one engine per [`EngineKind`] on demand and hands out
//! handles to it until [`EngineRegistry::clear`] tears everything down.

use std::collections::BTreeMap;

use watchmux_host::Document;

use crate::config::EngineConfig;
use crate::engine::EngineKind;
use crate::error::Result;
use crate::property::PropertyEngine;
use crate::structural::StructuralEngine;

/// A handle to a registry-managed engine.
#[derive(Debug, Clone)]
pub enum EngineHandle {
    /// The structural mutation engine.
    Structural(StructuralEngine),
    /// The property mutation engine.
    Property(PropertyEngine),
}

impl EngineHandle {
    /// The engine kind.
    pub fn kind(&self) -> EngineKind {
        match self {
            EngineHandle::Structural(_) => EngineKind::Mutation,
            EngineHandle::Property(_) => EngineKind::Object,
        }
    }

    /// The structural engine, if this is one.
    pub fn as_structural(&self) -> Option<&StructuralEngine> {
        match self {
            EngineHandle::Structural(engine) => Some(engine),
            EngineHandle::Property(_) => None,
        }
    }

    /// The property engine, if this is one.
    pub fn as_property(&self) -> Option<&PropertyEngine> {
        match self {
            EngineHandle::Property(engine) => Some(engine),
            EngineHandle::Structural(_) => None,
        }
    }

    /// Whether both handles refer to the same engine.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EngineHandle::Structural(a), EngineHandle::Structural(b)) => a.ptr_eq(b),
            (EngineHandle::Property(a), EngineHandle::Property(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Stop the engine's underlying observation.
    pub fn disconnect(&self) {
        match self {
            EngineHandle::Structural(engine) => engine.disconnect(),
            EngineHandle::Property(engine) => engine.disconnect(),
        }
    }

    /// Forget every subscription of the engine.
    pub fn clear(&self) {
        match self {
            EngineHandle::Structural(engine) => engine.clear(),
            EngineHandle::Property(engine) => engine.clear(),
        }
    }

    /// Number of targets with subscribers.
    pub fn target_count(&self) -> usize {
        match self {
            EngineHandle::Structural(engine) => engine.target_count(),
            EngineHandle::Property(engine) => engine.target_count(),
        }
    }
}

/// Lazily built, memoized engines.
#[derive(Debug)]
pub struct EngineRegistry {
    document: Document,
    config: EngineConfig,
    structural: Option<StructuralEngine>,
    property: Option<PropertyEngine>,
}

impl EngineRegistry {
    /// Create a registry whose structural engine observes `document`.
    pub fn new(document: &Document) -> Self {
        Self::with_config(document, EngineConfig::default())
    }

    /// Create a registry building engines with `config`.
    pub fn with_config(document: &Document, config: EngineConfig) -> Self {
        Self {
            document: document.clone(),
            config,
            structural: None,
            property: None,
        }
    }

    /// The engine for the kind named `name`, built on first request.
    ///
    /// Fails with [`Error::UnsupportedKind`](crate::Error::UnsupportedKind)
    /// for an unknown name.
    pub fn get(&mut self, name: &str) -> Result<EngineHandle> {
        Ok(self.get_kind(name.parse()?))
    }

    /// The engine for `kind`, built on first request.
    pub fn get_kind(&mut self, kind: EngineKind) -> EngineHandle {
        match kind {
            EngineKind::Mutation => EngineHandle::Structural(self.structural()),
            EngineKind::Object => EngineHandle::Property(self.property()),
        }
    }

    /// The structural engine, built on first request.
    pub fn structural(&mut self) -> StructuralEngine {
        let (document, config) = (&self.document, self.config);
        self.structural
            .get_or_insert_with(|| {
                tracing::debug!(kind = %EngineKind::Mutation, "engine created");
                StructuralEngine::with_config(document, config)
            })
            .clone()
    }

    /// The property engine, built on first request.
    pub fn property(&mut self) -> PropertyEngine {
        let config = self.config;
        self.property
            .get_or_insert_with(|| {
                tracing::debug!(kind = %EngineKind::Object, "engine created");
                PropertyEngine::with_config(config)
            })
            .clone()
    }

    /// Disconnect the engine named `name` if it has been built. Unknown names
    /// are ignored.
    pub fn disconnect(&self, name: &str) {
        let Ok(kind) = name.parse::<EngineKind>() else {
            return;
        };
        if let Some(engine) = self.peek(kind) {
            engine.disconnect();
        }
    }

    /// Clear and drop every built engine. The next request builds new ones.
    pub fn clear(&mut self) {
        for engine in self.list().into_values() {
            engine.clear();
        }
        self.structural = None;
        self.property = None;
        tracing::debug!("engine registry cleared");
    }

    /// Every built engine by kind.
    pub fn list(&self) -> BTreeMap<EngineKind, EngineHandle> {
        EngineKind::ALL
            .into_iter()
            .filter_map(|kind| self.peek(kind).map(|engine| (kind, engine)))
            .collect()
    }

    /// Whether the engine for `kind` has been built.
    pub fn contains(&self, kind: EngineKind) -> bool {
        self.peek(kind).is_some()
    }

    /// Number of built engines.
    pub fn len(&self) -> usize {
        usize::from(self.structural.is_some()) + usize::from(self.property.is_some())
    }

    /// Whether no engine has been built.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configuration engines are built with.
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// The document the structural engine observes.
    pub fn document(&self) -> &Document {
        &self.document
    }

    fn peek(&self, kind: EngineKind) -> Option<EngineHandle> {
        match kind {
            EngineKind::Mutation => self.structural.clone().map(EngineHandle::Structural),
            EngineKind::Object => self.property.clone().map(EngineHandle::Property),
        }
    }
}
