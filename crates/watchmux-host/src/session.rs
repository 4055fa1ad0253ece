//! Observation sessions.
//!
//! A session is the single-listener primitive the structural engine drives.
//! It holds one registration per observed node; arming a node that is already
//! registered replaces that registration's filter. There is no way to narrow a
//! session other than disarming everything and arming again.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{HostError, HostResult};
use crate::filter::TreeFilter;
use crate::mutation::TreeMutation;
use crate::tree::{Document, NodeId};

/// The structural observation capability.
pub trait ObservationSession {
    /// Begin observing `target` with `config`, replacing any configuration
    /// previously armed for the same node.
    fn arm(&mut self, target: NodeId, config: TreeFilter) -> HostResult<()>;

    /// Stop observing every node and discard queued records.
    fn disarm(&mut self);

    /// Return and clear the records queued but not yet delivered.
    fn drain(&mut self) -> Vec<TreeMutation>;

    /// The configuration currently armed for `target`.
    fn armed(&self, target: NodeId) -> Option<TreeFilter>;
}

/// Callback receiving a session's batch of records.
pub(crate) type DeliverFn = Rc<dyn Fn(Vec<TreeMutation>)>;

pub(crate) struct SessionState {
    registrations: Vec<(NodeId, TreeFilter)>,
    queue: Vec<TreeMutation>,
    deliver: DeliverFn,
}

impl SessionState {
    pub(crate) fn new(deliver: DeliverFn) -> Self {
        Self {
            registrations: Vec::new(),
            queue: Vec::new(),
            deliver,
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue `mutation` once if any registration covers it.
    ///
    /// The previous value is kept only when a covering registration asked for
    /// it.
    pub(crate) fn offer(&mut self, document: &Document, mutation: &TreeMutation) {
        let mut matched = false;
        let mut keep_old_value = false;

        for (target, filter) in &self.registrations {
            let in_scope = *target == mutation.target
                || (filter.subtree && document.is_descendant(*target, mutation.target));
            if !in_scope || !filter.wants(mutation.kind) {
                continue;
            }
            matched = true;
            keep_old_value |= filter.wants_old_value(mutation.kind);
        }

        if !matched {
            return;
        }

        let mut record = mutation.clone();
        if !keep_old_value {
            record.old_value = None;
        }
        self.queue.push(record);
    }

    pub(crate) fn take_for_delivery(&mut self) -> Option<(Vec<TreeMutation>, DeliverFn)> {
        if self.queue.is_empty() {
            return None;
        }
        Some((std::mem::take(&mut self.queue), Rc::clone(&self.deliver)))
    }
}

/// An observation session bound to a [`Document`].
///
/// Created with [`Document::open_session`]. Dropping the session unregisters
/// it from the document.
pub struct DocumentSession {
    document: Document,
    state: Rc<RefCell<SessionState>>,
}

impl fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("DocumentSession")
            .field("registrations", &state.registrations)
            .field("pending", &state.queue.len())
            .finish()
    }
}

impl DocumentSession {
    pub(crate) fn new(document: Document, state: Rc<RefCell<SessionState>>) -> Self {
        Self { document, state }
    }

    /// The observed document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Every armed registration, in arming order.
    pub fn registrations(&self) -> Vec<(NodeId, TreeFilter)> {
        self.state.borrow().registrations.clone()
    }

    /// Number of queued records.
    pub fn pending(&self) -> usize {
        self.state.borrow().pending()
    }
}

impl ObservationSession for DocumentSession {
    fn arm(&mut self, target: NodeId, config: TreeFilter) -> HostResult<()> {
        if !self.document.has_node(target) {
            return Err(HostError::UnknownNode(target));
        }
        let config = config.normalized()?;

        let mut state = self.state.borrow_mut();
        match state.registrations.iter_mut().find(|(t, _)| *t == target) {
            Some((_, existing)) => *existing = config,
            None => state.registrations.push((target, config)),
        }
        Ok(())
    }

    fn disarm(&mut self) {
        let mut state = self.state.borrow_mut();
        state.registrations.clear();
        state.queue.clear();
    }

    fn drain(&mut self) -> Vec<TreeMutation> {
        std::mem::take(&mut self.state.borrow_mut().queue)
    }

    fn armed(&self, target: NodeId) -> Option<TreeFilter> {
        self.state
            .borrow()
            .registrations
            .iter()
            .find(|(t, _)| *t == target)
            .map(|(_, config)| *config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::MutationKind;

    fn collecting_session(doc: &Document) -> (DocumentSession, Rc<RefCell<Vec<TreeMutation>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let session = doc.open_session(move |records| sink.borrow_mut().extend(records));
        (session, seen)
    }

    #[test]
    fn test_arm_replaces_registration() {
        let doc = Document::new();
        let (mut session, _) = collecting_session(&doc);
        let root = doc.root();

        session.arm(root, TreeFilter::new().with_attributes()).unwrap();
        session.arm(root, TreeFilter::new().with_child_list()).unwrap();

        assert_eq!(session.registrations().len(), 1);
        assert_eq!(session.armed(root), Some(TreeFilter::new().with_child_list()));
    }

    #[test]
    fn test_arm_rejects_unknown_node_and_empty_filter() {
        let doc = Document::new();
        let (mut session, _) = collecting_session(&doc);

        let ghost = NodeId::from_raw(42);
        assert_eq!(
            session.arm(ghost, TreeFilter::new().with_attributes()),
            Err(HostError::UnknownNode(ghost))
        );
        assert_eq!(
            session.arm(doc.root(), TreeFilter::new()),
            Err(HostError::EmptyObserverInit)
        );
        assert!(session.registrations().is_empty());
    }

    #[test]
    fn test_subtree_scope() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        let child = doc.create_element("span");
        doc.append_child(parent, child).unwrap();

        let (mut session, seen) = collecting_session(&doc);
        session.arm(parent, TreeFilter::new().with_attributes()).unwrap();

        doc.set_attribute(child, "id", "a").unwrap();
        assert_eq!(session.pending(), 0);

        session
            .arm(parent, TreeFilter::new().with_attributes().with_subtree())
            .unwrap();
        doc.set_attribute(child, "id", "b").unwrap();
        assert_eq!(session.pending(), 1);

        doc.checkpoint();
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].target, child);
    }

    #[test]
    fn test_overlapping_registrations_queue_one_record() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        let child = doc.create_element("span");
        doc.append_child(parent, child).unwrap();

        let (mut session, _) = collecting_session(&doc);
        session
            .arm(parent, TreeFilter::new().with_attributes().with_subtree())
            .unwrap();
        session.arm(child, TreeFilter::new().with_attributes()).unwrap();

        doc.set_attribute(child, "class", "x").unwrap();
        assert_eq!(session.pending(), 1);
    }

    #[test]
    fn test_old_value_only_when_requested() {
        let doc = Document::new();
        let el = doc.create_element("p");
        doc.set_attribute(el, "class", "before").unwrap();

        let (mut session, _) = collecting_session(&doc);
        session.arm(el, TreeFilter::new().with_attributes()).unwrap();
        doc.set_attribute(el, "class", "after").unwrap();

        let records = session.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, MutationKind::Attributes);
        assert_eq!(records[0].old_value, None);

        session.arm(el, TreeFilter::new().with_attribute_old_value()).unwrap();
        doc.set_attribute(el, "class", "again").unwrap();

        let records = session.drain();
        assert_eq!(records[0].old_value.as_deref(), Some("after"));
    }

    #[test]
    fn test_disarm_drops_queue_and_registrations() {
        let doc = Document::new();
        let (mut session, seen) = collecting_session(&doc);
        session.arm(doc.root(), TreeFilter::new().with_attributes()).unwrap();

        doc.set_attribute(doc.root(), "lang", "en").unwrap();
        session.disarm();
        session.disarm();

        assert_eq!(doc.checkpoint(), 0);
        assert!(seen.borrow().is_empty());
        assert_eq!(session.armed(doc.root()), None);
    }

    #[test]
    fn test_dropped_session_is_pruned() {
        let doc = Document::new();
        {
            let (mut session, _) = collecting_session(&doc);
            session.arm(doc.root(), TreeFilter::new().with_attributes()).unwrap();
        }
        doc.set_attribute(doc.root(), "lang", "en").unwrap();
        assert_eq!(doc.pending_records(), 0);
    }

    #[test]
    fn test_checkpoint_runs_until_quiet() {
        let doc = Document::new();
        let el = doc.create_element("p");
        doc.append_child(doc.root(), el).unwrap();

        let rounds = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&rounds);
        let mutator = doc.clone();
        let mut session = doc.open_session(move |records| {
            *counter.borrow_mut() += 1;
            if records.iter().any(|r| r.attribute_name.as_deref() == Some("first")) {
                mutator.set_attribute(el, "second", "1").unwrap();
            }
        });
        session.arm(el, TreeFilter::new().with_attributes()).unwrap();

        doc.set_attribute(el, "first", "1").unwrap();
        assert_eq!(doc.checkpoint(), 2);
        assert_eq!(*rounds.borrow(), 2);
    }
}
