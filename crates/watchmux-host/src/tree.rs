//! Arena-backed node tree.
//!
//! A [`Document`] owns every node it creates. Nodes are never freed; removing
//! a node from its parent only detaches it, so a [`NodeId`] stays valid for
//! the lifetime of the document.
//!
//! Every structural, attribute and text change is offered to the document's
//! observation sessions as it happens. Sessions keep the records they are
//! interested in until [`Document::checkpoint`] delivers them.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};
use crate::mutation::TreeMutation;
use crate::session::{DocumentSession, SessionState};

/// Identifier of a node within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Wrap a raw arena index.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw arena index.
    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a name and attributes.
    Element {
        name: String,
        attributes: BTreeMap<String, String>,
    },
    /// A text node.
    Text { data: String },
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Tree {
    nodes: Vec<NodeData>,
    sessions: Vec<Weak<RefCell<SessionState>>>,
}

impl Tree {
    fn node(&self, id: NodeId) -> HostResult<&NodeData> {
        self.nodes.get(id.index()).ok_or(HostError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> HostResult<&mut NodeData> {
        self.nodes
            .get_mut(id.index())
            .ok_or(HostError::UnknownNode(id))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn is_descendant(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(node.index()).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id.index()).and_then(|n| n.parent);
        }
        false
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) -> HostResult<()> {
        let siblings = &mut self.node_mut(parent)?.children;
        let position = siblings
            .iter()
            .position(|&c| c == child)
            .ok_or(HostError::NotAChild { parent, child })?;
        siblings.remove(position);
        self.node_mut(child)?.parent = None;
        Ok(())
    }
}

/// A shared handle to a node tree.
///
/// Cloning a `Document` creates a new handle to the **same** tree.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<Tree>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.inner.borrow();
        f.debug_struct("Document")
            .field("nodes", &tree.nodes.len())
            .field("sessions", &tree.sessions.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Name of the root element.
    pub const ROOT_NAME: &'static str = "document";

    /// Create a document containing only its root element.
    pub fn new() -> Self {
        let mut tree = Tree {
            nodes: Vec::new(),
            sessions: Vec::new(),
        };
        tree.push(NodeKind::Element {
            name: Self::ROOT_NAME.to_string(),
            attributes: BTreeMap::new(),
        });
        Self {
            inner: Rc::new(RefCell::new(tree)),
        }
    }

    /// Whether two handles refer to the same tree.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The root element.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Create a detached element.
    pub fn create_element(&self, name: impl Into<String>) -> NodeId {
        self.inner.borrow_mut().push(NodeKind::Element {
            name: name.into(),
            attributes: BTreeMap::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&self, data: impl Into<String>) -> NodeId {
        self.inner
            .borrow_mut()
            .push(NodeKind::Text { data: data.into() })
    }

    /// Whether the node belongs to this document.
    pub fn has_node(&self, node: NodeId) -> bool {
        node.index() < self.inner.borrow().nodes.len()
    }

    /// Number of nodes ever created, attached or not.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    /// Element name, or `#text` for text nodes.
    pub fn node_name(&self, node: NodeId) -> HostResult<String> {
        let tree = self.inner.borrow();
        let name = match &tree.node(node)?.kind {
            NodeKind::Element { name, .. } => name.clone(),
            NodeKind::Text { .. } => "#text".to_string(),
        };
        Ok(name)
    }

    /// A copy of the node payload.
    pub fn kind(&self, node: NodeId) -> HostResult<NodeKind> {
        Ok(self.inner.borrow().node(node)?.kind.clone())
    }

    /// Parent of the node, if attached.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner
            .borrow()
            .nodes
            .get(node.index())
            .and_then(|n| n.parent)
    }

    /// Children of the node, in order.
    pub fn children(&self, node: NodeId) -> HostResult<Vec<NodeId>> {
        Ok(self.inner.borrow().node(node)?.children.clone())
    }

    /// Whether `node` is a strict descendant of `ancestor`.
    pub fn is_descendant(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.inner.borrow().is_descendant(ancestor, node)
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.is_descendant(ancestor, node)
    }

    /// Current attribute value.
    pub fn attribute(&self, node: NodeId, name: &str) -> HostResult<Option<String>> {
        let tree = self.inner.borrow();
        let value = match &tree.node(node)?.kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).cloned(),
            NodeKind::Text { .. } => return Err(HostError::NotAnElement(node)),
        };
        Ok(value)
    }

    /// Current text of a text node.
    pub fn text(&self, node: NodeId) -> HostResult<String> {
        let tree = self.inner.borrow();
        let data = match &tree.node(node)?.kind {
            NodeKind::Text { data } => data.clone(),
            NodeKind::Element { .. } => return Err(HostError::NotAText(node)),
        };
        Ok(data)
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// A child that is already attached elsewhere is moved, which records a
    /// removal on its old parent before the insertion on the new one.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> HostResult<()> {
        let previous_parent = {
            let mut tree = self.inner.borrow_mut();
            if matches!(tree.node(parent)?.kind, NodeKind::Text { .. }) {
                return Err(HostError::NotAnElement(parent));
            }
            let previous_parent = tree.node(child)?.parent;
            if child == parent || tree.is_descendant(child, parent) {
                return Err(HostError::HierarchyRequest { parent, child });
            }
            if let Some(old) = previous_parent {
                tree.detach(old, child)?;
            }
            tree.node_mut(parent)?.children.push(child);
            tree.node_mut(child)?.parent = Some(parent);
            previous_parent
        };

        if let Some(old) = previous_parent {
            self.record(TreeMutation::child_list(old, Vec::new(), vec![child]));
        }
        self.record(TreeMutation::child_list(parent, vec![child], Vec::new()));
        Ok(())
    }

    /// Detach `child` from `parent`.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> HostResult<()> {
        {
            let mut tree = self.inner.borrow_mut();
            tree.node(child)?;
            tree.detach(parent, child)?;
        }
        self.record(TreeMutation::child_list(parent, Vec::new(), vec![child]));
        Ok(())
    }

    /// Set an attribute on an element.
    pub fn set_attribute(
        &self,
        node: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> HostResult<()> {
        let name = name.into();
        let old_value = {
            let mut tree = self.inner.borrow_mut();
            match &mut tree.node_mut(node)?.kind {
                NodeKind::Element { attributes, .. } => {
                    attributes.insert(name.clone(), value.into())
                }
                NodeKind::Text { .. } => return Err(HostError::NotAnElement(node)),
            }
        };
        self.record(TreeMutation::attributes(node, name, old_value));
        Ok(())
    }

    /// Remove an attribute. Returns whether it was present; removing a
    /// missing attribute records nothing.
    pub fn remove_attribute(&self, node: NodeId, name: &str) -> HostResult<bool> {
        let old_value = {
            let mut tree = self.inner.borrow_mut();
            match &mut tree.node_mut(node)?.kind {
                NodeKind::Element { attributes, .. } => attributes.remove(name),
                NodeKind::Text { .. } => return Err(HostError::NotAnElement(node)),
            }
        };
        match old_value {
            Some(old) => {
                self.record(TreeMutation::attributes(node, name, Some(old)));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replace the text of a text node.
    pub fn set_text(&self, node: NodeId, data: impl Into<String>) -> HostResult<()> {
        let old_value = {
            let mut tree = self.inner.borrow_mut();
            match &mut tree.node_mut(node)?.kind {
                NodeKind::Text { data: current } => std::mem::replace(current, data.into()),
                NodeKind::Element { .. } => return Err(HostError::NotAText(node)),
            }
        };
        self.record(TreeMutation::character_data(node, Some(old_value)));
        Ok(())
    }

    /// Open an observation session on this document.
    ///
    /// `deliver` receives the session's queued records, one batch per
    /// [`checkpoint`](Self::checkpoint).
    pub fn open_session(&self, deliver: impl Fn(Vec<TreeMutation>) + 'static) -> DocumentSession {
        let state = Rc::new(RefCell::new(SessionState::new(Rc::new(deliver))));
        self.inner.borrow_mut().sessions.push(Rc::downgrade(&state));
        DocumentSession::new(self.clone(), state)
    }

    /// Deliver every session's queued records to its callback.
    ///
    /// Sessions are visited in the order they were opened. Callbacks may
    /// mutate the tree; the records that produces are delivered in a further
    /// round, until no session has anything queued. Returns the number of
    /// records delivered.
    pub fn checkpoint(&self) -> usize {
        let mut delivered = 0;
        loop {
            let mut progressed = false;
            for session in self.live_sessions() {
                let Some((records, deliver)) = session.borrow_mut().take_for_delivery() else {
                    continue;
                };
                progressed = true;
                delivered += records.len();
                tracing::trace!(records = records.len(), "delivering mutation records");
                deliver(records);
            }
            if !progressed {
                return delivered;
            }
        }
    }

    /// Number of records queued across all sessions.
    pub fn pending_records(&self) -> usize {
        self.live_sessions()
            .iter()
            .map(|s| s.borrow().pending())
            .sum()
    }

    fn live_sessions(&self) -> Vec<Rc<RefCell<SessionState>>> {
        let mut tree = self.inner.borrow_mut();
        tree.sessions.retain(|s| s.strong_count() > 0);
        tree.sessions.iter().filter_map(Weak::upgrade).collect()
    }

    fn record(&self, mutation: TreeMutation) {
        for session in self.live_sessions() {
            session.borrow_mut().offer(self, &mutation);
        }
    }
}
