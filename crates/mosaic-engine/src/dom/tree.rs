use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::dom::node::Node;
use crate::dom::observer::{ObserverEntry, ObserverHandler};
use crate::dom::{MutationKind, MutationRecord, NodeId, NodeKind, ObserverId};
use crate::scheduler::{Scheduler, SharedScheduler};

/// Attribute marking a node whose insertion or removal must not be treated
/// as a content edit. Tools set it (usually via
/// [`BlockApi::mark_mutation_free`](crate::api::BlockApi::mark_mutation_free))
/// on presentational nodes they manage themselves.
pub const MUTATION_FREE_ATTR: &str = "data-mutation-free";

/// Tags that count as focusable inputs in addition to
/// `contenteditable="true"` elements.
const FOCUSABLE_TAGS: [&str; 3] = ["input", "textarea", "select"];

/// Shared handle to the element tree. The tree is single-threaded by design;
/// every collaborator (blocks, tools, tunes, the host editor) holds the same
/// handle.
pub type SharedDom = Rc<RefCell<Dom>>;

/// Retained element tree with mutation observation.
///
/// The tree is an arena: nodes are addressed by [`NodeId`] and never freed.
/// Removing a child detaches it (its subtree keeps existing without a
/// parent), which keeps ids in mutation records valid until the batch is
/// delivered and beyond.
///
/// ## Mutation observation
///
/// [`Dom::observe`] registers a handler for every structural, attribute or
/// text change inside a subtree. Records are not pushed synchronously:
/// they accumulate per observer, and the first record after an empty queue
/// schedules a zero-delay task on the shared [`Scheduler`]. When that task
/// runs, the whole queue is handed to the handler as one batch. The Dom is
/// not borrowed while a handler runs, so handlers may freely mutate the
/// tree; changes made during a handler are queued for a later delivery.
pub struct Dom {
    nodes: Vec<Node>,
    focused: Option<NodeId>,
    observers: Vec<Option<ObserverEntry>>,
    scheduler: Weak<RefCell<Scheduler>>,
    self_weak: Weak<RefCell<Dom>>,
}

impl Dom {
    /// Create a tree bound to the scheduler that will run batch deliveries.
    pub fn new_shared(scheduler: &SharedScheduler) -> SharedDom {
        Rc::new_cyclic(|weak| {
            RefCell::new(Dom {
                nodes: Vec::new(),
                focused: None,
                observers: Vec::new(),
                scheduler: Rc::downgrade(scheduler),
                self_weak: weak.clone(),
            })
        })
    }

    // =========================================================================
    // Node creation and structure
    // =========================================================================

    /// Create a detached element node. Creation is not a mutation; the node
    /// only becomes observable once attached into an observed subtree.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(Node::element(tag))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push_node(Node::text(content))
    }

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent first (which records a removal there).
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        assert!(
            self.nodes[parent.0].is_element(),
            "text nodes cannot have children"
        );
        assert!(
            !self.contains(child, parent),
            "cannot append a node into its own subtree"
        );

        if let Some(old_parent) = self.nodes[child.0].parent {
            self.detach(old_parent, child);
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.record(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: vec![child],
                removed: Vec::new(),
            },
        });
    }

    /// Detach `child` from `parent`. The subtree stays alive in the arena.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        assert_eq!(
            self.nodes[child.0].parent,
            Some(parent),
            "remove_child: node is not a child of the given parent"
        );
        self.detach(parent, child);
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.retain(|&c| c != child);
        self.nodes[child.0].parent = None;
        if let Some(focused) = self.focused {
            if self.contains(child, focused) {
                self.focused = None;
            }
        }
        self.record(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: Vec::new(),
                removed: vec![child],
            },
        });
    }

    /// Replace the content of a text node.
    pub fn set_text(&mut self, node: NodeId, content: &str) {
        match &mut self.nodes[node.0].kind {
            NodeKind::Text { content: current } => {
                *current = content.to_string();
            }
            NodeKind::Element { .. } => panic!("set_text: node is not a text node"),
        }
        self.record(MutationRecord {
            target: node,
            kind: MutationKind::CharacterData,
        });
    }

    // =========================================================================
    // Attributes and classes
    // =========================================================================

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        assert!(
            self.nodes[node.0].is_element(),
            "attributes only exist on elements"
        );
        self.nodes[node.0]
            .attributes
            .insert(name.to_string(), value.to_string());
        self.record(MutationRecord {
            target: node,
            kind: MutationKind::Attribute {
                name: name.to_string(),
            },
        });
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if self.nodes[node.0].attributes.remove(name).is_some() {
            self.record(MutationRecord {
                target: node,
                kind: MutationKind::Attribute {
                    name: name.to_string(),
                },
            });
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0].attributes.get(name).map(String::as_str)
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        let classes = self.class_list(node, class, true);
        self.set_attribute(node, "class", &classes);
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let classes = self.class_list(node, class, false);
        if classes.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            self.set_attribute(node, "class", &classes);
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .map(|list| list.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Toggle a class without producing a mutation record. Reserved for the
    /// Block's own structural modifier classes, which are presentation state
    /// rather than content.
    pub(crate) fn toggle_class_silent(&mut self, node: NodeId, class: &str, on: bool) {
        let classes = self.class_list(node, class, on);
        let attrs = &mut self.nodes[node.0].attributes;
        if classes.is_empty() {
            attrs.remove("class");
        } else {
            attrs.insert("class".to_string(), classes);
        }
    }

    fn class_list(&self, node: NodeId, class: &str, include: bool) -> String {
        let mut classes: Vec<&str> = self
            .attribute(node, "class")
            .map(|list| list.split_whitespace().filter(|c| *c != class).collect())
            .unwrap_or_default();
        if include {
            classes.push(class);
        }
        classes.join(" ")
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { tag } => Some(tag),
            NodeKind::Text { .. } => None,
        }
    }

    /// True when `node` is `ancestor` or lies inside its subtree.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.nodes[n.0].parent;
        }
        false
    }

    /// Depth-first concatenation of all text content under `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text { content } => out.push_str(content),
            NodeKind::Element { .. } => {
                for &child in &self.nodes[node.0].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// All focusable elements under `root` (root included), in document
    /// order: `contenteditable="true"` elements plus native input tags.
    pub fn find_focusable(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_focusable(root, &mut out);
        out
    }

    fn collect_focusable(&self, node: NodeId, out: &mut Vec<NodeId>) {
        if self.is_focusable(node) {
            out.push(node);
        }
        for i in 0..self.nodes[node.0].children.len() {
            self.collect_focusable(self.nodes[node.0].children[i], out);
        }
    }

    fn is_focusable(&self, node: NodeId) -> bool {
        match &self.nodes[node.0].kind {
            NodeKind::Text { .. } => false,
            NodeKind::Element { tag } => {
                FOCUSABLE_TAGS.contains(&tag.as_str())
                    || self.attribute(node, "contenteditable") == Some("true")
            }
        }
    }

    pub fn is_mutation_free(&self, node: NodeId) -> bool {
        self.attribute(node, MUTATION_FREE_ATTR) == Some("true")
    }

    // =========================================================================
    // Focus bookkeeping
    // =========================================================================

    /// Mark a node as holding focus. Focus changes are not mutations.
    pub fn focus(&mut self, node: NodeId) {
        assert!(node.0 < self.nodes.len(), "focus: unknown node");
        self.focused = Some(node);
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    // =========================================================================
    // Mutation observation
    // =========================================================================

    /// Watch every mutation inside `root`'s subtree. The handler receives
    /// accumulated batches asynchronously via the scheduler.
    pub fn observe(
        &mut self,
        root: NodeId,
        handler: impl FnMut(Vec<MutationRecord>) + 'static,
    ) -> ObserverId {
        let id = ObserverId(self.observers.len());
        self.observers.push(Some(ObserverEntry {
            root,
            handler: Some(Box::new(handler) as ObserverHandler),
            queue: Vec::new(),
            scheduled: false,
        }));
        id
    }

    /// Disconnect an observer. Pending undelivered records are dropped.
    pub fn unobserve(&mut self, id: ObserverId) {
        if let Some(slot) = self.observers.get_mut(id.0) {
            *slot = None;
        }
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Route a record to every observer whose root contains the target, and
    /// make sure a delivery is scheduled for each of them.
    fn record(&mut self, record: MutationRecord) {
        let mut to_schedule = Vec::new();
        for (index, slot) in self.observers.iter_mut().enumerate() {
            let Some(entry) = slot else { continue };
            if !contains_in(&self.nodes, entry.root, record.target) {
                continue;
            }
            entry.queue.push(record.clone());
            if !entry.scheduled {
                entry.scheduled = true;
                to_schedule.push(ObserverId(index));
            }
        }
        for id in to_schedule {
            self.schedule_delivery(id);
        }
    }

    fn schedule_delivery(&mut self, id: ObserverId) {
        // Without a live scheduler records simply accumulate until one exists
        // again; the queue is drained on the next scheduled delivery.
        let Some(scheduler) = self.scheduler.upgrade() else {
            return;
        };
        let dom = self.self_weak.clone();
        scheduler.borrow_mut().schedule(0, move || {
            if let Some(dom) = dom.upgrade() {
                deliver(&dom, id);
            }
        });
    }
}

/// `Dom::contains` without borrowing the whole tree, usable while iterating
/// over observers.
fn contains_in(nodes: &[Node], ancestor: NodeId, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if n == ancestor {
            return true;
        }
        current = nodes[n.0].parent;
    }
    false
}

/// Deliver an observer's accumulated batch. The handler is taken out of the
/// entry and the borrow released before it runs, so the handler can mutate
/// the tree and even disconnect observers.
fn deliver(dom: &SharedDom, id: ObserverId) {
    let (mut handler, batch) = {
        let mut tree = dom.borrow_mut();
        let Some(entry) = tree.observers.get_mut(id.0).and_then(Option::as_mut) else {
            return;
        };
        entry.scheduled = false;
        if entry.queue.is_empty() {
            return;
        }
        let Some(handler) = entry.handler.take() else {
            return;
        };
        (handler, std::mem::take(&mut entry.queue))
    };

    handler(batch);

    let mut tree = dom.borrow_mut();
    if let Some(entry) = tree.observers.get_mut(id.0).and_then(Option::as_mut) {
        if entry.handler.is_none() {
            entry.handler = Some(handler);
        }
    }
}
