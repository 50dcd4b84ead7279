use crate::dom::NodeId;

/// Handle to a registered mutation observer.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ObserverId(pub(crate) usize);

/// The shape of a single observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were added to or removed from `target`.
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    /// An attribute on `target` changed or was removed.
    Attribute { name: String },
    /// The content of a text node changed.
    CharacterData,
}

/// One observed change inside an observer's subtree.
///
/// For `ChildList` records the target is the parent the children were
/// attached to or detached from; removed nodes stay alive in the arena so
/// they can still be inspected when the batch is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

impl MutationRecord {
    /// All nodes this record added or removed. Empty for attribute and
    /// character-data records.
    pub fn touched_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        let (added, removed): (&[NodeId], &[NodeId]) = match &self.kind {
            MutationKind::ChildList { added, removed } => (added, removed),
            _ => (&[], &[]),
        };
        added.iter().chain(removed.iter()).copied()
    }
}

/// Callback invoked with one accumulated batch of records.
pub(crate) type ObserverHandler = Box<dyn FnMut(Vec<MutationRecord>)>;

/// Registered observer state: a subtree root, the handler, and the queue of
/// records waiting for the next asynchronous delivery.
pub(crate) struct ObserverEntry {
    pub(crate) root: NodeId,
    /// Taken out while the handler runs so delivery never re-enters it.
    pub(crate) handler: Option<ObserverHandler>,
    pub(crate) queue: Vec<MutationRecord>,
    pub(crate) scheduled: bool,
}
