//! Restricted block facade handed to tool and tune instances.

use serde_json::Value;

use crate::block::BlockId;
use crate::dom::{Dom, MUTATION_FREE_ATTR, NodeId};

/// The narrow view of a block that plugin code is allowed to hold.
///
/// Tools and tunes receive this at construction instead of a reference to
/// the block itself: they can read identity and configuration and use the
/// sanctioned helpers, but there is no route back into block internals.
#[derive(Clone, Debug)]
pub struct BlockApi {
    id: BlockId,
    name: String,
    settings: Value,
    read_only: bool,
}

impl BlockApi {
    pub(crate) fn new(id: BlockId, name: String, settings: Value, read_only: bool) -> Self {
        Self {
            id,
            name,
            settings,
            read_only,
        }
    }

    /// The owning block's external handle.
    pub fn id(&self) -> &BlockId {
        &self.id
    }

    /// The tool type that produced the owning block.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Editor-level settings for the tool type.
    pub fn settings(&self) -> &Value {
        &self.settings
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Mark a node the tool manages for presentation only, so attaching or
    /// detaching it never counts as a content edit.
    pub fn mark_mutation_free(&self, dom: &mut Dom, node: NodeId) {
        dom.set_attribute(node, MUTATION_FREE_ATTR, "true");
    }
}
