//! Retained element tree shared by the engine and its plugins.
//!
//! Tools and tunes render into this tree, the host editor attaches block
//! containers into its own document structure from it, and blocks observe
//! it for content changes. Three properties matter to the rest of the
//! crate:
//!
//! - **Stable ids**: nodes are arena-allocated and detached rather than
//!   freed, so a [`NodeId`] held across mutations never dangles.
//! - **Batched, asynchronous observation**: mutations inside an observed
//!   subtree accumulate and are delivered as one batch per scheduler turn,
//!   never synchronously from the mutating call.
//! - **The mutation-free marker** ([`MUTATION_FREE_ATTR`]): the single
//!   convention by which plugin code distinguishes presentational DOM
//!   bookkeeping from real content edits.

pub mod node;
pub mod observer;
pub mod tree;

pub use node::{NodeId, NodeKind};
pub use observer::{MutationKind, MutationRecord, ObserverId};
pub use tree::{Dom, MUTATION_FREE_ATTR, SharedDom};
