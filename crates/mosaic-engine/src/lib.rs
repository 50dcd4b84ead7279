pub mod api;
pub mod block;
pub mod dom;
pub mod events;
pub mod scheduler;
pub mod tools;

// Re-export key types for easier usage
pub use api::BlockApi;
pub use block::{
    Block, BlockError, BlockEvent, BlockId, BlockOptions, MUTATION_DEBOUNCE_TICKS, SavedBlockData,
};
pub use dom::{
    Dom, MUTATION_FREE_ATTR, MutationKind, MutationRecord, NodeId, NodeKind, ObserverId, SharedDom,
};
pub use events::Emitter;
pub use scheduler::{Debouncer, Scheduler, SharedScheduler, TimerId};
pub use tools::{BlockTool, BlockTune, HookCall, ToolDescriptor, ToolHook, TuneDescriptor};
