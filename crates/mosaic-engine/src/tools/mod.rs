//! Capability contracts for pluggable tools and tunes.
//!
//! A *tool* produces and edits a block's content; a *tune* wraps the
//! rendered content with extra per-block UI (alignment handles, delete
//! controls, ...). The engine talks to both exclusively through the traits
//! here, and to their constructors through [`ToolDescriptor`] /
//! [`TuneDescriptor`], so arbitrary third-party implementations can be
//! registered without the block core knowing anything about them.
//!
//! Failures crossing this seam are `anyhow` errors: plugin code fails in
//! arbitrary ways, and the block core either propagates (construction) or
//! isolates-and-logs (everything after) per its error policy.

pub mod hooks;

use anyhow::Result;
use serde_json::Value;

use crate::api::BlockApi;
use crate::dom::{Dom, NodeId};
pub use hooks::ToolHook;

/// Outcome of a [`BlockTool::call`] dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookCall {
    /// The tool implemented and ran the hook.
    Handled,
    /// The tool does not implement this hook; the dispatch was a no-op.
    Ignored,
}

/// A live content-editing tool instance, exclusively owned by one block.
pub trait BlockTool {
    /// Build the tool's content subtree and return its root node.
    fn render(&mut self, dom: &mut Dom) -> NodeId;

    /// Extract the tool's current data for persistence.
    fn save(&self, dom: &Dom) -> Result<Value>;

    /// Check candidate data before it is accepted. Default: accept.
    fn validate(&self, data: &Value) -> bool {
        let _ = data;
        true
    }

    /// Dispatch one lifecycle hook.
    ///
    /// The default implementation handles nothing, which makes every hook an
    /// optional capability: tools override this and match the hooks they
    /// care about, returning [`HookCall::Ignored`] for the rest.
    fn call(&mut self, hook: ToolHook, params: Option<&Value>, dom: &mut Dom) -> Result<HookCall> {
        let _ = (hook, params, dom);
        Ok(HookCall::Ignored)
    }
}

/// A live tune instance attached to one block.
pub trait BlockTune {
    /// Wrap the (possibly already wrapped) content node, returning the new
    /// outermost node. Default: leave the content untouched.
    fn wrap(&mut self, dom: &mut Dom, content: NodeId) -> Result<NodeId> {
        let _ = dom;
        Ok(content)
    }

    /// Data to persist for this tune, or `None` when there is nothing to
    /// save.
    fn save(&self) -> Option<Value> {
        None
    }
}

type ToolConstructor = dyn Fn(Value, BlockApi, bool) -> Result<Box<dyn BlockTool>>;
type TuneConstructor = dyn Fn(Value, Value, BlockApi) -> Result<Box<dyn BlockTune>>;

/// Registration record for a tool type: its name, editor-level settings,
/// the user-configured tunes available to blocks of this type, and the
/// constructor.
pub struct ToolDescriptor {
    name: String,
    settings: Value,
    tunes: Vec<TuneDescriptor>,
    constructor: Box<ToolConstructor>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        constructor: impl Fn(Value, BlockApi, bool) -> Result<Box<dyn BlockTool>> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            settings: Value::Null,
            tunes: Vec::new(),
            constructor: Box::new(constructor),
        }
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_tune(mut self, tune: TuneDescriptor) -> Self {
        self.tunes.push(tune);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Value {
        &self.settings
    }

    /// User-level tunes, in registration order.
    pub fn tunes(&self) -> &[TuneDescriptor] {
        &self.tunes
    }

    /// Instantiate the tool with its persisted data, the restricted block
    /// facade, and the read-only flag.
    pub fn create(&self, data: Value, api: BlockApi, read_only: bool) -> Result<Box<dyn BlockTool>> {
        (self.constructor)(data, api, read_only)
    }
}

/// Registration record for a tune type.
pub struct TuneDescriptor {
    name: String,
    constructor: Box<TuneConstructor>,
}

impl TuneDescriptor {
    pub fn new(
        name: impl Into<String>,
        constructor: impl Fn(Value, Value, BlockApi) -> Result<Box<dyn BlockTune>> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            constructor: Box::new(constructor),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instantiate the tune with the owning tool's settings, the tune's
    /// persisted data (or `Null`), and the restricted block facade.
    pub fn create(&self, tool_settings: Value, data: Value, api: BlockApi) -> Result<Box<dyn BlockTune>> {
        (self.constructor)(tool_settings, data, api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockId;
    use crate::scheduler::Scheduler;

    struct NullTool;

    impl BlockTool for NullTool {
        fn render(&mut self, dom: &mut Dom) -> NodeId {
            dom.create_element("div")
        }

        fn save(&self, _dom: &Dom) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    fn test_api() -> BlockApi {
        BlockApi::new(BlockId::generate(), "null".into(), Value::Null, false)
    }

    #[test]
    fn test_default_call_ignores_every_hook() {
        let scheduler = Scheduler::new_shared();
        let dom = Dom::new_shared(&scheduler);
        let mut tool = NullTool;
        let mut tree = dom.borrow_mut();

        for hook in ToolHook::ALL {
            let outcome = tool.call(hook, None, &mut tree).unwrap();
            assert_eq!(outcome, HookCall::Ignored);
        }
    }

    #[test]
    fn test_default_tune_wrap_passes_content_through() {
        let scheduler = Scheduler::new_shared();
        let dom = Dom::new_shared(&scheduler);
        struct NullTune;
        impl BlockTune for NullTune {}

        let content = dom.borrow_mut().create_element("div");
        let wrapped = NullTune.wrap(&mut dom.borrow_mut(), content).unwrap();
        assert_eq!(wrapped, content);
        assert_eq!(NullTune.save(), None);
    }

    #[test]
    fn test_descriptor_builder_and_create() {
        let descriptor = ToolDescriptor::new("null", |_data, _api, _ro| {
            Ok(Box::new(NullTool) as Box<dyn BlockTool>)
        })
        .with_settings(serde_json::json!({"placeholder": "..."}))
        .with_tune(TuneDescriptor::new("noop", |_settings, _data, _api| {
            struct NullTune;
            impl BlockTune for NullTune {}
            Ok(Box::new(NullTune) as Box<dyn BlockTune>)
        }));

        assert_eq!(descriptor.name(), "null");
        assert_eq!(descriptor.settings()["placeholder"], "...");
        assert_eq!(descriptor.tunes().len(), 1);
        assert_eq!(descriptor.tunes()[0].name(), "noop");

        let tool = descriptor.create(Value::Null, test_api(), false);
        assert!(tool.is_ok());
    }
}
