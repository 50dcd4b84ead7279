/*!
 * # Block Core
 *
 * A Block is the unit of content in the editor: one pluggable tool instance,
 * zero or more tune wrappers around its rendered content, and the
 * bookkeeping that lets the surrounding editor treat heterogeneous tools
 * uniformly.
 *
 * ## Composition
 *
 * Construction instantiates the tool (failures are fatal and propagate),
 * instantiates the registered tunes (failures are isolated per tune), and
 * composes a single container:
 *
 * ```text
 * wrapper (.mosaic-block)
 * └── default-tune wrappers       outermost
 *     └── user-tune wrappers      in registration order
 *         └── content (.mosaic-block__content)
 *             └── tool-rendered subtree
 * ```
 *
 * Persisted tune data whose name matches no registered tune is kept aside
 * verbatim and re-emitted by [`Block::save`], so unknown tunes survive a
 * load/save round-trip unchanged.
 *
 * ## Mutation pipeline
 *
 * The container subtree is observed for mutations. Batches in which any
 * added or removed node carries the mutation-free marker are dropped with
 * no side effects at all; every other batch resets a per-block debounce
 * timer ([`MUTATION_DEBOUNCE_TICKS`] of quiet). When the timer fires the
 * block invalidates its cached input list, re-resolves the focused input,
 * dispatches the `updated` hook into the tool, and emits
 * [`BlockEvent::DidMutated`]. A block under ceaseless edits defers
 * notification until the edits pause.
 *
 * ## Hook dispatch
 *
 * [`Block::call`] dispatches one of the fixed [`ToolHook`] names into the
 * tool. Unimplemented hooks are silent no-ops; a failing hook is logged and
 * swallowed, so a misbehaving tool can never take down the editor.
 */

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Once;
use std::sync::mpsc::Receiver;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::api::BlockApi;
use crate::dom::{Dom, MutationRecord, NodeId, ObserverId, SharedDom};
use crate::events::Emitter;
use crate::scheduler::{Debouncer, SharedScheduler};
use crate::tools::{BlockTool, BlockTune, ToolDescriptor, ToolHook, TuneDescriptor};

/// Quiet period, in scheduler ticks, between the last observed content
/// mutation and the block's single coalesced notification. Part of the
/// behavioral contract tool authors rely on.
pub const MUTATION_DEBOUNCE_TICKS: u64 = 450;

/// Structural class names on the composed container. Other editor
/// components (selection, drag & drop, styling) key off these, so they are
/// stable contract, not presentation detail.
pub mod css {
    pub const WRAPPER: &str = "mosaic-block";
    pub const CONTENT: &str = "mosaic-block__content";
    pub const FOCUSED: &str = "mosaic-block--focused";
    pub const SELECTED: &str = "mosaic-block--selected";
    pub const DROP_TARGET: &str = "mosaic-block--drop-target";
}

/// Opaque block identity: the external handle for addressing a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(String);

impl BlockId {
    /// Fresh unique identifier for blocks constructed without one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Events a block publishes to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEvent {
    /// Content inside the block's container changed (debounced).
    DidMutated { id: BlockId },
}

/// Failures that make a block unusable. Everything third-party that happens
/// after construction is isolated to diagnostics instead.
#[derive(Debug, Error)]
pub enum BlockError {
    /// The tool constructor failed; no partial block is left behind.
    #[error("failed to construct tool `{name}`: {cause}")]
    ToolConstruction { name: String, cause: anyhow::Error },

    /// The tool failed to extract its data during [`Block::save`].
    #[error("tool `{name}` failed to save: {cause}")]
    ToolSave { name: String, cause: anyhow::Error },
}

/// A block's persisted form: the tool's data plus per-tune data, including
/// data kept for tunes that were unavailable at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedBlockData {
    pub id: BlockId,
    pub tool: String,
    pub data: Value,
    pub tunes: BTreeMap<String, Value>,
}

/// Construction inputs that vary per block (the tool descriptor and the
/// editor-level default tunes are shared registries).
pub struct BlockOptions {
    /// Identity to reuse; `None` generates a fresh one.
    pub id: Option<BlockId>,
    /// Persisted tool data, understood only by the tool.
    pub data: Value,
    /// Persisted tune data, keyed by tune name.
    pub tunes_data: BTreeMap<String, Value>,
    pub read_only: bool,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            id: None,
            data: Value::Null,
            tunes_data: BTreeMap::new(),
            read_only: false,
        }
    }
}

/// State reachable from the mutation pipeline. Lives behind an `Rc` so the
/// observer handler and the debounce callback can reach it without owning
/// the block.
struct BlockState {
    id: BlockId,
    tool_name: String,
    tool: Box<dyn BlockTool>,
    tunes: Vec<(String, Box<dyn BlockTune>)>,
    default_tunes: Vec<(String, Box<dyn BlockTune>)>,
    unavailable_tune_data: BTreeMap<String, Value>,
    holder: NodeId,
    /// Cached focusable elements; empty means "not computed yet".
    inputs: Vec<NodeId>,
    current_input_index: usize,
    debounce: Debouncer,
    emitter: Emitter<BlockEvent>,
}

impl BlockState {
    /// Recompute the input cache if it was invalidated. An input-less
    /// container recomputes on every access, which is harmless.
    fn ensure_inputs(&mut self, dom: &Dom) {
        if self.inputs.is_empty() {
            self.inputs = dom.find_focusable(self.holder);
            if !self.inputs.is_empty() && self.current_input_index >= self.inputs.len() {
                self.current_input_index = self.inputs.len() - 1;
            }
        }
    }

    /// Point the current-input index at whatever holds focus now. Falls back
    /// to the first input when no cached input holds focus; preserving the
    /// previous index instead would be plausible, but resetting is the
    /// documented behavior.
    fn resync_current_input(&mut self, dom: &Dom) {
        self.ensure_inputs(dom);
        self.current_input_index = dom
            .focused()
            .and_then(|focused| {
                self.inputs
                    .iter()
                    .position(|&input| input == focused || dom.contains(input, focused))
            })
            .unwrap_or(0);
    }

    /// Debounced pipeline body: runs once per quiet period.
    fn did_mutated(state: &Rc<RefCell<BlockState>>, dom: &SharedDom) {
        let mut st = state.borrow_mut();
        st.debounce.disarm();

        st.inputs.clear();
        {
            let tree = dom.borrow();
            st.resync_current_input(&tree);
        }

        {
            let mut tree = dom.borrow_mut();
            if let Err(err) = st.tool.call(ToolHook::Updated, None, &mut tree) {
                warn!(hook = ToolHook::Updated.name(), error = %err, "tool hook failed");
            }
        }

        let event = BlockEvent::DidMutated { id: st.id.clone() };
        st.emitter.emit(event);
    }
}

/// One unit of editor content: a tool instance, its tunes, the composed
/// container, and the mutation/input bookkeeping around them.
///
/// Dropping the block disconnects its observer and cancels any pending
/// notification.
pub struct Block {
    id: BlockId,
    name: String,
    settings: Value,
    read_only: bool,
    holder: NodeId,
    observer: ObserverId,
    dom: SharedDom,
    scheduler: SharedScheduler,
    state: Rc<RefCell<BlockState>>,
}

impl Block {
    /// Construct and compose a block.
    ///
    /// Tool instantiation failure is fatal and propagates; tune failures are
    /// isolated (logged, and the tune's persisted data is preserved as
    /// unavailable). Mutation observation starts only after composition, so
    /// composing never counts as a content edit.
    pub fn new(
        options: BlockOptions,
        descriptor: &ToolDescriptor,
        default_tunes: &[TuneDescriptor],
        dom: &SharedDom,
        scheduler: &SharedScheduler,
    ) -> Result<Self, BlockError> {
        let id = options.id.unwrap_or_else(BlockId::generate);
        let name = descriptor.name().to_string();
        let settings = descriptor.settings().clone();
        let api = BlockApi::new(id.clone(), name.clone(), settings.clone(), options.read_only);

        let mut tool =
            descriptor
                .create(options.data, api.clone(), options.read_only)
                .map_err(|cause| BlockError::ToolConstruction {
                    name: name.clone(),
                    cause,
                })?;

        let mut tunes_data = options.tunes_data;
        let mut unavailable = BTreeMap::new();
        let mut user_tunes =
            instantiate_tunes(descriptor.tunes(), &settings, &api, &mut tunes_data, &mut unavailable);
        let mut editor_tunes =
            instantiate_tunes(default_tunes, &settings, &api, &mut tunes_data, &mut unavailable);
        // Whatever remains references no registered tune; keep it verbatim
        // so the next save does not drop it.
        unavailable.append(&mut tunes_data);

        let holder = {
            let mut tree = dom.borrow_mut();
            let rendered = tool.render(&mut tree);
            let wrapper = tree.create_element("div");
            tree.add_class(wrapper, css::WRAPPER);
            let content = tree.create_element("div");
            tree.add_class(content, css::CONTENT);
            tree.append_child(content, rendered);

            // User tunes wrap first, so editor-level default tunes end up
            // outermost.
            let mut wrapped = content;
            for (tune_name, tune) in user_tunes.iter_mut().chain(editor_tunes.iter_mut()) {
                match tune.wrap(&mut tree, wrapped) {
                    Ok(node) => wrapped = node,
                    Err(err) => {
                        warn!(tune = tune_name.as_str(), error = %err, "tune wrap failed, leaving its wrapper out");
                    }
                }
            }
            tree.append_child(wrapper, wrapped);
            wrapper
        };

        let state = Rc::new(RefCell::new(BlockState {
            id: id.clone(),
            tool_name: name.clone(),
            tool,
            tunes: user_tunes,
            default_tunes: editor_tunes,
            unavailable_tune_data: unavailable,
            holder,
            inputs: Vec::new(),
            current_input_index: 0,
            debounce: Debouncer::new(MUTATION_DEBOUNCE_TICKS),
            emitter: Emitter::new(),
        }));

        let handler_state = Rc::downgrade(&state);
        let handler_dom = Rc::downgrade(dom);
        let handler_scheduler = Rc::clone(scheduler);
        let observer = dom.borrow_mut().observe(holder, move |batch| {
            let Some(state) = handler_state.upgrade() else {
                return;
            };
            let Some(dom) = handler_dom.upgrade() else {
                return;
            };
            // A batch touching any mutation-free node is dropped wholesale:
            // no cache invalidation, no timer reset, no event.
            if batch_is_suppressed(&dom.borrow(), &batch) {
                return;
            }
            let fire_state = Rc::downgrade(&state);
            let fire_dom = Rc::downgrade(&dom);
            state
                .borrow_mut()
                .debounce
                .poke(&handler_scheduler, move || {
                    let Some(state) = fire_state.upgrade() else {
                        return;
                    };
                    let Some(dom) = fire_dom.upgrade() else {
                        return;
                    };
                    BlockState::did_mutated(&state, &dom);
                });
        });

        Ok(Self {
            id,
            name,
            settings,
            read_only: options.read_only,
            holder,
            observer,
            dom: Rc::clone(dom),
            scheduler: Rc::clone(scheduler),
            state,
        })
    }

    // =========================================================================
    // Identity and accessors
    // =========================================================================

    pub fn id(&self) -> &BlockId {
        &self.id
    }

    /// Name of the tool type that produced this block.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Editor-level settings of the tool type.
    pub fn settings(&self) -> &Value {
        &self.settings
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Root of the composed container, for insertion into the document.
    pub fn holder(&self) -> NodeId {
        self.holder
    }

    /// Names of the active tunes, user tunes first, in registration order.
    pub fn active_tunes(&self) -> Vec<String> {
        let state = self.state.borrow();
        state
            .tunes
            .iter()
            .chain(state.default_tunes.iter())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Persisted data for tunes that were not registered (or failed to
    /// construct), preserved verbatim for the next save.
    pub fn unavailable_tune_data(&self) -> BTreeMap<String, Value> {
        self.state.borrow().unavailable_tune_data.clone()
    }

    /// Subscribe to this block's events.
    pub fn subscribe(&self) -> Receiver<BlockEvent> {
        self.state.borrow_mut().emitter.subscribe()
    }

    /// Whether the container currently holds no text content.
    pub fn is_empty(&self) -> bool {
        self.dom
            .borrow()
            .text_content(self.holder)
            .trim()
            .is_empty()
    }

    // =========================================================================
    // Data extraction
    // =========================================================================

    /// Extract the block's persisted form: tool data plus every tune's
    /// contribution plus all unavailable tune data, verbatim.
    pub fn save(&self) -> Result<SavedBlockData, BlockError> {
        let state = self.state.borrow();
        let tree = self.dom.borrow();
        let data = state
            .tool
            .save(&tree)
            .map_err(|cause| BlockError::ToolSave {
                name: state.tool_name.clone(),
                cause,
            })?;

        let mut tunes = state.unavailable_tune_data.clone();
        for (name, tune) in state.tunes.iter().chain(state.default_tunes.iter()) {
            if let Some(value) = tune.save() {
                tunes.insert(name.clone(), value);
            }
        }

        Ok(SavedBlockData {
            id: state.id.clone(),
            tool: state.tool_name.clone(),
            data,
            tunes,
        })
    }

    /// Ask the tool whether `data` is acceptable.
    pub fn validate(&self, data: &Value) -> bool {
        self.state.borrow().tool.validate(data)
    }

    // =========================================================================
    // Tool hook dispatch
    // =========================================================================

    /// Dispatch a lifecycle hook into the tool.
    ///
    /// Hooks the tool does not implement are silent no-ops. A failing hook
    /// is logged with its name and swallowed; dispatch never propagates
    /// tool failures.
    pub fn call(&self, hook: ToolHook, params: Option<&Value>) {
        if hook.is_deprecated() {
            static DEPRECATED_HOOK_WARNING: Once = Once::new();
            DEPRECATED_HOOK_WARNING.call_once(|| {
                warn!(
                    hook = hook.name(),
                    successor = hook.successor().map(ToolHook::name).unwrap_or("none"),
                    "deprecated tool hook invoked"
                );
            });
        }

        let mut state = self.state.borrow_mut();
        let mut tree = self.dom.borrow_mut();
        if let Err(err) = state.tool.call(hook, params, &mut tree) {
            warn!(hook = hook.name(), error = %err, "tool hook failed");
        }
    }

    // =========================================================================
    // Input navigation
    // =========================================================================

    /// Focusable elements inside the container, recomputed lazily after
    /// invalidation.
    pub fn inputs(&self) -> Vec<NodeId> {
        let mut state = self.state.borrow_mut();
        state.ensure_inputs(&self.dom.borrow());
        state.inputs.clone()
    }

    pub fn input_count(&self) -> usize {
        self.inputs().len()
    }

    pub fn current_input_index(&self) -> usize {
        let mut state = self.state.borrow_mut();
        state.ensure_inputs(&self.dom.borrow());
        state.current_input_index
    }

    /// The input currently tracked as holding focus, if the block has any
    /// inputs at all.
    pub fn current_input(&self) -> Option<NodeId> {
        let mut state = self.state.borrow_mut();
        state.ensure_inputs(&self.dom.borrow());
        state.inputs.get(state.current_input_index).copied()
    }

    /// Focus the input at `index`, clamped into the valid range. No-op for
    /// a block without inputs.
    pub fn set_current_input(&self, index: usize) {
        let target = {
            let mut state = self.state.borrow_mut();
            state.ensure_inputs(&self.dom.borrow());
            if state.inputs.is_empty() {
                return;
            }
            state.current_input_index = index.min(state.inputs.len() - 1);
            state.inputs[state.current_input_index]
        };
        self.dom.borrow_mut().focus(target);
    }

    /// Move focus to the next input. No wraparound: at the last input this
    /// is a no-op returning `false`.
    pub fn next_input(&self) -> bool {
        self.step_input(1)
    }

    /// Move focus to the previous input. No wraparound at the first input.
    pub fn previous_input(&self) -> bool {
        self.step_input(-1)
    }

    fn step_input(&self, delta: isize) -> bool {
        let target = {
            let mut state = self.state.borrow_mut();
            state.ensure_inputs(&self.dom.borrow());
            if state.inputs.is_empty() {
                return false;
            }
            let next = state.current_input_index as isize + delta;
            if next < 0 || next as usize >= state.inputs.len() {
                return false;
            }
            state.current_input_index = next as usize;
            state.inputs[state.current_input_index]
        };
        self.dom.borrow_mut().focus(target);
        true
    }

    /// Re-resolve the current input after a focus change reported by the
    /// editor. Falls back to the first input when no cached input holds
    /// focus.
    pub fn refresh_current_input(&self) {
        let mut state = self.state.borrow_mut();
        let tree = self.dom.borrow();
        state.resync_current_input(&tree);
    }

    // =========================================================================
    // Structural modifiers
    // =========================================================================

    /// Toggle the selected modifier on the wrapper. Modifier classes are
    /// presentation state and never mark the document dirty.
    pub fn set_selected(&self, selected: bool) {
        self.dom
            .borrow_mut()
            .toggle_class_silent(self.holder, css::SELECTED, selected);
    }

    pub fn is_selected(&self) -> bool {
        self.dom.borrow().has_class(self.holder, css::SELECTED)
    }

    pub fn set_focused(&self, focused: bool) {
        self.dom
            .borrow_mut()
            .toggle_class_silent(self.holder, css::FOCUSED, focused);
    }

    pub fn set_drop_target(&self, drop_target: bool) {
        self.dom
            .borrow_mut()
            .toggle_class_silent(self.holder, css::DROP_TARGET, drop_target);
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        self.dom.borrow_mut().unobserve(self.observer);
        self.state.borrow_mut().debounce.cancel(&self.scheduler);
    }
}

/// Whole-batch exemption: any added or removed node carrying the
/// mutation-free marker suppresses the batch.
fn batch_is_suppressed(dom: &Dom, batch: &[MutationRecord]) -> bool {
    batch
        .iter()
        .flat_map(MutationRecord::touched_nodes)
        .any(|node| dom.is_mutation_free(node))
}

fn instantiate_tunes(
    descriptors: &[TuneDescriptor],
    tool_settings: &Value,
    api: &BlockApi,
    tunes_data: &mut BTreeMap<String, Value>,
    unavailable: &mut BTreeMap<String, Value>,
) -> Vec<(String, Box<dyn BlockTune>)> {
    let mut instances = Vec::new();
    for descriptor in descriptors {
        let data = tunes_data.remove(descriptor.name());
        match descriptor.create(
            tool_settings.clone(),
            data.clone().unwrap_or(Value::Null),
            api.clone(),
        ) {
            Ok(tune) => instances.push((descriptor.name().to_string(), tune)),
            Err(err) => {
                warn!(tune = descriptor.name(), error = %err, "tune construction failed, keeping its data aside");
                if let Some(data) = data {
                    unavailable.insert(descriptor.name().to_string(), data);
                }
            }
        }
    }
    instances
}
