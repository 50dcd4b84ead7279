use std::fmt;

/// The closed vocabulary of lifecycle hooks the editor dispatches into tools.
///
/// These names are a compatibility contract with tool authors: the engine
/// never dispatches anything outside this set, and a tool is free to handle
/// any subset (unhandled hooks are silent no-ops).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolHook {
    /// Legacy post-insertion hook. Deprecated in favour of [`ToolHook::Rendered`].
    AppendCallback,
    /// The block's composed container was inserted into the document.
    Rendered,
    /// The block changed position among its siblings.
    Moved,
    /// Content inside the block's container changed (debounced).
    Updated,
    /// The block was removed from the document.
    Removed,
    /// Pasted content was routed to this block.
    OnPaste,
}

impl ToolHook {
    pub const ALL: [ToolHook; 6] = [
        ToolHook::AppendCallback,
        ToolHook::Rendered,
        ToolHook::Moved,
        ToolHook::Updated,
        ToolHook::Removed,
        ToolHook::OnPaste,
    ];

    /// Stable wire name, used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ToolHook::AppendCallback => "append_callback",
            ToolHook::Rendered => "rendered",
            ToolHook::Moved => "moved",
            ToolHook::Updated => "updated",
            ToolHook::Removed => "removed",
            ToolHook::OnPaste => "on_paste",
        }
    }

    pub fn is_deprecated(self) -> bool {
        matches!(self, ToolHook::AppendCallback)
    }

    /// The hook callers should migrate to, for deprecated entries.
    pub fn successor(self) -> Option<ToolHook> {
        match self {
            ToolHook::AppendCallback => Some(ToolHook::Rendered),
            _ => None,
        }
    }
}

impl fmt::Display for ToolHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
