//! Block resolution engine
//!
//! Tracks, per block name, a stack of pending block contributions gathered
//! while a child template's body is evaluated, and collapses each stack into
//! one final string once the layout itself is rendering. Contributions are
//! folded most-recently-pushed first; a `Replace` contribution discards
//! whatever was folded before it, while `Append`/`Prepend` accumulate around
//! it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

/// Delimiters for deferred-block markers, from the private use area so
/// they cannot collide with template output
const MARKER_OPEN: char = '\u{E000}';
const MARKER_CLOSE: char = '\u{E001}';

/// Marker emitted in place of a block's output while contributions are
/// being collected.
///
/// A block declared inside another block's body cannot know its final
/// content until the enclosing stack is flushed; the marker holds its
/// position in the enclosing body and is substituted with the named
/// block's resolved content during [`RenderState::resolve`]. Markers in
/// content that is discarded (a replaced contribution, or the child
/// body's own output) are discarded with it.
pub fn marker(name: &str) -> String {
    format!("{MARKER_OPEN}{name}{MARKER_CLOSE}")
}

/// Policy for combining one block contribution with content already folded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Concatenate after the accumulated content
    Append,
    /// Concatenate before the accumulated content
    Prepend,
    /// Discard the accumulated content
    Replace,
}

impl MergeMode {
    /// Parse a `mode` hash value as written by template authors
    pub fn parse(value: &str) -> Option<MergeMode> {
        match value {
            "append" => Some(MergeMode::Append),
            "prepend" => Some(MergeMode::Prepend),
            "replace" => Some(MergeMode::Replace),
            _ => None,
        }
    }
}

/// One `block` helper invocation's deferred output
///
/// The body is rendered at push time with the context that was current at
/// the declaration site; only the resulting string and the merge policy
/// are kept until the stack is flushed. Blocks nested in the body appear
/// in the string as deferred markers, resolved at flush time.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub content: String,
    pub mode: MergeMode,
}

/// Mutable state shared by the `extends`/`block`/`append`/`prepend` helpers
/// for the duration of a top-level render.
///
/// `collecting` is true while an `extends` child body is being evaluated:
/// block invocations then only push, and flushing is deferred to the
/// layout's own pass. `extends_depth` tracks nested `extends` activations
/// (a layout may itself extend another layout); when the outermost one
/// finishes, any residual stacks are cleared so no state leaks into the
/// next render.
#[derive(Debug, Default)]
pub struct RenderState {
    collecting: bool,
    extends_depth: usize,
    stacks: HashMap<String, Vec<Contribution>>,
}

impl RenderState {
    /// True while a child body is being evaluated under `extends`
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// True if no contributions are pending for any block name
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// True when no render is in flight and nothing is pending
    pub fn is_idle(&self) -> bool {
        !self.collecting && self.extends_depth == 0 && self.stacks.is_empty()
    }

    /// Enter an `extends` activation, switching to collection mode.
    ///
    /// Returns the previous collection flag, to be restored with
    /// [`RenderState::end_collect`] once the child body has been evaluated.
    pub fn begin_extends(&mut self) -> bool {
        self.extends_depth += 1;
        std::mem::replace(&mut self.collecting, true)
    }

    /// Restore the collection flag saved by [`RenderState::begin_extends`]
    pub fn end_collect(&mut self, previous: bool) {
        self.collecting = previous;
    }

    /// Leave an `extends` activation.
    ///
    /// At depth zero any residual stacks (names the layout never flushed)
    /// are dropped.
    pub fn finish_extends(&mut self) {
        self.extends_depth = self.extends_depth.saturating_sub(1);
        if self.extends_depth == 0 && !self.stacks.is_empty() {
            log::debug!(
                "clearing {} unflushed block stack(s) at end of render",
                self.stacks.len()
            );
            self.stacks.clear();
        }
    }

    /// Push a contribution onto the named stack
    pub fn push(&mut self, name: &str, contribution: Contribution) {
        self.stacks
            .entry(name.to_string())
            .or_default()
            .push(contribution);
    }

    /// Drain the named stack and substitute any deferred-block markers in
    /// the folded content with their own resolved blocks.
    ///
    /// This is the flush entry point for the layout side: after it
    /// returns, the named stack (and the stacks of every nested block
    /// reached through markers) is gone.
    pub fn resolve(&mut self, name: &str) -> String {
        let folded = self.flush(name);
        self.substitute(folded)
    }

    /// Drain the named stack into its final content.
    ///
    /// Contributions fold most-recently-pushed first; the stack entry is
    /// removed afterwards. A name with no pending contributions folds to
    /// the empty string.
    pub fn flush(&mut self, name: &str) -> String {
        let mut folded = String::new();
        let Some(mut stack) = self.stacks.remove(name) else {
            return folded;
        };
        while let Some(contribution) = stack.pop() {
            match contribution.mode {
                MergeMode::Append => folded.push_str(&contribution.content),
                MergeMode::Prepend => folded.insert_str(0, &contribution.content),
                MergeMode::Replace => folded = contribution.content,
            }
        }
        folded
    }

    /// Replace each deferred-block marker with the resolved content of
    /// the block it names.
    ///
    /// Resolution recurses through markers in the substituted content;
    /// it terminates because every flush removes its stack, so a name
    /// reached twice folds to the empty string the second time.
    fn substitute(&mut self, content: String) -> String {
        if !content.contains(MARKER_OPEN) {
            return content;
        }
        let mut result = String::with_capacity(content.len());
        let mut rest = content.as_str();
        while let Some(start) = rest.find(MARKER_OPEN) {
            result.push_str(&rest[..start]);
            let after = &rest[start + MARKER_OPEN.len_utf8()..];
            match after.find(MARKER_CLOSE) {
                Some(end) => {
                    let name = after[..end].to_string();
                    let resolved = self.resolve(&name);
                    result.push_str(&resolved);
                    rest = &after[end + MARKER_CLOSE.len_utf8()..];
                }
                None => {
                    // Unpaired delimiter in template output; keep it.
                    result.push(MARKER_OPEN);
                    rest = after;
                }
            }
        }
        result.push_str(rest);
        result
    }
}

/// Handle to the render states shared across one set of registered helpers.
///
/// A render and all its nested helper invocations run synchronously on one
/// thread, so states are keyed per thread: two renders executing in
/// parallel each see their own stacks and cannot interleave. An entry is
/// removed as soon as its render leaves it idle, so the map only holds
/// threads with a render in flight.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<Mutex<HashMap<ThreadId, RenderState>>>);

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one push/flush/flag operation against the current thread's
    /// render state.
    ///
    /// The map lock is held only for the duration of `op`; `op` must not
    /// re-enter the host render pipeline, since nested block invocations
    /// take the same lock.
    pub fn with<R>(&self, op: impl FnOnce(&mut RenderState) -> R) -> R {
        let mut states = self
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = thread::current().id();
        let state = states.entry(id).or_default();
        let result = op(state);
        if state.is_idle() {
            states.remove(&id);
        }
        result
    }
}
