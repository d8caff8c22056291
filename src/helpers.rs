//! Handlebars helper implementations
//!
//! Four helpers cooperate to provide layout inheritance: `extends` wraps a
//! child template's block declarations and renders the named layout, while
//! `block`, `append` and `prepend` declare named content regions. The
//! helpers share one [`SharedState`] per registration; block content is
//! written straight through the host's output sink, so it is never
//! re-escaped.

use std::sync::Arc;

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError,
    RenderErrorReason, Renderable,
};
use serde_json::json;

use crate::blocks::{self, Contribution, MergeMode, SharedState};
use crate::loader::LayoutLoader;

/// Layout name used when `extends` is invoked without one
const DEFAULT_LAYOUT: &str = "default";

/// The `{{#extends "name"}} ... {{/extends}}` helper
///
/// Evaluates its body purely for the block contributions it pushes, then
/// compiles the layout source fresh (no compiled-template cache) and
/// renders it against the same data, annotated with `layout.filename`.
pub struct ExtendsHelper {
    loader: Arc<LayoutLoader>,
    state: SharedState,
}

impl ExtendsHelper {
    /// Render the layout source against a copy of the current data with
    /// `layout.filename` inserted. Non-object data is passed through
    /// unannotated.
    fn render_layout(
        &self,
        r: &Handlebars<'_>,
        ctx: &Context,
        name: &str,
        contents: &str,
    ) -> Result<String, RenderError> {
        let mut data = ctx.data().clone();
        if let Some(object) = data.as_object_mut() {
            object.insert(
                "layout".to_string(),
                json!({ "filename": LayoutLoader::filename(name) }),
            );
        }
        let layout_ctx = Context::wraps(data)?;
        r.render_template_with_context(contents, &layout_ctx)
    }
}

impl HelperDef for ExtendsHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let name = match h.param(0) {
            Some(param) => param
                .value()
                .as_str()
                .ok_or_else(|| {
                    RenderErrorReason::Other("extends: layout name must be a string".to_string())
                })?
                .to_string(),
            None => DEFAULT_LAYOUT.to_string(),
        };

        // Loader failures abort before any state changes.
        let contents = self
            .loader
            .resolve(&name)
            .map_err(|err| RenderErrorReason::NestedError(Box::new(err)))?;

        log::debug!("extending layout '{name}'");

        // Evaluate the child body in collection mode; its own output is
        // discarded, only the pushed block contributions matter. The
        // previous flag is restored so nested `extends` activations
        // (chained inheritance) unwind correctly.
        let previous = self.state.with(|state| state.begin_extends());
        let body = match h.template() {
            Some(t) => t.renders(r, ctx, rc).map(|_| ()),
            None => Ok(()),
        };
        self.state.with(|state| state.end_collect(previous));

        let rendered = match body {
            Ok(()) => self.render_layout(r, ctx, &name, &contents),
            Err(err) => Err(err),
        };
        // Always unwind the activation so residual stacks are cleared at
        // the outermost level, render error or not.
        self.state.with(|state| state.finish_extends());

        out.write(&rendered?)?;
        Ok(())
    }
}

/// The `{{#block "name"}} ... {{/block}}` helper, also serving `append`
/// and `prepend` with a forced merge mode.
///
/// Always pushes its body as a contribution for the named block. On the
/// child side (under `extends`) that is all it does; on the layout side it
/// immediately drains the stack, so the layout's own body acts as the
/// default content that child contributions replace or accumulate around.
pub struct BlockHelper {
    helper_name: &'static str,
    state: SharedState,
    forced_mode: Option<MergeMode>,
}

impl BlockHelper {
    fn named(
        helper_name: &'static str,
        state: SharedState,
        forced_mode: Option<MergeMode>,
    ) -> Self {
        Self {
            helper_name,
            state,
            forced_mode,
        }
    }

    /// The merge mode for one invocation: the forced mode for `append`/
    /// `prepend`, else a validated `mode` hash, else `Replace`.
    fn merge_mode(&self, h: &Helper<'_>) -> Result<MergeMode, RenderError> {
        if let Some(mode) = self.forced_mode {
            return Ok(mode);
        }
        match h.hash_get("mode") {
            Some(value) => {
                let raw = value.value().as_str().ok_or_else(|| {
                    RenderErrorReason::Other(format!(
                        "{}: mode hash must be a string",
                        self.helper_name
                    ))
                })?;
                MergeMode::parse(raw).ok_or_else(|| {
                    RenderErrorReason::Other(format!(
                        "{}: unknown merge mode '{raw}'",
                        self.helper_name
                    ))
                    .into()
                })
            }
            None => Ok(MergeMode::Replace),
        }
    }
}

impl HelperDef for BlockHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let name = h
            .param(0)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex(self.helper_name, 0))?
            .value()
            .as_str()
            .ok_or_else(|| {
                RenderErrorReason::Other(format!(
                    "{}: block name must be a string",
                    self.helper_name
                ))
            })?
            .to_string();

        let mode = self.merge_mode(h)?;

        // Render the body before taking the lock: a nested block inside
        // the body takes the same lock.
        let content = match h.template() {
            Some(t) => t.renders(r, ctx, rc)?,
            None => String::new(),
        };

        let flushed = self.state.with(|state| {
            state.push(&name, Contribution { content, mode });
            if state.is_collecting() {
                None
            } else {
                Some(state.resolve(&name))
            }
        });

        match flushed {
            // Child side: flushing is deferred to the layout's own pass.
            // The marker keeps this block's position inside an enclosing
            // block body; at the top level of the child it lands in output
            // that `extends` discards.
            None => out.write(&blocks::marker(&name))?,
            Some(folded) => {
                log::debug!("flushed block '{name}'");
                out.write(&folded)?;
            }
        }
        Ok(())
    }
}

/// Register the `extends`, `block`, `append` and `prepend` helpers with a
/// host registry, resolving layouts through the given loader.
///
/// Each registration gets its own block-resolution state, shared by the
/// four helpers it installs.
pub fn register(hb: &mut Handlebars<'_>, loader: LayoutLoader) {
    let loader = Arc::new(loader);
    let state = SharedState::new();
    hb.register_helper(
        "extends",
        Box::new(ExtendsHelper {
            loader,
            state: state.clone(),
        }),
    );
    hb.register_helper(
        "block",
        Box::new(BlockHelper::named("block", state.clone(), None)),
    );
    hb.register_helper(
        "append",
        Box::new(BlockHelper::named("append", state.clone(), Some(MergeMode::Append))),
    );
    hb.register_helper(
        "prepend",
        Box::new(BlockHelper::named("prepend", state, Some(MergeMode::Prepend))),
    );
}
