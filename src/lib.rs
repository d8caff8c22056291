//! Layout inheritance helpers for Handlebars templates
//!
//! This library adds "extends a layout" and named, overridable content
//! block semantics on top of the [`handlebars`] crate. A child template
//! wraps its block declarations in `{{#extends "name"}}`; the named layout
//! is loaded from disk, and its own `{{#block}}` placeholders are replaced
//! by (or merged with) the child's declarations.
//!
//! # Example
//!
//! ```rust
//! use handlebars::Handlebars;
//! use hbs_inherit::{register, LayoutLoader};
//!
//! let dir = tempfile::tempdir()?;
//! std::fs::write(
//!     dir.path().join("main.hbs"),
//!     "<title>{{#block \"title\"}}Untitled{{/block}}</title>",
//! )?;
//!
//! let mut hb = Handlebars::new();
//! register(&mut hb, LayoutLoader::new(dir.path()));
//!
//! let html = hb.render_template(
//!     r#"{{#extends "main"}}{{#block "title"}}Home{{/block}}{{/extends}}"#,
//!     &serde_json::json!({}),
//! )?;
//! assert_eq!(html, "<title>Home</title>");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Template-facing surface:
//!
//! - `{{#extends "layoutName"}} ...block declarations... {{/extends}}`
//! - `{{#block "name"}}default content{{/block}}`
//! - `{{#append "name"}}...{{/append}}`, `{{#prepend "name"}}...{{/prepend}}`
//!
//! Layouts live as `<name>.hbs` files in a configured directory and may be
//! cached for a time window (see [`LayoutLoader`]); in production mode
//! (`HBS_INHERIT_ENV=production`) caching defaults to one day, elsewhere it
//! is off unless `HBS_INHERIT_CACHE` (seconds) says otherwise.

pub mod blocks;
pub mod error;
pub mod helpers;
pub mod loader;

pub use blocks::MergeMode;
pub use error::LayoutError;
pub use helpers::register;
pub use loader::{LayoutLoader, CACHE_ENV, MODE_ENV};
