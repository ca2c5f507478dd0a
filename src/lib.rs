//! # Site Compiler
//!
//! An ahead-of-time compiler for declarative site exports. A site export
//! describes pages as data: a navigation tree, per-page models naming a
//! theme layout, slots, and component instances. The compiler turns that
//! into static HTML so pages render without a client-side runtime, leaving
//! only the components that genuinely need one for hydration.
//!
//! # Architecture
//!
//! ```text
//! SiteCompiler         for each device × locale
//!   └─ PageCompiler    Init → LayoutLoaded → PreFilled → ComponentsCompiled
//!        │                  → SlotsResolved → TokensResolved
//!        │                  → RenderInfoInjected → Written
//!        ├─ ComponentRegistry → ComponentCompiler per kind
//!        │     └─ ContentItemResolver → ContentClient
//!        ├─ tag_editor (locate elements by id, splice markup)
//!        └─ tokens     (name tokens, links, macros, render info)
//! ```
//!
//! Everything runs strictly one unit at a time: one page, one component, one
//! content request. Failures below the site level never stop the run; they
//! are recorded by the [`reporter::Reporter`], and the run passes iff no
//! error was recorded.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `compile.toml` overrides and the immutable [`config::JobConfig`] |
//! | [`merge`] | JSON deep merge used by every locale overlay |
//! | [`types`] | Export data model (`PageNode`, `PageModel`, `ContentItem`, ...) |
//! | [`reporter`] | Leveled, page-scoped run report |
//! | [`tag_editor`] | Regex-based element lookup and splicing |
//! | [`tokens`] | Token and macro resolution |
//! | [`template`] | `{{field}}` renderer for file-based components and layouts |
//! | [`structure`] | Per-locale structure and site info resolution |
//! | [`content`] | Content-store capability and the local-export client |
//! | [`content_layout`] | Content item rendering and detail-page requests |
//! | [`context`] | Per-locale and per-page compile context |
//! | [`components`] | Component registry and built-in compilers |
//! | [`hooks`] | Per-layout transform hooks |
//! | [`page`] | Single-page state machine |
//! | [`site`] | Site driver |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## A Tag Scanner, Not a Parser
//!
//! Theme layouts and component fragments are frequently partial or
//! malformed. The [`tag_editor`] locates elements by id with regular
//! expressions and a depth count, so it edits what a strict parser would
//! reject and leaves everything it does not touch byte-for-byte intact.
//!
//! ## Maud for Built-in Markup
//!
//! Built-in components render with [Maud](https://maud.lambda.xyz/): every
//! interpolation is escaped unless it is explicitly `PreEscaped`, which keeps
//! untrusted component data out of the markup structure. File-based
//! components use the small [`template`] renderer, which escapes by default
//! in the same way.
//!
//! ## Capabilities Are Injected
//!
//! The content store ([`content::ContentClient`]), component compilers
//! ([`components::ComponentCompiler`]), content layouts
//! ([`content_layout::ContentLayout`]) and layout hooks
//! ([`hooks::LayoutHook`]) are traits. The binary wires in local
//! implementations; tests wire in recording doubles.

pub mod components;
pub mod config;
pub mod content;
pub mod content_layout;
pub mod context;
pub mod hooks;
pub mod merge;
pub mod output;
pub mod page;
pub mod reporter;
pub mod site;
pub mod structure;
pub mod tag_editor;
pub mod template;
pub mod tokens;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
