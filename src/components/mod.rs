//! Component compilers.
//!
//! Every placed component has a kind (`scs-button`, `scs-sectionlayout`,
//! ...). The [`ComponentRegistry`] maps each kind to a [`ComponentCompiler`]
//! and a `can_nest` flag. Unknown kinds are left for client-side rendering.
//!
//! ## Kinds
//!
//! | Kind | Module | Notes |
//! |------|--------|-------|
//! | `scs-title`, `scs-paragraph`, `scs-image`, `scs-divider`, `scs-spacer` | [`basic`] | |
//! | `scs-button` | [`button`] | exemplar of the shared style helpers |
//! | `scs-sectionlayout`, `scs-componentgroup` | [`container`] | return child ids |
//! | `scs-contentitem` | [`content_item`] | delegates to the content-item resolver |
//! | `scs-contentlist` | [`content_list`] | one query, then the resolver per item |
//! | `scs-component` | [`custom`] | file-based components from the components folder |
//!
//! Compilers never fail the page: [`compile_instance`] turns any error into
//! an empty fragment plus a reported error.

pub mod basic;
pub mod button;
pub mod container;
pub mod content_item;
pub mod content_list;
pub mod custom;
pub mod style;

use crate::content::ContentError;
use crate::context::CompileContext;
use crate::types::{ComponentInstance, Device};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use style::CommonStyle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Content error: {0}")]
    Content(#[from] ContentError),
    #[error("Invalid component data: {0}")]
    InvalidData(String),
    #[error("Invalid manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },
    #[error("Setup of component '{name}' failed: {message}")]
    Setup { name: String, message: String },
    #[error("No content client configured")]
    NoContentClient,
}

/// Result of compiling one component instance.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    /// Markup; empty means "render on the client".
    pub content: String,
    /// The component needs client-side activation.
    pub hydrate: bool,
    /// Direct children to compile and splice into `content` by id.
    pub child_ids: Vec<String>,
    /// Instances declared inline by the component's own content.
    pub nested: Vec<ComponentInstance>,
    /// CSS to emit under a selector scoped to this component.
    pub styles: Option<String>,
    /// Splice without the bounding-box wrapper.
    pub omit_bounding_box: bool,
}

impl CompileOutput {
    pub fn markup(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn hydrated(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            hydrate: true,
            ..Self::default()
        }
    }

    /// Nothing compiled; the client runtime renders the component.
    pub fn deferred() -> Self {
        Self::default()
    }
}

/// Compiles one component kind.
#[async_trait]
pub trait ComponentCompiler: Send + Sync {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError>;

    /// Whether the instance is compiled at all for `device`.
    fn can_compile(&self, instance: &ComponentInstance, device: Device) -> bool {
        CommonStyle::from_data(&instance.data).can_compile(device)
    }
}

struct Entry {
    compiler: Arc<dyn ComponentCompiler>,
    can_nest: bool,
}

/// Kind → compiler table.
pub struct ComponentRegistry {
    entries: BTreeMap<String, Entry>,
}

impl ComponentRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registry with every built-in kind. File-based components are loaded
    /// from `components_folder`.
    pub fn with_builtins(components_folder: impl Into<PathBuf>) -> Self {
        let mut registry = Self::empty();
        registry.register("scs-title", Arc::new(basic::Title), true);
        registry.register("scs-paragraph", Arc::new(basic::Paragraph), true);
        registry.register("scs-image", Arc::new(basic::Image), true);
        registry.register("scs-divider", Arc::new(basic::Divider), true);
        registry.register("scs-spacer", Arc::new(basic::Spacer), true);
        registry.register("scs-button", Arc::new(button::Button), true);
        registry.register("scs-sectionlayout", Arc::new(container::SectionLayout), true);
        registry.register("scs-componentgroup", Arc::new(container::ComponentGroup), true);
        registry.register("scs-contentitem", Arc::new(content_item::ContentItemComponent), true);
        registry.register("scs-contentlist", Arc::new(content_list::ContentList), false);
        registry.register(
            custom::KIND,
            Arc::new(custom::CustomComponents::new(components_folder)),
            false,
        );
        registry
    }

    /// Add or replace the compiler for `kind`.
    pub fn register(&mut self, kind: &str, compiler: Arc<dyn ComponentCompiler>, can_nest: bool) {
        self.entries
            .insert(kind.to_string(), Entry { compiler, can_nest });
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn ComponentCompiler>> {
        self.entries.get(kind).map(|e| Arc::clone(&e.compiler))
    }

    pub fn can_nest(&self, kind: &str) -> bool {
        self.entries.get(kind).is_some_and(|e| e.can_nest)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Compile one instance, degrading every failure to an empty fragment.
///
/// Returns `None` when the instance is hidden for the current device.
pub async fn compile_instance(
    instance: &ComponentInstance,
    ctx: &CompileContext<'_>,
) -> Option<CompileOutput> {
    let Some(compiler) = ctx.components.get(&instance.kind) else {
        ctx.reporter.info(format!(
            "component {} of kind '{}' has no compiler, rendered at runtime",
            instance.id, instance.kind
        ));
        return Some(CompileOutput::deferred());
    };
    if !compiler.can_compile(instance, ctx.device()) {
        ctx.reporter.debug(format!(
            "component {} hidden on {}",
            instance.id,
            ctx.device()
        ));
        return None;
    }
    match compiler.compile(instance, ctx).await {
        Ok(output) => Some(output),
        Err(e) => {
            ctx.reporter.error_with(
                format!("failed to compile component {} ({})", instance.id, instance.kind),
                &e,
            );
            Some(CompileOutput::deferred())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::PageHarness;
    use serde_json::json;

    struct Failing;

    #[async_trait]
    impl ComponentCompiler for Failing {
        async fn compile(
            &self,
            _instance: &ComponentInstance,
            _ctx: &CompileContext<'_>,
        ) -> Result<CompileOutput, ComponentError> {
            Err(ComponentError::InvalidData("boom".into()))
        }
    }

    #[test]
    fn builtins_registered_with_nest_flags() {
        let registry = ComponentRegistry::with_builtins("components");
        assert!(registry.get("scs-button").is_some());
        assert!(registry.can_nest("scs-title"));
        assert!(!registry.can_nest("scs-contentlist"));
        assert!(!registry.can_nest("scs-unknown"));
        assert!(registry.kinds().any(|k| k == custom::KIND));
    }

    #[tokio::test]
    async fn failing_compiler_degrades_to_empty_fragment() {
        let mut harness = PageHarness::new();
        harness.registry.register("x-fail", Arc::new(Failing), true);
        let instance = ComponentInstance {
            id: "c1".into(),
            kind: "x-fail".into(),
            data: json!({}),
        };
        let output = compile_instance(&instance, &harness.context()).await.unwrap();
        assert_eq!(output.content, "");
        assert!(harness.reporter.has_errors());
    }

    #[tokio::test]
    async fn hidden_instance_is_skipped() {
        let harness = PageHarness::new();
        let instance = ComponentInstance {
            id: "t".into(),
            kind: "scs-title".into(),
            data: json!({"text": "x", "visibleOnDesktop": false}),
        };
        let output = compile_instance(&instance, &harness.context()).await;
        assert!(output.is_none());
    }

    #[tokio::test]
    async fn unknown_kind_is_deferred() {
        let harness = PageHarness::new();
        let instance = ComponentInstance {
            id: "u".into(),
            kind: "scs-gallery".into(),
            data: json!({}),
        };
        let output = compile_instance(&instance, &harness.context()).await.unwrap();
        assert_eq!(output.content, "");
        assert!(!harness.reporter.has_errors());
    }
}
