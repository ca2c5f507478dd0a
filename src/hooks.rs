//! Layout hooks.
//!
//! A hook may rewrite a theme layout before any component is placed
//! (`transform_layout`) and the finished page before it is written
//! (`post_process`). Hooks come from two places:
//!
//! - registered in code with [`HookRegistry::register`], keyed by layout name;
//! - a `<layout>.hook.toml` file next to the layout in the theme:
//!
//! ```toml
//! [[layout]]
//! find = '<div id="legacy-banner">.*?</div>'
//! replace = ""
//!
//! [[page]]
//! find = '</body>'
//! replace = '<script src="/extra.js"></script></body>'
//! ```
//!
//! `find` is a regular expression; `replace` may use `$1`-style groups.
//! Files are validated (every pattern must compile) when first loaded, and
//! looked up at most once per layout name.

use crate::types::Device;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub const HOOK_SUFFIX: &str = ".hook.toml";

#[derive(Error, Debug)]
pub enum HookError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid hook file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid pattern in {path}: {source}")]
    Pattern { path: PathBuf, source: regex::Error },
}

/// Facts a hook may use to decide what to do.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub page_id: &'a str,
    pub layout: &'a str,
    pub locale: &'a str,
    pub device: Device,
}

pub trait LayoutHook: Send + Sync {
    fn transform_layout(&self, layout: String, _ctx: &HookContext<'_>) -> String {
        layout
    }

    fn post_process(&self, page: String, _ctx: &HookContext<'_>) -> String {
        page
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSpec {
    find: String,
    #[serde(default)]
    replace: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct HookFile {
    #[serde(default)]
    layout: Vec<RuleSpec>,
    #[serde(default)]
    page: Vec<RuleSpec>,
}

#[derive(Debug)]
struct Rule {
    find: Regex,
    replace: String,
}

fn apply(rules: &[Rule], text: String) -> String {
    rules.iter().fold(text, |text, rule| {
        rule.find.replace_all(&text, rule.replace.as_str()).into_owned()
    })
}

/// Find/replace rules loaded from a `.hook.toml` file.
#[derive(Debug)]
pub struct FileHook {
    layout: Vec<Rule>,
    page: Vec<Rule>,
}

impl FileHook {
    pub async fn load(path: &Path) -> Result<Self, HookError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| HookError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, HookError> {
        let file: HookFile = toml::from_str(text).map_err(|source| HookError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        let compile = |specs: Vec<RuleSpec>| -> Result<Vec<Rule>, HookError> {
            specs
                .into_iter()
                .map(|spec| {
                    Ok(Rule {
                        find: Regex::new(&format!("(?s){}", spec.find)).map_err(|source| {
                            HookError::Pattern {
                                path: path.to_path_buf(),
                                source,
                            }
                        })?,
                        replace: spec.replace,
                    })
                })
                .collect()
        };
        Ok(Self {
            layout: compile(file.layout)?,
            page: compile(file.page)?,
        })
    }
}

impl LayoutHook for FileHook {
    fn transform_layout(&self, layout: String, _ctx: &HookContext<'_>) -> String {
        apply(&self.layout, layout)
    }

    fn post_process(&self, page: String, _ctx: &HookContext<'_>) -> String {
        apply(&self.page, page)
    }
}

/// Hooks per layout name.
pub struct HookRegistry {
    layouts_folder: PathBuf,
    registered: HashMap<String, Arc<dyn LayoutHook>>,
    loaded: Mutex<HashMap<String, Option<Arc<dyn LayoutHook>>>>,
}

impl HookRegistry {
    pub fn new(layouts_folder: impl Into<PathBuf>) -> Self {
        Self {
            layouts_folder: layouts_folder.into(),
            registered: HashMap::new(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Install a hook for `layout`. Takes precedence over a hook file.
    pub fn register(&mut self, layout: &str, hook: Arc<dyn LayoutHook>) {
        self.registered.insert(layout.to_string(), hook);
    }

    /// Hook for `layout`, if any.
    pub async fn hook_for(&self, layout: &str) -> Result<Option<Arc<dyn LayoutHook>>, HookError> {
        if let Some(hook) = self.registered.get(layout) {
            return Ok(Some(Arc::clone(hook)));
        }
        if let Some(cached) = self.loaded.lock().ok().and_then(|l| l.get(layout).cloned()) {
            return Ok(cached);
        }
        let path = self.layouts_folder.join(format!("{layout}{HOOK_SUFFIX}"));
        let hook: Option<Arc<dyn LayoutHook>> = if tokio::fs::try_exists(&path).await.unwrap_or(false)
        {
            Some(Arc::new(FileHook::load(&path).await?))
        } else {
            None
        };
        if let Ok(mut loaded) = self.loaded.lock() {
            loaded.insert(layout.to_string(), hook.clone());
        }
        Ok(hook)
    }
}
