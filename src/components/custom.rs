//! `scs-component`: file-based components from the components folder.
//!
//! ```text
//! components/
//! └── weather/
//!     └── assets/
//!         ├── compile.json    # manifest, validated when first loaded
//!         ├── compile.html    # template rendered with the instance data
//!         └── compile.css     # optional, emitted scoped to the instance
//! ```
//!
//! ```json
//! { "template": "compile.html", "hydrate": true, "styles": "compile.css",
//!   "setup": ["npm", "ci"], "nestedComponents": "children" }
//! ```
//!
//! `setup` runs once per component name per run, in the component folder.
//! `nestedComponents` names a data key holding inline instances
//! (`[{id, type, data}]`); the page compiler compiles the nestable ones into
//! their placeholders.

use super::{CompileOutput, ComponentCompiler, ComponentError};
use crate::context::CompileContext;
use crate::template;
use crate::types::ComponentInstance;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::process::Command;

pub const KIND: &str = "scs-component";
pub const MANIFEST_FILE: &str = "compile.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Manifest {
    pub template: String,
    #[serde(default)]
    pub hydrate: bool,
    #[serde(default)]
    pub styles: Option<String>,
    #[serde(default)]
    pub setup: Vec<String>,
    #[serde(default)]
    pub nested_components: Option<String>,
}

/// A validated component ready to render.
#[derive(Debug)]
pub struct LoadedComponent {
    pub name: String,
    pub folder: PathBuf,
    pub manifest: Manifest,
    template: String,
    styles: Option<String>,
}

fn manifest_error(path: &Path, message: impl Into<String>) -> ComponentError {
    ComponentError::Manifest {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.starts_with('.')
}

impl LoadedComponent {
    /// Read and validate `<folder>/<name>/assets/compile.json`.
    pub async fn load(components_folder: &Path, name: &str) -> Result<Self, ComponentError> {
        let folder = components_folder.join(name);
        let assets = folder.join("assets");
        let manifest_path = assets.join(MANIFEST_FILE);
        if !valid_name(name) {
            return Err(manifest_error(&manifest_path, format!("invalid component name '{name}'")));
        }
        let text = tokio::fs::read_to_string(&manifest_path)
            .await
            .map_err(|e| manifest_error(&manifest_path, e.to_string()))?;
        let manifest: Manifest = serde_json::from_str(&text)
            .map_err(|e| manifest_error(&manifest_path, e.to_string()))?;

        if manifest.template.trim().is_empty() || manifest.template.contains("..") {
            return Err(manifest_error(&manifest_path, "template must name a file in assets/"));
        }
        if manifest
            .setup
            .first()
            .is_some_and(|program| program.trim().is_empty())
        {
            return Err(manifest_error(&manifest_path, "setup program is empty"));
        }
        let template = tokio::fs::read_to_string(assets.join(&manifest.template))
            .await
            .map_err(|e| {
                manifest_error(
                    &manifest_path,
                    format!("template {}: {e}", manifest.template),
                )
            })?;
        let styles = match &manifest.styles {
            Some(file) if file.contains("..") => {
                return Err(manifest_error(&manifest_path, "styles must name a file in assets/"));
            }
            Some(file) => Some(
                tokio::fs::read_to_string(assets.join(file))
                    .await
                    .map_err(|e| manifest_error(&manifest_path, format!("styles {file}: {e}")))?,
            ),
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            folder,
            manifest,
            template,
            styles,
        })
    }

    /// Instances listed under the manifest's nested-components key.
    fn nested_instances(&self, data: &Value) -> Vec<ComponentInstance> {
        let Some(key) = &self.manifest.nested_components else {
            return Vec::new();
        };
        data.get(key)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                    .filter(|instance: &ComponentInstance| !instance.id.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CustomData {
    component_name: String,
}

/// Loads, sets up and renders file-based components, once per name.
pub struct CustomComponents {
    folder: PathBuf,
    loaded: Mutex<HashMap<String, Arc<LoadedComponent>>>,
    setup: Mutex<HashMap<String, Result<(), String>>>,
}

impl CustomComponents {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            loaded: Mutex::new(HashMap::new()),
            setup: Mutex::new(HashMap::new()),
        }
    }

    async fn component(&self, name: &str) -> Result<Arc<LoadedComponent>, ComponentError> {
        if let Some(component) = self.loaded.lock().ok().and_then(|l| l.get(name).cloned()) {
            return Ok(component);
        }
        let component = Arc::new(LoadedComponent::load(&self.folder, name).await?);
        tracing::debug!(name, folder = %component.folder.display(), "loaded component");
        if let Ok(mut loaded) = self.loaded.lock() {
            loaded.insert(name.to_string(), Arc::clone(&component));
        }
        Ok(component)
    }

    /// Run the component's setup command unless it already ran this run.
    async fn ensure_setup(&self, component: &LoadedComponent) -> Result<(), ComponentError> {
        let Some((program, args)) = component.manifest.setup.split_first() else {
            return Ok(());
        };
        let previous = self
            .setup
            .lock()
            .ok()
            .and_then(|s| s.get(&component.name).cloned());
        let outcome = match previous {
            Some(outcome) => outcome,
            None => {
                tracing::info!(name = %component.name, program, "running component setup");
                let outcome = match Command::new(program)
                    .args(args)
                    .current_dir(&component.folder)
                    .output()
                    .await
                {
                    Ok(output) if output.status.success() => Ok(()),
                    Ok(output) => Err(format!(
                        "{} exited with {}: {}",
                        program,
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    )),
                    Err(e) => Err(format!("{program}: {e}")),
                };
                if let Ok(mut setup) = self.setup.lock() {
                    setup.insert(component.name.clone(), outcome.clone());
                }
                outcome
            }
        };
        outcome.map_err(|message| ComponentError::Setup {
            name: component.name.clone(),
            message,
        })
    }
}

#[async_trait]
impl ComponentCompiler for CustomComponents {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        _ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        let data: CustomData = serde_json::from_value(instance.data.clone())?;
        if data.component_name.is_empty() {
            return Err(ComponentError::InvalidData(
                "componentName is required".to_string(),
            ));
        }
        let component = self.component(&data.component_name).await?;
        self.ensure_setup(&component).await?;

        let mut model = instance.data.clone();
        if let Value::Object(map) = &mut model {
            map.insert("id".into(), json!(instance.id));
        }
        Ok(CompileOutput {
            content: template::render(&component.template, &model),
            hydrate: component.manifest.hydrate,
            nested: component.nested_instances(&instance.data),
            styles: component.styles.clone(),
            ..CompileOutput::default()
        })
    }
}
