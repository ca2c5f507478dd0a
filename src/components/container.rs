//! Containers: section layouts and component groups.
//!
//! Containers render a frame holding one empty placeholder element per
//! child (`<div id="child"></div>`) and report the child ids. The page
//! compiler compiles each child and splices it into its placeholder.

use super::style::CommonStyle;
use super::{CompileOutput, ComponentCompiler, ComponentError};
use crate::context::CompileContext;
use crate::tag_editor::outer_element_ids;
use crate::types::ComponentInstance;
use async_trait::async_trait;
use maud::{Markup, PreEscaped, html};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ContainerData {
    component_factory: String,
    components: Vec<Value>,
    grid: Option<String>,
    custom_settings_data: Value,
    styles: Option<String>,
    #[serde(flatten)]
    style: CommonStyle,
}

impl ContainerData {
    fn child_ids(&self) -> Vec<String> {
        match &self.grid {
            Some(grid) if !grid.trim().is_empty() => outer_element_ids(grid),
            _ => self
                .components
                .iter()
                .map(crate::merge::value_to_text)
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }

    fn styles(&self) -> Option<String> {
        self.styles.clone().filter(|s| !s.trim().is_empty())
    }
}

fn placeholder(id: &str) -> Markup {
    html! { div id=(id) {} }
}

/// Section layout arrangement named by `componentFactory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arrangement {
    Horizontal,
    Vertical,
    Columns(usize),
    /// Tabs, sliders: panels are rendered, switching needs the runtime.
    Interactive,
}

impl Arrangement {
    fn from_factory(factory: &str, settings: &Value) -> Option<Self> {
        match factory {
            "scs-sl-horizontal" => Some(Self::Horizontal),
            "scs-sl-vertical" | "" => Some(Self::Vertical),
            "scs-sl-two-columns" => Some(Self::Columns(2)),
            "scs-sl-three-columns" => Some(Self::Columns(3)),
            "scs-sl-columns" => {
                let n = settings
                    .get("columns")
                    .and_then(Value::as_u64)
                    .unwrap_or(2)
                    .clamp(1, 12);
                Some(Self::Columns(n as usize))
            }
            "scs-sl-tabs" | "scs-sl-slider" => Some(Self::Interactive),
            _ => None,
        }
    }
}

pub struct SectionLayout;

#[async_trait]
impl ComponentCompiler for SectionLayout {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        let data: ContainerData = serde_json::from_value(instance.data.clone())?;
        let Some(arrangement) =
            Arrangement::from_factory(&data.component_factory, &data.custom_settings_data)
        else {
            ctx.reporter.info(format!(
                "section layout {} uses '{}', rendered at runtime",
                instance.id, data.component_factory
            ));
            return Ok(CompileOutput::deferred());
        };
        let children = data.child_ids();
        let class = format!(
            "scs-sectionlayout {}{}",
            if data.component_factory.is_empty() {
                "scs-sl-vertical"
            } else {
                data.component_factory.as_str()
            },
            data.style.class_suffix()
        );
        let frame_css = data.style.box_css();

        let body = match arrangement {
            Arrangement::Horizontal => html! {
                div.scs-sl-row style="display:flex;flex-wrap:wrap;" {
                    @for child in &children {
                        div.scs-sl-cell style="flex:1 1 0;" { (placeholder(child)) }
                    }
                }
            },
            Arrangement::Vertical | Arrangement::Interactive => html! {
                @for child in &children {
                    div.scs-sl-cell { (placeholder(child)) }
                }
            },
            Arrangement::Columns(n) => {
                let width = format!("width:{:.4}%;", 100.0 / n as f64);
                html! {
                    div.scs-sl-row style="display:flex;" {
                        @for column in 0..n {
                            div.scs-sl-column style=(width) {
                                @for child in children.iter().skip(column).step_by(n) {
                                    (placeholder(child))
                                }
                            }
                        }
                    }
                }
            }
        };
        let markup = html! {
            div class=(class) style=(frame_css) { (body) }
        };
        Ok(CompileOutput {
            content: markup.into_string(),
            hydrate: arrangement == Arrangement::Interactive,
            child_ids: children,
            styles: data.styles(),
            ..CompileOutput::default()
        })
    }
}

pub struct ComponentGroup;

#[async_trait]
impl ComponentCompiler for ComponentGroup {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        _ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        let data: ContainerData = serde_json::from_value(instance.data.clone())?;
        let children = data.child_ids();
        let class = format!("scs-componentgroup{}", data.style.class_suffix());
        let inner = match &data.grid {
            Some(grid) if !grid.trim().is_empty() => PreEscaped(grid.clone()),
            _ => html! {
                @for child in &children { (placeholder(child)) }
            },
        };
        let markup = html! {
            div class=(class) style=(data.style.box_css()) { (inner) }
        };
        Ok(CompileOutput {
            content: markup.into_string(),
            child_ids: children,
            styles: data.styles(),
            ..CompileOutput::default()
        })
    }
}
