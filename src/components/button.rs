//! `scs-button`: a styled link.
//!
//! Link targets are emitted as macros so they resolve with the rest of the
//! page's links:
//!
//! | `linkType` | Target |
//! |------------|--------|
//! | `no-link` | none (hydrated so the runtime can attach actions) |
//! | `scs-link-page` | `SCS_PAGE` macro over `linkPageId` |
//! | `scs-link-file` | `SCS_DIGITAL_ASSET` macro over `linkFileId` |
//! | `scs-link-tel` | `SCS_TEL` macro over `linkUrl` |
//! | `scs-link-url` / anything else | `linkUrl`, URL-encoded |

use super::style::{CommonStyle, encode_url};
use super::{CompileOutput, ComponentCompiler, ComponentError};
use crate::context::CompileContext;
use crate::types::ComponentInstance;
use async_trait::async_trait;
use maud::html;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ButtonData {
    text: String,
    link_type: String,
    link_url: String,
    link_page_id: Option<Value>,
    link_file_id: String,
    link_target: String,
    font_color: Option<String>,
    background_color: Option<String>,
    #[serde(flatten)]
    style: CommonStyle,
}

/// Resolved `href` of a link-bearing component, or `None` for no link.
pub(crate) fn link_href(
    link_type: &str,
    url: &str,
    page_id: Option<&Value>,
    file_id: &str,
) -> Option<String> {
    match link_type {
        "no-link" | "" if url.is_empty() => None,
        "no-link" => None,
        "scs-link-page" => {
            let id = page_id.map(crate::merge::value_to_text)?;
            Some(format!("[!--$SCS_PAGE--]{id}[/!--$SCS_PAGE--]"))
        }
        "scs-link-file" => (!file_id.is_empty())
            .then(|| format!("[!--$SCS_DIGITAL_ASSET--]{file_id}[/!--$SCS_DIGITAL_ASSET--]")),
        "scs-link-tel" => Some(format!("[!--$SCS_TEL--]{url}[/!--$SCS_TEL--]")),
        _ => {
            let encoded = encode_url(url);
            (!encoded.is_empty()).then_some(encoded)
        }
    }
}

pub struct Button;

#[async_trait]
impl ComponentCompiler for Button {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        _ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        let data: ButtonData = serde_json::from_value(instance.data.clone())?;
        let href = link_href(
            &data.link_type,
            &data.link_url,
            data.link_page_id.as_ref(),
            &data.link_file_id,
        );

        let mut button_css = data.style.box_css();
        if let Some(color) = data.font_color.as_deref().filter(|c| !c.is_empty()) {
            button_css.push_str(&format!("color:{};", super::style::encode_css(color)));
        }
        if let Some(color) = data.background_color.as_deref().filter(|c| !c.is_empty()) {
            button_css.push_str(&format!(
                "background-color:{};",
                super::style::encode_css(color)
            ));
        }
        let class = format!("scs-button-button{}", data.style.class_suffix());
        let target = (!data.link_target.is_empty()).then_some(data.link_target.as_str());
        let hydrate = href.is_none();

        let markup = html! {
            div.scs-button.scs-component-container style=(data.style.alignment_css()) {
                a class=(class) href=[href] target=[target] style=(button_css) {
                    span.scs-button-text { (data.text) }
                }
            }
        };
        Ok(CompileOutput {
            content: markup.into_string(),
            hydrate,
            ..CompileOutput::default()
        })
    }
}
