//! Leaf components: title, paragraph, image, divider and spacer.

use super::button::link_href;
use super::style::{CommonStyle, css_length, encode_url};
use super::{CompileOutput, ComponentCompiler, ComponentError};
use crate::context::CompileContext;
use crate::types::ComponentInstance;
use async_trait::async_trait;
use maud::{PreEscaped, html};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<\s*(?:script|style|iframe|object|embed)\b.*?(?:</\s*(?:script|style|iframe|object|embed)\s*>|$)",
    )
    .expect("valid regex")
});

static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).expect("valid regex")
});

static SCRIPT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(href|src)\s*=\s*(["']?)\s*(?:javascript|vbscript):[^"'\s>]*"#)
        .expect("valid regex")
});

/// Rich text authored in the editor, with active content removed.
pub fn sanitize_rich_text(text: &str) -> String {
    let out = SCRIPT_BLOCK.replace_all(text, "");
    let out = EVENT_HANDLER.replace_all(&out, "");
    SCRIPT_URL.replace_all(&out, "$1=$2").into_owned()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TextData {
    text: String,
    #[serde(flatten)]
    style: CommonStyle,
}

fn text_block(kind: &str, data: &Value) -> Result<CompileOutput, ComponentError> {
    let data: TextData = serde_json::from_value(data.clone())?;
    let container = format!("scs-{kind} scs-component-container");
    let inner = format!("scs-{kind}-text{}", data.style.class_suffix());
    let css = format!("{}{}", data.style.alignment_css(), data.style.box_css());
    let markup = html! {
        div class=(container) {
            div class=(inner) style=(css) { (PreEscaped(sanitize_rich_text(&data.text))) }
        }
    };
    Ok(CompileOutput::markup(markup.into_string()))
}

pub struct Title;

#[async_trait]
impl ComponentCompiler for Title {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        _ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        text_block("title", &instance.data)
    }
}

pub struct Paragraph;

#[async_trait]
impl ComponentCompiler for Paragraph {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        _ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        text_block("paragraph", &instance.data)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ImageData {
    image_url: String,
    content_id: String,
    rendition: String,
    alt_text: String,
    title: String,
    caption: String,
    link_type: String,
    link_url: String,
    link_page_id: Option<Value>,
    link_file_id: String,
    link_target: String,
    #[serde(flatten)]
    style: CommonStyle,
}

pub struct Image;

#[async_trait]
impl ComponentCompiler for Image {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        let data: ImageData = serde_json::from_value(instance.data.clone())?;
        let src = if !data.content_id.is_empty() {
            let argument = if data.rendition.is_empty() {
                data.content_id.clone()
            } else {
                format!("{},{}", data.content_id, data.rendition)
            };
            format!("[!--$SCS_DIGITAL_ASSET_PUBLISHED--]{argument}[/!--$SCS_DIGITAL_ASSET_PUBLISHED--]")
        } else {
            encode_url(&data.image_url)
        };
        if src.is_empty() {
            ctx.reporter
                .warn(format!("image {} has no source, rendered at runtime", instance.id));
            return Ok(CompileOutput::deferred());
        }

        let href = link_href(
            &data.link_type,
            &data.link_url,
            data.link_page_id.as_ref(),
            &data.link_file_id,
        );
        let target = (!data.link_target.is_empty()).then_some(data.link_target.as_str());
        let title = (!data.title.is_empty()).then_some(data.title.as_str());
        let class = format!("scs-image-image{}", data.style.class_suffix());

        let markup = html! {
            div.scs-image.scs-component-container style=(data.style.alignment_css()) {
                figure.scs-image-container style=(data.style.margin_css()) {
                    @if let Some(href) = &href {
                        a href=(href) target=[target] {
                            img class=(class) src=(src) alt=(data.alt_text) title=[title]
                                style=(format!("{}{}", data.style.width_css(), data.style.border_css()));
                        }
                    } @else {
                        img class=(class) src=(src) alt=(data.alt_text) title=[title]
                            style=(format!("{}{}", data.style.width_css(), data.style.border_css()));
                    }
                    @if !data.caption.is_empty() {
                        figcaption.scs-image-caption { (PreEscaped(sanitize_rich_text(&data.caption))) }
                    }
                }
            }
        };
        Ok(CompileOutput::markup(markup.into_string()))
    }
}

pub struct Divider;

#[async_trait]
impl ComponentCompiler for Divider {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        _ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        let style = CommonStyle::from_data(&instance.data);
        let class = format!("scs-divider-styles{}", style.class_suffix());
        let markup = html! {
            div.scs-divider.scs-component-container {
                hr class=(class) style=(style.box_css());
            }
        };
        Ok(CompileOutput::markup(markup.into_string()))
    }
}

pub struct Spacer;

#[async_trait]
impl ComponentCompiler for Spacer {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        _ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        let height = instance
            .data
            .get("height")
            .and_then(css_length)
            .unwrap_or_else(|| "20px".to_string());
        let markup = html! {
            div.scs-spacer.scs-component-container style=(format!("height:{height};")) {}
        };
        Ok(CompileOutput::markup(markup.into_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::PageHarness;
    use serde_json::json;

    async fn compile(compiler: &dyn ComponentCompiler, data: Value) -> CompileOutput {
        let harness = PageHarness::new();
        let instance = ComponentInstance {
            id: "c1".into(),
            kind: "test".into(),
            data,
        };
        compiler
            .compile(&instance, &harness.context())
            .await
            .unwrap()
    }

    #[test]
    fn sanitizer_removes_active_content() {
        let dirty = r#"<p onclick="x()">Hi<script>alert(1)</script> <a href="javascript:evil()">l</a></p>"#;
        let clean = sanitize_rich_text(dirty);
        assert!(!clean.contains("script"));
        assert!(!clean.contains("onclick"));
        assert!(!clean.contains("javascript"));
        assert!(clean.contains("<p>Hi"));
    }

    #[tokio::test]
    async fn title_keeps_rich_text() {
        let output = compile(&Title, json!({"text": "<b>Welcome</b>", "alignment": "center"})).await;
        assert!(output.content.contains("<b>Welcome</b>"));
        assert!(output.content.contains("scs-title-text"));
        assert!(output.content.contains("text-align:center;"));
        assert!(!output.hydrate);
    }

    #[tokio::test]
    async fn image_from_asset_uses_macro() {
        let output = compile(
            &Image,
            json!({"contentId": "DA1", "rendition": "Medium", "altText": "A \"cat\""}),
        )
        .await;
        assert!(output.content.contains(
            "[!--$SCS_DIGITAL_ASSET_PUBLISHED--]DA1,Medium[/!--$SCS_DIGITAL_ASSET_PUBLISHED--]"
        ));
        assert!(output.content.contains(r#"alt="A &quot;cat&quot;""#));
    }

    #[tokio::test]
    async fn image_without_source_is_deferred() {
        let output = compile(&Image, json!({"imageUrl": "javascript:x"})).await;
        assert_eq!(output.content, "");
    }

    #[tokio::test]
    async fn spacer_height_defaults_to_pixels() {
        let output = compile(&Spacer, json!({"height": 40})).await;
        assert!(output.content.contains("height:40px;"));
    }

    #[tokio::test]
    async fn divider_applies_border() {
        let output = compile(&Divider, json!({"borderStyle": "dashed", "borderWidth": "2"})).await;
        assert!(output.content.contains("border-style:dashed;border-width:2px;"));
    }
}
