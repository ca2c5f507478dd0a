//! `scs-contentitem`: one content item rendered through its layout.
//!
//! An instance without a `contentId` is a placeholder. On a detail page it
//! is bound to the page's item; elsewhere it is left for the runtime.

use super::{CompileOutput, ComponentCompiler, ComponentError};
use crate::content_layout::ContentRef;
use crate::context::CompileContext;
use crate::merge::value_to_text;
use crate::types::ComponentInstance;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ContentItemData {
    content_id: String,
    content_layout_category: Option<String>,
    detail_page_id: Option<Value>,
}

pub struct ContentItemComponent;

#[async_trait]
impl ComponentCompiler for ContentItemComponent {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        let data: ContentItemData = serde_json::from_value(instance.data.clone())?;
        let reference = ContentRef {
            id: data.content_id.clone(),
            category: data.content_layout_category,
            detail_page_id: data.detail_page_id.as_ref().map(value_to_text),
        };
        if !data.content_id.is_empty() {
            return Ok(ctx.items.render(&reference, None, ctx).await);
        }
        match ctx.detail_item {
            Some(item) => {
                let reference = ContentRef {
                    id: item.id.clone(),
                    ..reference
                };
                Ok(ctx.items.render(&reference, Some(item), ctx).await)
            }
            None => {
                ctx.reporter.info(format!(
                    "content item {} is unbound, rendered at runtime",
                    instance.id
                ));
                Ok(CompileOutput::deferred())
            }
        }
    }
}
