//! `scs-contentlist`: a query rendered item by item.
//!
//! Exactly one query is issued. Its items are handed to the content-item
//! resolver preloaded, so no per-item fetch follows. Paginated lists depend
//! on the request URL and are left for the runtime.

use super::style::CommonStyle;
use super::{CompileOutput, ComponentCompiler, ComponentError};
use crate::content::ItemQuery;
use crate::content_layout::ContentRef;
use crate::context::CompileContext;
use crate::merge::value_to_text;
use crate::types::ComponentInstance;
use async_trait::async_trait;
use maud::{PreEscaped, html};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ContentListData {
    content_types: Vec<String>,
    query_string: String,
    max_results: Option<usize>,
    first_item: usize,
    sort_order: Option<String>,
    enable_pagination: bool,
    content_layout_category: Option<String>,
    detail_page_id: Option<Value>,
    #[serde(flatten)]
    style: CommonStyle,
}

/// `(type eq "A" or type eq "B") and (<extra>)`.
pub fn build_filter(types: &[String], extra: &str) -> String {
    let mut clauses = Vec::new();
    if !types.is_empty() {
        let types: Vec<String> = types
            .iter()
            .map(|t| format!("type eq \"{}\"", t.replace('"', "")))
            .collect();
        clauses.push(format!("({})", types.join(" or ")));
    }
    if !extra.trim().is_empty() {
        clauses.push(format!("({})", extra.trim()));
    }
    clauses.join(" and ")
}

pub struct ContentList;

#[async_trait]
impl ComponentCompiler for ContentList {
    async fn compile(
        &self,
        instance: &ComponentInstance,
        ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        let data: ContentListData = serde_json::from_value(instance.data.clone())?;
        if data.enable_pagination {
            ctx.reporter.info(format!(
                "content list {} is paginated, rendered at runtime",
                instance.id
            ));
            return Ok(CompileOutput::deferred());
        }
        let client = ctx.content.ok_or(ComponentError::NoContentClient)?;
        let query = ItemQuery {
            types: Vec::new(),
            search: build_filter(&data.content_types, &data.query_string),
            limit: Some(data.max_results.unwrap_or(DEFAULT_LIMIT)),
            offset: data.first_item,
            order_by: data.sort_order.clone().filter(|s| !s.is_empty()),
        };
        let result = client.query_items(&query).await?;
        ctx.reporter.debug(format!(
            "content list {} matched {} of {} items",
            instance.id,
            result.items.len(),
            result.total
        ));

        let detail_page_id = data.detail_page_id.as_ref().map(value_to_text);
        let mut rendered = Vec::with_capacity(result.items.len());
        for item in &result.items {
            ctx.page_items.insert(item.clone());
            let reference = ContentRef {
                id: item.id.clone(),
                category: data.content_layout_category.clone(),
                detail_page_id: detail_page_id.clone(),
            };
            let output = ctx.items.render(&reference, Some(item), ctx).await;
            rendered.push(output.content);
        }

        let class = format!("scs-contentlist{}", data.style.class_suffix());
        let markup = html! {
            div class=(class) style=(data.style.box_css()) {
                @for content in &rendered {
                    div.scs-item { (PreEscaped(content)) }
                }
            }
        };
        Ok(CompileOutput::markup(markup.into_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockContentClient, PageHarness};
    use crate::types::ContentItem;
    use serde_json::json;

    fn car(id: &str, name: &str) -> ContentItem {
        serde_json::from_value(json!({"id": id, "type": "Car", "name": name})).unwrap()
    }

    fn harness() -> PageHarness {
        PageHarness::new().with_client(
            MockContentClient::new()
                .with_item(car("C1", "Alpha"))
                .with_item(car("C2", "Beta")),
        )
    }

    fn instance(data: Value) -> ComponentInstance {
        ComponentInstance {
            id: "list".into(),
            kind: "scs-contentlist".into(),
            data,
        }
    }

    #[test]
    fn filter_joins_types_with_or() {
        assert_eq!(build_filter(&["Car".into()], ""), r#"(type eq "Car")"#);
        assert_eq!(
            build_filter(&["Car".into(), "Boat".into()], r#"name co "x""#),
            r#"(type eq "Car" or type eq "Boat") and (name co "x")"#
        );
    }

    #[tokio::test]
    async fn one_query_and_no_item_fetches() {
        let harness = harness();
        let output = ContentList
            .compile(
                &instance(json!({"contentTypes": ["Car"], "maxResults": 5})),
                &harness.context(),
            )
            .await
            .unwrap();
        assert!(output.content.contains("Alpha"));
        assert!(output.content.contains("Beta"));

        let queries = harness.client().queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].search, r#"(type eq "Car")"#);
        assert_eq!(queries[0].limit, Some(5));
        assert_eq!(harness.client().get_item_calls("C1"), 0);
    }

    #[tokio::test]
    async fn paginated_list_is_deferred_without_query() {
        let harness = harness();
        let output = ContentList
            .compile(
                &instance(json!({"contentTypes": ["Car"], "enablePagination": true})),
                &harness.context(),
            )
            .await
            .unwrap();
        assert_eq!(output.content, "");
        assert!(harness.client().queries().is_empty());
        assert!(
            harness
                .reporter
                .messages()
                .iter()
                .any(|m| m.text.contains("paginated"))
        );
    }
}
