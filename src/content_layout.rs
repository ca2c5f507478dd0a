//! Content-item rendering.
//!
//! The [`ContentItemResolver`] turns a content item reference into markup:
//!
//! 1. Fetch the item (at most once per page, unless the caller already has it).
//! 2. Pick a layout: `content-layouts.json` maps type → category → layout
//!    name; anything unmapped uses the built-in default layout.
//! 3. Fetch every referenced digital asset that lacks metadata in a single
//!    batched request.
//! 4. Compute the detail-page URL and register a deferred detail page.
//! 5. Render through the layout.
//!
//! Failures never propagate: the fragment is empty and the error is
//! reported.
//!
//! File-based layouts live in the components folder:
//!
//! ```text
//! components/
//! └── car-card/
//!     └── assets/
//!         └── layout.html     # template rendered with the item
//! ```

use crate::components::{CompileOutput, ComponentError};
use crate::content::ContentClient;
use crate::context::CompileContext;
use crate::merge::value_to_text;
use crate::structure::read_json;
use crate::template;
use crate::types::{ContentItem, DetailPageRequest};
use async_trait::async_trait;
use maud::html;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const LAYOUT_MAP_FILE: &str = "content-layouts.json";
pub const DEFAULT_CATEGORY: &str = "default";
pub const SYSTEM_DEFAULT_LAYOUT: &str = "system-default-layout";
const LAYOUT_TEMPLATE: &str = "assets/layout.html";

/// What a layout gets to render.
pub struct LayoutBundle<'a> {
    pub item: &'a ContentItem,
    /// The item as JSON with links resolved, plus `detailPageUrl` and
    /// `contentLayoutCategory`.
    pub data: Value,
    pub category: &'a str,
    pub detail_page_url: Option<&'a str>,
}

/// Renders one content item.
#[async_trait]
pub trait ContentLayout: Send + Sync {
    async fn render(&self, bundle: &LayoutBundle<'_>) -> Result<String, ComponentError>;
}

/// Fallback layout: name, scalar fields and a detail link.
pub struct SystemDefaultLayout;

#[async_trait]
impl ContentLayout for SystemDefaultLayout {
    async fn render(&self, bundle: &LayoutBundle<'_>) -> Result<String, ComponentError> {
        let item = bundle.item;
        let fields: Vec<(&String, String)> = item
            .fields
            .iter()
            .filter(|(_, v)| !v.is_object() && !v.is_array() && !v.is_null())
            .map(|(k, v)| (k, value_to_text(v)))
            .collect();
        let markup = html! {
            div.scs-content-item data-type=(item.item_type) data-id=(item.id) {
                h2.scs-content-item-name { (item.name) }
                @if !fields.is_empty() {
                    dl.scs-content-item-fields {
                        @for (name, value) in &fields {
                            dt { (name) }
                            dd { (value) }
                        }
                    }
                }
                @if let Some(url) = bundle.detail_page_url {
                    a.scs-content-item-link href=(url) { "View" }
                }
            }
        };
        Ok(markup.into_string())
    }
}

/// Template-backed layout loaded from the components folder.
pub struct FileLayout {
    template: String,
}

impl FileLayout {
    pub async fn load(components_folder: &Path, name: &str) -> Result<Self, ComponentError> {
        let path = components_folder.join(name).join(LAYOUT_TEMPLATE);
        let template = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ComponentError::Manifest {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { template })
    }
}

#[async_trait]
impl ContentLayout for FileLayout {
    async fn render(&self, bundle: &LayoutBundle<'_>) -> Result<String, ComponentError> {
        Ok(template::render(&self.template, &bundle.data))
    }
}

/// A reference to one item from a component.
#[derive(Debug, Clone, Default)]
pub struct ContentRef {
    pub id: String,
    pub category: Option<String>,
    pub detail_page_id: Option<String>,
}

/// Items fetched during one page compile.
#[derive(Default)]
pub struct PageItemCache {
    items: Mutex<HashMap<String, ContentItem>>,
}

impl PageItemCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<ContentItem> {
        self.items.lock().ok()?.get(id).cloned()
    }

    pub fn insert(&self, item: ContentItem) {
        if let Ok(mut items) = self.items.lock() {
            items.insert(item.id.clone(), item);
        }
    }
}

/// Detail pages requested during a pass, deduplicated.
#[derive(Default)]
struct DetailBacklog {
    pending: Vec<DetailPageRequest>,
    seen: BTreeSet<(String, String, String)>,
}

/// `<type>/<id>/<name-slug>` unless the item carries its own slug.
pub fn content_slug(item: &ContentItem) -> String {
    if let Some(slug) = item.slug.as_deref().filter(|s| !s.is_empty()) {
        return slug.trim_matches('/').to_string();
    }
    let name: String = item
        .name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let name = name
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    format!("{}/{}/{}", item.item_type, item.id, name)
}

/// Page URL of `item` rendered on a detail page at `page_url`.
///
/// The page URL's extension (or trailing slash) is dropped and the item's
/// slug appended: `cars/detail.html` → `cars/detail/<slug>`.
pub fn detail_path(page_url: &str, item: &ContentItem) -> String {
    let url = page_url.trim_start_matches('/');
    let stem = if let Some(dir) = url.strip_suffix('/') {
        dir
    } else {
        match url.rsplit_once('.') {
            Some((stem, ext)) if !ext.contains('/') => stem,
            _ => url,
        }
    };
    if stem.is_empty() {
        content_slug(item)
    } else {
        format!("{stem}/{}", content_slug(item))
    }
}

/// Renders content items and collects detail-page requests for a run.
pub struct ContentItemResolver {
    site_folder: PathBuf,
    components_folder: PathBuf,
    layout_map: Mutex<Option<Arc<Value>>>,
    layout_names: Mutex<HashMap<(String, String), String>>,
    layouts: Mutex<HashMap<String, Arc<dyn ContentLayout>>>,
    backlog: Mutex<DetailBacklog>,
}

impl ContentItemResolver {
    pub fn new(site_folder: impl Into<PathBuf>, components_folder: impl Into<PathBuf>) -> Self {
        Self {
            site_folder: site_folder.into(),
            components_folder: components_folder.into(),
            layout_map: Mutex::new(None),
            layout_names: Mutex::new(HashMap::new()),
            layouts: Mutex::new(HashMap::new()),
            backlog: Mutex::new(DetailBacklog::default()),
        }
    }

    /// Install a layout under `name`, replacing any file-based one.
    pub fn register_layout(&self, name: &str, layout: Arc<dyn ContentLayout>) {
        if let Ok(mut layouts) = self.layouts.lock() {
            layouts.insert(name.to_string(), layout);
        }
    }

    /// Render `reference`. `preloaded` skips the fetch.
    pub async fn render(
        &self,
        reference: &ContentRef,
        preloaded: Option<&ContentItem>,
        ctx: &CompileContext<'_>,
    ) -> CompileOutput {
        match self.try_render(reference, preloaded, ctx).await {
            Ok(content) => CompileOutput::markup(content),
            Err(e) => {
                ctx.reporter
                    .error_with(format!("failed to render content item {}", reference.id), &e);
                CompileOutput::deferred()
            }
        }
    }

    async fn try_render(
        &self,
        reference: &ContentRef,
        preloaded: Option<&ContentItem>,
        ctx: &CompileContext<'_>,
    ) -> Result<String, ComponentError> {
        let mut item = match preloaded {
            Some(item) => item.clone(),
            None => fetch_item(&reference.id, ctx).await?,
        };
        let category = reference
            .category
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let layout = self.layout_for(&item.item_type, &category, ctx).await;

        expand_digital_assets(&mut item, ctx).await?;

        let detail_page_url = self.detail_page(reference, &item, ctx);

        let mut data = serde_json::to_value(&item)?;
        if let Some(client) = ctx.content {
            data = client.expand_macros(&data);
        }
        let mut data = ctx.macros().resolve_links_value(&data);
        if let Value::Object(map) = &mut data {
            map.insert("detailPageUrl".into(), json!(detail_page_url));
            map.insert("contentLayoutCategory".into(), json!(category));
        }
        let bundle = LayoutBundle {
            item: &item,
            data,
            category: &category,
            detail_page_url: detail_page_url.as_deref(),
        };
        layout.render(&bundle).await
    }

    async fn layout_map(&self) -> Arc<Value> {
        if let Some(map) = self.layout_map.lock().ok().and_then(|m| m.clone()) {
            return map;
        }
        let map = match read_json(&self.site_folder.join(LAYOUT_MAP_FILE)).await {
            Ok(Some(map)) => map,
            Ok(None) => json!({}),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable content layout map");
                json!({})
            }
        };
        let map = Arc::new(map);
        if let Ok(mut slot) = self.layout_map.lock() {
            *slot = Some(Arc::clone(&map));
        }
        map
    }

    /// Layout name for (type, category), memoized per pair.
    async fn layout_name(&self, item_type: &str, category: &str) -> String {
        let key = (item_type.to_string(), category.to_string());
        if let Some(name) = self.layout_names.lock().ok().and_then(|n| n.get(&key).cloned()) {
            return name;
        }
        let map = self.layout_map().await;
        let by_category = map.get(item_type);
        let name = by_category
            .and_then(|c| c.get(category).or_else(|| c.get(DEFAULT_CATEGORY)))
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .unwrap_or(SYSTEM_DEFAULT_LAYOUT)
            .to_string();
        if let Ok(mut names) = self.layout_names.lock() {
            names.insert(key, name.clone());
        }
        name
    }

    async fn layout_for(
        &self,
        item_type: &str,
        category: &str,
        ctx: &CompileContext<'_>,
    ) -> Arc<dyn ContentLayout> {
        let name = self.layout_name(item_type, category).await;
        if let Some(layout) = self.layouts.lock().ok().and_then(|l| l.get(&name).cloned()) {
            return layout;
        }
        let layout: Arc<dyn ContentLayout> = if name == SYSTEM_DEFAULT_LAYOUT {
            Arc::new(SystemDefaultLayout)
        } else {
            match FileLayout::load(&self.components_folder, &name).await {
                Ok(layout) => Arc::new(layout),
                Err(e) => {
                    ctx.reporter.warn(format!(
                        "content layout '{name}' unavailable ({e}), using the default layout"
                    ));
                    Arc::new(SystemDefaultLayout)
                }
            }
        };
        if let Ok(mut layouts) = self.layouts.lock() {
            layouts.insert(name, Arc::clone(&layout));
        }
        layout
    }

    /// Detail URL for `item`, registering the detail page as a side effect.
    fn detail_page(
        &self,
        reference: &ContentRef,
        item: &ContentItem,
        ctx: &CompileContext<'_>,
    ) -> Option<String> {
        let node = match reference.detail_page_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => ctx.locale.nav.get(id)?,
            None => ctx
                .locale
                .default_detail_page(ctx.job.settings.default_detail_page.as_deref())?,
        };
        let link = ctx.macros().page_link(&node.id);
        let page_url = node.page_url.trim_start_matches('/');
        let prefix = link.strip_suffix(page_url)?;
        let url = format!("{prefix}{}", detail_path(page_url, item));

        self.request_detail_page(DetailPageRequest {
            detail_page_id: node.id.clone(),
            content_item: item.clone(),
            locale: ctx.locale.locale.locale.clone(),
        });
        Some(url)
    }

    /// Queue a detail page. Returns `false` for a duplicate.
    pub fn request_detail_page(&self, request: DetailPageRequest) -> bool {
        let Ok(mut backlog) = self.backlog.lock() else {
            return false;
        };
        let key = (
            request.locale.clone(),
            request.detail_page_id.clone(),
            request.content_item.id.clone(),
        );
        if !backlog.seen.insert(key) {
            return false;
        }
        backlog.pending.push(request);
        true
    }

    /// Pending requests grouped by locale, in registration order.
    pub fn take_detail_requests(&self) -> BTreeMap<String, Vec<DetailPageRequest>> {
        let mut grouped: BTreeMap<String, Vec<DetailPageRequest>> = BTreeMap::new();
        if let Ok(mut backlog) = self.backlog.lock() {
            for request in backlog.pending.drain(..) {
                grouped.entry(request.locale.clone()).or_default().push(request);
            }
        }
        grouped
    }

    /// Forget which detail pages were produced (start of a device pass).
    pub fn reset_detail_requests(&self) {
        if let Ok(mut backlog) = self.backlog.lock() {
            *backlog = DetailBacklog::default();
        }
    }
}

/// Fetch through the page cache.
pub async fn fetch_item(id: &str, ctx: &CompileContext<'_>) -> Result<ContentItem, ComponentError> {
    if let Some(item) = ctx.page_items.get(id) {
        return Ok(item);
    }
    let client = ctx.content.ok_or(ComponentError::NoContentClient)?;
    let item = client.get_item(id).await?;
    ctx.page_items.insert(item.clone());
    Ok(item)
}

fn is_asset_without_metadata(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    let is_asset = object.get("type").and_then(Value::as_str) == Some("DigitalAsset")
        || object.get("typeCategory").and_then(Value::as_str) == Some("DigitalAssetType");
    let has_metadata = object.contains_key("mimeType")
        || object
            .get("fields")
            .is_some_and(|f| f.get("mimeType").is_some());
    if !is_asset || has_metadata {
        return None;
    }
    object.get("id").map(value_to_text).filter(|id| !id.is_empty())
}

/// Replace asset references lacking `mimeType` with the fetched assets.
///
/// All missing assets are fetched with one `get_items` call.
async fn expand_digital_assets(
    item: &mut ContentItem,
    ctx: &CompileContext<'_>,
) -> Result<(), ComponentError> {
    let mut ids = Vec::new();
    for value in item.fields.values() {
        let candidates: Vec<&Value> = match value {
            Value::Array(values) => values.iter().collect(),
            other => vec![other],
        };
        for candidate in candidates {
            if let Some(id) = is_asset_without_metadata(candidate)
                && !ids.contains(&id)
            {
                ids.push(id);
            }
        }
    }
    if ids.is_empty() {
        return Ok(());
    }
    let client = ctx.content.ok_or(ComponentError::NoContentClient)?;
    let fetched: HashMap<String, Value> = client
        .get_items(&ids)
        .await?
        .into_iter()
        .filter_map(|asset| {
            let id = asset.id.clone();
            serde_json::to_value(asset).ok().map(|v| (id, v))
        })
        .collect();

    let replace = |value: &mut Value| {
        if let Some(id) = is_asset_without_metadata(value)
            && let Some(asset) = fetched.get(&id)
        {
            *value = asset.clone();
        }
    };
    for value in item.fields.values_mut() {
        match value {
            Value::Array(values) => values.iter_mut().for_each(&replace),
            other => replace(other),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockContentClient, PageHarness};
    use std::fs;

    fn car(id: &str) -> ContentItem {
        serde_json::from_value(json!({
            "id": id,
            "type": "Car",
            "name": "Blue Car",
            "fields": {
                "price": 100,
                "photo": {"id": "DA1", "type": "DigitalAsset"},
                "gallery": [
                    {"id": "DA2", "type": "DigitalAsset"},
                    {"id": "DA3", "type": "DigitalAsset", "fields": {"mimeType": "image/png"}}
                ]
            }
        }))
        .unwrap()
    }

    fn asset(id: &str) -> ContentItem {
        serde_json::from_value(json!({
            "id": id, "type": "DigitalAsset", "name": id,
            "fields": {"mimeType": "image/jpeg"}
        }))
        .unwrap()
    }

    fn harness() -> PageHarness {
        let client = MockContentClient::new()
            .with_item(car("C1"))
            .with_item(asset("DA1"))
            .with_item(asset("DA2"));
        PageHarness::new().with_client(client)
    }

    fn reference(id: &str) -> ContentRef {
        ContentRef {
            id: id.into(),
            ..ContentRef::default()
        }
    }

    #[test]
    fn slug_and_detail_path() {
        let item = car("C1");
        assert_eq!(content_slug(&item), "Car/C1/blue-car");
        assert_eq!(detail_path("cars/detail.html", &item), "cars/detail/Car/C1/blue-car");
        assert_eq!(detail_path("cars/", &item), "cars/Car/C1/blue-car");

        let mut item = item;
        item.slug = Some("blue".into());
        assert_eq!(detail_path("/detail.html", &item), "detail/blue");
    }

    #[tokio::test]
    async fn items_fetched_once_per_page() {
        let harness = harness();
        let ctx = harness.context();
        harness.resolver.render(&reference("C1"), None, &ctx).await;
        harness.resolver.render(&reference("C1"), None, &ctx).await;
        assert_eq!(harness.client().get_item_calls("C1"), 1);
    }

    #[tokio::test]
    async fn missing_assets_fetched_in_one_batch() {
        let harness = harness();
        let ctx = harness.context();
        let output = harness.resolver.render(&reference("C1"), None, &ctx).await;
        assert!(output.content.contains("Blue Car"));
        let mut batches = harness.client().get_items_calls();
        assert_eq!(batches.len(), 1);
        batches[0].sort();
        assert_eq!(batches[0], vec!["DA1".to_string(), "DA2".to_string()]);
    }

    #[tokio::test]
    async fn failure_degrades_to_empty_content() {
        let harness = harness();
        let ctx = harness.context();
        let output = harness.resolver.render(&reference("nope"), None, &ctx).await;
        assert_eq!(output.content, "");
        assert!(harness.reporter.has_errors());
    }

    #[tokio::test]
    async fn detail_requests_are_deduplicated() {
        let harness = harness().with_detail_page("300", "cars/detail.html");
        let ctx = harness.context();
        let output = harness.resolver.render(&reference("C1"), None, &ctx).await;
        assert!(output.content.contains("/cars/detail/Car/C1/blue-car"));
        harness.resolver.render(&reference("C1"), None, &ctx).await;

        let requests = harness.resolver.take_detail_requests();
        let requests: Vec<_> = requests.values().flatten().collect();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].detail_page_id, "300");
        assert_eq!(requests[0].content_item.id, "C1");
        assert!(harness.resolver.take_detail_requests().is_empty());
    }

    #[tokio::test]
    async fn file_layout_from_type_map() {
        let harness = harness();
        fs::write(
            harness.site_folder().join(LAYOUT_MAP_FILE),
            json!({"Car": {"default": "car-card"}}).to_string(),
        )
        .unwrap();
        let layout_dir = harness.components_folder().join("car-card/assets");
        fs::create_dir_all(&layout_dir).unwrap();
        fs::write(
            layout_dir.join("layout.html"),
            "<article>{{name}} costs {{fields.price}}</article>",
        )
        .unwrap();

        let ctx = harness.context();
        let output = harness.resolver.render(&reference("C1"), None, &ctx).await;
        assert_eq!(output.content, "<article>Blue Car costs 100</article>");
    }

    #[tokio::test]
    async fn unknown_layout_falls_back_to_default() {
        let harness = harness();
        fs::write(
            harness.site_folder().join(LAYOUT_MAP_FILE),
            json!({"Car": {"default": "missing-layout"}}).to_string(),
        )
        .unwrap();
        let ctx = harness.context();
        let output = harness.resolver.render(&reference("C1"), None, &ctx).await;
        assert!(output.content.contains("scs-content-item"));
        assert!(!harness.reporter.has_errors());
    }
}
