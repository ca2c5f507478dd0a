//! Shared test utilities.
//!
//! - [`MockContentClient`]: an in-memory content store that records every
//!   call, so tests can assert how often the store was hit.
//! - [`PageHarness`]: a temp site folder plus everything a
//!   [`CompileContext`] borrows, for exercising compilers one at a time.
//! - [`setup_fixtures`]: an isolated copy of `fixtures/site/`.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let harness = PageHarness::new()
//!     .with_client(MockContentClient::new().with_item(car))
//!     .with_detail_page("300", "cars/detail.html");
//! let output = harness.resolver.render(&reference, None, &harness.context()).await;
//! assert_eq!(harness.client().get_item_calls("C1"), 1);
//! ```

use crate::components::ComponentRegistry;
use crate::config::{CompileConfig, JobConfig};
use crate::content::{
    ContentClient, ContentError, ContentInfo, ContentMode, ItemQuery, QueryResult,
    RenditionRequest, default_rendition_url, filter_types,
};
use crate::content_layout::{ContentItemResolver, PageItemCache};
use crate::context::{CompileContext, LocaleContext, SlotReuse};
use crate::hooks::HookRegistry;
use crate::page::PageCompiler;
use crate::reporter::Reporter;
use crate::structure::ResolvedSite;
use crate::tokens::{LocaleInfo, SiteUrls};
use crate::types::{ContentItem, Device, PageNode, SiteInfo, SiteStructure};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Content store double
// =========================================================================

#[derive(Default)]
struct Calls {
    get_item: Vec<String>,
    get_items: Vec<Vec<String>>,
    queries: Vec<ItemQuery>,
}

/// In-memory content store.
#[derive(Default)]
pub struct MockContentClient {
    items: BTreeMap<String, ContentItem>,
    calls: Mutex<Calls>,
}

impl MockContentClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: ContentItem) -> Self {
        self.items.insert(item.id.clone(), item);
        self
    }

    pub fn get_item_calls(&self, id: &str) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.get_item.iter().filter(|c| *c == id).count()
    }

    pub fn get_items_calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().get_items.clone()
    }

    pub fn queries(&self) -> Vec<ItemQuery> {
        self.calls.lock().unwrap().queries.clone()
    }
}

#[async_trait]
impl ContentClient for MockContentClient {
    async fn get_item(&self, id: &str) -> Result<ContentItem, ContentError> {
        self.calls.lock().unwrap().get_item.push(id.to_string());
        self.items
            .get(id)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(id.to_string()))
    }

    async fn get_items(&self, ids: &[String]) -> Result<Vec<ContentItem>, ContentError> {
        self.calls.lock().unwrap().get_items.push(ids.to_vec());
        Ok(ids.iter().filter_map(|id| self.items.get(id).cloned()).collect())
    }

    async fn query_items(&self, query: &ItemQuery) -> Result<QueryResult, ContentError> {
        self.calls.lock().unwrap().queries.push(query.clone());
        let mut types = query.types.clone();
        types.extend(filter_types(&query.search));
        let matching: Vec<ContentItem> = self
            .items
            .values()
            .filter(|item| types.is_empty() || types.contains(&item.item_type))
            .cloned()
            .collect();
        let total = matching.len();
        let items: Vec<ContentItem> = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(QueryResult {
            has_more: query.offset + items.len() < total,
            items,
            total,
        })
    }

    fn rendition_url(&self, request: &RenditionRequest<'_>) -> String {
        default_rendition_url("/content", request, None)
    }

    fn info(&self) -> ContentInfo {
        ContentInfo {
            mode: ContentMode::Published,
            schema_version: "v1.1".to_string(),
        }
    }
}

// =========================================================================
// Page harness
// =========================================================================

/// A site folder in a temp directory with one root page (`100`,
/// `index.html`), served from `/` in the default locale.
pub struct PageHarness {
    _tmp: TempDir,
    pub job: JobConfig,
    pub locale: LocaleContext,
    pub reporter: Reporter,
    pub registry: ComponentRegistry,
    pub resolver: ContentItemResolver,
    pub hooks: HookRegistry,
    pub page_items: PageItemCache,
    client: Option<MockContentClient>,
}

fn locale_context(structure: SiteStructure) -> LocaleContext {
    let settings = CompileConfig::default();
    let site = ResolvedSite {
        site_info: SiteInfo::default(),
        site_info_value: json!({"siteName": "test"}),
        structure,
        theme_name: "starter".to_string(),
        design_name: "default".to_string(),
    };
    LocaleContext::new(
        LocaleInfo::default(),
        Device::Desktop,
        site,
        SiteUrls::new(&settings, "/", "starter"),
        SlotReuse::default(),
    )
}

impl PageHarness {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let site = tmp.path().join("site");
        let job = JobConfig::new(&site, tmp.path().join("out"));
        std::fs::create_dir_all(&job.components_folder).unwrap();
        std::fs::create_dir_all(&job.theme_folder).unwrap();

        let structure: SiteStructure = serde_json::from_value(json!({
            "navRoot": 100,
            "pages": [{"id": 100, "name": "Home", "pageUrl": "index.html"}]
        }))
        .unwrap();

        Self {
            locale: locale_context(structure),
            reporter: Reporter::new(),
            registry: ComponentRegistry::with_builtins(&job.components_folder),
            resolver: ContentItemResolver::new(&job.site_folder, &job.components_folder),
            hooks: HookRegistry::new(job.theme_folder.join("layouts")),
            page_items: PageItemCache::new(),
            client: None,
            job,
            _tmp: tmp,
        }
    }

    pub fn with_client(mut self, client: MockContentClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Add a detail page to the structure.
    pub fn with_detail_page(mut self, id: &str, page_url: &str) -> Self {
        let mut structure = self.locale.site.structure.clone();
        let node: PageNode = serde_json::from_value(json!({
            "id": id,
            "name": "Detail",
            "parentId": 100,
            "pageUrl": page_url,
            "isDetailPage": true
        }))
        .unwrap();
        structure.pages.push(node);
        self.locale = locale_context(structure);
        self
    }

    pub fn client(&self) -> &MockContentClient {
        self.client.as_ref().expect("harness has no content client")
    }

    pub fn site_folder(&self) -> &Path {
        &self.job.site_folder
    }

    pub fn components_folder(&self) -> &Path {
        &self.job.components_folder
    }

    /// Context for compiling a component of page `100`.
    pub fn context(&self) -> CompileContext<'_> {
        CompileContext {
            job: &self.job,
            locale: &self.locale,
            page_id: "100",
            page_url: "index.html",
            detail_item: None,
            reporter: &self.reporter,
            content: self.client.as_ref().map(|c| c as &dyn ContentClient),
            items: &self.resolver,
            page_items: &self.page_items,
            components: &self.registry,
        }
    }

    pub fn page_compiler(&self) -> PageCompiler<'_> {
        PageCompiler {
            job: &self.job,
            locale: &self.locale,
            reporter: &self.reporter,
            content: self.client.as_ref().map(|c| c as &dyn ContentClient),
            items: &self.resolver,
            components: &self.registry,
            hooks: &self.hooks,
        }
    }
}
