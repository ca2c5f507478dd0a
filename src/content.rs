//! Content-client capability.
//!
//! Content items live in an external content store. The compiler never talks
//! to the store directly; it goes through the [`ContentClient`] trait so the
//! transport (a remote REST client, a local export, an in-memory test double)
//! is injected by the caller.
//!
//! [`LocalContentClient`] serves a content export unpacked on disk:
//!
//! ```text
//! content/
//! └── items/
//!     ├── CORE1234.json     # one ContentItem per file
//!     └── DIGITAL5678.json
//! ```
//!
//! Queries use the filter syntax of the content store
//! (`(type eq "Car") and (name co "blue")`). The local client only evaluates
//! the `type eq` clauses; any other clause is accepted and ignored.

use crate::types::ContentItem;
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Content item not found: {0}")]
    NotFound(String),
    #[error("Content store error: {0}")]
    Store(String),
}

/// Whether the client serves draft or published content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    Draft,
    Published,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInfo {
    pub mode: ContentMode,
    pub schema_version: String,
}

/// A search over content items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    pub types: Vec<String>,
    /// Filter expression in the store's query syntax.
    pub search: String,
    pub limit: Option<usize>,
    pub offset: usize,
    pub order_by: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub items: Vec<ContentItem>,
    pub has_more: bool,
    pub total: usize,
}

/// Parameters of a digital-asset URL.
#[derive(Debug, Clone, Copy)]
pub struct RenditionRequest<'a> {
    pub id: &'a str,
    pub rendition: Option<&'a str>,
    pub format: Option<&'a str>,
    pub download: bool,
}

/// Access to the content store.
#[async_trait]
pub trait ContentClient: Send + Sync {
    async fn get_item(&self, id: &str) -> Result<ContentItem, ContentError>;

    /// Fetch several items in one request. Missing ids are omitted.
    async fn get_items(&self, ids: &[String]) -> Result<Vec<ContentItem>, ContentError>;

    async fn query_items(&self, query: &ItemQuery) -> Result<QueryResult, ContentError>;

    /// URL of an asset rendition. Pure: no request is issued.
    fn rendition_url(&self, request: &RenditionRequest<'_>) -> String;

    /// Expand store-specific macros inside field values.
    fn expand_macros(&self, value: &Value) -> Value {
        value.clone()
    }

    fn info(&self) -> ContentInfo;
}

/// `<base>/published/api/v1.1/assets/<id>/<rendition>?format=..&download=..`
pub fn default_rendition_url(
    base: &str,
    request: &RenditionRequest<'_>,
    channel_token: Option<&str>,
) -> String {
    let rendition = request.rendition.unwrap_or("native");
    let mut url = format!(
        "{}/published/api/v1.1/assets/{}/{}",
        base.trim_end_matches('/'),
        request.id,
        rendition
    );
    let mut params = Vec::new();
    if let Some(format) = request.format {
        params.push(format!("format={format}"));
    }
    if request.download {
        params.push("download=true".to_string());
    }
    if let Some(token) = channel_token.filter(|t| !t.is_empty()) {
        params.push(format!("channelToken={token}"));
    }
    if !params.is_empty() {
        url.push('?');
        url.push_str(&params.join("&"));
    }
    url
}

static TYPE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"type\s+eq\s+"([^"]+)""#).expect("valid regex"));

/// Types named by `type eq "..."` clauses of a filter expression.
pub fn filter_types(search: &str) -> Vec<String> {
    TYPE_CLAUSE
        .captures_iter(search)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Content client over an export unpacked on disk.
pub struct LocalContentClient {
    root: PathBuf,
    base_url: String,
    channel_token: Option<String>,
}

impl LocalContentClient {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
            channel_token: None,
        }
    }

    pub fn with_channel_token(mut self, token: Option<String>) -> Self {
        self.channel_token = token;
        self
    }

    fn item_path(&self, id: &str) -> PathBuf {
        self.root.join("items").join(format!("{id}.json"))
    }

    async fn read_item(path: &Path) -> Result<ContentItem, ContentError> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ContentClient for LocalContentClient {
    async fn get_item(&self, id: &str) -> Result<ContentItem, ContentError> {
        let path = self.item_path(id);
        if !path.exists() {
            return Err(ContentError::NotFound(id.to_string()));
        }
        Self::read_item(&path).await
    }

    async fn get_items(&self, ids: &[String]) -> Result<Vec<ContentItem>, ContentError> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_item(id).await {
                Ok(item) => items.push(item),
                Err(ContentError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(items)
    }

    async fn query_items(&self, query: &ItemQuery) -> Result<QueryResult, ContentError> {
        let mut types = query.types.clone();
        types.extend(filter_types(&query.search));

        let mut paths: Vec<PathBuf> = WalkDir::new(self.root.join("items"))
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .collect();
        paths.sort();

        let mut matched = Vec::new();
        for path in paths {
            let item = Self::read_item(&path).await?;
            if types.is_empty() || types.iter().any(|t| *t == item.item_type) {
                matched.push(item);
            }
        }
        if let Some(field) = &query.order_by {
            let (field, descending) = match field.split_once(':') {
                Some((f, dir)) => (f, dir.eq_ignore_ascii_case("desc")),
                None => (field.as_str(), false),
            };
            matched.sort_by(|a, b| {
                let ka = sort_key(a, field);
                let kb = sort_key(b, field);
                if descending { kb.cmp(&ka) } else { ka.cmp(&kb) }
            });
        }

        let total = matched.len();
        let limit = query.limit.unwrap_or(total);
        let items: Vec<ContentItem> = matched.into_iter().skip(query.offset).take(limit).collect();
        Ok(QueryResult {
            has_more: query.offset + items.len() < total,
            items,
            total,
        })
    }

    fn rendition_url(&self, request: &RenditionRequest<'_>) -> String {
        default_rendition_url(&self.base_url, request, self.channel_token.as_deref())
    }

    fn info(&self) -> ContentInfo {
        ContentInfo {
            mode: ContentMode::Published,
            schema_version: "v1.1".to_string(),
        }
    }
}

fn sort_key(item: &ContentItem, field: &str) -> String {
    match field {
        "name" => item.name.clone(),
        "id" => item.id.clone(),
        other => item
            .fields
            .get(other)
            .map(crate::merge::value_to_text)
            .unwrap_or_default(),
    }
}
