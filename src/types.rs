//! Data model shared by every compile stage.
//!
//! The export format is loosely typed JSON. These types give the parts the
//! compiler reasons about a shape, while anything kind-specific (component
//! `data`, page `properties`) stays a [`serde_json::Value`] so unknown keys
//! survive a round trip into the render info untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Page ids are numbers in some exports and strings in others.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

/// One node of the navigation tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageNode {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub page_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(default)]
    pub hide_in_navigation: bool,
    #[serde(default)]
    pub is_detail_page: bool,
    #[serde(default)]
    pub children: Vec<Value>,
    #[serde(default)]
    pub properties: Value,
}

/// Navigation tree of one locale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStructure {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub nav_root: Option<String>,
    #[serde(default)]
    pub pages: Vec<PageNode>,
}

impl SiteStructure {
    /// The single node without a parent.
    pub fn root(&self) -> Option<&PageNode> {
        match &self.nav_root {
            Some(id) => self.find(id),
            None => self.pages.iter().find(|p| p.parent_id.is_none()),
        }
    }

    pub fn find(&self, id: &str) -> Option<&PageNode> {
        self.pages.iter().find(|p| p.id == id)
    }

    /// Flattened id → node lookup.
    pub fn by_id(&self) -> BTreeMap<String, PageNode> {
        self.pages
            .iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect()
    }

    /// Ids of every descendant of `id`, depth-first in structure order.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(parent) = stack.pop() {
            let children: Vec<String> = self
                .pages
                .iter()
                .filter(|p| p.parent_id.as_deref() == Some(parent.as_str()))
                .map(|p| p.id.clone())
                .collect();
            for child in children.iter().rev() {
                stack.push(child.clone());
            }
            out.extend(children);
        }
        out
    }
}

/// A named credential scoping which published content may be referenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccessToken {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
}

pub const DEFAULT_TOKEN_NAME: &str = "defaultToken";

/// Site-level configuration (`siteinfo.json` → `base.properties`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub theme_name: String,
    #[serde(default)]
    pub design_name: String,
    #[serde(default)]
    pub default_language: String,
    #[serde(default)]
    pub locale_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub channel_access_tokens: Vec<ChannelAccessToken>,
    #[serde(default)]
    pub is_secure: bool,
    /// Everything else (header/footer markup, analytics snippets, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SiteInfo {
    pub fn default_token(&self) -> Option<&ChannelAccessToken> {
        self.channel_access_tokens
            .iter()
            .rev()
            .find(|t| t.name == DEFAULT_TOKEN_NAME)
    }
}

/// A placed component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentInstance {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// A named region of a theme layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Slot {
    #[serde(default)]
    pub grid: String,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<String>,
}

/// Per-page document (`pages/<id>.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageModel {
    #[serde(default)]
    pub properties: Value,
    #[serde(default)]
    pub component_instances: BTreeMap<String, ComponentInstance>,
    #[serde(default)]
    pub slots: BTreeMap<String, Slot>,
}

impl PageModel {
    /// Layout name for the requested device; mobile falls back to desktop.
    pub fn layout_name(&self, mobile: bool) -> Option<&str> {
        let key = if mobile { "mobileLayout" } else { "pageLayout" };
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                if mobile {
                    self.layout_name(false)
                } else {
                    None
                }
            })
    }

    pub fn title(&self) -> &str {
        self.properties
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// A content item fetched from the content store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// Deferred detail-page generation for one content item.
#[derive(Debug, Clone, Serialize)]
pub struct DetailPageRequest {
    pub detail_page_id: String,
    pub content_item: ContentItem,
    pub locale: String,
}

/// The final artifact of one page compile.
#[derive(Debug, Clone)]
pub struct CompiledPage {
    pub html: String,
    /// Path relative to the distribution root.
    pub path: std::path::PathBuf,
}

/// Which device variant a pass produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Desktop,
    Mobile,
}

impl Device {
    pub fn is_mobile(self) -> bool {
        self == Device::Mobile
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Desktop => write!(f, "desktop"),
            Device::Mobile => write!(f, "mobile"),
        }
    }
}
