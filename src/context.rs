//! Per-locale and per-page compile context.
//!
//! A [`LocaleContext`] is built once per (device, locale) pass and shared by
//! every page of the pass. A [`CompileContext`] borrows it together with the
//! run-wide services for the duration of one page compile; component
//! compilers and the content-item resolver only ever see that borrow.

use crate::components::ComponentRegistry;
use crate::config::JobConfig;
use crate::content::ContentClient;
use crate::content_layout::{ContentItemResolver, PageItemCache};
use crate::merge::{ArrayMerge, merge_json};
use crate::reporter::Reporter;
use crate::structure::{ResolvedSite, StructureError, read_json};
use crate::tokens::{LocaleInfo, MacroContext, SiteUrls};
use crate::types::{ComponentInstance, ContentItem, Device, PageNode, Slot};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const SLOTS_FILE: &str = "slots.json";

/// Slots and instances shared by every page (`slots.json`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotReuse {
    #[serde(default)]
    pub slots: BTreeMap<String, Slot>,
    #[serde(default)]
    pub component_instances: BTreeMap<String, ComponentInstance>,
}

impl SlotReuse {
    /// `slots.json` with `<locale>_slots.json` merged on top.
    pub async fn load(site_folder: &Path, locale: &str) -> Result<Self, StructureError> {
        let path = site_folder.join(SLOTS_FILE);
        let Some(mut value) = read_json(&path).await? else {
            return Ok(Self::default());
        };
        if !locale.is_empty()
            && let Some(overlay) =
                read_json(&site_folder.join(format!("{locale}_{SLOTS_FILE}"))).await?
        {
            value = merge_json(value, overlay, ArrayMerge::Replace);
        }
        let mut reuse: Self =
            serde_json::from_value(value).map_err(|source| StructureError::Json { path, source })?;
        for (id, instance) in reuse.component_instances.iter_mut() {
            if instance.id.is_empty() {
                instance.id = id.clone();
            }
        }
        Ok(reuse)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.component_instances.is_empty()
    }
}

/// Everything that is constant across the pages of one (device, locale) pass.
pub struct LocaleContext {
    pub locale: LocaleInfo,
    pub device: Device,
    pub site: ResolvedSite,
    pub nav: BTreeMap<String, PageNode>,
    pub urls: SiteUrls,
    pub slot_reuse: SlotReuse,
    pub channel_token: Option<String>,
}

impl LocaleContext {
    pub fn new(
        locale: LocaleInfo,
        device: Device,
        site: ResolvedSite,
        urls: SiteUrls,
        slot_reuse: SlotReuse,
    ) -> Self {
        let nav = site.structure.by_id();
        let channel_token = site.site_info.default_token().map(|t| t.value.clone());
        Self {
            locale,
            device,
            site,
            nav,
            urls,
            slot_reuse,
            channel_token,
        }
    }

    /// Folder this locale's pages are written under.
    pub fn output_segment(&self) -> String {
        self.locale.segment_for(&self.locale.locale)
    }

    pub fn macro_context<'a>(
        &'a self,
        page_url: &'a str,
        content: Option<&'a dyn ContentClient>,
    ) -> MacroContext<'a> {
        MacroContext {
            urls: &self.urls,
            theme_name: &self.site.theme_name,
            design_name: &self.site.design_name,
            nav: &self.nav,
            locale: &self.locale,
            page_url,
            content,
            channel_token: self.channel_token.as_deref(),
        }
    }

    /// Detail page used when a component names none: the configured default,
    /// else the first node flagged as a detail page.
    pub fn default_detail_page(&self, configured: Option<&str>) -> Option<&PageNode> {
        if let Some(id) = configured
            && let Some(node) = self.nav.get(id)
        {
            return Some(node);
        }
        self.site.structure.pages.iter().find(|p| p.is_detail_page)
    }
}

/// Borrowed view handed to component compilers for one page.
pub struct CompileContext<'a> {
    pub job: &'a JobConfig,
    pub locale: &'a LocaleContext,
    pub page_id: &'a str,
    /// URL the page is written at; for a detail page, the item's URL.
    pub page_url: &'a str,
    /// Item bound to unbound content placeholders on a detail page.
    pub detail_item: Option<&'a ContentItem>,
    pub reporter: &'a Reporter,
    pub content: Option<&'a dyn ContentClient>,
    pub items: &'a ContentItemResolver,
    pub page_items: &'a PageItemCache,
    pub components: &'a ComponentRegistry,
}

impl CompileContext<'_> {
    pub fn device(&self) -> Device {
        self.locale.device
    }

    /// Link resolution relative to this page. `page_url` already carries
    /// the full depth of a detail page, so no extra level is added.
    pub fn macros(&self) -> MacroContext<'_> {
        self.locale.macro_context(self.page_url, self.content)
    }
}
