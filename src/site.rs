//! Site compilation driver.
//!
//! One run compiles every selected page for each device pass and locale:
//!
//! ```text
//! for device in [desktop, mobile?]:
//!     for locale in [default, discovered...] ∩ allow-list:
//!         build LocaleContext
//!         compile selected pages, one at a time
//!     drain detail-page requests until none are left
//! write one bootstrap script per locale (unless site info is inlined)
//! ```
//!
//! The mobile pass runs when the job asks for it or `_folder.json` declares
//! mobile user agents. Only an unreadable root structure stops the run;
//! everything else is reported and the run carries on. The run passed iff
//! the [`Reporter`] recorded no error.

use crate::components::ComponentRegistry;
use crate::config::JobConfig;
use crate::content::ContentClient;
use crate::content_layout::{ContentItemResolver, detail_path};
use crate::context::{LocaleContext, SlotReuse};
use crate::hooks::HookRegistry;
use crate::page::{PageCompiler, PageRequest, PageState, bootstrap_path, bootstrap_script, write_page};
use crate::reporter::{Level, Reporter};
use crate::structure::{
    ResolvedSite, StructureError, StructureResolver, discover_locales, read_json, site_root_prefix,
};
use crate::tokens::{LocaleInfo, SiteUrls};
use crate::types::{Device, PageModel, PageNode, SiteStructure};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

const PAGES_FOLDER: &str = "pages";
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum SiteError {
    #[error(transparent)]
    Structure(#[from] StructureError),
}

/// Progress callback, called with a fraction in `0.0..=1.0`.
pub type StatusCallback = Box<dyn FnMut(f64) + Send>;

/// Forwards progress at most once per interval. The final update always
/// goes through.
pub struct StatusThrottle {
    callback: StatusCallback,
    interval: Duration,
    last: Option<Instant>,
}

impl StatusThrottle {
    pub fn new(callback: StatusCallback) -> Self {
        Self {
            callback,
            interval: STATUS_INTERVAL,
            last: None,
        }
    }

    pub fn update(&mut self, progress: f64) {
        self.update_at(progress, Instant::now());
    }

    fn update_at(&mut self, progress: f64, now: Instant) {
        let progress = progress.clamp(0.0, 1.0);
        let done = progress >= 1.0;
        if !done
            && self
                .last
                .is_some_and(|last| now.duration_since(last) < self.interval)
        {
            return;
        }
        self.last = Some(now);
        (self.callback)(progress);
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_written: usize,
    pub detail_pages_written: usize,
    pub pages_failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub success: bool,
}

/// Pages to compile: the requested ids (and their descendants when
/// `recurse`), else every page, in structure order. Link-only nodes have
/// nothing to compile.
pub fn select_pages<'a>(structure: &'a SiteStructure, job: &JobConfig) -> Vec<&'a PageNode> {
    let ids: Vec<String> = if job.pages.is_empty() {
        structure.pages.iter().map(|p| p.id.clone()).collect()
    } else {
        let mut ids = Vec::new();
        for id in &job.pages {
            ids.push(id.clone());
            if job.recurse {
                ids.extend(structure.descendants(id));
            }
        }
        ids
    };
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .filter_map(|id| structure.find(&id))
        .filter(|node| node.link_url.as_deref().is_none_or(str::is_empty))
        .collect()
}

/// Compiles a whole site.
pub struct SiteCompiler<'a> {
    job: &'a JobConfig,
    reporter: &'a Reporter,
    content: Option<&'a dyn ContentClient>,
    components: ComponentRegistry,
    hooks: HookRegistry,
    items: ContentItemResolver,
    status: Option<StatusThrottle>,
    models: HashMap<String, Option<PageModel>>,
}

impl<'a> SiteCompiler<'a> {
    pub fn new(job: &'a JobConfig, reporter: &'a Reporter) -> Self {
        Self {
            job,
            reporter,
            content: None,
            components: ComponentRegistry::with_builtins(&job.components_folder),
            hooks: HookRegistry::new(job.theme_folder.join("layouts")),
            items: ContentItemResolver::new(&job.site_folder, &job.components_folder),
            status: None,
            models: HashMap::new(),
        }
    }

    pub fn with_content(mut self, client: &'a dyn ContentClient) -> Self {
        self.content = Some(client);
        self
    }

    pub fn with_status(mut self, callback: StatusCallback) -> Self {
        self.status = Some(StatusThrottle::new(callback));
        self
    }

    pub fn components_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.components
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    pub fn items(&self) -> &ContentItemResolver {
        &self.items
    }

    /// Compile the site. Fails only when the root structure is unusable;
    /// that failure is also recorded in the report.
    pub async fn run(&mut self) -> Result<RunSummary, SiteError> {
        self.compile_site().await.inspect_err(|e| {
            self.reporter.error_with("cannot compile site", e);
        })
    }

    async fn compile_site(&mut self) -> Result<RunSummary, SiteError> {
        let job = self.job;
        let resolver = StructureResolver::new(&job.site_folder, &job.settings).await?;
        let base = resolver.resolve("").await?;
        let default_locale = base.site_info.default_language.clone();

        let locales = self.locales(&default_locale);
        let mut devices = vec![Device::Desktop];
        if job.mobile || resolver.folder_settings().has_mobile_rule() {
            devices.push(Device::Mobile);
        }
        tracing::info!(
            site = %job.site_folder.display(),
            locales = ?locales,
            mobile = devices.len() > 1,
            "compiling site"
        );

        let mut summary = RunSummary::default();
        let mut status = self.status.take();
        let total = (devices.len() * locales.len() * select_pages(&base.structure, job).len()).max(1);
        let mut done = 0usize;
        let mut bootstraps_written = HashSet::new();

        for device in devices {
            self.items.reset_detail_requests();
            let mut contexts = Vec::with_capacity(locales.len());
            for locale in &locales {
                let site = if locale.is_empty() {
                    base.clone()
                } else {
                    match resolver.resolve(locale).await {
                        Ok(site) => site,
                        Err(e) => {
                            self.reporter
                                .error_with(format!("skipping locale '{locale}'"), &e);
                            continue;
                        }
                    }
                };
                contexts.push(self.locale_context(locale, &default_locale, device, site).await);
            }

            for ctx in &contexts {
                if !job.settings.inline_site_info
                    && bootstraps_written.insert(ctx.locale.locale.clone())
                {
                    self.write_bootstrap(ctx).await;
                }
                let pages = select_pages(&ctx.site.structure, job);
                for node in pages {
                    let state = self.compile_page(ctx, node, None).await;
                    tally(&mut summary, state, false);
                    done += 1;
                    if let Some(status) = &mut status {
                        status.update(done as f64 / total as f64);
                    }
                }
            }

            self.drain_detail_pages(&contexts, &mut summary).await;
        }

        summary.errors = self.reporter.count(Level::Error);
        summary.warnings = self.reporter.count(Level::Warn);
        summary.success = !self.reporter.has_errors();
        if let Some(status) = &mut status {
            status.update(1.0);
        }
        self.status = status;
        tracing::info!(
            pages = summary.pages_written,
            detail_pages = summary.detail_pages_written,
            errors = summary.errors,
            "site compiled"
        );
        Ok(summary)
    }

    /// Default locale first, then every locale shipping an overlay, filtered
    /// by the job's allow-list.
    fn locales(&self, default_locale: &str) -> Vec<String> {
        let mut locales = vec![default_locale.to_string()];
        for locale in discover_locales(&self.job.site_folder) {
            if !locales.contains(&locale) {
                locales.push(locale);
            }
        }
        if self.job.locales.is_empty() {
            return locales;
        }
        locales
            .into_iter()
            .filter(|l| self.job.locales.contains(l))
            .collect()
    }

    async fn locale_context(
        &self,
        locale: &str,
        default_locale: &str,
        device: Device,
        site: ResolvedSite,
    ) -> LocaleContext {
        let prefix = site_root_prefix(&self.job.settings, &site.site_info.site_name);
        let urls = SiteUrls::new(&self.job.settings, &prefix, &site.theme_name);
        let slot_reuse = match SlotReuse::load(&self.job.site_folder, locale).await {
            Ok(reuse) => reuse,
            Err(e) => {
                self.reporter.error_with("ignoring shared slots", &e);
                SlotReuse::default()
            }
        };
        let info = LocaleInfo {
            locale: locale.to_string(),
            default_locale: default_locale.to_string(),
            aliases: site.site_info.locale_aliases.clone(),
        };
        LocaleContext::new(info, device, site, urls, slot_reuse)
    }

    /// Base page model, read once per run.
    async fn base_model(&mut self, id: &str) -> Option<PageModel> {
        if let Some(model) = self.models.get(id) {
            return model.clone();
        }
        let path = self.page_file(id, "");
        let model = match read_json(&path).await {
            Ok(Some(value)) => match serde_json::from_value::<PageModel>(value) {
                Ok(model) => Some(model),
                Err(e) => {
                    self.reporter
                        .error_with(format!("invalid page model {}", path.display()), &e);
                    None
                }
            },
            Ok(None) => {
                self.reporter
                    .error(format!("page {id} has no model at {}", path.display()));
                None
            }
            Err(e) => {
                self.reporter.error_with("cannot read page model", &e);
                None
            }
        };
        self.models.insert(id.to_string(), model.clone());
        model
    }

    fn page_file(&self, id: &str, locale: &str) -> PathBuf {
        let name = if locale.is_empty() {
            format!("{id}.json")
        } else {
            format!("{locale}_{id}.json")
        };
        self.job.site_folder.join(PAGES_FOLDER).join(name)
    }

    async fn overlay(&self, id: &str, locale: &str) -> Option<Value> {
        if locale.is_empty() {
            return None;
        }
        match read_json(&self.page_file(id, locale)).await {
            Ok(overlay) => overlay,
            Err(e) => {
                self.reporter
                    .error_with(format!("ignoring {locale} overlay of page {id}"), &e);
                None
            }
        }
    }

    async fn compile_page(
        &mut self,
        ctx: &LocaleContext,
        node: &PageNode,
        detail_item: Option<&crate::types::ContentItem>,
    ) -> Option<PageState> {
        let Some(model) = self.base_model(&node.id).await else {
            return None;
        };
        let overlay = self.overlay(&node.id, &ctx.locale.locale).await;
        tracing::debug!(
            page = %node.id,
            locale = %ctx.locale.locale,
            device = %ctx.device,
            "compiling page"
        );
        let compiler = PageCompiler {
            job: self.job,
            locale: ctx,
            reporter: self.reporter,
            content: self.content,
            items: &self.items,
            components: &self.components,
            hooks: &self.hooks,
        };
        let outcome = compiler
            .compile(&PageRequest {
                node,
                model: &model,
                overlay: overlay.as_ref(),
                detail_item,
            })
            .await;
        Some(outcome.state)
    }

    /// Compile requested detail pages until no new request appears.
    async fn drain_detail_pages(&mut self, contexts: &[LocaleContext], summary: &mut RunSummary) {
        loop {
            let grouped = self.items.take_detail_requests();
            if grouped.is_empty() {
                break;
            }
            for (locale, requests) in grouped {
                let Some(ctx) = contexts.iter().find(|c| c.locale.locale == locale) else {
                    continue;
                };
                for request in requests {
                    let Some(node) = ctx.nav.get(&request.detail_page_id) else {
                        self.reporter.warn(format!(
                            "detail page {} not in structure",
                            request.detail_page_id
                        ));
                        continue;
                    };
                    let mut node = node.clone();
                    node.page_url = detail_path(&node.page_url, &request.content_item);
                    let state = self
                        .compile_page(ctx, &node, Some(&request.content_item))
                        .await;
                    tally(summary, state, true);
                }
            }
        }
    }

    async fn write_bootstrap(&self, ctx: &LocaleContext) {
        let relative = bootstrap_path(&ctx.locale.locale);
        match write_page(&self.job.output_folder, &relative, &bootstrap_script(ctx)).await {
            Ok(path) => tracing::debug!(path = %path.display(), "wrote bootstrap"),
            Err(e) => self.reporter.error_with("failed to write bootstrap", &e),
        }
    }
}

fn tally(summary: &mut RunSummary, state: Option<PageState>, detail: bool) {
    match state {
        Some(PageState::Written) if detail => summary.detail_pages_written += 1,
        Some(PageState::Written) => summary.pages_written += 1,
        _ => summary.pages_failed += 1,
    }
}
