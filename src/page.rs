//! Single-page compilation.
//!
//! A page moves through a fixed sequence of states:
//!
//! ```text
//! Init → LayoutLoaded → PreFilled → ComponentsCompiled → SlotsResolved
//!      → TokensResolved → RenderInfoInjected → Written
//! ```
//!
//! 1. **LayoutLoaded**: read `<theme>/layouts/<name>.html` for the device and
//!    run the layout hook, if any.
//! 2. **PreFilled**: write inline text and image components straight into
//!    the layout.
//! 3. **ComponentsCompiled**: compile every top-level component in the
//!    page's slots, one at a time.
//! 4. **SlotsResolved**: compile container children, wrap each component
//!    in its bounding box and splice it into the slot grid, then the grid
//!    into the layout.
//! 5. **TokensResolved**: name tokens, runtime paths, links and macros.
//! 6. **RenderInfoInjected**: render info, scoped CSS and analytics.
//! 7. **Written**: write under the distribution root.
//!
//! Any failure is reported and the page continues with best-effort markup;
//! only a failed write keeps a page from reaching `Written`.

use crate::components::style::encode_url;
use crate::components::{CompileOutput, ComponentRegistry, basic::sanitize_rich_text, compile_instance};
use crate::config::{CompileConfig, JobConfig};
use crate::content::ContentClient;
use crate::content_layout::{ContentItemResolver, PageItemCache};
use crate::context::{CompileContext, LocaleContext};
use crate::hooks::{HookContext, HookError, HookRegistry, LayoutHook};
use crate::merge::{ArrayMerge, merge_json, value_to_text};
use crate::reporter::Reporter;
use crate::tag_editor::{
    ReplaceOptions, element_ids, find_element_by_id, merge_attributes, parse_attributes,
    replace_inner_content, replace_tag_content, serialize_attributes,
};
use crate::tokens::{Injection, apply_injection, evaluation_context, resolve_page_tokens};
use crate::types::{ComponentInstance, CompiledPage, ContentItem, Device, PageModel, PageNode, Slot};
use regex::Regex;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};
use thiserror::Error;

pub const INLINE_TEXT: &str = "scs-inline-text";
pub const INLINE_IMAGE: &str = "scs-inline-image";
const BOUNDING_BOX_CLASS: &str = "scs-component-bounding-box";
const BOOTSTRAP_FOLDER: &str = "_bootstrap";
const MAX_NESTING: usize = 32;

const FALLBACK_LAYOUT: &str = "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title><!--$SCS_PAGE_TITLE--></title>\n</head>\n<body>\n</body>\n</html>\n";

static BODY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body((?:\s[^<>]*)?)>").expect("valid regex"));

#[derive(Error, Debug)]
pub enum PageError {
    #[error("page has no layout for {0}")]
    NoLayout(Device),
    #[error("cannot read layout {path}: {source}")]
    Layout {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Hook(#[from] HookError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PageState {
    Init,
    LayoutLoaded,
    PreFilled,
    ComponentsCompiled,
    SlotsResolved,
    TokensResolved,
    RenderInfoInjected,
    Written,
}

/// One page to compile.
pub struct PageRequest<'a> {
    /// Navigation node; for a detail page its URL points at the item.
    pub node: &'a PageNode,
    /// Cached base model. Never mutated.
    pub model: &'a PageModel,
    /// `pages/<locale>_<id>.json`, if present.
    pub overlay: Option<&'a Value>,
    pub detail_item: Option<&'a ContentItem>,
}

#[derive(Debug)]
pub struct PageOutcome {
    pub state: PageState,
    pub page: Option<CompiledPage>,
}

struct Compiled {
    kind: String,
    output: CompileOutput,
}

/// Mutable state of one page compile.
struct WorkingPage {
    state: PageState,
    page_id: String,
    model: PageModel,
    markup: String,
    compiled: BTreeMap<String, Compiled>,
    top_level: Vec<String>,
    nested: HashMap<String, ComponentInstance>,
    css: Vec<(String, String)>,
}

impl WorkingPage {
    fn advance(&mut self, state: PageState) {
        tracing::trace!(page = %self.page_id, from = ?self.state, to = ?state, "page state");
        self.state = state;
    }

    fn instance(&self, id: &str) -> Option<&ComponentInstance> {
        self.model
            .component_instances
            .get(id)
            .or_else(|| self.nested.get(id))
    }
}

/// Deep-clone `base` and apply the locale overlay.
///
/// Component data merges index-by-index so a translated array entry only
/// overrides the positions it names.
pub fn working_model(base: &PageModel, overlay: Option<&Value>) -> PageModel {
    let mut model = base.clone();
    if let Some(overlay) = overlay {
        if let Some(properties) = overlay.get("properties") {
            model.properties = merge_json(
                model.properties.clone(),
                properties.clone(),
                ArrayMerge::Replace,
            );
        }
        if let Some(Value::Object(instances)) = overlay.get("componentInstances") {
            for (id, patch) in instances {
                let merged = match model.component_instances.get(id) {
                    Some(existing) => serde_json::to_value(existing)
                        .map(|base| merge_json(base, patch.clone(), ArrayMerge::ByIndex))
                        .unwrap_or_else(|_| patch.clone()),
                    None => patch.clone(),
                };
                if let Ok(instance) = serde_json::from_value::<ComponentInstance>(merged) {
                    model.component_instances.insert(id.clone(), instance);
                }
            }
        }
        if let Some(Value::Object(slots)) = overlay.get("slots") {
            for (id, slot) in slots {
                if let Ok(slot) = serde_json::from_value::<Slot>(slot.clone()) {
                    model.slots.insert(id.clone(), slot);
                }
            }
        }
    }
    for (id, instance) in model.component_instances.iter_mut() {
        if instance.id.is_empty() {
            instance.id = id.clone();
        }
    }
    model
}

/// Grid markup of a slot; generated from the component list when absent.
fn slot_grid(slot: &Slot) -> String {
    if !slot.grid.trim().is_empty() {
        return slot.grid.clone();
    }
    slot.components
        .iter()
        .map(|id| format!("<div id=\"{}\"></div>", crate::components::style::encode_html_attr(id)))
        .collect()
}

/// Prefix every selector of `css` with `scope`. At-rules pass through.
pub fn scope_css(css: &str, scope: &str) -> String {
    if !css.contains('{') {
        return format!("{scope} {{{}}}", css.trim());
    }
    let mut out = String::with_capacity(css.len() + scope.len() * 4);
    for chunk in css.split_inclusive('}') {
        match chunk.split_once('{') {
            Some((selectors, body)) if !selectors.trim_start().starts_with('@') => {
                let scoped: Vec<String> = selectors
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| format!("{scope} {s}"))
                    .collect();
                out.push_str(&scoped.join(","));
                out.push('{');
                out.push_str(body);
            }
            _ => out.push_str(chunk),
        }
    }
    out
}

/// Stable class name for page-level CSS.
pub fn page_selector(locale: &str, page_id: &str) -> String {
    let digest = Sha256::digest(format!("{locale}\0{page_id}").as_bytes());
    let hex = format!("{:x}", digest);
    format!("scs-page-{}", &hex[..10])
}

/// Add `class` to the document's `<body>` tag.
fn add_body_class(markup: &str, class: &str) -> String {
    let Some(caps) = BODY_TAG.captures(markup) else {
        return markup.to_string();
    };
    let (Some(whole), Some(attrs)) = (caps.get(0), caps.get(1)) else {
        return markup.to_string();
    };
    let mut attributes = parse_attributes(attrs.as_str());
    match attributes
        .iter_mut()
        .find(|a| a.name.eq_ignore_ascii_case("class"))
    {
        Some(existing) => {
            let current = existing.value.clone().unwrap_or_default();
            existing.value = Some(format!("{current} {class}").trim().to_string());
        }
        None => attributes.push(crate::tag_editor::Attribute {
            name: "class".into(),
            value: Some(class.to_string()),
        }),
    }
    format!(
        "{}<body{}>{}",
        &markup[..whole.start()],
        serialize_attributes(&attributes),
        &markup[whole.end()..]
    )
}

/// Relative output path of a page.
///
/// A trailing slash means `index.html`; `alternate_hierarchy` moves the
/// file into the files folder of its directory; locale and device prefixes
/// come first. `..` segments are dropped.
pub fn output_path(
    page_url: &str,
    locale_segment: &str,
    device: Device,
    settings: &CompileConfig,
) -> PathBuf {
    let url = page_url.trim_start_matches('/');
    let url = if url.is_empty() || url.ends_with('/') {
        format!("{url}index.html")
    } else {
        url.to_string()
    };
    let url = if settings.alternate_hierarchy {
        match url.rsplit_once('/') {
            Some((dir, file)) => format!("{dir}/{}/{file}", settings.files_folder),
            None => format!("{}/{url}", settings.files_folder),
        }
    } else {
        url
    };

    let mut path = PathBuf::new();
    if device.is_mobile() {
        path.push("mobile");
    }
    if !locale_segment.is_empty() {
        path.push(locale_segment);
    }
    for component in Path::new(&url).components() {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }
    path
}

/// Shared bootstrap file of a locale, relative to the distribution root.
pub fn bootstrap_path(locale: &str) -> PathBuf {
    let name = if locale.is_empty() { "site" } else { locale };
    Path::new(BOOTSTRAP_FOLDER).join(format!("{name}.js"))
}

/// Site-level render info shared by every page of a locale.
pub fn site_render_info(locale: &LocaleContext) -> Value {
    json!({
        "siteInfo": locale.site.site_info_value,
        "structure": locale.site.structure,
        "localeAliases": locale.locale.aliases,
        "defaultLocale": locale.locale.default_locale,
    })
}

/// Contents of the shared bootstrap script.
pub fn bootstrap_script(locale: &LocaleContext) -> String {
    format!(
        "window.SCSRenderInfo = Object.assign(window.SCSRenderInfo || {{}}, {});\n",
        script_json(&site_render_info(locale))
    )
}

/// JSON safe to embed in a `<script>` element.
fn script_json(value: &Value) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/")
        .replace("<!--", "\\u003c!--")
}

pub async fn write_page(root: &Path, relative: &Path, html: &str) -> Result<PathBuf, PageError> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        match tokio::fs::create_dir_all(parent).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(source) => return Err(PageError::Write { path, source }),
        }
    }
    tokio::fs::write(&path, html)
        .await
        .map_err(|source| PageError::Write {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Compiles pages of one (device, locale) pass.
pub struct PageCompiler<'a> {
    pub job: &'a JobConfig,
    pub locale: &'a LocaleContext,
    pub reporter: &'a Reporter,
    pub content: Option<&'a dyn ContentClient>,
    pub items: &'a ContentItemResolver,
    pub components: &'a ComponentRegistry,
    pub hooks: &'a HookRegistry,
}

impl PageCompiler<'_> {
    pub async fn compile(&self, request: &PageRequest<'_>) -> PageOutcome {
        let node = request.node;
        let context_label = match request.detail_item {
            Some(item) => format!("{} ({})", node.id, item.id),
            None => node.id.clone(),
        };
        self.reporter.set_page_context(Some(&context_label));
        let outcome = self.run(request).await;
        self.reporter.set_page_context(None);
        outcome
    }

    async fn run(&self, request: &PageRequest<'_>) -> PageOutcome {
        let node = request.node;
        let device = self.locale.device;
        let page_items = PageItemCache::new();
        let ctx = CompileContext {
            job: self.job,
            locale: self.locale,
            page_id: &node.id,
            page_url: &node.page_url,
            detail_item: request.detail_item,
            reporter: self.reporter,
            content: self.content,
            items: self.items,
            page_items: &page_items,
            components: self.components,
        };
        let mut page = WorkingPage {
            state: PageState::Init,
            page_id: node.id.clone(),
            model: working_model(request.model, request.overlay),
            markup: String::new(),
            compiled: BTreeMap::new(),
            top_level: Vec::new(),
            nested: HashMap::new(),
            css: Vec::new(),
        };

        let layout_name = page
            .model
            .layout_name(device.is_mobile())
            .unwrap_or_default()
            .to_string();
        let hook_ctx = HookContext {
            page_id: &node.id,
            layout: &layout_name,
            locale: &self.locale.locale.locale,
            device,
        };
        let hook = self.load_hook(&layout_name).await;

        page.markup = self.load_layout(&layout_name, device).await;
        if let Some(hook) = &hook {
            page.markup = hook.transform_layout(std::mem::take(&mut page.markup), &hook_ctx);
        }
        self.apply_slot_reuse(&mut page);
        page.advance(PageState::LayoutLoaded);

        self.prefill(&mut page);
        page.advance(PageState::PreFilled);

        self.compile_top_level(&mut page, &ctx).await;
        page.advance(PageState::ComponentsCompiled);

        self.compile_children(&mut page, &ctx).await;
        self.resolve_slots(&mut page);
        page.advance(PageState::SlotsResolved);

        let model_value = serde_json::to_value(&page.model).unwrap_or(Value::Null);
        let node_value = serde_json::to_value(node).unwrap_or(Value::Null);
        let eval = evaluation_context(
            &self.locale.site.site_info_value,
            &model_value,
            &node_value,
            &self.locale.locale.locale,
        );
        let macros = ctx.macros();
        page.markup = resolve_page_tokens(&page.markup, &eval, &macros);
        page.advance(PageState::TokensResolved);

        let injection = self.injection(&mut page, request, &model_value, &ctx);
        page.markup = apply_injection(&page.markup, &injection);
        if let Some(hook) = &hook {
            page.markup = hook.post_process(std::mem::take(&mut page.markup), &hook_ctx);
        }
        page.advance(PageState::RenderInfoInjected);

        let relative = output_path(
            &node.page_url,
            &self.locale.output_segment(),
            device,
            &self.job.settings,
        );
        match write_page(&self.job.output_folder, &relative, &page.markup).await {
            Ok(path) => {
                tracing::debug!(page = %node.id, path = %path.display(), "wrote page");
                page.advance(PageState::Written);
            }
            Err(e) => self.reporter.error_with("failed to write page", &e),
        }
        PageOutcome {
            state: page.state,
            page: Some(CompiledPage {
                html: page.markup,
                path: relative,
            }),
        }
    }

    async fn load_hook(&self, layout: &str) -> Option<Arc<dyn LayoutHook>> {
        if layout.is_empty() {
            return None;
        }
        match self.hooks.hook_for(layout).await {
            Ok(hook) => hook,
            Err(e) => {
                self.reporter
                    .error_with(format!("ignoring hook of layout '{layout}'"), &e);
                None
            }
        }
    }

    async fn load_layout(&self, name: &str, device: Device) -> String {
        if name.is_empty() {
            self.reporter
                .error_with("using fallback layout", &PageError::NoLayout(device));
            return FALLBACK_LAYOUT.to_string();
        }
        let path = self
            .job
            .theme_folder
            .join("layouts")
            .join(format!("{name}.html"));
        match tokio::fs::read_to_string(&path).await {
            Ok(markup) => markup,
            Err(source) => {
                self.reporter.error_with(
                    "using fallback layout",
                    &PageError::Layout { path, source },
                );
                FALLBACK_LAYOUT.to_string()
            }
        }
    }

    /// Shared slots replace page slots of the same id present in the layout.
    fn apply_slot_reuse(&self, page: &mut WorkingPage) {
        let reuse = &self.locale.slot_reuse;
        for (id, slot) in &reuse.slots {
            if find_element_by_id(&page.markup, id).is_some() {
                page.model.slots.insert(id.clone(), slot.clone());
            }
        }
        for (id, instance) in &reuse.component_instances {
            page.model
                .component_instances
                .entry(id.clone())
                .or_insert_with(|| instance.clone());
        }
    }

    /// Inline text and image components are written directly into the layout.
    fn prefill(&self, page: &mut WorkingPage) {
        for (id, instance) in &page.model.component_instances {
            match instance.kind.as_str() {
                INLINE_TEXT => {
                    let text = instance
                        .data
                        .get("text")
                        .map(value_to_text)
                        .unwrap_or_default();
                    match replace_tag_content(
                        &page.markup,
                        id,
                        &sanitize_rich_text(&text),
                        ReplaceOptions::default(),
                    ) {
                        Some(markup) => page.markup = markup,
                        None => self
                            .reporter
                            .debug(format!("inline text {id} not found in layout")),
                    }
                }
                INLINE_IMAGE => {
                    let src = instance
                        .data
                        .get("contentId")
                        .map(value_to_text)
                        .filter(|id| !id.is_empty())
                        .map(|asset| {
                            format!(
                                "[!--$SCS_DIGITAL_ASSET_PUBLISHED--]{asset}[/!--$SCS_DIGITAL_ASSET_PUBLISHED--]"
                            )
                        })
                        .or_else(|| {
                            instance
                                .data
                                .get("imageUrl")
                                .map(|v| encode_url(&value_to_text(v)))
                                .filter(|u| !u.is_empty())
                        });
                    let alt = instance.data.get("altText").map(value_to_text);
                    let mut attributes: Vec<(&str, Option<&str>)> = Vec::new();
                    if let Some(src) = &src {
                        attributes.push(("src", Some(src.as_str())));
                    }
                    if let Some(alt) = &alt {
                        attributes.push(("alt", Some(alt.as_str())));
                    }
                    if !attributes.is_empty() {
                        page.markup = merge_attributes(&page.markup, id, &attributes);
                    }
                }
                _ => {}
            }
        }
    }

    /// Compile the components placed directly in slots, in slot order.
    async fn compile_top_level(&self, page: &mut WorkingPage, ctx: &CompileContext<'_>) {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        for slot in page.model.slots.values() {
            for id in element_ids(&slot_grid(slot)) {
                if page.model.component_instances.contains_key(&id) && seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
        }
        for id in &ids {
            let Some(instance) = page.instance(id).cloned() else {
                continue;
            };
            if matches!(instance.kind.as_str(), INLINE_TEXT | INLINE_IMAGE) {
                continue;
            }
            if let Some(output) = compile_instance(&instance, ctx).await {
                page.compiled.insert(
                    id.clone(),
                    Compiled {
                        kind: instance.kind.clone(),
                        output,
                    },
                );
            }
        }
        page.top_level = ids;
    }

    /// Compile container children and nested instances, breadth first.
    async fn compile_children(&self, page: &mut WorkingPage, ctx: &CompileContext<'_>) {
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        let top_level = page.top_level.clone();
        for id in &top_level {
            self.enqueue_children(page, &mut queue, id, 0);
        }
        while let Some((id, depth)) = queue.pop_front() {
            if page.compiled.contains_key(&id) {
                continue;
            }
            if depth > MAX_NESTING {
                self.reporter
                    .warn(format!("component {id} nested too deeply, skipped"));
                continue;
            }
            let Some(instance) = page.instance(&id).cloned() else {
                continue;
            };
            if let Some(output) = compile_instance(&instance, ctx).await {
                page.compiled.insert(
                    id.clone(),
                    Compiled {
                        kind: instance.kind.clone(),
                        output,
                    },
                );
                self.enqueue_children(page, &mut queue, &id, depth);
            }
        }
    }

    /// Queue the children of a compiled component. Nested instances are
    /// kept only when their kind may be compiled inside another component.
    fn enqueue_children(
        &self,
        page: &mut WorkingPage,
        queue: &mut VecDeque<(String, usize)>,
        id: &str,
        depth: usize,
    ) {
        let Some(compiled) = page.compiled.get(id) else {
            return;
        };
        // Grid markup may carry ids of its own; only instances are children.
        let mut children: Vec<String> = compiled
            .output
            .child_ids
            .iter()
            .filter(|child| {
                let known = page.instance(child).is_some();
                if !known {
                    self.reporter
                        .debug(format!("id {child} in {id} names no component, left as markup"));
                }
                known
            })
            .cloned()
            .collect();
        for nested in compiled.output.nested.clone() {
            if self.components.can_nest(&nested.kind) {
                children.push(nested.id.clone());
                page.nested.entry(nested.id.clone()).or_insert(nested);
            } else {
                self.reporter.info(format!(
                    "nested component {} ({}) left for client-side rendering",
                    nested.id, nested.kind
                ));
            }
        }
        queue.extend(children.into_iter().map(|child| (child, depth + 1)));
    }

    /// Markup of `id` with its children spliced in, wrapped in its
    /// bounding box. `None` when nothing was compiled for it.
    fn assemble(&self, page: &WorkingPage, id: &str, visiting: &mut Vec<String>) -> Option<String> {
        let compiled = page.compiled.get(id)?;
        if compiled.output.content.is_empty() || visiting.iter().any(|v| v == id) {
            return None;
        }
        visiting.push(id.to_string());
        let mut content = compiled.output.content.clone();
        let nested_ids = compiled
            .output
            .nested
            .iter()
            .filter(|n| self.components.can_nest(&n.kind))
            .map(|n| n.id.clone());
        let children: Vec<String> = compiled.output.child_ids.iter().cloned().chain(nested_ids).collect();
        for child in children {
            if let Some(child_markup) = self.assemble(page, &child, visiting) {
                content = replace_inner_content(&content, &child, &child_markup);
            }
        }
        visiting.pop();

        if compiled.output.omit_bounding_box {
            Some(content)
        } else {
            Some(format!(
                "<div class=\"{BOUNDING_BOX_CLASS} scs-{}-bounding-box\">{content}</div>",
                compiled.kind.trim_start_matches("scs-")
            ))
        }
    }

    fn resolve_slots(&self, page: &mut WorkingPage) {
        let slots: Vec<(String, Slot)> = page
            .model
            .slots
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();
        for (slot_id, slot) in slots {
            let mut grid = slot_grid(&slot);
            for id in element_ids(&grid) {
                let mut visiting = Vec::new();
                if let Some(markup) = self.assemble(page, &id, &mut visiting) {
                    grid = replace_inner_content(&grid, &id, &markup);
                }
            }
            match replace_tag_content(&page.markup, &slot_id, &grid, ReplaceOptions::default()) {
                Some(markup) => page.markup = markup,
                None => {
                    self.reporter
                        .warn(format!("slot {slot_id} not found in layout"));
                    continue;
                }
            }
            if let Some(css) = slot.styles.as_deref().filter(|s| !s.trim().is_empty()) {
                page.css.push((format!("#{slot_id}"), css.to_string()));
            }
        }
        for (id, compiled) in &page.compiled {
            if let Some(css) = &compiled.output.styles {
                page.css.push((format!("#{id}"), css.clone()));
            }
        }
    }

    fn injection(
        &self,
        page: &mut WorkingPage,
        request: &PageRequest<'_>,
        model_value: &Value,
        ctx: &CompileContext<'_>,
    ) -> Injection {
        let macros = ctx.macros();
        let components: BTreeMap<&str, Value> = page
            .compiled
            .iter()
            .map(|(id, c)| {
                (
                    id.as_str(),
                    json!({
                        "type": c.kind,
                        "hydrate": c.output.hydrate,
                        "compiled": !c.output.content.is_empty(),
                    }),
                )
            })
            .collect();
        let mut page_info = json!({
            "pageId": page.page_id,
            "locale": self.locale.locale.locale,
            "device": self.locale.device,
            "pageModel": macros.resolve_links_value(model_value),
            "components": components,
        });
        if let Some(item) = request.detail_item {
            page_info["detailItem"] = json!({"id": item.id, "type": item.item_type, "name": item.name});
        }

        let mut render_info = String::new();
        if self.job.settings.inline_site_info {
            if let (Value::Object(info), Value::Object(site)) =
                (&mut page_info, site_render_info(self.locale))
            {
                info.extend(site);
            }
        } else {
            let src = format!(
                "{}/{}",
                self.locale.urls.site_files,
                bootstrap_path(&self.locale.locale.locale).to_string_lossy()
            );
            render_info.push_str(&format!("<script src=\"{src}\"></script>\n"));
        }
        render_info.push_str(&format!(
            "<script type=\"application/json\" id=\"scsRenderInfo\">{}</script>\n",
            script_json(&page_info)
        ));

        if let Some(css) = page
            .model
            .properties
            .get("styles")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
        {
            let class = page_selector(&self.locale.locale.locale, &page.page_id);
            page.markup = add_body_class(&page.markup, &class);
            page.css.insert(0, (format!(".{class}"), css.to_string()));
        }
        if !page.css.is_empty() {
            let css: Vec<String> = page
                .css
                .iter()
                .map(|(scope, css)| scope_css(css, scope))
                .collect();
            render_info.push_str(&format!(
                "<style id=\"scsPageStyles\">{}</style>\n",
                css.join("\n").replace("</", "<\\/")
            ));
        }

        let analytics: Vec<String> = [
            self.locale.site.site_info.extra.get("analytics"),
            page.model.properties.get("analytics"),
        ]
        .into_iter()
        .flatten()
        .map(value_to_text)
        .filter(|s| !s.trim().is_empty())
        .collect();

        Injection {
            render_info,
            analytics: analytics.join("\n"),
        }
    }
}
