//! Named tokens and link macros.
//!
//! Theme layouts, slot grids and component data reference site values
//! through placeholders that are resolved once, at compile time. Two kinds
//! exist:
//!
//! - **Name tokens** (`<!--$SCS_PAGE_TITLE-->`) look up a dotted path in an
//!   evaluation context `{siteInfo, pageModel, pageStructureData, locale}`.
//!   An unresolvable path yields the empty string.
//! - **Macros** produce URLs. Every macro can be written as an HTML comment
//!   (`<!--$SCS_CONTENT_URL-->`) or in bracket form (`[!--$SCS_CONTENT_URL--]`)
//!   so that it survives inside attribute values. Argument macros wrap their
//!   argument: `[!--$SCS_PAGE--]101|tab=2|top[/!--$SCS_PAGE--]`.
//!
//! | Macro | Argument | Result |
//! |-------|----------|--------|
//! | `SCS_CONTENT_URL` | | content root URL |
//! | `SCS_COMP_CATALOG_URL` | | component catalog URL |
//! | `SCS_DIST_FOLDER`, `SCS_DIST_IMG_FOLDER` | | runtime folder URLs |
//! | `SCS_THEME_ROOT`, `SCS_THEME_NAME`, `SCS_DESIGN_NAME` | | theme values |
//! | `SCS_SITE_PATH` | | site root prefix |
//! | `SCS_PAGE` | `id[\|params[\|anchor[\|locale]]]` | page URL |
//! | `SCS_DIGITAL_ASSET` (+ `_PUBLISHED`, `_VIEW`) | `id[,rendition[~format]][,download]` | asset URL |
//! | `SCS_TEL` | phone number | `tel:` URL |
//!
//! Resolved output never contains macro syntax, so running the engine over
//! already-resolved markup changes nothing.

use crate::config::CompileConfig;
use crate::content::{ContentClient, RenditionRequest, default_rendition_url};
use crate::merge::{lookup_path, value_to_text};
use crate::types::PageNode;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Name token → dotted path into the evaluation context.
///
/// The boolean marks values inserted as markup; all others are escaped.
const NAME_TOKENS: &[(&str, &str, bool)] = &[
    ("SCS_PAGE_TITLE", "pageModel.properties.title", false),
    ("SCS_PAGE_DESCRIPTION", "pageModel.properties.pageDescription", false),
    ("SCS_PAGE_KEYWORDS", "pageModel.properties.keywords", false),
    ("SCS_PAGE_HEADER", "pageModel.properties.header", true),
    ("SCS_PAGE_FOOTER", "pageModel.properties.footer", true),
    ("SCS_PAGE_NAME", "pageStructureData.name", false),
    ("SCS_SITE_NAME", "siteInfo.siteName", false),
    ("SCS_SITE_HEADER", "siteInfo.header", true),
    ("SCS_SITE_FOOTER", "siteInfo.footer", true),
    ("SCS_LOCALE", "locale", false),
];

/// Argument macros. Each is resolved by [`MacroContext::resolve_argument`].
const ARGUMENT_MACROS: &[&str] = &[
    "SCS_PAGE",
    "SCS_DIGITAL_ASSET_PUBLISHED",
    "SCS_DIGITAL_ASSET_VIEW",
    "SCS_DIGITAL_ASSET",
    "SCS_TEL",
];

const VIEW_MODE_ONLY: &str = "SCS_VIEW_MODE_ONLY";

/// Default runtime path referenced by theme layouts.
const RUNTIME_PATH: &str = "/_sitesclouddelivery/renderer/";

static VALUE_MACRO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:<!--\$|\[!--\$)(SCS_[A-Z_]+)(?:-->|--\])").expect("valid regex")
});

static ARGUMENT_MACRO_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    ARGUMENT_MACROS
        .iter()
        .map(|name| {
            let pattern = format!(
                r"(?s)(?:<!--\$|\[!--\$){name}(?:-->|--\])(.*?)(?:<!--\$/|\[/!--\$){name}(?:-->|--\])"
            );
            (*name, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
});

static VIEW_MODE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:<!--\$/?|\[/?!--\$){VIEW_MODE_ONLY}(?:-->|--\])"
    ))
    .expect("valid regex")
});

static LAYOUT_INFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--\$SCS_LAYOUT_INFO.*?-->").expect("valid regex"));

static RUNTIME_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)(src|href)\s*=\s*(["']){}"#,
        regex::escape(RUNTIME_PATH)
    ))
    .expect("valid regex")
});

// ============================================================================
// Site URLs
// ============================================================================

/// Per-category base URLs, computed once per locale pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUrls {
    /// Site root prefix, always ending in `/`.
    pub site_prefix: String,
    pub content: String,
    pub component_catalog: String,
    pub dist_folder: String,
    pub dist_img_folder: String,
    pub theme_root: String,
    /// Prefix for site-level generated files (shared bootstrap).
    pub site_files: String,
}

fn cache_suffix(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        format!("/_cache_{key}")
    }
}

impl SiteUrls {
    pub fn new(settings: &CompileConfig, site_prefix: &str, theme_name: &str) -> Self {
        let site_prefix = if site_prefix.ends_with('/') {
            site_prefix.to_string()
        } else {
            format!("{site_prefix}/")
        };
        let keys = &settings.cache_keys;
        // CDN applies to static product/theme/component files only.
        let static_root = match &settings.cdn_url {
            Some(cdn) => format!("{}{}", cdn.trim_end_matches('/'), site_prefix),
            None => site_prefix.clone(),
        };
        let (site_key, content_key) = if settings.secure_site {
            (String::new(), String::new())
        } else {
            (cache_suffix(&keys.site), cache_suffix(&keys.content))
        };
        let dist_folder = format!(
            "{static_root}_sitesclouddelivery/renderer{}",
            cache_suffix(&keys.product)
        );
        Self {
            content: format!("{site_prefix}content{content_key}"),
            component_catalog: format!(
                "{static_root}_compdelivery{}",
                cache_suffix(&keys.component)
            ),
            dist_img_folder: format!("{dist_folder}/app/sdk/images"),
            dist_folder,
            theme_root: format!(
                "{static_root}_themesdelivery/{theme_name}{}",
                cache_suffix(&keys.theme)
            ),
            site_files: format!("{}{}", site_prefix.trim_end_matches('/'), site_key),
            site_prefix,
        }
    }
}

/// Locale facts needed for page links.
#[derive(Debug, Clone, Default)]
pub struct LocaleInfo {
    pub locale: String,
    pub default_locale: String,
    pub aliases: BTreeMap<String, String>,
}

impl LocaleInfo {
    pub fn is_default(&self) -> bool {
        self.locale == self.default_locale
    }

    /// Folder a locale's pages are written under (`""` for the default).
    pub fn segment_for(&self, locale: &str) -> String {
        if locale == self.default_locale || locale.is_empty() {
            String::new()
        } else {
            self.aliases
                .get(locale)
                .cloned()
                .unwrap_or_else(|| locale.to_string())
        }
    }
}

/// `../` repeated once per directory level of `page_url`.
pub fn relative_prefix(page_url: &str) -> String {
    let depth = page_url.trim_start_matches('/').matches('/').count();
    "../".repeat(depth)
}

// ============================================================================
// Macro resolution
// ============================================================================

/// Everything link/macro resolution needs for one page.
pub struct MacroContext<'a> {
    pub urls: &'a SiteUrls,
    pub theme_name: &'a str,
    pub design_name: &'a str,
    pub nav: &'a BTreeMap<String, PageNode>,
    pub locale: &'a LocaleInfo,
    /// URL of the page being compiled (for relative links).
    pub page_url: &'a str,
    pub content: Option<&'a dyn ContentClient>,
    pub channel_token: Option<&'a str>,
}

impl MacroContext<'_> {
    fn resolve_value(&self, name: &str) -> Option<String> {
        let value = match name {
            "SCS_CONTENT_URL" => self.urls.content.clone(),
            "SCS_COMP_CATALOG_URL" => self.urls.component_catalog.clone(),
            "SCS_DIST_FOLDER" => self.urls.dist_folder.clone(),
            "SCS_DIST_IMG_FOLDER" => self.urls.dist_img_folder.clone(),
            "SCS_THEME_ROOT" => self.urls.theme_root.clone(),
            "SCS_THEME_NAME" => self.theme_name.to_string(),
            "SCS_DESIGN_NAME" => self.design_name.to_string(),
            "SCS_SITE_PATH" => self.urls.site_prefix.clone(),
            _ => return None,
        };
        Some(value)
    }

    fn resolve_argument(&self, name: &str, argument: &str) -> String {
        let argument = argument.trim();
        match name {
            "SCS_PAGE" => self.page_link(argument),
            "SCS_TEL" => {
                let number: String = argument
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '+')
                    .collect();
                format!("tel:{number}")
            }
            "SCS_DIGITAL_ASSET_VIEW" => self.asset_link(argument, Some(false)),
            _ => self.asset_link(argument, None),
        }
    }

    /// `id|params|anchor|locale` → page URL.
    pub fn page_link(&self, argument: &str) -> String {
        let mut parts = argument.split('|');
        let id = parts.next().unwrap_or_default().trim();
        let params = parts.next().unwrap_or_default().trim();
        let anchor = parts.next().unwrap_or_default().trim();
        let target_locale = parts
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.locale.locale);

        let Some(node) = self.nav.get(id) else {
            return String::new();
        };
        let mut href = match &node.link_url {
            Some(external) if !external.is_empty() => external.clone(),
            _ => {
                let url = node.page_url.trim_start_matches('/');
                if target_locale == self.locale.locale && !self.locale.is_default() {
                    // Same non-default locale: stay relative so one compiled
                    // tree can be reused for a similar language.
                    format!("{}{url}", relative_prefix(self.page_url))
                } else {
                    let segment = self.locale.segment_for(target_locale);
                    if segment.is_empty() {
                        format!("{}{url}", self.urls.site_prefix)
                    } else {
                        format!("{}{segment}/{url}", self.urls.site_prefix)
                    }
                }
            }
        };
        if !params.is_empty() {
            href.push(if href.contains('?') { '&' } else { '?' });
            href.push_str(params);
        }
        if !anchor.is_empty() {
            href.push('#');
            href.push_str(anchor);
        }
        href
    }

    /// `id[,rendition[~format]][,download]` → asset URL.
    fn asset_link(&self, argument: &str, force_download: Option<bool>) -> String {
        let mut parts = argument.split(',').map(str::trim);
        let id = parts.next().unwrap_or_default();
        if id.is_empty() {
            return String::new();
        }
        let mut rendition = None;
        let mut format = None;
        let mut download = false;
        for part in parts {
            if part.eq_ignore_ascii_case("download") || part.eq_ignore_ascii_case("true") {
                download = true;
            } else if part.eq_ignore_ascii_case("false") || part.is_empty() {
                continue;
            } else if let Some((r, f)) = part.split_once('~') {
                rendition = Some(r).filter(|r| !r.is_empty());
                format = Some(f).filter(|f| !f.is_empty());
            } else {
                rendition = Some(part);
            }
        }
        let request = RenditionRequest {
            id,
            rendition,
            format,
            download: force_download.unwrap_or(download),
        };
        match self.content {
            Some(client) => client.rendition_url(&request),
            None => default_rendition_url(&self.urls.content, &request, self.channel_token),
        }
    }

    /// Replace every macro in `text`. `escape` is applied to each inserted
    /// value (identity for markup, JSON string escaping for structured data).
    fn substitute(&self, text: &str, escape: &dyn Fn(&str) -> String) -> String {
        let mut out = VIEW_MODE_MARKERS.replace_all(text, "").into_owned();
        for (name, pattern) in ARGUMENT_MACRO_PATTERNS.iter() {
            if !out.contains(name) {
                continue;
            }
            out = pattern
                .replace_all(&out, |caps: &Captures<'_>| {
                    escape(&self.resolve_argument(name, &caps[1]))
                })
                .into_owned();
        }
        VALUE_MACRO
            .replace_all(&out, |caps: &Captures<'_>| match self.resolve_value(&caps[1]) {
                Some(value) => escape(&value),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Resolve macros in markup.
    pub fn resolve_links(&self, markup: &str) -> String {
        self.substitute(markup, &|s| s.to_string())
    }

    /// Resolve macros anywhere inside a JSON-compatible structure.
    ///
    /// The value is stringified, substituted with JSON-escaped values, and
    /// reparsed; if reparsing fails the input is returned unchanged.
    pub fn resolve_links_value(&self, value: &Value) -> Value {
        let Ok(text) = serde_json::to_string(value) else {
            return value.clone();
        };
        let resolved = self.substitute(&text, &json_escape);
        serde_json::from_str(&resolved).unwrap_or_else(|_| value.clone())
    }
}

fn json_escape(s: &str) -> String {
    let quoted = serde_json::to_string(s).unwrap_or_default();
    quoted
        .strip_prefix('"')
        .and_then(|q| q.strip_suffix('"'))
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Name tokens and page-level steps
// ============================================================================

/// Escape text for insertion into markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the evaluation context used by name tokens.
pub fn evaluation_context(
    site_info: &Value,
    page_model: &Value,
    page_structure: &Value,
    locale: &str,
) -> Value {
    serde_json::json!({
        "siteInfo": site_info,
        "pageModel": page_model,
        "pageStructureData": page_structure,
        "locale": locale,
    })
}

/// Replace every name token with its value from `context`.
pub fn resolve_name_tokens(markup: &str, context: &Value) -> String {
    let mut out = markup.to_string();
    for (token, path, raw) in NAME_TOKENS {
        if !out.contains(token) {
            continue;
        }
        let value = lookup_path(context, path)
            .map(value_to_text)
            .unwrap_or_default();
        let value = if *raw { value } else { escape_html(&value) };
        for form in [format!("<!--${token}-->"), format!("[!--${token}--]")] {
            out = out.replace(&form, &value);
        }
    }
    out
}

/// Point runtime script references at the resolved runtime folder.
///
/// References that already carry a cache-buster are left alone.
pub fn fix_runtime_paths(markup: &str, urls: &SiteUrls) -> String {
    let replacement_root = format!("{}/", urls.dist_folder);
    if replacement_root == RUNTIME_PATH {
        return markup.to_string();
    }
    let mut out = String::with_capacity(markup.len());
    let mut last = 0;
    for caps in RUNTIME_REFERENCE.captures_iter(markup) {
        let Some(whole) = caps.get(0) else { continue };
        let rest = &markup[whole.end()..];
        out.push_str(&markup[last..whole.start()]);
        if rest.starts_with("_cache_") {
            out.push_str(whole.as_str());
        } else {
            out.push_str(&format!("{}={}{replacement_root}", &caps[1], &caps[2]));
        }
        last = whole.end();
    }
    out.push_str(&markup[last..]);
    out
}

/// Insert `snippet` at `marker`, else before `before` (case-insensitive),
/// else at the end. The marker is always removed.
fn inject_at(markup: &str, marker: &str, before: &str, snippet: &str) -> String {
    let bracket = marker.replace("<!--$", "[!--$").replace("-->", "--]");
    for form in [marker, bracket.as_str()] {
        if let Some(pos) = markup.find(form) {
            let mut out = String::with_capacity(markup.len() + snippet.len());
            out.push_str(&markup[..pos]);
            out.push_str(snippet);
            out.push_str(&markup[pos + form.len()..].replace(form, ""));
            return out;
        }
    }
    if snippet.is_empty() {
        return markup.to_string();
    }
    match markup.to_ascii_lowercase().rfind(before) {
        Some(pos) => format!("{}{snippet}{}", &markup[..pos], &markup[pos..]),
        None => format!("{markup}{snippet}"),
    }
}

pub fn inject_render_info(markup: &str, render_info: &str) -> String {
    inject_at(markup, "<!--$SCS_RENDER_INFO-->", "</head>", render_info)
}

pub fn inject_analytics(markup: &str, analytics: &str) -> String {
    inject_at(markup, "<!--$SCS_ANALYTICS-->", "</body>", analytics)
}

/// Drop the machine-readable layout-info comment.
pub fn remove_layout_info(markup: &str) -> String {
    LAYOUT_INFO.replace_all(markup, "").into_owned()
}

/// Markup injected by the render-info step.
#[derive(Debug, Clone, Default)]
pub struct Injection {
    pub render_info: String,
    pub analytics: String,
}

/// Name tokens → runtime fixups → links/macros.
pub fn resolve_page_tokens(markup: &str, context: &Value, macros: &MacroContext<'_>) -> String {
    let out = resolve_name_tokens(markup, context);
    let out = fix_runtime_paths(&out, macros.urls);
    macros.resolve_links(&out)
}

/// Render info → analytics → layout-info removal.
pub fn apply_injection(markup: &str, injection: &Injection) -> String {
    let out = inject_render_info(markup, &injection.render_info);
    let out = inject_analytics(&out, &injection.analytics);
    remove_layout_info(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheKeys;
    use serde_json::json;

    fn nav() -> BTreeMap<String, PageNode> {
        let pages: Vec<PageNode> = serde_json::from_value(json!([
            {"id": 100, "pageUrl": "index.html"},
            {"id": 101, "parentId": 100, "pageUrl": "about/team.html"},
            {"id": 102, "parentId": 100, "pageUrl": "x.html", "linkUrl": "https://example.com"}
        ]))
        .unwrap();
        pages.into_iter().map(|p| (p.id.clone(), p)).collect()
    }

    fn locale(code: &str) -> LocaleInfo {
        LocaleInfo {
            locale: code.to_string(),
            default_locale: "en".to_string(),
            aliases: BTreeMap::from([("fr-FR".to_string(), "fr".to_string())]),
        }
    }

    fn with_context<R>(locale_code: &str, f: impl FnOnce(&MacroContext<'_>) -> R) -> R {
        let urls = SiteUrls::new(&CompileConfig::default(), "/site/blog", "starter");
        let nav = nav();
        let locale = locale(locale_code);
        let ctx = MacroContext {
            urls: &urls,
            theme_name: "starter",
            design_name: "default",
            nav: &nav,
            locale: &locale,
            page_url: "about/team.html",
            content: None,
            channel_token: None,
        };
        f(&ctx)
    }

    #[test]
    fn site_urls_apply_cache_keys_and_cdn() {
        let settings = CompileConfig {
            cdn_url: Some("https://cdn.example.com/".into()),
            cache_keys: CacheKeys {
                product: "p1".into(),
                content: "c1".into(),
                ..CacheKeys::default()
            },
            ..CompileConfig::default()
        };
        let urls = SiteUrls::new(&settings, "/site/blog/", "starter");
        assert_eq!(
            urls.dist_folder,
            "https://cdn.example.com/site/blog/_sitesclouddelivery/renderer/_cache_p1"
        );
        assert_eq!(urls.content, "/site/blog/content/_cache_c1");
        assert_eq!(urls.theme_root, "https://cdn.example.com/site/blog/_themesdelivery/starter");
    }

    #[test]
    fn secure_site_suppresses_site_and_content_keys() {
        let settings = CompileConfig {
            secure_site: true,
            cache_keys: CacheKeys {
                site: "s1".into(),
                content: "c1".into(),
                theme: "t1".into(),
                ..CacheKeys::default()
            },
            ..CompileConfig::default()
        };
        let urls = SiteUrls::new(&settings, "/", "starter");
        assert_eq!(urls.content, "/content");
        assert_eq!(urls.site_files, "");
        assert!(urls.theme_root.ends_with("/_cache_t1"));
    }

    #[test]
    fn both_macro_syntaxes_resolve() {
        with_context("en", |ctx| {
            let out = ctx.resolve_links(
                r#"<img src="<!--$SCS_CONTENT_URL-->/a.png"><a href="[!--$SCS_SITE_PATH--]">"#,
            );
            assert_eq!(out, r#"<img src="/site/blog/content/a.png"><a href="/site/blog/">"#);
        });
    }

    #[test]
    fn macro_resolution_is_idempotent() {
        with_context("en", |ctx| {
            let markup = r#"<a href="[!--$SCS_PAGE--]101|a=1|top[/!--$SCS_PAGE--]">[!--$SCS_THEME_NAME--]</a>"#;
            let once = ctx.resolve_links(markup);
            assert_eq!(once, r#"<a href="/site/blog/about/team.html?a=1#top">starter</a>"#);
            assert_eq!(ctx.resolve_links(&once), once);
        });
    }

    #[test]
    fn page_link_in_non_default_locale_is_relative() {
        with_context("fr-FR", |ctx| {
            assert_eq!(ctx.page_link("100"), "../index.html");
            // Explicit cross-locale target gets the alias segment.
            assert_eq!(ctx.page_link("100|||en"), "/site/blog/index.html");
        });
        with_context("en", |ctx| {
            assert_eq!(ctx.page_link("100|||fr-FR"), "/site/blog/fr/index.html");
        });
    }

    #[test]
    fn page_link_uses_external_link_url_and_unknown_is_empty() {
        with_context("en", |ctx| {
            assert_eq!(ctx.page_link("102"), "https://example.com");
            assert_eq!(ctx.page_link("999"), "");
        });
    }

    #[test]
    fn tel_and_asset_macros() {
        with_context("en", |ctx| {
            let out = ctx.resolve_links("<!--$SCS_TEL-->+1 (555) 010-2000<!--$/SCS_TEL-->");
            assert_eq!(out, "tel:+15550102000");

            let out = ctx.resolve_links(
                "[!--$SCS_DIGITAL_ASSET--]CONT123,Large~webp,download[/!--$SCS_DIGITAL_ASSET--]",
            );
            assert!(out.contains("CONT123"));
            assert!(out.contains("Large"));
            assert!(out.contains("format=webp"));
            assert!(out.contains("download=true"));

            let view = ctx.resolve_links(
                "[!--$SCS_DIGITAL_ASSET_VIEW--]CONT123,download[/!--$SCS_DIGITAL_ASSET_VIEW--]",
            );
            assert!(!view.contains("download=true"));
        });
    }

    #[test]
    fn view_mode_only_markers_are_dropped() {
        with_context("en", |ctx| {
            let out = ctx.resolve_links("<!--$SCS_VIEW_MODE_ONLY--><p>x</p><!--$/SCS_VIEW_MODE_ONLY-->");
            assert_eq!(out, "<p>x</p>");
        });
    }

    #[test]
    fn unknown_macros_are_left_alone() {
        with_context("en", |ctx| {
            assert_eq!(ctx.resolve_links("<!--$SCS_NOPE-->"), "<!--$SCS_NOPE-->");
        });
    }

    #[test]
    fn resolve_links_value_keeps_shape() {
        with_context("en", |ctx| {
            let value = json!({"href": "[!--$SCS_PAGE--]100[/!--$SCS_PAGE--]", "n": [1, 2]});
            let out = ctx.resolve_links_value(&value);
            assert_eq!(out, json!({"href": "/site/blog/index.html", "n": [1, 2]}));
        });
    }

    #[test]
    fn name_tokens_resolve_and_missing_is_empty() {
        let context = evaluation_context(
            &json!({"siteName": "Blog", "header": "<nav>h</nav>"}),
            &json!({"properties": {"title": "A & B"}}),
            &json!({"name": "Home"}),
            "en",
        );
        let out = resolve_name_tokens(
            "<title><!--$SCS_PAGE_TITLE--></title>[!--$SCS_SITE_HEADER--]<!--$SCS_PAGE_FOOTER-->",
            &context,
        );
        assert_eq!(out, "<title>A &amp; B</title><nav>h</nav>");
    }

    #[test]
    fn runtime_paths_rewritten_once() {
        let settings = CompileConfig {
            cache_keys: CacheKeys {
                product: "9".into(),
                ..CacheKeys::default()
            },
            ..CompileConfig::default()
        };
        let urls = SiteUrls::new(&settings, "/", "t");
        let markup = r#"<script src="/_sitesclouddelivery/renderer/renderer.js"></script>"#;
        let once = fix_runtime_paths(markup, &urls);
        assert_eq!(
            once,
            r#"<script src="/_sitesclouddelivery/renderer/_cache_9/renderer.js"></script>"#
        );
        assert_eq!(fix_runtime_paths(&once, &urls), once);
    }

    #[test]
    fn injection_uses_markers_or_falls_back() {
        let out = apply_injection(
            "<html><head><!--$SCS_LAYOUT_INFO {\"slots\":[]} --></head><body><!--$SCS_ANALYTICS--></body></html>",
            &Injection {
                render_info: "<script>ri</script>".into(),
                analytics: "<script>ga</script>".into(),
            },
        );
        assert_eq!(
            out,
            "<html><head><script>ri</script></head><body><script>ga</script></body></html>"
        );
    }

    #[test]
    fn relative_prefix_counts_directories() {
        assert_eq!(relative_prefix("index.html"), "");
        assert_eq!(relative_prefix("a/b.html"), "../");
        // Detail pages compile at their item URL, which carries the depth.
        assert_eq!(relative_prefix("cars/detail/Car/C1/blue-car"), "../../../../");
    }
}
