//! Site structure and site info resolution per locale.
//!
//! A site export carries one base navigation tree and one base site info
//! document, plus sparse per-locale overlays:
//!
//! ```text
//! site/
//! ├── structure.json          # {"base": {"navRoot": 100, "pages": [...]}}
//! ├── siteinfo.json           # {"base": {"properties": {...}}}
//! ├── fr-FR_structure.json    # overlay; may embed "siteInfo" inline
//! ├── fr-FR_siteinfo.json     # overlay
//! └── _folder.json            # folder-level settings
//! ```
//!
//! Resolving a locale deep-merges the overlays onto the base documents.
//! Objects merge key-by-key and arrays are replaced wholesale, except for the
//! page list, which is merged entry-by-entry matched by `id`.
//!
//! A missing or unparsable `structure.json` is the one fatal error of a
//! compile run. A locale that ships a structure overlay but no site info
//! overlay is only accepted when the structure overlay embeds its site info.

use crate::config::CompileConfig;
use crate::merge::{ArrayMerge, merge_by_id, merge_json};
use crate::types::{ChannelAccessToken, DEFAULT_TOKEN_NAME, SiteInfo, SiteStructure};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use walkdir::WalkDir;

const STRUCTURE_FILE: &str = "structure.json";
const SITEINFO_FILE: &str = "siteinfo.json";
const FOLDER_FILE: &str = "_folder.json";

#[derive(Error, Debug)]
pub enum StructureError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Root structure file not found: {0}")]
    MissingStructure(PathBuf),
    #[error("No site info: neither {0} nor an inline siteInfo exists")]
    MissingSiteInfo(PathBuf),
    #[error("Locale {0} has a structure overlay but no site info")]
    MissingLocaleSiteInfo(String),
    #[error("Structure has no root page")]
    NoRoot,
}

/// Folder-level settings (`_folder.json`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FolderSettings {
    pub site_name: Option<String>,
    pub theme_name: Option<String>,
    /// User-agent patterns that select the mobile variant.
    pub mobile_user_agents: Vec<String>,
}

impl FolderSettings {
    pub fn has_mobile_rule(&self) -> bool {
        self.mobile_user_agents.iter().any(|p| !p.trim().is_empty())
    }
}

/// Merged structure and site info for one locale.
#[derive(Debug, Clone)]
pub struct ResolvedSite {
    pub site_info: SiteInfo,
    /// Merged site info properties as JSON, for tokens and render info.
    pub site_info_value: Value,
    pub structure: SiteStructure,
    pub theme_name: String,
    pub design_name: String,
}

/// Reads and merges the structure/siteinfo documents of one site folder.
///
/// Successful resolutions are memoized per locale for the resolver's
/// lifetime; failures are not cached.
pub struct StructureResolver<'a> {
    site_folder: &'a Path,
    settings: &'a CompileConfig,
    folder: FolderSettings,
    resolved: Mutex<HashMap<String, ResolvedSite>>,
}

/// Read a JSON document; `Ok(None)` if the file does not exist.
pub async fn read_json(path: &Path) -> Result<Option<Value>, StructureError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StructureError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| StructureError::Json {
            path: path.to_path_buf(),
            source,
        })
}

fn locale_file(locale: &str, name: &str) -> String {
    format!("{locale}_{name}")
}

/// Locales that ship a structure overlay, sorted.
pub fn discover_locales(site_folder: &Path) -> Vec<String> {
    let suffix = format!("_{STRUCTURE_FILE}");
    let mut locales: Vec<String> = WalkDir::new(site_folder)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            e.file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(&suffix))
                .filter(|locale| !locale.is_empty())
                .map(str::to_string)
        })
        .collect();
    locales.sort();
    locales
}

/// Compute the URL prefix of the site root, always ending in `/`.
pub fn site_root_prefix(settings: &CompileConfig, site_name: &str) -> String {
    if let Some(prefix) = &settings.site_root_prefix {
        let trimmed = prefix.trim_matches('/');
        return if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        };
    }
    let name = if settings.site_name.is_empty() {
        site_name
    } else {
        settings.site_name.as_str()
    };
    match (name.is_empty(), settings.secure_site) {
        (true, _) => "/".to_string(),
        (false, true) => format!("/site/authsite/{name}/"),
        (false, false) => format!("/site/{name}/"),
    }
}

/// Replace any `defaultToken` entries with `token`, or keep only the last
/// existing one when no token is supplied.
pub fn refresh_default_token(tokens: &mut Vec<ChannelAccessToken>, token: Option<&str>) {
    let existing = tokens
        .iter()
        .rev()
        .find(|t| t.name == DEFAULT_TOKEN_NAME)
        .cloned();
    tokens.retain(|t| t.name != DEFAULT_TOKEN_NAME);
    let refreshed = match token {
        Some(value) => Some(ChannelAccessToken {
            name: DEFAULT_TOKEN_NAME.to_string(),
            value: value.to_string(),
            expiration_date: None,
        }),
        None => existing,
    };
    tokens.extend(refreshed);
}

impl<'a> StructureResolver<'a> {
    pub async fn new(
        site_folder: &'a Path,
        settings: &'a CompileConfig,
    ) -> Result<Self, StructureError> {
        let folder = match read_json(&site_folder.join(FOLDER_FILE)).await? {
            Some(value) => {
                serde_json::from_value(value).map_err(|source| StructureError::Json {
                    path: site_folder.join(FOLDER_FILE),
                    source,
                })?
            }
            None => FolderSettings::default(),
        };
        Ok(Self {
            site_folder,
            settings,
            folder,
            resolved: Mutex::new(HashMap::new()),
        })
    }

    pub fn folder_settings(&self) -> &FolderSettings {
        &self.folder
    }

    /// Load the base documents only. Fatal for the run on failure.
    pub async fn load_base(&self) -> Result<(Value, Value), StructureError> {
        let structure_path = self.site_folder.join(STRUCTURE_FILE);
        let structure = read_json(&structure_path)
            .await?
            .ok_or_else(|| StructureError::MissingStructure(structure_path.clone()))?;

        let siteinfo_path = self.site_folder.join(SITEINFO_FILE);
        let site_info = match read_json(&siteinfo_path).await? {
            Some(doc) => site_info_properties(&doc),
            None => structure
                .get("siteInfo")
                .map(site_info_properties)
                .ok_or(StructureError::MissingSiteInfo(siteinfo_path))?,
        };
        Ok((structure, site_info))
    }

    /// Merge base and locale documents for `locale`.
    ///
    /// `locale` may be the default language; its overlay files are optional.
    pub async fn resolve(&self, locale: &str) -> Result<ResolvedSite, StructureError> {
        if let Some(site) = self.cached(locale) {
            return Ok(site);
        }
        let site = self.read_locale(locale).await?;
        if let Ok(mut cache) = self.resolved.lock() {
            cache.insert(locale.to_string(), site.clone());
        }
        Ok(site)
    }

    fn cached(&self, locale: &str) -> Option<ResolvedSite> {
        self.resolved.lock().ok()?.get(locale).cloned()
    }

    async fn read_locale(&self, locale: &str) -> Result<ResolvedSite, StructureError> {
        let (base_structure, base_info) = self.load_base().await?;

        let structure_overlay = if locale.is_empty() {
            None
        } else {
            read_json(
                &self
                    .site_folder
                    .join(locale_file(locale, STRUCTURE_FILE)),
            )
            .await?
        };
        let info_overlay = if locale.is_empty() {
            None
        } else {
            read_json(&self.site_folder.join(locale_file(locale, SITEINFO_FILE))).await?
        };

        let info_overlay = match (info_overlay, &structure_overlay) {
            (Some(doc), _) => Some(site_info_properties(&doc)),
            (None, Some(overlay)) => match overlay.get("siteInfo") {
                Some(inline) => Some(site_info_properties(inline)),
                None => return Err(StructureError::MissingLocaleSiteInfo(locale.to_string())),
            },
            (None, None) => None,
        };

        let site_info_value = match info_overlay {
            Some(overlay) => merge_json(base_info, overlay, ArrayMerge::Replace),
            None => base_info,
        };
        let structure_value = merge_structure(
            base_structure.get("base").cloned().unwrap_or_else(|| json!({})),
            structure_overlay.as_ref().and_then(|o| o.get("base")).cloned(),
        );

        let structure: SiteStructure =
            serde_json::from_value(structure_value).map_err(|source| StructureError::Json {
                path: self.site_folder.join(STRUCTURE_FILE),
                source,
            })?;
        if structure.root().is_none() {
            return Err(StructureError::NoRoot);
        }

        let mut site_info: SiteInfo = serde_json::from_value(site_info_value.clone())
            .map_err(|source| StructureError::Json {
                path: self.site_folder.join(SITEINFO_FILE),
                source,
            })?;
        refresh_default_token(
            &mut site_info.channel_access_tokens,
            self.settings.channel_token.as_deref(),
        );
        if site_info.theme_name.is_empty()
            && let Some(theme) = &self.folder.theme_name
        {
            site_info.theme_name = theme.clone();
        }
        if site_info.site_name.is_empty()
            && let Some(name) = &self.folder.site_name
        {
            site_info.site_name = name.clone();
        }
        // Keep the JSON view consistent with the typed view.
        let site_info_value = serde_json::to_value(&site_info).unwrap_or(site_info_value);

        let design_name = if site_info.design_name.is_empty() {
            "default".to_string()
        } else {
            site_info.design_name.clone()
        };
        Ok(ResolvedSite {
            theme_name: site_info.theme_name.clone(),
            design_name,
            site_info,
            site_info_value,
            structure,
        })
    }
}

/// `{"base": {"properties": {...}}}`, `{"properties": {...}}` or a bare map.
fn site_info_properties(doc: &Value) -> Value {
    let base = doc.get("base").unwrap_or(doc);
    base.get("properties").unwrap_or(base).clone()
}

/// Merge a structure overlay: pages by id, everything else key-by-key.
fn merge_structure(base: Value, overlay: Option<Value>) -> Value {
    let Some(mut overlay) = overlay else {
        return base;
    };
    let mut base = base;
    let base_pages = take_array(&mut base, "pages");
    let overlay_pages = take_array(&mut overlay, "pages");
    let mut merged = merge_json(base, overlay, ArrayMerge::Replace);
    if let Value::Object(map) = &mut merged {
        map.insert(
            "pages".to_string(),
            Value::Array(merge_by_id(base_pages, overlay_pages)),
        );
    }
    merged
}

fn take_array(value: &mut Value, key: &str) -> Vec<Value> {
    match value.as_object_mut().and_then(|m| m.remove(key)) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, value: Value) {
        fs::write(dir.join(name), value.to_string()).unwrap();
    }

    fn site() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "structure.json",
            json!({"base": {"navRoot": 100, "pages": [
                {"id": 100, "name": "Home", "parentId": null, "pageUrl": "index.html"},
                {"id": 101, "name": "About", "parentId": 100, "pageUrl": "about.html"}
            ]}}),
        );
        write(
            tmp.path(),
            "siteinfo.json",
            json!({"base": {"properties": {
                "siteName": "blog", "themeName": "starter", "defaultLanguage": "en",
                "header": "Base header", "footer": "Base footer",
                "channelAccessTokens": [
                    {"name": "defaultToken", "value": "old1"},
                    {"name": "other", "value": "x"},
                    {"name": "defaultToken", "value": "old2"}
                ]
            }}}),
        );
        tmp
    }

    #[tokio::test]
    async fn default_locale_uses_base_documents() {
        let tmp = site();
        let settings = CompileConfig::default();
        let resolver = StructureResolver::new(tmp.path(), &settings).await.unwrap();
        let resolved = resolver.resolve("en").await.unwrap();
        assert_eq!(resolved.structure.pages.len(), 2);
        assert_eq!(resolved.theme_name, "starter");
        assert_eq!(resolved.design_name, "default");
        // At most one defaultToken survives, the last one.
        let defaults: Vec<_> = resolved
            .site_info
            .channel_access_tokens
            .iter()
            .filter(|t| t.name == DEFAULT_TOKEN_NAME)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].value, "old2");
    }

    #[tokio::test]
    async fn locale_overlay_precedence() {
        let tmp = site();
        write(
            tmp.path(),
            "fr_structure.json",
            json!({"base": {"pages": [
                {"id": 101, "name": "A propos"},
                {"id": 102, "name": "Nouvelles", "parentId": 100, "pageUrl": "news.html"}
            ]}}),
        );
        write(
            tmp.path(),
            "fr_siteinfo.json",
            json!({"base": {"properties": {"header": "En-tete"}}}),
        );
        let settings = CompileConfig::default();
        let resolver = StructureResolver::new(tmp.path(), &settings).await.unwrap();
        let resolved = resolver.resolve("fr").await.unwrap();

        assert_eq!(resolved.site_info.extra["header"], "En-tete");
        assert_eq!(resolved.site_info.extra["footer"], "Base footer");
        let about = resolved.structure.find("101").unwrap();
        assert_eq!(about.name, "A propos");
        assert_eq!(about.page_url, "about.html");
        assert_eq!(resolved.structure.pages.len(), 3);
    }

    #[tokio::test]
    async fn resolved_locales_are_memoized() {
        let tmp = site();
        write(
            tmp.path(),
            "fr_siteinfo.json",
            json!({"base": {"properties": {"header": "En-tete"}}}),
        );
        let settings = CompileConfig::default();
        let resolver = StructureResolver::new(tmp.path(), &settings).await.unwrap();
        let first = resolver.resolve("fr").await.unwrap();

        // Later edits are not seen by the same resolver.
        write(
            tmp.path(),
            "fr_siteinfo.json",
            json!({"base": {"properties": {"header": "Changed"}}}),
        );
        fs::remove_file(tmp.path().join("structure.json")).unwrap();
        let second = resolver.resolve("fr").await.unwrap();
        assert_eq!(second.site_info.extra["header"], first.site_info.extra["header"]);
        assert_eq!(second.structure.pages.len(), 2);

        // Other locales still read the files.
        assert!(resolver.resolve("de").await.is_err());
    }

    #[tokio::test]
    async fn locale_without_siteinfo_needs_inline_site_info() {
        let tmp = site();
        write(tmp.path(), "de_structure.json", json!({"base": {"pages": []}}));
        let settings = CompileConfig::default();
        let resolver = StructureResolver::new(tmp.path(), &settings).await.unwrap();
        assert!(matches!(
            resolver.resolve("de").await,
            Err(StructureError::MissingLocaleSiteInfo(_))
        ));

        write(
            tmp.path(),
            "de_structure.json",
            json!({"base": {"pages": []}, "siteInfo": {"base": {"properties": {"header": "Kopf"}}}}),
        );
        let resolved = resolver.resolve("de").await.unwrap();
        assert_eq!(resolved.site_info.extra["header"], "Kopf");
    }

    #[tokio::test]
    async fn missing_root_structure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let settings = CompileConfig::default();
        let resolver = StructureResolver::new(tmp.path(), &settings).await.unwrap();
        assert!(matches!(
            resolver.resolve("en").await,
            Err(StructureError::MissingStructure(_))
        ));
    }

    #[tokio::test]
    async fn configured_channel_token_replaces_default_token() {
        let tmp = site();
        let settings = CompileConfig {
            channel_token: Some("fresh".into()),
            ..CompileConfig::default()
        };
        let resolver = StructureResolver::new(tmp.path(), &settings).await.unwrap();
        let resolved = resolver.resolve("en").await.unwrap();
        let tokens = &resolved.site_info.channel_access_tokens;
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens.last().unwrap().value, "fresh");
    }

    #[test]
    fn discover_locales_from_overlay_files() {
        let tmp = site();
        write(tmp.path(), "fr_structure.json", json!({}));
        write(tmp.path(), "de-DE_structure.json", json!({}));
        assert_eq!(discover_locales(tmp.path()), vec!["de-DE", "fr"]);
    }

    #[test]
    fn site_root_prefix_variants() {
        let mut settings = CompileConfig::default();
        assert_eq!(site_root_prefix(&settings, "blog"), "/site/blog/");
        assert_eq!(site_root_prefix(&settings, ""), "/");
        settings.secure_site = true;
        assert_eq!(site_root_prefix(&settings, "blog"), "/site/authsite/blog/");
        settings.site_root_prefix = Some("/".into());
        assert_eq!(site_root_prefix(&settings, "blog"), "/");
    }
}
