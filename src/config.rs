//! Compile job configuration.
//!
//! Handles loading, validating, and merging the site-local `compile.toml`
//! override file. Configuration is layered: stock defaults are overridden by
//! the site's `compile.toml`, and command-line flags override both.
//!
//! ## Override File Location
//!
//! ```text
//! site/
//! ├── compile.toml             # Site-local overrides (optional)
//! ├── structure.json
//! ├── siteinfo.json
//! └── pages/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! site_name = ""                # Target site name (defaults to siteinfo)
//! secure_site = false           # Serve under /site/authsite/<name>
//! # site_root_prefix = "/site/blog"  # Explicit prefix, overrides the two above
//! inline_site_info = false      # Inline bootstrap JSON instead of a shared file
//! alternate_hierarchy = false   # Insert files_folder before every file name
//! files_folder = "_files"
//! # cdn_url = "https://cdn.example.com"
//! # channel_token = "..."
//! # default_detail_page = "200"
//!
//! [cache_keys]
//! product = ""
//! site = ""
//! theme = ""
//! component = ""
//! content = ""
//! ```
//!
//! Unknown keys are rejected to catch typos early. The set of overridable
//! names is deliberately closed: anything describing the job itself (input
//! folders, page selection) comes from the command line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the override file inside the site folder.
pub const OVERRIDE_FILENAME: &str = "compile.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Settings a site may override from `compile.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileConfig {
    /// Target site name; empty means "use the name from siteinfo".
    pub site_name: String,
    /// Secure sites live under `/site/authsite/<name>` and never carry
    /// site/content cache keys.
    pub secure_site: bool,
    /// Explicit site root prefix. Overrides `site_name`/`secure_site`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_root_prefix: Option<String>,
    /// Inline the site bootstrap JSON into every page instead of writing
    /// one shared bootstrap file per locale.
    pub inline_site_info: bool,
    /// Insert `files_folder` before each output file name.
    pub alternate_hierarchy: bool,
    pub files_folder: String,
    /// Rewrite runtime/theme/component URLs onto this origin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn_url: Option<String>,
    /// Channel token written as the site's `defaultToken`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_token: Option<String>,
    /// Detail page used when a component does not configure one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_detail_page: Option<String>,
    /// Per-category cache-buster keys.
    pub cache_keys: CacheKeys,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            site_name: String::new(),
            secure_site: false,
            site_root_prefix: None,
            inline_site_info: false,
            alternate_hierarchy: false,
            files_folder: "_files".to_string(),
            cdn_url: None,
            channel_token: None,
            default_detail_page: None,
            cache_keys: CacheKeys::default(),
        }
    }
}

impl CompileConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.files_folder.trim().is_empty() || self.files_folder.contains('/') {
            return Err(ConfigError::Validation(
                "files_folder must be a single non-empty path segment".into(),
            ));
        }
        if let Some(cdn) = &self.cdn_url
            && !(cdn.starts_with("http://") || cdn.starts_with("https://"))
        {
            return Err(ConfigError::Validation(
                "cdn_url must be an http(s) URL".into(),
            ));
        }
        Ok(())
    }
}

/// Cache-buster keys, one per URL category.
///
/// A non-empty key appends `/_cache_<key>` to the category's base URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheKeys {
    pub product: String,
    pub site: String,
    pub theme: String,
    pub component: String,
    pub content: String,
}

/// Folders and selections that describe one compile job.
///
/// Built once by the caller (the CLI) and never mutated during the run.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub site_folder: PathBuf,
    pub theme_folder: PathBuf,
    pub components_folder: PathBuf,
    pub output_folder: PathBuf,
    /// Restrict compilation to these page ids (empty = all).
    pub pages: Vec<String>,
    /// Include descendants of `pages`.
    pub recurse: bool,
    /// Restrict compilation to these locales (empty = all).
    pub locales: Vec<String>,
    /// Run the mobile pass even without a folder-level mobile rule.
    pub mobile: bool,
    pub settings: CompileConfig,
}

impl JobConfig {
    pub fn new(site_folder: impl Into<PathBuf>, output_folder: impl Into<PathBuf>) -> Self {
        let site_folder = site_folder.into();
        Self {
            theme_folder: site_folder.join("theme"),
            components_folder: site_folder.join("components"),
            site_folder,
            output_folder: output_folder.into(),
            pages: Vec::new(),
            recurse: false,
            locales: Vec::new(),
            mobile: false,
            settings: CompileConfig::default(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(CompileConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `compile.toml` from a site folder as a raw TOML value.
///
/// Returns `Ok(None)` if no override file exists.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_overrides(site_folder: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let path = site_folder.join(OVERRIDE_FILENAME);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CompileConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CompileConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the site's compile settings: stock defaults + `compile.toml`.
pub fn load_config(site_folder: &Path) -> Result<CompileConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_overrides(site_folder)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `compile.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Site Compiler Overrides
# =======================
# Place this file at <site>/compile.toml. All settings are optional and
# the values shown are the defaults. Unknown keys cause an error.

# Target site name. Empty means "use siteName from siteinfo.json".
site_name = ""

# Secure sites are served from /site/authsite/<name> and never receive
# site/content cache-buster suffixes.
secure_site = false

# Explicit URL prefix for the site root; overrides the two settings above.
# site_root_prefix = "/site/blog"

# Inline the bootstrap JSON in every page instead of writing one shared
# bootstrap file per locale.
inline_site_info = false

# Insert the files folder before each file name (a/b.html -> a/_files/b.html).
alternate_hierarchy = false
files_folder = "_files"

# Serve runtime, theme and component files from a CDN origin.
# cdn_url = "https://cdn.example.com"

# Channel token that becomes the site's defaultToken.
# channel_token = ""

# Detail page used when a content component does not name one.
# default_detail_page = ""

# ---------------------------------------------------------------------------
# Cache-buster keys: a non-empty key appends /_cache_<key> to the URL.
# ---------------------------------------------------------------------------
[cache_keys]
product = ""
site = ""
theme = ""
component = ""
content = ""
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = CompileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.files_folder, "_files");
        assert!(!config.inline_site_info);
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert!(!config.secure_site);
        assert!(config.cdn_url.is_none());
    }

    #[test]
    fn load_config_reads_overrides() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(OVERRIDE_FILENAME),
            r#"
inline_site_info = true
cdn_url = "https://cdn.example.com"

[cache_keys]
theme = "t1"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert!(config.inline_site_info);
        assert_eq!(config.cdn_url.as_deref(), Some("https://cdn.example.com"));
        assert_eq!(config.cache_keys.theme, "t1");
        // Unspecified values keep their defaults
        assert_eq!(config.files_folder, "_files");
        assert_eq!(config.cache_keys.product, "");
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(OVERRIDE_FILENAME), "page_filter = [1]\n").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(OVERRIDE_FILENAME), "not toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn validate_rejects_non_http_cdn() {
        let config = CompileConfig {
            cdn_url: Some("ftp://cdn".into()),
            ..CompileConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_nested_files_folder() {
        let config = CompileConfig {
            files_folder: "a/b".into(),
            ..CompileConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("a = 10").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(10));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: CompileConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config.files_folder, "_files");
        assert!(!config.alternate_hierarchy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn job_config_defaults_folders_under_site() {
        let job = JobConfig::new("/srv/site", "/srv/out");
        assert_eq!(job.theme_folder, PathBuf::from("/srv/site/theme"));
        assert_eq!(job.components_folder, PathBuf::from("/srv/site/components"));
    }
}
