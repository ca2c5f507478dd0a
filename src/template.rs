//! Minimal mustache-style templates for file-based components and content
//! layouts.
//!
//! | Syntax | Result |
//! |--------|--------|
//! | `{{path}}` | value at dotted `path`, HTML-escaped |
//! | `{{path\|url}}` | value passed through the URL encoder |
//! | `{{path\|css}}` | value passed through the CSS encoder |
//! | `{{{path}}}` | value inserted raw |
//!
//! Missing paths, objects and arrays render as the empty string; reach into
//! a structured value with a dotted path (`{{images.0.url}}`).

use crate::components::style::{encode_css, encode_html_attr, encode_url};
use crate::merge::{lookup_path, value_to_text};
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\{\s*([\w.-]+)\s*\}\}\}|\{\{\s*([\w.-]+)\s*(?:\|\s*(\w+)\s*)?\}\}")
        .expect("valid regex")
});

/// Render `template` against `data`.
pub fn render(template: &str, data: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            if let Some(raw) = caps.get(1) {
                return lookup(data, raw.as_str());
            }
            let value = lookup(data, &caps[2]);
            match caps.get(3).map(|m| m.as_str()) {
                Some("url") => encode_html_attr(&encode_url(&value)),
                Some("css") => encode_css(&value),
                Some("raw") => value,
                _ => encode_html_attr(&value),
            }
        })
        .into_owned()
}

fn lookup(data: &Value, path: &str) -> String {
    lookup_path(data, path).map(value_to_text).unwrap_or_default()
}
