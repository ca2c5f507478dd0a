//! Shared style and encoding helpers for component compilers.
//!
//! Every component kind accepts the same declarative layout properties
//! (width, margins, border, alignment, per-device visibility). They are
//! collected in [`CommonStyle`], which each kind embeds with
//! `#[serde(flatten)]` next to its own fields.
//!
//! Numeric properties may arrive as numbers or strings; a bare number (or a
//! numeric string) is interpreted as pixels.
//!
//! Any user-controllable string concatenated into markup must pass through
//! one of the encoders at the bottom of this module.

use crate::types::Device;
use serde::Deserialize;
use serde_json::Value;

/// Layout properties shared by all component kinds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommonStyle {
    pub visible: Option<bool>,
    pub visible_on_desktop: Option<bool>,
    pub visible_on_mobile: Option<bool>,
    pub width: Option<Value>,
    pub alignment: Option<String>,
    pub margin_top: Option<Value>,
    pub margin_right: Option<Value>,
    pub margin_bottom: Option<Value>,
    pub margin_left: Option<Value>,
    pub use_style_class: Option<Value>,
    pub style_class: Option<String>,
    pub border_style: Option<String>,
    pub border_width: Option<Value>,
    pub border_color: Option<String>,
    pub border_radius: Option<Value>,
}

impl CommonStyle {
    pub fn from_data(data: &Value) -> Self {
        serde_json::from_value(data.clone()).unwrap_or_default()
    }

    /// `visible` and not explicitly hidden for `device`.
    pub fn can_compile(&self, device: Device) -> bool {
        let device_visible = match device {
            Device::Desktop => self.visible_on_desktop,
            Device::Mobile => self.visible_on_mobile,
        };
        self.visible.unwrap_or(true) && device_visible.unwrap_or(true)
    }

    /// Theme style classes replace inline border styling.
    pub fn uses_style_class(&self) -> bool {
        match &self.use_style_class {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    pub fn width_css(&self) -> String {
        self.width
            .as_ref()
            .and_then(css_length)
            .map(|w| format!("width:{w};"))
            .unwrap_or_default()
    }

    pub fn margin_css(&self) -> String {
        [
            ("margin-top", &self.margin_top),
            ("margin-right", &self.margin_right),
            ("margin-bottom", &self.margin_bottom),
            ("margin-left", &self.margin_left),
        ]
        .iter()
        .filter_map(|(prop, value)| {
            value
                .as_ref()
                .and_then(css_length)
                .map(|v| format!("{prop}:{v};"))
        })
        .collect()
    }

    pub fn border_css(&self) -> String {
        if self.uses_style_class() {
            return String::new();
        }
        let mut css = String::new();
        if let Some(style) = self.border_style.as_deref().filter(|s| !s.is_empty()) {
            css.push_str(&format!("border-style:{};", encode_css(style)));
        }
        if let Some(width) = self.border_width.as_ref().and_then(css_length) {
            css.push_str(&format!("border-width:{width};"));
        }
        if let Some(color) = self.border_color.as_deref().filter(|s| !s.is_empty()) {
            css.push_str(&format!("border-color:{};", encode_css(color)));
        }
        if let Some(radius) = self.border_radius.as_ref().and_then(css_length) {
            css.push_str(&format!("border-radius:{radius};"));
        }
        css
    }

    /// Alignment of the component inside its container.
    pub fn alignment_css(&self) -> String {
        match self.alignment.as_deref() {
            Some("left") => "text-align:left;".to_string(),
            Some("center") => "text-align:center;".to_string(),
            Some("right") => "text-align:right;".to_string(),
            Some("fill") => "display:block;width:100%;".to_string(),
            _ => String::new(),
        }
    }

    /// Width, margin and border declarations for the component's own box.
    pub fn box_css(&self) -> String {
        format!("{}{}{}", self.width_css(), self.margin_css(), self.border_css())
    }

    /// Extra theme class with a leading space. Not escaped.
    pub fn class_suffix(&self) -> String {
        self.style_class
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| format!(" {c}"))
            .unwrap_or_default()
    }
}

/// Numeric-or-string CSS length; bare numbers default to pixels.
pub fn css_length(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(format!("{n}px")),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else if s.parse::<f64>().is_ok() {
                Some(format!("{s}px"))
            } else {
                Some(encode_css(s))
            }
        }
        _ => None,
    }
}

// ============================================================================
// Encoders
// ============================================================================

/// Neutralize script-bearing URL schemes.
///
/// Control characters and whitespace are ignored when matching the scheme,
/// so `java\tscript:` and ` JavaScript:` are caught as well.
pub fn encode_url(url: &str) -> String {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    let normalized = normalized
        .replace("&#58;", ":")
        .replace("&colon;", ":")
        .replace("%3a", ":");
    const DENIED: &[&str] = &["javascript:", "vbscript:", "data:text/html"];
    if DENIED.iter().any(|scheme| normalized.starts_with(scheme)) {
        return String::new();
    }
    url.trim().replace('"', "%22").replace('<', "%3C").replace('>', "%3E")
}

/// Escape a value for use inside a quoted HTML attribute.
pub fn encode_html_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Strip `expression()`, `javascript:` and backslash escapes from a CSS value.
pub fn encode_css(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '\\' | '<' | '>' | '"' | '{' | '}' | ';'))
        .collect();
    let lower = cleaned.to_ascii_lowercase();
    if lower.contains("expression(") || lower.contains("javascript:") || lower.contains("behavior:")
    {
        return String::new();
    }
    cleaned
}
