//! Text surgery on HTML fragments, addressed by element `id`.
//!
//! Compiled component markup is spliced into theme layouts and slot grids by
//! replacing the inner content of placeholder elements such as
//! `<div id="cmp-42"></div>`. Theme layouts are hand-written and routinely
//! malformed (unclosed `<p>`, stray `</div>`, template comments inside
//! attributes), so instead of building a DOM this module works on the text:
//!
//! 1. Scan opening tags until one carries the target `id` (quoting and
//!    attribute order do not matter) and remember its tag name.
//! 2. From the end of that opening tag, scan only tags with the same name,
//!    counting nested opens and closes, until the depth returns to zero.
//!
//! Everything outside the located element is left byte-for-byte intact.
//!
//! None of these functions panic. Anything that cannot be located makes the
//! `Option` returning variants yield `None`, and the `String` returning
//! variants hand back the input unchanged.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Any opening (or self-closing) tag. Closing tags and comments never match.
static OPEN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([A-Za-z][A-Za-z0-9:_-]*)((?:\s+[^<>]*?)?)\s*(/?)>"#).expect("valid regex")
});

/// One attribute: bare name, or name with double/single/unquoted value.
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("valid regex")
});

/// Elements that never have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// A parsed attribute. `value` is `None` for boolean attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

/// The opening tag of an element located by id.
#[derive(Debug, Clone)]
pub struct StartTag {
    /// Byte range of the whole opening tag, `<` through `>`.
    pub range: Range<usize>,
    /// Tag name as written.
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub self_closing: bool,
}

impl StartTag {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Whether the `class` attribute lists `class` as one of its tokens.
    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .and_then(|a| a.value.as_deref())
            .is_some_and(|v| v.split_whitespace().any(|c| c == class))
    }

    fn is_void(&self) -> bool {
        self.self_closing
            || VOID_ELEMENTS
                .iter()
                .any(|v| v.eq_ignore_ascii_case(&self.name))
    }
}

/// Options for [`replace_tag_content`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceOptions<'a> {
    /// Insert before the closing tag instead of replacing the inner content.
    pub append: bool,
    /// Only act if the element carries this class.
    pub verify_class: Option<&'a str>,
}

/// Tokenize an attribute string (`class="a b" hidden data-x=1`).
pub fn parse_attributes(source: &str) -> Vec<Attribute> {
    ATTRIBUTE
        .captures_iter(source)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_string();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string());
            Some(Attribute { name, value })
        })
        .collect()
}

/// Serialize attributes back into ` name="value"` form.
pub fn serialize_attributes(attributes: &[Attribute]) -> String {
    let mut out = String::new();
    for attribute in attributes {
        out.push(' ');
        out.push_str(&attribute.name);
        if let Some(value) = &attribute.value {
            out.push_str("=\"");
            out.push_str(&value.replace('"', "&quot;"));
            out.push('"');
        }
    }
    out
}

/// Locate the opening tag whose `id` attribute equals `id`.
pub fn find_element_by_id(markup: &str, id: &str) -> Option<StartTag> {
    if id.is_empty() {
        return None;
    }
    OPEN_TAG.captures_iter(markup).find_map(|caps| {
        let whole = caps.get(0)?;
        let attr_source = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        // Cheap pre-check before tokenizing every tag in the document.
        if !attr_source.contains(id) {
            return None;
        }
        let attributes = parse_attributes(attr_source);
        let matches = attributes
            .iter()
            .any(|a| a.name.eq_ignore_ascii_case("id") && a.value.as_deref() == Some(id));
        matches.then(|| StartTag {
            range: whole.range(),
            name: caps[1].to_string(),
            attributes,
            self_closing: !caps[3].is_empty(),
        })
    })
}

/// Find the closing tag that balances an element named `tag_name` whose
/// opening tag ends at `from`.
///
/// Nested elements with the same name are counted so that
/// `<div id="x"><div>inner</div>tail</div>` resolves to the outer `</div>`.
/// Returns the byte range of the closing tag.
pub fn find_end_tag(markup: &str, tag_name: &str, from: usize) -> Option<Range<usize>> {
    let rest = markup.get(from..)?;
    let pattern = format!(r"(?i)<(/?){}(?:\s[^<>]*)?>", regex::escape(tag_name));
    let same_name = Regex::new(&pattern).ok()?;

    let mut depth = 1usize;
    for caps in same_name.captures_iter(rest) {
        let whole = caps.get(0)?;
        if !caps[1].is_empty() {
            depth -= 1;
            if depth == 0 {
                return Some(from + whole.start()..from + whole.end());
            }
        } else if !whole.as_str().ends_with("/>") {
            depth += 1;
        }
    }
    None
}

/// Replace (or append to) the inner content of the element with `id`.
///
/// Returns `None`, meaning "leave the markup unchanged", when the element,
/// its closing tag, or the required class cannot be found.
pub fn replace_tag_content(
    markup: &str,
    id: &str,
    value: &str,
    options: ReplaceOptions<'_>,
) -> Option<String> {
    let start = find_element_by_id(markup, id)?;
    if let Some(class) = options.verify_class
        && !start.has_class(class)
    {
        return None;
    }
    if start.is_void() {
        return None;
    }
    let end = find_end_tag(markup, &start.name, start.range.end)?;

    let content_start = if options.append {
        end.start
    } else {
        start.range.end
    };
    let mut out = String::with_capacity(markup.len() + value.len());
    out.push_str(markup.get(..content_start)?);
    out.push_str(value);
    out.push_str(markup.get(end.start..)?);
    Some(out)
}

/// Infallible form of [`replace_tag_content`] without options.
pub fn replace_inner_content(markup: &str, id: &str, value: &str) -> String {
    replace_tag_content(markup, id, value, ReplaceOptions::default())
        .unwrap_or_else(|| markup.to_string())
}

/// Inner content of the element with `id`, if it can be located.
pub fn inner_content<'a>(markup: &'a str, id: &str) -> Option<&'a str> {
    let start = find_element_by_id(markup, id)?;
    if start.is_void() {
        return None;
    }
    let end = find_end_tag(markup, &start.name, start.range.end)?;
    markup.get(start.range.end..end.start)
}

/// Merge `attributes` over the opening tag of the element with `id`.
///
/// New values win; a `None` value writes a bare attribute name. Attribute
/// order of the original tag is preserved, new names are appended.
pub fn replace_tag_attributes(
    markup: &str,
    id: &str,
    attributes: &[(&str, Option<&str>)],
) -> Option<String> {
    let start = find_element_by_id(markup, id)?;
    let mut merged = start.attributes.clone();
    for (name, value) in attributes {
        let value = value.map(str::to_string);
        match merged
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.value = value,
            None => merged.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    let closing = if start.self_closing { " />" } else { ">" };
    let tag = format!("<{}{}{}", start.name, serialize_attributes(&merged), closing);

    let mut out = String::with_capacity(markup.len() + tag.len());
    out.push_str(markup.get(..start.range.start)?);
    out.push_str(&tag);
    out.push_str(markup.get(start.range.end..)?);
    Some(out)
}

/// Infallible form of [`replace_tag_attributes`].
pub fn merge_attributes(markup: &str, id: &str, attributes: &[(&str, Option<&str>)]) -> String {
    replace_tag_attributes(markup, id, attributes).unwrap_or_else(|| markup.to_string())
}

/// Every `id` carried by an opening tag, in document order.
pub fn element_ids(markup: &str) -> Vec<String> {
    OPEN_TAG
        .captures_iter(markup)
        .filter_map(|caps| {
            let source = caps.get(2)?.as_str();
            parse_attributes(source)
                .into_iter()
                .find(|a| a.name.eq_ignore_ascii_case("id"))
                .and_then(|a| a.value)
        })
        .collect()
}

/// Ids of the outermost id-carrying elements, in document order. Ids
/// inside an element that already has one are skipped.
pub fn outer_element_ids(markup: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut skip_until = 0usize;
    for caps in OPEN_TAG.captures_iter(markup) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() < skip_until {
            continue;
        }
        let source = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let Some(id) = parse_attributes(source)
            .into_iter()
            .find(|a| a.name.eq_ignore_ascii_case("id"))
            .and_then(|a| a.value)
        else {
            continue;
        };
        let void = !caps[3].is_empty()
            || VOID_ELEMENTS
                .iter()
                .any(|v| v.eq_ignore_ascii_case(&caps[1]));
        if !void && let Some(end) = find_end_tag(markup, &caps[1], whole.end()) {
            skip_until = end.end;
        }
        ids.push(id);
    }
    ids
}
