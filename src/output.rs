//! CLI output formatting.
//!
//! Each report has a `format_*` function returning lines (pure, tested) and
//! a `print_*` wrapper writing them to stdout.
//!
//! ## Compile report
//!
//! Messages are grouped by the page they were raised on, in first-seen
//! order; run-level messages come first. Debug messages are left out.
//!
//! ```text
//! Site
//!     WARN  content layout 'car-card' unavailable, using the default layout
//! Page 100
//!     ERROR failed to compile component c1 (scs-x): boom
//! Page 200 (C1)
//!     INFO  content list list is paginated, rendered at runtime
//!
//! compiled with 1 errors and 1 warnings
//! ```
//!
//! ## Run summary
//!
//! ```text
//! Pages: 4 written, 1 detail, 0 failed
//! ```

use crate::reporter::{Level, Message};
use crate::site::RunSummary;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn entry_line(message: &Message) -> String {
    let mut line = format!("{}{:<5} {}", indent(1), message.level.label(), message.text);
    if let Some(error) = &message.error {
        line.push_str(": ");
        line.push_str(error);
    }
    line
}

/// Closing line of every report.
pub fn summary_line(errors: usize, warnings: usize) -> String {
    format!("compiled with {errors} errors and {warnings} warnings")
}

/// Grouped compile report followed by the summary line.
pub fn format_report(messages: &[Message]) -> Vec<String> {
    let mut groups: Vec<(Option<&str>, Vec<&Message>)> = Vec::new();
    for message in messages.iter().filter(|m| m.level > Level::Debug) {
        let page = message.page.as_deref();
        match groups.iter_mut().find(|(p, _)| *p == page) {
            Some((_, entries)) => entries.push(message),
            None => groups.push((page, vec![message])),
        }
    }
    // Run-level messages first; pages keep their order.
    groups.sort_by_key(|(page, _)| page.is_some());

    let mut lines = Vec::new();
    for (page, entries) in &groups {
        lines.push(match page {
            Some(page) => format!("Page {page}"),
            None => "Site".to_string(),
        });
        lines.extend(entries.iter().map(|m| entry_line(m)));
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    let errors = messages.iter().filter(|m| m.level == Level::Error).count();
    let warnings = messages.iter().filter(|m| m.level == Level::Warn).count();
    lines.push(summary_line(errors, warnings));
    lines
}

pub fn print_report(messages: &[Message]) {
    for line in format_report(messages) {
        println!("{}", line);
    }
}

pub fn format_run_summary(summary: &RunSummary) -> Vec<String> {
    vec![format!(
        "Pages: {} written, {} detail, {} failed",
        summary.pages_written, summary.detail_pages_written, summary.pages_failed
    )]
}

pub fn print_run_summary(summary: &RunSummary) {
    for line in format_run_summary(summary) {
        println!("{}", line);
    }
}
