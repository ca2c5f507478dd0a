//! Run-wide compile report.
//!
//! Every unit-level failure in a compile run ends up here rather than being
//! propagated: the Reporter records leveled messages under the page that was
//! being compiled when they were raised, and keeps one run-wide flag that
//! flips as soon as an error-level message is recorded. Whether a run passed
//! is a pure function of that flag.
//!
//! Messages are mirrored to `tracing` so a developer running with
//! `RUST_LOG=debug` sees them interleaved with the compiler's own
//! diagnostics. The display level only filters what is echoed to the
//! output stream; it never changes what is recorded or counted.

use std::io::Write;
use std::sync::Mutex;

/// Severity of a report message, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn label(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// One recorded message.
#[derive(Debug, Clone)]
pub struct Message {
    pub level: Level,
    /// Page that was being compiled, if any.
    pub page: Option<String>,
    pub text: String,
    /// Rendered source error, if one was attached.
    pub error: Option<String>,
}

struct State {
    level: Level,
    page: Option<String>,
    messages: Vec<Message>,
    has_errors: bool,
    stream: Option<Box<dyn Write + Send>>,
}

/// Leveled, page-scoped message log with a run-wide failure flag.
pub struct Reporter {
    state: Mutex<State>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    /// A reporter that records everything and echoes nothing.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                level: Level::Info,
                page: None,
                messages: Vec::new(),
                has_errors: false,
                stream: None,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Minimum level echoed to the output stream.
    pub fn set_reporting_level(&self, level: Level) {
        self.with_state(|s| s.level = level);
    }

    /// Attribute subsequent messages to `page` (`None` for run-level).
    pub fn set_page_context(&self, page: Option<&str>) {
        self.with_state(|s| s.page = page.map(str::to_string));
    }

    /// Echo messages at or above the reporting level to `stream`.
    pub fn set_output_stream(&self, stream: Box<dyn Write + Send>) {
        self.with_state(|s| s.stream = Some(stream));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.record(Level::Debug, message.into(), None);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(Level::Info, message.into(), None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(Level::Warn, message.into(), None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(Level::Error, message.into(), None);
    }

    /// Record an error together with its source.
    pub fn error_with(&self, message: impl Into<String>, error: &dyn std::error::Error) {
        self.record(Level::Error, message.into(), Some(error.to_string()));
    }

    fn record(&self, level: Level, text: String, error: Option<String>) {
        self.with_state(|s| {
            let page = s.page.clone();
            let page_field = page.as_deref().unwrap_or("-");
            let detail = error.as_deref().unwrap_or("");
            match level {
                Level::Debug => tracing::debug!(page = page_field, error = detail, "{text}"),
                Level::Info => tracing::info!(page = page_field, error = detail, "{text}"),
                Level::Warn => tracing::warn!(page = page_field, error = detail, "{text}"),
                Level::Error => tracing::error!(page = page_field, error = detail, "{text}"),
            }

            let message = Message {
                level,
                page,
                text,
                error,
            };
            if level >= s.level
                && let Some(stream) = s.stream.as_mut()
            {
                // A broken output stream must not fail the compile.
                let _ = writeln!(stream, "{}", format_message(&message));
            }
            if level == Level::Error {
                s.has_errors = true;
            }
            s.messages.push(message);
        });
    }

    /// True once any error-level message has been recorded.
    pub fn has_errors(&self) -> bool {
        self.with_state(|s| s.has_errors)
    }

    /// Snapshot of every recorded message in recording order.
    pub fn messages(&self) -> Vec<Message> {
        self.with_state(|s| s.messages.clone())
    }

    pub fn count(&self, level: Level) -> usize {
        self.with_state(|s| s.messages.iter().filter(|m| m.level == level).count())
    }

    /// Render the grouped report and the closing summary line.
    pub fn render_report(&self) -> Vec<String> {
        crate::output::format_report(&self.messages())
    }
}

/// Single-line rendering used when echoing to the output stream.
pub fn format_message(message: &Message) -> String {
    let mut line = format!("{:<5}", message.level.label());
    if let Some(page) = &message.page {
        line.push_str(&format!(" [page {page}]"));
    }
    line.push(' ');
    line.push_str(&message.text);
    if let Some(error) = &message.error {
        line.push_str(": ");
        line.push_str(error);
    }
    line
}
