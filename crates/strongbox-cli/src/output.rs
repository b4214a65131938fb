//! Human and JSON rendering of command results
//!
//! Results go to stdout; errors and warnings go to stderr so `--json` output
//! stays parseable.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
    Warn,
    /// Secondary detail under a result
    Info,
    /// Unadorned output such as a listing or document content
    Line,
}

impl Level {
    fn to_stderr(self) -> bool {
        matches!(self, Level::Error | Level::Warn)
    }
}

pub trait OutputFormatter {
    /// Text for one message, or `None` when this format drops it
    fn render(&self, level: Level, message: &str) -> Option<String>;

    fn render_json(&self, value: &Value) -> Option<String>;

    fn emit(&self, level: Level, message: &str) {
        let Some(text) = self.render(level, message) else {
            return;
        };
        if level.to_stderr() {
            eprintln!("{text}");
        } else {
            println!("{text}");
        }
    }

    fn success(&self, message: &str) {
        self.emit(Level::Success, message);
    }
    fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }
    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }
    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }
    fn line(&self, message: &str) {
        self.emit(Level::Line, message);
    }

    fn print_json(&self, value: &Value) {
        if let Some(text) = self.render_json(value) {
            println!("{text}");
        }
    }
}

pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn render(&self, level: Level, message: &str) -> Option<String> {
        Some(match level {
            Level::Success => format!("\u{2713} {message}"),
            Level::Error => format!("\u{2717} Error: {message}"),
            Level::Warn => format!("\u{26a0} Warning: {message}"),
            Level::Info => format!("  {message}"),
            Level::Line => message.to_string(),
        })
    }

    fn render_json(&self, _value: &Value) -> Option<String> {
        None
    }
}

/// One JSON document per result; informational text is dropped
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn render(&self, level: Level, message: &str) -> Option<String> {
        let value = match level {
            Level::Success => json!({ "success": true, "message": message }),
            Level::Error => json!({ "success": false, "error": message }),
            Level::Warn => json!({ "level": "warning", "message": message }),
            Level::Info | Level::Line => return None,
        };
        Some(value.to_string())
    }

    fn render_json(&self, value: &Value) -> Option<String> {
        serde_json::to_string_pretty(value).ok()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(HumanFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Prints `value` as JSON; a value that cannot be serialized prints as null
pub fn print_serialized<T: Serialize>(formatter: &dyn OutputFormatter, value: &T) {
    let json = serde_json::to_value(value).unwrap_or(Value::Null);
    formatter.print_json(&json);
}
