//! Text splitting into embeddable chunks.

use std::sync::LazyLock;

use regex::Regex;

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\r?\n|\r").unwrap_or_else(|e| panic!("line break pattern is invalid: {e}"))
});

/// Splits a document into ordered chunks.
pub trait TextSplitter: Send + Sync {
    fn split(&self, text: &str) -> Vec<String>;
}

/// One chunk per line.
///
/// Recognizes `\n`, `\r\n` and `\r`. Empty text yields one empty chunk.
/// Trailing empty lines are dropped, so text made only of line breaks
/// yields nothing; leading and interior empty lines are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineSplitter;

impl TextSplitter for LineSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return vec![String::new()];
        }

        let mut lines: Vec<String> = LINE_BREAK.split(text).map(str::to_string).collect();
        while lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        lines
    }
}
