//! Markdown output formatting
//!
//! `MarkdownSerializer` renders each file as a second-level heading followed
//! by a fenced code block, suitable for documentation or LLM context.

use std::borrow::Cow;
use std::io::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::language::fence_tag_for;

use super::DocumentStats;
use super::format::{Entry, FormatSerializer, write_str};

static BACKTICK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`+").expect("BACKTICK_RUN regex is invalid"));

/// Markdown serializer - heading plus fenced block per file.
pub struct MarkdownSerializer {
    title: String,
}

impl MarkdownSerializer {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
        }
    }
}

fn longest_backtick_run(text: &str) -> usize {
    BACKTICK_RUN
        .find_iter(text)
        .map(|m| m.len())
        .max()
        .unwrap_or(0)
}

/// Fence that cannot be closed early by anything inside `content`.
///
/// # Examples
///
/// ```
/// use treepack::writer::fence_for;
///
/// assert_eq!(fence_for("plain text"), "```");
/// assert_eq!(fence_for("has ```` inside"), "`````");
/// ```
pub fn fence_for(content: &str) -> String {
    "`".repeat((longest_backtick_run(content) + 1).max(3))
}

/// Line breaks become spaces so the text cannot start a new block.
fn single_line(text: &str) -> Cow<'_, str> {
    if text.contains(['\n', '\r']) {
        Cow::Owned(text.replace(['\n', '\r'], " "))
    } else {
        Cow::Borrowed(text)
    }
}

/// Inline code span for a path, widened when the path holds backticks.
fn code_span(text: &str) -> String {
    let text = single_line(text);
    let ticks = "`".repeat(longest_backtick_run(&text) + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{ticks} {text} {ticks}")
    } else {
        format!("{ticks}{text}{ticks}")
    }
}

impl FormatSerializer for MarkdownSerializer {
    fn header(&mut self, out: &mut dyn Write) -> Result<()> {
        write_str(out, &format!("# {}\n\n", single_line(&self.title)))
    }

    fn entry(&mut self, out: &mut dyn Write, entry: &Entry<'_>, _position: usize) -> Result<()> {
        let mut block = format!("## {}\n\n", code_span(entry.path));

        match (entry.content, entry.error.as_deref()) {
            (Some(content), _) => {
                let fence = fence_for(content);
                block.push_str(&fence);
                block.push_str(fence_tag_for(entry.path));
                block.push('\n');
                block.push_str(content);
                if !content.is_empty() && !content.ends_with('\n') {
                    block.push('\n');
                }
                block.push_str(&fence);
                block.push_str("\n\n");
            }
            (None, reason) => {
                let reason = single_line(reason.unwrap_or("unknown"));
                block.push_str("> skipped: ");
                block.push_str(&reason);
                block.push_str("\n\n");
            }
        }

        write_str(out, &block)
    }

    fn footer(&mut self, out: &mut dyn Write, stats: &DocumentStats) -> Result<()> {
        let noun = if stats.included == 1 { "file" } else { "files" };
        write_str(
            out,
            &format!("*{} {}, {} skipped*\n", stats.included, noun, stats.errors),
        )
    }
}
