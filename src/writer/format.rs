//! Format serializer trait and the entry shape shared by every format

use std::io::{self, Write};

use serde::Serialize;

use crate::config::Format;
use crate::error::{PackError, Result};

use super::DocumentStats;
use super::json::JsonSerializer;
use super::markdown::MarkdownSerializer;
use super::yaml::YamlSerializer;

/// One document entry: `{ path, content?, error? }`
#[derive(Debug, Clone, Serialize)]
pub struct Entry<'a> {
    pub path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Encodes the three parts of a document.
///
/// Implementations must produce a valid document for any number of entries,
/// including zero.
pub trait FormatSerializer: Send {
    /// Opening token, written once before any entry
    fn header(&mut self, out: &mut dyn Write) -> Result<()>;

    /// One body entry. `position` is the number of entries already written.
    fn entry(&mut self, out: &mut dyn Write, entry: &Entry<'_>, position: usize) -> Result<()>;

    /// Closing token, written once after the last entry
    fn footer(&mut self, out: &mut dyn Write, stats: &DocumentStats) -> Result<()>;
}

/// Build the serializer for a format.
pub fn serializer_for(format: Format, title: &str) -> Box<dyn FormatSerializer> {
    match format {
        Format::Json => Box::new(JsonSerializer),
        Format::Yaml => Box::new(YamlSerializer),
        Format::Markdown => Box::new(MarkdownSerializer::new(title)),
    }
}

pub(super) fn write_str(out: &mut dyn Write, s: &str) -> Result<()> {
    out.write_all(s.as_bytes())
        .map_err(|e| PackError::output("write", e))
}

pub(super) fn io_error(e: io::Error) -> PackError {
    PackError::output("write", e)
}
