//! JSON output: an array with one compact object per line

use std::io::Write;

use crate::error::{PackError, Result};

use super::DocumentStats;
use super::format::{Entry, FormatSerializer, io_error, write_str};

pub struct JsonSerializer;

impl FormatSerializer for JsonSerializer {
    fn header(&mut self, out: &mut dyn Write) -> Result<()> {
        write_str(out, "[")
    }

    fn entry(&mut self, out: &mut dyn Write, entry: &Entry<'_>, position: usize) -> Result<()> {
        write_str(out, if position == 0 { "\n  " } else { ",\n  " })?;
        serde_json::to_writer(&mut *out, entry).map_err(|e| {
            if e.is_io() {
                io_error(e.into())
            } else {
                PackError::Serialize {
                    path: entry.path.to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }

    fn footer(&mut self, out: &mut dyn Write, stats: &DocumentStats) -> Result<()> {
        write_str(out, if stats.entries == 0 { "]\n" } else { "\n]\n" })
    }
}
