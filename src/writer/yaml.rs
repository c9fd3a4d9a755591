//! YAML output: a single document holding a sequence of mappings

use std::io::Write;

use crate::error::{PackError, Result};

use super::DocumentStats;
use super::format::{Entry, FormatSerializer, write_str};

pub struct YamlSerializer;

impl FormatSerializer for YamlSerializer {
    fn header(&mut self, out: &mut dyn Write) -> Result<()> {
        write_str(out, "---\n")
    }

    fn entry(&mut self, out: &mut dyn Write, entry: &Entry<'_>, _position: usize) -> Result<()> {
        // A one-element sequence renders as a single "- " item, so items
        // concatenate into one valid block sequence.
        let item = serde_yaml::to_string(std::slice::from_ref(entry)).map_err(|e| {
            PackError::Serialize {
                path: entry.path.to_string(),
                reason: e.to_string(),
            }
        })?;
        let item = item.strip_prefix("---\n").unwrap_or(&item);
        write_str(out, item)
    }

    fn footer(&mut self, out: &mut dyn Write, stats: &DocumentStats) -> Result<()> {
        if stats.entries == 0 {
            write_str(out, "[]\n")?;
        }
        Ok(())
    }
}
