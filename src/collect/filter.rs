//! Inclusion and exclusion rules applied during collection

use std::collections::HashSet;
use std::path::Path;

use glob::Pattern;

use crate::config::FilterConfig;
use crate::error::ValidationError;

/// Compiled form of a `FilterConfig`, shared by the walk's entry filter.
#[derive(Debug)]
pub struct PathFilter {
    allow_ext: HashSet<String>,
    deny_ext: HashSet<String>,
    patterns: Vec<Pattern>,
    skip_larger_than: Option<u64>,
}

impl PathFilter {
    pub fn new(config: &FilterConfig) -> Result<Self, ValidationError> {
        let patterns = config
            .ignore
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| ValidationError::Glob {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            allow_ext: normalize_extensions(&config.extensions),
            deny_ext: normalize_extensions(&config.exclude_extensions),
            patterns,
            skip_larger_than: config.skip_larger_than,
        })
    }

    /// Check if a path should be ignored based on its name or root-relative path.
    /// Applies to directories too, so a match prunes the whole subtree.
    pub fn is_ignored(&self, name: &str, rel_path: &str) -> bool {
        // Always ignore .git directory
        if name == ".git" {
            return true;
        }

        self.patterns
            .iter()
            .any(|p| p.matches(name) || p.matches(rel_path))
    }

    /// Check the extension allow/deny sets for a file.
    pub fn extension_allowed(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if self.deny_ext.contains(&ext) {
            return false;
        }
        self.allow_ext.is_empty() || self.allow_ext.contains(&ext)
    }

    /// Check the collection-time size threshold.
    pub fn size_allowed(&self, size: u64) -> bool {
        self.skip_larger_than.is_none_or(|max| size <= max)
    }
}

/// Lowercase extensions and strip a leading dot so ".RS" and "rs" match alike.
fn normalize_extensions(exts: &[String]) -> HashSet<String> {
    exts.iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
