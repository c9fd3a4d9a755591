//! Run configuration types
//!
//! `FilterConfig` describes which files a run collects and how large a file
//! may be before it is recorded as skipped. `RunContext` carries everything
//! else a run needs and is immutable once the pipeline starts.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ValidationError;
use crate::pipeline::CancelToken;

/// Default maximum file size read by workers (1MB).
/// Larger files are recorded as skipped rather than read.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_000_000;

/// Upper bound on worker threads for a single run.
pub const MAX_CONCURRENCY: usize = 1024;

/// Output document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
    Markdown,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Markdown => "markdown",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            "markdown" | "md" => Ok(Format::Markdown),
            _ => Err(ValidationError::UnknownFormat(s.to_string())),
        }
    }
}

/// What the writer does with files that were skipped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SkipPolicy {
    /// Emit an entry carrying the skip reason
    #[default]
    Record,
    /// Leave skipped files out of the document (they still reach the ledger)
    Omit,
}

/// Order in which entries appear in the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryOrder {
    /// Whatever the worker pool finishes first
    #[default]
    Arrival,
    /// Collection (traversal) order, at the cost of buffering early arrivals
    Collection,
}

/// Which files are collected and how much of each is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Only collect these extensions (empty = all)
    pub extensions: Vec<String>,
    /// Never collect these extensions
    pub exclude_extensions: Vec<String>,
    /// Glob patterns matched against file names and root-relative paths
    pub ignore: Vec<String>,
    /// Files above this size are recorded as skipped instead of read
    pub max_file_size: u64,
    /// Files above this size are left out of collection entirely
    pub skip_larger_than: Option<u64>,
    /// Include dotfiles and dot-directories
    pub hidden: bool,
    /// Honor .gitignore, .ignore and git exclude files
    pub respect_gitignore: bool,
    /// Only collect files tracked by git
    pub tracked_only: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            exclude_extensions: Vec::new(),
            ignore: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            skip_larger_than: None,
            hidden: false,
            respect_gitignore: true,
            tracked_only: false,
        }
    }
}

impl FilterConfig {
    /// Check that every ignore pattern compiles.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for pattern in &self.ignore {
            glob::Pattern::new(pattern).map_err(|e| ValidationError::Glob {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Everything one run needs besides the filter and the output stream.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Absolute, canonical root directory
    pub root: PathBuf,
    pub format: Format,
    /// Worker count, always at least 1 after `new`
    pub concurrency: usize,
    pub skip_policy: SkipPolicy,
    pub order: EntryOrder,
    pub cancel: CancelToken,
}

impl RunContext {
    /// Build a context, clamping concurrency below 1 up to 1.
    pub fn new(root: PathBuf, format: Format, concurrency: usize) -> Result<Self, ValidationError> {
        let concurrency = concurrency.max(1);
        if concurrency > MAX_CONCURRENCY {
            return Err(ValidationError::Concurrency {
                count: concurrency,
                max: MAX_CONCURRENCY,
            });
        }
        Ok(Self {
            root,
            format,
            concurrency,
            skip_policy: SkipPolicy::default(),
            order: EntryOrder::default(),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.skip_policy = policy;
        self
    }

    pub fn with_order(mut self, order: EntryOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Load a filter configuration from a YAML (or JSON) file.
///
/// Missing keys fall back to `FilterConfig::default()`.
pub fn load_filter_config<P: AsRef<Path>>(path: P) -> Result<FilterConfig, ValidationError> {
    let path = path.as_ref();
    info!(config_path = ?path, "Loading filter configuration");

    let content = fs::read_to_string(path).map_err(|e| ValidationError::ConfigFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    // An empty file deserializes to unit, not a mapping
    if content.trim().is_empty() {
        return Ok(FilterConfig::default());
    }

    let config: FilterConfig =
        serde_yaml::from_str(&content).map_err(|e| ValidationError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    config.validate()?;
    Ok(config)
}

/// Parse a file size string like "5M", "100K", "1G" into bytes.
/// Supports suffixes: K/KB (1024), M/MB (1024^2), G/GB (1024^3)
/// Without suffix, interprets as bytes.
pub fn parse_size(s: &str) -> Result<u64, ValidationError> {
    let upper = s.trim().to_uppercase();
    let (num_str, multiplier) = if let Some(n) = upper.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix('K') {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1)
    } else {
        (upper.as_str(), 1)
    };

    let num: u64 = num_str.trim().parse().map_err(|_| ValidationError::Size {
        input: s.to_string(),
        reason: format!("invalid number: {}", num_str.trim()),
    })?;

    num.checked_mul(multiplier).ok_or_else(|| ValidationError::Size {
        input: s.to_string(),
        reason: "value overflows".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("YAML".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("yml".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("md".parse::<Format>().unwrap(), Format::Markdown);
        assert_eq!(" markdown ".parse::<Format>().unwrap(), Format::Markdown);

        let err = "toml".parse::<Format>().unwrap_err();
        assert!(matches!(err, ValidationError::UnknownFormat(ref s) if s == "toml"));
    }

    #[test]
    fn test_concurrency_clamped_to_one() {
        let ctx = RunContext::new(PathBuf::from("/tmp"), Format::Json, 0).unwrap();
        assert_eq!(ctx.concurrency, 1);
    }

    #[test]
    fn test_concurrency_above_max_rejected() {
        let err = RunContext::new(PathBuf::from("/tmp"), Format::Json, MAX_CONCURRENCY + 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::Concurrency { .. }));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("100").unwrap(), 100);
        assert_eq!(parse_size("10B").unwrap(), 10);
        assert_eq!(parse_size("5K").unwrap(), 5 * 1024);
        assert_eq!(parse_size("5kb").unwrap(), 5 * 1024);
        assert_eq!(parse_size("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let config = FilterConfig {
            ignore: vec!["[unclosed".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Glob { .. })
        ));
    }

    #[test]
    fn test_load_filter_config_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "extensions: [rs, toml]\nignore:\n  - \"target\"\nmax_file_size: 2048\nhidden: true"
        )
        .unwrap();

        let config = load_filter_config(file.path()).unwrap();
        assert_eq!(config.extensions, vec!["rs", "toml"]);
        assert_eq!(config.ignore, vec!["target"]);
        assert_eq!(config.max_file_size, 2048);
        assert!(config.hidden);
        // Unset keys keep their defaults
        assert!(config.respect_gitignore);
        assert!(!config.tracked_only);
    }

    #[test]
    fn test_load_filter_config_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"exclude_extensions": ["lock"], "skip_larger_than": 10}}"#).unwrap();

        let config = load_filter_config(file.path()).unwrap();
        assert_eq!(config.exclude_extensions, vec!["lock"]);
        assert_eq!(config.skip_larger_than, Some(10));
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn test_load_filter_config_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let config = load_filter_config(file.path()).unwrap();
        assert_eq!(config, FilterConfig::default());
    }

    #[test]
    fn test_load_filter_config_missing_file() {
        let err = load_filter_config("/nonexistent/treepack.yaml").unwrap_err();
        assert!(matches!(err, ValidationError::ConfigFile { .. }));
    }

    #[test]
    fn test_load_filter_config_bad_glob() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ignore: [\"[oops\"]").unwrap();
        assert!(matches!(
            load_filter_config(file.path()),
            Err(ValidationError::Glob { .. })
        ));
    }
}
