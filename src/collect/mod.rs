//! File collection
//!
//! The `Collector` walks a resolved root and yields one `FileTask` per file
//! that survives the configured filters. The walk is lazy: paths are produced
//! as the dispatcher pulls them, so memory does not grow with tree size.
//!
//! - `filter` - extension, glob and size rules
//! - `git` - tracked-file filter backed by the git index

mod filter;
mod git;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::{Walk, WalkBuilder};
use tracing::{debug, warn};

use crate::config::FilterConfig;
use crate::error::{PackError, Result};
use crate::resolve::relative_path;

pub use filter::PathFilter;
pub use git::GitFilter;

/// One collected file: its absolute path and position in collection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub index: usize,
    pub path: PathBuf,
}

/// Walks a root directory and applies a `FilterConfig`.
pub struct Collector {
    root: PathBuf,
    config: Arc<FilterConfig>,
    filter: Arc<PathFilter>,
}

impl Collector {
    pub fn new(root: &Path, config: Arc<FilterConfig>) -> Result<Self> {
        let filter = PathFilter::new(&config)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
            filter: Arc::new(filter),
        })
    }

    /// Start the walk. Fails if the root itself cannot be read.
    pub fn paths(&self) -> Result<CollectedPaths> {
        std::fs::read_dir(&self.root).map_err(|e| PackError::fs("read", &self.root, e))?;

        let git = if self.config.tracked_only {
            let filter = GitFilter::new(&self.root);
            match &filter {
                Some(git) => debug!(
                    repo = %git.repo_root().display(),
                    tracked = git.tracked_count(),
                    "tracked-only filter enabled"
                ),
                None => warn!(
                    root = %self.root.display(),
                    "not a git repository, tracked-only filter disabled"
                ),
            }
            filter
        } else {
            None
        };

        let respect = self.config.respect_gitignore;
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(!self.config.hidden)
            .ignore(respect)
            .git_ignore(respect)
            .git_global(respect)
            .git_exclude(respect)
            .parents(respect)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        let root = self.root.clone();
        let entry_filter = Arc::clone(&self.filter);
        builder.filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            let rel = relative_path(&root, entry.path());
            !entry_filter.is_ignored(&name, &rel)
        });

        Ok(CollectedPaths {
            walk: builder.build(),
            filter: Arc::clone(&self.filter),
            git,
            next_index: 0,
            skipped_dirs: 0,
        })
    }
}

/// Lazy sequence of collected files. Consumed once.
pub struct CollectedPaths {
    walk: Walk,
    filter: Arc<PathFilter>,
    git: Option<GitFilter>,
    next_index: usize,
    skipped_dirs: usize,
}

impl CollectedPaths {
    /// Entries that could not be traversed and were skipped
    pub fn skipped_dirs(&self) -> usize {
        self.skipped_dirs
    }

    /// Files yielded so far
    pub fn collected(&self) -> usize {
        self.next_index
    }

    fn accepts(&self, path: &Path, size: Option<u64>) -> bool {
        if !self.filter.extension_allowed(path) {
            return false;
        }
        if let Some(size) = size {
            if !self.filter.size_allowed(size) {
                debug!(path = %path.display(), size, "excluded by size threshold");
                return false;
            }
        }
        match &self.git {
            Some(git) => git.is_tracked(path),
            None => true,
        }
    }
}

impl Iterator for CollectedPaths {
    type Item = FileTask;

    fn next(&mut self) -> Option<FileTask> {
        loop {
            let entry = match self.walk.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    self.skipped_dirs += 1;
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let size = entry.metadata().ok().map(|m| m.len());
            if !self.accepts(entry.path(), size) {
                continue;
            }

            let task = FileTask {
                index: self.next_index,
                path: entry.into_path(),
            };
            self.next_index += 1;
            return Some(task);
        }
    }
}
