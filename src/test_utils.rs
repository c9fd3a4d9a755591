//! Test utilities for building temporary source trees.
//!
//! This module is only compiled for tests and benchmarks.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use crate::config::{FilterConfig, Format, RunContext};
use crate::pipeline::{Pipeline, RunOutcome};

/// A temporary directory tree to pack.
///
/// Files are created relative to the root, parents included. With git
/// enabled, `add_file` also stages. The tree is removed when dropped.
pub struct TestTree {
    dir: TempDir,
    git_initialized: bool,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        Self {
            dir,
            git_initialized: false,
        }
    }

    /// Create a tree that is also a git repository.
    pub fn with_git() -> Self {
        let tree = Self::new();
        tree.git(&["init"]);
        tree.git(&["config", "user.email", "test@test.com"]);
        tree.git(&["config", "user.name", "Test"]);
        Self {
            git_initialized: true,
            ..tree
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn git(&self, args: &[&str]) {
        Command::new("git")
            .args(args)
            .current_dir(self.dir.path())
            .output()
            .expect("Failed to run git");
    }

    fn write(&self, path: &str, content: &[u8]) -> PathBuf {
        let full_path = self.dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    /// Add a text file, staging it if git is initialized.
    pub fn add_file(&self, path: &str, content: &str) -> PathBuf {
        let full_path = self.write(path, content.as_bytes());
        if self.git_initialized {
            self.git(&["add", path]);
        }
        full_path
    }

    /// Add a text file without staging it.
    pub fn add_untracked(&self, path: &str, content: &str) -> PathBuf {
        self.write(path, content.as_bytes())
    }

    /// Add a file with arbitrary bytes (binary or invalid UTF-8).
    pub fn add_bytes(&self, path: &str, content: &[u8]) -> PathBuf {
        self.write(path, content)
    }

    /// Add a text file of exactly `size` bytes.
    pub fn add_sized(&self, path: &str, size: usize) -> PathBuf {
        self.write(path, "x".repeat(size).as_bytes())
    }

    /// Add `count` small files spread over a few directories.
    pub fn populate(&self, count: usize) {
        for i in 0..count {
            self.write(
                &format!("dir{}/file{}.txt", i % 7, i),
                format!("file number {i}\n").as_bytes(),
            );
        }
    }

    pub fn commit(&self, message: &str) {
        assert!(self.git_initialized, "Git not initialized");
        self.git(&["commit", "-m", message, "--allow-empty"]);
    }

    /// Context for packing this tree.
    pub fn context(&self, format: Format, workers: usize) -> RunContext {
        RunContext::new(self.path().to_path_buf(), format, workers).expect("Invalid context")
    }

    /// Pack the tree into memory with default filters.
    pub fn pack(&self, format: Format, workers: usize) -> RunOutcome<Vec<u8>> {
        self.pack_with(self.context(format, workers), FilterConfig::default())
    }

    pub fn pack_with(&self, ctx: RunContext, filter: FilterConfig) -> RunOutcome<Vec<u8>> {
        Pipeline::new(ctx, filter)
            .expect("Invalid pipeline")
            .run(Vec::new())
            .expect("Run failed")
    }
}
