//! Git repository integration for `tracked_only` collection

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use git2::Repository;

/// Set of files tracked in the git index of the repository enclosing a root.
pub struct GitFilter {
    tracked_files: HashSet<PathBuf>,
    repo_root: PathBuf,
}

impl GitFilter {
    /// Discover the repository containing `path`.
    /// Returns `None` if `path` is not inside a git work tree.
    pub fn new(path: &Path) -> Option<Self> {
        let repo = Repository::discover(path).ok()?;
        let workdir = repo.workdir()?;
        let repo_root = workdir
            .canonicalize()
            .unwrap_or_else(|_| workdir.to_path_buf());
        let tracked_files = Self::collect_tracked_files(&repo, &repo_root)?;

        Some(Self {
            tracked_files,
            repo_root,
        })
    }

    fn collect_tracked_files(repo: &Repository, repo_root: &Path) -> Option<HashSet<PathBuf>> {
        let index = repo.index().ok()?;
        let tracked = index
            .iter()
            .map(|entry| {
                let path_str = String::from_utf8_lossy(&entry.path);
                repo_root.join(path_str.as_ref())
            })
            .collect();
        Some(tracked)
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        if self.tracked_files.contains(path) {
            return true;
        }
        // Collected paths are canonical already; only pay for this on a miss
        match path.canonicalize() {
            Ok(p) => self.tracked_files.contains(&p),
            Err(_) => false,
        }
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked_files.len()
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    fn create_test_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q"]);
        git(dir.path(), &["config", "user.email", "test@test.com"]);
        git(dir.path(), &["config", "user.name", "Test"]);
        dir
    }

    #[test]
    fn test_tracked_and_untracked() {
        let dir = create_test_repo();
        let root = dir.path().canonicalize().unwrap();
        let tracked = root.join("tracked.rs");
        let untracked = root.join("untracked.rs");

        fs::write(&tracked, "fn main() {}").unwrap();
        fs::write(&untracked, "fn other() {}").unwrap();

        git(&root, &["add", "tracked.rs"]);

        let filter = GitFilter::new(&root).unwrap();
        assert!(filter.is_tracked(&tracked));
        assert!(!filter.is_tracked(&untracked));
        assert_eq!(filter.tracked_count(), 1);
        assert_eq!(filter.repo_root(), root.as_path());
    }

    #[test]
    fn test_nested_root_sees_repo_index() {
        let dir = create_test_repo();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("crates/core")).unwrap();
        let inner = root.join("crates/core/lib.rs");
        fs::write(&inner, "pub fn f() {}").unwrap();
        git(&root, &["add", "."]);

        let filter = GitFilter::new(&root.join("crates/core")).unwrap();
        assert_eq!(filter.repo_root(), root.as_path());
        assert!(filter.is_tracked(&inner));
    }

    #[test]
    fn test_not_a_repository() {
        let dir = TempDir::new().unwrap();
        // A temp dir could live under a checkout; only assert when it doesn't
        if Repository::discover(dir.path()).is_err() {
            assert!(GitFilter::new(dir.path()).is_none());
        }
    }
}
