//! Test harness for treepack integration tests

use std::path::Path;
use std::process::Command;

pub use treepack::test_utils::TestTree;

/// Result of one CLI invocation
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Parse stdout as a JSON document.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({e}):\n{}", self.stdout))
    }

    /// Paths of a JSON document on stdout, sorted.
    pub fn json_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .json()
            .as_array()
            .expect("document is not an array")
            .iter()
            .map(|e| e["path"].as_str().expect("entry without path").to_string())
            .collect();
        paths.sort();
        paths
    }
}

pub fn run_treepack(dir: &Path, args: &[&str]) -> RunResult {
    let binary = env!("CARGO_BIN_EXE_treepack");
    let output = Command::new(binary)
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run treepack");

    RunResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        code: output.status.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_creates_temp_dir() {
        let tree = TestTree::new();
        assert!(tree.path().exists());
    }

    #[test]
    fn test_harness_git_init() {
        let tree = TestTree::with_git();
        assert!(tree.path().join(".git").exists());
    }

    #[test]
    fn test_harness_add_file() {
        let tree = TestTree::new();
        let file_path = tree.add_file("src/main.rs", "fn main() {}");
        assert!(file_path.exists());
    }
}
