//! Root path resolution and root-relative path display

use std::path::{Component, Path, PathBuf};

use crate::error::{PackError, Result};

/// Resolve a root directory to an absolute, canonical path.
///
/// An empty path means the current directory. Symlinks are resolved.
pub fn resolve_root(path: &Path) -> Result<PathBuf> {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| PackError::fs("read current directory for", path, e))?
            .join(path)
    };

    let resolved = absolute
        .canonicalize()
        .map_err(|e| PackError::fs("resolve", &absolute, e))?;

    let metadata = resolved
        .metadata()
        .map_err(|e| PackError::fs("stat", &resolved, e))?;
    if !metadata.is_dir() {
        return Err(PackError::fs(
            "use as root",
            &resolved,
            std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
        ));
    }

    Ok(resolved)
}

/// Path of `path` relative to `root`, always using `/` separators.
///
/// Paths outside `root` are returned whole.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<_> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        if rel.is_absolute() {
            return rel.to_string_lossy().into_owned();
        }
        return ".".to_string();
    }

    let joined = parts.join("/");
    if rel.has_root() {
        format!("/{}", joined)
    } else {
        joined
    }
}
