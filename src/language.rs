//! Language detection for Markdown code fences
//!
//! Maps file extensions (and a few well-known file names) to the info string
//! placed after a fence opener, so rendered documents get syntax highlighting.

use std::path::Path;

/// Languages recognized for fence info strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    C,
    Cpp,
    CSharp,
    Java,
    Kotlin,
    Swift,
    Ruby,
    PHP,
    Shell,
    Html,
    Css,
    Json,
    Yaml,
    Toml,
    Markdown,
    Sql,
    Dockerfile,
    Makefile,
}

impl Language {
    /// Detect language from a file extension (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use treepack::language::Language;
    ///
    /// assert_eq!(Language::from_extension("rs"), Some(Language::Rust));
    /// assert_eq!(Language::from_extension("YML"), Some(Language::Yaml));
    /// assert_eq!(Language::from_extension("unknown"), None);
    /// ```
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "rs" => Some(Language::Rust),
            "py" | "pyw" | "pyi" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" | "mts" | "cts" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "c" | "h" => Some(Language::C),
            "cpp" | "cxx" | "cc" | "hpp" | "hxx" | "hh" => Some(Language::Cpp),
            "cs" => Some(Language::CSharp),
            "java" => Some(Language::Java),
            "kt" | "kts" => Some(Language::Kotlin),
            "swift" => Some(Language::Swift),
            "rb" => Some(Language::Ruby),
            "php" => Some(Language::PHP),
            "sh" | "bash" | "zsh" | "fish" => Some(Language::Shell),
            "html" | "htm" => Some(Language::Html),
            "css" | "scss" => Some(Language::Css),
            "json" => Some(Language::Json),
            "yaml" | "yml" => Some(Language::Yaml),
            "toml" => Some(Language::Toml),
            "md" | "markdown" => Some(Language::Markdown),
            "sql" => Some(Language::Sql),
            _ => None,
        }
    }

    /// Detect language from a file path, falling back to well-known file names.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use treepack::language::Language;
    ///
    /// assert_eq!(Language::from_path(Path::new("src/main.rs")), Some(Language::Rust));
    /// assert_eq!(Language::from_path(Path::new("Dockerfile")), Some(Language::Dockerfile));
    /// assert_eq!(Language::from_path(Path::new("LICENSE")), None);
    /// ```
    pub fn from_path(path: &Path) -> Option<Self> {
        if let Some(lang) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
        {
            return Some(lang);
        }

        match path.file_name()?.to_str()? {
            "Dockerfile" | "Containerfile" => Some(Language::Dockerfile),
            "Makefile" | "GNUmakefile" => Some(Language::Makefile),
            _ => None,
        }
    }

    /// Info string for a fenced code block.
    pub fn fence_tag(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Swift => "swift",
            Language::Ruby => "ruby",
            Language::PHP => "php",
            Language::Shell => "bash",
            Language::Html => "html",
            Language::Css => "css",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
            Language::Markdown => "markdown",
            Language::Sql => "sql",
            Language::Dockerfile => "dockerfile",
            Language::Makefile => "makefile",
        }
    }
}

/// Fence info string for a path, or "" when the language is unknown.
pub fn fence_tag_for(path: &str) -> &'static str {
    Language::from_path(Path::new(path))
        .map(|l| l.fence_tag())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension_case_insensitive() {
        assert_eq!(Language::from_extension("RS"), Some(Language::Rust));
        assert_eq!(Language::from_extension("Py"), Some(Language::Python));
        assert_eq!(Language::from_extension("TSX"), Some(Language::TypeScript));
    }

    #[test]
    fn test_fence_tag_for() {
        assert_eq!(fence_tag_for("src/lib.rs"), "rust");
        assert_eq!(fence_tag_for("scripts/run.sh"), "bash");
        assert_eq!(fence_tag_for("docker/Dockerfile"), "dockerfile");
        assert_eq!(fence_tag_for("data.bin"), "");
        assert_eq!(fence_tag_for("LICENSE"), "");
    }
}
