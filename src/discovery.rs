//! Source file discovery.
//!
//! Walks a codebase root while respecting .gitignore rules, filters to
//! source extensions, and applies default plus user-supplied glob excludes.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions the extractors understand, structurally or lexically.
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "ts", "mts", "cts", "tsx", "js", "mjs", "cjs", "jsx", "py",
];

/// Discovers source files under a codebase root.
pub struct FileDiscovery {
    /// Additional include patterns that override excludes
    include_patterns: Vec<String>,
    /// Additional exclude patterns
    exclude_patterns: Vec<String>,
    /// Whether to apply default excludes
    default_excludes: bool,
    /// Whether to include hidden files
    include_hidden: bool,
    /// Max file size in bytes
    max_file_size: u64,
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            default_excludes: true,
            include_hidden: false,
            max_file_size: 2 * 1024 * 1024,
        }
    }
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an include pattern; matching files survive any exclude.
    pub fn with_include(mut self, pattern: &str) -> Self {
        self.include_patterns.push(pattern.to_string());
        self
    }

    /// Add an exclude pattern.
    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.exclude_patterns.push(pattern.to_string());
        self
    }

    /// Disable default excludes.
    pub fn without_default_excludes(mut self) -> Self {
        self.default_excludes = false;
        self
    }

    /// Include hidden files.
    pub fn include_hidden(mut self) -> Self {
        self.include_hidden = true;
        self
    }

    /// Override max file size.
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Discover all matching source files under the given root.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let default_excludes = if self.default_excludes {
            build_globset(default_exclude_patterns())?
        } else {
            GlobSet::empty()
        };
        let user_excludes = build_globset(self.exclude_patterns.iter().map(|s| s.as_str()))?;
        let user_includes = build_globset(self.include_patterns.iter().map(|s| s.as_str()))?;

        let walker = WalkBuilder::new(root)
            .hidden(!self.include_hidden)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false) // honor .gitignore even without a .git dir
            .build();

        let mut files = Vec::<PathBuf>::new();

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }

            let rel = path.strip_prefix(root).unwrap_or(path);
            if is_excluded(rel, &default_excludes, &user_excludes, &user_includes) {
                continue;
            }

            if self.should_include(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Extension and size filter for a single file.
    pub fn should_include(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if !SOURCE_EXTENSIONS.contains(&ext.as_str()) {
            return false;
        }
        let Ok(metadata) = fs::metadata(path) else {
            return false;
        };
        metadata.len() <= self.max_file_size
    }
}

fn default_exclude_patterns() -> Vec<&'static str> {
    vec![
        "**/.git/**",
        "**/.codeintel/**",
        "**/target/**",
        "**/node_modules/**",
        "**/dist/**",
        "**/build/**",
        "**/out/**",
        "**/coverage/**",
        "**/vendor/**",
        "**/.venv/**",
        "**/.next/**",
        "**/*.min.js",
        "**/*.d.ts",
    ]
}

fn build_globset<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::InvalidPattern(format!("{pattern}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::InvalidPattern(e.to_string()))
}

fn is_excluded(path: &Path, default: &GlobSet, user: &GlobSet, include: &GlobSet) -> bool {
    let excluded = default.is_match(path) || user.is_match(path);
    excluded && !include.is_match(path)
}
