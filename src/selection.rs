//! File selection for scanning
//!
//! Walks the project tree and picks out the files worth handing to the
//! analyzers: prunes dependency caches and build output, drops generated
//! and binary assets, caps bucket and total counts so a huge repository
//! cannot stall the scan. Respects a project-local `.scanforgeignore`
//! file in gitignore syntax.

use crate::progress::ProgressLog;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory names that are never descended into.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "venv",
    ".venv",
    "env",
    "ENV",
    "build",
    "dist",
    ".git",
    "__pycache__",
    ".pytest_cache",
    "site-packages",
    ".tox",
    ".eggs",
    "vendor",
    "packages",
    "bower_components",
    ".next",
    ".nuxt",
    "coverage",
    "tmp",
    "temp",
    "cache",
    ".cache",
    "logs",
    "log",
];

/// File name suffixes for generated, lock, and binary-asset files.
const SKIP_SUFFIXES: &[&str] = &[
    ".min.js", ".min.css", ".bundle.js", ".chunk.js", ".map", ".lock", ".sum", ".log", ".pyc",
    ".pyo", ".svg", ".png", ".jpg", ".jpeg", ".gif", ".woff", ".woff2", ".ttf", ".eot", ".ico",
];

/// Source extensions the analyzers understand.
const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "vue", "java", "cpp", "c", "h", "hpp", "cs", "go", "rs",
    "php", "rb", "swift", "kt",
];

const JS_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "vue"];

/// Name of the project-local ignore file (gitignore syntax).
pub const IGNORE_FILE: &str = ".scanforgeignore";

/// Limits applied while walking.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Overall cap; the walk stops early once reached.
    pub max_files: usize,
    /// Independent cap per language bucket.
    pub max_per_bucket: usize,
    /// Files larger than this are considered generated and skipped.
    pub max_file_size: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_files: 1000,
            max_per_bucket: 500,
            max_file_size: 1_000_000,
        }
    }
}

/// Selected files, categorized by language bucket.
#[derive(Debug, Clone, Default)]
pub struct SelectedFiles {
    pub python: Vec<PathBuf>,
    pub javascript: Vec<PathBuf>,
    pub other: Vec<PathBuf>,
}

impl SelectedFiles {
    /// All selected files across buckets.
    pub fn all(&self) -> Vec<PathBuf> {
        let mut files =
            Vec::with_capacity(self.python.len() + self.javascript.len() + self.other.len());
        files.extend(self.python.iter().cloned());
        files.extend(self.javascript.iter().cloned());
        files.extend(self.other.iter().cloned());
        files
    }

    pub fn total(&self) -> usize {
        self.python.len() + self.javascript.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Walk `root` and return the categorized, capped file selection.
///
/// Absence of qualifying files is not an error; the caller decides what
/// empty buckets mean for each tool.
pub fn select_files(root: &Path, config: &SelectorConfig, progress: &ProgressLog) -> SelectedFiles {
    progress.push(format!(
        "Selecting source files in {}",
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string())
    ));

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .require_git(false)
        .add_custom_ignore_filename(IGNORE_FILE)
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            !(is_dir && (SKIP_DIRS.contains(&name.as_ref()) || name.starts_with('.')))
        })
        .build();

    let mut selected = SelectedFiles::default();

    for entry in walker.filter_map(|e| e.ok()) {
        if selected.total() >= config.max_files {
            debug!("Reached global file cap ({}); stopping walk", config.max_files);
            break;
        }

        let path = entry.path();
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if should_skip_file(path, config.max_file_size) {
            continue;
        }

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !SOURCE_EXTENSIONS.contains(&ext) {
            continue;
        }

        let bucket = if ext == "py" {
            &mut selected.python
        } else if JS_EXTENSIONS.contains(&ext) {
            &mut selected.javascript
        } else {
            &mut selected.other
        };
        if bucket.len() < config.max_per_bucket {
            bucket.push(path.to_path_buf());
        }
    }

    progress.push(format!(
        "Found {} scannable files (python: {}, javascript: {}, other: {})",
        selected.total(),
        selected.python.len(),
        selected.javascript.len(),
        selected.other.len()
    ));

    selected
}

fn should_skip_file(path: &Path, max_size: u64) -> bool {
    // Unreadable metadata means unreadable file; skip it.
    match path.metadata() {
        Ok(meta) if meta.len() > max_size => return true,
        Ok(_) => {}
        Err(_) => return true,
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    SKIP_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn categorizes_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app.py", "print('hi')\n");
        write(dir.path(), "index.ts", "export {};\n");
        write(dir.path(), "main.go", "package main\n");

        let selected = select_files(dir.path(), &SelectorConfig::default(), &ProgressLog::default());
        assert_eq!(selected.python.len(), 1);
        assert_eq!(selected.javascript.len(), 1);
        assert_eq!(selected.other.len(), 1);
    }

    #[test]
    fn prunes_skip_directories_and_dotdirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app.py", "x = 1\n");
        write(dir.path(), "node_modules/pkg/index.js", "module.exports = {};\n");
        write(dir.path(), "venv/lib/site.py", "pass\n");
        write(dir.path(), ".hidden/secret.py", "pass\n");

        let selected = select_files(dir.path(), &SelectorConfig::default(), &ProgressLog::default());
        assert_eq!(selected.total(), 1);
        assert!(selected.python[0].ends_with("src/app.py"));
    }

    #[test]
    fn skips_generated_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bundle.min.js", "var a=1;\n");
        write(dir.path(), "big.py", &"#".repeat(2_000_000));
        write(dir.path(), "ok.py", "x = 1\n");

        let selected = select_files(dir.path(), &SelectorConfig::default(), &ProgressLog::default());
        assert_eq!(selected.total(), 1);
        assert!(selected.python[0].ends_with("ok.py"));
    }

    #[test]
    fn honors_project_local_ignore_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), IGNORE_FILE, "# generated code\ngenerated_*.py\n");
        write(dir.path(), "generated_models.py", "pass\n");
        write(dir.path(), "handwritten.py", "pass\n");

        let selected = select_files(dir.path(), &SelectorConfig::default(), &ProgressLog::default());
        assert_eq!(selected.total(), 1);
        assert!(selected.python[0].ends_with("handwritten.py"));
    }

    #[test]
    fn respects_caps() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            write(dir.path(), &format!("f{i}.py"), "pass\n");
        }
        let config = SelectorConfig {
            max_files: 10,
            max_per_bucket: 5,
            ..SelectorConfig::default()
        };
        let selected = select_files(dir.path(), &config, &ProgressLog::default());
        assert!(selected.python.len() <= 5);
    }

    #[test]
    fn empty_directory_gives_empty_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let selected = select_files(dir.path(), &SelectorConfig::default(), &ProgressLog::default());
        assert!(selected.is_empty());
    }
}
