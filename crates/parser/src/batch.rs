use crate::error::{ParseError, Result, SkipReason};
use crate::language::Language;
use crate::normalize::NormalizedModule;
use crate::parser::SourceParser;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Finds parseable source files under a root directory
pub struct SourceScanner {
    root: PathBuf,
    max_file_bytes: u64,
    language: Option<Language>,
}

impl SourceScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            language: None,
        }
    }

    /// Keep only files of one language
    #[must_use]
    pub fn only(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// Skip files larger than `bytes`
    #[must_use]
    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    /// Scan for supported source files (.gitignore aware), sorted by path
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true);
        builder.filter_entry(move |entry| !Self::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    let Ok(language) = Language::from_path(path) else {
                        continue;
                    };
                    if self.language.is_some_and(|only| only != language) {
                        continue;
                    }

                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.max_file_bytes {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.max_file_bytes
                            );
                            continue;
                        }
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} source files", files.len());
        files
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    let lowered = name.to_string_lossy().to_lowercase();
                    if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

const IGNORED_SCOPES: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    ".yarn",
    ".npm",
    // caches / builds
    ".cache",
    "node_modules",
    ".next",
    ".turbo",
    ".parcel-cache",
    ".nuxt",
    ".svelte-kit",
    "build",
    "dist",
    "coverage",
    "target",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    "__pycache__",
    "site-packages",
    // vendor
    "vendor",
    "third_party",
    "third-party",
];

const DEFAULT_MAX_FILE_BYTES: u64 = 1_048_576;

/// A file left out of a batch, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Best-effort result of parsing many files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<NormalizedModule>,
    pub skipped: Vec<SkippedFile>,
}

/// Counters over a [`BatchReport`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub files_parsed: usize,
    pub files_skipped: usize,
    pub functions: usize,
    pub classes: usize,
    pub skipped_nodes: usize,
}

impl BatchReport {
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            files_parsed: self.results.len(),
            files_skipped: self.skipped.len(),
            functions: self.results.iter().map(|m| m.total_functions).sum(),
            classes: self.results.iter().map(|m| m.total_classes).sum(),
            skipped_nodes: self.results.iter().map(|m| m.skipped_nodes.len()).sum(),
        }
    }
}

/// Whether any of `paths` needs the JS/TS engine
pub fn needs_engine<'p>(paths: impl IntoIterator<Item = &'p PathBuf>) -> bool {
    paths
        .into_iter()
        .any(|path| Language::from_path(path).is_ok_and(Language::uses_external_engine))
}

impl SourceParser {
    /// Scan `root` and parse every supported file found.
    ///
    /// Fails only when `root` does not exist; per-file failures become
    /// [`BatchReport::skipped`] entries.
    pub fn parse_directory(&self, root: impl AsRef<Path>) -> Result<BatchReport> {
        self.scan_and_parse(root.as_ref(), None)
    }

    /// [`parse_directory`](Self::parse_directory) restricted to files of `language`
    pub fn parse_directory_for(
        &self,
        root: impl AsRef<Path>,
        language: Language,
    ) -> Result<BatchReport> {
        self.scan_and_parse(root.as_ref(), Some(language))
    }

    fn scan_and_parse(&self, root: &Path, language: Option<Language>) -> Result<BatchReport> {
        if !root.exists() {
            return Err(ParseError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", root.display()),
            )));
        }

        let mut scanner = SourceScanner::new(root).max_file_bytes(self.config().max_file_bytes);
        if let Some(language) = language {
            scanner = scanner.only(language);
        }
        Ok(self.parse_paths(&scanner.scan()))
    }

    /// Parse each path independently; a failing file never aborts the batch
    pub fn parse_paths(&self, paths: &[PathBuf]) -> BatchReport {
        let started = Instant::now();
        let mut report = BatchReport::default();

        for path in paths {
            match self.parse_normalized(path) {
                Ok(module) => report.results.push(module),
                Err(e) => {
                    if e.is_recoverable() {
                        log::warn!("Skipping {}: {e}", path.display());
                    } else {
                        log::error!("Skipping {}: {e}", path.display());
                    }
                    report.skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: SkipReason::from(&e),
                    });
                }
            }
        }

        let summary = report.summary();
        log::info!(
            "Parsed {} files ({} skipped): {} functions, {} classes in {} ms",
            summary.files_parsed,
            summary.files_skipped,
            summary.functions,
            summary.classes,
            started.elapsed().as_millis()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scanner_finds_supported_files_sorted() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join("__pycache__")).unwrap();

        fs::write(root.join("src/b.ts"), "export const b = 1;").unwrap();
        fs::write(root.join("src/a.py"), "x = 1").unwrap();
        fs::write(root.join("README.md"), "# readme").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "module.exports = 1;").unwrap();
        fs::write(root.join("__pycache__/a.py"), "").unwrap();

        let files = SourceScanner::new(root).scan();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["src/a.py", "src/b.ts"]);
    }

    #[test]
    fn test_scanner_skips_large_files() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("big.py"), "x = 1\n".repeat(100)).unwrap();
        fs::write(temp.path().join("small.py"), "x = 1\n").unwrap();

        let files = SourceScanner::new(temp.path()).max_file_bytes(64).scan();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("small.py"));
    }

    #[test]
    fn test_scanner_language_filter() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["a.py", "b.js", "c.ts", "d.tsx"] {
            fs::write(temp.path().join(name), "").unwrap();
        }

        let files = SourceScanner::new(temp.path())
            .only(Language::TypeScript)
            .scan();
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["c.ts", "d.tsx"]);
    }

    #[test]
    fn test_needs_engine() {
        let py = vec![PathBuf::from("a.py"), PathBuf::from("b.pyw")];
        assert!(!needs_engine(&py));

        let mixed = vec![PathBuf::from("a.py"), PathBuf::from("ui/App.tsx")];
        assert!(needs_engine(&mixed));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let parser = SourceParser::new(crate::ParserConfig::default()).unwrap();
        let err = parser.parse_directory("/nonexistent/codedoc-root").unwrap_err();
        assert!(matches!(err, ParseError::Io(_)));
    }
}
