//! Recursive enumeration of the text-bearing files of a checked-out repository.

use std::path::{Component, Path, PathBuf};

/// Extensions (without the dot) whose files are indexed.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "py",
    "js",
    "jsx",
    "ts",
    "tsx",
    "md",
    "json",
    "html",
    "css",
    "yml",
    "yaml",
    "dockerfile",
    "java",
    "go",
    "rs",
    "c",
    "cpp",
];

/// Extension-less file names that are indexed as-is.
pub const SUPPORTED_FILE_NAMES: &[&str] = &["Dockerfile"];

/// Default maximum file size: 1 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

const VCS_DIR: &str = ".git";

#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub extensions: Vec<String>,
    pub file_names: Vec<String>,
    pub max_file_size: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            extensions: SUPPORTED_EXTENSIONS.iter().map(|s| (*s).to_owned()).collect(),
            file_names: SUPPORTED_FILE_NAMES.iter().map(|s| (*s).to_owned()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl SelectorConfig {
    #[must_use]
    pub fn is_supported(&self, path: &Path) -> bool {
        let by_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext));
        by_ext
            || path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| self.file_names.iter().any(|allowed| allowed == name))
    }
}

/// A selected file: repository-relative path with `/` separators plus its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Lazy iterator over the qualifying files under a root, in file-name order.
///
/// Unreadable, oversized and non-UTF-8 files are logged and skipped.
pub struct SelectedFiles {
    root: PathBuf,
    walk: ignore::Walk,
    config: SelectorConfig,
}

impl std::fmt::Debug for SelectedFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedFiles")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[must_use]
pub fn select_files(root: &Path, config: &SelectorConfig) -> SelectedFiles {
    let walk = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| entry.file_name() != VCS_DIR)
        .build();
    SelectedFiles {
        root: root.to_path_buf(),
        walk,
        config: config.clone(),
    }
}

impl SelectedFiles {
    fn load(&self, entry: &ignore::DirEntry) -> Option<SourceFile> {
        let rel_path = relative_path(&self.root, entry.path());

        match entry.metadata() {
            Ok(meta) if meta.len() > self.config.max_file_size => {
                tracing::warn!(
                    file = %rel_path,
                    size = meta.len(),
                    limit = self.config.max_file_size,
                    "skipping oversized file"
                );
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(file = %rel_path, "skipping file without metadata: {e}");
                return None;
            }
        }

        let bytes = match std::fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(file = %rel_path, "could not read file: {e}");
                return None;
            }
        };

        match String::from_utf8(bytes) {
            Ok(content) => {
                tracing::debug!(file = %rel_path, bytes = content.len(), "selected file");
                Some(SourceFile {
                    path: rel_path,
                    content,
                })
            }
            Err(_) => {
                tracing::warn!(file = %rel_path, "skipping file that is not valid UTF-8");
                None
            }
        }
    }
}

impl Iterator for SelectedFiles {
    type Item = SourceFile;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walk.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("directory walk error: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            if !self.config.is_supported(entry.path()) {
                continue;
            }
            if let Some(file) = self.load(&entry) {
                return Some(file);
            }
        }
    }
}

/// Path of `path` relative to `root`, joined with `/` on every platform.
fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn selected_paths(root: &Path, config: &SelectorConfig) -> Vec<String> {
        select_files(root, config).map(|f| f.path).collect()
    }

    #[test]
    fn selects_allowed_extensions_only() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.py", b"print(1)");
        write(dir.path(), "README.md", b"# hi");
        write(dir.path(), "logo.png", b"\x89PNG");
        write(dir.path(), "notes.txt", b"plain");

        let paths = selected_paths(dir.path(), &SelectorConfig::default());
        assert_eq!(paths, vec!["README.md", "main.py"]);
    }

    #[test]
    fn excludes_git_directory_but_not_github() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".git/config.json", b"{}");
        write(dir.path(), ".git/hooks/pre.py", b"x");
        write(dir.path(), ".github/workflows/ci.yml", b"on: push");

        let paths = selected_paths(dir.path(), &SelectorConfig::default());
        assert_eq!(paths, vec![".github/workflows/ci.yml"]);
    }

    #[test]
    fn nested_paths_use_forward_slashes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app/main.rs", b"fn main() {}");

        let files: Vec<SourceFile> = select_files(dir.path(), &SelectorConfig::default()).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/app/main.rs");
        assert_eq!(files[0].content, "fn main() {}");
    }

    #[test]
    fn dockerfile_by_name_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Dockerfile", b"FROM rust");
        write(dir.path(), "build.dockerfile", b"FROM alpine");
        write(dir.path(), "Dockerfile.old", b"FROM scratch");

        let paths = selected_paths(dir.path(), &SelectorConfig::default());
        assert_eq!(paths, vec!["Dockerfile", "build.dockerfile"]);
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "UPPER.PY", b"x = 1");
        assert!(selected_paths(dir.path(), &SelectorConfig::default()).is_empty());
    }

    #[test]
    fn non_utf8_file_is_skipped_and_selection_continues() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", &[0xff, 0xfe, 0x00]);
        write(dir.path(), "b.py", b"ok = True");

        let paths = selected_paths(dir.path(), &SelectorConfig::default());
        assert_eq!(paths, vec!["b.py"]);
    }

    #[test]
    fn oversized_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.js", &vec![b'a'; 64]);
        write(dir.path(), "small.js", b"a");

        let config = SelectorConfig {
            max_file_size: 16,
            ..SelectorConfig::default()
        };
        assert_eq!(selected_paths(dir.path(), &config), vec!["small.js"]);
    }

    #[test]
    fn hidden_and_gitignored_files_are_still_selected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".gitignore", b"ignored.py\n");
        write(dir.path(), "ignored.py", b"x = 1");
        write(dir.path(), ".config/settings.json", b"{}");

        let paths = selected_paths(dir.path(), &SelectorConfig::default());
        assert_eq!(paths, vec![".config/settings.json", "ignored.py"]);
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(select_files(dir.path(), &SelectorConfig::default()).count(), 0);
    }

    #[test]
    fn relative_path_strips_root() {
        let root = Path::new("/tmp/repo");
        assert_eq!(relative_path(root, Path::new("/tmp/repo/a/b.py")), "a/b.py");
    }
}
