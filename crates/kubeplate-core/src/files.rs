//! Static asset access for templates
//!
//! Templates read auxiliary files (configuration snippets, scripts,
//! certificates) from one configured base directory. A requested path is
//! always relative to that directory and, once symlinks and `..` are
//! resolved, must still lie inside it. Absolute paths are refused outright.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Source of static assets
///
/// Implemented by [`SandboxedFileProvider`] (a directory on disk),
/// [`MockFileProvider`] (in memory) and [`NoFileProvider`].
pub trait FileProvider: Send + Sync {
    /// Raw content of `path`
    fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Whether `path` names a readable file
    fn exists(&self, path: &str) -> bool;

    /// Files whose relative path matches `pattern`, sorted by path
    fn glob(&self, pattern: &str) -> Result<Vec<FileEntry>>;

    /// Content of `path`, which must be UTF-8
    fn get_string(&self, path: &str) -> Result<String> {
        String::from_utf8(self.get(path)?).map_err(|e| access_error(path, format!("not UTF-8 text: {}", e)))
    }

    fn lines(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.get_string(path)?.lines().map(str::to_owned).collect())
    }
}

/// One match of [`FileProvider::glob`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the base directory, `/` separated
    pub path: String,
    /// Last path component
    pub name: String,
    /// Content, invalid UTF-8 replaced
    pub content: String,
    /// Size in bytes
    pub size: usize,
}

impl FileEntry {
    fn new(path: String, bytes: &[u8]) -> Self {
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            name,
            content: String::from_utf8_lossy(bytes).into_owned(),
            size: bytes.len(),
            path,
        }
    }
}

fn access_error(path: &str, message: impl Into<String>) -> CoreError {
    CoreError::FileAccess {
        path: path.to_string(),
        message: message.into(),
    }
}

fn compile_glob(pattern: &str) -> Result<glob::Pattern> {
    glob::Pattern::new(pattern).map_err(|e| CoreError::GlobPattern {
        message: format!("invalid glob pattern '{}': {}", pattern, e),
    })
}

/// Assets below one directory on disk
///
/// The directory is only inspected when a template reads from it. Nothing is
/// cached, so every read sees the current file content.
#[derive(Debug, Clone)]
pub struct SandboxedFileProvider {
    base_dir: PathBuf,
}

impl SandboxedFileProvider {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn canonical_base(&self) -> Result<PathBuf> {
        self.base_dir.canonicalize().map_err(|e| {
            access_error(
                &self.base_dir.display().to_string(),
                format!("static asset directory is not accessible: {}", e),
            )
        })
    }

    /// Absolute location of `requested`, checked against the sandbox
    fn locate(&self, requested: &str) -> Result<PathBuf> {
        let relative = Path::new(requested);
        if relative
            .components()
            .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
        {
            return Err(access_error(requested, "absolute paths are not allowed in templates"));
        }

        let base = self.canonical_base()?;
        let candidate = base.join(relative);
        let resolved = match candidate.canonicalize() {
            Ok(path) => path,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(access_error(requested, "file not found"));
            }
            Err(e) => return Err(access_error(requested, format!("cannot resolve path: {}", e))),
        };

        if resolved.starts_with(&base) {
            Ok(resolved)
        } else {
            Err(access_error(
                requested,
                "path escapes the static asset directory (sandbox violation)",
            ))
        }
    }
}

impl FileProvider for SandboxedFileProvider {
    fn get(&self, path: &str) -> Result<Vec<u8>> {
        let location = self.locate(path)?;
        std::fs::read(&location).map_err(|e| access_error(path, format!("read failed: {}", e)))
    }

    fn exists(&self, path: &str) -> bool {
        matches!(self.locate(path), Ok(location) if location.is_file())
    }

    fn glob(&self, pattern: &str) -> Result<Vec<FileEntry>> {
        let matcher = compile_glob(pattern)?;
        let base = self.canonical_base()?;

        let mut found: Vec<FileEntry> = walkdir::WalkDir::new(&base)
            .into_iter()
            .flatten()
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&base).ok()?;
                let relative: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect();
                let relative = relative.join("/");
                if !matcher.matches(&relative) {
                    return None;
                }
                let bytes = std::fs::read(entry.path()).ok()?;
                Some(FileEntry::new(relative, &bytes))
            })
            .collect();

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }
}

/// In-memory assets, keyed by relative path
#[derive(Debug, Default, Clone)]
pub struct MockFileProvider {
    files: BTreeMap<String, Vec<u8>>,
}

impl MockFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), content.into());
        self
    }

    pub fn with_text_file(self, path: &str, content: &str) -> Self {
        self.with_file(path, content)
    }
}

impl FileProvider for MockFileProvider {
    fn get(&self, path: &str) -> Result<Vec<u8>> {
        match self.files.get(path) {
            Some(bytes) => Ok(bytes.clone()),
            None => Err(access_error(path, "file not found")),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<FileEntry>> {
        let matcher = compile_glob(pattern)?;
        Ok(self
            .files
            .iter()
            .filter(|(path, _)| matcher.matches(path))
            .map(|(path, bytes)| FileEntry::new(path.clone(), bytes))
            .collect())
    }
}

/// Stand-in when no static asset directory is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFileProvider;

impl FileProvider for NoFileProvider {
    fn get(&self, path: &str) -> Result<Vec<u8>> {
        Err(access_error(path, "no static asset directory is configured"))
    }

    fn exists(&self, _path: &str) -> bool {
        false
    }

    fn glob(&self, _pattern: &str) -> Result<Vec<FileEntry>> {
        Ok(Vec::new())
    }
}

/// Shared handle over a [`FileProvider`]
#[derive(Clone)]
pub struct Files {
    provider: Arc<dyn FileProvider>,
}

impl Files {
    pub fn new(provider: impl FileProvider + 'static) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    pub fn from_arc(provider: Arc<dyn FileProvider>) -> Self {
        Self { provider }
    }

    /// Sandboxed access below `base_dir`
    pub fn in_dir(base_dir: impl AsRef<Path>) -> Self {
        Self::new(SandboxedFileProvider::new(base_dir))
    }

    /// Handle whose reads always fail
    pub fn none() -> Self {
        Self::new(NoFileProvider)
    }

    /// Content as UTF-8 text
    pub fn get(&self, path: &str) -> Result<String> {
        self.provider.get_string(path)
    }

    pub fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.provider.get(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.provider.exists(path)
    }

    pub fn glob(&self, pattern: &str) -> Result<Vec<FileEntry>> {
        self.provider.glob(pattern)
    }

    pub fn lines(&self, path: &str) -> Result<Vec<String>> {
        self.provider.lines(path)
    }
}

impl fmt::Debug for Files {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Files").finish_non_exhaustive()
    }
}
