//! Workspace sandbox: file tools only touch paths under one root.
//!
//! Paths are accepted either workspace-relative (`src/lib.rs`) or absolute
//! inside the root. Parent-directory components and forbidden prefixes are
//! rejected before any filesystem access happens.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Path '{path}' is outside the workspace")]
    OutsideWorkspace { path: String },

    #[error("Path '{path}' matches forbidden pattern '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path must not be empty")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    forbidden: Vec<String>,
}

impl Workspace {
    /// Create a sandbox rooted at `root`. The root is canonicalized when it
    /// exists so absolute inputs compare reliably.
    pub fn new(root: impl Into<PathBuf>, forbidden: Vec<String>) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        let forbidden = forbidden
            .into_iter()
            .map(|f| f.replace('\\', "/").trim_start_matches("./").to_lowercase())
            .collect();
        Self { root, forbidden }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate `path` and return its workspace-relative, `/`-separated form.
    pub fn relative(&self, path: &str) -> Result<String, SandboxError> {
        if path.trim().is_empty() {
            return Err(SandboxError::Empty);
        }
        let input = Path::new(path);

        let rel: &Path = if input.is_absolute() {
            input
                .strip_prefix(&self.root)
                .map_err(|_| SandboxError::OutsideWorkspace { path: path.into() })?
        } else {
            input
        };

        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(SandboxError::PathTraversal { path: path.into() });
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(SandboxError::OutsideWorkspace { path: path.into() });
                }
            }
        }
        if parts.is_empty() {
            return Err(SandboxError::Empty);
        }

        let rel = parts.join("/");
        let normalized = rel.to_lowercase();
        for pattern in &self.forbidden {
            if normalized.starts_with(pattern.as_str())
                || normalized.contains(&format!("/{pattern}"))
            {
                return Err(SandboxError::ForbiddenPath {
                    path: path.into(),
                    pattern: pattern.clone(),
                });
            }
        }
        Ok(rel)
    }

    /// Validate `path` and return the absolute location on disk.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, SandboxError> {
        self.relative(path).map(|rel| self.root.join(rel))
    }

    /// Like [`Workspace::resolve`], but allows the root itself (empty or `.`).
    pub fn resolve_dir(&self, path: &str) -> Result<PathBuf, SandboxError> {
        match path.trim() {
            "" | "." | "./" => Ok(self.root.clone()),
            other => self.resolve(other),
        }
    }
}
