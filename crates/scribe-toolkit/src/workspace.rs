//! Sandboxed view of the writable workspace the tools operate on.

use anyhow::{bail, Context};
use std::path::{Component, Path, PathBuf};

/// Root directory that every tool path is resolved against. Paths handed in
/// by the model are always relative; absolute paths and `..` escapes are
/// rejected before touching the disk.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Strip leading slashes, backslashes and `./` noise.
    pub fn normalize(raw: &str) -> String {
        let unified = raw.trim().replace('\\', "/");
        let mut parts = Vec::new();
        for part in unified.split('/') {
            match part {
                "" | "." => {}
                other => parts.push(other),
            }
        }
        parts.join("/")
    }

    /// Resolve `raw` to a path inside the workspace.
    pub fn resolve(&self, raw: &str) -> anyhow::Result<PathBuf> {
        let trimmed = raw.trim();
        if Path::new(trimmed).is_absolute() || trimmed.starts_with('/') {
            bail!("unsafe path '{raw}': absolute paths are not allowed");
        }

        let normalized = Self::normalize(trimmed);
        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(&normalized).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::ParentDir => {
                    if depth == 0 {
                        bail!("unsafe path '{raw}': escapes the workspace");
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::CurDir => {}
                Component::RootDir | Component::Prefix(_) => {
                    bail!("unsafe path '{raw}': absolute paths are not allowed")
                }
            }
        }
        Ok(resolved)
    }

    /// Workspace-relative display form of an absolute path under the root.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    pub async fn read_to_string(&self, raw: &str) -> anyhow::Result<Option<String>> {
        let path = self.resolve(raw)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read '{raw}'"))?;
        Ok(Some(contents))
    }

    pub async fn write(&self, raw: &str, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.resolve(raw)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create parent directories for '{raw}'"))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write '{raw}'"))?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "Wrote workspace file");
        Ok(path)
    }
}
