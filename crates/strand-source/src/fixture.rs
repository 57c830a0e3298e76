use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::transport::{Request, Transport};

/// Serves JSON fixtures from a directory tree.
///
/// A request for `/r/rust/comments/abc` reads `<root>/r/rust/comments/abc.json`.
/// The query string is ignored, so one fixture answers every page of a path.
#[derive(Clone, Debug)]
pub struct FixtureTransport {
    root: PathBuf,
}

impl FixtureTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `path`, or `None` if the path would escape the root.
    pub fn file_for(&self, path: &str) -> Option<PathBuf> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Some(self.root.join("index.json"));
        }
        if Path::new(trimmed)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(format!("{trimmed}.json")))
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn fetch(&self, request: &Request) -> SourceResult<Value> {
        let file = self.file_for(&request.path).ok_or_else(|| SourceError::Status {
            status: 400,
            message: format!("invalid path {}", request.path),
        })?;
        debug!(request = %request.signature(), file = %file.display(), "reading fixture");
        let text = match tokio::fs::read_to_string(&file).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::Status {
                    status: 404,
                    message: format!("no fixture for {}", request.path),
                })
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|e| SourceError::Decode(e.to_string()))
    }
}
