//! Local file system data source.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use super::DocumentSource;
use crate::error::SourceError;

/// Documents on the local file system.
///
/// Containers are directories under `root`; document ids are `/`-separated
/// paths relative to the container.
#[derive(Debug, Clone)]
pub struct LocalDirectorySource {
    root: PathBuf,
}

impl LocalDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn container_path(&self, container: &str) -> Result<PathBuf, String> {
        let relative = Path::new(container);
        if !is_plain_relative(relative) {
            return Err(format!("invalid container name: {container}"));
        }
        Ok(self.root.join(relative))
    }

    fn collect_files(container_root: &Path, prefix: &str) -> Result<Vec<String>, String> {
        let mut ids = Vec::new();

        for entry in WalkDir::new(container_root).follow_links(false) {
            let entry = entry.map_err(|e| e.to_string())?;
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| e.to_string())?;
            if metadata.len() == 0 {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(container_root) else {
                continue;
            };
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if id.starts_with(prefix) {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
impl DocumentSource for LocalDirectorySource {
    async fn list_documents(
        &self,
        container: &str,
        prefix: &str,
    ) -> Result<Vec<String>, SourceError> {
        let list_error = |message: String| SourceError::ListError {
            container: container.to_string(),
            message,
        };

        let container_root = self.container_path(container).map_err(list_error)?;
        if !container_root.is_dir() {
            return Err(list_error(format!(
                "{} is not a directory",
                container_root.display()
            )));
        }

        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || Self::collect_files(&container_root, &prefix))
            .await
            .map_err(|e| list_error(e.to_string()))?
            .map_err(list_error)
    }

    async fn read_document_text(&self, container: &str, id: &str) -> Result<String, SourceError> {
        let read_error = |message: String| SourceError::ReadError {
            container: container.to_string(),
            document: id.to_string(),
            message,
        };

        let container_root = self.container_path(container).map_err(read_error)?;
        let relative = Path::new(id);
        if !is_plain_relative(relative) {
            return Err(read_error("document id escapes its container".to_string()));
        }

        let bytes = tokio::fs::read(container_root.join(relative))
            .await
            .map_err(|e| read_error(e.to_string()))?;

        String::from_utf8(bytes).map_err(|e| read_error(e.to_string()))
    }
}
