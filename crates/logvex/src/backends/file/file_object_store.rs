use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tracing::trace;

use crate::backends::{ObjectStore, ObjectStream};
use crate::common::ObjectLocation;

// -- 🏠 config lives next to the store that reads it. No scavenger hunts at 2am.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FileObjectStoreConfig {
    /// 📁 the directory that plays the role of "all of S3"
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for FileObjectStoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

/// 📂 Object store backed by the local filesystem.
#[derive(Debug)]
pub struct FileObjectStore {
    config: FileObjectStoreConfig,
}

impl FileObjectStore {
    pub(crate) fn new(config: FileObjectStoreConfig) -> Self {
        Self { config }
    }

    /// 🗺️ Map a location onto a path under `root`, refusing anything that tries to climb out.
    fn resolve(&self, location: &ObjectLocation) -> Result<PathBuf> {
        let the_relative = Path::new(&location.bucket).join(&location.key);
        let escapes_root = the_relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes_root {
            anyhow::bail!(
                "💀 {} tries to wander outside the store root with '..' or an absolute path. \
                 Nice try. The root is the root.",
                location
            );
        }
        Ok(self.config.root.join(the_relative))
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn open_read_stream(&self, location: &ObjectLocation) -> Result<ObjectStream> {
        let the_path = self.resolve(location)?;
        let the_file = File::open(&the_path).await.context(format!(
            "💀 Could not open {} (looked at '{}'). We stared at the path. The path stared back. \
             One of us was wrong about whether the file existed. It was us.",
            location,
            the_path.display()
        ))?;
        // -- 📏 metadata can fail on exotic filesystems. the size is nice to have, not load-bearing.
        let the_content_length = the_file.metadata().await.ok().map(|meta| meta.len());
        trace!(
            "📂 opened '{}' ({:?} bytes)",
            the_path.display(),
            the_content_length
        );
        Ok(ObjectStream {
            reader: Box::new(the_file),
            content_length: the_content_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn the_one_where_bucket_and_key_become_directories() -> Result<()> {
        let the_root = tempfile::tempdir()?;
        std::fs::create_dir_all(the_root.path().join("logs/2024"))?;
        std::fs::write(the_root.path().join("logs/2024/access.log"), b"hello\n")?;

        let the_store = FileObjectStore::new(FileObjectStoreConfig {
            root: the_root.path().to_path_buf(),
        });
        let mut the_stream = the_store
            .open_read_stream(&ObjectLocation::new("logs", "2024/access.log"))
            .await?;
        assert_eq!(the_stream.content_length, Some(6));

        let mut the_contents = String::new();
        the_stream.reader.read_to_string(&mut the_contents).await?;
        assert_eq!(the_contents, "hello\n");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_missing_file_fails_at_open() -> Result<()> {
        let the_root = tempfile::tempdir()?;
        let the_store = FileObjectStore::new(FileObjectStoreConfig {
            root: the_root.path().to_path_buf(),
        });
        let the_result = the_store
            .open_read_stream(&ObjectLocation::new("logs", "nope.log"))
            .await;
        assert!(the_result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_dot_dot_does_not_leave_the_building() {
        let the_store = FileObjectStore::new(FileObjectStoreConfig::default());
        let the_result = the_store
            .open_read_stream(&ObjectLocation::new("logs", "../../etc/passwd"))
            .await;
        assert!(the_result.is_err());
    }
}
