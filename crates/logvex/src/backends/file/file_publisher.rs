use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::trace;

use crate::backends::Publisher;
use crate::error::PublishError;

// -- 🚰 FilePublisherConfig: the dry-run destination, equally traumatized by disk full errors.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FilePublisherConfig {
    pub file_name: PathBuf,
    /// ➕ `true` keeps what's already there; `false` truncates on startup
    #[serde(default = "default_append")]
    pub append: bool,
}

fn default_append() -> bool {
    true
}

/// 🚰 FilePublisher: one document in, one NDJSON line out.
///
/// Every publish writes and flushes before acknowledging, so "acknowledged" means
/// "handed to the OS", not "sitting in a buffer hoping for the best".
/// The `Mutex` serializes concurrent publishes so lines never interleave.
#[derive(Debug)]
pub struct FilePublisher {
    file_buf: Mutex<BufWriter<File>>,
    config: FilePublisherConfig,
}

impl FilePublisher {
    pub(crate) async fn new(config: FilePublisherConfig) -> Result<Self> {
        let the_file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(config.append)
            .truncate(!config.append)
            .open(&config.file_name)
            .await
            .context(format!(
                "💀 The publish file '{}' could not be conjured into existence. \
                 Perhaps the directory doesn't exist. Perhaps permissions were set by someone \
                 who really, truly, did not want this file to exist.",
                config.file_name.display()
            ))?;
        Ok(Self {
            file_buf: Mutex::new(BufWriter::new(the_file)),
            config,
        })
    }
}

#[async_trait]
impl Publisher for FilePublisher {
    async fn publish(&self, document: String) -> Result<(), PublishError> {
        let mut the_writer = self.file_buf.lock().await;
        let the_write = async {
            the_writer.write_all(document.as_bytes()).await?;
            the_writer.write_all(b"\n").await?;
            the_writer.flush().await
        };
        the_write.await.map_err(|the_io_error| {
            PublishError::Transport(format!(
                "writing to '{}' failed: {}",
                self.config.file_name.display(),
                the_io_error
            ))
        })?;
        trace!(
            "📬 {} bytes appended to '{}'",
            document.len(),
            self.config.file_name.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_documents_land_one_per_line() -> Result<()> {
        let the_dir = tempfile::tempdir()?;
        let the_path = the_dir.path().join("out.ndjson");
        let the_publisher = FilePublisher::new(FilePublisherConfig {
            file_name: the_path.clone(),
            append: false,
        })
        .await?;

        the_publisher.publish(r#"{"status":200}"#.to_string()).await?;
        the_publisher.publish(r#"{"status":404}"#.to_string()).await?;

        let the_contents = std::fs::read_to_string(&the_path)?;
        assert_eq!(the_contents, "{\"status\":200}\n{\"status\":404}\n");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_append_keeps_yesterdays_documents() -> Result<()> {
        let the_dir = tempfile::tempdir()?;
        let the_path = the_dir.path().join("out.ndjson");
        std::fs::write(&the_path, "{\"old\":true}\n")?;

        let the_publisher = FilePublisher::new(FilePublisherConfig {
            file_name: the_path.clone(),
            append: true,
        })
        .await?;
        the_publisher.publish("{\"new\":true}".to_string()).await?;

        let the_contents = std::fs::read_to_string(&the_path)?;
        assert_eq!(the_contents, "{\"old\":true}\n{\"new\":true}\n");
        Ok(())
    }
}
