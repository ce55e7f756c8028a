//! 🔌 Backends: where the real I/O happens.
//!
//! 🪣 Object stores pour the bytes, 📡 publishers ship the documents.
//! Everything in between is pure and synchronous and blissfully unaware of the network.
//!
//! 🎭 This module is the casting agency. Need the log from S3? From a directory on
//! your laptop? From a `Vec<u8>` some test conjured out of thin air? We've got an
//! object store for that. Need the documents in OpenSearch? In an NDJSON file for a
//! dry run? In RAM so a test can count them? Publisher for that, too.
//!
//! 🧠 Knowledge graph:
//! - [`ObjectStore`]: `open_read_stream(location)` → [`ObjectStream`]. `&self`, because
//!   one store serves every job in the batch.
//! - [`Publisher`]: `publish(document)` → `Result<(), PublishError>`. `&self` and `Sync`,
//!   because one publisher is shared by every in-flight publish of every job.
//! - `*Backend` enums dispatch to the concrete type so the orchestrator never needs to
//!   know (or care) where the bytes come from or land.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::app_config::{ObjectStoreConfig, PublisherConfig};
use crate::common::ObjectLocation;
use crate::error::PublishError;

pub(crate) mod file;
pub(crate) mod in_mem;
pub(crate) mod opensearch;
pub(crate) mod s3;

pub use file::{FileObjectStoreConfig, FilePublisherConfig};
pub use in_mem::{InMemoryObjectStore, InMemoryObjectStoreConfig, InMemoryPublisher, InMemoryPublisherConfig};
pub use opensearch::OpenSearchPublisherConfig;
pub use s3::S3ObjectStoreConfig;

// ===== Object Store Trait and Backend Enum =====

/// 🚰 An open, not-yet-read object: the byte pipe plus whatever the store knows about its size.
pub struct ObjectStream {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// 📏 `None` when the store can't or won't say. The progress bar copes.
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// 🪣 Hands out byte streams for object locations.
///
/// # Contract
/// - Opening fails fast: a missing bucket, missing key or denied request is an `Err`
///   here, before a single byte is read.
/// - The returned stream may still fail mid-read. That's the splitter's problem.
#[async_trait]
pub trait ObjectStore: std::fmt::Debug + Send + Sync {
    async fn open_read_stream(&self, location: &ObjectLocation) -> Result<ObjectStream>;
}

#[derive(Debug)]
pub enum ObjectStoreBackend {
    S3(s3::S3ObjectStore),
    File(file::FileObjectStore),
    InMemory(in_mem::InMemoryObjectStore),
}

impl ObjectStoreBackend {
    /// 🏗️ Build the configured store. S3 resolves its AWS config here, once.
    pub async fn from_config(config: ObjectStoreConfig) -> Result<Self> {
        Ok(match config {
            ObjectStoreConfig::S3(s3_config) => {
                ObjectStoreBackend::S3(s3::S3ObjectStore::new(s3_config).await?)
            }
            ObjectStoreConfig::File(file_config) => {
                ObjectStoreBackend::File(file::FileObjectStore::new(file_config))
            }
            ObjectStoreConfig::InMemory(in_mem_config) => {
                ObjectStoreBackend::InMemory(in_mem::InMemoryObjectStore::from_config(in_mem_config))
            }
        })
    }
}

#[async_trait]
impl ObjectStore for ObjectStoreBackend {
    async fn open_read_stream(&self, location: &ObjectLocation) -> Result<ObjectStream> {
        match self {
            ObjectStoreBackend::S3(store) => store.open_read_stream(location).await,
            ObjectStoreBackend::File(store) => store.open_read_stream(location).await,
            ObjectStoreBackend::InMemory(store) => store.open_read_stream(location).await,
        }
    }
}

// ===== Publisher Trait and Backend Enum =====

/// 📡 Ships one serialized document somewhere it can be searched.
///
/// # Contract
/// - One call, one document, one verdict. No batching. No retry.
/// - Safe to call concurrently from many tasks.
#[async_trait]
pub trait Publisher: std::fmt::Debug + Send + Sync {
    async fn publish(&self, document: String) -> Result<(), PublishError>;
}

#[derive(Debug)]
pub enum PublisherBackend {
    OpenSearch(opensearch::OpenSearchPublisher),
    File(file::FilePublisher),
    InMemory(in_mem::InMemoryPublisher),
}

impl PublisherBackend {
    /// 🏗️ Build the configured publisher. OpenSearch resolves its credentials here, once,
    /// before any job starts.
    pub async fn from_config(config: PublisherConfig) -> Result<Self> {
        Ok(match config {
            PublisherConfig::OpenSearch(os_config) => PublisherBackend::OpenSearch(
                opensearch::OpenSearchPublisher::new(os_config).await?,
            ),
            PublisherConfig::File(file_config) => {
                PublisherBackend::File(file::FilePublisher::new(file_config).await?)
            }
            PublisherConfig::InMemory(in_mem_config) => {
                PublisherBackend::InMemory(in_mem::InMemoryPublisher::new(in_mem_config))
            }
        })
    }
}

#[async_trait]
impl Publisher for PublisherBackend {
    async fn publish(&self, document: String) -> Result<(), PublishError> {
        match self {
            PublisherBackend::OpenSearch(publisher) => publisher.publish(document).await,
            PublisherBackend::File(publisher) => publisher.publish(document).await,
            PublisherBackend::InMemory(publisher) => publisher.publish(document).await,
        }
    }
}
