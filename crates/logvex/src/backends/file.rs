//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The disk was quiet. Too quiet. Someone wanted to replay last Tuesday's access
//! logs without touching S3, and someone else wanted to see the documents without
//! touching the search cluster. Both of them ended up here.
//!
//! - [`FileObjectStore`]: `bucket` is a directory under `root`, `key` is a path inside it.
//!   `s3://logs/2024/access.log` becomes `{root}/logs/2024/access.log`.
//! - [`FilePublisher`]: appends each document as one NDJSON line. The dry-run target.
//!
//! 💀 Disk full → your problem now
//! 🦆 (mandatory, no notes)

mod file_object_store;
mod file_publisher;

pub(crate) use file_object_store::FileObjectStore;
pub use file_object_store::FileObjectStoreConfig;
pub(crate) use file_publisher::FilePublisher;
pub use file_publisher::FilePublisherConfig;
