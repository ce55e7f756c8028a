//! 🪣 S3: the object store where logs go to grow old.
//!
//! 🎬 *[a load balancer has been writing access logs into a bucket since before the
//! current on-call engineer was hired. tonight, someone finally reads them.]*
//!
//! Transport: `GetObject` → `ByteStream::into_async_read()` → boxed `AsyncRead`.
//! No HEAD request: `GetObject` already carries the content length, and a missing
//! key fails the GET just as loudly as it would have failed the HEAD.

mod s3_object_store;

pub(crate) use s3_object_store::S3ObjectStore;
pub use s3_object_store::S3ObjectStoreConfig;
