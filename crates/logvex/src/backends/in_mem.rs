//! # Previously, on Logvex...
//!
//! 🎬 The log file was trapped in a bucket. The documents were destined for a cluster.
//! Neither of them existed on the test runner. Someone had to fake both, convincingly
//! enough that the orchestrator would never know. That someone was this module.
//!
//! - [`InMemoryObjectStore`]: a map of locations to bytes. Can also serve a "broken"
//!   object that hands out a prefix and then fails mid-stream, like a real network.
//! - [`InMemoryPublisher`]: hoards every document behind an `Arc<Mutex<...>>` so tests
//!   can inspect what arrived. Can be told to reject documents containing a marker, and
//!   to dawdle before answering so publishes overlap.
//!
//! ⚠️ This is NOT for production. This is for tests and local poking.
//! ✅ No network calls. No disk I/O. Just vibes and heap memory.

mod in_mem_object_store;
mod in_mem_publisher;

pub use in_mem_object_store::{InMemoryObjectStore, InMemoryObjectStoreConfig};
pub use in_mem_publisher::{InMemoryPublisher, InMemoryPublisherConfig};
