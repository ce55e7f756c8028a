//! # 📡 THE OPENSEARCH BACKEND
//!
//! *Previously, on Logvex...*
//!
//! 🎬 COLD OPEN. INT. SEARCH DOMAIN, 3:47 AM
//!
//! A managed search domain sits behind an IAM policy. It accepts documents one at a
//! time, each wrapped in a SigV4 signature fresher than the coffee. It rejects
//! nothing it can verify, and everything it can't.
//!
//! 🚀 [`OpenSearchPublisher`] POSTs each document to `{endpoint}/{index}/{doctype}`.
//! [`sigv4`] does the cryptographic paperwork. No batching, no retry: first error wins.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

mod opensearch_publisher;
pub(crate) mod sigv4;

pub(crate) use opensearch_publisher::OpenSearchPublisher;
pub use opensearch_publisher::OpenSearchPublisherConfig;
