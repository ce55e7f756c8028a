use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tokio_util::io::StreamReader;

use crate::backends::{ObjectStore, ObjectStream};
use crate::common::ObjectLocation;

/// 🔧 Objects keyed by `bucket/key` (or `s3://bucket/key`), contents as plain text.
///
/// ```toml
/// [object_store.InMemory.objects]
/// "logs/access.log" = "127.0.0.1 - - [10/Oct/2000:13:55:36 -0700] \"GET / HTTP/1.0\" 200 2326\n"
/// ```
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct InMemoryObjectStoreConfig {
    #[serde(default)]
    pub objects: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
enum StoredObject {
    Whole(Bytes),
    // 💥 serves the prefix, then the read fails
    BreaksAfter(Bytes),
}

/// 📦 The object store that lives and dies with the process.
#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStore {
    objects: HashMap<ObjectLocation, StoredObject>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🏗️ Build from config. Entries whose name isn't `bucket/key` are skipped with a warning.
    pub(crate) fn from_config(config: InMemoryObjectStoreConfig) -> Self {
        let mut the_store = Self::new();
        for (the_name, the_contents) in config.objects {
            match ObjectLocation::parse_uri(&the_name) {
                Ok(location) => the_store.insert(location, the_contents.into_bytes()),
                Err(the_error) => {
                    tracing::warn!("🙈 skipping in-memory object '{}': {:#}", the_name, the_error)
                }
            }
        }
        the_store
    }

    pub fn insert(&mut self, location: ObjectLocation, contents: impl Into<Bytes>) {
        self.objects
            .insert(location, StoredObject::Whole(contents.into()));
    }

    /// 💥 Store an object whose stream yields `prefix` and then breaks with an I/O error.
    pub fn insert_broken(&mut self, location: ObjectLocation, prefix: impl Into<Bytes>) {
        self.objects
            .insert(location, StoredObject::BreaksAfter(prefix.into()));
    }

    pub fn with_object(mut self, location: ObjectLocation, contents: impl Into<Bytes>) -> Self {
        self.insert(location, contents);
        self
    }

    pub fn with_broken_object(mut self, location: ObjectLocation, prefix: impl Into<Bytes>) -> Self {
        self.insert_broken(location, prefix);
        self
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn open_read_stream(&self, location: &ObjectLocation) -> Result<ObjectStream> {
        let Some(the_object) = self.objects.get(location) else {
            anyhow::bail!(
                "💀 NoSuchKey: {} is not in the in-memory store. It was never here. \
                 We checked the couch cushions.",
                location
            );
        };

        let (the_chunks, the_content_length): (Vec<std::io::Result<Bytes>>, Option<u64>) =
            match the_object {
                StoredObject::Whole(contents) => {
                    (vec![Ok(contents.clone())], Some(contents.len() as u64))
                }
                StoredObject::BreaksAfter(prefix) => (
                    vec![
                        Ok(prefix.clone()),
                        Err(std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            "connection reset by a very rude peer",
                        )),
                    ],
                    None,
                ),
            };

        Ok(ObjectStream {
            reader: Box::new(StreamReader::new(futures::stream::iter(the_chunks))),
            content_length: the_content_length,
        })
    }
}
