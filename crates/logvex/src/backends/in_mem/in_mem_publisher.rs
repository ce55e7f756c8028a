use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::trace;

use crate::backends::Publisher;
use crate::error::PublishError;

/// 🔧 Knobs for making the fake publisher misbehave on purpose.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct InMemoryPublisherConfig {
    /// 💥 reject (HTTP 500, as far as anyone can tell) any document containing this text
    #[serde(default)]
    pub fail_when_contains: Option<String>,
    /// 🐢 wait this long before answering, so publishes pile up in flight
    #[serde(default)]
    pub delay_ms: u64,
}

/// 📦 A publisher that never forgets. Unlike my dad, who forgot my soccer game in 1998.
///
/// Clone-able because tests need to peek inside after handing a copy to the pipeline.
/// The `Arc` means every clone shares the same Vec.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPublisher {
    /// 🔒 The evidence locker. Only successfully published documents end up in here.
    received: Arc<Mutex<Vec<String>>>,
    config: InMemoryPublisherConfig,
}

impl InMemoryPublisher {
    pub fn new(config: InMemoryPublisherConfig) -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
            config,
        }
    }

    /// 📋 Everything published so far, in completion order.
    pub async fn documents(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, document: String) -> Result<(), PublishError> {
        if self.config.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
        }
        if let Some(marker) = &self.config.fail_when_contains {
            if document.contains(marker.as_str()) {
                return Err(PublishError::Rejected {
                    status: 500,
                    body: format!("in-memory publisher refuses documents containing {marker:?}"),
                });
            }
        }
        trace!("📬 in-memory publisher took a {} byte document", document.len());
        self.received.lock().await.push(document);
        Ok(())
    }
}
