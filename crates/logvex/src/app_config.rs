//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." -- every developer at 3am 🦆
//!
//! ```toml
//! [object_store.S3]
//! region = "us-east-1"
//!
//! [publisher.OpenSearch]
//! endpoint = "search-my-domain.us-east-1.es.amazonaws.com"
//! index = "logs"
//!
//! [runtime]
//! job_parallelism = 4
//! on_parse_error = "skip"
//! ```
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{
    FileObjectStoreConfig, FilePublisherConfig, InMemoryObjectStoreConfig, InMemoryPublisherConfig,
    OpenSearchPublisherConfig, S3ObjectStoreConfig,
};
use crate::transforms::ParseFailurePolicy;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// 🪣 where the logs come from. Defaults to S3 with the AWS default chain.
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    /// 📡 where the documents go. No default: guessing a search cluster is rude.
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub enum ObjectStoreConfig {
    S3(S3ObjectStoreConfig),
    File(FileObjectStoreConfig),
    InMemory(InMemoryObjectStoreConfig),
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        ObjectStoreConfig::S3(S3ObjectStoreConfig::default())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub enum PublisherConfig {
    OpenSearch(OpenSearchPublisherConfig),
    File(FilePublisherConfig),
    InMemory(InMemoryPublisherConfig),
}

/// 🎛️ How hard the pipeline works and how it reacts when lines misbehave.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// 🧵 jobs running at once. 1 = one file after another.
    #[serde(default = "default_job_parallelism")]
    pub job_parallelism: usize,
    /// 📬 how many queued locations wait for a free job worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// 🚦 per-job cap on publishes in flight. 0 = no cap.
    #[serde(default)]
    pub max_in_flight_publishes: usize,
    #[serde(default)]
    pub on_parse_error: ParseFailurePolicy,
    #[serde(default = "default_read_buffer_bytes")]
    pub read_buffer_bytes: usize,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_job_parallelism() -> usize {
    1
}

fn default_queue_capacity() -> usize {
    10
}

fn default_read_buffer_bytes() -> usize {
    64 * 1024
}

fn default_max_line_bytes() -> usize {
    4 * 1024 * 1024
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            job_parallelism: default_job_parallelism(),
            queue_capacity: default_queue_capacity(),
            max_in_flight_publishes: 0,
            on_parse_error: ParseFailurePolicy::default(),
            read_buffer_bytes: default_read_buffer_bytes(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

/// 🚀 Load the config: from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Environment variables (`LOGVEX_*`, `__` separates nesting levels, so
/// `LOGVEX_RUNTIME__JOB_PARALLELISM=4`) form the base layer. An optional TOML file is
/// merged on top; the file wins on conflicts.
///   - `config_file_name` is None  → env vars only.
///   - `config_file_name` is Some  → env vars + TOML file, merged.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("LOGVEX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (LOGVEX_*). \
             The file exists in our hearts, but apparently not on disk. Or it does, and it's wrong.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (LOGVEX_*). \
                 No file was provided: this one's all on the environment. Classic."
            .to_string(),
    };

    let the_config: AppConfig = config.extract().context(context_msg)?;
    the_config.runtime.validate()?;
    Ok(the_config)
}

impl RuntimeConfig {
    /// 🚧 Zero is a valid number and a terrible setting. `max_in_flight_publishes` is the
    /// one knob where 0 means something ("no cap"); everywhere else it means a pipeline
    /// that can't move, so it's refused here instead of discovered at the first line.
    pub fn validate(&self) -> anyhow::Result<()> {
        let the_zeroes: Vec<&str> = [
            ("job_parallelism", self.job_parallelism),
            ("queue_capacity", self.queue_capacity),
            ("read_buffer_bytes", self.read_buffer_bytes),
            ("max_line_bytes", self.max_line_bytes),
        ]
        .into_iter()
        .filter(|(_, value)| *value == 0)
        .map(|(name, _)| name)
        .collect();
        if !the_zeroes.is_empty() {
            anyhow::bail!(
                "💀 runtime.{} must be at least 1. Zero workers process zero logs, and a zero-byte \
                 line limit turns every line into an error. Ask me how I know.",
                the_zeroes.join(", runtime.")
            );
        }
        Ok(())
    }
}
