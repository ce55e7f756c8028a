use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_credential_types::provider::ProvideCredentials;
use chrono::Utc;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::sigv4::{self, SignableRequest, SigningCredentials};
use crate::backends::Publisher;
use crate::error::PublishError;

const JSON_CONTENT_TYPE: &str = "application/json";

/// 🔧 Where the documents go and how long we're willing to wait for them to get there.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct OpenSearchPublisherConfig {
    /// 📡 `https://search-domain.region.es.amazonaws.com`, scheme optional (defaults to https)
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default = "default_doctype")]
    pub doctype: String,
    /// 🏷️ the SigV4 service name. `es` for managed domains, `aoss` for serverless.
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// 🌎 us-east-1. The Florida of AWS regions. Everyone ends up there eventually.
fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_index() -> String {
    "logs".to_string()
}

fn default_doctype() -> String {
    "apache".to_string()
}

fn default_service() -> String {
    "es".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl OpenSearchPublisherConfig {
    /// 🏗️ Config with every default filled in, for the one field that has none.
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: default_region(),
            index: default_index(),
            doctype: default_doctype(),
            service: default_service(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 📡 Signs and POSTs one document per call. Shared by every job via `Arc`.
///
/// Internally holds:
/// - `client`: the HTTP muscle 💪, one connection pool for the whole process
/// - `target`: the fully resolved `{endpoint}/{index}/{doctype}` URL
/// - `host_header`: host, plus port only when it isn't the scheme's default
/// - `credentials`: resolved once. `None` means every publish fails to sign, loudly.
#[derive(Debug)]
pub struct OpenSearchPublisher {
    client: reqwest::Client,
    target: Url,
    host_header: String,
    config: OpenSearchPublisherConfig,
    credentials: Option<SigningCredentials>,
}

impl OpenSearchPublisher {
    /// 🚀 Resolve credentials from the AWS default chain, then build the publisher.
    ///
    /// A missing credential is not fatal here. The process starts, the first publish
    /// fails to sign, and the job that tried it fails with a message that says why.
    pub(crate) async fn new(config: OpenSearchPublisherConfig) -> Result<Self> {
        let the_credentials = resolve_credentials(&config.region).await;
        Self::with_credentials(config, the_credentials)
    }

    pub(crate) fn with_credentials(
        config: OpenSearchPublisherConfig,
        credentials: Option<SigningCredentials>,
    ) -> Result<Self> {
        let (the_target, the_host_header) = resolve_target(&config)?;

        // 🔧 10s to handshake, 30s to answer. We will wait, but not forever.
        let the_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context(
                "💀 The HTTP client refused to be born. The TLS stack wept. \
                 Probably a missing cert store or a cursed system OpenSSL. Either way: tragic.",
            )?;

        debug!(
            "📡 publishing documents to {} (region {}, service {})",
            the_target, config.region, config.service
        );
        Ok(Self {
            client: the_client,
            target: the_target,
            host_header: the_host_header,
            config,
            credentials,
        })
    }
}

#[async_trait]
impl Publisher for OpenSearchPublisher {
    async fn publish(&self, document: String) -> Result<(), PublishError> {
        let the_credentials = self.credentials.as_ref().ok_or_else(|| {
            PublishError::Signing(
                "no AWS credentials were found in the environment, profile, or instance role"
                    .to_string(),
            )
        })?;

        let the_body = document.into_bytes();
        let the_signature = sigv4::sign(
            &SignableRequest {
                method: "POST",
                path: self.target.path(),
                headers: &[
                    ("content-type", JSON_CONTENT_TYPE),
                    ("host", self.host_header.as_str()),
                    ("presigned-expires", "false"),
                ],
                body: &the_body,
            },
            the_credentials,
            &self.config.region,
            &self.config.service,
            Utc::now(),
        )?;

        let mut the_request = self
            .client
            .post(self.target.clone())
            .header(HOST, &self.host_header)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header("presigned-expires", "false")
            .header("x-amz-date", &the_signature.amz_date)
            .header(AUTHORIZATION, &the_signature.authorization);
        if let Some(token) = &the_signature.security_token {
            the_request = the_request.header("x-amz-security-token", token);
        }

        let the_response = the_request
            .body(the_body)
            .send()
            .await
            .map_err(|e| PublishError::Transport(format!("POST {} failed: {e}", self.target)))?;

        let the_status = the_response.status();
        if !the_status.is_success() {
            // -- 📜 the body usually explains itself. if even that fails, say so.
            let the_body = the_response
                .text()
                .await
                .unwrap_or_else(|e| format!("<response body unreadable: {e}>"));
            return Err(PublishError::Rejected {
                status: the_status.as_u16(),
                body: the_body,
            });
        }

        trace!("✅ document accepted with {}", the_status);
        Ok(())
    }
}

/// 🗺️ `endpoint` → (`{endpoint}/{index}/{doctype}`, Host header value).
fn resolve_target(config: &OpenSearchPublisherConfig) -> Result<(Url, String)> {
    let the_endpoint = config.endpoint.trim().trim_end_matches('/');
    let the_endpoint = if the_endpoint.contains("://") {
        the_endpoint.to_string()
    } else {
        format!("https://{the_endpoint}")
    };

    let the_target = Url::parse(&format!(
        "{the_endpoint}/{}/{}",
        config.index.trim_matches('/'),
        config.doctype.trim_matches('/')
    ))
    .context(format!(
        "💀 '{}' is not an endpoint we can POST to. Expected something like \
         https://search-domain.us-east-1.es.amazonaws.com",
        config.endpoint
    ))?;

    let the_host = the_target.host_str().context(format!(
        "💀 '{}' has no host. A URL without a host is just a wish.",
        config.endpoint
    ))?;
    // -- 🔌 `port()` is None for the scheme's default port, which is exactly when Host omits it
    let the_host_header = match the_target.port() {
        Some(port) => format!("{the_host}:{port}"),
        None => the_host.to_string(),
    };
    Ok((the_target, the_host_header))
}

// 🌎 the region the credential chain (and any STS hop it makes) runs in
fn credential_region(region: &str) -> aws_config::Region {
    aws_config::Region::new(region.trim().to_string())
}

/// 🔑 Ask the AWS default chain for credentials, once. `None` if nobody answers.
async fn resolve_credentials(region: &str) -> Option<SigningCredentials> {
    let the_aws_config = aws_config::from_env()
        .region(credential_region(region))
        .load()
        .await;
    let Some(the_provider) = the_aws_config.credentials_provider() else {
        warn!("🔑 no AWS credentials provider configured: every publish will fail to sign");
        return None;
    };
    match the_provider.provide_credentials().await {
        Ok(credentials) => Some(SigningCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().map(str::to_string),
        }),
        Err(the_error) => {
            warn!(
                "🔑 AWS credentials could not be resolved ({}): every publish will fail to sign",
                the_error
            );
            None
        }
    }
}
