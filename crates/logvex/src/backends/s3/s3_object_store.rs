use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use serde::Deserialize;
use tracing::debug;

use crate::backends::{ObjectStore, ObjectStream};
use crate::common::ObjectLocation;

/// 🔧 Configuration for the S3 object store.
///
/// Everything is optional. Leave it all out and the AWS default chain decides:
/// env vars → `~/.aws/config` → instance role → hope.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct S3ObjectStoreConfig {
    /// 🌎 region override. `None` = whatever the default chain says.
    #[serde(default)]
    pub region: Option<String>,
    /// 🏠 custom endpoint for S3-compatible stores (MinIO, LocalStack, the one in the closet)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// 🛣️ `http://host/bucket/key` instead of `http://bucket.host/key`. Most non-AWS stores want this.
    #[serde(default)]
    pub force_path_style: bool,
}

/// 🪣 Streams objects out of S3. One client, shared by every job in the batch.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// 🚀 Resolve AWS config from the environment and build the client.
    ///
    /// No network calls happen here. Credentials are resolved lazily by the SDK,
    /// so a missing key still fails per job, at open time, where it belongs.
    pub(crate) async fn new(config: S3ObjectStoreConfig) -> Result<Self> {
        let mut the_loader = aws_config::from_env();
        if let Some(region) = &config.region {
            the_loader = the_loader.region(aws_config::Region::new(region.clone()));
        }
        let the_aws_config = the_loader.load().await;
        Ok(Self::with_sdk_config(&the_aws_config, &config))
    }

    /// 🔧 Layer the store's own knobs (endpoint, path style) over an already-resolved SDK config.
    fn with_sdk_config(aws_config: &SdkConfig, config: &S3ObjectStoreConfig) -> Self {
        let mut the_builder =
            aws_sdk_s3::config::Builder::from(aws_config).force_path_style(config.force_path_style);
        if let Some(endpoint_url) = &config.endpoint_url {
            the_builder = the_builder.endpoint_url(endpoint_url);
        }
        debug!(
            "🪣 S3 object store ready (region: {:?}, endpoint: {:?})",
            aws_config.region(),
            config.endpoint_url
        );
        Self {
            client: aws_sdk_s3::Client::from_conf(the_builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn open_read_stream(&self, location: &ObjectLocation) -> Result<ObjectStream> {
        let the_response = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .context(format!(
                "💀 GetObject failed for {}. S3 looked in the bucket, looked under the bucket, \
                 looked behind the bucket. Check: bucket name, key, region, IAM permissions, \
                 and whether the object was deleted by a lifecycle rule at the worst possible moment.",
                location
            ))?;

        // 📏 negative or missing length = "we don't know". The progress bar shrugs along.
        let the_content_length = the_response
            .content_length()
            .and_then(|length| u64::try_from(length).ok());

        Ok(ObjectStream {
            reader: Box::new(the_response.body.into_async_read()),
            content_length: the_content_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::RuntimeConfig;
    use crate::backends::{InMemoryPublisher, ObjectStoreBackend, PublisherBackend};
    use crate::error::JobError;
    use crate::supervisors::Pipeline;
    use crate::tracker::JobOutcome;
    use aws_config::BehaviorVersion;
    use aws_credential_types::Credentials;
    use aws_credential_types::provider::SharedCredentialsProvider;
    use tokio::io::AsyncReadExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const THE_LOG: &str = "10.0.0.1 - - [01/Jan/2024:00:00:00 +0000] \"GET /a HTTP/1.1\" 200 10\n\
                           10.0.0.2 - - [01/Jan/2024:00:00:01 +0000] \"GET /b HTTP/1.1\" 404 0\n";

    const NO_SUCH_KEY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Key>ghost.log</Key></Error>"#;

    // 🧪 fixed fake credentials so the SDK signs without consulting the machine it runs on
    fn a_store_pointed_at(server: &MockServer) -> S3ObjectStore {
        let the_sdk_config = SdkConfig::builder()
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                "AKIDEXAMPLE",
                "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
                None,
                None,
                "logvex-tests",
            )))
            .behavior_version(BehaviorVersion::latest())
            .build();
        S3ObjectStore::with_sdk_config(
            &the_sdk_config,
            &S3ObjectStoreConfig {
                region: None,
                endpoint_url: Some(server.uri()),
                force_path_style: true,
            },
        )
    }

    async fn a_mock_s3() -> MockServer {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/access-logs/2024/app.log"))
            .respond_with(ResponseTemplate::new(200).set_body_string(THE_LOG))
            .mount(&the_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/access-logs/ghost.log"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(NO_SUCH_KEY),
            )
            .mount(&the_server)
            .await;
        the_server
    }

    #[tokio::test]
    async fn the_one_where_get_object_streams_the_body_and_its_length() -> Result<()> {
        let the_server = a_mock_s3().await;
        let the_store = a_store_pointed_at(&the_server);

        let mut the_stream = the_store
            .open_read_stream(&ObjectLocation::new("access-logs", "2024/app.log"))
            .await?;
        assert_eq!(the_stream.content_length, Some(THE_LOG.len() as u64));

        let mut the_body = String::new();
        the_stream.reader.read_to_string(&mut the_body).await?;
        assert_eq!(the_body, THE_LOG);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_missing_key_fails_at_open_not_mid_read() {
        let the_server = a_mock_s3().await;
        let the_store = a_store_pointed_at(&the_server);

        let the_result = the_store
            .open_read_stream(&ObjectLocation::new("access-logs", "ghost.log"))
            .await;
        match the_result {
            Ok(stream) => panic!("💀 a missing key opened anyway: {stream:?}"),
            Err(the_error) => {
                assert!(format!("{the_error:#}").contains("GetObject failed for s3://access-logs/ghost.log"))
            }
        }
    }

    #[tokio::test]
    async fn the_one_where_an_s3_backed_job_publishes_every_line_or_fails_at_the_door() {
        let the_server = a_mock_s3().await;
        let the_publisher = InMemoryPublisher::default();
        let the_pipeline = Pipeline::new(
            ObjectStoreBackend::S3(a_store_pointed_at(&the_server)),
            PublisherBackend::InMemory(the_publisher.clone()),
            RuntimeConfig::default(),
        );

        let the_report = the_pipeline
            .run_job(ObjectLocation::new("access-logs", "2024/app.log"))
            .await;
        assert_eq!(
            the_report.outcome,
            JobOutcome::Succeeded {
                acknowledged: 2,
                skipped: 0
            }
        );
        let the_documents = the_publisher.documents().await;
        assert_eq!(the_documents.len(), 2);
        assert!(the_documents.iter().any(|doc| doc.contains("\"path\":\"/b\"")));

        let the_report = the_pipeline
            .run_job(ObjectLocation::new("access-logs", "ghost.log"))
            .await;
        assert!(matches!(
            the_report.outcome,
            JobOutcome::Failed(JobError::SourceOpen { .. })
        ));
    }
}
