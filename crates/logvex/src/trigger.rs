//! 🔔 Trigger parsing: who rang the doorbell, and which log file did they bring?
//!
//! Two shapes arrive at the door:
//!
//! ```text
//! S3 event:          { "Records": [ { "s3": { "bucket": { "name": .. }, "object": { "key": .. } } } ] }
//! SNS-wrapped event: { "Records": [ { "Sns": { "Message": "<the S3 event above, as a JSON string>" } } ] }
//! ```
//!
//! Records of both kinds may be mixed in one batch. Records that are neither (a
//! CloudWatch alarm that wandered onto the topic, the `s3:TestEvent` S3 sends on
//! setup) are skipped with a log line, not treated as errors.
//!
//! 🔣 Keys arrive form-encoded: spaces as `+`, everything else as `%XX`. `+` becomes a
//! space first, then percent-decoding runs, so a literal plus (sent as `%2B`) survives.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::common::ObjectLocation;

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "Records", default)]
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    #[serde(default)]
    s3: Option<S3Entity>,
    #[serde(rename = "Sns", default)]
    sns: Option<SnsEntity>,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
}

#[derive(Debug, Deserialize)]
struct SnsEntity {
    #[serde(rename = "Message")]
    message: String,
}

/// 🎯 Every object location named by a notification payload, in record order.
///
/// `Err` only when the payload itself isn't JSON, or a key can't be decoded.
/// A well-formed notification that names no objects is an empty `Vec`.
pub fn locations_from_event(payload: &str) -> Result<Vec<ObjectLocation>> {
    let the_notification: Notification = serde_json::from_str(payload).context(
        "💀 The trigger payload is not a notification we recognize. Expected JSON with a \
         `Records` array of S3 or SNS records. Got something else, possibly a cry for help.",
    )?;

    let mut the_locations = Vec::new();
    collect_locations(the_notification, &mut the_locations)?;
    debug!("🔔 trigger named {} objects", the_locations.len());
    Ok(the_locations)
}

fn collect_locations(notification: Notification, into: &mut Vec<ObjectLocation>) -> Result<()> {
    for (index, record) in notification.records.into_iter().enumerate() {
        match record {
            NotificationRecord { s3: Some(s3), .. } => {
                into.push(ObjectLocation::new(
                    s3.bucket.name,
                    decode_object_key(&s3.object.key)?,
                ));
            }
            NotificationRecord { sns: Some(sns), .. } => {
                // 📨 the envelope's message is itself a notification, serialized as a string
                match serde_json::from_str::<Notification>(&sns.message) {
                    Ok(inner) => collect_locations(inner, into)?,
                    Err(the_error) => warn!(
                        "🙈 record {} is an SNS message without an S3 notification inside ({}), skipping",
                        index, the_error
                    ),
                }
            }
            _ => warn!(
                "🙈 record {} names neither an S3 object nor an SNS message, skipping",
                index
            ),
        }
    }
    Ok(())
}

/// 🔣 `access+log%2B2024.txt` → `access log+2024.txt`.
pub fn decode_object_key(raw_key: &str) -> Result<String> {
    let the_spaced = raw_key.replace('+', " ");
    let the_decoded = urlencoding::decode(&the_spaced).context(format!(
        "💀 Object key '{}' percent-decodes into something that isn't UTF-8. \
         S3 allows it. We don't.",
        raw_key
    ))?;
    Ok(the_decoded.into_owned())
}
