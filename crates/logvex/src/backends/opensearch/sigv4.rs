//! 🔏 AWS Signature Version 4, by hand.
//!
//! 🎬 *[the search domain will not take a document from a stranger. it wants a
//! signature. a specific one. computed from the method, the path, the headers, the
//! body, the date, the region, the service, and the secret key, in exactly that
//! order, hashed twice and HMAC'd five times. it will not say which part was wrong.]*
//!
//! ```text
//! canonical request ──sha256──▶ string to sign ──hmac(signing key)──▶ signature
//!                                                    ▲
//!        "AWS4"+secret ─hmac(date)─hmac(region)─hmac(service)─hmac("aws4_request")
//! ```
//!
//! 🧠 Knowledge graph:
//! - The caller passes the headers it will actually send (minus `x-amz-date` and the
//!   session token, which we add). Every passed header is signed.
//! - Paths are canonicalized by URI-encoding each segment of the already-encoded path,
//!   which is the double-encoding every non-S3 service expects.
//! - Query strings: we never send one. The canonical query is always empty.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::PublishError;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

/// 🔑 The three strings that prove who we are. Resolved once per process.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct SigningCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🔒 the secret stays secret, even from `{:?}`
        f.debug_struct("SigningCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// 📝 Everything about a request that ends up inside the signature.
#[derive(Debug)]
pub(crate) struct SignableRequest<'a> {
    pub method: &'a str,
    /// already percent-encoded, as it goes on the wire
    pub path: &'a str,
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a [u8],
}

/// ✍️ What the caller has to attach to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Signature {
    pub amz_date: String,
    pub authorization: String,
    pub security_token: Option<String>,
}

pub(crate) fn sign(
    request: &SignableRequest<'_>,
    credentials: &SigningCredentials,
    region: &str,
    service: &str,
    now: DateTime<Utc>,
) -> Result<Signature, PublishError> {
    if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
        return Err(PublishError::Signing(
            "access key id or secret access key is empty".to_string(),
        ));
    }

    let the_amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let the_date_stamp = now.format("%Y%m%d").to_string();
    let the_scope = format!("{the_date_stamp}/{region}/{service}/aws4_request");

    let mut the_headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), normalize_header_value(value)))
        .collect();
    the_headers.push(("x-amz-date".to_string(), the_amz_date.clone()));
    if let Some(token) = &credentials.session_token {
        the_headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    the_headers.sort();

    let (the_canonical_request, the_signed_headers) =
        canonical_request(request.method, request.path, &the_headers, request.body);
    let the_string_to_sign = format!(
        "{ALGORITHM}\n{the_amz_date}\n{the_scope}\n{}",
        hex_sha256(the_canonical_request.as_bytes())
    );

    let the_signing_key = signing_key(
        &credentials.secret_access_key,
        &the_date_stamp,
        region,
        service,
    )?;
    let the_signature = hex::encode(hmac_sha256(&the_signing_key, the_string_to_sign.as_bytes())?);

    Ok(Signature {
        authorization: format!(
            "{ALGORITHM} Credential={}/{the_scope}, SignedHeaders={the_signed_headers}, Signature={the_signature}",
            credentials.access_key_id
        ),
        amz_date: the_amz_date,
        security_token: credentials.session_token.clone(),
    })
}

/// 📜 Returns the canonical request text and the `;`-joined signed header list.
/// `headers` must already be lower-cased and sorted.
fn canonical_request(
    method: &str,
    path: &str,
    headers: &[(String, String)],
    body: &[u8],
) -> (String, String) {
    let the_canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let the_signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let the_request = format!(
        "{method}\n{}\n\n{the_canonical_headers}\n{the_signed_headers}\n{}",
        canonical_uri(path),
        hex_sha256(body)
    );
    (the_request, the_signed_headers)
}

fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// -- 🧹 trim, and squash runs of spaces to one. AWS is particular about whitespace.
fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn signing_key(
    secret_access_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, PublishError> {
    let the_date_key = hmac_sha256(
        format!("AWS4{secret_access_key}").as_bytes(),
        date_stamp.as_bytes(),
    )?;
    let the_region_key = hmac_sha256(&the_date_key, region.as_bytes())?;
    let the_service_key = hmac_sha256(&the_region_key, service.as_bytes())?;
    hmac_sha256(&the_service_key, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, PublishError> {
    let mut the_mac = HmacSha256::new_from_slice(key)
        .map_err(|e| PublishError::Signing(format!("hmac key rejected: {e}")))?;
    the_mac.update(data);
    Ok(the_mac.finalize().into_bytes().to_vec())
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 🧪 the credentials every AWS documentation page has been using since forever
    fn the_example_credentials() -> SigningCredentials {
        SigningCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: None,
        }
    }

    #[test]
    fn the_one_where_the_signing_key_matches_the_published_derivation() -> Result<(), PublishError> {
        let the_key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )?;
        assert_eq!(
            hex::encode(the_key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
        Ok(())
    }

    #[test]
    fn the_one_where_a_vanilla_get_signs_to_a_known_signature() -> Result<(), PublishError> {
        let the_moment = Utc
            .with_ymd_and_hms(2015, 8, 30, 12, 36, 0)
            .single()
            .ok_or_else(|| PublishError::Signing("bad test date".into()))?;
        let the_request = SignableRequest {
            method: "GET",
            path: "/",
            headers: &[("Host", "example.amazon.com")],
            body: b"",
        };
        let the_signature = sign(
            &the_request,
            &the_example_credentials(),
            "us-east-1",
            "service",
            the_moment,
        )?;

        assert_eq!(the_signature.amz_date, "20150830T123600Z");
        assert_eq!(
            the_signature.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=7ab4567ae243ee168f6bf18206b2b40b61ce08277323168138fa113ed23c538e"
        );
        Ok(())
    }

    #[test]
    fn the_one_where_the_canonical_request_has_every_part_in_order() {
        let the_headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("host".to_string(), "search.example.com".to_string()),
            ("presigned-expires".to_string(), "false".to_string()),
            ("x-amz-date".to_string(), "20240101T000000Z".to_string()),
        ];
        let (the_request, the_signed) =
            canonical_request("POST", "/logs/apache", &the_headers, b"{}");

        assert_eq!(the_signed, "content-type;host;presigned-expires;x-amz-date");
        assert_eq!(
            the_request,
            "POST\n/logs/apache\n\n\
             content-type:application/json\nhost:search.example.com\n\
             presigned-expires:false\nx-amz-date:20240101T000000Z\n\n\
             content-type;host;presigned-expires;x-amz-date\n\
             44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn the_one_where_a_session_token_gets_signed_too() -> Result<(), PublishError> {
        let mut the_credentials = the_example_credentials();
        the_credentials.session_token = Some("FQoGZXIvYXdzE".to_string());
        let the_signature = sign(
            &SignableRequest {
                method: "POST",
                path: "/logs/apache",
                headers: &[("host", "search.example.com")],
                body: b"{}",
            },
            &the_credentials,
            "eu-west-1",
            "es",
            Utc::now(),
        )?;
        assert!(
            the_signature
                .authorization
                .contains("SignedHeaders=host;x-amz-date;x-amz-security-token,")
        );
        assert_eq!(the_signature.security_token.as_deref(), Some("FQoGZXIvYXdzE"));
        Ok(())
    }

    #[test]
    fn the_one_where_empty_credentials_cannot_sign_anything() {
        let the_credentials = SigningCredentials {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: None,
        };
        let the_result = sign(
            &SignableRequest {
                method: "POST",
                path: "/",
                headers: &[],
                body: b"",
            },
            &the_credentials,
            "us-east-1",
            "es",
            Utc::now(),
        );
        assert!(matches!(the_result, Err(PublishError::Signing(_))));
    }

    #[test]
    fn the_one_where_odd_path_segments_get_encoded() {
        assert_eq!(canonical_uri("/my%20index/doc"), "/my%2520index/doc");
        assert_eq!(canonical_uri(""), "/");
        assert_eq!(normalize_header_value("  a   b "), "a b");
    }
}
