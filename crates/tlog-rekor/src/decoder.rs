//! Entry decoder
//!
//! Unwraps a stored log entry down to the signing certificate:
//!
//! ```text
//! {uuid: {body}} -> base64 -> JSON -> spec.signature.publicKey.content
//!                -> base64 -> PEM -> X.509 -> first RFC 822 SAN
//! ```
//!
//! A missing public key is a normal outcome (the entry was signed with a
//! bare key, or is of a kind without one). Malformed encodings are errors.
//! Decoding is a pure function of the input bytes.

use crate::error::DecodeError;
use crate::types::LogEntry;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::{debug, info, warn};
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;

/// Location of the signing certificate inside an entry body
const PUBLIC_KEY_CONTENT_PATH: &[&str] = &["spec", "signature", "publicKey", "content"];

/// Facts recovered from one entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedCertificateFacts {
    /// Entry UUID, empty when the envelope holds no entries
    pub uuid: String,
    /// First email SAN of the signing certificate
    pub email: Option<String>,
    /// Whether the body carried public key content
    pub public_key: bool,
}

/// Result of walking a fixed path through a JSON document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup<'a> {
    Found(&'a str),
    Absent(&'static str),
    WrongType(&'static str),
}

fn lookup_str<'a>(root: &'a Map<String, Value>, path: &[&'static str]) -> Lookup<'a> {
    let Some((&last, parents)) = path.split_last() else {
        return Lookup::Absent("");
    };

    let mut node = root;
    for &key in parents {
        match node.get(key) {
            None => return Lookup::Absent(key),
            Some(Value::Object(next)) => node = next,
            Some(_) => return Lookup::WrongType(key),
        }
    }

    match node.get(last) {
        None => Lookup::Absent(last),
        Some(Value::String(s)) => Lookup::Found(s),
        Some(_) => Lookup::WrongType(last),
    }
}

/// Stateless decoder for stored Rekor entries
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryDecoder;

impl EntryDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a serialized entry envelope
    pub fn decode(&self, raw: &[u8]) -> Result<DecodedCertificateFacts, DecodeError> {
        let entry: LogEntry = serde_json::from_slice(raw).map_err(DecodeError::Envelope)?;
        self.decode_entry(&entry)
    }

    /// Decode an already parsed entry
    pub fn decode_entry(&self, entry: &LogEntry) -> Result<DecodedCertificateFacts, DecodeError> {
        let Some((uuid, anon)) = entry.first() else {
            return Ok(DecodedCertificateFacts::default());
        };
        if entry.len() > 1 {
            warn!(
                "envelope holds {} entries, decoding only uuid={}",
                entry.len(),
                uuid
            );
        }

        let mut facts = DecodedCertificateFacts {
            uuid: uuid.to_string(),
            ..Default::default()
        };

        let body = anon.body.as_str().ok_or_else(|| DecodeError::BodyNotString {
            uuid: facts.uuid.clone(),
        })?;
        let document = decode_body(uuid, body)?;

        let content = match lookup_str(&document, PUBLIC_KEY_CONTENT_PATH) {
            Lookup::Found(content) if !content.is_empty() => content,
            Lookup::Found(_) => {
                debug!("empty public key content for uuid={}", uuid);
                return Ok(facts);
            }
            Lookup::Absent(key) => {
                debug!("no public key content for uuid={}: missing {}", uuid, key);
                return Ok(facts);
            }
            Lookup::WrongType(key) => {
                debug!("no public key content for uuid={}: {} has unexpected type", uuid, key);
                return Ok(facts);
            }
        };
        facts.public_key = true;

        facts.email = certificate_email(uuid, content)?;
        if facts.email.is_none() {
            info!("email not found for uuid={}", uuid);
        }
        Ok(facts)
    }
}

/// Decode the base64 entry body into its JSON document.
///
/// The URL-safe alphabet is tried first; bodies produced with the standard
/// alphabet are accepted as well.
fn decode_body(uuid: &str, body: &str) -> Result<Map<String, Value>, DecodeError> {
    let body = without_line_breaks(body);
    let bytes = URL_SAFE
        .decode(body.as_bytes())
        .or_else(|url_err| STANDARD.decode(body.as_bytes()).map_err(|_| url_err))
        .map_err(|source| DecodeError::BodyBase64 {
            uuid: uuid.to_string(),
            source,
        })?;

    serde_json::from_slice(&bytes).map_err(|source| DecodeError::BodyJson {
        uuid: uuid.to_string(),
        source,
    })
}

/// Wrapped base64 is accepted: CR and LF are dropped before decoding
fn without_line_breaks(encoded: &str) -> Cow<'_, str> {
    if encoded.contains(['\r', '\n']) {
        Cow::Owned(encoded.chars().filter(|c| !matches!(c, '\r' | '\n')).collect())
    } else {
        Cow::Borrowed(encoded)
    }
}

/// Parse base64 PEM content as a certificate and return its first email SAN
fn certificate_email(uuid: &str, content: &str) -> Result<Option<String>, DecodeError> {
    let pem_bytes = STANDARD
        .decode(without_line_breaks(content).as_bytes())
        .map_err(|source| DecodeError::ContentBase64 {
            uuid: uuid.to_string(),
            source,
        })?;

    let (_, pem) = parse_x509_pem(&pem_bytes).map_err(|e| DecodeError::NoPemBlock {
        uuid: uuid.to_string(),
        message: e.to_string(),
    })?;

    let cert = pem.parse_x509().map_err(|e| DecodeError::CertificateParse {
        uuid: uuid.to_string(),
        message: e.to_string(),
    })?;

    let san = match cert.subject_alternative_name() {
        Ok(Some(san)) => san,
        Ok(None) => return Ok(None),
        Err(e) => {
            warn!("unreadable subject alternative names for uuid={}: {}", uuid, e);
            return Ok(None);
        }
    };

    Ok(san.value.general_names.iter().find_map(|name| match name {
        GeneralName::RFC822Name(email) => Some(email.to_string()),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{hashedrekord_body, DEMO_EMAIL_CERT_PEM, DEMO_URI_CERT_PEM};
    use crate::types::LogEntryAnon;

    const UUID: &str = "24296fb24b8ad77a1ad7edcd612f1e4a2c12b8c4b8ee4ed5e8e3e1b1f7b4a0c1";

    fn envelope(body: impl Into<String>) -> Vec<u8> {
        let entry = LogEntry::single(UUID, LogEntryAnon::with_body(body));
        serde_json::to_vec(&entry).unwrap()
    }

    fn body_from_json(doc: serde_json::Value) -> String {
        STANDARD.encode(doc.to_string())
    }

    fn body_with_content(content: &str) -> String {
        body_from_json(serde_json::json!({
            "kind": "hashedrekord",
            "spec": {"signature": {"publicKey": {"content": content}}}
        }))
    }

    #[test]
    fn test_lookup_distinguishes_absent_and_wrong_type() {
        let doc: Map<String, Value> =
            serde_json::from_str(r#"{"a": {"b": "x"}, "c": 5, "d": {"e": 1}}"#).unwrap();
        assert_eq!(lookup_str(&doc, &["a", "b"]), Lookup::Found("x"));
        assert_eq!(lookup_str(&doc, &["a", "z"]), Lookup::Absent("z"));
        assert_eq!(lookup_str(&doc, &["c", "b"]), Lookup::WrongType("c"));
        assert_eq!(lookup_str(&doc, &["d", "e"]), Lookup::WrongType("e"));
        assert_eq!(lookup_str(&doc, &[]), Lookup::Absent(""));
    }

    #[test]
    fn test_empty_envelope_is_not_an_error() {
        let facts = EntryDecoder::new().decode(b"{}").unwrap();
        assert_eq!(facts, DecodedCertificateFacts::default());
        assert_eq!(facts.uuid, "");
        assert!(facts.email.is_none());
    }

    #[test]
    fn test_missing_public_key_is_not_an_error() {
        let facts = EntryDecoder::new()
            .decode(&envelope(hashedrekord_body(None)))
            .unwrap();
        assert_eq!(facts.uuid, UUID);
        assert!(facts.email.is_none());
        assert!(!facts.public_key);
    }

    #[test]
    fn test_wrong_type_on_path_is_absence() {
        let body = body_from_json(serde_json::json!({"spec": {"signature": "MEUC"}}));
        let facts = EntryDecoder::new().decode(&envelope(body)).unwrap();
        assert!(!facts.public_key);

        let body = body_from_json(serde_json::json!({
            "spec": {"signature": {"publicKey": {"content": 12}}}
        }));
        let facts = EntryDecoder::new().decode(&envelope(body)).unwrap();
        assert!(!facts.public_key);

        let facts = EntryDecoder::new()
            .decode(&envelope(body_with_content("")))
            .unwrap();
        assert!(!facts.public_key);
    }

    #[test]
    fn test_email_from_certificate() {
        let facts = EntryDecoder::new()
            .decode(&envelope(hashedrekord_body(Some(DEMO_EMAIL_CERT_PEM))))
            .unwrap();
        assert_eq!(facts.uuid, UUID);
        assert_eq!(facts.email.as_deref(), Some("alice@example.com"));
        assert!(facts.public_key);
    }

    #[test]
    fn test_certificate_without_email() {
        let facts = EntryDecoder::new()
            .decode(&envelope(hashedrekord_body(Some(DEMO_URI_CERT_PEM))))
            .unwrap();
        assert!(facts.public_key);
        assert!(facts.email.is_none());
    }

    #[test]
    fn test_url_safe_body() {
        let doc = serde_json::json!({
            "spec": {"signature": {"publicKey": {"content": STANDARD.encode(DEMO_EMAIL_CERT_PEM)}}}
        });
        let body = URL_SAFE.encode(doc.to_string());
        let facts = EntryDecoder::new().decode(&envelope(body)).unwrap();
        assert_eq!(facts.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_line_wrapped_base64() {
        let wrap = |encoded: String| {
            encoded
                .as_bytes()
                .chunks(64)
                .map(|line| std::str::from_utf8(line).unwrap())
                .collect::<Vec<_>>()
                .join("\r\n")
        };

        let content = wrap(STANDARD.encode(DEMO_EMAIL_CERT_PEM));
        assert!(content.contains('\n'));
        let facts = EntryDecoder::new()
            .decode(&envelope(body_with_content(&content)))
            .unwrap();
        assert_eq!(facts.email.as_deref(), Some("alice@example.com"));

        let body = wrap(hashedrekord_body(Some(DEMO_EMAIL_CERT_PEM)));
        let facts = EntryDecoder::new().decode(&envelope(body)).unwrap();
        assert_eq!(facts.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let decoder = EntryDecoder::new();
        let raw = envelope(hashedrekord_body(Some(DEMO_EMAIL_CERT_PEM)));
        assert_eq!(decoder.decode(&raw).unwrap(), decoder.decode(&raw).unwrap());

        let raw = envelope(hashedrekord_body(None));
        assert_eq!(decoder.decode(&raw).unwrap(), decoder.decode(&raw).unwrap());
    }

    #[test]
    fn test_invalid_pem_is_recoverable() {
        let decoder = EntryDecoder::new();
        let not_pem = STANDARD.encode("this is not a pem block");

        let err = decoder
            .decode(&envelope(body_with_content(&not_pem)))
            .unwrap_err();
        assert!(matches!(err, DecodeError::NoPemBlock { .. }));

        // The decoder keeps working for the next entry
        let facts = decoder
            .decode(&envelope(hashedrekord_body(Some(DEMO_EMAIL_CERT_PEM))))
            .unwrap();
        assert_eq!(facts.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_non_certificate_pem() {
        let pem = "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n";
        let err = EntryDecoder::new()
            .decode(&envelope(body_with_content(&STANDARD.encode(pem))))
            .unwrap_err();
        assert!(matches!(err, DecodeError::CertificateParse { .. }));
    }

    #[test]
    fn test_malformed_layers() {
        let decoder = EntryDecoder::new();

        assert!(matches!(
            decoder.decode(b"[1, 2]").unwrap_err(),
            DecodeError::Envelope(_)
        ));

        let raw = format!(r#"{{"{UUID}": {{"body": 5}}}}"#);
        assert!(matches!(
            decoder.decode(raw.as_bytes()).unwrap_err(),
            DecodeError::BodyNotString { .. }
        ));

        assert!(matches!(
            decoder.decode(&envelope("%%% not base64 %%%")).unwrap_err(),
            DecodeError::BodyBase64 { .. }
        ));

        assert!(matches!(
            decoder
                .decode(&envelope(STANDARD.encode("not json")))
                .unwrap_err(),
            DecodeError::BodyJson { .. }
        ));

        assert!(matches!(
            decoder
                .decode(&envelope(body_with_content("%%%")))
                .unwrap_err(),
            DecodeError::ContentBase64 { .. }
        ));
    }

    #[test]
    fn test_multiple_entries_decode_first_uuid() {
        let mut entry = LogEntry::new();
        entry.insert("bbbb", LogEntryAnon::with_body(hashedrekord_body(None)));
        entry.insert(
            "aaaa",
            LogEntryAnon::with_body(hashedrekord_body(Some(DEMO_EMAIL_CERT_PEM))),
        );

        let facts = EntryDecoder::new().decode_entry(&entry).unwrap();
        assert_eq!(facts.uuid, "aaaa");
        assert_eq!(facts.email.as_deref(), Some("alice@example.com"));
    }
}
