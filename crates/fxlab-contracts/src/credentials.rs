use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Epoch values above this are treated as milliseconds rather than seconds.
const MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed reading credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credential file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("access token not found in credential file")]
    MissingToken,
}

/// Bearer token plus the browser session state captured alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub access_token: String,
    pub user: Map<String, Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cookies: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<Map<String, Value>>,
    #[serde(default)]
    expires: Option<Value>,
    #[serde(default)]
    cookies: Vec<CookieEntry>,
}

#[derive(Debug, Deserialize)]
struct CookieEntry {
    name: String,
    value: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            user: Map::new(),
            expires_at: None,
            cookies: IndexMap::new(),
        }
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// `name=value; name=value` in file order, or `None` when no cookies were stored.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|expires| expires <= now).unwrap_or(false)
    }
}

pub fn load_credentials(path: &Path) -> Result<Credentials, CredentialError> {
    let raw = std::fs::read(path).map_err(|source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let credentials = parse_credentials(&decode_text(&raw))?;
    if credentials.is_expired_at(Utc::now()) {
        log::warn!(
            "access token in {} expired at {}",
            path.display(),
            credentials
                .expires_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default()
        );
    }
    Ok(credentials)
}

pub fn parse_credentials(text: &str) -> Result<Credentials, CredentialError> {
    let file: CredentialFile = serde_json::from_str(text)?;
    let access_token = file
        .access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or(CredentialError::MissingToken)?;
    let mut cookies = IndexMap::new();
    for cookie in file.cookies {
        cookies.insert(cookie.name, cookie.value);
    }
    Ok(Credentials {
        access_token,
        user: file.user.unwrap_or_default(),
        expires_at: file.expires.as_ref().and_then(parse_expiry),
        cookies,
    })
}

/// Decodes credential bytes without assuming UTF-8: BOM first, then strict UTF-8,
/// then a statistical guess.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    log::debug!("credential file decoded as {}", encoding.name());
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn parse_expiry(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => {
            let raw = number.as_f64()?;
            if raw >= MILLIS_THRESHOLD {
                DateTime::from_timestamp_millis(raw as i64)
            } else {
                DateTime::from_timestamp(raw as i64, 0)
            }
        }
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|at| at.with_timezone(&Utc)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{DateTime, Utc};

    use super::{decode_text, load_credentials, parse_credentials, CredentialError, Credentials};

    #[test]
    fn loads_token_user_and_cookies_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("googel.json");
        fs::write(
            &path,
            r#"{
                "access_token": "ya29.token",
                "user": {"name": "Ada", "email": "ada@example.com"},
                "expires": 4102444800,
                "cookies": [
                    {"name": "__Secure-next-auth.session-token", "value": "abc"},
                    {"name": "email", "value": "ada%40example.com"}
                ]
            }"#,
        )?;

        let credentials = load_credentials(&path)?;
        assert_eq!(credentials.access_token, "ya29.token");
        assert_eq!(credentials.bearer(), "Bearer ya29.token");
        assert_eq!(credentials.user["name"], "Ada");
        assert_eq!(
            credentials.cookie_header().as_deref(),
            Some("__Secure-next-auth.session-token=abc; email=ada%40example.com")
        );
        assert_eq!(
            credentials.expires_at,
            DateTime::from_timestamp(4_102_444_800, 0)
        );
        assert!(!credentials.is_expired_at(Utc::now()));
        Ok(())
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = parse_credentials(r#"{"user": {}, "cookies": []}"#).err();
        assert!(matches!(err, Some(CredentialError::MissingToken)));

        let err = parse_credentials(r#"{"access_token": "  "}"#).err();
        assert!(matches!(err, Some(CredentialError::MissingToken)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_credentials("{not json").err();
        assert!(matches!(err, Some(CredentialError::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let err = load_credentials(&temp.path().join("absent.json")).err();
        assert!(matches!(err, Some(CredentialError::Io { .. })));
        Ok(())
    }

    #[test]
    fn optional_fields_default_to_empty() -> anyhow::Result<()> {
        let credentials = parse_credentials(r#"{"access_token": "t"}"#)?;
        assert_eq!(credentials, Credentials::new("t"));
        assert_eq!(credentials.cookie_header(), None);
        Ok(())
    }

    #[test]
    fn millisecond_and_string_expiry_are_understood() -> anyhow::Result<()> {
        let millis = parse_credentials(r#"{"access_token": "t", "expires": 1700000000000}"#)?;
        assert_eq!(
            millis.expires_at,
            DateTime::from_timestamp_millis(1_700_000_000_000)
        );
        assert!(millis.is_expired_at(Utc::now()));

        let text = parse_credentials(
            r#"{"access_token": "t", "expires": "2030-01-01T00:00:00.000Z"}"#,
        )?;
        assert_eq!(
            text.expires_at.map(|at| at.timestamp()),
            Some(1_893_456_000)
        );
        Ok(())
    }

    #[test]
    fn decodes_utf16_with_bom() -> anyhow::Result<()> {
        let json = r#"{"access_token": "wide"}"#;
        let mut bytes = vec![0xFF, 0xFE];
        for unit in json.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let credentials = parse_credentials(&decode_text(&bytes))?;
        assert_eq!(credentials.access_token, "wide");
        Ok(())
    }

    #[test]
    fn decodes_utf8_bom_and_legacy_single_byte_text() {
        let mut with_bom = vec![0xEF, 0xBB, 0xBF];
        with_bom.extend_from_slice(br#"{"access_token": "t"}"#);
        assert_eq!(decode_text(&with_bom), r#"{"access_token": "t"}"#);

        // "café" in windows-1252 is not valid UTF-8.
        let legacy = b"{\"user\": {\"name\": \"caf\xe9\"}}";
        let decoded = decode_text(legacy);
        assert!(decoded.starts_with("{\"user\": {\"name\": \"caf"));
        assert!(decoded.ends_with("\"}}"));
    }
}
