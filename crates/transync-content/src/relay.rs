//! CORS relay endpoints
//!
//! Without a privileged fetch channel, every origin request is sent
//! through public relays. Each relay wraps the target URL and the
//! response in its own way; the list order is a reliability ranking and
//! is configuration, not code.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// How a relay wraps the upstream body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelayEnvelope {
    /// Body is passed through untouched
    Raw,
    /// Body is a JSON object carrying the upstream body in `field`
    Json {
        /// Name of the field holding the upstream body
        field: String,
    },
}

/// A single relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEndpoint {
    /// Label for logs
    pub name: String,
    /// Prefix the percent-encoded target URL is appended to
    pub url_prefix: String,
    /// Response shape
    pub envelope: RelayEnvelope,
}

impl RelayEndpoint {
    /// Create raw passthrough relay
    #[must_use]
    pub fn raw(name: impl Into<String>, url_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_prefix: url_prefix.into(),
            envelope: RelayEnvelope::Raw,
        }
    }

    /// Create JSON-wrapped relay
    #[must_use]
    pub fn json(name: impl Into<String>, url_prefix: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_prefix: url_prefix.into(),
            envelope: RelayEnvelope::Json {
                field: field.into(),
            },
        }
    }

    /// Relay URL for a target
    #[must_use]
    pub fn wrap(&self, target: &str) -> String {
        format!("{}{}", self.url_prefix, percent_encode(target))
    }

    /// Recover the upstream body from the relay response
    ///
    /// Returns `None` when a JSON envelope is malformed or carries no
    /// body; the caller moves on to the next relay.
    #[must_use]
    pub fn unwrap_body(&self, body: Vec<u8>) -> Option<Vec<u8>> {
        match &self.envelope {
            RelayEnvelope::Raw => Some(body),
            RelayEnvelope::Json { field } => {
                let value: serde_json::Value = serde_json::from_slice(&body).ok()?;
                match value.get(field)? {
                    serde_json::Value::String(s) => {
                        Some(decode_data_url(s).unwrap_or_else(|| s.clone().into_bytes()))
                    }
                    serde_json::Value::Null => None,
                    other => Some(other.to_string().into_bytes()),
                }
            }
        }
    }
}

/// Default relay ranking
#[must_use]
pub fn default_relays() -> Vec<RelayEndpoint> {
    vec![
        RelayEndpoint::raw("corsproxy", "https://corsproxy.io/?url="),
        RelayEndpoint::json("allorigins-get", "https://api.allorigins.win/get?url=", "contents"),
        RelayEndpoint::raw("allorigins-raw", "https://api.allorigins.win/raw?url="),
        RelayEndpoint::raw("codetabs", "https://api.codetabs.com/v1/proxy?quest="),
    ]
}

/// Percent-encode everything outside the RFC 3986 unreserved set
#[must_use]
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for b in input.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Some relays return binary upstream bodies as base64 data URLs
fn decode_data_url(s: &str) -> Option<Vec<u8>> {
    let rest = s.strip_prefix("data:")?;
    let (_, payload) = rest.split_once(";base64,")?;
    STANDARD.decode(payload.trim()).ok()
}
