//! Structured plaintext payload.
//!
//! What actually gets sealed is never the raw message but a small JSON
//! document with a closed `type` discriminator:
//!
//! ```json
//! {"type":"text","message":"...","expiry":1735689600000,"createdAt":1735603200000}
//! ```
//!
//! Timestamps are epoch milliseconds for compatibility with envelopes from
//! the legacy deployment; `createdAt` is newer than the format and is
//! tolerated missing on decode. Expiry is checked strictly AFTER successful
//! authentication and deserialization — never before, so an attacker
//! without the password learns nothing about envelope validity timing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ExpiredSecret, PayloadError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text {
        message: String,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            with = "chrono::serde::ts_milliseconds_option"
        )]
        expiry: Option<DateTime<Utc>>,
        #[serde(
            rename = "createdAt",
            default,
            skip_serializing_if = "Option::is_none",
            with = "chrono::serde::ts_milliseconds_option"
        )]
        created_at: Option<DateTime<Utc>>,
    },
}

impl Payload {
    pub fn text(
        message: impl Into<String>,
        expiry: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Payload {
        Payload::Text {
            message: message.into(),
            expiry,
            created_at: Some(created_at),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Payload::Text { message, .. } => message,
        }
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        match self {
            Payload::Text { expiry, .. } => *expiry,
        }
    }

    /// Serialize for the cipher boundary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        serde_json::to_vec(self).map_err(PayloadError::Malformed)
    }

    /// Deserialize authenticated plaintext.
    ///
    /// Unknown `type` values are a hard error, not a fallback; missing
    /// required fields are reported individually so logs stay useful even
    /// though the user-visible message is generic.
    pub fn from_bytes(bytes: &[u8]) -> Result<Payload, PayloadError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(PayloadError::Malformed)?;
        let object = value
            .as_object()
            .ok_or(PayloadError::MissingField("type"))?;

        let kind = object
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(PayloadError::MissingField("type"))?;
        if kind != "text" {
            return Err(PayloadError::UnsupportedType(kind.to_string()));
        }
        if !object.contains_key("message") {
            return Err(PayloadError::MissingField("message"));
        }

        serde_json::from_value(value).map_err(PayloadError::Malformed)
    }

    /// Enforce the expiry embedded at seal time, if any.
    pub fn check_expiry(&self, now: DateTime<Utc>) -> Result<(), ExpiredSecret> {
        match self.expiry() {
            Some(expired_at) if now > expired_at => Err(ExpiredSecret { expired_at }),
            _ => Ok(()),
        }
    }
}
