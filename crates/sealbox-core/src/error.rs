use chrono::{DateTime, Utc};
use thiserror::Error;

/// The one message shown for any authentication or payload failure.
///
/// Wrong password, flipped ciphertext bytes, bad padding and a garbled
/// payload must all look identical to the caller, otherwise the error
/// becomes a decryption oracle.
pub const GENERIC_DECRYPT_FAILURE: &str = "decryption failed — check your password";

/// Envelope text could not be parsed into its four fields.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed envelope: expected 4 dot-separated fields, found {0}")]
    MalformedEnvelope(usize),

    #[error("invalid base64 in envelope: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("envelope {field} is {actual} bytes, expected {expected}")]
    BadFieldLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported envelope version byte 0x{0:02x}")]
    UnsupportedVersion(u8),
}

/// Key derivation failed before any cipher work started.
#[derive(Debug, Error)]
pub enum KdfError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("salt is {actual} bytes, expected {expected}")]
    InvalidSalt { expected: usize, actual: usize },

    /// Underlying primitive error. Fatal, never retried.
    #[error("key derivation failed: {0}")]
    DerivationFailed(String),
}

/// Authentication failure during `open`.
///
/// All variants display [`GENERIC_DECRYPT_FAILURE`]; the variants exist so
/// tests and logs can tell them apart, the user-visible text cannot.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{}", GENERIC_DECRYPT_FAILURE)]
    TagMismatch,

    #[error("{}", GENERIC_DECRYPT_FAILURE)]
    PaddingInvalid,

    #[error("{}", GENERIC_DECRYPT_FAILURE)]
    EmptyPlaintext,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Contract violation between the KDF profile and the cipher profile,
    /// not a recoverable runtime condition.
    #[error("derived key material is {actual} bytes, need {expected}")]
    KeyMaterialTooShort { expected: usize, actual: usize },

    #[error("cipher initialisation failed: {0}")]
    Cipher(String),
}

/// Authenticated plaintext did not contain a valid payload.
///
/// Displays the same generic text as [`AuthError`]: by the time we are
/// parsing the payload the caller has proven knowledge of the password,
/// but a tampered-then-lucky envelope must not read any differently.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("{}", GENERIC_DECRYPT_FAILURE)]
    UnsupportedType(String),

    #[error("{}", GENERIC_DECRYPT_FAILURE)]
    MissingField(&'static str),

    #[error("{}", GENERIC_DECRYPT_FAILURE)]
    Malformed(#[source] serde_json::Error),
}

/// The payload authenticated and parsed, but its expiry has passed.
#[derive(Debug, Error)]
#[error("this secret expired at {expired_at}")]
pub struct ExpiredSecret {
    pub expired_at: DateTime<Utc>,
}
