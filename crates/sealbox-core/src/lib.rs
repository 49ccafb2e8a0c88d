//! sealbox-core — password-protected envelope format and cryptographic core
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Authenticate before decrypt; authentication failures and wrong
//!   passwords are deliberately indistinguishable to the caller.
//! - Every algorithm profile that ever sealed an envelope stays supported,
//!   keyed by the envelope version.
//!
//! # Module layout
//! - `envelope` — four-field base64 wire format (salt.nonce.ciphertext.tag)
//! - `version`  — envelope versions and their algorithm profiles
//! - `kdf`      — PBKDF2 / Argon2id password key derivation + bounded cache
//! - `engine`   — authenticated encryption (CBC+HMAC and AES-GCM profiles)
//! - `payload`  — structured plaintext (type discriminator, expiry)
//! - `error`    — per-concern error types

pub mod engine;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod payload;
pub mod version;

pub use envelope::Envelope;
pub use error::{AuthError, DecodeError, EngineError, ExpiredSecret, KdfError, PayloadError};
pub use payload::Payload;
pub use version::EnvelopeVersion;
