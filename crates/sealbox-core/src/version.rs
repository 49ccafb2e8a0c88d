//! Envelope versions and their algorithm profiles.
//!
//! A version pins the complete (KDF, cipher, field-length) tuple used to
//! seal an envelope. Defaults may change over time; versions never do, so
//! every envelope ever issued stays decryptable. Never delete a variant.
//!
//! On the wire, versioned envelopes carry one version byte prepended to the
//! salt inside the first base64 field (17 decoded bytes). A first field of
//! exactly 16 bytes is a legacy V1 envelope from before the discriminator
//! existed.

use crate::kdf::{KdfHash, KdfParams};

/// Salt length shared by every profile.
pub const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeVersion {
    /// AES-256-CBC + HMAC-SHA256 encrypt-then-MAC, PBKDF2-HMAC-SHA256.
    /// The original deployment's profile; kept for old envelopes.
    V1CbcHmac,
    /// AES-256-GCM, Argon2id. Current default.
    V2Gcm,
}

impl EnvelopeVersion {
    pub const CURRENT: EnvelopeVersion = EnvelopeVersion::V2Gcm;

    /// Version byte carried inside the first envelope field.
    /// V1 envelopes predate the byte and encode the bare salt.
    pub fn wire_byte(self) -> Option<u8> {
        match self {
            EnvelopeVersion::V1CbcHmac => None,
            EnvelopeVersion::V2Gcm => Some(0x02),
        }
    }

    pub fn from_wire_byte(byte: u8) -> Option<EnvelopeVersion> {
        match byte {
            0x01 => Some(EnvelopeVersion::V1CbcHmac),
            0x02 => Some(EnvelopeVersion::V2Gcm),
            _ => None,
        }
    }

    /// KDF parameters fixed at the time the version was introduced.
    /// The V1 iteration count is the original deployment's value verbatim.
    pub fn kdf_params(self) -> KdfParams {
        match self {
            EnvelopeVersion::V1CbcHmac => KdfParams::Pbkdf2 {
                iterations: 36_936,
                hash: KdfHash::Sha256,
                output_len: 64,
            },
            EnvelopeVersion::V2Gcm => KdfParams::Argon2id {
                time_cost: 3,
                memory_cost_kib: 64 * 1024,
                parallelism: 1,
                output_len: 32,
            },
        }
    }

    pub fn salt_len(self) -> usize {
        SALT_LEN
    }

    /// CBC IV or GCM nonce length.
    pub fn nonce_len(self) -> usize {
        match self {
            EnvelopeVersion::V1CbcHmac => 16,
            EnvelopeVersion::V2Gcm => 12,
        }
    }

    /// HMAC-SHA256 tag or GCM tag length.
    pub fn tag_len(self) -> usize {
        match self {
            EnvelopeVersion::V1CbcHmac => 32,
            EnvelopeVersion::V2Gcm => 16,
        }
    }

    /// Total key material the engine expects: 32+32 (cipher+MAC) for the
    /// encrypt-then-MAC profile, a single 32-byte key for AEAD.
    pub fn derived_key_len(self) -> usize {
        match self {
            EnvelopeVersion::V1CbcHmac => 64,
            EnvelopeVersion::V2Gcm => 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_byte_roundtrip() {
        assert_eq!(EnvelopeVersion::V1CbcHmac.wire_byte(), None);
        assert_eq!(EnvelopeVersion::V2Gcm.wire_byte(), Some(0x02));
        assert_eq!(
            EnvelopeVersion::from_wire_byte(0x02),
            Some(EnvelopeVersion::V2Gcm)
        );
        assert_eq!(
            EnvelopeVersion::from_wire_byte(0x01),
            Some(EnvelopeVersion::V1CbcHmac)
        );
        assert_eq!(EnvelopeVersion::from_wire_byte(0x7f), None);
    }

    #[test]
    fn profiles_are_consistent() {
        for version in [EnvelopeVersion::V1CbcHmac, EnvelopeVersion::V2Gcm] {
            assert_eq!(version.salt_len(), 16);
            match version.kdf_params() {
                KdfParams::Pbkdf2 { output_len, .. }
                | KdfParams::Argon2id { output_len, .. } => {
                    assert_eq!(output_len, version.derived_key_len());
                }
            }
        }
        assert_eq!(EnvelopeVersion::V1CbcHmac.nonce_len(), 16);
        assert_eq!(EnvelopeVersion::V2Gcm.nonce_len(), 12);
        assert_eq!(EnvelopeVersion::V1CbcHmac.tag_len(), 32);
        assert_eq!(EnvelopeVersion::V2Gcm.tag_len(), 16);
    }
}
