//! Envelope wire format.
//!
//! ```text
//! <base64 salt>.<base64 nonce>.<base64 ciphertext>.<base64 tag>
//! ```
//!
//! Exactly four dot-separated fields, standard base64 alphabet with `=`
//! padding. Versioned envelopes prepend one version byte to the salt inside
//! the first field; a first field decoding to exactly 16 bytes is a legacy
//! V1 envelope (see `version`).
//!
//! The codec is strict about the fixed-length fields (salt, nonce, tag) and
//! agnostic about ciphertext length.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::DecodeError;
use crate::version::{EnvelopeVersion, SALT_LEN};

const FIELD_COUNT: usize = 4;
const DELIMITER: char = '.';

/// One encrypted secret. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: EnvelopeVersion,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

impl Envelope {
    /// Serialize to the transport-safe text form.
    pub fn encode(&self) -> String {
        let mut first = Vec::with_capacity(1 + self.salt.len());
        if let Some(byte) = self.version.wire_byte() {
            first.push(byte);
        }
        first.extend_from_slice(&self.salt);

        [&first, &self.nonce, &self.ciphertext, &self.tag]
            .map(|field| STANDARD.encode(field))
            .join(".")
    }

    /// Parse and validate envelope text.
    pub fn decode(text: &str) -> Result<Envelope, DecodeError> {
        let parts: Vec<&str> = text.trim().split(DELIMITER).collect();
        if parts.len() != FIELD_COUNT {
            return Err(DecodeError::MalformedEnvelope(parts.len()));
        }

        let first = STANDARD.decode(parts[0])?;
        let nonce = STANDARD.decode(parts[1])?;
        let ciphertext = STANDARD.decode(parts[2])?;
        let tag = STANDARD.decode(parts[3])?;

        let (version, salt) = match first.len() {
            // Legacy envelopes carry the bare salt and predate the
            // version byte.
            SALT_LEN => (EnvelopeVersion::V1CbcHmac, first),
            len if len == SALT_LEN + 1 => {
                let version = EnvelopeVersion::from_wire_byte(first[0])
                    .ok_or(DecodeError::UnsupportedVersion(first[0]))?;
                (version, first[1..].to_vec())
            }
            len => {
                return Err(DecodeError::BadFieldLength {
                    field: "salt",
                    expected: SALT_LEN,
                    actual: len,
                })
            }
        };

        if nonce.len() != version.nonce_len() {
            return Err(DecodeError::BadFieldLength {
                field: "nonce",
                expected: version.nonce_len(),
                actual: nonce.len(),
            });
        }
        if tag.len() != version.tag_len() {
            return Err(DecodeError::BadFieldLength {
                field: "tag",
                expected: version.tag_len(),
                actual: tag.len(),
            });
        }

        Ok(Envelope {
            version,
            salt,
            nonce,
            ciphertext,
            tag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(version: EnvelopeVersion) -> Envelope {
        Envelope {
            version,
            salt: vec![1u8; version.salt_len()],
            nonce: vec![2u8; version.nonce_len()],
            ciphertext: vec![3u8; 48],
            tag: vec![4u8; version.tag_len()],
        }
    }

    #[test]
    fn encode_decode_roundtrip_both_versions() {
        for version in [EnvelopeVersion::V1CbcHmac, EnvelopeVersion::V2Gcm] {
            let envelope = sample(version);
            let text = envelope.encode();
            assert_eq!(text.split('.').count(), 4);
            let decoded = Envelope::decode(&text).unwrap();
            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn legacy_first_field_is_bare_salt() {
        let text = sample(EnvelopeVersion::V1CbcHmac).encode();
        let first = STANDARD.decode(text.split('.').next().unwrap()).unwrap();
        assert_eq!(first.len(), SALT_LEN);

        let text = sample(EnvelopeVersion::V2Gcm).encode();
        let first = STANDARD.decode(text.split('.').next().unwrap()).unwrap();
        assert_eq!(first.len(), SALT_LEN + 1);
        assert_eq!(first[0], 0x02);
    }

    #[test]
    fn wrong_part_count_is_malformed() {
        let text = sample(EnvelopeVersion::V2Gcm).encode();
        let three = text.rsplit_once('.').unwrap().0;
        assert!(matches!(
            Envelope::decode(three),
            Err(DecodeError::MalformedEnvelope(3))
        ));

        let five = format!("{text}.AAAA");
        assert!(matches!(
            Envelope::decode(&five),
            Err(DecodeError::MalformedEnvelope(5))
        ));
    }

    #[test]
    fn non_base64_field_is_rejected() {
        let mut parts: Vec<String> = sample(EnvelopeVersion::V2Gcm)
            .encode()
            .split('.')
            .map(String::from)
            .collect();
        parts[2] = "not base64 !!".into();
        assert!(matches!(
            Envelope::decode(&parts.join(".")),
            Err(DecodeError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn wrong_nonce_length_is_rejected() {
        let mut envelope = sample(EnvelopeVersion::V2Gcm);
        envelope.nonce = vec![0u8; 16];
        assert!(matches!(
            Envelope::decode(&envelope.encode()),
            Err(DecodeError::BadFieldLength { field: "nonce", .. })
        ));
    }

    #[test]
    fn wrong_tag_length_is_rejected() {
        let mut envelope = sample(EnvelopeVersion::V1CbcHmac);
        envelope.tag = vec![0u8; 16];
        assert!(matches!(
            Envelope::decode(&envelope.encode()),
            Err(DecodeError::BadFieldLength { field: "tag", .. })
        ));
    }

    #[test]
    fn unknown_version_byte_is_rejected() {
        let mut envelope = sample(EnvelopeVersion::V2Gcm);
        envelope.salt = vec![1u8; SALT_LEN];
        let text = envelope.encode();
        // Corrupt the version byte inside the first field.
        let mut first = STANDARD.decode(text.split('.').next().unwrap()).unwrap();
        first[0] = 0x7f;
        let rest = text.splitn(2, '.').nth(1).unwrap();
        let corrupted = format!("{}.{rest}", STANDARD.encode(&first));
        assert!(matches!(
            Envelope::decode(&corrupted),
            Err(DecodeError::UnsupportedVersion(0x7f))
        ));
    }

    #[test]
    fn odd_salt_length_is_rejected() {
        let mut envelope = sample(EnvelopeVersion::V1CbcHmac);
        envelope.salt = vec![0u8; 20];
        assert!(matches!(
            Envelope::decode(&envelope.encode()),
            Err(DecodeError::BadFieldLength { field: "salt", .. })
        ));
    }
}
