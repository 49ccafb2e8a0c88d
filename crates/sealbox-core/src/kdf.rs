//! Password key derivation.
//!
//! `derive` — turns (password, salt, params) into key material. Pure and
//! deterministic: identical inputs always yield identical bytes; that is
//! what lets a decrypting party reproduce the encrypt-time derivation from
//! the envelope version alone.
//!
//! `DeriveCache` — bounded cache that amortises repeated derivations of the
//! same (password, salt, version) within a session. Keyed by a SHA-256
//! digest, never by the password itself.

use argon2::{Argon2, Params, Version};
use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256, Sha512};
use std::collections::{HashMap, VecDeque};
use zeroize::ZeroizeOnDrop;

use crate::error::KdfError;
use crate::version::{EnvelopeVersion, SALT_LEN};

/// Hash primitive underneath PBKDF2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfHash {
    Sha256,
    Sha512,
}

/// Cost parameters for one derivation. Embedded in the envelope version, so
/// changing a default means introducing a new version, never editing these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfParams {
    Pbkdf2 {
        iterations: u32,
        hash: KdfHash,
        output_len: usize,
    },
    Argon2id {
        time_cost: u32,
        memory_cost_kib: u32,
        parallelism: u32,
        output_len: usize,
    },
}

/// Derived key material. Zeroized on drop; never persisted.
#[derive(Clone, ZeroizeOnDrop)]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial({} bytes)", self.0.len())
    }
}

/// Derive key material from a password and 16-byte salt.
pub fn derive(password: &str, salt: &[u8], params: &KdfParams) -> Result<KeyMaterial, KdfError> {
    if password.is_empty() {
        return Err(KdfError::EmptyPassword);
    }
    if salt.len() != SALT_LEN {
        return Err(KdfError::InvalidSalt {
            expected: SALT_LEN,
            actual: salt.len(),
        });
    }

    match *params {
        KdfParams::Pbkdf2 {
            iterations,
            hash,
            output_len,
        } => {
            let mut output = vec![0u8; output_len];
            match hash {
                KdfHash::Sha256 => {
                    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut output)
                }
                KdfHash::Sha512 => {
                    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, iterations, &mut output)
                }
            }
            Ok(KeyMaterial(output))
        }
        KdfParams::Argon2id {
            time_cost,
            memory_cost_kib,
            parallelism,
            output_len,
        } => {
            let params = Params::new(memory_cost_kib, time_cost, parallelism, Some(output_len))
                .map_err(|e| KdfError::DerivationFailed(e.to_string()))?;
            let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);
            let mut output = vec![0u8; output_len];
            argon2
                .hash_password_into(password.as_bytes(), salt, &mut output)
                .map_err(|e| KdfError::DerivationFailed(e.to_string()))?;
            Ok(KeyMaterial(output))
        }
    }
}

/// Generate a fresh random 16-byte salt (one per seal, stored in the envelope).
pub fn generate_salt() -> [u8; SALT_LEN] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

type CacheKey = [u8; 32];

/// Bounded derive cache with least-recently-inserted eviction.
///
/// Keys are SHA-256 digests of (version byte, salt, password) so the raw
/// password is never retained. A capacity of 0 disables caching.
pub struct DeriveCache {
    capacity: usize,
    entries: HashMap<CacheKey, KeyMaterial>,
    order: VecDeque<CacheKey>,
}

impl DeriveCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(
        &self,
        password: &str,
        salt: &[u8],
        version: EnvelopeVersion,
    ) -> Option<KeyMaterial> {
        self.entries
            .get(&cache_key(password, salt, version))
            .cloned()
    }

    pub fn insert(
        &mut self,
        password: &str,
        salt: &[u8],
        version: EnvelopeVersion,
        material: KeyMaterial,
    ) {
        if self.capacity == 0 {
            return;
        }
        let key = cache_key(password, salt, version);
        if self.entries.insert(key, material).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

fn cache_key(password: &str, salt: &[u8], version: EnvelopeVersion) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update([version.wire_byte().unwrap_or(0x01)]);
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> KdfParams {
        // Low-cost PBKDF2 keeps derivation tests fast.
        KdfParams::Pbkdf2 {
            iterations: 1000,
            hash: KdfHash::Sha256,
            output_len: 64,
        }
    }

    #[test]
    fn derive_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive("correct-horse", &salt, &params()).unwrap();
        let b = derive("correct-horse", &salt, &params()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_salts_yield_different_material() {
        let a = derive("pw", &[1u8; SALT_LEN], &params()).unwrap();
        let b = derive("pw", &[2u8; SALT_LEN], &params()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn empty_password_is_rejected() {
        let err = derive("", &[0u8; SALT_LEN], &params()).unwrap_err();
        assert!(matches!(err, KdfError::EmptyPassword));
    }

    #[test]
    fn wrong_salt_length_is_rejected() {
        let err = derive("pw", &[0u8; 8], &params()).unwrap_err();
        assert!(matches!(
            err,
            KdfError::InvalidSalt {
                expected: 16,
                actual: 8
            }
        ));
    }

    #[test]
    fn argon2_profile_derives_32_bytes() {
        let material = derive(
            "pw",
            &[3u8; SALT_LEN],
            &EnvelopeVersion::V2Gcm.kdf_params(),
        )
        .unwrap();
        assert_eq!(material.len(), 32);
    }

    #[test]
    fn cache_hit_returns_same_material() {
        let mut cache = DeriveCache::new(4);
        let salt = [9u8; SALT_LEN];
        let material = derive("pw", &salt, &params()).unwrap();
        cache.insert("pw", &salt, EnvelopeVersion::V1CbcHmac, material.clone());

        let hit = cache.get("pw", &salt, EnvelopeVersion::V1CbcHmac).unwrap();
        assert_eq!(hit.as_bytes(), material.as_bytes());
        assert!(cache.get("other", &salt, EnvelopeVersion::V1CbcHmac).is_none());
        assert!(cache.get("pw", &salt, EnvelopeVersion::V2Gcm).is_none());
    }

    #[test]
    fn cache_evicts_oldest_insertion() {
        let mut cache = DeriveCache::new(2);
        let material = derive("pw", &[0u8; SALT_LEN], &params()).unwrap();
        cache.insert("pw", &[1u8; SALT_LEN], EnvelopeVersion::V1CbcHmac, material.clone());
        cache.insert("pw", &[2u8; SALT_LEN], EnvelopeVersion::V1CbcHmac, material.clone());
        cache.insert("pw", &[3u8; SALT_LEN], EnvelopeVersion::V1CbcHmac, material);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("pw", &[1u8; SALT_LEN], EnvelopeVersion::V1CbcHmac).is_none());
        assert!(cache.get("pw", &[3u8; SALT_LEN], EnvelopeVersion::V1CbcHmac).is_some());
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let mut cache = DeriveCache::new(0);
        let material = derive("pw", &[0u8; SALT_LEN], &params()).unwrap();
        cache.insert("pw", &[0u8; SALT_LEN], EnvelopeVersion::V1CbcHmac, material);
        assert!(cache.is_empty());
    }
}
