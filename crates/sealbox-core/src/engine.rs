//! Authenticated encryption engine.
//!
//! Two constructions, selected by envelope version:
//!
//! - `V1CbcHmac` — AES-256-CBC with PKCS7 padding for confidentiality plus
//!   HMAC-SHA256 over `iv || ciphertext` for integrity (encrypt-then-MAC).
//!   `open` verifies the tag in constant time BEFORE touching the cipher;
//!   unauthenticated ciphertext is never decrypted.
//! - `V2Gcm` — AES-256-GCM; tag verification is integrated in decryption.
//!
//! Nonces are generated fresh from the OS RNG on every `seal`. Reusing a
//! nonce with the same key breaks both constructions; callers never supply
//! nonces, so the invariant holds by construction.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{AuthError, EngineError};
use crate::kdf::KeyMaterial;
use crate::version::EnvelopeVersion;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const CIPHER_KEY_LEN: usize = 32;

/// Output of one `seal` call. The nonce travels in the envelope alongside
/// ciphertext and tag.
#[derive(Debug)]
pub struct Sealed {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// Encrypt and authenticate `plaintext` under the version's construction.
pub fn seal(
    plaintext: &[u8],
    key: &KeyMaterial,
    version: EnvelopeVersion,
) -> Result<Sealed, EngineError> {
    let nonce = generate_nonce(version);
    match version {
        EnvelopeVersion::V1CbcHmac => {
            let (cipher_key, mac_key) = split_key(key, version)?;
            let encryptor = Aes256CbcEnc::new_from_slices(cipher_key, &nonce)
                .map_err(|e| EngineError::Cipher(e.to_string()))?;
            let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
            let tag = compute_mac(mac_key, &nonce, &ciphertext)?;
            Ok(Sealed {
                nonce,
                ciphertext,
                tag,
            })
        }
        EnvelopeVersion::V2Gcm => {
            let (cipher_key, _) = split_key(key, version)?;
            let cipher = Aes256Gcm::new_from_slice(cipher_key)
                .map_err(|e| EngineError::Cipher(e.to_string()))?;
            let mut sealed = cipher
                .encrypt(Nonce::from_slice(&nonce), plaintext)
                .map_err(|e| EngineError::Cipher(e.to_string()))?;
            // AEAD output is ciphertext || tag; the envelope stores them
            // as separate fields.
            let tag = sealed.split_off(sealed.len() - version.tag_len());
            Ok(Sealed {
                nonce,
                ciphertext: sealed,
                tag,
            })
        }
    }
}

/// Verify and decrypt. Tag mismatch, bad padding and empty plaintext all
/// surface as [`AuthError`] variants with one shared user-visible message.
pub fn open(
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    key: &KeyMaterial,
    version: EnvelopeVersion,
) -> Result<Zeroizing<Vec<u8>>, EngineError> {
    if nonce.len() != version.nonce_len() {
        return Err(EngineError::Cipher(format!(
            "nonce must be {} bytes, got {}",
            version.nonce_len(),
            nonce.len()
        )));
    }
    let plaintext = match version {
        EnvelopeVersion::V1CbcHmac => {
            let (cipher_key, mac_key) = split_key(key, version)?;
            verify_mac(mac_key, nonce, ciphertext, tag)?;
            let decryptor = Aes256CbcDec::new_from_slices(cipher_key, nonce)
                .map_err(|e| EngineError::Cipher(e.to_string()))?;
            decryptor
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| AuthError::PaddingInvalid)?
        }
        EnvelopeVersion::V2Gcm => {
            let (cipher_key, _) = split_key(key, version)?;
            let cipher = Aes256Gcm::new_from_slice(cipher_key)
                .map_err(|e| EngineError::Cipher(e.to_string()))?;
            let mut combined = Vec::with_capacity(ciphertext.len() + tag.len());
            combined.extend_from_slice(ciphertext);
            combined.extend_from_slice(tag);
            cipher
                .decrypt(Nonce::from_slice(nonce), combined.as_slice())
                .map_err(|_| AuthError::TagMismatch)?
        }
    };
    if plaintext.is_empty() {
        return Err(AuthError::EmptyPlaintext.into());
    }
    Ok(Zeroizing::new(plaintext))
}

/// Fresh random nonce/IV sized for the version's cipher.
pub fn generate_nonce(version: EnvelopeVersion) -> Vec<u8> {
    use rand::RngCore;
    let mut nonce = vec![0u8; version.nonce_len()];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Split derived key material into cipher key and (for encrypt-then-MAC)
/// MAC key. The material must be exactly the version's derived output
/// length; anything else means the caller derived with the wrong profile.
fn split_key(
    key: &KeyMaterial,
    version: EnvelopeVersion,
) -> Result<(&[u8], &[u8]), EngineError> {
    let expected = version.derived_key_len();
    if key.len() != expected {
        return Err(EngineError::KeyMaterialTooShort {
            expected,
            actual: key.len(),
        });
    }
    let bytes = key.as_bytes();
    Ok((&bytes[..CIPHER_KEY_LEN], &bytes[CIPHER_KEY_LEN..expected]))
}

fn compute_mac(mac_key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, EngineError> {
    // Qualified: `aead::KeyInit` is also in scope and provides its own
    // `new_from_slice` for `Hmac`.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|e| EngineError::Cipher(e.to_string()))?;
    mac.update(nonce);
    mac.update(ciphertext);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn verify_mac(
    mac_key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<(), EngineError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|e| EngineError::Cipher(e.to_string()))?;
    mac.update(nonce);
    mac.update(ciphertext);
    // Constant-time comparison; a wrong password and a tampered envelope
    // are indistinguishable here by design.
    mac.verify_slice(tag).map_err(|_| AuthError::TagMismatch)?;
    Ok(())
}
