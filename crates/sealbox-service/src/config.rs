use std::time::Duration;

use sealbox_core::EnvelopeVersion;

/// Service configuration. Decryption always honours the version found in
/// the envelope; `version` only selects the profile for new envelopes.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Profile used to seal new envelopes.
    pub version: EnvelopeVersion,
    /// Maximum plaintext size accepted by `encrypt`, enforced before
    /// anything is dispatched to the worker.
    pub max_plaintext_size: usize,
    /// Default per-request timeout.
    pub request_timeout: Duration,
    /// Capacity of the worker's derive cache; 0 disables it.
    pub kdf_cache_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: EnvelopeVersion::CURRENT,
            max_plaintext_size: 10 * 1024 * 1024,
            request_timeout: Duration::from_secs(30),
            kdf_cache_capacity: 20,
        }
    }
}
