//! The isolated crypto execution unit.
//!
//! A single long-lived tokio task drains a job channel; each job's
//! CPU-heavy crypto runs under `spawn_blocking`, so independent jobs may
//! complete in any order. Completions are routed back strictly by
//! correlation id through the pending table — never by arrival order. A
//! completion whose id is no longer in the table (timed out, terminated)
//! is dropped silently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use sealbox_core::{engine, kdf, Envelope, Payload};
use sealbox_core::kdf::DeriveCache;

use crate::config::ServiceConfig;
use crate::correlation::{Action, RequestId};
use crate::error::{DispatchError, Error};

/// One logical operation, as handed to the worker.
#[derive(Debug)]
pub enum CryptoOp {
    Encrypt {
        plaintext: String,
        password: String,
        expiry: Option<DateTime<Utc>>,
    },
    Decrypt {
        envelope: String,
        password: String,
    },
}

impl CryptoOp {
    pub fn action(&self) -> Action {
        match self {
            CryptoOp::Encrypt { .. } => Action::Encrypt,
            CryptoOp::Decrypt { .. } => Action::Decrypt,
        }
    }
}

/// Successful worker output.
#[derive(Debug)]
pub enum CryptoOutput {
    Envelope(String),
    Payload(Payload),
}

struct Job {
    id: RequestId,
    op: CryptoOp,
}

type Completion = Result<CryptoOutput, Error>;
type PendingMap = Mutex<HashMap<RequestId, oneshot::Sender<Completion>>>;

/// Handle to one spawned worker. Dropping it terminates the worker.
pub struct Worker {
    jobs: mpsc::UnboundedSender<Job>,
    pending: Arc<PendingMap>,
    handle: tokio::task::JoinHandle<()>,
}

impl Worker {
    /// Spawn the worker loop. Must be called from a tokio runtime.
    pub fn spawn(config: ServiceConfig) -> Worker {
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
        let pending: Arc<PendingMap> = Arc::new(Mutex::new(HashMap::new()));
        let cache = Arc::new(Mutex::new(DeriveCache::new(config.kdf_cache_capacity)));

        let routing = pending.clone();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let pending = routing.clone();
                let cache = cache.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    let Job { id, op } = job;
                    let outcome =
                        match tokio::task::spawn_blocking(move || execute(op, &config, &cache))
                            .await
                        {
                            Ok(result) => result,
                            Err(join_err) => {
                                Err(DispatchError::WorkerFailed(join_err.to_string()).into())
                            }
                        };
                    match pending.lock().remove(&id) {
                        Some(tx) => {
                            // The receiver may have gone away between the
                            // table lookup and the send; nothing to do then.
                            let _ = tx.send(outcome);
                        }
                        None => debug!(%id, "dropping response for abandoned request"),
                    }
                });
            }
            debug!("crypto worker loop exited");
        });

        Worker {
            jobs,
            pending,
            handle,
        }
    }

    /// Register a pending entry and enqueue the job.
    pub fn submit(
        &self,
        op: CryptoOp,
    ) -> Result<(RequestId, oneshot::Receiver<Completion>), DispatchError> {
        let id = RequestId::next(op.action());
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);
        if self
            .jobs
            .send(Job {
                id: id.clone(),
                op,
            })
            .is_err()
        {
            self.pending.lock().remove(&id);
            return Err(DispatchError::WorkerFailed("job channel closed".into()));
        }
        Ok((id, rx))
    }

    /// Forget an outstanding request so a late response is dropped instead
    /// of resolving an already-failed caller. Returns whether an entry was
    /// actually removed.
    pub fn abandon(&self, id: &RequestId) -> bool {
        self.pending.lock().remove(id).is_some()
    }

    /// Reject every outstanding request with `Terminated` and stop the loop.
    /// In-flight blocking work is abandoned, not interrupted.
    pub fn terminate(&self) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock();
            pending.drain().collect()
        };
        for (id, tx) in drained {
            debug!(%id, "rejecting outstanding request on terminate");
            let _ = tx.send(Err(DispatchError::Terminated.into()));
        }
        self.handle.abort();
    }

    /// True once the job channel is gone, i.e. the loop task died.
    pub fn is_failed(&self) -> bool {
        self.jobs.is_closed()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// The full per-call pipeline, run on a blocking thread.
///
/// Step order within a call is fixed: derive key → seal/open →
/// (on decrypt) deserialize payload → check expiry.
fn execute(
    op: CryptoOp,
    config: &ServiceConfig,
    cache: &Mutex<DeriveCache>,
) -> Result<CryptoOutput, Error> {
    match op {
        CryptoOp::Encrypt {
            plaintext,
            password,
            expiry,
        } => {
            let version = config.version;
            let payload = Payload::text(plaintext, expiry, Utc::now());
            let bytes = payload.to_bytes()?;

            let salt = kdf::generate_salt();
            let key = derive_cached(&password, &salt, version, cache)?;
            let sealed = engine::seal(&bytes, &key, version)?;

            let envelope = Envelope {
                version,
                salt: salt.to_vec(),
                nonce: sealed.nonce,
                ciphertext: sealed.ciphertext,
                tag: sealed.tag,
            };
            Ok(CryptoOutput::Envelope(envelope.encode()))
        }
        CryptoOp::Decrypt { envelope, password } => {
            let envelope = Envelope::decode(&envelope)?;
            let key = derive_cached(&password, &envelope.salt, envelope.version, cache)?;
            let plaintext = engine::open(
                &envelope.nonce,
                &envelope.ciphertext,
                &envelope.tag,
                &key,
                envelope.version,
            )?;
            let payload = Payload::from_bytes(&plaintext)?;
            payload.check_expiry(Utc::now())?;
            Ok(CryptoOutput::Payload(payload))
        }
    }
}

/// Cache lookup under the lock, derivation outside it, so one slow
/// derivation never stalls unrelated jobs.
fn derive_cached(
    password: &str,
    salt: &[u8],
    version: sealbox_core::EnvelopeVersion,
    cache: &Mutex<DeriveCache>,
) -> Result<kdf::KeyMaterial, Error> {
    if let Some(material) = cache.lock().get(password, salt, version) {
        return Ok(material);
    }
    let material = kdf::derive(password, salt, &version.kdf_params())?;
    cache
        .lock()
        .insert(password, salt, version, material.clone());
    Ok(material)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealbox_core::EnvelopeVersion;

    fn config() -> ServiceConfig {
        ServiceConfig {
            version: EnvelopeVersion::V2Gcm,
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn execute_roundtrip_is_synchronous_and_pure() {
        let cache = Mutex::new(DeriveCache::new(4));
        let sealed = execute(
            CryptoOp::Encrypt {
                plaintext: "hello".into(),
                password: "pw".into(),
                expiry: None,
            },
            &config(),
            &cache,
        )
        .unwrap();
        let CryptoOutput::Envelope(text) = sealed else {
            panic!("expected envelope output");
        };

        let opened = execute(
            CryptoOp::Decrypt {
                envelope: text,
                password: "pw".into(),
            },
            &config(),
            &cache,
        )
        .unwrap();
        let CryptoOutput::Payload(payload) = opened else {
            panic!("expected payload output");
        };
        assert_eq!(payload.message(), "hello");
        // Both directions used the same salt-keyed cache entry.
        assert_eq!(cache.lock().len(), 1);
    }

    #[test]
    fn execute_decrypt_rejects_expired() {
        let cache = Mutex::new(DeriveCache::new(4));
        let CryptoOutput::Envelope(text) = execute(
            CryptoOp::Encrypt {
                plaintext: "gone".into(),
                password: "pw".into(),
                expiry: Some(Utc::now() - chrono::Duration::seconds(5)),
            },
            &config(),
            &cache,
        )
        .unwrap() else {
            panic!("expected envelope output");
        };

        let err = execute(
            CryptoOp::Decrypt {
                envelope: text,
                password: "pw".into(),
            },
            &config(),
            &cache,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Expired(_)));
    }

    #[tokio::test]
    async fn dead_loop_is_detected_and_submit_fails() {
        let worker = Worker::spawn(config());
        // Kill the loop task out from under the handle, as a panicked or
        // cancelled runtime would.
        worker.handle.abort();
        while !worker.is_failed() {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        let err = worker
            .submit(CryptoOp::Encrypt {
                plaintext: "hello".into(),
                password: "pw".into(),
                expiry: None,
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::WorkerFailed(_)));
        // The failed submit must not leak a pending entry.
        assert_eq!(worker.pending_len(), 0);
    }
}
