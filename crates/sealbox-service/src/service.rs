//! Public service handle.
//!
//! `SealboxService` owns a lazily spawned singleton worker and converts
//! each logical `encrypt`/`decrypt` call into a correlated request with a
//! timeout. The handle is cheap to clone; all clones share the worker.
//! The caller's task is never blocked while the expensive key derivation
//! and cipher work run — the only suspension point is the await on the
//! response channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use sealbox_core::error::KdfError;
use sealbox_core::Payload;

use crate::config::ServiceConfig;
use crate::error::{DispatchError, Error};
use crate::worker::{CryptoOp, CryptoOutput, Worker};

#[derive(Clone)]
pub struct SealboxService {
    inner: Arc<Inner>,
}

struct Inner {
    config: ServiceConfig,
    worker: Mutex<Option<Worker>>,
}

impl SealboxService {
    pub fn new(config: ServiceConfig) -> SealboxService {
        SealboxService {
            inner: Arc::new(Inner {
                config,
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn with_defaults() -> SealboxService {
        SealboxService::new(ServiceConfig::default())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Encrypt `plaintext` under `password` into envelope text, using the
    /// configured default timeout.
    pub async fn encrypt(
        &self,
        plaintext: &str,
        password: &str,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<String, Error> {
        self.encrypt_with_timeout(plaintext, password, expiry, self.inner.config.request_timeout)
            .await
    }

    pub async fn encrypt_with_timeout(
        &self,
        plaintext: &str,
        password: &str,
        expiry: Option<DateTime<Utc>>,
        timeout: Duration,
    ) -> Result<String, Error> {
        if plaintext.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }
        let size = plaintext.len();
        let max = self.inner.config.max_plaintext_size;
        if size > max {
            return Err(Error::SizeLimitExceeded { size, max });
        }
        if password.is_empty() {
            return Err(KdfError::EmptyPassword.into());
        }

        let output = self
            .request(
                CryptoOp::Encrypt {
                    plaintext: plaintext.to_string(),
                    password: password.to_string(),
                    expiry,
                },
                timeout,
            )
            .await?;
        match output {
            CryptoOutput::Envelope(text) => Ok(text),
            CryptoOutput::Payload(_) => {
                Err(DispatchError::WorkerFailed("mismatched response variant".into()).into())
            }
        }
    }

    /// Decrypt envelope text with `password`, using the configured default
    /// timeout. The algorithm profile comes from the envelope itself.
    pub async fn decrypt(&self, envelope: &str, password: &str) -> Result<Payload, Error> {
        self.decrypt_with_timeout(envelope, password, self.inner.config.request_timeout)
            .await
    }

    pub async fn decrypt_with_timeout(
        &self,
        envelope: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Payload, Error> {
        if password.is_empty() {
            return Err(KdfError::EmptyPassword.into());
        }

        let output = self
            .request(
                CryptoOp::Decrypt {
                    envelope: envelope.to_string(),
                    password: password.to_string(),
                },
                timeout,
            )
            .await?;
        match output {
            CryptoOutput::Payload(payload) => Ok(payload),
            CryptoOutput::Envelope(_) => {
                Err(DispatchError::WorkerFailed("mismatched response variant".into()).into())
            }
        }
    }

    /// Reject all outstanding requests with `Terminated` and release the
    /// worker. The next call lazily spawns a fresh one.
    pub fn shutdown(&self) {
        if let Some(worker) = self.inner.worker.lock().take() {
            info!("shutting down crypto worker");
            worker.terminate();
        }
    }

    /// Whether a worker is currently alive.
    pub fn is_running(&self) -> bool {
        self.inner.worker.lock().is_some()
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.inner
            .worker
            .lock()
            .as_ref()
            .map_or(0, Worker::pending_len)
    }

    async fn request(&self, op: CryptoOp, timeout: Duration) -> Result<CryptoOutput, Error> {
        let (id, rx) = {
            let mut guard = self.inner.worker.lock();
            // Discard a dead worker so this call gets a fresh one.
            if guard.as_ref().is_some_and(Worker::is_failed) {
                warn!("crypto worker died, respawning");
                *guard = None;
            }
            let worker = guard.get_or_insert_with(|| {
                info!("spawning crypto worker");
                Worker::spawn(self.inner.config.clone())
            });
            worker.submit(op)?
        };
        debug!(%id, "request dispatched");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => {
                debug!(%id, ok = outcome.is_ok(), "request resolved");
                outcome
            }
            // Sender dropped without a response: the worker died with the
            // request in flight.
            Ok(Err(_)) => {
                warn!(%id, "response channel closed");
                Err(DispatchError::WorkerFailed("response channel closed".into()).into())
            }
            Err(_) => {
                // Remove the bookkeeping entry FIRST so a late response is
                // dropped instead of resolving an already-failed caller.
                // The in-flight work itself is abandoned, not interrupted.
                if let Some(worker) = self.inner.worker.lock().as_ref() {
                    worker.abandon(&id);
                }
                warn!(%id, ?timeout, "request timed out");
                Err(DispatchError::Timeout { after: timeout }.into())
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dead_worker_is_replaced_on_the_next_call() {
        let service = SealboxService::with_defaults();
        let envelope = service.encrypt("still here", "pw", None).await.unwrap();

        // Kill the worker loop while its handle stays registered, as if the
        // task died rather than being shut down.
        {
            let guard = service.inner.worker.lock();
            guard.as_ref().unwrap().terminate();
        }
        loop {
            {
                let guard = service.inner.worker.lock();
                if guard.as_ref().unwrap().is_failed() {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        // The dead handle is still in place; only the next call notices.
        assert!(service.is_running());

        let payload = service.decrypt(&envelope, "pw").await.unwrap();
        assert_eq!(payload.message(), "still here");
        assert!(service.is_running());
        service.shutdown();
    }
}
