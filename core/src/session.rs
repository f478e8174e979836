//! Authenticated conversation with one device.
//!
//! A [`DeviceSession`] owns the digest state for a single endpoint. The first request goes
//! out bare; a 401 installs the offered challenge and the request is replayed once with an
//! `Authorization` header. Later requests reuse the challenge, so the nonce counter
//! climbs until the device hands out a new nonce.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use camfleet_common::credential::Credential;
use camfleet_protocols::digest::{Challenge, DigestClient, DigestError};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{DeviceRequest, DeviceResponse, DeviceTransport, TransportError};

pub struct DeviceSession {
    transport: Arc<dyn DeviceTransport>,
    endpoint: SocketAddr,
    credential: Credential,
    digest: Mutex<DigestClient>,
    answered: AtomicBool,
}

impl DeviceSession {
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        endpoint: SocketAddr,
        credential: Credential,
    ) -> Self {
        Self {
            transport,
            endpoint,
            credential,
            digest: Mutex::new(DigestClient::new()),
            answered: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Whether the device has sent back any HTTP reply, 401 included.
    pub fn has_answered(&self) -> bool {
        self.answered.load(Ordering::SeqCst)
    }

    /// Sends `request`, answering at most one fresh challenge.
    ///
    /// Returns whatever non-401 response the device gives; status checking is up to the
    /// caller. `operation` names the call in timeout errors.
    pub async fn send(&self, request: DeviceRequest, operation: &str) -> Result<DeviceResponse> {
        let mut answered_fresh = false;

        loop {
            let mut attempt = request.clone();
            let sent_nonce = {
                let mut digest = self.digest.lock().await;
                match digest.challenge().map(|c| c.nonce.clone()) {
                    Some(nonce) => {
                        let header = digest
                            .authorize(
                                attempt.method.as_str(),
                                &attempt.path,
                                &self.credential.username,
                                &self.credential.password,
                            )
                            .map_err(|source| self.unsupported(source))?;
                        attempt.authorization = Some(header);
                        Some(nonce)
                    }
                    None => None,
                }
            };

            let response = self
                .transport
                .execute(attempt)
                .await
                .map_err(|e| self.transport_error(e, operation))?;
            self.answered.store(true, Ordering::SeqCst);

            if response.status != 401 {
                return Ok(response);
            }

            let challenge = Challenge::from_headers(response.www_authenticate.iter().map(String::as_str))
                .map_err(|e| match e {
                    DigestError::MissingChallenge => Error::AuthChallengeMissing {
                        address: self.endpoint,
                    },
                    other => self.unsupported(other),
                })?;
            challenge.protection().map_err(|e| self.unsupported(e))?;

            let mut digest = self.digest.lock().await;
            if let Some(nonce) = sent_nonce {
                let same_nonce = nonce == challenge.nonce && !challenge.stale;
                if same_nonce || answered_fresh {
                    digest.reset();
                    debug!("{} refused digest response", self.endpoint);
                    return Err(Error::AuthRejected {
                        address: self.endpoint,
                    });
                }
                answered_fresh = true;
            }
            debug!("{} issued challenge (realm {})", self.endpoint, challenge.realm);
            digest.accept(challenge);
        }
    }

    /// GET `path` and require a 2xx reply, returning its body.
    pub async fn get_ok(&self, path: &str, timeout: Duration, operation: &str) -> Result<String> {
        let request = DeviceRequest::get(self.endpoint, path, timeout);
        let response = self.send(request, operation).await?;
        expect_success(response, operation)
    }

    /// Number of requests answered under the current nonce.
    pub async fn nonce_count(&self) -> u32 {
        self.digest.lock().await.nonce_count()
    }

    fn unsupported(&self, source: DigestError) -> Error {
        Error::AuthChallengeUnsupported {
            address: self.endpoint,
            source,
        }
    }

    fn transport_error(&self, e: TransportError, operation: &str) -> Error {
        match e {
            TransportError::Timeout => Error::Timeout {
                operation: operation.to_string(),
            },
            TransportError::Connect(detail) => Error::Unreachable {
                address: self.endpoint,
                detail,
            },
            TransportError::Other(detail) => Error::Transport {
                address: self.endpoint,
                detail,
            },
        }
    }
}

/// Converts a non-2xx reply into [`Error::UnexpectedStatus`].
pub fn expect_success(response: DeviceResponse, operation: &str) -> Result<String> {
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(Error::UnexpectedStatus {
            operation: operation.to_string(),
            status: response.status,
        })
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
