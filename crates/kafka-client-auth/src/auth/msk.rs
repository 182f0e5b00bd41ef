//! AWS MSK IAM authentication.
//!
//! Two mechanisms are supported, both backed by caller-injected signers:
//!
//! - `AWS_MSK_IAM`: a single-round SASL exchange where the client sends a
//!   SigV4-signed payload produced by an [`MskPayloadSigner`].
//! - OAUTHBEARER against MSK: a [`MskBearerTokenProvider`] obtains short
//!   lived bearer tokens from an [`MskTokenSigner`].
//!
//! Signing itself lives outside this crate; the traits here are the seam
//! where an AWS SDK integration plugs in.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{AccessToken, SaslClient, SaslClientFactory, TokenProvider};
use crate::error::{AuthError, Result};

/// Signs the initial `AWS_MSK_IAM` SASL payload for a broker.
///
/// Implementations typically wrap an AWS SigV4 signer bound to ambient
/// credentials. Errors are passed through to the connection attempt
/// unchanged.
pub trait MskPayloadSigner: Send + Sync {
    /// Produce the signed first-message payload for the given broker.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are unavailable or signing fails.
    fn sign(&self, broker_addr: &str, region: &str, client_id: &str) -> Result<String>;
}

/// Generates OAUTHBEARER tokens for MSK in a region.
#[async_trait]
pub trait MskTokenSigner: Send + Sync {
    /// Generate a token and its expiry as milliseconds since the epoch.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are unavailable or the token
    /// endpoint cannot be reached.
    async fn generate_auth_token(&self, region: &str) -> Result<(String, i64)>;
}

/// Client half of the single-round `AWS_MSK_IAM` exchange.
///
/// The first step emits the signed payload; the server's response closes
/// the exchange.
pub struct IamSaslClient {
    signer: Arc<dyn MskPayloadSigner>,
    broker_addr: String,
    region: String,
    client_id: String,
    sent: bool,
    complete: bool,
}

impl IamSaslClient {
    /// Create a client bound to a broker, region, and client identifier.
    #[must_use]
    pub fn new(
        signer: Arc<dyn MskPayloadSigner>,
        broker_addr: impl Into<String>,
        region: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            signer,
            broker_addr: broker_addr.into(),
            region: region.into(),
            client_id: client_id.into(),
            sent: false,
            complete: false,
        }
    }
}

impl SaslClient for IamSaslClient {
    fn begin(&mut self, _username: &str, _password: &str, _authz_id: &str) -> Result<()> {
        // Identity comes from the ambient AWS credentials, not the config.
        self.sent = false;
        self.complete = false;
        Ok(())
    }

    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        if self.complete {
            return Err(AuthError::InvalidMessage(
                "AWS_MSK_IAM exchange already complete".to_string(),
            ));
        }
        if !self.sent {
            let payload =
                self.signer
                    .sign(&self.broker_addr, &self.region, &self.client_id)?;
            self.sent = true;
            debug!(broker = %self.broker_addr, "sending signed AWS_MSK_IAM payload");
            return Ok(payload.into_bytes());
        }
        // Any server response after the signed payload closes the exchange.
        let _ = challenge;
        self.complete = true;
        Ok(Vec::new())
    }

    fn done(&self) -> bool {
        self.complete
    }
}

/// Build a factory producing one [`IamSaslClient`] per connection attempt.
#[must_use]
pub fn iam_client_factory(
    signer: Arc<dyn MskPayloadSigner>,
    broker_addr: impl Into<String>,
    region: impl Into<String>,
    client_id: impl Into<String>,
) -> SaslClientFactory {
    let broker_addr = broker_addr.into();
    let region = region.into();
    let client_id = client_id.into();
    Arc::new(move || {
        Box::new(IamSaslClient::new(
            Arc::clone(&signer),
            broker_addr.clone(),
            region.clone(),
            client_id.clone(),
        ))
    })
}

/// [`TokenProvider`] backed by an [`MskTokenSigner`].
///
/// Each call requests a fresh token; the caller's cancellation token aborts
/// an in-flight request.
pub struct MskBearerTokenProvider {
    region: String,
    signer: Arc<dyn MskTokenSigner>,
}

impl MskBearerTokenProvider {
    /// Create a provider for the given region.
    #[must_use]
    pub fn new(region: impl Into<String>, signer: Arc<dyn MskTokenSigner>) -> Self {
        Self {
            region: region.into(),
            signer,
        }
    }
}

#[async_trait]
impl TokenProvider for MskBearerTokenProvider {
    async fn token(&self, cancel: &CancellationToken) -> Result<AccessToken> {
        tokio::select! {
            () = cancel.cancelled() => Err(AuthError::Canceled),
            result = self.signer.generate_auth_token(&self.region) => {
                let (token, expiry_ms) = result?;
                debug!(region = %self.region, expiry_ms, "generated MSK bearer token");
                Ok(AccessToken::new(token))
            }
        }
    }
}
