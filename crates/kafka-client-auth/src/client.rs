//! Shared client security configuration target.
//!
//! [`ClientSecurityConfig`] represents the broker client's security state:
//! SASL enablement and mechanism, credentials, the per-connection SASL
//! client factory, the bearer-token provider, TLS enablement and context,
//! and GSSAPI parameters. Exactly one dispatcher invocation owns it per
//! client construction; no concurrent writers are assumed and no internal
//! synchronization is performed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, Result};

/// Mechanism identifier sent during the SASL handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireMechanism {
    /// SASL/PLAIN.
    Plain,
    /// SASL/SCRAM-SHA-256.
    ScramSha256,
    /// SASL/SCRAM-SHA-512.
    ScramSha512,
    /// AWS MSK IAM signed-payload mechanism.
    AwsMskIam,
    /// OAUTHBEARER token mechanism.
    OAuthBearer,
    /// Kerberos/GSSAPI.
    Gssapi,
}

impl WireMechanism {
    /// Get the mechanism name as sent in the SaslHandshake request.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
            Self::AwsMskIam => "AWS_MSK_IAM",
            Self::OAuthBearer => "OAUTHBEARER",
            Self::Gssapi => "GSSAPI",
        }
    }
}

/// SASL handshake protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeVersion {
    /// Handshake version 0 (legacy framing).
    #[default]
    V0,
    /// Handshake version 1.
    V1,
}

impl HandshakeVersion {
    /// Get the wire representation of the version.
    #[must_use]
    pub fn as_i16(self) -> i16 {
        match self {
            Self::V0 => 0,
            Self::V1 => 1,
        }
    }

    /// Map a raw configured version to a handshake version.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidEnumValue`] for anything other than 0 or 1.
    pub fn from_raw(raw: i16) -> Result<Self> {
        match raw {
            0 => Ok(Self::V0),
            1 => Ok(Self::V1),
            other => Err(AuthError::InvalidEnumValue {
                field: "version",
                value: other.to_string(),
                allowed: "0, 1",
            }),
        }
    }
}

/// Kerberos ticket acquisition method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GssapiAuthType {
    /// Acquire tickets from a keytab file.
    Keytab,
    /// Acquire tickets with a username and password.
    UserPassword,
}

/// GSSAPI parameters installed for the external Kerberos subsystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GssapiSettings {
    /// Ticket acquisition method; `None` until Kerberos is configured.
    pub auth_type: Option<GssapiAuthType>,
    /// Client principal username.
    pub username: String,
    /// Password, set only for [`GssapiAuthType::UserPassword`].
    pub password: String,
    /// Kerberos realm.
    pub realm: String,
    /// Broker service name.
    pub service_name: String,
    /// Path to krb5.conf.
    pub config_path: PathBuf,
    /// Keytab path, set only for [`GssapiAuthType::Keytab`].
    pub keytab_path: PathBuf,
    /// Disable the FAST negotiation extension.
    pub disable_fast_negotiation: bool,
}

/// A client-side SASL exchange, created fresh for each connection attempt.
///
/// The driver calls [`begin`](SaslClient::begin) once with the configured
/// credentials, then alternates [`step`](SaslClient::step) with the server's
/// challenges (the first call receives an empty challenge) until
/// [`done`](SaslClient::done) reports completion.
pub trait SaslClient: Send {
    /// Prepare the exchange with the configured identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is unusable for this mechanism.
    fn begin(&mut self, username: &str, password: &str, authz_id: &str) -> Result<()>;

    /// Process a server challenge and produce the next client message.
    ///
    /// # Errors
    ///
    /// Returns an error if the challenge is malformed or verification fails.
    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>>;

    /// Check whether the exchange has completed successfully.
    fn done(&self) -> bool;
}

/// Factory producing one [`SaslClient`] per connection attempt.
///
/// Clients are never shared between attempts; each invocation must return a
/// fresh instance with its own nonce and state.
pub type SaslClientFactory = Arc<dyn Fn() -> Box<dyn SaslClient> + Send + Sync>;

/// A short-lived opaque bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The opaque token value.
    pub token: String,
    /// Optional SASL extensions sent alongside the token.
    pub extensions: HashMap<String, String>,
}

impl AccessToken {
    /// Create a token with no extensions.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            extensions: HashMap::new(),
        }
    }
}

/// Supplies a fresh bearer token whenever the driver needs one, typically
/// once per connection attempt and on token expiry.
///
/// Implementations must be safe to call concurrently from multiple
/// connection attempts. The cancellation token is supplied by the caller at
/// call time; a canceled token must abort the outstanding request rather
/// than block.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a fresh access token.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails or `cancel` fires first. The driver
    /// treats these as retryable connection failures.
    async fn token(&self, cancel: &CancellationToken) -> Result<AccessToken>;
}

/// SASL portion of the client security state.
#[derive(Clone, Default)]
pub struct SaslSettings {
    /// Whether SASL authentication is enabled.
    pub enabled: bool,
    /// Selected mechanism; `None` until a configurator sets one.
    pub mechanism: Option<WireMechanism>,
    /// Username sent during authentication.
    pub username: String,
    /// Password sent during authentication.
    pub password: String,
    /// Handshake protocol version.
    pub handshake_version: HandshakeVersion,
    /// Factory for per-connection SASL clients (SCRAM and AWS_MSK_IAM).
    pub client_factory: Option<SaslClientFactory>,
    /// Bearer-token provider (OAUTHBEARER).
    pub token_provider: Option<Arc<dyn TokenProvider>>,
    /// GSSAPI parameters.
    pub gssapi: GssapiSettings,
}

impl std::fmt::Debug for SaslSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaslSettings")
            .field("enabled", &self.enabled)
            .field("mechanism", &self.mechanism)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("handshake_version", &self.handshake_version)
            .field("client_factory", &self.client_factory.as_ref().map(|_| "<factory>"))
            .field("token_provider", &self.token_provider.as_ref().map(|_| "<provider>"))
            .field("gssapi", &self.gssapi)
            .finish()
    }
}

/// TLS portion of the client security state.
#[derive(Clone, Default)]
pub struct TlsSettings {
    /// Whether TLS is enabled.
    pub enabled: bool,
    /// The rustls client context to use for connections.
    pub context: Option<Arc<rustls::ClientConfig>>,
}

impl std::fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsSettings")
            .field("enabled", &self.enabled)
            .field("context", &self.context.as_ref().map(|_| "<context>"))
            .finish()
    }
}

/// The broker client's mutable security state.
#[derive(Debug, Clone)]
pub struct ClientSecurityConfig {
    /// Client identifier, used by AWS_MSK_IAM when signing.
    pub client_id: String,
    /// SASL state.
    pub sasl: SaslSettings,
    /// TLS state.
    pub tls: TlsSettings,
}

impl ClientSecurityConfig {
    /// Create a security configuration with the given client identifier.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            sasl: SaslSettings::default(),
            tls: TlsSettings::default(),
        }
    }
}

impl Default for ClientSecurityConfig {
    fn default() -> Self {
        Self::new("kafka-client")
    }
}
