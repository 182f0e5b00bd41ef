//! Kafka Client Authentication Library
//!
//! This library translates declarative authentication configuration into the
//! imperative security settings of a Kafka broker client: SASL mechanism
//! selection and credentials, per-connection SASL exchange clients, bearer
//! token providers, TLS contexts, and Kerberos parameters.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Declarative authentication configuration
//! - [`client`] - The client security state the dispatcher mutates
//! - [`auth`] - The dispatcher and the SASL mechanism implementations
//! - [`tls`] - TLS context loading
//! - [`error`] - Domain-specific error types
//!
//! # Example
//!
//! ```rust,ignore
//! use kafka_client_auth::{configure_authentication, AuthenticationConfig, ClientSecurityConfig};
//!
//! let config: AuthenticationConfig = serde_yaml::from_str(yaml)?;
//! let mut security = ClientSecurityConfig::new("my-client");
//! configure_authentication(&config, &mut security)?;
//! ```

#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod tls;

// Re-export commonly used types
pub use auth::msk::{MskBearerTokenProvider, MskPayloadSigner, MskTokenSigner};
pub use auth::scram::{ScramClient, ScramSha256, ScramSha512};
pub use auth::{configure_authentication, AuthenticationDispatcher};
pub use client::{
    AccessToken, ClientSecurityConfig, GssapiAuthType, HandshakeVersion, SaslClient,
    SaslClientFactory, TokenProvider, WireMechanism,
};
pub use config::{
    AuthenticationConfig, AwsMskConfig, KerberosConfig, PlainTextConfig, SaslConfig,
    SaslMechanism, TlsConfig,
};
pub use error::{AuthError, Result, TlsError};
