//! Domain error types for authentication configuration.
//!
//! Uses `thiserror` for ergonomic error definitions with proper context.

use thiserror::Error;

/// Errors produced while configuring or performing client authentication.
#[derive(Error, Debug)]
pub enum AuthError {
    /// A credential required by the selected SASL mechanism is absent.
    #[error("SASL {field} must be provided for mechanism {mechanism}")]
    MissingCredential {
        field: &'static str,
        mechanism: String,
    },

    /// A configuration value falls outside its closed set of allowed values.
    #[error("invalid {field} {value:?}: must be one of {allowed}")]
    InvalidEnumValue {
        field: &'static str,
        value: String,
        allowed: &'static str,
    },

    /// The TLS context loader failed.
    #[error("failed to load TLS configuration: {0}")]
    TlsConfigLoad(#[from] TlsError),

    /// The peer rejected the authentication exchange.
    #[error("authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// An AWS mechanism was selected but no signer was injected.
    #[error("SASL mechanism {mechanism} requires an injected signer")]
    SignerUnavailable { mechanism: &'static str },

    /// The external credential signer failed; passed through unchanged.
    #[error("credential signing failed: {0}")]
    Signing(String),

    /// The caller-supplied cancellation token fired before signing completed.
    #[error("token request canceled")]
    Canceled,

    /// A SASL exchange message could not be parsed.
    #[error("invalid SASL message: {0}")]
    InvalidMessage(String),
}

/// Errors related to TLS context construction.
#[derive(Error, Debug)]
pub enum TlsError {
    /// Invalid TLS configuration.
    #[error("TLS configuration error: {0}")]
    Config(String),

    /// Failed to load a certificate file.
    #[error("failed to load certificate from '{path}': {message}")]
    CertificateLoad { path: String, message: String },

    /// Failed to load a private key file.
    #[error("failed to load private key from '{path}': {message}")]
    PrivateKeyLoad { path: String, message: String },

    /// No certificates found in the file.
    #[error("no certificates found in '{0}'")]
    NoCertificates(String),

    /// No private keys found in the file.
    #[error("no private keys found in '{0}'")]
    NoPrivateKeys(String),
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Result type alias for TLS operations.
pub type TlsResult<T> = std::result::Result<T, TlsError>;
