//! Declarative authentication configuration for Kafka clients.
//!
//! The aggregate mirrors the broker client's security surface: an optional
//! plaintext block, an optional SASL block, an optional TLS block, and an
//! optional Kerberos block. More than one block may be present at once; the
//! dispatcher applies all present blocks in a fixed order without checking
//! mutual exclusivity.

use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Allowed SASL mechanism names, used in `InvalidEnumValue` messages.
pub const ALLOWED_MECHANISMS: &str =
    "PLAIN, SCRAM-SHA-256, SCRAM-SHA-512, AWS_MSK_IAM, AWS_MSK_IAM_OAUTHBEARER";

/// Root authentication configuration.
///
/// Each block is independently optional; "absent" means "not configured".
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthenticationConfig {
    /// Plaintext SASL credentials.
    #[serde(default)]
    pub plain_text: Option<PlainTextConfig>,

    /// SASL authentication with an explicit mechanism.
    #[serde(default)]
    pub sasl: Option<SaslConfig>,

    /// TLS settings for the client connection.
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// Kerberos/GSSAPI authentication.
    #[serde(default)]
    pub kerberos: Option<KerberosConfig>,
}

/// Plaintext username/password authentication.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlainTextConfig {
    /// Username for authentication.
    /// Supports environment variable expansion: "${KAFKA_USERNAME}"
    #[serde(default)]
    pub username: String,

    /// Password for authentication.
    /// Supports environment variable expansion: "${KAFKA_PASSWORD}"
    #[serde(default)]
    pub password: String,
}

impl PlainTextConfig {
    /// Get the username with environment variables expanded.
    #[must_use]
    pub fn username(&self) -> String {
        expand_env_vars(&self.username)
    }

    /// Get the password with environment variables expanded.
    #[must_use]
    pub fn password(&self) -> String {
        expand_env_vars(&self.password)
    }
}

/// SASL authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaslConfig {
    /// Username for authentication.
    /// Supports environment variable expansion: "${KAFKA_USERNAME}"
    #[serde(default)]
    pub username: String,

    /// Password for authentication.
    /// Supports environment variable expansion: "${KAFKA_PASSWORD}"
    #[serde(default)]
    pub password: String,

    /// SASL mechanism, tagged by the `mechanism` key.
    #[serde(flatten)]
    pub mechanism: SaslMechanism,

    /// SASL handshake protocol version, 0 or 1. Defaults to 0.
    #[serde(default)]
    pub version: i16,
}

impl SaslConfig {
    /// Get the username with environment variables expanded.
    #[must_use]
    pub fn username(&self) -> String {
        expand_env_vars(&self.username)
    }

    /// Get the password with environment variables expanded.
    #[must_use]
    pub fn password(&self) -> String {
        expand_env_vars(&self.password)
    }
}

/// SASL mechanism selection.
///
/// Modeled as a tagged variant so that each mechanism carries only the
/// fields it needs: the AWS MSK variants own their region/broker settings,
/// the password-based variants carry nothing beyond the tag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "mechanism")]
pub enum SaslMechanism {
    /// SASL/PLAIN - username/password in cleartext (use over TLS).
    #[serde(rename = "PLAIN")]
    Plain,

    /// SASL/SCRAM-SHA-256 - salted challenge-response (RFC 7677).
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,

    /// SASL/SCRAM-SHA-512 - salted challenge-response, SHA-512 variant.
    #[serde(rename = "SCRAM-SHA-512")]
    ScramSha512,

    /// AWS MSK IAM - signed credential payload sent during the SASL exchange.
    #[serde(rename = "AWS_MSK_IAM")]
    AwsMskIam {
        #[serde(default)]
        aws_msk: AwsMskConfig,
    },

    /// AWS MSK IAM over OAUTHBEARER - short-lived bearer tokens signed per
    /// connection attempt. Mandates TLS.
    #[serde(rename = "AWS_MSK_IAM_OAUTHBEARER")]
    AwsMskIamOauthBearer {
        #[serde(default)]
        aws_msk: AwsMskConfig,
    },
}

impl SaslMechanism {
    /// Construct a mechanism from its wire name.
    ///
    /// The mechanism set is a strict whitelist: any name outside it fails
    /// with `InvalidEnumValue` naming the allowed values.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidEnumValue`] for unknown names.
    pub fn from_name(name: &str, aws_msk: Option<AwsMskConfig>) -> Result<Self> {
        match name {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM-SHA-256" => Ok(Self::ScramSha256),
            "SCRAM-SHA-512" => Ok(Self::ScramSha512),
            "AWS_MSK_IAM" => Ok(Self::AwsMskIam {
                aws_msk: aws_msk.unwrap_or_default(),
            }),
            "AWS_MSK_IAM_OAUTHBEARER" => Ok(Self::AwsMskIamOauthBearer {
                aws_msk: aws_msk.unwrap_or_default(),
            }),
            other => Err(AuthError::InvalidEnumValue {
                field: "mechanism",
                value: other.to_string(),
                allowed: ALLOWED_MECHANISMS,
            }),
        }
    }

    /// Get the mechanism name as used in the SASL handshake.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
            Self::AwsMskIam { .. } => "AWS_MSK_IAM",
            Self::AwsMskIamOauthBearer { .. } => "AWS_MSK_IAM_OAUTHBEARER",
        }
    }

    /// Check whether this mechanism requires a username and password.
    ///
    /// AWS_MSK_IAM_OAUTHBEARER obtains credentials dynamically from the
    /// signer and is the only mechanism exempt from the check.
    #[must_use]
    pub fn requires_credentials(&self) -> bool {
        !matches!(self, Self::AwsMskIamOauthBearer { .. })
    }
}

/// AWS MSK settings shared by the IAM mechanisms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AwsMskConfig {
    /// AWS region the MSK cluster is based in.
    #[serde(default)]
    pub region: String,

    /// Broker address the client connects to, used when signing.
    #[serde(default)]
    pub broker_addr: String,
}

/// Kerberos/GSSAPI authentication configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KerberosConfig {
    /// Kerberos service name of the broker.
    #[serde(default)]
    pub service_name: String,

    /// Kerberos realm.
    #[serde(default)]
    pub realm: String,

    /// Select keytab-based ticket acquisition instead of password-based.
    #[serde(default)]
    pub use_keytab: bool,

    /// Client principal username.
    #[serde(default)]
    pub username: String,

    /// Password, authoritative only when `use_keytab` is false.
    #[serde(default)]
    pub password: String,

    /// Path to krb5.conf.
    #[serde(default, rename = "config_file")]
    pub config_path: PathBuf,

    /// Path to the keytab file, authoritative only when `use_keytab` is true.
    #[serde(default, rename = "keytab_file")]
    pub keytab_path: PathBuf,

    /// Disable the FAST negotiation extension.
    #[serde(default)]
    pub disable_fast_negotiation: bool,
}

/// TLS settings for the client connection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to CA certificate file (PEM format) for verifying broker
    /// certificates. If not set, uses the webpki root certificates.
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,

    /// Path to client certificate file (PEM format) for mTLS.
    #[serde(default)]
    pub cert_path: Option<PathBuf>,

    /// Path to client private key file (PEM format) for mTLS.
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

/// Expand environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable
/// `VAR_NAME`. If the variable is not set, replaces with an empty string.
fn expand_env_vars(s: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex");
    re.replace_all(s, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .to_string()
}
