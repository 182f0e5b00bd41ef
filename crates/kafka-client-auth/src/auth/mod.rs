//! Authentication dispatch.
//!
//! Translates the declarative [`AuthenticationConfig`] into imperative
//! mutations of a [`ClientSecurityConfig`]: enabling SASL with the right
//! mechanism and helpers, installing a TLS context, and wiring Kerberos
//! parameters.
//!
//! Blocks are applied in a fixed order: plaintext, TLS, SASL, Kerberos.
//! Every present block is applied; nothing checks that the combination
//! makes sense. A later block may overwrite fields an earlier one set,
//! and a failing block leaves the mutations of earlier blocks in place.

pub mod msk;
pub mod scram;

use std::sync::Arc;

use tracing::debug;

use crate::client::{
    ClientSecurityConfig, GssapiAuthType, HandshakeVersion, WireMechanism,
};
use crate::config::{
    AuthenticationConfig, KerberosConfig, PlainTextConfig, SaslConfig, SaslMechanism, TlsConfig,
};
use crate::error::{AuthError, Result};
use crate::tls;

use msk::{iam_client_factory, MskBearerTokenProvider, MskPayloadSigner, MskTokenSigner};
use scram::{scram_client_factory, ScramSha256, ScramSha512};

/// Applies an [`AuthenticationConfig`] to a [`ClientSecurityConfig`].
///
/// The AWS MSK mechanisms need externally supplied signers; install them
/// with the builder methods before calling [`configure`](Self::configure).
/// Configurations that never select an AWS mechanism work without any
/// signer, including through [`configure_authentication`].
#[derive(Default)]
pub struct AuthenticationDispatcher {
    msk_payload_signer: Option<Arc<dyn MskPayloadSigner>>,
    msk_token_signer: Option<Arc<dyn MskTokenSigner>>,
}

impl AuthenticationDispatcher {
    /// Create a dispatcher without AWS signers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the signer backing the `AWS_MSK_IAM` mechanism.
    #[must_use]
    pub fn with_msk_payload_signer(mut self, signer: Arc<dyn MskPayloadSigner>) -> Self {
        self.msk_payload_signer = Some(signer);
        self
    }

    /// Install the signer backing the `AWS_MSK_IAM_OAUTHBEARER` mechanism.
    #[must_use]
    pub fn with_msk_token_signer(mut self, signer: Arc<dyn MskTokenSigner>) -> Self {
        self.msk_token_signer = Some(signer);
        self
    }

    /// Apply every present configuration block to the target.
    ///
    /// Fails fast on the first block that errors; earlier blocks' mutations
    /// are not rolled back.
    ///
    /// # Errors
    ///
    /// Returns the first validation, TLS loading, or signer availability
    /// error encountered.
    pub fn configure(
        &self,
        config: &AuthenticationConfig,
        target: &mut ClientSecurityConfig,
    ) -> Result<()> {
        if let Some(plain_text) = &config.plain_text {
            configure_plaintext(plain_text, target);
        }
        if let Some(tls) = &config.tls {
            configure_tls(tls, target)?;
        }
        if let Some(sasl) = &config.sasl {
            self.configure_sasl(sasl, target)?;
        }
        if let Some(kerberos) = &config.kerberos {
            configure_kerberos(kerberos, target);
        }
        Ok(())
    }

    fn configure_sasl(&self, config: &SaslConfig, target: &mut ClientSecurityConfig) -> Result<()> {
        let username = config.username();
        let password = config.password();

        if config.mechanism.requires_credentials() {
            if username.is_empty() {
                return Err(AuthError::MissingCredential {
                    field: "username",
                    mechanism: config.mechanism.name().to_string(),
                });
            }
            if password.is_empty() {
                return Err(AuthError::MissingCredential {
                    field: "password",
                    mechanism: config.mechanism.name().to_string(),
                });
            }
        }

        // Validated before any mutation so a bad version leaves the target
        // untouched.
        let version = HandshakeVersion::from_raw(config.version)?;

        debug!(
            mechanism = config.mechanism.name(),
            version = version.as_i16(),
            "configuring SASL authentication"
        );

        target.sasl.enabled = true;
        target.sasl.username = username;
        target.sasl.password = password;
        target.sasl.handshake_version = version;

        match &config.mechanism {
            SaslMechanism::Plain => {
                target.sasl.mechanism = Some(WireMechanism::Plain);
            }
            SaslMechanism::ScramSha256 => {
                target.sasl.mechanism = Some(WireMechanism::ScramSha256);
                target.sasl.client_factory = Some(scram_client_factory::<ScramSha256>());
            }
            SaslMechanism::ScramSha512 => {
                target.sasl.mechanism = Some(WireMechanism::ScramSha512);
                target.sasl.client_factory = Some(scram_client_factory::<ScramSha512>());
            }
            SaslMechanism::AwsMskIam { aws_msk } => {
                let signer = self.msk_payload_signer.clone().ok_or(
                    AuthError::SignerUnavailable {
                        mechanism: "AWS_MSK_IAM",
                    },
                )?;
                target.sasl.mechanism = Some(WireMechanism::AwsMskIam);
                target.sasl.client_factory = Some(iam_client_factory(
                    signer,
                    aws_msk.broker_addr.clone(),
                    aws_msk.region.clone(),
                    target.client_id.clone(),
                ));
            }
            SaslMechanism::AwsMskIamOauthBearer { aws_msk } => {
                let signer = self.msk_token_signer.clone().ok_or(
                    AuthError::SignerUnavailable {
                        mechanism: "AWS_MSK_IAM_OAUTHBEARER",
                    },
                )?;
                target.sasl.mechanism = Some(WireMechanism::OAuthBearer);
                target.sasl.token_provider = Some(Arc::new(MskBearerTokenProvider::new(
                    aws_msk.region.clone(),
                    signer,
                )));
                // Bearer tokens must never travel in the clear. TLS is
                // forced on with the default context, overwriting any
                // context an earlier block installed.
                target.tls.enabled = true;
                target.tls.context = Some(tls::default_tls_context()?);
            }
        }

        Ok(())
    }
}

/// Apply an [`AuthenticationConfig`] that never needs AWS signers.
///
/// Equivalent to configuring through a signer-less
/// [`AuthenticationDispatcher`]; selecting an AWS mechanism through this
/// entry point fails with [`AuthError::SignerUnavailable`].
///
/// # Errors
///
/// Returns the first validation or TLS loading error encountered.
pub fn configure_authentication(
    config: &AuthenticationConfig,
    target: &mut ClientSecurityConfig,
) -> Result<()> {
    AuthenticationDispatcher::new().configure(config, target)
}

/// Enable SASL/PLAIN with the configured credentials.
///
/// Credentials are installed as given; empty values are accepted and left
/// for the broker to reject.
fn configure_plaintext(config: &PlainTextConfig, target: &mut ClientSecurityConfig) {
    debug!("configuring plaintext authentication");
    target.sasl.enabled = true;
    target.sasl.mechanism = Some(WireMechanism::Plain);
    target.sasl.username = config.username();
    target.sasl.password = config.password();
}

/// Load the TLS context from disk and enable TLS.
fn configure_tls(config: &TlsConfig, target: &mut ClientSecurityConfig) -> Result<()> {
    debug!("configuring TLS");
    let context = tls::load_tls_config(config)?;
    target.tls.enabled = true;
    target.tls.context = Some(context);
    Ok(())
}

/// Enable GSSAPI and install the Kerberos parameters.
///
/// The keytab path and the password are mutually exclusive by construction:
/// only the field matching the acquisition method is written.
fn configure_kerberos(config: &KerberosConfig, target: &mut ClientSecurityConfig) {
    debug!(
        service_name = %config.service_name,
        use_keytab = config.use_keytab,
        "configuring Kerberos authentication"
    );
    target.sasl.enabled = true;
    target.sasl.mechanism = Some(WireMechanism::Gssapi);

    let gssapi = &mut target.sasl.gssapi;
    if config.use_keytab {
        gssapi.auth_type = Some(GssapiAuthType::Keytab);
        gssapi.keytab_path = config.keytab_path.clone();
    } else {
        gssapi.auth_type = Some(GssapiAuthType::UserPassword);
        gssapi.password = config.password.clone();
    }
    gssapi.username = config.username.clone();
    gssapi.realm = config.realm.clone();
    gssapi.service_name = config.service_name.clone();
    gssapi.config_path = config.config_path.clone();
    gssapi.disable_fast_negotiation = config.disable_fast_negotiation;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SaslClient;
    use crate::config::AwsMskConfig;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct StubPayloadSigner;

    impl MskPayloadSigner for StubPayloadSigner {
        fn sign(&self, broker_addr: &str, region: &str, client_id: &str) -> Result<String> {
            Ok(format!("signed:{broker_addr}:{region}:{client_id}"))
        }
    }

    struct StubTokenSigner;

    #[async_trait]
    impl MskTokenSigner for StubTokenSigner {
        async fn generate_auth_token(&self, region: &str) -> Result<(String, i64)> {
            Ok((format!("token:{region}"), 0))
        }
    }

    fn sasl_config(mechanism: SaslMechanism) -> SaslConfig {
        SaslConfig {
            username: "jdoe".to_string(),
            password: "pass".to_string(),
            mechanism,
            version: 0,
        }
    }

    #[test]
    fn test_empty_config_is_noop() {
        let mut target = ClientSecurityConfig::default();
        configure_authentication(&AuthenticationConfig::default(), &mut target).unwrap();
        assert!(!target.sasl.enabled);
        assert!(!target.tls.enabled);
        assert!(target.sasl.mechanism.is_none());
    }

    #[test]
    fn test_plaintext_enables_sasl_plain() {
        let config = AuthenticationConfig {
            plain_text: Some(PlainTextConfig {
                username: "jdoe".to_string(),
                password: "pass".to_string(),
            }),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        configure_authentication(&config, &mut target).unwrap();

        assert!(target.sasl.enabled);
        assert_eq!(target.sasl.mechanism, Some(WireMechanism::Plain));
        assert_eq!(target.sasl.username, "jdoe");
        assert_eq!(target.sasl.password, "pass");
        assert!(target.sasl.client_factory.is_none());
        assert!(!target.tls.enabled);
    }

    #[test]
    fn test_plaintext_accepts_empty_credentials() {
        let config = AuthenticationConfig {
            plain_text: Some(PlainTextConfig::default()),
            ..Default::default()
        };
        let mut target = ClientSecurityConfig::default();
        configure_authentication(&config, &mut target).unwrap();
        assert!(target.sasl.enabled);
        assert_eq!(target.sasl.username, "");
    }

    #[test]
    fn test_sasl_scram_installs_factory() {
        for (mechanism, wire) in [
            (SaslMechanism::ScramSha256, WireMechanism::ScramSha256),
            (SaslMechanism::ScramSha512, WireMechanism::ScramSha512),
        ] {
            let config = AuthenticationConfig {
                sasl: Some(sasl_config(mechanism)),
                ..Default::default()
            };
            let mut target = ClientSecurityConfig::default();
            configure_authentication(&config, &mut target).unwrap();

            assert!(target.sasl.enabled);
            assert_eq!(target.sasl.mechanism, Some(wire));
            let factory = target.sasl.client_factory.expect("factory installed");
            let mut client = factory();
            client.begin("jdoe", "pass", "").unwrap();
            assert!(!client.done());
        }
    }

    #[test]
    fn test_sasl_missing_username_rejected() {
        let mut config = sasl_config(SaslMechanism::ScramSha256);
        config.username = String::new();
        let config = AuthenticationConfig {
            sasl: Some(config),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        let err = configure_authentication(&config, &mut target).unwrap_err();
        match err {
            AuthError::MissingCredential { field, mechanism } => {
                assert_eq!(field, "username");
                assert_eq!(mechanism, "SCRAM-SHA-256");
            }
            other => panic!("expected MissingCredential, got {other:?}"),
        }
        assert!(!target.sasl.enabled);
    }

    #[test]
    fn test_sasl_missing_password_rejected() {
        let mut config = sasl_config(SaslMechanism::Plain);
        config.password = String::new();
        let config = AuthenticationConfig {
            sasl: Some(config),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        let err = configure_authentication(&config, &mut target).unwrap_err();
        assert!(matches!(
            err,
            AuthError::MissingCredential { field: "password", .. }
        ));
        assert!(!target.sasl.enabled);
    }

    #[test]
    fn test_sasl_invalid_version_leaves_target_untouched() {
        let mut config = sasl_config(SaslMechanism::Plain);
        config.version = 2;
        let config = AuthenticationConfig {
            sasl: Some(config),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        let err = configure_authentication(&config, &mut target).unwrap_err();
        assert!(matches!(
            err,
            AuthError::InvalidEnumValue { field: "version", .. }
        ));
        assert!(!target.sasl.enabled);
        assert!(target.sasl.mechanism.is_none());
        assert!(target.sasl.username.is_empty());
    }

    #[test]
    fn test_sasl_version_one_applied() {
        let mut config = sasl_config(SaslMechanism::Plain);
        config.version = 1;
        let config = AuthenticationConfig {
            sasl: Some(config),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        configure_authentication(&config, &mut target).unwrap();
        assert_eq!(target.sasl.handshake_version, HandshakeVersion::V1);
    }

    #[test]
    fn test_aws_msk_iam_requires_signer() {
        let config = AuthenticationConfig {
            sasl: Some(sasl_config(SaslMechanism::AwsMskIam {
                aws_msk: AwsMskConfig::default(),
            })),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        let err = configure_authentication(&config, &mut target).unwrap_err();
        assert!(matches!(
            err,
            AuthError::SignerUnavailable { mechanism: "AWS_MSK_IAM" }
        ));
    }

    #[test]
    fn test_aws_msk_iam_with_signer() {
        let config = AuthenticationConfig {
            sasl: Some(sasl_config(SaslMechanism::AwsMskIam {
                aws_msk: AwsMskConfig {
                    region: "us-east-1".to_string(),
                    broker_addr: "b-1.msk:9098".to_string(),
                },
            })),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::new("my-client");
        AuthenticationDispatcher::new()
            .with_msk_payload_signer(Arc::new(StubPayloadSigner))
            .configure(&config, &mut target)
            .unwrap();

        assert_eq!(target.sasl.mechanism, Some(WireMechanism::AwsMskIam));
        let factory = target.sasl.client_factory.expect("factory installed");
        let mut client = factory();
        client.begin("", "", "").unwrap();
        let payload = client.step(b"").unwrap();
        assert_eq!(payload, b"signed:b-1.msk:9098:us-east-1:my-client");
    }

    #[test]
    fn test_oauthbearer_requires_signer() {
        let config = AuthenticationConfig {
            sasl: Some(sasl_config(SaslMechanism::AwsMskIamOauthBearer {
                aws_msk: AwsMskConfig::default(),
            })),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        let err = configure_authentication(&config, &mut target).unwrap_err();
        assert!(matches!(
            err,
            AuthError::SignerUnavailable {
                mechanism: "AWS_MSK_IAM_OAUTHBEARER"
            }
        ));
    }

    #[test]
    fn test_oauthbearer_forces_tls() {
        let mut config = sasl_config(SaslMechanism::AwsMskIamOauthBearer {
            aws_msk: AwsMskConfig {
                region: "us-east-1".to_string(),
                broker_addr: String::new(),
            },
        });
        // Credentials are not required for the token mechanism
        config.username = String::new();
        config.password = String::new();
        let config = AuthenticationConfig {
            sasl: Some(config),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        AuthenticationDispatcher::new()
            .with_msk_token_signer(Arc::new(StubTokenSigner))
            .configure(&config, &mut target)
            .unwrap();

        assert!(target.sasl.enabled);
        assert_eq!(target.sasl.mechanism, Some(WireMechanism::OAuthBearer));
        assert!(target.sasl.token_provider.is_some());
        assert!(target.tls.enabled);
        assert!(target.tls.context.is_some());
    }

    #[test]
    fn test_kerberos_keytab_installation() {
        let config = AuthenticationConfig {
            kerberos: Some(KerberosConfig {
                service_name: "kafka".to_string(),
                realm: "EXAMPLE.COM".to_string(),
                use_keytab: true,
                username: "client".to_string(),
                password: "ignored".to_string(),
                config_path: PathBuf::from("/etc/krb5.conf"),
                keytab_path: PathBuf::from("/etc/security/kafka.keytab"),
                disable_fast_negotiation: true,
            }),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        configure_authentication(&config, &mut target).unwrap();

        assert!(target.sasl.enabled);
        assert_eq!(target.sasl.mechanism, Some(WireMechanism::Gssapi));
        let gssapi = &target.sasl.gssapi;
        assert_eq!(gssapi.auth_type, Some(GssapiAuthType::Keytab));
        assert_eq!(gssapi.keytab_path, PathBuf::from("/etc/security/kafka.keytab"));
        assert!(gssapi.password.is_empty());
        assert_eq!(gssapi.realm, "EXAMPLE.COM");
        assert_eq!(gssapi.service_name, "kafka");
        assert!(gssapi.disable_fast_negotiation);
    }

    #[test]
    fn test_kerberos_password_installation() {
        let config = AuthenticationConfig {
            kerberos: Some(KerberosConfig {
                service_name: "kafka".to_string(),
                realm: "EXAMPLE.COM".to_string(),
                use_keytab: false,
                username: "client".to_string(),
                password: "secret".to_string(),
                config_path: PathBuf::from("/etc/krb5.conf"),
                keytab_path: PathBuf::from("/ignored.keytab"),
                disable_fast_negotiation: false,
            }),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        configure_authentication(&config, &mut target).unwrap();

        let gssapi = &target.sasl.gssapi;
        assert_eq!(gssapi.auth_type, Some(GssapiAuthType::UserPassword));
        assert_eq!(gssapi.password, "secret");
        assert_eq!(gssapi.keytab_path, PathBuf::new());
    }

    #[test]
    fn test_tls_load_failure_fails_fast_without_rollback() {
        let config = AuthenticationConfig {
            plain_text: Some(PlainTextConfig {
                username: "jdoe".to_string(),
                password: "pass".to_string(),
            }),
            tls: Some(TlsConfig {
                ca_cert_path: Some(PathBuf::from("/nonexistent/ca.pem")),
                cert_path: None,
                key_path: None,
            }),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        let err = configure_authentication(&config, &mut target).unwrap_err();
        assert!(matches!(err, AuthError::TlsConfigLoad(_)));

        // The plaintext block ran before the failing TLS block and its
        // mutations remain in place.
        assert!(target.sasl.enabled);
        assert_eq!(target.sasl.username, "jdoe");
        assert!(!target.tls.enabled);
    }

    #[test]
    fn test_later_block_overwrites_earlier() {
        let config = AuthenticationConfig {
            plain_text: Some(PlainTextConfig {
                username: "plain-user".to_string(),
                password: "plain-pass".to_string(),
            }),
            sasl: Some(SaslConfig {
                username: "scram-user".to_string(),
                password: "scram-pass".to_string(),
                mechanism: SaslMechanism::ScramSha256,
                version: 0,
            }),
            ..Default::default()
        };

        let mut target = ClientSecurityConfig::default();
        configure_authentication(&config, &mut target).unwrap();

        // Last writer wins on the shared fields.
        assert_eq!(target.sasl.username, "scram-user");
        assert_eq!(target.sasl.mechanism, Some(WireMechanism::ScramSha256));
        assert!(target.sasl.client_factory.is_some());
    }
}
