//! Client-side SASL/SCRAM authentication.
//!
//! SCRAM (Salted Challenge Response Authentication Mechanism) provides
//! secure password-based authentication without transmitting the password
//! in cleartext.
//!
//! Supports:
//! - SCRAM-SHA-256 (RFC 7677)
//! - SCRAM-SHA-512 (RFC 7677 variant)
//!
//! The [`ScramClient`] drives the client half of the three-message exchange:
//! client-first, client-final derived from the server's salt and nonce, and
//! verification of the server-final signature.

use std::marker::PhantomData;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;

use crate::client::{SaslClient, SaslClientFactory};
use crate::error::{AuthError, Result};

/// Client nonce length in bytes before base64 encoding.
pub const NONCE_LENGTH: usize = 24;

/// Hash algorithm trait for SCRAM variants.
pub trait ScramHash: Send + Sync + 'static {
    /// The mechanism name.
    fn name() -> &'static str;
    /// Output length in bytes.
    fn output_len() -> usize;
    /// Compute HMAC.
    fn hmac(key: &[u8], data: &[u8]) -> Vec<u8>;
    /// Compute hash.
    fn hash(data: &[u8]) -> Vec<u8>;
    /// Derive key using PBKDF2.
    fn pbkdf2(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8>;
}

/// SHA-256 implementation for SCRAM.
#[derive(Debug)]
pub struct ScramSha256;

impl ScramHash for ScramSha256 {
    fn name() -> &'static str {
        "SCRAM-SHA-256"
    }

    fn output_len() -> usize {
        32
    }

    fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    fn hash(data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }

    fn pbkdf2(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
        let mut output = vec![0u8; 32];
        pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut output);
        output
    }
}

/// SHA-512 implementation for SCRAM.
#[derive(Debug)]
pub struct ScramSha512;

impl ScramHash for ScramSha512 {
    fn name() -> &'static str {
        "SCRAM-SHA-512"
    }

    fn output_len() -> usize {
        64
    }

    fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    fn hash(data: &[u8]) -> Vec<u8> {
        Sha512::digest(data).to_vec()
    }

    fn pbkdf2(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
        let mut output = vec![0u8; 64];
        pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut output);
        output
    }
}

/// Escape a username for the SCRAM saslname production (RFC 5802):
/// `=` becomes `=3D` and `,` becomes `=2C`.
fn sasl_name_escape(name: &str) -> String {
    name.replace('=', "=3D").replace(',', "=2C")
}

/// Parse server-first-message into (combined nonce, salt, iterations).
///
/// Format: `r=<combined-nonce>,s=<base64-salt>,i=<iterations>`
fn parse_server_first_message(message: &str) -> Result<(String, Vec<u8>, u32)> {
    let mut combined_nonce = None;
    let mut salt = None;
    let mut iterations = None;

    for part in message.split(',') {
        if let Some(value) = part.strip_prefix("r=") {
            combined_nonce = Some(value.to_string());
        } else if let Some(value) = part.strip_prefix("s=") {
            salt = Some(
                BASE64
                    .decode(value)
                    .map_err(|e| AuthError::InvalidMessage(format!("invalid base64 salt: {e}")))?,
            );
        } else if let Some(value) = part.strip_prefix("i=") {
            iterations = Some(value.parse::<u32>().map_err(|e| {
                AuthError::InvalidMessage(format!("invalid iteration count: {e}"))
            })?);
        }
    }

    Ok((
        combined_nonce
            .ok_or_else(|| AuthError::InvalidMessage("missing nonce (r=)".to_string()))?,
        salt.ok_or_else(|| AuthError::InvalidMessage("missing salt (s=)".to_string()))?,
        iterations
            .ok_or_else(|| AuthError::InvalidMessage("missing iterations (i=)".to_string()))?,
    ))
}

/// State of the client-side SCRAM exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScramState {
    New,
    Ready,
    AwaitingServerFirst,
    AwaitingServerFinal,
    Done,
}

/// Client-side SCRAM exchange bound to a hash family.
///
/// One instance per connection attempt; the nonce is generated at
/// [`begin`](SaslClient::begin) and never reused.
pub struct ScramClient<H: ScramHash> {
    username: String,
    password: String,
    gs2_header: String,
    client_nonce: String,
    client_first_bare: String,
    expected_server_signature: Vec<u8>,
    state: ScramState,
    _marker: PhantomData<H>,
}

impl<H: ScramHash> Default for ScramClient<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ScramHash> ScramClient<H> {
    /// Create an unprepared SCRAM client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            gs2_header: String::new(),
            client_nonce: String::new(),
            client_first_bare: String::new(),
            expected_server_signature: Vec::new(),
            state: ScramState::New,
            _marker: PhantomData,
        }
    }

    fn generate_nonce() -> String {
        let random_bytes: [u8; NONCE_LENGTH] = rand::thread_rng().gen();
        BASE64.encode(random_bytes)
    }

    fn handle_server_first(&mut self, message: &str) -> Result<Vec<u8>> {
        let (combined_nonce, salt, iterations) = parse_server_first_message(message)?;

        if !combined_nonce.starts_with(&self.client_nonce) {
            return Err(AuthError::InvalidMessage(
                "server nonce does not start with client nonce".to_string(),
            ));
        }
        if iterations == 0 {
            return Err(AuthError::InvalidMessage(
                "iteration count must be positive".to_string(),
            ));
        }

        // SaltedPassword = PBKDF2(password, salt, iterations)
        let salted_password = H::pbkdf2(self.password.as_bytes(), &salt, iterations);

        // ClientKey = HMAC(SaltedPassword, "Client Key")
        let client_key = H::hmac(&salted_password, b"Client Key");

        // StoredKey = H(ClientKey)
        let stored_key = H::hash(&client_key);

        // ServerKey = HMAC(SaltedPassword, "Server Key")
        let server_key = H::hmac(&salted_password, b"Server Key");

        let client_final_without_proof = format!(
            "c={},r={}",
            BASE64.encode(self.gs2_header.as_bytes()),
            combined_nonce
        );

        // AuthMessage = client-first-bare "," server-first "," client-final-without-proof
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare, message, client_final_without_proof
        );

        // ClientSignature = HMAC(StoredKey, AuthMessage)
        let client_signature = H::hmac(&stored_key, auth_message.as_bytes());

        // ClientProof = ClientKey XOR ClientSignature
        let client_proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(a, b)| a ^ b)
            .collect();

        // ServerSignature = HMAC(ServerKey, AuthMessage), checked on server-final
        self.expected_server_signature = H::hmac(&server_key, auth_message.as_bytes());

        let client_final = format!(
            "{},p={}",
            client_final_without_proof,
            BASE64.encode(&client_proof)
        );

        debug!(mechanism = H::name(), "sending client-final-message");
        Ok(client_final.into_bytes())
    }

    fn handle_server_final(&mut self, message: &str) -> Result<Vec<u8>> {
        if let Some(error) = message.strip_prefix("e=") {
            return Err(AuthError::AuthenticationRejected(error.to_string()));
        }

        let verifier = message.strip_prefix("v=").ok_or_else(|| {
            AuthError::InvalidMessage("server-final-message missing verifier".to_string())
        })?;

        let signature = BASE64.decode(verifier).map_err(|e| {
            AuthError::InvalidMessage(format!("invalid base64 server signature: {e}"))
        })?;

        if signature != self.expected_server_signature {
            return Err(AuthError::AuthenticationRejected(
                "server signature verification failed".to_string(),
            ));
        }

        debug!(mechanism = H::name(), "SCRAM exchange complete");
        self.state = ScramState::Done;
        Ok(Vec::new())
    }
}

impl<H: ScramHash> SaslClient for ScramClient<H> {
    fn begin(&mut self, username: &str, password: &str, authz_id: &str) -> Result<()> {
        self.username = sasl_name_escape(username);
        self.password = password.to_string();
        self.gs2_header = if authz_id.is_empty() {
            "n,,".to_string()
        } else {
            format!("n,a={},", sasl_name_escape(authz_id))
        };
        self.client_nonce = Self::generate_nonce();
        self.expected_server_signature.clear();
        self.state = ScramState::Ready;
        Ok(())
    }

    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        match self.state {
            ScramState::Ready => {
                self.client_first_bare =
                    format!("n={},r={}", self.username, self.client_nonce);
                let client_first = format!("{}{}", self.gs2_header, self.client_first_bare);
                self.state = ScramState::AwaitingServerFirst;
                debug!(mechanism = H::name(), "sending client-first-message");
                Ok(client_first.into_bytes())
            }
            ScramState::AwaitingServerFirst => {
                let message = std::str::from_utf8(challenge).map_err(|_| {
                    AuthError::InvalidMessage("invalid UTF-8 in server-first-message".to_string())
                })?;
                let response = self.handle_server_first(message)?;
                self.state = ScramState::AwaitingServerFinal;
                Ok(response)
            }
            ScramState::AwaitingServerFinal => {
                let message = std::str::from_utf8(challenge).map_err(|_| {
                    AuthError::InvalidMessage("invalid UTF-8 in server-final-message".to_string())
                })?;
                self.handle_server_final(message)
            }
            ScramState::New => Err(AuthError::InvalidMessage(
                "SCRAM step called before begin".to_string(),
            )),
            ScramState::Done => Err(AuthError::InvalidMessage(
                "SCRAM exchange already complete".to_string(),
            )),
        }
    }

    fn done(&self) -> bool {
        self.state == ScramState::Done
    }
}

/// Build a factory producing one fresh [`ScramClient`] per connection
/// attempt, bound to the given hash family.
#[must_use]
pub fn scram_client_factory<H: ScramHash>() -> SaslClientFactory {
    Arc::new(|| Box::new(ScramClient::<H>::new()))
}
