//! KuCoin request authentication.
//!
//! Every private endpoint expects five headers:
//! - `KC-API-KEY`: the API key
//! - `KC-API-SIGN`: base64(HMAC-SHA256(secret, timestamp + METHOD + path + body))
//! - `KC-API-TIMESTAMP`: milliseconds since the Unix epoch
//! - `KC-API-PASSPHRASE`: raw, or HMAC-digested for key version 2
//! - `KC-API-KEY-VERSION`: the key version the passphrase was encoded for

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::error::ConfigError;

type HmacSha256 = Hmac<Sha256>;

/// API key version, selecting how the passphrase is transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyVersion {
    V1,
    #[default]
    V2,
    V3,
}

impl KeyVersion {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim() {
            "1" => Ok(Self::V1),
            "2" => Ok(Self::V2),
            "3" => Ok(Self::V3),
            other => Err(ConfigError::UnsupportedKeyVersion(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V2 => "2",
            Self::V3 => "3",
        }
    }

    /// Only version 2 sends the passphrase as an HMAC digest.
    pub fn digests_passphrase(&self) -> bool {
        matches!(self, Self::V2)
    }
}

/// Exchange API credentials. Loaded once and never mutated.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: SecretString,
    passphrase: SecretString,
    key_version: KeyVersion,
}

impl Credentials {
    /// Build credentials, rejecting any empty field.
    pub fn new(
        api_key: &str,
        api_secret: &str,
        passphrase: &str,
        key_version: KeyVersion,
    ) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("api key"));
        }
        if api_secret.trim().is_empty() {
            return Err(ConfigError::MissingCredential("api secret"));
        }
        if passphrase.trim().is_empty() {
            return Err(ConfigError::MissingCredential("api passphrase"));
        }
        if HeaderValue::from_str(api_key).is_err() {
            return Err(ConfigError::InvalidCredential("api key"));
        }
        // Sent verbatim under key versions 1 and 3.
        if HeaderValue::from_str(passphrase).is_err() {
            return Err(ConfigError::InvalidCredential("api passphrase"));
        }

        Ok(Self {
            api_key: api_key.to_string(),
            api_secret: SecretString::from(api_secret.to_string()),
            passphrase: SecretString::from(passphrase.to_string()),
            key_version,
        })
    }

    /// Create from environment variables:
    /// - KUCOIN_API_KEY
    /// - KUCOIN_API_SECRET
    /// - KUCOIN_API_PASSPHRASE
    /// - KUCOIN_API_KEY_VERSION (defaults to 2)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = required_env("KUCOIN_API_KEY")?;
        let api_secret = required_env("KUCOIN_API_SECRET")?;
        let passphrase = required_env("KUCOIN_API_PASSPHRASE")?;
        let key_version = match std::env::var("KUCOIN_API_KEY_VERSION") {
            Ok(v) => KeyVersion::parse(&v)?,
            Err(_) => KeyVersion::default(),
        };

        Self::new(&api_key, &api_secret, &passphrase, key_version)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn key_version(&self) -> KeyVersion {
        self.key_version
    }

    /// Sign a request with this key's secret.
    pub fn sign_request(
        &self,
        timestamp: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> SignedRequest {
        let secret = self.api_secret.expose_secret();
        SignedRequest {
            method: method.to_uppercase(),
            path: path.to_string(),
            body: body.to_string(),
            timestamp: timestamp.to_string(),
            signature: sign(timestamp, method, path, body, secret),
            passphrase: encode_passphrase(
                self.passphrase.expose_secret(),
                secret,
                self.key_version,
            ),
        }
    }
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingCredential(name))
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .field("key_version", &self.key_version)
            .finish()
    }
}

/// Request metadata together with its authentication values.
#[derive(Clone)]
pub struct SignedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
    pub timestamp: String,
    pub signature: String,
    /// Value of KC-API-PASSPHRASE (digest or raw, by key version)
    pub passphrase: String,
}

impl fmt::Debug for SignedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body)
            .field("timestamp", &self.timestamp)
            .field("signature", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// base64(HMAC-SHA256(key, message))
fn hmac_base64(message: &str, key: &str) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 takes keys of any size"));
    mac.update(message.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Compute `KC-API-SIGN` over `timestamp + METHOD + path + body`.
pub fn sign(timestamp: &str, method: &str, path: &str, body: &str, secret: &str) -> String {
    let prehash = format!("{}{}{}{}", timestamp, method.to_uppercase(), path, body);
    hmac_base64(&prehash, secret)
}

/// Compute `KC-API-PASSPHRASE` for the given key version.
pub fn encode_passphrase(passphrase: &str, secret: &str, version: KeyVersion) -> String {
    if version.digests_passphrase() {
        hmac_base64(passphrase, secret)
    } else {
        passphrase.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: &str = "1700000000000";

    #[test]
    fn test_sign_known_vector() {
        let sig = sign(TS, "POST", "/api/v1/orders", r#"{"symbol":"BTC-USDT"}"#, "secret");
        assert_eq!(sig, "lFpC/gtgtjF/LQopCwI/KBIXL6dSyHV9+6Bf50x3jbQ=");

        let sig = sign(TS, "get", "/api/v1/accounts", "", "secret");
        assert_eq!(sig, "ka2jGwVPj+HJ5t7L4fEM4HttekAXENIQpmo8ulfZmV8=");
    }

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign(TS, "POST", "/api/v1/orders", "{}", "secret");
        let b = sign(TS, "POST", "/api/v1/orders", "{}", "secret");
        assert_eq!(a, b);
    }

    #[test]
    fn test_sign_changes_with_every_input() {
        let base = sign(TS, "POST", "/api/v1/orders", "{}", "secret");
        let variants = [
            sign("1700000000001", "POST", "/api/v1/orders", "{}", "secret"),
            sign(TS, "GET", "/api/v1/orders", "{}", "secret"),
            sign(TS, "POST", "/api/v1/order", "{}", "secret"),
            sign(TS, "POST", "/api/v1/orders", "{ }", "secret"),
            sign(TS, "POST", "/api/v1/orders", "{}", "secret2"),
        ];
        for v in &variants {
            assert_ne!(&base, v);
        }
    }

    #[test]
    fn test_passphrase_encoding_by_version() {
        let v2 = encode_passphrase("my-passphrase", "secret", KeyVersion::V2);
        assert_ne!(v2, "my-passphrase");
        assert_eq!(v2, "O6EXY5PUKd+kAkiyvJZwGMP6HpyiCa3/t3FyTjSmvF8=");

        assert_eq!(encode_passphrase("my-passphrase", "secret", KeyVersion::V1), "my-passphrase");
        assert_eq!(encode_passphrase("my-passphrase", "secret", KeyVersion::V3), "my-passphrase");
    }

    #[test]
    fn test_missing_credentials_rejected() {
        assert_eq!(
            Credentials::new("", "s", "p", KeyVersion::V2).unwrap_err(),
            ConfigError::MissingCredential("api key")
        );
        assert_eq!(
            Credentials::new("k", " ", "p", KeyVersion::V2).unwrap_err(),
            ConfigError::MissingCredential("api secret")
        );
        assert_eq!(
            Credentials::new("k", "s", "", KeyVersion::V2).unwrap_err(),
            ConfigError::MissingCredential("api passphrase")
        );
    }

    #[test]
    fn test_credentials_must_be_header_safe() {
        assert_eq!(
            Credentials::new("kéy\n", "s", "p", KeyVersion::V2).unwrap_err(),
            ConfigError::InvalidCredential("api key")
        );
        assert_eq!(
            Credentials::new("k", "s", "pass\r\nX-Injected: 1", KeyVersion::V1).unwrap_err(),
            ConfigError::InvalidCredential("api passphrase")
        );
        // the secret is never sent, only used as the HMAC key
        assert!(Credentials::new("k", "sécret", "p", KeyVersion::V2).is_ok());
    }

    #[test]
    fn test_key_version_parse() {
        assert_eq!(KeyVersion::parse("2").unwrap(), KeyVersion::V2);
        assert_eq!(KeyVersion::parse(" 3 ").unwrap(), KeyVersion::V3);
        assert!(KeyVersion::parse("4").is_err());
    }

    #[test]
    fn test_signed_request_debug_redacts() {
        let creds = Credentials::new("key", "secret", "my-passphrase", KeyVersion::V2).unwrap();
        let signed = creds.sign_request(TS, "post", "/api/v1/orders", r#"{"symbol":"BTC-USDT"}"#);

        assert_eq!(signed.method, "POST");
        assert_eq!(signed.signature, "lFpC/gtgtjF/LQopCwI/KBIXL6dSyHV9+6Bf50x3jbQ=");

        let debug = format!("{:?}", signed);
        assert!(!debug.contains(&signed.signature));
        assert!(!debug.contains(&signed.passphrase));
        assert!(debug.contains("[REDACTED]"));

        let debug = format!("{:?}", creds);
        assert!(!debug.contains("secret\""));
        assert!(!debug.contains("my-passphrase"));
    }
}
