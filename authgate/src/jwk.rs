//! Implementations of the JSON Web Keys (JWK) standard
//!
//! The specifications for JSON Web Keys can be found in [RFC7517][].
//!
//! [RFC7517]: https://tools.ietf.org/html/rfc7517

use std::convert::TryFrom;

use aliri_braid::braid;
use serde::Deserialize;

use crate::{
    error,
    jwa::{self, rsa},
    jws::{self, Verifier},
};

/// An identifier for a JWK
#[braid(serde, ref_doc = "A borrowed reference to JWK identifier ([`KeyId`])")]
pub struct KeyId;

/// An identified JSON Web Key
///
/// Keys whose `kty` cannot be used for verification are still retained so
/// that a lookup can report them instead of acting as if they were absent.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "JwkDto")]
#[must_use]
pub struct Jwk {
    key_id: KeyId,
    usage: Option<jwa::Usage>,
    algorithm: Option<String>,
    key: Key,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Key {
    Rsa(rsa::PublicKey),
    Unsupported { kty: String },
}

impl Jwk {
    /// Constructs an RSA JWK with the given key ID
    pub fn from_rsa(key_id: KeyId, key: rsa::PublicKey) -> Self {
        Self {
            key_id,
            usage: None,
            algorithm: None,
            key: Key::Rsa(key),
        }
    }

    /// The key ID
    #[must_use]
    pub fn key_id(&self) -> &KeyIdRef {
        &self.key_id
    }

    /// The intended usage of the key
    #[must_use]
    pub fn usage(&self) -> Option<jwa::Usage> {
        self.usage
    }

    /// The algorithm the key is published for, if any
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    /// The `kty` parameter of the key
    #[must_use]
    pub fn key_type(&self) -> &str {
        match &self.key {
            Key::Rsa(_) => "RSA",
            Key::Unsupported { kty } => kty,
        }
    }

    /// The RSA public key, if this is an RSA key
    #[must_use]
    pub fn rsa(&self) -> Option<&rsa::PublicKey> {
        match &self.key {
            Key::Rsa(k) => Some(k),
            Key::Unsupported { .. } => None,
        }
    }

    /// Checks that this key is of a type that can verify signatures
    ///
    /// # Errors
    ///
    /// Returns an error naming the key type if it is not RSA.
    pub fn ensure_supported(&self) -> Result<(), error::UnsupportedKeyType> {
        match &self.key {
            Key::Rsa(_) => Ok(()),
            Key::Unsupported { kty } => Err(error::unsupported_key_type(kty.as_str())),
        }
    }

    /// Sets the key's usage
    pub fn with_usage(self, usage: jwa::Usage) -> Self {
        Self {
            usage: Some(usage),
            ..self
        }
    }

    /// Sets the algorithm the key is published for
    pub fn with_algorithm(self, alg: impl Into<String>) -> Self {
        Self {
            algorithm: Some(alg.into()),
            ..self
        }
    }
}

impl Verifier for Jwk {
    type Algorithm = jwa::Algorithm;
    type Error = error::JwkVerifyError;

    fn verify(
        &self,
        alg: Self::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        if let Some(u) = self.usage {
            if u != jwa::Usage::Signing {
                return Err(error::jwk_usage_mismatch().into());
            }
        }

        match self.algorithm.as_deref() {
            Some(key_alg) if key_alg == alg.as_str() => {}
            Some(_) => {
                return Err(error::incompatible_algorithm(alg.as_str()).into());
            }
            None => {}
        }

        match &self.key {
            Key::Rsa(k) => jws::Verifier::verify(k, alg, data, signature)?,
            Key::Unsupported { kty } => {
                return Err(error::unsupported_key_type(kty.as_str()).into());
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct JwkDto {
    #[serde(rename = "kid", default)]
    key_id: Option<KeyId>,

    #[serde(rename = "use", default)]
    usage: Option<jwa::Usage>,

    #[serde(rename = "alg", default)]
    algorithm: Option<String>,

    kty: String,

    #[serde(default)]
    n: Option<String>,

    #[serde(default)]
    e: Option<String>,
}

impl TryFrom<JwkDto> for Jwk {
    type Error = error::KeyRejected;

    fn try_from(dto: JwkDto) -> Result<Self, Self::Error> {
        let key_id = dto
            .key_id
            .ok_or(error::key_rejected("key has no `kid`"))?;

        let key = if dto.kty == "RSA" {
            let (n, e) = dto
                .n
                .as_deref()
                .zip(dto.e.as_deref())
                .ok_or(error::key_rejected("RSA key requires `n` and `e`"))?;

            Key::Rsa(rsa::PublicKey::from_encoded(n, e)?)
        } else {
            Key::Unsupported { kty: dto.kty }
        };

        Ok(Self {
            key_id,
            usage: dto.usage,
            algorithm: dto.algorithm,
            key,
        })
    }
}
