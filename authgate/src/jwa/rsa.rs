//! RSA public keys

use std::fmt;

use super::Algorithm;
use crate::{b64, error, jws};

/// RSA public key components
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    modulus: Vec<u8>,
    exponent: Vec<u8>,
}

impl PublicKey {
    /// Constructs a public key from big-endian modulus and exponent bytes
    ///
    /// Leading zero octets are stripped. The modulus size is checked when a
    /// signature is verified, and keys under 2048 bits fail at that point.
    ///
    /// # Errors
    ///
    /// Returns an error if either component is zero.
    pub fn from_components(
        modulus: impl Into<Vec<u8>>,
        exponent: impl Into<Vec<u8>>,
    ) -> Result<Self, error::KeyRejected> {
        let modulus = strip_leading_zeros(modulus.into());
        let exponent = strip_leading_zeros(exponent.into());

        if modulus.is_empty() {
            return Err(error::key_rejected("RSA modulus is empty"));
        }

        if exponent.is_empty() {
            return Err(error::key_rejected("RSA exponent is empty"));
        }

        Ok(Self { modulus, exponent })
    }

    /// Constructs a public key from the base64url `n` and `e` members of a JWK
    ///
    /// # Errors
    ///
    /// Returns an error if either member is not valid base64url or is zero.
    pub fn from_encoded(n: &str, e: &str) -> Result<Self, error::KeyRejected> {
        let modulus = b64::decode(n).map_err(|_| error::key_rejected("`n` is not base64url"))?;
        let exponent = b64::decode(e).map_err(|_| error::key_rejected("`e` is not base64url"))?;

        Self::from_components(modulus, exponent)
    }

    /// The public modulus
    #[must_use]
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// The public exponent
    #[must_use]
    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    /// Size of the modulus in bits
    #[must_use]
    pub fn bits(&self) -> usize {
        let lead = self.modulus.first().map_or(0, |b| 8 - b.leading_zeros() as usize);
        self.modulus.len().saturating_sub(1) * 8 + lead
    }
}

fn strip_leading_zeros(mut v: Vec<u8>) -> Vec<u8> {
    let zeros = v.iter().take_while(|&&b| b == 0).count();
    v.split_off(zeros)
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl jws::Verifier for PublicKey {
    type Algorithm = Algorithm;
    type Error = error::SignatureMismatch;

    fn verify(
        &self,
        alg: Self::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        let pk = ring::signature::RsaPublicKeyComponents {
            n: self.modulus.as_slice(),
            e: self.exponent.as_slice(),
        };

        pk.verify(alg.verification_params(), data, signature)
            .map_err(|_| error::signature_mismatch())
    }
}
