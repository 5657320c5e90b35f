//! RSA key pair generation
//!
//! Each call to [`RsaKeyPair::generate`] draws fresh randomness from the
//! OpenSSL CSPRNG, so the CA key and the service key of one run never share
//! material. The private key only leaves this module as PEM bytes held in a
//! [`SecretBox`], which zeroizes the buffer when dropped.

use crate::configs::KeyStrength;
use crate::error::{PkiError, Result};
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use secrecy::SecretBox;
use std::fmt;

/// An RSA private key together with the strength it was generated at
pub struct RsaKeyPair {
    private_key: PKey<Private>,
    strength: KeyStrength,
}

impl RsaKeyPair {
    /// Generate a new RSA key pair of the requested modulus size
    ///
    /// # Errors
    /// Returns [`PkiError::KeyGeneration`] if OpenSSL cannot produce the key,
    /// for example when the randomness source is unavailable.
    pub fn generate(strength: KeyStrength) -> Result<Self> {
        let bits = strength.bits();
        let rsa = Rsa::generate(bits).map_err(|source| PkiError::KeyGeneration { bits, source })?;
        let private_key =
            PKey::from_rsa(rsa).map_err(|source| PkiError::KeyGeneration { bits, source })?;

        Ok(Self {
            private_key,
            strength,
        })
    }

    pub fn strength(&self) -> KeyStrength {
        self.strength
    }

    /// Modulus length of the generated key, in bits
    pub fn bits(&self) -> u32 {
        self.private_key.bits()
    }

    pub(crate) fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    /// PEM encoding of the public half (SubjectPublicKeyInfo)
    pub fn public_key_pem(&self) -> Result<Vec<u8>> {
        self.private_key
            .public_key_to_pem()
            .map_err(|e| PkiError::build("Failed to encode public key", e))
    }

    /// PKCS#1 (`BEGIN RSA PRIVATE KEY`) encoding of the private key
    pub fn private_key_pem(&self) -> Result<SecretBox<Vec<u8>>> {
        let rsa = self
            .private_key
            .rsa()
            .map_err(|e| PkiError::build("Failed to access RSA key", e))?;
        let pem = rsa
            .private_key_to_pem()
            .map_err(|e| PkiError::build("Failed to encode private key", e))?;
        Ok(SecretBox::new(Box::new(pem)))
    }
}

impl fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("strength", &self.strength)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
