//! Private CA Certificate Generation Module
//!
//! Builds the self-signed certificate that anchors the throwaway chain. The
//! CA only ever signs the one service certificate of the same run, so it
//! is restricted to `pathlen=0`.
//!
//! # Certificate Properties
//! - **Self-signed**: Issuer and subject are the same
//! - **Key Usage**: keyCertSign, cRLSign (critical)
//! - **Basic Constraints**: CA=true, pathlen=0 (critical)
//! - **Subject Key Identifier**: hash of the public key
//! - **Serial Number**: random 128-bit, never zero
//!
//! # Example
//! ```rust,no_run
//! use hostcert::certificate::SubjectConfig;
//! use hostcert::configs::{HashAlgorithm, KeyStrength};
//! use hostcert::generate_ca::RsaCABuilder;
//! use hostcert::generate_keypair::RsaKeyPair;
//! # fn example() -> hostcert::Result<()> {
//!
//! let ca_key = RsaKeyPair::generate(KeyStrength::Bits2048)?;
//! let ca_cert = RsaCABuilder::new(&ca_key)
//!     .subject(SubjectConfig {
//!         common_name: "ca-svc.example.com".to_string(),
//!         country: "US".to_string(),
//!         organization: "Example".to_string(),
//!         organizational_unit: "httpd".to_string(),
//!     })
//!     .hash_algorithm(HashAlgorithm::Sha256)
//!     .validity_days(3650)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::certificate::{start_template, Certificate, SubjectConfig};
use crate::configs::HashAlgorithm;
use crate::error::{PkiError, Result};
use crate::generate_keypair::RsaKeyPair;
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectKeyIdentifier};

const CA_PATH_LENGTH: u32 = 0;

/// Common name given to the private CA of `hostname`
pub fn ca_common_name(hostname: &str) -> String {
    if hostname.is_empty() {
        "ca".to_string()
    } else {
        format!("ca-{}", hostname)
    }
}

/// Builder for a self-signed CA certificate over an existing key pair
pub struct RsaCABuilder<'a> {
    key_pair: &'a RsaKeyPair,
    subject: SubjectConfig,
    hash_algorithm: HashAlgorithm,
    validity_days: u32,
}

impl<'a> RsaCABuilder<'a> {
    pub fn new(key_pair: &'a RsaKeyPair) -> Self {
        Self {
            key_pair,
            subject: SubjectConfig::default(),
            hash_algorithm: HashAlgorithm::default(),
            validity_days: 365,
        }
    }

    pub fn subject(mut self, subject: SubjectConfig) -> Self {
        self.subject = subject;
        self
    }

    pub fn hash_algorithm(mut self, hash_algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = hash_algorithm;
        self
    }

    /// Set validity period in days. Zero is rejected by `build()`.
    pub fn validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    /// Assemble and self-sign the CA certificate
    ///
    /// # Errors
    /// Returns [`PkiError::CertificateBuild`] if the lifetime is zero, an
    /// extension cannot be built, or the key/digest pair cannot sign (for
    /// example SHA-512 with a 512-bit key).
    pub fn build(self) -> Result<Certificate> {
        if self.subject.common_name.is_empty() {
            return Err(PkiError::InvalidSubject(
                "CA common name must not be empty".to_string(),
            ));
        }

        let name = self.subject.to_x509_name()?;
        let private_key = self.key_pair.private_key();
        let mut builder = start_template(&name, &name, private_key, self.validity_days)?;

        let basic_constraints = BasicConstraints::new()
            .critical()
            .ca()
            .pathlen(CA_PATH_LENGTH)
            .build()
            .map_err(|e| PkiError::build("Failed to build BasicConstraints", e))?;
        builder
            .append_extension(basic_constraints)
            .map_err(|e| PkiError::build("Failed to add BasicConstraints", e))?;

        let key_usage = KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .build()
            .map_err(|e| PkiError::build("Failed to build KeyUsage", e))?;
        builder
            .append_extension(key_usage)
            .map_err(|e| PkiError::build("Failed to add KeyUsage", e))?;

        let subject_key_id = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(None, None))
            .map_err(|e| PkiError::build("Failed to build SubjectKeyIdentifier", e))?;
        builder
            .append_extension(subject_key_id)
            .map_err(|e| PkiError::build("Failed to add SubjectKeyIdentifier", e))?;

        builder
            .sign(private_key, self.hash_algorithm.message_digest())
            .map_err(|e| PkiError::build("Failed to sign CA certificate", e))?;

        Ok(Certificate::new(builder.build()))
    }
}
