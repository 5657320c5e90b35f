//! Builds the CA and the service certificate of one run, in order
//!
//! ```text
//! Start → CaKeyed → CaSigned → ServiceKeyed → ServiceSigned → Done
//!   └──────────┴─────────┴──────────┴──────────────┴──→ Failed
//! ```
//!
//! The first failure stops the run. Key and certificate failures are not
//! transient, so nothing is retried and no partial [`Chain`] is returned.

use crate::certificate::{Certificate, SubjectConfig};
use crate::configs::ChainConfig;
use crate::error::Result;
use crate::generate_ca::{ca_common_name, RsaCABuilder};
use crate::generate_keypair::RsaKeyPair;
use crate::generate_service_cert::RsaServiceCertBuilder;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStage {
    Start,
    CaKeyed,
    CaSigned,
    ServiceKeyed,
    ServiceSigned,
    Done,
    Failed,
}

/// Result of a successful run. Held in memory only.
#[derive(Debug)]
pub struct Chain {
    pub ca_certificate: Certificate,
    pub service_certificate: Certificate,
    pub service_key: RsaKeyPair,
}

pub struct ChainAssembler<'a> {
    config: &'a ChainConfig,
    stage: ChainStage,
}

impl<'a> ChainAssembler<'a> {
    pub fn new(config: &'a ChainConfig) -> Self {
        Self {
            config,
            stage: ChainStage::Start,
        }
    }

    /// Last stage reached; `Failed` after an error
    pub fn stage(&self) -> ChainStage {
        self.stage
    }

    /// Generate both key pairs and both certificates
    pub fn build_chain(&mut self) -> Result<Chain> {
        let result = self.run();
        if result.is_err() {
            debug!(stage = ?self.stage, "Chain build failed");
            self.stage = ChainStage::Failed;
        }
        result
    }

    fn run(&mut self) -> Result<Chain> {
        let config = self.config;

        debug!(bits = config.key_strength.bits(), "Generating private CA key");
        let ca_key = RsaKeyPair::generate(config.key_strength)?;
        self.advance(ChainStage::CaKeyed);

        let ca_certificate = RsaCABuilder::new(&ca_key)
            .subject(self.subject(ca_common_name(&config.hostname)))
            .hash_algorithm(config.hash_algorithm)
            .validity_days(config.lifetime_days)
            .build()?;
        self.advance(ChainStage::CaSigned);
        trace_certificate("CA", &ca_certificate);

        debug!(bits = config.key_strength.bits(), "Generating service key");
        let service_key = RsaKeyPair::generate(config.key_strength)?;
        self.advance(ChainStage::ServiceKeyed);

        let service_certificate = RsaServiceCertBuilder::new(&service_key, &ca_key, &ca_certificate)
            .hostname(config.hostname.clone())
            .subject(self.subject(String::new()))
            .subject_alt_names(config.subject_alt_names.clone())
            .hash_algorithm(config.hash_algorithm)
            .validity_days(config.lifetime_days)
            .build()?;
        self.advance(ChainStage::ServiceSigned);
        trace_certificate("service", &service_certificate);

        self.advance(ChainStage::Done);
        Ok(Chain {
            ca_certificate,
            service_certificate,
            service_key,
        })
    }

    fn advance(&mut self, next: ChainStage) {
        debug!(from = ?self.stage, to = ?next, "Chain stage complete");
        self.stage = next;
    }

    fn subject(&self, common_name: String) -> SubjectConfig {
        SubjectConfig {
            common_name,
            country: self.config.country.clone(),
            organization: self.config.organization.clone(),
            organizational_unit: self.config.package.clone(),
        }
    }
}

// Certificates only; key material is never dumped
fn trace_certificate(role: &str, certificate: &Certificate) {
    match certificate.to_text() {
        Ok(text) => trace!("{} certificate:\n{}", role, text),
        Err(e) => trace!("Could not render {} certificate: {}", role, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::{HashAlgorithm, KeyStrength};
    use crate::error::PkiError;
    use std::path::Path;

    fn config() -> ChainConfig {
        let mut config = ChainConfig::with_defaults("svc.example.com", Path::new("/tmp"));
        config.key_strength = KeyStrength::Bits1024;
        config.organization = "Example".to_string();
        config
    }

    #[test]
    fn test_build_chain_reaches_done() {
        let config = config();
        let mut assembler = ChainAssembler::new(&config);
        let chain = assembler.build_chain().unwrap();
        assert_eq!(assembler.stage(), ChainStage::Done);

        let ca = chain.ca_certificate.x509();
        let leaf = chain.service_certificate.x509();
        assert_eq!(
            leaf.issuer_name().to_der().unwrap(),
            ca.subject_name().to_der().unwrap()
        );
        let ca_public = ca.public_key().unwrap();
        assert!(leaf.verify(&ca_public).unwrap());
        assert_ne!(
            ca.serial_number().to_bn().unwrap(),
            leaf.serial_number().to_bn().unwrap()
        );
        assert_eq!(chain.service_key.bits(), 1024);
    }

    #[test]
    fn test_configured_digest_signs_both_certificates() {
        let mut config = config();
        config.hash_algorithm = HashAlgorithm::Sha384;
        let chain = ChainAssembler::new(&config).build_chain().unwrap();
        for cert in [&chain.ca_certificate, &chain.service_certificate] {
            assert_eq!(
                cert.x509().signature_algorithm().object().nid(),
                openssl::nid::Nid::SHA384WITHRSAENCRYPTION
            );
        }
    }

    #[test]
    fn test_zero_lifetime_fails_at_ca_signing() {
        let mut config = config();
        config.lifetime_days = 0;
        let mut assembler = ChainAssembler::new(&config);
        assert!(matches!(
            assembler.build_chain(),
            Err(PkiError::CertificateBuild(_))
        ));
        assert_eq!(assembler.stage(), ChainStage::Failed);
    }

    #[test]
    fn test_unsupported_digest_for_key_fails() {
        let mut config = config();
        config.key_strength = KeyStrength::Bits512;
        config.hash_algorithm = HashAlgorithm::Sha512;
        let mut assembler = ChainAssembler::new(&config);
        assert!(assembler.build_chain().is_err());
        assert_eq!(assembler.stage(), ChainStage::Failed);
    }
}
