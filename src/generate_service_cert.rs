//! Service Certificate Generation Module
//!
//! Issues the TLS server (leaf) certificate under the private CA. The leaf
//! carries the host's names in its subjectAltName extension and cannot sign
//! other certificates.
//!
//! # Certificate Properties
//! - **Subject CN**: the configured hostname
//! - **Issuer**: copied from the CA certificate's subject
//! - **Key Usage**: digitalSignature, keyEncipherment (critical)
//! - **Extended Key Usage**: serverAuth
//! - **Basic Constraints**: CA=false (critical)
//! - **Subject Alternative Name**: hostname first, then each configured name
//!   that has not been seen yet
//! - **Authority Key Identifier**: links back to the CA's key

use crate::certificate::{start_template, Certificate, SubjectConfig};
use crate::configs::HashAlgorithm;
use crate::error::{PkiError, Result};
use crate::generate_keypair::RsaKeyPair;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use std::net::IpAddr;

/// Hostname followed by the alternative names, without duplicates or blanks
///
/// Order of first appearance is kept so the certificate lists the hostname
/// first.
pub fn merge_subject_alt_names(hostname: &str, alt_names: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(alt_names.len() + 1);
    for name in std::iter::once(hostname).chain(alt_names.iter().map(String::as_str)) {
        let name = name.trim();
        if name.is_empty() || merged.iter().any(|seen| seen == name) {
            continue;
        }
        merged.push(name.to_string());
    }
    merged
}

/// Builder for a service certificate signed by the private CA
pub struct RsaServiceCertBuilder<'a> {
    subject_key: &'a RsaKeyPair,
    signing_key: &'a RsaKeyPair,
    signing_cert: &'a Certificate,
    hostname: String,
    subject: SubjectConfig,
    subject_alt_names: Vec<String>,
    hash_algorithm: HashAlgorithm,
    validity_days: u32,
}

impl<'a> RsaServiceCertBuilder<'a> {
    /// # Arguments
    /// * `subject_key` - Key pair whose public half the certificate certifies
    /// * `ca_key` - CA key pair that signs the certificate
    /// * `ca_cert` - CA certificate (issuer name and authority key id)
    pub fn new(subject_key: &'a RsaKeyPair, ca_key: &'a RsaKeyPair, ca_cert: &'a Certificate) -> Self {
        Self {
            subject_key,
            signing_key: ca_key,
            signing_cert: ca_cert,
            hostname: String::new(),
            subject: SubjectConfig::default(),
            subject_alt_names: Vec::new(),
            hash_algorithm: HashAlgorithm::default(),
            validity_days: 365,
        }
    }

    /// Hostname, used as the CN and as the first SAN entry
    pub fn hostname(mut self, hostname: String) -> Self {
        self.hostname = hostname;
        self
    }

    /// Country, organization and OU of the subject. The CN is ignored and
    /// derived from the hostname instead.
    pub fn subject(mut self, subject: SubjectConfig) -> Self {
        self.subject = subject;
        self
    }

    pub fn subject_alt_names(mut self, names: Vec<String>) -> Self {
        self.subject_alt_names = names;
        self
    }

    pub fn hash_algorithm(mut self, hash_algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = hash_algorithm;
        self
    }

    pub fn validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    /// Assemble the leaf certificate and sign it with the CA key
    ///
    /// # Errors
    /// - [`PkiError::InvalidSubject`] if neither a hostname nor any
    ///   alternative name is available
    /// - [`PkiError::CertificateBuild`] if the lifetime is zero, an extension
    ///   cannot be built, or signing fails
    pub fn build(self) -> Result<Certificate> {
        let san_entries = merge_subject_alt_names(&self.hostname, &self.subject_alt_names);
        let Some(first_name) = san_entries.first() else {
            return Err(PkiError::InvalidSubject(
                "hostname is empty and no subject alternative names were given".to_string(),
            ));
        };

        let subject = SubjectConfig {
            common_name: first_name.clone(),
            ..self.subject
        };
        let subject_name = subject.to_x509_name()?;
        let ca_x509 = self.signing_cert.x509();

        let mut builder = start_template(
            &subject_name,
            ca_x509.subject_name(),
            self.subject_key.private_key(),
            self.validity_days,
        )?;

        // No .ca() call: this is an end-entity certificate
        let basic_constraints = BasicConstraints::new()
            .critical()
            .build()
            .map_err(|e| PkiError::build("Failed to build BasicConstraints", e))?;
        builder
            .append_extension(basic_constraints)
            .map_err(|e| PkiError::build("Failed to add BasicConstraints", e))?;

        let key_usage = KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .build()
            .map_err(|e| PkiError::build("Failed to build KeyUsage", e))?;
        builder
            .append_extension(key_usage)
            .map_err(|e| PkiError::build("Failed to add KeyUsage", e))?;

        let extended_key_usage = ExtendedKeyUsage::new()
            .server_auth()
            .build()
            .map_err(|e| PkiError::build("Failed to build ExtendedKeyUsage", e))?;
        builder
            .append_extension(extended_key_usage)
            .map_err(|e| PkiError::build("Failed to add ExtendedKeyUsage", e))?;

        let mut san = SubjectAlternativeName::new();
        for entry in &san_entries {
            if entry.parse::<IpAddr>().is_ok() {
                san.ip(entry);
            } else {
                san.dns(entry);
            }
        }
        let san_extension = san
            .build(&builder.x509v3_context(Some(ca_x509), None))
            .map_err(|e| PkiError::build("Failed to build SubjectAlternativeName", e))?;
        builder
            .append_extension(san_extension)
            .map_err(|e| PkiError::build("Failed to add SubjectAlternativeName", e))?;

        let subject_key_id = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(Some(ca_x509), None))
            .map_err(|e| PkiError::build("Failed to build SubjectKeyIdentifier", e))?;
        builder
            .append_extension(subject_key_id)
            .map_err(|e| PkiError::build("Failed to add SubjectKeyIdentifier", e))?;

        let authority_key_id = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(ca_x509), None))
            .map_err(|e| PkiError::build("Failed to build AuthorityKeyIdentifier", e))?;
        builder
            .append_extension(authority_key_id)
            .map_err(|e| PkiError::build("Failed to add AuthorityKeyIdentifier", e))?;

        // Sign with the CA's private key
        builder
            .sign(
                self.signing_key.private_key(),
                self.hash_algorithm.message_digest(),
            )
            .map_err(|e| PkiError::build("Failed to sign service certificate", e))?;

        Ok(Certificate::new(builder.build()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::KeyStrength;
    use crate::generate_ca::RsaCABuilder;
    use openssl::nid::Nid;
    use std::collections::HashSet;

    fn org_subject(cn: &str) -> SubjectConfig {
        SubjectConfig {
            common_name: cn.to_string(),
            country: "US".to_string(),
            organization: "Example".to_string(),
            organizational_unit: "Unknown".to_string(),
        }
    }

    fn ca() -> (RsaKeyPair, Certificate) {
        let key = RsaKeyPair::generate(KeyStrength::Bits2048).unwrap();
        let cert = RsaCABuilder::new(&key)
            .subject(org_subject("ca-svc.example.com"))
            .validity_days(10)
            .build()
            .unwrap();
        (key, cert)
    }

    #[test]
    fn test_merge_subject_alt_names() {
        let merged = merge_subject_alt_names(
            "svc.example.com",
            &[
                "svc2.example.com".to_string(),
                "svc.example.com".to_string(),
                "".to_string(),
                "svc2.example.com".to_string(),
            ],
        );
        assert_eq!(merged, vec!["svc.example.com", "svc2.example.com"]);
        assert!(merge_subject_alt_names("", &[]).is_empty());
    }

    #[test]
    fn test_signed_by_ca() {
        let (ca_key, ca_cert) = ca();
        let key = RsaKeyPair::generate(KeyStrength::Bits2048).unwrap();
        let cert = RsaServiceCertBuilder::new(&key, &ca_key, &ca_cert)
            .hostname("svc.example.com".to_string())
            .subject(org_subject("ignored"))
            .subject_alt_names(vec!["svc2.example.com".to_string(), "10.0.0.1".to_string()])
            .validity_days(10)
            .build()
            .unwrap();

        let x509 = cert.x509();
        assert_eq!(
            x509.issuer_name().to_der().unwrap(),
            ca_cert.x509().subject_name().to_der().unwrap()
        );
        assert!(x509.verify(ca_key.private_key()).unwrap());
        assert_eq!(cert.subject_common_name().as_deref(), Some("svc.example.com"));

        let sans: HashSet<String> = cert.subject_alt_names().into_iter().collect();
        let expected: HashSet<String> = ["svc.example.com", "svc2.example.com", "10.0.0.1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(sans, expected);

        let text = cert.to_text().unwrap();
        assert!(text.contains("CA:FALSE"));
        assert!(text.contains("TLS Web Server Authentication"));
        assert!(text.contains("IP Address:10.0.0.1"));
    }

    #[test]
    fn test_signature_uses_configured_digest() {
        let (ca_key, ca_cert) = ca();
        let key = RsaKeyPair::generate(KeyStrength::Bits1024).unwrap();
        for (hash, expected) in [
            (HashAlgorithm::Sha384, Nid::SHA384WITHRSAENCRYPTION),
            (HashAlgorithm::Sha512, Nid::SHA512WITHRSAENCRYPTION),
        ] {
            let cert = RsaServiceCertBuilder::new(&key, &ca_key, &ca_cert)
                .hostname("svc.example.com".to_string())
                .hash_algorithm(hash)
                .validity_days(10)
                .build()
                .unwrap();
            assert_eq!(cert.x509().signature_algorithm().object().nid(), expected);
            assert!(cert.x509().verify(ca_key.private_key()).unwrap());
        }
    }

    #[test]
    fn test_empty_subject_rejected() {
        let (ca_key, ca_cert) = ca();
        let key = RsaKeyPair::generate(KeyStrength::Bits512).unwrap();
        let result = RsaServiceCertBuilder::new(&key, &ca_key, &ca_cert)
            .validity_days(10)
            .build();
        assert!(matches!(result, Err(PkiError::InvalidSubject(_))));
    }

    #[test]
    fn test_empty_hostname_falls_back_to_first_alt_name() {
        let (ca_key, ca_cert) = ca();
        let key = RsaKeyPair::generate(KeyStrength::Bits1024).unwrap();
        let cert = RsaServiceCertBuilder::new(&key, &ca_key, &ca_cert)
            .subject_alt_names(vec!["alt.example.com".to_string()])
            .validity_days(10)
            .build()
            .unwrap();
        assert_eq!(cert.subject_common_name().as_deref(), Some("alt.example.com"));
    }
}
