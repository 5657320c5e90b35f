//! Pieces shared by the CA and service certificate builders
//!
//! Both builders start from [`start_template`], which fills in the version,
//! a random serial, the validity window, the subject/issuer names and the
//! public key. They differ only in the extensions they append and in which
//! key signs the result.

use crate::error::{PkiError, Result};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::nid::Nid;
use openssl::pkey::{HasPublic, PKeyRef};
use openssl::x509::{X509Builder, X509Name, X509NameRef, X509};
use std::fmt;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2
const SERIAL_BITS: i32 = 128;
const SECONDS_PER_DAY: i64 = 86_400;

/// Distinguished name fields for a certificate subject
#[derive(Debug, Clone, Default)]
pub struct SubjectConfig {
    pub common_name: String,
    pub country: String,
    pub organization: String,
    pub organizational_unit: String,
}

impl SubjectConfig {
    /// Build the X.509 name. Empty fields other than CN are left out.
    pub(crate) fn to_x509_name(&self) -> Result<X509Name> {
        let mut name_builder =
            X509Name::builder().map_err(|e| PkiError::build("Failed to create name builder", e))?;

        if !self.country.is_empty() {
            name_builder
                .append_entry_by_nid(Nid::COUNTRYNAME, &self.country)
                .map_err(|e| PkiError::build("Failed to set country", e))?;
        }
        if !self.organization.is_empty() {
            name_builder
                .append_entry_by_nid(Nid::ORGANIZATIONNAME, &self.organization)
                .map_err(|e| PkiError::build("Failed to set organization", e))?;
        }
        if !self.organizational_unit.is_empty() {
            name_builder
                .append_entry_by_nid(Nid::ORGANIZATIONALUNITNAME, &self.organizational_unit)
                .map_err(|e| PkiError::build("Failed to set organizational unit", e))?;
        }
        name_builder
            .append_entry_by_nid(Nid::COMMONNAME, &self.common_name)
            .map_err(|e| PkiError::build("Failed to set CN", e))?;

        Ok(name_builder.build())
    }
}

/// A signed X.509 certificate
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
}

impl Certificate {
    pub(crate) fn new(x509: X509) -> Self {
        Self { x509 }
    }

    pub fn x509(&self) -> &X509 {
        &self.x509
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        self.x509
            .to_pem()
            .map_err(|e| PkiError::build("Failed to encode certificate", e))
    }

    pub fn subject_common_name(&self) -> Option<String> {
        common_name(self.x509.subject_name())
    }

    pub fn issuer_common_name(&self) -> Option<String> {
        common_name(self.x509.issuer_name())
    }

    /// DNS and IP entries of the subjectAltName extension, in certificate order
    pub fn subject_alt_names(&self) -> Vec<String> {
        let Some(names) = self.x509.subject_alt_names() else {
            return Vec::new();
        };
        names
            .iter()
            .filter_map(|name| {
                if let Some(dns) = name.dnsname() {
                    return Some(dns.to_string());
                }
                name.ipaddress().and_then(ip_from_octets).map(|ip| ip.to_string())
            })
            .collect()
    }

    /// Human-readable dump, as produced by `openssl x509 -text`
    pub fn to_text(&self) -> Result<String> {
        let text = self
            .x509
            .to_text()
            .map_err(|e| PkiError::build("Failed to render certificate", e))?;
        Ok(String::from_utf8_lossy(&text).into_owned())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject_common_name())
            .field("issuer", &self.issuer_common_name())
            .finish()
    }
}

fn common_name(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|cn| cn.to_string())
}

fn ip_from_octets(octets: &[u8]) -> Option<IpAddr> {
    match octets.len() {
        4 => <[u8; 4]>::try_from(octets).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(octets).ok().map(IpAddr::from),
        _ => None,
    }
}

/// Random 128-bit serial with the top bit set, so it is never zero
pub(crate) fn random_serial() -> Result<BigNum> {
    let mut serial = BigNum::new().map_err(|e| PkiError::build("Failed to allocate serial", e))?;
    serial
        .rand(SERIAL_BITS, MsbOption::ONE, false)
        .map_err(|e| PkiError::build("Failed to generate serial number", e))?;
    Ok(serial)
}

/// `[now, now + lifetime_days]`, both ends taken from one clock reading
pub(crate) fn validity_window(lifetime_days: u32) -> Result<(Asn1Time, Asn1Time)> {
    if lifetime_days == 0 {
        return Err(PkiError::CertificateBuild(
            "certificate lifetime must be at least one day".to_string(),
        ));
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| PkiError::CertificateBuild(format!("System clock is before 1970: {}", e)))?
        .as_secs() as i64;
    let expiry = now + i64::from(lifetime_days) * SECONDS_PER_DAY;

    let not_before =
        Asn1Time::from_unix(now).map_err(|e| PkiError::build("Failed to create not_before", e))?;
    let not_after =
        Asn1Time::from_unix(expiry).map_err(|e| PkiError::build("Failed to create not_after", e))?;
    Ok((not_before, not_after))
}

/// Everything common to an unsigned certificate, before extensions
pub(crate) fn start_template<T: HasPublic>(
    subject_name: &X509NameRef,
    issuer_name: &X509NameRef,
    subject_key: &PKeyRef<T>,
    lifetime_days: u32,
) -> Result<X509Builder> {
    let (not_before, not_after) = validity_window(lifetime_days)?;

    let mut builder = X509::builder().map_err(|e| PkiError::build("Failed to create X509 builder", e))?;
    builder
        .set_version(X509_VERSION_3)
        .map_err(|e| PkiError::build("Failed to set version", e))?;

    let serial = random_serial()?
        .to_asn1_integer()
        .map_err(|e| PkiError::build("Failed to encode serial number", e))?;
    builder
        .set_serial_number(&serial)
        .map_err(|e| PkiError::build("Failed to set serial number", e))?;

    builder
        .set_subject_name(subject_name)
        .map_err(|e| PkiError::build("Failed to set subject", e))?;
    builder
        .set_issuer_name(issuer_name)
        .map_err(|e| PkiError::build("Failed to set issuer", e))?;

    builder
        .set_not_before(&not_before)
        .map_err(|e| PkiError::build("Failed to set not_before", e))?;
    builder
        .set_not_after(&not_after)
        .map_err(|e| PkiError::build("Failed to set not_after", e))?;

    builder
        .set_pubkey(subject_key)
        .map_err(|e| PkiError::build("Failed to set public key", e))?;

    Ok(builder)
}
