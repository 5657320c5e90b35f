use crate::error::PkiError;
use anyhow::{Context, Result};
use openssl::hash::MessageDigest;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LIFETIME_DAYS: u32 = 3650;
pub const DEFAULT_PACKAGE: &str = "Unknown";
pub const DEFAULT_COUNTRY: &str = "US";
pub const DEFAULT_ORGANIZATION: &str = "Unspecified";

pub const DEFAULT_CA_FILE_NAME: &str = "ca.crt";
pub const DEFAULT_CERT_FILE_NAME: &str = "service.pem";
pub const DEFAULT_CERT_KEY_FILE_NAME: &str = "service-key.pem";

/// RSA modulus sizes the tool accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(try_from = "u32")]
pub enum KeyStrength {
    #[value(name = "512")]
    Bits512,
    #[value(name = "1024")]
    Bits1024,
    #[default]
    #[value(name = "2048")]
    Bits2048,
    #[value(name = "4096")]
    Bits4096,
}

impl KeyStrength {
    pub const ALL: [KeyStrength; 4] = [
        KeyStrength::Bits512,
        KeyStrength::Bits1024,
        KeyStrength::Bits2048,
        KeyStrength::Bits4096,
    ];

    pub fn bits(self) -> u32 {
        match self {
            KeyStrength::Bits512 => 512,
            KeyStrength::Bits1024 => 1024,
            KeyStrength::Bits2048 => 2048,
            KeyStrength::Bits4096 => 4096,
        }
    }
}

impl TryFrom<u32> for KeyStrength {
    type Error = PkiError;

    fn try_from(bits: u32) -> std::result::Result<Self, Self::Error> {
        KeyStrength::ALL
            .into_iter()
            .find(|strength| strength.bits() == bits)
            .ok_or_else(|| {
                PkiError::Config(format!(
                    "unsupported key strength {} (expected one of 512, 1024, 2048, 4096)",
                    bits
                ))
            })
    }
}

impl fmt::Display for KeyStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Digest used when signing both certificates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn message_digest(self) -> MessageDigest {
        match self {
            HashAlgorithm::Sha256 => MessageDigest::sha256(),
            HashAlgorithm::Sha384 => MessageDigest::sha384(),
            HashAlgorithm::Sha512 => MessageDigest::sha512(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        };
        f.write_str(name)
    }
}

/// Where the three output files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub ca_file: PathBuf,
    pub cert_file: PathBuf,
    pub cert_key_file: PathBuf,
}

impl OutputPaths {
    /// Default file names placed under `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            ca_file: dir.join(DEFAULT_CA_FILE_NAME),
            cert_file: dir.join(DEFAULT_CERT_FILE_NAME),
            cert_key_file: dir.join(DEFAULT_CERT_KEY_FILE_NAME),
        }
    }
}

/// Fully resolved settings for one run. Immutable once built.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub key_strength: KeyStrength,
    pub hash_algorithm: HashAlgorithm,
    pub lifetime_days: u32,
    pub hostname: String,
    pub subject_alt_names: Vec<String>,
    pub country: String,
    pub organization: String,
    /// Name of the package the certificate is for; recorded as the OU
    pub package: String,
    pub paths: OutputPaths,
}

impl ChainConfig {
    /// Built-in defaults for `hostname`, with output files under `dir`
    pub fn with_defaults(hostname: impl Into<String>, dir: &Path) -> Self {
        Self {
            key_strength: KeyStrength::default(),
            hash_algorithm: HashAlgorithm::default(),
            lifetime_days: DEFAULT_LIFETIME_DAYS,
            hostname: hostname.into(),
            subject_alt_names: Vec::new(),
            country: DEFAULT_COUNTRY.to_string(),
            organization: DEFAULT_ORGANIZATION.to_string(),
            package: DEFAULT_PACKAGE.to_string(),
            paths: OutputPaths::in_dir(dir),
        }
    }

    /// Overlay every value present in a defaults file
    pub fn apply_file_defaults(mut self, file: FileDefaults) -> Self {
        if let Some(strength) = file.key_strength {
            self.key_strength = strength;
        }
        if let Some(hash) = file.hash_algorithm {
            self.hash_algorithm = hash;
        }
        if let Some(days) = file.lifetime_days {
            self.lifetime_days = days;
        }
        if let Some(hostname) = file.hostname {
            self.hostname = hostname;
        }
        if !file.subject_alt_names.is_empty() {
            self.subject_alt_names = file.subject_alt_names;
        }
        if let Some(country) = file.country {
            self.country = country;
        }
        if let Some(organization) = file.organization {
            self.organization = organization;
        }
        if let Some(package) = file.package {
            self.package = package;
        }
        if let Some(ca_file) = file.ca_file {
            self.paths.ca_file = ca_file;
        }
        if let Some(cert_file) = file.cert_file {
            self.paths.cert_file = cert_file;
        }
        if let Some(cert_key_file) = file.cert_key_file {
            self.paths.cert_key_file = cert_key_file;
        }
        self
    }
}

/// Optional TOML file whose values sit between the built-in defaults and
/// explicit command-line flags
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct FileDefaults {
    pub key_strength: Option<KeyStrength>,
    pub hash_algorithm: Option<HashAlgorithm>,
    pub lifetime_days: Option<u32>,
    pub hostname: Option<String>,
    #[serde(default)]
    pub subject_alt_names: Vec<String>,
    pub country: Option<String>,
    pub organization: Option<String>,
    pub package: Option<String>,
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub cert_key_file: Option<PathBuf>,
}

impl FileDefaults {
    /// Load defaults from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        let defaults: FileDefaults = toml::from_str(config_str)?;
        Ok(defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_key_strength_from_bits() {
        assert_eq!(KeyStrength::try_from(4096).unwrap(), KeyStrength::Bits4096);
        assert!(matches!(
            KeyStrength::try_from(3072),
            Err(PkiError::Config(_))
        ));
    }

    #[test]
    fn test_value_enum_names() {
        assert_eq!(
            KeyStrength::from_str("1024", false).unwrap(),
            KeyStrength::Bits1024
        );
        assert_eq!(
            HashAlgorithm::from_str("sha384", false).unwrap(),
            HashAlgorithm::Sha384
        );
        assert!(HashAlgorithm::from_str("md5", false).is_err());
    }

    #[test]
    fn test_file_defaults_overlay() {
        let file = FileDefaults::from_toml(
            r#"
            key_strength = 4096
            hash_algorithm = "sha512"
            lifetime_days = 30
            subject_alt_names = ["alt.example.com"]
            cert_key_file = "/srv/tls/service.pem"
            "#,
        )
        .unwrap();

        let config =
            ChainConfig::with_defaults("svc.example.com", Path::new("/srv/tls")).apply_file_defaults(file);

        assert_eq!(config.key_strength, KeyStrength::Bits4096);
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha512);
        assert_eq!(config.lifetime_days, 30);
        assert_eq!(config.subject_alt_names, vec!["alt.example.com".to_string()]);
        assert_eq!(config.paths.cert_key_file, config.paths.cert_file);
        assert_eq!(config.country, DEFAULT_COUNTRY);
        assert_eq!(config.package, DEFAULT_PACKAGE);
    }

    #[test]
    fn test_file_defaults_rejects_bad_strength() {
        assert!(FileDefaults::from_toml("key_strength = 3000").is_err());
        assert!(FileDefaults::from_toml("colour = \"blue\"").is_err());
    }
}
