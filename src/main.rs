//! hostcert - Throwaway CA and service certificate for a single host
//!
//! Generates a private CA, signs a TLS service certificate with it and writes
//! the CA certificate, the service certificate and the service private key.
//!
//! # Quick Start
//!
//! ```bash
//! # Certificate and key in separate files under the current directory
//! hostcert --hostname svc.example.com --subject-alt-name svc2.example.com
//!
//! # Certificate and key bundled in one file
//! hostcert --cert-file /etc/pki/svc.pem --cert-key-file /etc/pki/svc.pem
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use hostcert::configs::{ChainConfig, FileDefaults, HashAlgorithm, KeyStrength};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "hostcert")]
#[command(about = "Generate a private CA and a service certificate signed by it")]
#[command(version)]
struct Cli {
    /// Display no output unless there is an error
    #[arg(long)]
    quiet: bool,

    /// Display progress messages
    #[arg(long)]
    verbose: bool,

    /// Enable debug messages, including full certificate dumps. Implies verbose.
    #[arg(long)]
    debug: bool,

    /// TOML file with default values for any of the options below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Certificate lifetime (days) [default: 3650]
    #[arg(long)]
    lifetime: Option<u32>,

    /// Strength of the certificate private keys in bits [default: 2048]
    #[arg(long, value_enum)]
    key_strength: Option<KeyStrength>,

    /// Hashing algorithm to use for signing [default: sha256]
    #[arg(long, value_enum)]
    hash_alg: Option<HashAlgorithm>,

    /// The name of the package needing a certificate [default: Unknown]
    #[arg(long)]
    package: Option<String>,

    /// Path where the public CA certificate will be stored [default: ./ca.crt]
    #[arg(long)]
    ca_file: Option<PathBuf>,

    /// Path where the public service certificate will be stored [default: ./service.pem]
    #[arg(long)]
    cert_file: Option<PathBuf>,

    /// Path where the service private key will be stored [default: ./service-key.pem]
    #[arg(long)]
    cert_key_file: Option<PathBuf>,

    /// The valid hostname of the certificate. Must be an FQDN. [default: system hostname]
    #[arg(long)]
    hostname: Option<String>,

    /// An additional valid hostname for the certificate. May be given multiple times.
    #[arg(long = "subject-alt-name")]
    subject_alt_names: Vec<String>,

    /// Certificate DN: Country (C) [default: US]
    #[arg(long)]
    country: Option<String>,

    /// Certificate DN: Organization (O) [default: Unspecified]
    #[arg(long)]
    organization: Option<String>,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.debug {
            "trace"
        } else if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }

    /// Built-in defaults, then the config file, then explicit flags
    fn into_chain_config(self) -> Result<ChainConfig> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;

        let mut file_defaults = match &self.config {
            Some(path) => Some(FileDefaults::from_file(path)?),
            None => None,
        };

        // An explicit empty hostname is kept; only a missing one falls back
        let hostname = match self
            .hostname
            .or_else(|| file_defaults.as_mut().and_then(|file| file.hostname.take()))
        {
            Some(hostname) => hostname,
            None => system_hostname()?,
        };

        let mut config = ChainConfig::with_defaults(hostname, &cwd);
        if let Some(file_defaults) = file_defaults {
            config = config.apply_file_defaults(file_defaults);
        }

        if let Some(days) = self.lifetime {
            config.lifetime_days = days;
        }
        if let Some(strength) = self.key_strength {
            config.key_strength = strength;
        }
        if let Some(hash) = self.hash_alg {
            config.hash_algorithm = hash;
        }
        if let Some(package) = self.package {
            config.package = package;
        }
        if let Some(ca_file) = self.ca_file {
            config.paths.ca_file = ca_file;
        }
        if let Some(cert_file) = self.cert_file {
            config.paths.cert_file = cert_file;
        }
        if let Some(cert_key_file) = self.cert_key_file {
            config.paths.cert_key_file = cert_key_file;
        }
        if !self.subject_alt_names.is_empty() {
            config.subject_alt_names = self.subject_alt_names;
        }
        if let Some(country) = self.country {
            config.country = country;
        }
        if let Some(organization) = self.organization {
            config.organization = organization;
        }

        Ok(config)
    }
}

fn system_hostname() -> Result<String> {
    let hostname = nix::unistd::gethostname().context("Failed to read system hostname")?;
    Ok(hostname.to_string_lossy().into_owned())
}

/// Logging is configured from the command line only; `RUST_LOG` wins if set
fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level());

    let config = cli.into_chain_config()?;
    tracing::debug!(?config, "Resolved configuration");

    let written = hostcert::provision(&config).context("Failed to provision certificates")?;
    info!(
        strategy = ?written.strategy,
        "Certificate chain for {} complete",
        config.hostname
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_quiet_and_debug_together() {
        let cli = Cli::try_parse_from(["hostcert", "--quiet", "--debug"]).unwrap();
        assert_eq!(cli.log_level(), "trace");

        let cli = Cli::try_parse_from(["hostcert", "--quiet"]).unwrap();
        assert_eq!(cli.log_level(), "error");
    }

    #[test]
    fn test_explicit_empty_hostname_is_kept() {
        let cli = Cli::try_parse_from(["hostcert", "--hostname", ""]).unwrap();
        let config = cli.into_chain_config().unwrap();
        assert_eq!(config.hostname, "");
    }

    #[test]
    fn test_empty_hostname_from_config_file_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hostcert.toml");
        fs::write(&path, "hostname = \"\"\nsubject_alt_names = [\"alt.example.com\"]\n").unwrap();

        let cli = Cli::try_parse_from(["hostcert", "--config", path.to_str().unwrap()]).unwrap();
        let config = cli.into_chain_config().unwrap();
        assert_eq!(config.hostname, "");
        assert_eq!(config.subject_alt_names, vec!["alt.example.com".to_string()]);
    }

    #[test]
    fn test_flag_hostname_overrides_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hostcert.toml");
        fs::write(&path, "hostname = \"file.example.com\"\nlifetime_days = 90\n").unwrap();

        let cli = Cli::try_parse_from([
            "hostcert",
            "--config",
            path.to_str().unwrap(),
            "--hostname",
            "flag.example.com",
        ])
        .unwrap();
        let config = cli.into_chain_config().unwrap();
        assert_eq!(config.hostname, "flag.example.com");
        assert_eq!(config.lifetime_days, 90);
    }
}
