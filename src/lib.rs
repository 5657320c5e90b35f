//! hostcert - Throwaway PKI for a single host
//!
//! Mints an ephemeral private Certificate Authority, issues one TLS service
//! certificate under it, and writes both certificates plus the service
//! private key to disk with owner-only permissions.
//!
//! ```text
//! ca-<hostname> (self-signed, CA=true, pathlen=0)
//!   └── <hostname> (CA=false, serverAuth, SAN = hostname + alt names)
//! ```
//!
//! # Flow
//!
//! 1. [`output::WriteStrategy::for_paths`] compares the certificate and key
//!    paths once. If they name the same file the key is appended to the
//!    certificate, otherwise it gets a file of its own.
//! 2. [`chain::ChainAssembler`] generates the CA key and certificate, then the
//!    service key and certificate.
//! 3. [`output::write_chain`] writes the CA certificate, the service
//!    certificate and the service key, in that order.
//!
//! The engine does not print anything. It emits `tracing` events and returns
//! [`PkiError`] values; reporting and exit codes belong to the caller.
//!
//! # Example
//!
//! ```no_run
//! use hostcert::configs::ChainConfig;
//! use std::path::Path;
//!
//! let mut config = ChainConfig::with_defaults("svc.example.com", Path::new("/etc/pki/svc"));
//! config.subject_alt_names = vec!["svc2.example.com".to_string()];
//! let written = hostcert::provision(&config)?;
//! println!("key stored at {}", written.cert_key_file.display());
//! # Ok::<(), hostcert::PkiError>(())
//! ```
//!
//! # Known limitation
//!
//! Writes are not transactional. A failure while writing the service
//! certificate or key leaves the files written before it on disk.

pub mod certificate;
pub mod chain;
pub mod configs;
pub mod error;
pub mod generate_ca;
pub mod generate_keypair;
pub mod generate_service_cert;
pub mod output;
pub mod path_identity;
pub mod secure_writer;

pub use error::{PkiError, Result};

use chain::ChainAssembler;
use configs::ChainConfig;
use output::{write_chain, WriteStrategy, WrittenFiles};
use tracing::debug;

/// Build the chain described by `config` and write it out
///
/// The cert/key path comparison happens before any key is generated. A
/// configuration the builders reject therefore fails before any file is
/// touched.
pub fn provision(config: &ChainConfig) -> Result<WrittenFiles> {
    let strategy = WriteStrategy::for_paths(&config.paths.cert_file, &config.paths.cert_key_file)?;
    debug!(?strategy, "Selected service key write strategy");

    let chain = ChainAssembler::new(config).build_chain()?;
    write_chain(&chain, &config.paths, strategy)
}
