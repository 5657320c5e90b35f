//! Writing a finished chain to disk
//!
//! The files are written in a fixed order: CA certificate, service
//! certificate, service key. The sequence is not transactional. If a later
//! write fails, the files already written stay on disk (for example a CA
//! certificate with no matching service material). A rerun regenerates
//! everything from scratch.

use crate::chain::Chain;
use crate::configs::OutputPaths;
use crate::error::Result;
use crate::path_identity::same_file;
use crate::secure_writer::{append_secure, create_secure};
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use tracing::info;

/// How the service key is stored, decided once before anything is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Certificate and key share one file; the key is appended after the cert
    AppendKeyToCert,
    /// The key gets its own owner-only file
    SeparateKeyFile,
}

impl WriteStrategy {
    pub fn for_paths(cert_file: &Path, cert_key_file: &Path) -> Result<Self> {
        if same_file(cert_file, cert_key_file)? {
            Ok(WriteStrategy::AppendKeyToCert)
        } else {
            Ok(WriteStrategy::SeparateKeyFile)
        }
    }
}

/// Paths actually written by [`write_chain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub ca_file: PathBuf,
    pub cert_file: PathBuf,
    pub cert_key_file: PathBuf,
    pub strategy: WriteStrategy,
}

pub fn write_chain(chain: &Chain, paths: &OutputPaths, strategy: WriteStrategy) -> Result<WrittenFiles> {
    let ca_pem = chain.ca_certificate.to_pem()?;
    create_secure(&paths.ca_file, &ca_pem)?;
    info!("CA public certificate written to {}", paths.ca_file.display());

    let cert_pem = chain.service_certificate.to_pem()?;
    create_secure(&paths.cert_file, &cert_pem)?;
    info!(
        "Service public certificate written to {}",
        paths.cert_file.display()
    );

    let key_pem = chain.service_key.private_key_pem()?;
    match strategy {
        WriteStrategy::AppendKeyToCert => {
            append_secure(&paths.cert_key_file, key_pem.expose_secret())?
        }
        WriteStrategy::SeparateKeyFile => {
            create_secure(&paths.cert_key_file, key_pem.expose_secret())?
        }
    }
    info!(
        "Service certificate private key written to {}",
        paths.cert_key_file.display()
    );

    Ok(WrittenFiles {
        ca_file: paths.ca_file.clone(),
        cert_file: paths.cert_file.clone(),
        cert_key_file: paths.cert_key_file.clone(),
        strategy,
    })
}
