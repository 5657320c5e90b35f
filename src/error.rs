//! Error kinds returned by the certificate engine.
//!
//! Every variant is terminal for a run. Nothing in the crate retries: the
//! causes are bad configuration, exhausted resources or filesystem
//! permissions, none of which a second attempt fixes.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PkiError>;

#[derive(Debug, Error)]
pub enum PkiError {
    #[error("Failed to generate {bits}-bit RSA keypair: {source}")]
    KeyGeneration {
        bits: u32,
        #[source]
        source: openssl::error::ErrorStack,
    },

    #[error("Failed to build certificate: {0}")]
    CertificateBuild(String),

    #[error("Invalid certificate subject: {0}")]
    InvalidSubject(String),

    #[error("Failed to resolve path {path:?}: {reason}")]
    PathResolution { path: PathBuf, reason: String },

    #[error("Failed to write {path:?}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("File {0:?} does not exist")]
    FileNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PkiError {
    /// Wrap an OpenSSL failure raised while assembling or signing a certificate
    pub(crate) fn build(step: &str, err: openssl::error::ErrorStack) -> Self {
        PkiError::CertificateBuild(format!("{}: {}", step, err))
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PkiError::FileWrite {
            path: path.into(),
            source,
        }
    }
}
