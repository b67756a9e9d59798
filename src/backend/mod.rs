// src/backend/mod.rs
mod cli;
mod native;

pub use cli::OpensslCliBackend;
pub use native::OpensslBackend;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::csr::CsrRequestDescriptor;
use crate::utils::logging::Logger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    KeyGenFailed(String),
    SignFailed(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyGenFailed(s) => write!(f, "Key generation failed: {}", s),
            Self::SignFailed(s) => write!(f, "CSR signing failed: {}", s),
        }
    }
}

impl std::error::Error for CryptoError {}

/// A freshly generated private key, held as unencrypted PEM so any backend
/// can load it.
pub struct KeyPair {
    pem: String,
    bits: u32,
}

impl KeyPair {
    pub fn new(pem: String, bits: u32) -> Self {
        Self { pem, bits }
    }

    pub fn private_key_pem(&self) -> &str {
        &self.pem
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }
}

impl fmt::Debug for KeyPair {
    /// Implemented manually so key material never reaches a log line
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair").field("bits", &self.bits).finish()
    }
}

#[derive(Clone)]
pub struct CsrArtifacts {
    pub key_pem: String,
    pub csr_pem: String,
}

impl fmt::Debug for CsrArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrArtifacts")
            .field("csr_pem", &self.csr_pem)
            .finish_non_exhaustive()
    }
}

/// Key generation and request signing. Everything byte-level (DER, PEM,
/// signatures) lives behind this trait.
pub trait CsrBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate_key_pair(
        &self,
        bits: u32,
        logger: &mut dyn Logger,
    ) -> Result<KeyPair, CryptoError>;

    fn sign_request(
        &self,
        descriptor: &CsrRequestDescriptor,
        key_pair: &KeyPair,
        logger: &mut dyn Logger,
    ) -> Result<CsrArtifacts, CryptoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process signing with the OpenSSL library
    #[default]
    Native,
    /// Shell out to the `openssl` executable with a generated request config
    Cli,
}

impl BackendKind {
    /// `openssl` names the executable the CLI backend runs; the native
    /// backend ignores it.
    pub fn create(self, openssl: &str) -> Box<dyn CsrBackend> {
        match self {
            Self::Native => Box::new(OpensslBackend::new()),
            Self::Cli => Box::new(OpensslCliBackend::new().with_program(openssl)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Cli => f.write_str("cli"),
        }
    }
}
