// src/app/generator.rs
use chrono::{DateTime, Utc};
use std::{fmt, io};

use super::output::artifact_filenames;
use crate::backend::{CryptoError, CsrBackend};
use crate::config::OrganizationProfile;
use crate::csr::{
    normalize,
    verification::{inspect_request, key_matches_request},
    CsrRequestDescriptor, RequestBuilder, ValidationError,
};
use crate::utils::logging::Logger;

#[derive(Debug)]
pub enum GenerateError {
    Validation(ValidationError),
    Crypto(CryptoError),
    Verification(String),
    IoError(io::Error),
}

impl From<GenerateError> for io::Error {
    fn from(error: GenerateError) -> Self {
        match error {
            GenerateError::IoError(e) => e,
            GenerateError::Validation(e) => io::Error::new(io::ErrorKind::InvalidInput, e),
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{}", e),
            Self::Crypto(e) => write!(f, "{}", e),
            Self::Verification(s) => write!(f, "CSR verification failed: {}", s),
            Self::IoError(e) => write!(f, "IO Error: {}", e),
        }
    }
}

impl std::error::Error for GenerateError {}

impl From<ValidationError> for GenerateError {
    fn from(error: ValidationError) -> Self {
        GenerateError::Validation(error)
    }
}

impl From<CryptoError> for GenerateError {
    fn from(error: CryptoError) -> Self {
        GenerateError::Crypto(error)
    }
}

impl From<io::Error> for GenerateError {
    fn from(error: io::Error) -> Self {
        GenerateError::IoError(error)
    }
}

/// Outcome of one successful run. Nothing is written to disk yet.
#[derive(Clone)]
pub struct GeneratedCsr {
    pub descriptor: CsrRequestDescriptor,
    pub key_pem: String,
    pub csr_pem: String,
    pub key_filename: String,
    pub csr_filename: String,
    pub backend: String,
    pub public_key_sha256: String,
    pub generated_at: DateTime<Utc>,
}

impl fmt::Debug for GeneratedCsr {
    /// Leaves out `key_pem` so the private key never reaches a log line
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedCsr")
            .field("descriptor", &self.descriptor)
            .field("csr_pem", &self.csr_pem)
            .field("key_filename", &self.key_filename)
            .field("csr_filename", &self.csr_filename)
            .field("backend", &self.backend)
            .field("public_key_sha256", &self.public_key_sha256)
            .field("generated_at", &self.generated_at)
            .finish_non_exhaustive()
    }
}

pub struct CsrGenerator {
    logger: Box<dyn Logger>,
    builder: RequestBuilder,
    backend: Box<dyn CsrBackend>,
}

impl CsrGenerator {
    pub fn new(
        logger: Box<dyn Logger>,
        profile: OrganizationProfile,
        backend: Box<dyn CsrBackend>,
    ) -> Self {
        Self {
            logger,
            builder: RequestBuilder::new(profile),
            backend,
        }
    }

    pub fn log(&mut self, message: &str) {
        self.logger.log(message);
    }

    pub fn logger_mut(&mut self) -> &mut dyn Logger {
        self.logger.as_mut()
    }

    /// Normalize, build, generate the key, sign, then read the request back
    /// to confirm it says what was asked for.
    pub fn generate(&mut self, fqdn_raw: &str, sans_raw: &str) -> Result<GeneratedCsr, GenerateError> {
        let input = match normalize(fqdn_raw, sans_raw) {
            Ok(input) => input,
            Err(e) => {
                self.logger.log(&format!("Invalid input: {}", e));
                return Err(e.into());
            }
        };

        let descriptor = self.builder.build(input.fqdn, input.sans);
        let names: Vec<&str> = descriptor.sans.iter().map(|n| n.as_str()).collect();
        self.logger.log(&format!(
            "Generating CSR for {}",
            descriptor.subject.common_name
        ));
        self.logger.debug_log(&format!("Subject: {}", descriptor.subject));
        self.logger.debug_log(&format!("SANs: {}", names.join(", ")));
        self.logger.debug_log(&format!("Backend: {}", self.backend.name()));

        self.logger.log(&format!(
            "Generating {}-bit RSA private key",
            descriptor.key_bits
        ));
        let key_pair = match self
            .backend
            .generate_key_pair(descriptor.key_bits, self.logger.as_mut())
        {
            Ok(key_pair) => key_pair,
            Err(e) => {
                self.logger.log(&format!("Failed to generate private key: {}", e));
                return Err(e.into());
            }
        };

        self.logger.log(&format!(
            "Signing request with {}",
            descriptor.signature_algorithm
        ));
        let artifacts = match self
            .backend
            .sign_request(&descriptor, &key_pair, self.logger.as_mut())
        {
            Ok(artifacts) => artifacts,
            Err(e) => {
                self.logger.log(&format!("Failed to sign CSR: {}", e));
                return Err(e.into());
            }
        };

        let summary = inspect_request(&artifacts.csr_pem).map_err(GenerateError::Verification)?;
        if let Err(e) = summary.check_matches(&descriptor) {
            self.logger.log(&format!("Generated CSR does not match request: {}", e));
            return Err(GenerateError::Verification(e));
        }
        if !key_matches_request(&artifacts.key_pem, &artifacts.csr_pem)
            .map_err(GenerateError::Verification)?
        {
            return Err(GenerateError::Verification(
                "private key does not belong to the CSR".to_string(),
            ));
        }
        self.logger.debug_log(&format!(
            "Public key SHA-256: {}",
            summary.public_key_sha256
        ));

        let (key_filename, csr_filename) = artifact_filenames(&descriptor.subject.common_name);
        self.logger.log(&format!(
            "Successfully generated {} and {}",
            key_filename, csr_filename
        ));

        Ok(GeneratedCsr {
            descriptor,
            key_pem: artifacts.key_pem,
            csr_pem: artifacts.csr_pem,
            key_filename,
            csr_filename,
            backend: self.backend.name().to_string(),
            public_key_sha256: summary.public_key_sha256,
            generated_at: Utc::now(),
        })
    }
}
