// csr/normalize.rs
use std::fmt;

use super::types::HostName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingFqdn,
    InvalidHostName(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFqdn => write!(f, "Please enter a fully qualified domain name"),
            Self::InvalidHostName(name) => {
                write!(f, "Invalid host name '{}': host names cannot contain commas", name)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedInput {
    pub fqdn: HostName,
    pub sans: Vec<HostName>,
}

/// Cleans the two free-text fields. Only emptiness is checked; host names are
/// not held to RFC 1035.
pub fn normalize(fqdn_raw: &str, sans_raw: &str) -> Result<NormalizedInput, ValidationError> {
    let trimmed = fqdn_raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingFqdn);
    }
    let fqdn = HostName::parse(trimmed)
        .ok_or_else(|| ValidationError::InvalidHostName(trimmed.to_string()))?;

    let sans = sans_raw.split(',').filter_map(HostName::parse).collect();

    Ok(NormalizedInput { fqdn, sans })
}
