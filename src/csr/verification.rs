// src/csr/verification.rs
use openssl::{pkey::PKey, sha::sha256, x509::X509Req};
use serde::Serialize;
use x509_parser::{
    certification_request::X509CertificationRequest,
    extensions::{GeneralName, ParsedExtension},
    pem::parse_x509_pem,
    prelude::FromDer,
};

use super::types::{CsrRequestDescriptor, DnAttribute};

/// What a signed request actually contains, read back from its PEM.
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    /// Subject attributes in encoded order, as (short name or OID, value).
    pub subject: Vec<(String, String)>,
    pub sans: Vec<String>,
    pub signature_algorithm_oid: String,
    pub key_bits: u32,
    pub signature_valid: bool,
    pub public_key_sha256: String,
}

pub fn inspect_request(csr_pem: &str) -> Result<RequestSummary, String> {
    let (_, pem) = parse_x509_pem(csr_pem.as_bytes())
        .map_err(|e| format!("CSR is not valid PEM: {}", e))?;
    if pem.label != "CERTIFICATE REQUEST" && pem.label != "NEW CERTIFICATE REQUEST" {
        return Err(format!("Unexpected PEM label: {}", pem.label));
    }

    let (_, csr) = X509CertificationRequest::from_der(&pem.contents)
        .map_err(|e| format!("Failed to parse CSR: {}", e))?;

    let mut subject = Vec::new();
    for attr in csr.certification_request_info.subject.iter_attributes() {
        let oid = attr.attr_type().to_id_string();
        let name = DnAttribute::from_oid(&oid)
            .map(|a| a.short_name().to_string())
            .unwrap_or(oid);
        let value = attr
            .as_str()
            .map_err(|e| format!("Unreadable subject attribute {}: {}", name, e))?;
        subject.push((name, value.to_string()));
    }

    let mut sans = Vec::new();
    if let Some(extensions) = csr.requested_extensions() {
        for ext in extensions {
            if let ParsedExtension::SubjectAlternativeName(san) = ext {
                for name in &san.general_names {
                    match name {
                        GeneralName::DNSName(dns) => sans.push(dns.to_string()),
                        other => return Err(format!("Unexpected SAN entry: {:?}", other)),
                    }
                }
            }
        }
    }

    let signature_algorithm_oid = csr.signature_algorithm.algorithm.to_id_string();

    let req = X509Req::from_pem(csr_pem.as_bytes())
        .map_err(|e| format!("OpenSSL could not load CSR: {}", e))?;
    let public_key = req
        .public_key()
        .map_err(|e| format!("CSR has no usable public key: {}", e))?;
    let signature_valid = req
        .verify(&public_key)
        .map_err(|e| format!("Failed to check CSR signature: {}", e))?;
    let public_key_der = public_key
        .public_key_to_der()
        .map_err(|e| format!("Failed to encode public key: {}", e))?;

    Ok(RequestSummary {
        subject,
        sans,
        signature_algorithm_oid,
        key_bits: public_key.bits(),
        signature_valid,
        public_key_sha256: hex::encode(sha256(&public_key_der)),
    })
}

impl RequestSummary {
    /// Fails with a description of the first difference from what was asked for.
    pub fn check_matches(&self, descriptor: &CsrRequestDescriptor) -> Result<(), String> {
        if !self.signature_valid {
            return Err("CSR self-signature does not verify".to_string());
        }

        let expected_subject: Vec<(String, String)> = descriptor
            .subject
            .attributes()
            .into_iter()
            .map(|(attr, value)| (attr.short_name().to_string(), value.to_string()))
            .collect();
        if self.subject != expected_subject {
            return Err(format!(
                "Subject mismatch: expected {:?}, found {:?}",
                expected_subject, self.subject
            ));
        }

        let expected_sans: Vec<&str> = descriptor.sans.iter().map(|n| n.as_str()).collect();
        if self.sans != expected_sans {
            return Err(format!(
                "SAN mismatch: expected {:?}, found {:?}",
                expected_sans, self.sans
            ));
        }

        if self.signature_algorithm_oid != descriptor.signature_algorithm.oid() {
            return Err(format!(
                "Signature algorithm mismatch: expected {} ({}), found {}",
                descriptor.signature_algorithm,
                descriptor.signature_algorithm.oid(),
                self.signature_algorithm_oid
            ));
        }

        if self.key_bits != descriptor.key_bits {
            return Err(format!(
                "Key size mismatch: expected {} bits, found {}",
                descriptor.key_bits, self.key_bits
            ));
        }

        Ok(())
    }
}

/// Checks the private key belongs to the request's public key.
pub fn key_matches_request(key_pem: &str, csr_pem: &str) -> Result<bool, String> {
    let key = PKey::private_key_from_pem(key_pem.as_bytes())
        .map_err(|e| format!("Failed to load private key: {}", e))?;
    let req = X509Req::from_pem(csr_pem.as_bytes())
        .map_err(|e| format!("OpenSSL could not load CSR: {}", e))?;
    let request_key = req
        .public_key()
        .map_err(|e| format!("CSR has no usable public key: {}", e))?;

    Ok(key.public_eq(&request_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CsrBackend, OpensslBackend};
    use crate::config::OrganizationProfile;
    use crate::csr::{normalize, RequestBuilder};
    use crate::utils::logging::tests::MockLogger;

    fn descriptor(fqdn: &str, sans: &str) -> CsrRequestDescriptor {
        let input = normalize(fqdn, sans).unwrap();
        RequestBuilder::new(OrganizationProfile::default()).build(input.fqdn, input.sans)
    }

    fn signed(descriptor: &CsrRequestDescriptor) -> (String, String) {
        let backend = OpensslBackend::new();
        let mut logger = MockLogger::new();
        let key_pair = backend
            .generate_key_pair(descriptor.key_bits, &mut logger)
            .unwrap();
        let artifacts = backend
            .sign_request(descriptor, &key_pair, &mut logger)
            .unwrap();
        (artifacts.key_pem, artifacts.csr_pem)
    }

    #[test]
    fn summary_matches_the_descriptor_it_was_signed_from() {
        let descriptor = descriptor("verify.bc.edu", "www.verify.bc.edu");
        let (key_pem, csr_pem) = signed(&descriptor);

        let summary = inspect_request(&csr_pem).unwrap();
        assert!(summary.check_matches(&descriptor).is_ok());
        assert_eq!(summary.public_key_sha256.len(), 64);
        assert!(key_matches_request(&key_pem, &csr_pem).unwrap());
    }

    #[test]
    fn mismatched_sans_are_reported() {
        let (_, csr_pem) = signed(&descriptor("one.bc.edu", ""));
        let summary = inspect_request(&csr_pem).unwrap();

        let err = summary
            .check_matches(&descriptor("one.bc.edu", "two.bc.edu"))
            .unwrap_err();
        assert!(err.starts_with("SAN mismatch"));
    }

    #[test]
    fn foreign_key_does_not_match() {
        let descriptor = descriptor("pair.bc.edu", "");
        let (_, csr_pem) = signed(&descriptor);
        let (other_key, _) = signed(&descriptor);

        assert!(!key_matches_request(&other_key, &csr_pem).unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(inspect_request("not a csr").is_err());
    }
}
