// src/backend/native.rs
use openssl::{
    error::ErrorStack,
    hash::MessageDigest,
    nid::Nid,
    pkey::{PKey, Private},
    rsa::Rsa,
    stack::Stack,
    x509::{extension::SubjectAlternativeName, X509Name, X509NameBuilder, X509Req},
};

use super::{CryptoError, CsrArtifacts, CsrBackend, KeyPair};
use crate::csr::{CsrRequestDescriptor, DnAttribute, SignatureAlgorithm, SubjectIdentity};
use crate::utils::logging::Logger;

/// Signs in-process through the OpenSSL library.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpensslBackend;

impl OpensslBackend {
    pub fn new() -> Self {
        Self
    }
}

fn nid_for(attribute: DnAttribute) -> Nid {
    match attribute {
        DnAttribute::Country => Nid::COUNTRYNAME,
        DnAttribute::State => Nid::STATEORPROVINCENAME,
        DnAttribute::Locality => Nid::LOCALITYNAME,
        DnAttribute::Organization => Nid::ORGANIZATIONNAME,
        DnAttribute::OrganizationalUnit => Nid::ORGANIZATIONALUNITNAME,
        DnAttribute::Email => Nid::PKCS9_EMAILADDRESS,
        DnAttribute::CommonName => Nid::COMMONNAME,
    }
}

fn subject_name(subject: &SubjectIdentity) -> Result<X509Name, ErrorStack> {
    let mut name_builder = X509NameBuilder::new()?;
    for (attr, value) in subject.attributes() {
        name_builder.append_entry_by_nid(nid_for(attr), value)?;
    }
    Ok(name_builder.build())
}

fn digest_for(algorithm: SignatureAlgorithm) -> MessageDigest {
    match algorithm {
        SignatureAlgorithm::Sha256WithRsa => MessageDigest::sha256(),
    }
}

fn build_request(
    descriptor: &CsrRequestDescriptor,
    pkey: &PKey<Private>,
) -> Result<String, ErrorStack> {
    let name = subject_name(&descriptor.subject)?;

    let mut req_builder = X509Req::builder()?;
    // PKCS#10 only defines version 1, encoded as 0
    req_builder.set_version(0)?;
    req_builder.set_subject_name(&name)?;
    req_builder.set_pubkey(pkey)?;

    let mut san = SubjectAlternativeName::new();
    for host in &descriptor.sans {
        san.dns(host.as_str());
    }
    let mut extensions = Stack::new()?;
    extensions.push(san.build(&req_builder.x509v3_context(None))?)?;
    req_builder.add_extensions(&extensions)?;

    req_builder.sign(pkey, digest_for(descriptor.signature_algorithm))?;

    let pem = req_builder.build().to_pem()?;
    Ok(String::from_utf8_lossy(&pem).into_owned())
}

impl CsrBackend for OpensslBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn generate_key_pair(
        &self,
        bits: u32,
        logger: &mut dyn Logger,
    ) -> Result<KeyPair, CryptoError> {
        logger.debug_log(&format!("Generating {}-bit RSA key in process", bits));
        let rsa = Rsa::generate(bits).map_err(|e| CryptoError::KeyGenFailed(e.to_string()))?;
        let pkey = PKey::from_rsa(rsa).map_err(|e| CryptoError::KeyGenFailed(e.to_string()))?;
        let pem = pkey
            .private_key_to_pem_pkcs8()
            .map_err(|e| CryptoError::KeyGenFailed(e.to_string()))?;

        Ok(KeyPair::new(String::from_utf8_lossy(&pem).into_owned(), bits))
    }

    fn sign_request(
        &self,
        descriptor: &CsrRequestDescriptor,
        key_pair: &KeyPair,
        logger: &mut dyn Logger,
    ) -> Result<CsrArtifacts, CryptoError> {
        logger.debug_log(&format!(
            "Building request for {} in process",
            descriptor.subject.common_name
        ));
        let pkey = PKey::private_key_from_pem(key_pair.private_key_pem().as_bytes())
            .map_err(|e| CryptoError::SignFailed(format!("Failed to load private key: {}", e)))?;

        let csr_pem =
            build_request(descriptor, &pkey).map_err(|e| CryptoError::SignFailed(e.to_string()))?;

        Ok(CsrArtifacts {
            key_pem: key_pair.private_key_pem().to_string(),
            csr_pem,
        })
    }
}
