// src/csr/mod.rs
mod builder;
mod normalize;
pub mod openssl_config;
mod types;
pub mod verification;

pub use builder::RequestBuilder;
pub use normalize::{normalize, ValidationError};
pub use types::{CsrRequestDescriptor, DnAttribute, HostName, SignatureAlgorithm, SubjectIdentity};
