// csr/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::config::OrganizationProfile;

pub const KEY_BITS: u32 = 2048;

/// A DNS name as entered by the operator. Never empty, never contains a comma,
/// casing untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct HostName(String);

impl HostName {
    /// Trims `raw`; `None` when the result is empty or contains a comma.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains(',') {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the first dot, or the whole name.
    pub fn first_label(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HostName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum DnAttribute {
    Country,
    State,
    Locality,
    Organization,
    OrganizationalUnit,
    Email,
    CommonName,
}

impl DnAttribute {
    /// Short name used in OpenSSL configs and `-subj` strings.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Country => "C",
            Self::State => "ST",
            Self::Locality => "L",
            Self::Organization => "O",
            Self::OrganizationalUnit => "OU",
            Self::Email => "emailAddress",
            Self::CommonName => "CN",
        }
    }

    pub fn oid(self) -> &'static str {
        match self {
            Self::Country => "2.5.4.6",
            Self::State => "2.5.4.8",
            Self::Locality => "2.5.4.7",
            Self::Organization => "2.5.4.10",
            Self::OrganizationalUnit => "2.5.4.11",
            Self::Email => "1.2.840.113549.1.9.1",
            Self::CommonName => "2.5.4.3",
        }
    }

    pub fn from_oid(oid: &str) -> Option<Self> {
        SUBJECT_ORDER.iter().copied().find(|attr| attr.oid() == oid)
    }
}

/// Order of the subject DN. Some CA tooling re-parses the subject and is
/// sensitive to it.
pub const SUBJECT_ORDER: [DnAttribute; 7] = [
    DnAttribute::Country,
    DnAttribute::State,
    DnAttribute::Locality,
    DnAttribute::Organization,
    DnAttribute::OrganizationalUnit,
    DnAttribute::Email,
    DnAttribute::CommonName,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubjectIdentity {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub organizational_unit: String,
    pub email: String,
    pub common_name: HostName,
}

impl SubjectIdentity {
    pub fn new(profile: &OrganizationProfile, common_name: HostName) -> Self {
        Self {
            country: profile.country.clone(),
            state: profile.state.clone(),
            locality: profile.locality.clone(),
            organization: profile.organization.clone(),
            organizational_unit: profile.organizational_unit.clone(),
            email: profile.email.clone(),
            common_name,
        }
    }

    pub fn get(&self, attribute: DnAttribute) -> &str {
        match attribute {
            DnAttribute::Country => &self.country,
            DnAttribute::State => &self.state,
            DnAttribute::Locality => &self.locality,
            DnAttribute::Organization => &self.organization,
            DnAttribute::OrganizationalUnit => &self.organizational_unit,
            DnAttribute::Email => &self.email,
            DnAttribute::CommonName => self.common_name.as_str(),
        }
    }

    /// The subject as it must appear in the request, in DN order.
    pub fn attributes(&self) -> Vec<(DnAttribute, &str)> {
        SUBJECT_ORDER
            .iter()
            .map(|&attr| (attr, self.get(attr)))
            .collect()
    }
}

impl fmt::Display for SubjectIdentity {
    /// OpenSSL `-subj` form, e.g. `/C=US/ST=MA/.../CN=host`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (attr, value) in self.attributes() {
            write!(f, "/{}={}", attr.short_name(), value.replace('/', "\\/"))?;
        }
        Ok(())
    }
}

/// Primary name first, then the extra names in entry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SanList(Vec<HostName>);

impl SanList {
    pub fn new(primary: HostName, extra: Vec<HostName>) -> Self {
        let mut names = Vec::with_capacity(extra.len() + 1);
        names.push(primary);
        names.extend(extra);
        Self(names)
    }

    pub fn primary(&self) -> &HostName {
        &self.0[0]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HostName> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<'a> IntoIterator for &'a SanList {
    type Item = &'a HostName;
    type IntoIter = std::slice::Iter<'a, HostName>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SignatureAlgorithm {
    #[serde(rename = "SHA256withRSA")]
    Sha256WithRsa,
}

impl SignatureAlgorithm {
    pub fn oid(self) -> &'static str {
        match self {
            Self::Sha256WithRsa => "1.2.840.113549.1.1.11",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256WithRsa => f.write_str("SHA256withRSA"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CsrRequestDescriptor {
    pub subject: SubjectIdentity,
    pub sans: SanList,
    pub signature_algorithm: SignatureAlgorithm,
    pub key_bits: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str) -> HostName {
        HostName::parse(name).unwrap()
    }

    #[test]
    fn host_name_rejects_blank_and_commas() {
        assert!(HostName::parse("").is_none());
        assert!(HostName::parse("   ").is_none());
        assert!(HostName::parse("a.com,b.com").is_none());
        assert_eq!(host("  Mixed.Case.Edu ").as_str(), "Mixed.Case.Edu");
    }

    #[test]
    fn first_label_stops_at_first_dot() {
        assert_eq!(host("server.example.edu").first_label(), "server");
        assert_eq!(host("localhost").first_label(), "localhost");
        assert_eq!(host(".leading").first_label(), "");
    }

    #[test]
    fn subject_attributes_follow_dn_order() {
        let subject = SubjectIdentity::new(&OrganizationProfile::default(), host("web.bc.edu"));
        let order: Vec<&str> = subject
            .attributes()
            .into_iter()
            .map(|(attr, _)| attr.short_name())
            .collect();
        assert_eq!(order, ["C", "ST", "L", "O", "OU", "emailAddress", "CN"]);
        assert_eq!(
            subject.to_string(),
            "/C=US/ST=MA/L=Boston/O=Trustees of Boston College/OU=BC/emailAddress=itsstaff.ops@bc.edu/CN=web.bc.edu"
        );
    }

    #[test]
    fn oid_lookup_round_trips_for_every_attribute() {
        for attr in SUBJECT_ORDER {
            assert_eq!(DnAttribute::from_oid(attr.oid()), Some(attr));
        }
        assert_eq!(DnAttribute::from_oid("2.5.4.5"), None);
    }

    #[test]
    fn san_list_keeps_primary_first_and_duplicates() {
        let sans = SanList::new(host("a.edu"), vec![host("b.edu"), host("a.edu")]);
        let names: Vec<&str> = sans.iter().map(HostName::as_str).collect();
        assert_eq!(names, ["a.edu", "b.edu", "a.edu"]);
        assert_eq!(sans.primary().as_str(), "a.edu");
    }

    #[test]
    fn descriptor_serializes_algorithm_by_its_jca_name() {
        let json = serde_json::to_value(SignatureAlgorithm::Sha256WithRsa).unwrap();
        assert_eq!(json, serde_json::json!("SHA256withRSA"));
    }
}
