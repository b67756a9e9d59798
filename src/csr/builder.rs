// csr/builder.rs
use super::types::{
    CsrRequestDescriptor, HostName, SanList, SignatureAlgorithm, SubjectIdentity, KEY_BITS,
};
use crate::config::OrganizationProfile;

/// Turns normalized input into a request descriptor for one organization.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    profile: OrganizationProfile,
}

impl RequestBuilder {
    pub fn new(profile: OrganizationProfile) -> Self {
        Self { profile }
    }

    pub fn build(&self, fqdn: HostName, extra_sans: Vec<HostName>) -> CsrRequestDescriptor {
        let subject = SubjectIdentity::new(&self.profile, fqdn.clone());
        // The common name is always repeated as the first SAN.
        let sans = SanList::new(fqdn, extra_sans);

        CsrRequestDescriptor {
            subject,
            sans,
            signature_algorithm: SignatureAlgorithm::Sha256WithRsa,
            key_bits: KEY_BITS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::normalize::normalize;

    fn build(fqdn: &str, sans: &str) -> CsrRequestDescriptor {
        let input = normalize(fqdn, sans).unwrap();
        RequestBuilder::new(OrganizationProfile::default()).build(input.fqdn, input.sans)
    }

    fn san_names(descriptor: &CsrRequestDescriptor) -> Vec<&str> {
        descriptor.sans.iter().map(HostName::as_str).collect()
    }

    #[test]
    fn server_with_two_extra_names() {
        let descriptor = build(
            "server.example.edu",
            "www.server.example.edu, api.server.example.edu",
        );
        assert_eq!(descriptor.subject.common_name.as_str(), "server.example.edu");
        assert_eq!(
            san_names(&descriptor),
            [
                "server.example.edu",
                "www.server.example.edu",
                "api.server.example.edu"
            ]
        );
    }

    #[test]
    fn no_extra_names_still_lists_the_fqdn() {
        let descriptor = build("host.example.org", "");
        assert_eq!(san_names(&descriptor), ["host.example.org"]);
        assert_eq!(descriptor.sans.len(), 1);
    }

    #[test]
    fn common_name_keeps_casing() {
        let descriptor = build("Host.Example.ORG", "");
        assert_eq!(descriptor.subject.common_name.as_str(), "Host.Example.ORG");
        assert_eq!(descriptor.sans.primary().as_str(), "Host.Example.ORG");
    }

    #[test]
    fn first_san_is_always_the_fqdn() {
        for (fqdn, sans) in [
            ("a.edu", ""),
            ("  b.edu ", "c.edu"),
            ("d.edu", " , ,, "),
            ("e.edu", "f.edu, e.edu, g.edu"),
        ] {
            let descriptor = build(fqdn, sans);
            assert_eq!(descriptor.sans.primary().as_str(), fqdn.trim());
            assert_eq!(descriptor.subject.common_name, *descriptor.sans.primary());
        }
    }

    #[test]
    fn building_twice_gives_equal_descriptors() {
        let builder = RequestBuilder::new(OrganizationProfile::default());
        let input = normalize("twice.bc.edu", "one.bc.edu, two.bc.edu").unwrap();

        let first = builder.build(input.fqdn.clone(), input.sans.clone());
        let second = builder.build(input.fqdn, input.sans);
        assert_eq!(first, second);
    }

    #[test]
    fn fixed_policy_and_profile_values() {
        let descriptor = build("policy.bc.edu", "");
        assert_eq!(descriptor.signature_algorithm, SignatureAlgorithm::Sha256WithRsa);
        assert_eq!(descriptor.key_bits, 2048);

        let subject = &descriptor.subject;
        assert_eq!(subject.country, "US");
        assert_eq!(subject.state, "MA");
        assert_eq!(subject.locality, "Boston");
        assert_eq!(subject.organization, "Trustees of Boston College");
        assert_eq!(subject.organizational_unit, "BC");
        assert_eq!(subject.email, "itsstaff.ops@bc.edu");
    }

    #[test]
    fn injected_profile_replaces_the_fixed_attributes() {
        let profile = OrganizationProfile {
            country: "GB".to_string(),
            state: "England".to_string(),
            locality: "London".to_string(),
            organization: "Example Ltd".to_string(),
            organizational_unit: "Platform".to_string(),
            email: "pki@example.co.uk".to_string(),
        };
        let input = normalize("api.example.co.uk", "").unwrap();
        let descriptor = RequestBuilder::new(profile).build(input.fqdn, input.sans);

        assert_eq!(descriptor.subject.country, "GB");
        assert_eq!(descriptor.subject.organization, "Example Ltd");
        assert_eq!(descriptor.subject.common_name.as_str(), "api.example.co.uk");
    }
}
