mod types;

pub use types::{default_profile_path, OrganizationProfile};
