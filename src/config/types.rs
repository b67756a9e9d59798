// config/types.rs
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use utoipa::ToSchema;

/// The fixed part of every request subject. Only the common name varies
/// between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrganizationProfile {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub organizational_unit: String,
    pub email: String,
}

impl Default for OrganizationProfile {
    fn default() -> Self {
        Self {
            country: "US".to_string(),
            state: "MA".to_string(),
            locality: "Boston".to_string(),
            organization: "Trustees of Boston College".to_string(),
            organizational_unit: "BC".to_string(),
            email: "itsstaff.ops@bc.edu".to_string(),
        }
    }
}

impl OrganizationProfile {
    pub fn load_from_file(path: &str) -> io::Result<Self> {
        let path = shellexpand::tilde(path).to_string();
        let config_str = fs::read_to_string(&path)?;

        let profile: Self = if is_yaml(&path) {
            serde_yaml::from_str(&config_str)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        } else {
            serde_json::from_str(&config_str)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        };

        profile.validate()?;
        Ok(profile)
    }

    pub fn save_to_file(&self, path: &str) -> io::Result<()> {
        let path = shellexpand::tilde(path).to_string();
        if let Some(parent) = Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let config_str = if is_yaml(&path) {
            serde_yaml::to_string(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        };
        fs::write(path, config_str)
    }

    pub fn validate(&self) -> io::Result<()> {
        let fields = [
            ("country", &self.country),
            ("state", &self.state),
            ("locality", &self.locality),
            ("organization", &self.organization),
            ("organizational_unit", &self.organizational_unit),
            ("email", &self.email),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Organization profile field '{}' is empty", name),
                ));
            }
        }

        // countryName is a two-letter PrintableString
        if self.country.len() != 2 || !self.country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Country must be a two-letter code, got '{}'", self.country),
            ));
        }

        Ok(())
    }

    /// Loads `path` if given, otherwise the per-user profile when one exists,
    /// otherwise the built-in profile.
    pub fn resolve(path: Option<&str>) -> io::Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        match default_profile_path() {
            Some(default_path) if default_path.exists() => {
                Self::load_from_file(&default_path.to_string_lossy())
            }
            _ => Ok(Self::default()),
        }
    }
}

pub fn default_profile_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("csrgen").join("profile.json"))
}

fn is_yaml(path: &str) -> bool {
    matches!(
        Path::new(path).extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}
