// src/app/output.rs
use chrono::{Datelike, Local};
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use super::generator::GeneratedCsr;
use crate::csr::HostName;
use crate::utils::logging::Logger;

/// `<first-label>_<year>`, e.g. `server_2026` for `server.example.edu`.
pub fn artifact_stem(fqdn: &HostName, year: i32) -> String {
    let label = fqdn.first_label();
    let label = if label.is_empty() { fqdn.as_str() } else { label };
    // Names are not validated, keep them from escaping the output directory
    let label: String = label
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{}_{}", label, year)
}

/// Key and CSR file names for a request made this year.
pub fn artifact_filenames(fqdn: &HostName) -> (String, String) {
    let stem = artifact_stem(fqdn, Local::now().year());
    (format!("{}.key", stem), format!("{}.csr", stem))
}

#[derive(Debug, Clone)]
pub struct WrittenFiles {
    pub key_path: PathBuf,
    pub csr_path: PathBuf,
}

pub fn write_artifacts(
    generated: &GeneratedCsr,
    out_dir: &str,
    force: bool,
    logger: &mut dyn Logger,
) -> io::Result<WrittenFiles> {
    let out_dir = PathBuf::from(shellexpand::tilde(out_dir).to_string());
    fs::create_dir_all(&out_dir)?;

    let key_path = out_dir.join(&generated.key_filename);
    let csr_path = out_dir.join(&generated.csr_filename);

    if !force {
        for path in [&key_path, &csr_path] {
            if path.exists() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already exists. Use --force to overwrite.", path.display()),
                ));
            }
        }
    }

    logger.debug_log(&format!("Writing private key: {}", key_path.display()));
    write_private_key(&key_path, &generated.key_pem)?;

    logger.debug_log(&format!("Writing CSR: {}", csr_path.display()));
    if let Err(e) = fs::write(&csr_path, &generated.csr_pem) {
        // A key without its CSR is a partial result, take it back
        if let Err(remove_err) = fs::remove_file(&key_path) {
            logger.log(&format!(
                "Failed to remove {}: {}",
                key_path.display(),
                remove_err
            ));
        }
        return Err(e);
    }

    logger.log(&format!(
        "Wrote {} and {}",
        key_path.display(),
        csr_path.display()
    ));

    Ok(WrittenFiles { key_path, csr_path })
}

fn write_private_key(path: &Path, pem: &str) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;

    // mode() only applies on creation, an overwritten key keeps its old bits
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(pem.as_bytes())
}
