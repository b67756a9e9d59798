// src/backend/cli.rs
use std::{
    env,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, Output},
};
use uuid::Uuid;

use super::{CryptoError, CsrArtifacts, CsrBackend, KeyPair};
use crate::csr::{
    openssl_config::{check_config_values, render_request_config},
    CsrRequestDescriptor,
};
use crate::utils::logging::Logger;

#[derive(Debug)]
pub struct OpenSSLError {
    pub message: String,
    pub stdout: String,
    pub stderr: String,
}

impl OpenSSLError {
    fn from_output(message: String, output: &Output) -> Self {
        Self {
            message,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

impl std::fmt::Display for OpenSSLError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.stderr.trim().is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.message, self.stderr.trim())
        }
    }
}

impl std::error::Error for OpenSSLError {}

/// Drives the `openssl` executable the way the shell workflow does: a
/// throwaway request config, `genrsa`, then `req -new`.
#[derive(Debug, Clone)]
pub struct OpensslCliBackend {
    program: String,
    work_root: PathBuf,
}

impl Default for OpensslCliBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OpensslCliBackend {
    pub fn new() -> Self {
        Self {
            program: "openssl".to_string(),
            work_root: env::temp_dir(),
        }
    }

    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    /// Runs `f` inside a fresh owner-only directory that is removed
    /// afterwards, whatever the outcome.
    fn with_work_dir<T>(
        &self,
        logger: &mut dyn Logger,
        f: impl FnOnce(&Path, &mut dyn Logger) -> Result<T, String>,
    ) -> Result<T, String> {
        let dir = self.work_root.join(format!("csrgen-{}", Uuid::new_v4()));
        create_private_dir(&dir)
            .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
        logger.debug_log(&format!("Using work directory: {}", dir.display()));

        let result = f(&dir, logger);

        // Clean up key, config and request files
        if let Err(e) = fs::remove_dir_all(&dir) {
            logger.log(&format!("Failed to remove {}: {}", dir.display(), e));
        }
        result
    }

    fn run(&self, args: &[&str], failure: &str, logger: &mut dyn Logger) -> Result<(), String> {
        logger.debug_log(&format!("Executing {} {}", self.program, args.join(" ")));
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| format!("Failed to run {}: {}", self.program, e))?;

        if !output.status.success() {
            let error = OpenSSLError::from_output(failure.to_string(), &output);
            logger.log(&error.message);
            logger.debug_log(&format!(
                "stdout: {}\nstderr: {}",
                error.stdout, error.stderr
            ));
            return Err(error.to_string());
        }
        Ok(())
    }
}

fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder.create(path)
}

/// Creates the file with owner-only permissions from the start.
fn write_private(path: &Path, content: &str) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path)?.write_all(content.as_bytes())
}

fn path_str(path: &Path) -> Result<&str, String> {
    path.to_str()
        .ok_or_else(|| format!("Non UTF-8 path: {}", path.display()))
}

impl CsrBackend for OpensslCliBackend {
    fn name(&self) -> &'static str {
        "cli"
    }

    fn generate_key_pair(
        &self,
        bits: u32,
        logger: &mut dyn Logger,
    ) -> Result<KeyPair, CryptoError> {
        self.with_work_dir(logger, |dir, logger| {
            let key_path = dir.join("private.key");
            logger.debug_log(&format!("Generating private key: {}", key_path.display()));
            self.run(
                &["genrsa", "-out", path_str(&key_path)?, &bits.to_string()],
                "Failed to generate private key",
                logger,
            )?;

            let pem = fs::read_to_string(&key_path)
                .map_err(|e| format!("Failed to read generated key: {}", e))?;
            Ok(KeyPair::new(pem, bits))
        })
        .map_err(CryptoError::KeyGenFailed)
    }

    fn sign_request(
        &self,
        descriptor: &CsrRequestDescriptor,
        key_pair: &KeyPair,
        logger: &mut dyn Logger,
    ) -> Result<CsrArtifacts, CryptoError> {
        check_config_values(descriptor).map_err(CryptoError::SignFailed)?;

        self.with_work_dir(logger, |dir, logger| {
            let key_path = dir.join("private.key");
            let config_path = dir.join("request.cnf");
            let csr_path = dir.join("request.csr");

            write_private(&key_path, key_pair.private_key_pem())
                .map_err(|e| format!("Failed to stage private key: {}", e))?;
            fs::write(&config_path, render_request_config(descriptor))
                .map_err(|e| format!("Failed to write OpenSSL config: {}", e))?;
            logger.debug_log(&format!("Using OpenSSL config: {}", config_path.display()));
            logger.debug_log(&format!("Generating CSR: {}", csr_path.display()));

            self.run(
                &[
                    "req",
                    "-new",
                    "-sha256",
                    "-key",
                    path_str(&key_path)?,
                    "-out",
                    path_str(&csr_path)?,
                    "-config",
                    path_str(&config_path)?,
                    "-batch",
                ],
                "Failed to generate CSR",
                logger,
            )?;

            let csr_pem = fs::read_to_string(&csr_path)
                .map_err(|e| format!("Failed to read generated CSR: {}", e))?;
            Ok(CsrArtifacts {
                key_pem: key_pair.private_key_pem().to_string(),
                csr_pem,
            })
        })
        .map_err(CryptoError::SignFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrganizationProfile;
    use crate::csr::{normalize, verification::inspect_request, RequestBuilder};
    use crate::utils::logging::tests::MockLogger;
    use tempfile::TempDir;

    fn openssl_available() -> bool {
        Command::new("openssl")
            .arg("version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn descriptor(fqdn: &str, sans: &str) -> CsrRequestDescriptor {
        let input = normalize(fqdn, sans).unwrap();
        RequestBuilder::new(OrganizationProfile::default()).build(input.fqdn, input.sans)
    }

    fn backend_in(work_root: &TempDir) -> OpensslCliBackend {
        OpensslCliBackend {
            work_root: work_root.path().to_path_buf(),
            ..OpensslCliBackend::new()
        }
    }

    #[test]
    fn missing_executable_is_a_keygen_failure() {
        let backend = OpensslCliBackend::new().with_program("/nonexistent/openssl");
        let err = backend
            .generate_key_pair(2048, &mut MockLogger::new())
            .unwrap_err();
        assert!(matches!(err, CryptoError::KeyGenFailed(ref msg) if msg.contains("Failed to run")));
    }

    #[test]
    fn cli_request_matches_descriptor_and_leaves_no_files() {
        if !openssl_available() {
            eprintln!("openssl executable not found, skipping");
            return;
        }

        let work_root = TempDir::new().unwrap();
        let backend = backend_in(&work_root);
        let descriptor = descriptor("cli.example.edu", "www.cli.example.edu, cli.example.edu");
        let mut logger = MockLogger::new();

        let key_pair = backend
            .generate_key_pair(descriptor.key_bits, &mut logger)
            .unwrap();
        let artifacts = backend
            .sign_request(&descriptor, &key_pair, &mut logger)
            .unwrap();

        let summary = inspect_request(&artifacts.csr_pem).unwrap();
        assert_eq!(
            summary.sans,
            ["cli.example.edu", "www.cli.example.edu", "cli.example.edu"]
        );
        assert!(summary.check_matches(&descriptor).is_ok());

        assert_eq!(fs::read_dir(work_root.path()).unwrap().count(), 0);
        let lines = logger.lines();
        assert!(lines.iter().any(|l| l.starts_with("DEBUG: Using OpenSSL config: ")));
        assert!(lines.iter().all(|l| !l.contains("PRIVATE KEY")));
    }

    #[test]
    fn failing_command_logs_output_and_reports_stderr() {
        if !openssl_available() {
            return;
        }

        let backend = OpensslCliBackend::new();
        let key_pair = KeyPair::new("garbage".to_string(), 2048);
        let mut logger = MockLogger::new();
        let err = backend
            .sign_request(&descriptor("fail.bc.edu", ""), &key_pair, &mut logger)
            .unwrap_err();
        assert!(matches!(err, CryptoError::SignFailed(ref msg) if msg.starts_with("Failed to generate CSR")));

        let lines = logger.lines();
        assert!(lines.contains(&"Failed to generate CSR".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("DEBUG: stdout: ")));
    }

    #[test]
    fn line_breaks_in_names_are_refused_before_running_openssl() {
        // Never reaches the executable, so this holds without openssl installed
        let work_root = TempDir::new().unwrap();
        let backend = backend_in(&work_root).with_program("/nonexistent/openssl");
        let key_pair = KeyPair::new("unused".to_string(), 2048);

        for (fqdn, sans) in [
            ("a.bc.edu", "x.bc.edu\nDNS.9 = evil.com"),
            ("a\nb.bc.edu", ""),
        ] {
            let err = backend
                .sign_request(&descriptor(fqdn, sans), &key_pair, &mut MockLogger::new())
                .unwrap_err();
            assert!(
                matches!(err, CryptoError::SignFailed(ref msg) if msg.contains("control character")),
                "unexpected error: {}",
                err
            );
        }
        assert_eq!(fs::read_dir(work_root.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn staged_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("scratch");
        create_private_dir(&dir).unwrap();
        let key_path = dir.join("private.key");
        write_private(&key_path, "KEY").unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dir), 0o700);
        assert_eq!(mode(&key_path), 0o600);
        assert_eq!(fs::read_to_string(&key_path).unwrap(), "KEY");
    }

    #[test]
    fn config_metacharacters_survive_openssl_req() {
        if !openssl_available() {
            return;
        }

        let profile = OrganizationProfile {
            organization: r#"O'Brien "Labs" #1"#.to_string(),
            organizational_unit: r"Ops $HOME \ Infra".to_string(),
            ..OrganizationProfile::default()
        };
        let input = normalize("meta.bc.edu", "").unwrap();
        let descriptor = RequestBuilder::new(profile).build(input.fqdn, input.sans);

        let work_root = TempDir::new().unwrap();
        let backend = backend_in(&work_root);
        let mut logger = MockLogger::new();
        let key_pair = backend
            .generate_key_pair(descriptor.key_bits, &mut logger)
            .unwrap();
        let artifacts = backend
            .sign_request(&descriptor, &key_pair, &mut logger)
            .unwrap();

        let summary = inspect_request(&artifacts.csr_pem).unwrap();
        assert!(summary
            .subject
            .contains(&("O".to_string(), r#"O'Brien "Labs" #1"#.to_string())));
        assert!(summary
            .subject
            .contains(&("OU".to_string(), r"Ops $HOME \ Infra".to_string())));
        assert!(summary.check_matches(&descriptor).is_ok());
    }
}
