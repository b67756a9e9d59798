// src/main.rs
mod app;
mod backend;
mod config;
mod csr;
mod utils;
mod web;

use app::{write_artifacts, CsrGenerator};
use backend::BackendKind;
use config::{default_profile_path, OrganizationProfile};
use utils::logging::LogSettings;

use clap::Parser;
use std::{
    io::{self, BufRead, Write},
    sync::{Arc, RwLock},
};
use web::WebServerState;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate an RSA private key and a PKCS#10 CSR", long_about = None)]
pub struct Args {
    /// Fully qualified domain name, used as the common name and first SAN
    #[arg(short, long)]
    pub fqdn: Option<String>,

    /// Additional host names, comma separated
    #[arg(short, long)]
    pub sans: Option<String>,

    /// Directory for the .key and .csr files
    #[arg(short, long, default_value = ".")]
    pub out_dir: String,

    /// Organization profile (JSON or YAML)
    #[arg(long)]
    pub profile: Option<String>,

    /// Write the built-in organization profile to --profile (or the default location) and exit
    #[arg(long)]
    pub init_profile: bool,

    #[arg(short, long, value_enum, default_value_t = BackendKind::Native)]
    pub backend: BackendKind,

    /// OpenSSL executable used by the cli backend
    #[arg(long, default_value = "openssl")]
    pub openssl: String,

    /// Print both PEMs to stdout instead of writing files
    #[arg(long)]
    pub print: bool,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,

    #[arg(short, long)]
    pub debug: bool,

    #[arg(long)]
    pub log_file: Option<String>,

    /// Serve the web form and JSON API instead of generating once
    #[arg(long)]
    pub serve: bool,

    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Open the web form in a browser once the server is up
    #[arg(long)]
    pub open: bool,
}

fn prompt(message: &str) -> io::Result<String> {
    eprint!("{}", message);
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// FQDN and SAN text from the flags, prompting for whatever is missing.
fn request_input(args: &Args) -> io::Result<(String, String)> {
    match &args.fqdn {
        Some(fqdn) => Ok((fqdn.clone(), args.sans.clone().unwrap_or_default())),
        None => {
            let fqdn = prompt("Enter the FQDN for the certificate: ")?;
            let sans = match &args.sans {
                Some(sans) => sans.clone(),
                None => prompt("Enter additional host names (comma separated, optional): ")?,
            };
            Ok((fqdn, sans))
        }
    }
}

fn init_profile(args: &Args) -> io::Result<()> {
    let path = match &args.profile {
        Some(path) => path.clone(),
        None => default_profile_path()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    "No configuration directory found, pass --profile",
                )
            })?
            .to_string_lossy()
            .to_string(),
    };

    OrganizationProfile::default().save_to_file(&path)?;
    eprintln!("Wrote organization profile to {}", path);
    Ok(())
}

async fn generate_once(
    args: &Args,
    profile: OrganizationProfile,
    log_settings: LogSettings,
) -> io::Result<()> {
    let (fqdn, sans) = request_input(args)?;
    let backend = args.backend.create(&args.openssl);
    let out_dir = args.out_dir.clone();
    let print = args.print;
    let force = args.force;

    // Key generation blocks, keep it off the runtime threads
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let mut generator = CsrGenerator::new(log_settings.build_logger(), profile, backend);
        let generated = generator.generate(&fqdn, &sans)?;

        if print {
            let mut stdout = io::stdout().lock();
            stdout.write_all(generated.key_pem.as_bytes())?;
            stdout.write_all(generated.csr_pem.as_bytes())?;
            generator.log(&format!(
                "Printed {} and {} to stdout",
                generated.key_filename, generated.csr_filename
            ));
        } else {
            let files = write_artifacts(&generated, &out_dir, force, generator.logger_mut())?;
            println!("{}", files.key_path.display());
            println!("{}", files.csr_path.display());
        }
        Ok(())
    })
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

async fn serve(args: &Args, profile: OrganizationProfile, log_settings: LogSettings) -> io::Result<()> {
    let web_state = Arc::new(RwLock::new(WebServerState::new(
        Some(args.port),
        profile,
        args.backend,
        args.openssl.clone(),
        log_settings,
    )));

    // Create shutdown channel and spawn web server
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let web_state_clone = Arc::clone(&web_state);
    let web_server = tokio::spawn(async move {
        web::start_web_server(web_state_clone, shutdown_rx).await;
    });

    if args.open {
        let url = format!("http://localhost:{}/", args.port);
        if let Err(e) = open::that(&url) {
            eprintln!("Failed to open {}: {}", url, e);
        }
    }

    tokio::signal::ctrl_c().await?;

    // Send shutdown signal to web server
    let _ = shutdown_tx.send(());

    // Wait for web server to shutdown
    let _ = web_server.await;
    Ok(())
}

#[tokio::main]
async fn main() -> io::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if args.init_profile {
        return init_profile(&args);
    }

    let log_settings = LogSettings {
        log_file: args.log_file.clone(),
        debug: args.debug,
        stderr: true,
    };
    let profile = OrganizationProfile::resolve(args.profile.as_deref())?;

    let res = if args.serve {
        serve(&args, profile, log_settings).await
    } else {
        generate_once(&args, profile, log_settings).await
    };

    // Handle any errors that occurred during execution
    if let Err(err) = res {
        eprintln!("Error: {}", err);
        return Err(err);
    }

    Ok(())
}
