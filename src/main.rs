//! CLI entry point: `list` enumerates validated removable devices, `wipe`
//! drives the orchestrator end to end and issues a signed certificate.
//!
//! Grounded on the teacher's `main.rs` bootstrap shape (config resolution,
//! then dispatch into the engine), generalized from an `eframe` GUI launch
//! into a `clap`-derive CLI dispatch loop in the style of
//! `ahadullabaig-sayonara`'s and `Sameer83-max-Oblivion`'s binaries.

use std::io::Write;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ecowipe::certificate;
use ecowipe::config::AppConfig;
use ecowipe::crypto::Signer;
use ecowipe::device;
use ecowipe::error::WipeError;
use ecowipe::orchestrator::{self, CancellationToken};
use ecowipe::validation::{validate_device_path, validate_operator_name};

#[cfg(windows)]
use ecowipe::io::WindowsHandle as PlatformHandle;
#[cfg(unix)]
use ecowipe::io::UnixHandle as PlatformHandle;

#[derive(Parser)]
#[command(name = "ecowipe")]
#[command(about = "Forensic-grade, operator-supervised disk sanitization tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file overriding key/certificate/log directories
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List validated removable devices eligible for sanitization
    List,

    /// Sanitize a removable device and issue a signed certificate
    Wipe {
        /// Platform device path, e.g. \\.\PhysicalDrive1 or /dev/sdb
        #[arg(long)]
        device: String,

        /// Operator name recorded on the certificate
        #[arg(long)]
        operator: String,

        /// Sanitization standard: a name containing "DoD"/"3-Pass", "Random", or anything else (zero-fill)
        #[arg(long, default_value = "DoD 5220.22-M")]
        standard: String,

        /// Skip the interactive confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Maps each error kind in the taxonomy to a distinct process exit code so
/// scripts driving this tool can distinguish failure classes without
/// parsing the message text.
fn exit_code_for(error: &WipeError) -> u8 {
    match error {
        WipeError::InvalidInput(_) => 2,
        WipeError::SecurityViolation(_) => 3,
        WipeError::DeviceValidation(_) => 4,
        WipeError::SystemDriveFailSafe(_) => 5,
        WipeError::WipeEngine(_) => 6,
        WipeError::StateMachine(_) => 7,
        WipeError::Certificate(_) => 8,
        WipeError::Configuration(_) => 9,
    }
}

fn run() -> Result<(), WipeError> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    config.ensure_directories()?;

    match cli.command {
        Commands::List => run_list(),
        Commands::Wipe { device, operator, standard, yes } => run_wipe(&device, &operator, &standard, yes, &config),
    }
}

fn run_list() -> Result<(), WipeError> {
    let devices = device::list_valid_removable()?;

    if devices.is_empty() {
        println!("No validated removable devices found.");
        return Ok(());
    }

    for d in devices {
        println!(
            "{}\t{}\t{}\t{:.2} GB\t{}",
            d.device_id, d.model, d.serial_number, d.size_gb(), d.interface_type
        );
    }
    Ok(())
}

fn run_wipe(device_id: &str, operator: &str, standard: &str, skip_confirm: bool, config: &AppConfig) -> Result<(), WipeError> {
    // Fail fast on syntactically bad input before ever touching the state
    // machine or spawning the worker thread.
    validate_device_path(device_id)?;
    validate_operator_name(operator)?;

    let validated = device::validate_for_wipe(device_id)?;

    if !skip_confirm {
        print!(
            "About to irreversibly sanitize {} ({}, {:.2} GB, serial {}) using \"{standard}\". Type YES to continue: ",
            validated.device_id, validated.model, validated.size_gb(), validated.serial_number
        );
        std::io::stdout().flush().ok();
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer).ok();
        if answer.trim() != "YES" {
            println!("Aborted by operator.");
            return Ok(());
        }
    }

    let (tx, rx) = mpsc::channel();
    let cancellation = CancellationToken::new();

    let ctrlc_cancellation = cancellation.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("cancellation requested, will abort at next block boundary");
        ctrlc_cancellation.cancel();
    })
    .map_err(|e| WipeError::wipe_engine(format!("failed to install Ctrl-C handler: {e}")))?;

    let worker_config = config.clone();
    let worker_device = device_id.to_string();
    let worker_standard = standard.to_string();
    let worker_operator = operator.to_string();
    let worker_cancellation = cancellation.clone();

    let handle = thread::spawn(move || {
        orchestrator::run_wipe::<PlatformHandle>(
            &worker_device,
            &worker_standard,
            &worker_operator,
            &worker_config,
            worker_cancellation,
            tx,
        )
    });

    for event in rx {
        println!("[{:>3}%] {}", event.percent, event.message);
    }

    let outcome = handle.join().map_err(|_| WipeError::wipe_engine("wipe worker thread panicked"))??;

    let signer = Signer::load_or_generate(&config.key_dir)?;
    let generated = certificate::generate_certificate(&outcome, &signer, &config.certificate_dir)?;

    println!("Wipe completed successfully.");
    println!("Certificate: {}", generated.json_path.display());
    println!("QR code:     {}", generated.qr_path.display());

    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}
