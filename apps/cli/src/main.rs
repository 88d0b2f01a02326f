use std::sync::{Arc, Mutex};

use clap::Parser;
use colored::Colorize;
use espota_core::events::{OtaEvent, OtaObserver};
use espota_core::session::{OtaSession, SessionConfig};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;

#[derive(Parser, Debug)]
#[command(author, version, about = "Over-the-air firmware uploader for ESP devices", long_about = None)]
struct Args {
    /// Host of the device (IP address or resolvable name)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// TCP port the device listens on
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Password for over-the-air authentication
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Path to the firmware binary (e.g. .pio/build/<env>/firmware.bin)
    #[arg(short = 'f', long)]
    file: Option<String>,

    /// Load session defaults from a TOML config file; explicit flags win
    #[arg(long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn build_config(args: &Args) -> anyhow::Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(password) = &args.password {
        config.password = Some(password.clone());
    }
    if let Some(file) = &args.file {
        config.image_path = file.clone();
    }
    if config.host.is_empty() {
        anyhow::bail!("no target host given (use --host or a config file)");
    }
    if config.image_path.is_empty() {
        anyhow::bail!("no firmware file given (use --file or a config file)");
    }
    Ok(config)
}

/// Renders transfer progress as a terminal bar.
struct ProgressBarObserver {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressBarObserver {
    fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn clear_bar(&self) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}

impl OtaObserver for ProgressBarObserver {
    fn on_event(&self, event: &OtaEvent) {
        match event {
            OtaEvent::PhaseChanged { .. } => {}
            OtaEvent::Progress { sent, total } => {
                let mut guard = self.bar.lock().unwrap();
                let bar = guard.get_or_insert_with(|| {
                    let bar = ProgressBar::new(*total);
                    bar.set_style(
                        ProgressStyle::default_bar()
                            .template(
                                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes}",
                            )
                            .unwrap()
                            .progress_chars("#>-"),
                    );
                    bar
                });
                bar.set_position(*sent);
            }
            OtaEvent::Complete => {
                self.clear_bar();
                eprintln!("{} OTA successful", "✓".green());
            }
        }
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {e}");
            std::process::exit(1);
        }
    };

    let observer = Arc::new(ProgressBarObserver::new());
    let session = OtaSession::with_observer(config, observer.clone());
    if let Err(e) = session.run() {
        observer.clear_bar();
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
