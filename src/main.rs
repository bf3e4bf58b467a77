#![forbid(unsafe_code)]

mod bootstrap;
mod config;
mod constants;
mod events;
mod modules;
mod paths;
mod probe;
mod registry;
mod service;
mod session;
mod subsystems;

use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use tracing::{Level as TraceLevel, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use bootstrap::{Bootstrap, Collaborators, StartupOptions};
use events::EventBus;
use modules::FsModuleLoader;
use paths::AppPaths;
use probe::{DisplayGeometry, HostProbe, parse_display_size};
use registry::CreationNotifications;
use subsystems::{HeadlessAudio, HeadlessVideo};

/// Bring the studio from process start to ready, upgrading old configuration on the way
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Profile to start with (falls back to the last used one)
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,

    /// Scene collection to start with (falls back to the last used one)
    #[arg(long, value_name = "NAME")]
    collection: Option<String>,

    /// Only load core modules
    #[arg(long)]
    safe_mode: bool,

    /// Only load modules bundled with the application
    #[arg(long = "disable-3p-plugins")]
    disable_third_party: bool,

    /// Keep configuration next to the executable
    #[arg(long)]
    portable: bool,

    /// Configuration root (overrides portable mode)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Directory holding bundled module manifests
    #[arg(long, value_name = "DIR")]
    module_dir: Option<PathBuf>,

    /// Primary display size, e.g. 2560x1440
    #[arg(long, value_name = "WxH", default_value = "1920x1080")]
    display: String,

    #[arg(long, value_name = "F", default_value_t = 1.0)]
    device_pixel_ratio: f64,

    /// Announce freshly created profiles and collections too
    #[arg(long)]
    announce_created: bool,

    /// trace, debug, info, warn or error (overrides LOG_LEVEL)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let (width, height) = parse_display_size(&cli.display)
        .ok_or_else(|| anyhow!("Invalid display size '{}', expected WxH", cli.display))?;
    let display = DisplayGeometry {
        width,
        height,
        device_pixel_ratio: cli.device_pixel_ratio,
    };

    let paths = AppPaths::resolve(cli.config_dir.clone(), cli.module_dir.clone(), cli.portable)?;
    let options = StartupOptions {
        profile: cli.profile.clone(),
        collection: cli.collection.clone(),
        safe_mode: cli.safe_mode,
        disable_third_party: cli.disable_third_party,
        creation_notifications: if cli.announce_created {
            CreationNotifications::Emit
        } else {
            CreationNotifications::Suppress
        },
    };
    if options.safe_mode {
        info!("Safe mode enabled, third-party modules will not load");
    }

    let probe = HostProbe::detect(Some(display));
    let mut video = HeadlessVideo::new();
    let mut audio = HeadlessAudio::new();
    let mut loader = FsModuleLoader::new();
    let mut events = EventBus::new();
    let lifecycle = events.subscribe();

    let outcome = Bootstrap::new(&paths, options).and_then(|bootstrap| {
        bootstrap.run(Collaborators {
            probe: &probe,
            video: &mut video,
            audio: &mut audio,
            loader: &mut loader,
            events: &mut events,
        })
    });

    for event in lifecycle.try_iter() {
        debug!(event = ?event, "Lifecycle event");
    }

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Startup aborted");
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    };

    if let Some(profile) = &outcome.session.profile {
        info!(profile = %profile.name(), "Active profile");
    }
    if let Some(collection) = &outcome.session.collection {
        info!(collection = %collection.name(), "Active scene collection");
    }
    info!(service = %outcome.service.kind, modules = outcome.modules.loaded.len(), "Ready");

    if !outcome.failed_modules().is_empty() {
        warn!(modules = ?outcome.failed_modules(), "Some modules failed to load");
        println!("The following modules failed to load:");
        for id in outcome.failed_modules() {
            println!("  {id}");
        }
    }
    if outcome.should_run_auto_config {
        println!("First launch detected: run the auto-configuration wizard to tune your settings.");
    }

    outcome.session.save()?;
    Ok(())
}
