//! Announcement Notifier CLI
//!
//! Watches the configured pages and relays new or edited announcements.

use std::fs::OpenOptions;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use notifier::{
    channels,
    error::{AppError, Result},
    models::{Config, LoggingConfig},
    pipeline::{Dispatcher, PollLoop},
    services::{
        HttpFetcher, PageDocument, RetryPolicy, extract, fetch_with_retry, fingerprint_region,
    },
    storage::{LocalStorage, MemoryStorage, StateStore},
    utils::http,
};

/// Faculty announcement notifier
#[derive(Parser, Debug)]
#[command(
    name = "notifier",
    version,
    about = "Relays faculty announcements to Telegram and Discord"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "notifier.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the sources until interrupted
    Run,

    /// Fetch every source once and show what would be relayed
    Check,

    /// Validate configuration
    Validate,

    /// Show saved state
    Info,
}

/// Initialize logging from the verbosity flag and logging settings.
fn init_logging(verbose: bool, config: &LoggingConfig) -> Result<()> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format_timestamp_secs();

    if let Some(path) = &config.file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn open_store(config: &Config) -> Box<dyn StateStore> {
    match &config.storage.state_path {
        Some(path) => Box::new(LocalStorage::new(path)),
        None => Box::new(MemoryStorage::new()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let loaded = Config::load_optional(&cli.config);
    let mut config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => Config::default(),
    };
    config.apply_env();
    init_logging(cli.verbose, &config.logging)?;

    match loaded {
        Ok(Some(_)) => log::info!("Loaded configuration from {}", cli.config.display()),
        Ok(None) => log::warn!(
            "{} not found, using default sources and environment settings",
            cli.config.display()
        ),
        Err(e) => {
            log::error!("Cannot load {}: {}", cli.config.display(), e);
            return Err(e);
        }
    }

    match cli.command {
        Command::Run => {
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            if config.storage.state_path.is_none() {
                log::warn!("No state_path configured, state is lost on restart");
            }

            let client = http::create_client(&config.fetch)?;
            let dispatcher = Dispatcher::new(channels::build_channels(&config.channels, &client)?);
            log::info!("Relaying to {}", dispatcher.channel_names().join(", "));

            let mut poll = PollLoop::new(
                &config,
                Box::new(HttpFetcher::new(client)),
                dispatcher,
                open_store(&config),
            );
            poll.init().await?;
            poll.run(shutdown_signal()).await?;
        }

        Command::Check => {
            config.validate_sources()?;
            let fetcher = HttpFetcher::from_config(&config.fetch)?;
            let policy = RetryPolicy::from_config(&config.fetch);

            for source in &config.sources {
                let body = fetch_with_retry(&fetcher, &source.url, &policy).await?;
                let document = PageDocument::parse(&source.url, &body)?;

                match fingerprint_region(&document, &source.region)? {
                    Some(fingerprint) => log::info!("{}: fingerprint {}", source.id, fingerprint),
                    None => log::warn!("{}: nothing matches '{}'", source.id, source.region),
                }
                match extract(source, &document) {
                    Ok(announcement) => {
                        log::info!("{}: title \"{}\"", source.id, announcement.title.plain);
                        log::info!(
                            "{}: body of {} characters",
                            source.id,
                            announcement.body.plain.chars().count()
                        );
                        for image in &announcement.images {
                            log::info!("{}: image {}", source.id, image);
                        }
                    }
                    Err(e) => log::warn!("{}", e),
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} sources, channels: {})",
                config.sources.len(),
                [
                    config.channels.telegram.as_ref().map(|_| "telegram"),
                    config.channels.discord.as_ref().map(|_| "discord"),
                ]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(", ")
            );
        }

        Command::Info => {
            let Some(path) = &config.storage.state_path else {
                return Err(AppError::config(
                    "No state_path configured, nothing is saved between runs",
                ));
            };
            let snapshot = LocalStorage::new(path).load().await?;
            log::info!("State file: {}", path.display());
            if let Some(updated) = snapshot.updated_at {
                log::info!("Last updated: {}", updated);
            }
            for source in &config.sources {
                match snapshot.get(&source.id) {
                    Some(state) => {
                        log::info!(
                            "{}: fingerprint {}",
                            source.id,
                            state.last_fingerprint.as_deref().unwrap_or("(none)")
                        );
                        if !state.last_title.is_empty() {
                            log::info!("{}: last relayed \"{}\"", source.id, state.last_title);
                        }
                        for (channel, handle) in &state.handles {
                            log::info!("{}: {} message {}", source.id, channel, handle);
                        }
                    }
                    None => log::info!("{}: no state yet", source.id),
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
