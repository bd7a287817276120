//! Binary entrypoint for the album frame.
//!
//! Wires the cache, engine and control server from the library crate.

use std::path::PathBuf;

use album_frame::config::Configuration;
use album_frame::control;
use album_frame::error::SlideshowError;
use album_frame::render::HeadlessRenderer;
use album_frame::source::GooglePhotosSource;
use album_frame::tasks::cache::CacheStore;
use album_frame::tasks::engine::{EngineOptions, SlideshowEngine};
use album_frame::web;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

#[derive(Debug, Parser)]
#[command(
    name = "album-frame",
    version,
    about = "Kiosk photo frame that mirrors a remote album"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Album to show; overrides `album-id` from the config file
    #[arg(long = "album-id", env = "ALBUM_ID", value_name = "ID")]
    album_id: Option<String>,
    /// Refresh the cache once, print the resulting playlist and exit
    #[arg(long = "refresh-once")]
    refresh_once: bool,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = match verbosity {
                0 => "info",
                1 => "debug",
                _ => "trace",
            };
            EnvFilter::new("info").add_directive(
                format!("album_frame={level}")
                    .parse()
                    .context("invalid log directive")?,
            )
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        album_id,
        refresh_once,
        verbose,
    } = Args::parse();
    init_tracing(verbose)?;

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?;
    if let Some(album_id) = album_id {
        cfg.album_id = album_id;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );

    let source = GooglePhotosSource::new(cfg.source.clone(), cfg.fetch_timeout)
        .context("failed to build photo source client")?;
    let store = CacheStore::new(source, cfg.cache_dir.clone(), cfg.fetch_timeout);

    if refresh_once {
        return run_refresh_once(&store, &cfg).await;
    }

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sigterm.recv() => {
                            tracing::info!("SIGTERM received; initiating shutdown");
                            cancel.cancel();
                        }
                    }
                }
                Err(err) => tracing::warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }

    let (control_handle, mailbox) = control::channel();
    let server = web::spawn(control_handle, cfg.control_bind, cancel.clone());

    tracing::info!(
        album_id = %cfg.album_id,
        refresh_interval = %humantime::format_duration(cfg.refresh_interval),
        slide_delay = %humantime::format_duration(cfg.slide_delay),
        "starting slideshow"
    );
    let engine = SlideshowEngine::start(
        store,
        HeadlessRenderer,
        mailbox,
        EngineOptions {
            album_id: cfg.album_id.clone(),
            timing: cfg.timing(),
            refresh_interval: cfg.refresh_interval,
        },
    )
    .await;

    if let Err(e) = engine.run(cancel.clone()).await.context("slideshow failed") {
        tracing::error!("{e:?}");
    }
    // Ensure the control server is asked to stop
    cancel.cancel();
    if let Err(e) = server.await {
        tracing::error!("join error: {e}");
    }

    Ok(())
}

async fn run_refresh_once(
    store: &CacheStore<GooglePhotosSource>,
    cfg: &Configuration,
) -> Result<()> {
    let snapshot = store
        .refresh(&cfg.album_id)
        .await
        .with_context(|| format!("failed to refresh album {}", cfg.album_id))?;

    println!(
        "# album: {}\n# cache: {}\n# entries: {}\n",
        cfg.album_id,
        store.dir().display(),
        snapshot.len()
    );
    if snapshot.is_empty() {
        return Err(SlideshowError::EmptyPlaylist.into());
    }
    for entry in snapshot.entries() {
        println!(
            "  {:>4}: {:?} {}",
            entry.index,
            entry.media_kind,
            entry.local_path.display()
        );
    }
    Ok(())
}
