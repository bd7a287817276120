use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::TimingOptions;
use crate::control::{ControlMailbox, PlaybackView};
use crate::error::{CacheError, SlideshowError};
use crate::events::{ControlCommand, EngineStatus};
use crate::playlist::{Playlist, PlaylistSnapshot};
use crate::render::Renderer;
use crate::source::PhotoSource;
use crate::tasks::cache::CacheStore;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub album_id: String,
    pub timing: TimingOptions,
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Rendered { index: usize },
    RenderFailed { index: usize },
    /// A refresh ran this tick; rendering resumes on the next one.
    Refreshed,
    Paused,
    Empty,
}

#[derive(Debug, Clone, Copy)]
enum RefreshReason {
    Requested,
    Interval,
}

/// Owns playback: the installed playlist, the pause flag and the refresh clock.
///
/// Rules:
/// - Every tick first drains the mailbox and applies commands in submission order.
/// - A refresh (requested or due) replaces the snapshot wholesale and skips rendering for that tick.
/// - Only a playing engine with a non-empty playlist renders, then advances by one.
/// - A failed refresh keeps the current snapshot.
/// - An entry that fails to render is evicted and dropped from the snapshot.
pub struct SlideshowEngine<S, R> {
    store: CacheStore<S>,
    renderer: R,
    mailbox: ControlMailbox,
    options: EngineOptions,
    playlist: Playlist,
    paused: bool,
    next_refresh: Instant,
    placeholder_shown: bool,
}

impl<S: PhotoSource, R: Renderer> SlideshowEngine<S, R> {
    /// Pick the best available playlist: the live album, else whatever is on disk.
    #[instrument(skip_all, fields(album_id = %options.album_id))]
    pub async fn start(
        store: CacheStore<S>,
        renderer: R,
        mailbox: ControlMailbox,
        options: EngineOptions,
    ) -> Self {
        let snapshot = match store.refresh(&options.album_id).await {
            Ok(snapshot) => snapshot,
            Err(err @ CacheError::SourceUnavailable { .. }) => {
                warn!(
                    error = %err,
                    cause = ?cause(&err),
                    "album refresh failed at startup; using cached photos"
                );
                store.load_existing()
            }
            Err(err) => {
                error!(
                    error = %err,
                    cause = ?cause(&err),
                    "cache unusable at startup; waiting for a refresh"
                );
                PlaylistSnapshot::default()
            }
        };

        let mut engine = Self {
            next_refresh: Instant::now() + options.refresh_interval,
            store,
            renderer,
            mailbox,
            options,
            playlist: Playlist::new(snapshot),
            paused: false,
            placeholder_shown: false,
        };

        if engine.playlist.is_empty() {
            error!(
                error = %SlideshowError::EmptyPlaylist,
                "nothing to show; waiting for a refresh"
            );
            engine.show_placeholder().await;
        } else {
            info!(entries = engine.playlist.len(), "slideshow ready");
        }
        engine.publish();
        engine
    }

    pub fn status(&self) -> EngineStatus {
        if self.playlist.is_empty() {
            EngineStatus::Empty
        } else if self.paused {
            EngineStatus::Paused
        } else {
            EngineStatus::Playing
        }
    }

    pub fn position(&self) -> usize {
        self.playlist.position()
    }

    pub fn playlist(&self) -> &PlaylistSnapshot {
        self.playlist.snapshot()
    }

    pub fn store(&self) -> &CacheStore<S> {
        &self.store
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// One iteration: drain commands, maybe refresh, maybe render.
    pub async fn tick(&mut self) -> TickOutcome {
        let mut refreshed = false;
        for command in self.mailbox.drain() {
            debug!(%command, "applying control command");
            match command {
                ControlCommand::Pause => {
                    if !self.paused {
                        info!("slideshow paused");
                    }
                    self.paused = true;
                }
                ControlCommand::Resume => {
                    if self.paused {
                        info!("slideshow resumed");
                    }
                    self.paused = false;
                }
                ControlCommand::SkipNext => {
                    self.playlist.advance();
                    debug!(position = self.playlist.position(), "skipped ahead");
                }
                ControlCommand::ForceRefresh => {
                    if refreshed {
                        debug!("refresh already ran this tick; coalescing");
                    } else {
                        self.refresh(RefreshReason::Requested).await;
                        refreshed = true;
                    }
                }
            }
        }

        if !refreshed && Instant::now() >= self.next_refresh {
            self.refresh(RefreshReason::Interval).await;
            refreshed = true;
        }

        let outcome = if refreshed {
            TickOutcome::Refreshed
        } else if self.paused {
            TickOutcome::Paused
        } else {
            self.render_current().await
        };
        self.publish();
        outcome
    }

    /// Drive ticks until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!(album_id = %self.options.album_id, status = ?self.status(), "slideshow engine running");
        loop {
            if self.is_idle() {
                // Nothing to render: sleep until a command arrives or a refresh is due.
                let due = self.next_refresh;
                select! {
                    _ = cancel.cancelled() => break,
                    _ = self.mailbox.wait() => {}
                    _ = sleep_until(due) => {}
                }
            }

            select! {
                _ = cancel.cancelled() => break,
                outcome = self.tick() => trace!(?outcome, "tick"),
            }
        }
        info!("cancel received; slideshow engine stopped");
        Ok(())
    }

    fn is_idle(&self) -> bool {
        self.paused || self.playlist.is_empty()
    }

    async fn render_current(&mut self) -> TickOutcome {
        let entry = match self.playlist.current() {
            Ok(entry) => entry.clone(),
            Err(SlideshowError::EmptyPlaylist) => return TickOutcome::Empty,
        };
        let budget = self.options.timing.budget_for(entry.media_kind);

        match self.renderer.show(&entry, budget).await {
            Ok(()) => {
                self.playlist.advance();
                TickOutcome::Rendered { index: entry.index }
            }
            Err(err) => {
                warn!(
                    index = entry.index,
                    path = %entry.local_path.display(),
                    error = ?err,
                    "render failed; evicting from cache"
                );
                if let Err(err) = self.store.evict(&entry) {
                    warn!(error = %err, "evict failed");
                }
                // The file is gone, so the entry leaves the playlist until a refresh restores it.
                self.playlist.remove_current();
                if self.playlist.is_empty() {
                    error!(
                        error = %SlideshowError::EmptyPlaylist,
                        "no renderable photos left; waiting for a refresh"
                    );
                    self.show_placeholder().await;
                }
                TickOutcome::RenderFailed { index: entry.index }
            }
        }
    }

    async fn refresh(&mut self, reason: RefreshReason) {
        self.mailbox.set_refreshing(true);
        let before = self.playlist.len();
        match self.store.refresh(&self.options.album_id).await {
            Ok(snapshot) => {
                self.playlist.install(snapshot);
                info!(
                    reason = ?reason,
                    before,
                    after = self.playlist.len(),
                    position = self.playlist.position(),
                    "playlist replaced"
                );
                if self.playlist.is_empty() {
                    self.show_placeholder().await;
                } else {
                    self.placeholder_shown = false;
                }
            }
            Err(err) => {
                warn!(
                    reason = ?reason,
                    error = %err,
                    cause = ?cause(&err),
                    entries = before,
                    "refresh failed; keeping current playlist"
                );
            }
        }
        // Measured from the attempt, so a dead source is retried once per interval.
        self.next_refresh = Instant::now() + self.options.refresh_interval;
        self.mailbox.set_refreshing(false);
    }

    async fn show_placeholder(&mut self) {
        if !self.placeholder_shown {
            self.renderer.show_placeholder().await;
            self.placeholder_shown = true;
        }
    }

    fn publish(&self) {
        self.mailbox.publish(PlaybackView {
            paused: self.paused,
            status: self.status(),
            position: self.playlist.position(),
            playlist_len: self.playlist.len(),
        });
    }
}

fn cause(err: &dyn std::error::Error) -> Option<String> {
    err.source().map(ToString::to_string)
}
