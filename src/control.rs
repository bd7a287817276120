//! Operator command mailbox shared by the control server and the engine.
//!
//! Any number of [`ControlHandle`]s submit commands; the single
//! [`ControlMailbox`] owned by the engine drains them in submission order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::events::{ControlCommand, EngineStatus};

/// What the engine last applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackView {
    pub paused: bool,
    pub status: EngineStatus,
    pub position: usize,
    pub playlist_len: usize,
}

/// Point-in-time view for observability; not a queue peek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlSnapshot {
    pub paused: bool,
    pub pending_next: bool,
    pub pending_refresh: bool,
    pub status: EngineStatus,
    pub position: usize,
    pub playlist_len: usize,
}

#[derive(Default)]
struct Shared {
    queued_next: AtomicUsize,
    queued_refresh: AtomicUsize,
    refreshing: AtomicBool,
    view: Mutex<PlaybackView>,
}

impl Shared {
    fn counter(&self, command: ControlCommand) -> Option<&AtomicUsize> {
        match command {
            ControlCommand::SkipNext => Some(&self.queued_next),
            ControlCommand::ForceRefresh => Some(&self.queued_refresh),
            ControlCommand::Pause | ControlCommand::Resume => None,
        }
    }
}

pub fn channel() -> (ControlHandle, ControlMailbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared::default());
    (
        ControlHandle {
            tx,
            shared: Arc::clone(&shared),
        },
        ControlMailbox {
            rx,
            stash: VecDeque::new(),
            shared,
        },
    )
}

#[derive(Clone)]
pub struct ControlHandle {
    tx: UnboundedSender<ControlCommand>,
    shared: Arc<Shared>,
}

impl ControlHandle {
    /// Enqueue a command. Never blocks; the effect is applied later by the engine.
    pub fn submit(&self, command: ControlCommand) {
        let counter = self.shared.counter(command);
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        if self.tx.send(command).is_err() {
            if let Some(counter) = counter {
                counter.fetch_sub(1, Ordering::SeqCst);
            }
            debug!(%command, "engine mailbox closed; command dropped");
        }
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        let view = *self
            .shared
            .view
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        ControlSnapshot {
            paused: view.paused,
            pending_next: self.shared.queued_next.load(Ordering::SeqCst) > 0,
            pending_refresh: self.shared.queued_refresh.load(Ordering::SeqCst) > 0
                || self.shared.refreshing.load(Ordering::SeqCst),
            status: view.status,
            position: view.position,
            playlist_len: view.playlist_len,
        }
    }
}

pub struct ControlMailbox {
    rx: UnboundedReceiver<ControlCommand>,
    stash: VecDeque<ControlCommand>,
    shared: Arc<Shared>,
}

impl ControlMailbox {
    /// Take every command queued so far, oldest first.
    pub fn drain(&mut self) -> Vec<ControlCommand> {
        let mut commands: Vec<ControlCommand> = self.stash.drain(..).collect();
        while let Ok(command) = self.rx.try_recv() {
            commands.push(command);
        }
        for command in &commands {
            if let Some(counter) = self.shared.counter(*command) {
                counter.fetch_sub(1, Ordering::SeqCst);
            }
        }
        commands
    }

    /// Resolve once at least one command is waiting. Cancel-safe.
    ///
    /// Pends forever once every handle is gone; callers race it against shutdown.
    pub async fn wait(&mut self) {
        if !self.stash.is_empty() {
            return;
        }
        match self.rx.recv().await {
            Some(command) => self.stash.push_back(command),
            None => std::future::pending::<()>().await,
        }
    }

    pub fn publish(&self, view: PlaybackView) {
        *self
            .shared
            .view
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = view;
    }

    pub fn set_refreshing(&self, refreshing: bool) {
        self.shared.refreshing.store(refreshing, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn drain_preserves_submission_order() {
        let (handle, mut mailbox) = channel();
        let sequence = [
            ControlCommand::Pause,
            ControlCommand::SkipNext,
            ControlCommand::Resume,
            ControlCommand::ForceRefresh,
            ControlCommand::Pause,
        ];
        for command in sequence {
            handle.submit(command);
        }
        assert_eq!(mailbox.drain(), sequence.to_vec());
        assert!(mailbox.drain().is_empty());
    }

    #[test]
    fn pending_flags_follow_queue() {
        let (handle, mut mailbox) = channel();
        let idle = handle.snapshot();
        assert!(!idle.pending_next && !idle.pending_refresh && !idle.paused);

        handle.submit(ControlCommand::SkipNext);
        handle.submit(ControlCommand::SkipNext);
        handle.submit(ControlCommand::ForceRefresh);
        let queued = handle.snapshot();
        assert!(queued.pending_next);
        assert!(queued.pending_refresh);

        mailbox.drain();
        let drained = handle.snapshot();
        assert!(!drained.pending_next);
        assert!(!drained.pending_refresh);

        mailbox.set_refreshing(true);
        assert!(handle.snapshot().pending_refresh);
        mailbox.set_refreshing(false);
        assert!(!handle.snapshot().pending_refresh);
    }

    #[test]
    fn snapshot_reflects_published_view() {
        let (handle, mailbox) = channel();
        mailbox.publish(PlaybackView {
            paused: true,
            status: EngineStatus::Paused,
            position: 2,
            playlist_len: 5,
        });
        let snap = handle.snapshot();
        assert!(snap.paused);
        assert_eq!(snap.status, EngineStatus::Paused);
        assert_eq!((snap.position, snap.playlist_len), (2, 5));
    }

    #[test]
    fn submit_after_engine_exit_is_harmless() {
        let (handle, mailbox) = channel();
        drop(mailbox);
        handle.submit(ControlCommand::SkipNext);
        assert!(!handle.snapshot().pending_next);
    }

    #[tokio::test]
    async fn wait_keeps_command_for_next_drain() {
        let (handle, mut mailbox) = channel();
        let submitter = {
            let handle = handle.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                handle.submit(ControlCommand::Resume);
                handle.submit(ControlCommand::SkipNext);
            })
        };
        tokio::time::timeout(Duration::from_secs(2), mailbox.wait())
            .await
            .expect("wait should resolve once a command arrives");
        submitter.await.unwrap();
        assert_eq!(
            mailbox.drain(),
            vec![ControlCommand::Resume, ControlCommand::SkipNext]
        );
    }
}
