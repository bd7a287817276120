#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use album_frame::error::SourceError;
use album_frame::events::{CacheEntry, MediaKind, PhotoDescriptor};
use album_frame::render::{Renderer, TimingBudget};
use album_frame::source::PhotoSource;

/// In-memory album with switchable failures and call counters.
///
/// Clones share state, so a test can keep a handle after moving one into a store.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<FakeState>,
}

#[derive(Default)]
struct FakeState {
    items: Mutex<Vec<PhotoDescriptor>>,
    failing: Mutex<HashSet<String>>,
    slow: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    list_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_items(items: Vec<PhotoDescriptor>) -> Self {
        let source = Self::default();
        source.set_items(items);
        source
    }

    pub fn unavailable() -> Self {
        let source = Self::default();
        source.set_unavailable(true);
        source
    }

    pub fn set_items(&self, items: Vec<PhotoDescriptor>) {
        *self.state.items.lock().unwrap() = items;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn fail_url(&self, url: &str) {
        self.state.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn stall_url(&self, url: &str) {
        self.state.slow.lock().unwrap().insert(url.to_string());
    }

    pub fn fetches(&self) -> usize {
        self.state.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn listings(&self) -> usize {
        self.state.list_calls.load(Ordering::SeqCst)
    }
}

impl PhotoSource for FakeSource {
    async fn list_album(&self, album_id: &str) -> Result<Vec<PhotoDescriptor>, SourceError> {
        self.state.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::Request {
                url: format!("fake://albums/{album_id}"),
                message: "connection refused".to_string(),
            });
        }
        let items = self.state.items.lock().unwrap().clone();
        Ok(items)
    }

    async fn fetch(&self, descriptor: &PhotoDescriptor) -> Result<Vec<u8>, SourceError> {
        self.state.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let url = descriptor.remote_url.clone();
        let stalled = self.state.slow.lock().unwrap().contains(&url);
        if stalled {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        let failing = self.state.failing.lock().unwrap().contains(&url);
        if failing {
            return Err(SourceError::Status { url, status: 500 });
        }
        Ok(url.into_bytes())
    }
}

pub fn still(url: &str) -> PhotoDescriptor {
    PhotoDescriptor {
        remote_url: url.to_string(),
        media_kind: MediaKind::StaticImage,
    }
}

pub fn animated(url: &str) -> PhotoDescriptor {
    PhotoDescriptor {
        remote_url: url.to_string(),
        media_kind: MediaKind::AnimatedImage,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    Entry { index: usize, budget: TimingBudget },
    Placeholder,
}

/// Records every call instead of drawing; optionally fails on chosen indices.
///
/// Each show holds for a couple of milliseconds so a running engine yields.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    pub shown: Arc<Mutex<Vec<Shown>>>,
    pub fail_indices: Arc<Mutex<HashSet<usize>>>,
}

impl RecordingRenderer {
    pub fn calls(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    pub fn rendered_indices(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Entry { index, .. } => Some(index),
                Shown::Placeholder => None,
            })
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    async fn show(&mut self, entry: &CacheEntry, budget: TimingBudget) -> anyhow::Result<()> {
        self.shown.lock().unwrap().push(Shown::Entry {
            index: entry.index,
            budget,
        });
        tokio::time::sleep(Duration::from_millis(2)).await;
        let fail = self.fail_indices.lock().unwrap().contains(&entry.index);
        if fail {
            anyhow::bail!("cannot decode {}", entry.local_path.display());
        }
        Ok(())
    }

    async fn show_placeholder(&mut self) {
        self.shown.lock().unwrap().push(Shown::Placeholder);
    }
}
