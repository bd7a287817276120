use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

use crate::events::MediaKind;
use crate::render::TimingBudget;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Remote album to mirror.
    pub album_id: String,
    /// Directory holding one file per cached photo.
    pub cache_dir: PathBuf,
    /// How long a still image stays on screen.
    #[serde(with = "humantime_serde")]
    pub slide_delay: Duration,
    /// Number of times an animated image plays through before advancing.
    pub animated_loops: u32,
    /// Delay between animation frames.
    #[serde(with = "humantime_serde")]
    pub animated_frame_interval: Duration,
    /// Wall-clock interval between automatic album refreshes.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// Upper bound for album enumeration and for each item download.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// Listen address of the control API.
    pub control_bind: SocketAddr,
    pub source: SourceOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.album_id.trim().is_empty(),
            "album-id must be set (config file, --album-id or ALBUM_ID)"
        );
        ensure!(
            !self.slide_delay.is_zero(),
            "slide-delay must be greater than zero"
        );
        ensure!(self.animated_loops >= 1, "animated-loops must be >= 1");
        ensure!(
            !self.animated_frame_interval.is_zero(),
            "animated-frame-interval must be greater than zero"
        );
        ensure!(
            !self.refresh_interval.is_zero(),
            "refresh-interval must be greater than zero"
        );
        ensure!(
            !self.fetch_timeout.is_zero(),
            "fetch-timeout must be greater than zero"
        );
        self.source.validate()?;
        Ok(self)
    }

    pub fn timing(&self) -> TimingOptions {
        TimingOptions {
            slide_delay: self.slide_delay,
            animated_loops: self.animated_loops,
            animated_frame_interval: self.animated_frame_interval,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            album_id: String::new(),
            cache_dir: PathBuf::from("cache"),
            slide_delay: Duration::from_secs(5),
            animated_loops: 2,
            animated_frame_interval: Duration::from_millis(66),
            refresh_interval: Duration::from_secs(10 * 60),
            fetch_timeout: Duration::from_secs(30),
            control_bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            source: SourceOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SourceOptions {
    /// Base URL of the Photos Library API.
    pub api_base: String,
    /// JSON file written by the OAuth helper; its `token` field is the bearer token.
    pub token_path: PathBuf,
    pub page_size: u32,
    /// Size hint requested for still images.
    pub max_width: u32,
    pub max_height: u32,
}

impl SourceOptions {
    const MAX_PAGE_SIZE: u32 = 100;

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.api_base.trim().is_empty(),
            "source.api-base must not be empty"
        );
        ensure!(
            (1..=Self::MAX_PAGE_SIZE).contains(&self.page_size),
            "source.page-size must be between 1 and {}",
            Self::MAX_PAGE_SIZE
        );
        ensure!(
            self.max_width > 0 && self.max_height > 0,
            "source.max-width and source.max-height must be positive"
        );
        Ok(())
    }
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            api_base: "https://photoslibrary.googleapis.com/v1".to_string(),
            token_path: PathBuf::from("token.json"),
            page_size: 50,
            max_width: 800,
            max_height: 600,
        }
    }
}

/// Per-kind display timing handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingOptions {
    pub slide_delay: Duration,
    pub animated_loops: u32,
    pub animated_frame_interval: Duration,
}

impl TimingOptions {
    pub fn budget_for(&self, kind: MediaKind) -> TimingBudget {
        match kind {
            MediaKind::StaticImage => TimingBudget::Still(self.slide_delay),
            MediaKind::AnimatedImage => TimingBudget::Animated {
                loops: self.animated_loops,
                frame_interval: self.animated_frame_interval,
            },
        }
    }
}

impl Default for TimingOptions {
    fn default() -> Self {
        Configuration::default().timing()
    }
}
