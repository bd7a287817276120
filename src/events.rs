use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ControlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    StaticImage,
    AnimatedImage,
}

impl MediaKind {
    /// Extension used for the cached file; also what the renderer dispatches on.
    pub fn extension(self) -> &'static str {
        match self {
            Self::StaticImage => "jpg",
            Self::AnimatedImage => "gif",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" => Some(Self::StaticImage),
            "gif" => Some(Self::AnimatedImage),
            _ => None,
        }
    }
}

/// One remote media item as enumerated by the photo source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoDescriptor {
    pub remote_url: String,
    pub media_kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub index: usize,
    pub local_path: PathBuf,
    pub media_kind: MediaKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    SkipNext,
    ForceRefresh,
}

impl ControlCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::SkipNext => "next",
            Self::ForceRefresh => "refresh",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlCommand {
    type Err = ControlError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "next" => Ok(Self::SkipNext),
            "refresh" => Ok(Self::ForceRefresh),
            _ => Err(ControlError::InvalidCommand(raw.to_string())),
        }
    }
}

/// Coarse playback status reported to the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineStatus {
    #[default]
    Playing,
    Paused,
    Empty,
}
