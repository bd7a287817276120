use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::error::{CacheError, SourceError};
use crate::events::{CacheEntry, MediaKind, PhotoDescriptor};
use crate::playlist::PlaylistSnapshot;
use crate::source::PhotoSource;

const FILE_PREFIX: &str = "photo_";
const PARTIAL_SUFFIX: &str = ".part";

/// Mirrors an album into a directory, one file per item.
///
/// Files are keyed by `(index, kind)` only, so an unchanged album never
/// triggers a second download.
pub struct CacheStore<S> {
    source: S,
    dir: PathBuf,
    fetch_timeout: Duration,
}

impl<S: PhotoSource> CacheStore<S> {
    pub fn new(source: S, dir: impl Into<PathBuf>, fetch_timeout: Duration) -> Self {
        Self {
            source,
            dir: dir.into(),
            fetch_timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Enumerate the album and download whatever is missing.
    ///
    /// Items that fail to download are logged and left out of the snapshot.
    /// Only a failed enumeration fails the call.
    #[instrument(skip(self))]
    pub async fn refresh(&self, album_id: &str) -> Result<PlaylistSnapshot, CacheError> {
        let descriptors = match timeout(self.fetch_timeout, self.source.list_album(album_id)).await
        {
            Ok(Ok(descriptors)) => descriptors,
            Ok(Err(source)) => {
                return Err(CacheError::SourceUnavailable {
                    album_id: album_id.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(CacheError::SourceUnavailable {
                    album_id: album_id.to_string(),
                    source: SourceError::Timeout(self.fetch_timeout),
                });
            }
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CacheError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let mut entries = Vec::with_capacity(descriptors.len());
        let mut downloaded = 0usize;
        let mut failed = 0usize;
        for (index, descriptor) in descriptors.iter().enumerate() {
            let path = self.entry_path(index, descriptor.media_kind);
            if is_cached(&path).await {
                debug!(index, path = %path.display(), "cache hit");
            } else {
                match self.download(index, descriptor, &path).await {
                    Ok(bytes) => {
                        downloaded += 1;
                        info!(index, path = %path.display(), bytes, "cached");
                    }
                    Err(CacheError::FetchFailed { index, url, source }) => {
                        failed += 1;
                        warn!(album_id, index, %url, error = %source, "fetch failed; excluding item");
                        continue;
                    }
                    Err(err) => {
                        failed += 1;
                        warn!(album_id, index, error = %err, "caching failed; excluding item");
                        continue;
                    }
                }
            }
            entries.push(CacheEntry {
                index,
                local_path: path,
                media_kind: descriptor.media_kind,
            });
        }

        let pruned = self.prune_stale(&entries);

        info!(
            album_id,
            dir = %self.dir.display(),
            listed = descriptors.len(),
            entries = entries.len(),
            downloaded,
            failed,
            pruned,
            "cache refreshed"
        );
        Ok(PlaylistSnapshot::new(entries))
    }

    /// Build a snapshot from files already on disk, without touching the network.
    pub fn load_existing(&self) -> PlaylistSnapshot {
        let entries = self.scan();
        info!(
            dir = %self.dir.display(),
            entries = entries.len(),
            "loaded cached photos from disk"
        );
        PlaylistSnapshot::new(entries)
    }

    /// Drop a cached file so the next refresh downloads it again.
    pub fn evict(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        delete_if_exists(&entry.local_path)
    }

    fn scan(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let (index, media_kind) = parse_cache_file_name(e.file_name().to_str()?)?;
                Some(CacheEntry {
                    index,
                    local_path: e.into_path(),
                    media_kind,
                })
            })
            .collect();
        entries.sort_by_key(|e| (e.index, e.media_kind));
        entries
    }

    /// Remove cache files the latest listing no longer references.
    fn prune_stale(&self, keep: &[CacheEntry]) -> usize {
        let mut pruned = 0;
        for stale in self
            .scan()
            .into_iter()
            .filter(|e| !keep.iter().any(|k| k.local_path == e.local_path))
        {
            match delete_if_exists(&stale.local_path) {
                Ok(()) => pruned += 1,
                Err(err) => warn!(error = %err, "failed to prune stale cache file"),
            }
        }
        pruned
    }

    fn entry_path(&self, index: usize, kind: MediaKind) -> PathBuf {
        self.dir.join(cache_file_name(index, kind))
    }

    async fn download(
        &self,
        index: usize,
        descriptor: &PhotoDescriptor,
        path: &Path,
    ) -> Result<usize, CacheError> {
        let fetch_failed = |source| CacheError::FetchFailed {
            index,
            url: descriptor.remote_url.clone(),
            source,
        };
        let bytes = timeout(self.fetch_timeout, self.source.fetch(descriptor))
            .await
            .map_err(|_| fetch_failed(SourceError::Timeout(self.fetch_timeout)))?
            .map_err(fetch_failed)?;

        // Write beside the target and rename so a torn download never looks cached.
        let partial = partial_path(path);
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|source| CacheError::Io {
                path: partial.clone(),
                source,
            })?;
        tokio::fs::rename(&partial, path)
            .await
            .map_err(|source| CacheError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(bytes.len())
    }
}

pub fn cache_file_name(index: usize, kind: MediaKind) -> String {
    format!("{FILE_PREFIX}{index}.{}", kind.extension())
}

fn parse_cache_file_name(name: &str) -> Option<(usize, MediaKind)> {
    let (stem, ext) = name.strip_prefix(FILE_PREFIX)?.rsplit_once('.')?;
    let index = stem.parse().ok()?;
    let kind = MediaKind::from_extension(ext)?;
    Some((index, kind))
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}{PARTIAL_SUFFIX}"))
}

async fn is_cached(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn delete_if_exists(p: &Path) -> Result<(), CacheError> {
    match std::fs::remove_file(p) {
        Ok(()) => {
            info!(path = %p.display(), "evicted cached photo");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %p.display(), "evict: file already gone");
            Ok(())
        }
        Err(source) => Err(CacheError::Io {
            path: p.to_path_buf(),
            source,
        }),
    }
}
