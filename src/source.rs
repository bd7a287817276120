//! Remote album access.
//!
//! The slideshow only needs two things from a photo source: the ordered list of
//! items in an album and the bytes behind each item. `GooglePhotosSource` talks
//! to the Photos Library API; tests substitute in-memory fakes.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SourceOptions;
use crate::error::SourceError;
use crate::events::{MediaKind, PhotoDescriptor};

pub trait PhotoSource {
    /// Enumerate the album in source order.
    fn list_album(
        &self,
        album_id: &str,
    ) -> impl Future<Output = Result<Vec<PhotoDescriptor>, SourceError>> + Send;

    /// Download the bytes for one descriptor.
    fn fetch(
        &self,
        descriptor: &PhotoDescriptor,
    ) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send;
}

pub struct GooglePhotosSource {
    client: Client,
    options: SourceOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    album_id: &'a str,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    media_items: Vec<MediaItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaItem {
    base_url: String,
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct StoredToken {
    token: String,
}

impl GooglePhotosSource {
    pub fn new(options: SourceOptions, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SourceError::Request {
                url: options.api_base.clone(),
                message: err.to_string(),
            })?;
        Ok(Self { client, options })
    }

    fn search_url(&self) -> String {
        format!(
            "{}/mediaItems:search",
            self.options.api_base.trim_end_matches('/')
        )
    }

    async fn search_page(
        &self,
        token: &str,
        request: &SearchRequest<'_>,
    ) -> Result<SearchResponse, SourceError> {
        let url = self.search_url();
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|err| request_error(&url, err))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::Auth(format!("{url} returned HTTP {status}")));
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|err| SourceError::Decode {
                url,
                message: err.to_string(),
            })
    }
}

impl PhotoSource for GooglePhotosSource {
    async fn list_album(&self, album_id: &str) -> Result<Vec<PhotoDescriptor>, SourceError> {
        // Re-read on every listing so an externally refreshed token is picked up.
        let token = read_token(&self.options.token_path).await?;

        let mut descriptors = Vec::new();
        let mut skipped = 0usize;
        let mut page_token: Option<String> = None;
        loop {
            let request = SearchRequest {
                album_id,
                page_size: self.options.page_size,
                page_token: page_token.as_deref(),
            };
            let page = self.search_page(&token, &request).await?;
            for item in page.media_items {
                match describe(&item, &self.options) {
                    Some(descriptor) => descriptors.push(descriptor),
                    None => {
                        debug!(mime = %item.mime_type, "skipping unsupported media item");
                        skipped += 1;
                    }
                }
            }
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        info!(
            album_id,
            items = descriptors.len(),
            skipped,
            "album enumerated"
        );
        Ok(descriptors)
    }

    async fn fetch(&self, descriptor: &PhotoDescriptor) -> Result<Vec<u8>, SourceError> {
        let url = &descriptor.remote_url;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| request_error(url, err))?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "download rejected");
            return Err(SourceError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| request_error(url, err))?;
        Ok(bytes.to_vec())
    }
}

fn request_error(url: &str, err: reqwest::Error) -> SourceError {
    SourceError::Request {
        url: url.to_string(),
        message: err.to_string(),
    }
}

async fn read_token(path: &Path) -> Result<String, SourceError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
        SourceError::Auth(format!("cannot read token file {}: {err}", path.display()))
    })?;
    parse_token(&raw, path)
}

fn parse_token(raw: &str, path: &Path) -> Result<String, SourceError> {
    let stored: StoredToken = serde_json::from_str(raw).map_err(|err| {
        SourceError::Auth(format!("malformed token file {}: {err}", path.display()))
    })?;
    if stored.token.trim().is_empty() {
        return Err(SourceError::Auth(format!(
            "token file {} holds an empty token",
            path.display()
        )));
    }
    Ok(stored.token)
}

/// Map a media item onto a descriptor, or `None` for formats the frame cannot show.
fn describe(item: &MediaItem, options: &SourceOptions) -> Option<PhotoDescriptor> {
    let mime = item.mime_type.to_ascii_lowercase();
    if !mime.starts_with("image/") || mime == "image/heic" {
        return None;
    }
    if mime == "image/gif" {
        // `=d` requests the original bytes so every frame survives.
        Some(PhotoDescriptor {
            remote_url: format!("{}=d", item.base_url),
            media_kind: MediaKind::AnimatedImage,
        })
    } else {
        Some(PhotoDescriptor {
            remote_url: format!(
                "{}=w{}-h{}",
                item.base_url, options.max_width, options.max_height
            ),
            media_kind: MediaKind::StaticImage,
        })
    }
}
