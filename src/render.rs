use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use image::AnimationDecoder;
use image::codecs::gif::GifDecoder;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::events::{CacheEntry, MediaKind};

/// How long the renderer may spend on one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingBudget {
    /// Hold a still image for the given dwell.
    Still(Duration),
    /// Play every frame `loops` times, one frame per `frame_interval`.
    Animated { loops: u32, frame_interval: Duration },
}

impl TimingBudget {
    pub fn hold_for(&self, frames: usize) -> Duration {
        match *self {
            Self::Still(dwell) => dwell,
            Self::Animated {
                loops,
                frame_interval,
            } => {
                let steps = u32::try_from(frames.max(1))
                    .unwrap_or(u32::MAX)
                    .saturating_mul(loops.max(1));
                frame_interval.saturating_mul(steps)
            }
        }
    }
}

pub trait Renderer {
    /// Draw one entry and return once its budget is spent.
    fn show(
        &mut self,
        entry: &CacheEntry,
        budget: TimingBudget,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Static "no media" state shown while the playlist is empty.
    fn show_placeholder(&mut self) -> impl Future<Output = ()> + Send;
}

/// Renderer for frames without a display surface: validates each file by
/// decoding it, logs what would be on screen and holds it for its budget.
#[derive(Debug, Default)]
pub struct HeadlessRenderer;

#[derive(Debug, Clone, Copy)]
struct Inspected {
    width: u32,
    height: u32,
    frames: usize,
}

impl Renderer for HeadlessRenderer {
    async fn show(&mut self, entry: &CacheEntry, budget: TimingBudget) -> Result<()> {
        let path = entry.local_path.clone();
        let kind = entry.media_kind;
        let inspected = tokio::task::spawn_blocking(move || inspect(&path, kind))
            .await
            .context("decode task panicked")?
            .with_context(|| format!("failed to decode {}", entry.local_path.display()))?;

        let hold = budget.hold_for(inspected.frames);
        info!(
            index = entry.index,
            path = %entry.local_path.display(),
            kind = ?kind,
            width = inspected.width,
            height = inspected.height,
            frames = inspected.frames,
            hold = %humantime::format_duration(hold),
            "showing photo"
        );
        sleep(hold).await;
        Ok(())
    }

    async fn show_placeholder(&mut self) {
        warn!("no media to display");
    }
}

fn inspect(path: &Path, kind: MediaKind) -> Result<Inspected> {
    match kind {
        MediaKind::StaticImage => {
            let img = image::ImageReader::open(path)?
                .with_guessed_format()?
                .decode()?;
            Ok(Inspected {
                width: img.width(),
                height: img.height(),
                frames: 1,
            })
        }
        MediaKind::AnimatedImage => {
            let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
            let frames = decoder.into_frames().collect_frames()?;
            let (width, height) = frames
                .first()
                .map(|f| f.buffer().dimensions())
                .unwrap_or_default();
            debug!(path = %path.display(), frames = frames.len(), "decoded animation");
            Ok(Inspected {
                width,
                height,
                frames: frames.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgba, RgbaImage};
    use std::path::PathBuf;

    #[test]
    fn still_budget_ignores_frames() {
        let budget = TimingBudget::Still(Duration::from_secs(5));
        assert_eq!(budget.hold_for(1), Duration::from_secs(5));
        assert_eq!(budget.hold_for(40), Duration::from_secs(5));
    }

    #[test]
    fn animated_budget_scales_with_frames_and_loops() {
        let budget = TimingBudget::Animated {
            loops: 2,
            frame_interval: Duration::from_millis(50),
        };
        assert_eq!(budget.hold_for(10), Duration::from_secs(1));
        assert_eq!(budget.hold_for(0), Duration::from_millis(100));
    }

    fn write_gif(path: &Path, frames: usize) {
        let file = File::create(path).unwrap();
        let mut encoder = GifEncoder::new(file);
        for i in 0..frames {
            let shade = (i * 40) as u8;
            let buffer = RgbaImage::from_pixel(3, 2, Rgba([shade, 0, 0, 255]));
            encoder
                .encode_frame(Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(10, 1)))
                .unwrap();
        }
    }

    #[test]
    fn inspects_still_and_animated_files() {
        let dir = tempfile::tempdir().unwrap();
        let still = dir.path().join("photo_0.jpg");
        RgbaImage::from_pixel(4, 3, Rgba([1, 2, 3, 255]))
            .save_with_format(&still, image::ImageFormat::Png)
            .unwrap();
        let info = inspect(&still, MediaKind::StaticImage).unwrap();
        assert_eq!((info.width, info.height, info.frames), (4, 3, 1));

        let animated = dir.path().join("photo_1.gif");
        write_gif(&animated, 3);
        let info = inspect(&animated, MediaKind::AnimatedImage).unwrap();
        assert_eq!((info.width, info.height, info.frames), (3, 2, 3));
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo_0.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();
        let entry = CacheEntry {
            index: 0,
            local_path: PathBuf::from(&path),
            media_kind: MediaKind::StaticImage,
        };
        let err = HeadlessRenderer
            .show(&entry, TimingBudget::Still(Duration::from_millis(1)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to decode"));
    }
}
