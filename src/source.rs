//! Frame sources: fetch one frame's bytes and decode them to RGBA.
//!
//! Sources run on loader worker threads, so they must be `Send + Sync` and
//! must not touch any engine state. Decoding happens on the worker too; the
//! owning thread only ever receives finished `FrameResource`s.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbaImage;
use log::{debug, info};

use crate::sequence::{FrameIndex, FrameSequence};

/// Decoded, immutable frame image.
#[derive(Debug)]
pub struct FrameResource {
    pixels: RgbaImage,
}

impl FrameResource {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Decode encoded image bytes (PNG, GIF, JPEG, ...) into RGBA8.
    /// Animated GIFs contribute their first frame.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes).context("decode frame image")?;
        Ok(Self::new(img.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Fetches and decodes individual frames.
pub trait FrameSource: Send + Sync {
    fn fetch(&self, index: FrameIndex) -> Result<FrameResource>;
}

/// Frames stored as files on the local filesystem.
pub struct FileSource {
    sequence: FrameSequence,
}

impl FileSource {
    pub fn new(sequence: FrameSequence) -> Self {
        Self { sequence }
    }

    fn path_for(&self, index: FrameIndex) -> PathBuf {
        PathBuf::from(self.sequence.address_for(index))
    }
}

impl FrameSource for FileSource {
    fn fetch(&self, index: FrameIndex) -> Result<FrameResource> {
        let path = self.path_for(index);
        let bytes =
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        debug!("source: read {} ({} bytes)", path.display(), bytes.len());
        FrameResource::decode(&bytes).with_context(|| format!("frame {index}"))
    }
}

/// Frames served over HTTP(S).
pub struct HttpSource {
    sequence: FrameSequence,
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(sequence: FrameSequence) -> Self {
        Self {
            sequence,
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl FrameSource for HttpSource {
    fn fetch(&self, index: FrameIndex) -> Result<FrameResource> {
        let url = self.sequence.address_for(index);
        let mut response = self
            .agent
            .get(&url)
            .call()
            .with_context(|| format!("GET {url}"))?;
        let bytes = response
            .body_mut()
            .read_to_vec()
            .with_context(|| format!("read body of {url}"))?;
        debug!("source: fetched {url} ({} bytes)", bytes.len());
        FrameResource::decode(&bytes).with_context(|| format!("frame {index}"))
    }
}

/// Pick the source matching the sequence's path: HTTP for URLs, files otherwise.
pub fn open_source(sequence: &FrameSequence) -> Arc<dyn FrameSource> {
    if sequence.is_remote() {
        info!("source: fetching frames over HTTP from {}", sequence.path);
        Arc::new(HttpSource::new(sequence.clone()))
    } else {
        info!("source: reading frames from {}", sequence.path);
        Arc::new(FileSource::new(sequence.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "framescroll-source-{name}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn encode(img: &RgbaImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn decode_png_keeps_dimensions() {
        let img = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]));
        let res = FrameResource::decode(&encode(&img, ImageFormat::Png)).unwrap();
        assert_eq!((res.width(), res.height()), (4, 3));
        assert_eq!(res.pixels().get_pixel(2, 1), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(FrameResource::decode(b"not an image").is_err());
    }

    #[test]
    fn file_source_reads_addressed_frame() {
        let dir = scratch_dir("read");
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        std::fs::write(dir.join("f07.gif"), encode(&img, ImageFormat::Gif)).unwrap();

        let source = FileSource::new(FrameSequence {
            path: format!("{}/", dir.display()),
            prefix: "f".into(),
            extension: ".gif".into(),
            pad: 2,
            total: 10,
        });
        let res = source.fetch(7).unwrap();
        assert_eq!((res.width(), res.height()), (2, 2));

        let err = source.fetch(8).unwrap_err();
        assert!(format!("{err:#}").contains("f08.gif"));
    }

    #[test]
    fn open_source_does_not_touch_io() {
        // Construction alone must succeed even for unreachable locations.
        let seq = FrameSequence {
            path: "https://unreachable.invalid/".into(),
            prefix: "x".into(),
            extension: ".png".into(),
            pad: 1,
            total: 1,
        };
        let _ = open_source(&seq);
    }
}
