//! Selfie capture.
//!
//! A live camera stream and a file picker both end up as a
//! [`CapturedImage`], which is always submitted as PNG.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::debug;

use crate::error::{Result, RollcallError};
use crate::upload::encode_data_uri;

/// A still image taken from a capture source.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    image: DynamicImage,
}

impl CapturedImage {
    pub fn new(image: impl Into<DynamicImage>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// Decode an encoded image (JPEG, PNG, GIF or WebP).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| RollcallError::Capture(format!("Failed to decode image: {}", e)))?;
        Ok(Self { image })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| RollcallError::Capture(format!("PNG encoding failed: {}", e)))?;
        Ok(buffer.into_inner())
    }

    /// `data:image/png;base64,...`
    pub fn to_data_uri(&self) -> Result<String> {
        Ok(encode_data_uri("image/png", &self.to_png_bytes()?))
    }
}

/// Anything that can produce a still on demand.
pub trait CaptureSource {
    fn capture(&self) -> Result<CapturedImage>;
}

/// File picker equivalent: loads an image from disk.
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureSource for FileCapture {
    fn capture(&self) -> Result<CapturedImage> {
        let image = image::open(&self.path).map_err(|e| {
            RollcallError::Capture(format!("Failed to load {}: {}", self.path.display(), e))
        })?;
        debug!(
            path = %self.path.display(),
            width = image.width(),
            height = image.height(),
            "Image loaded"
        );
        Ok(CapturedImage::new(image))
    }
}

/// Live stream: the camera side pushes frames, `capture` samples the latest.
///
/// Clones share the same frame slot.
#[derive(Debug, Clone, Default)]
pub struct StreamCapture {
    latest: Arc<RwLock<Option<RgbaImage>>>,
}

impl StreamCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, frame: RgbaImage) {
        *self.latest.write().unwrap_or_else(|e| e.into_inner()) = Some(frame);
    }

    /// Stop the stream. Later captures fail until a new frame arrives.
    pub fn stop(&self) {
        self.latest.write().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn is_live(&self) -> bool {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl CaptureSource for StreamCapture {
    fn capture(&self) -> Result<CapturedImage> {
        let guard = self.latest.read().unwrap_or_else(|e| e.into_inner());
        let frame = guard
            .as_ref()
            .ok_or_else(|| RollcallError::Capture("Camera is not streaming".into()))?;
        Ok(CapturedImage::new(frame.clone()))
    }
}

#[cfg(feature = "network")]
impl CaptureSource for tokio::sync::watch::Receiver<Option<RgbaImage>> {
    fn capture(&self) -> Result<CapturedImage> {
        self.borrow()
            .as_ref()
            .map(|frame| CapturedImage::new(frame.clone()))
            .ok_or_else(|| RollcallError::Capture("Camera is not streaming".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::decode_data_uri;
    use image::Rgba;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn frame(shade: u8) -> RgbaImage {
        RgbaImage::from_pixel(4, 3, Rgba([shade, 0, 255 - shade, 255]))
    }

    #[test]
    fn test_png_encoding() {
        let captured = CapturedImage::new(frame(10));
        let png = captured.to_png_bytes().unwrap();
        assert_eq!(png[..8], PNG_SIGNATURE);

        let decoded = CapturedImage::from_bytes(&png).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
    }

    #[test]
    fn test_data_uri_carries_png() {
        let uri = CapturedImage::new(frame(10)).to_data_uri().unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_uri(&uri).unwrap()[..8], PNG_SIGNATURE);
    }

    #[test]
    fn test_from_bytes_rejects_non_image() {
        assert!(matches!(
            CapturedImage::from_bytes(b"definitely not an image"),
            Err(RollcallError::Capture(_))
        ));
    }

    #[test]
    fn test_file_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selfie.png");
        frame(200).save(&path).unwrap();

        let captured = FileCapture::new(&path).capture().unwrap();
        assert_eq!(captured.dimensions(), (4, 3));

        let missing = FileCapture::new(dir.path().join("missing.png")).capture();
        assert!(matches!(missing, Err(RollcallError::Capture(_))));
    }

    #[test]
    fn test_stream_samples_latest_frame() {
        let stream = StreamCapture::new();
        assert!(!stream.is_live());
        assert!(stream.capture().is_err());

        let camera = stream.clone();
        camera.push(frame(1));
        camera.push(frame(2));
        let captured = stream.capture().unwrap();
        assert_eq!(captured.image().to_rgba8().get_pixel(0, 0)[0], 2);

        camera.stop();
        assert!(stream.capture().is_err());
    }

    #[cfg(feature = "network")]
    #[test]
    fn test_watch_receiver_source() {
        let (tx, rx) = tokio::sync::watch::channel(None);
        assert!(rx.capture().is_err());

        tx.send_replace(Some(frame(7)));
        assert_eq!(rx.capture().unwrap().dimensions(), (4, 3));
    }
}
