use std::sync::atomic::{AtomicU64, Ordering};

use image::{GenericImageView, ImageFormat};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(u64);

impl ImageId {
    pub fn next() -> Self {
        ImageId(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Decoded pixels (CPU side, ready to blit)
// ---------------------------------------------------------------------------

pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Container format sniffed from the payload, if recognised.
    pub format: Option<ImageFormat>,
}

impl Frame {
    /// Decode an encoded payload into RGBA8.
    pub fn decode(bytes: &[u8]) -> Result<Frame, image::ImageError> {
        let format = image::guess_format(bytes).ok();
        let img = image::load_from_memory(bytes)?;
        let (width, height) = img.dimensions();
        Ok(Frame {
            rgba: img.to_rgba8().into_raw(),
            width,
            height,
            format,
        })
    }

    pub fn format_name(&self) -> &'static str {
        self.format
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("unknown")
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Image record
// ---------------------------------------------------------------------------

/// One fetched image. Lives in exactly one place at a time: the prefetch
/// queue or the history. Never cloned.
#[derive(Debug)]
pub struct ImageRecord {
    id: ImageId,
    bytes: Vec<u8>,
    source_url: String,
    frame: Frame,
}

impl ImageRecord {
    pub fn new(bytes: Vec<u8>, source_url: String, frame: Frame) -> Self {
        Self {
            id: ImageId::next(),
            bytes,
            source_url,
            frame,
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    /// The payload exactly as the server sent it.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}
