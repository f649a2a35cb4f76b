//! Decoded overlay images and the image loading seam.

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use crossbeam_channel::Receiver;
use tracing::{debug, warn};

use camcast_ipc::Size;

/// A decoded RGBA8 raster image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// Row-major RGBA8 pixels.
    pub data: Bytes,

    /// Natural width in pixels.
    pub width: u32,

    /// Natural height in pixels.
    pub height: u32,
}

impl RasterImage {
    /// Create a new raster image.
    pub fn new(data: Bytes, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// A fully transparent image of the given size.
    pub fn transparent(width: u32, height: u32) -> Self {
        let len = Self::rgba_buffer_size(width, height);
        Self::new(Bytes::from(vec![0u8; len]), width, height)
    }

    /// Calculate expected RGBA buffer size for given dimensions.
    pub fn rgba_buffer_size(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    /// Validate that the pixel data matches the dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::rgba_buffer_size(self.width, self.height)
    }

    /// Natural dimensions.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Loads and decodes an image from a URI.
///
/// Loading is asynchronous: the returned receiver yields exactly one value,
/// `None` when the image could not be fetched or decoded. A dropped sender
/// counts as a failure.
pub trait ImageLoader: Send + Sync {
    fn load(&self, uri: &str) -> Receiver<Option<RasterImage>>;
}

/// Adapts a blocking fetch-and-decode function into an [`ImageLoader`] by
/// running each load on its own thread.
pub struct ThreadedImageLoader {
    decode: Arc<dyn Fn(&str) -> Option<RasterImage> + Send + Sync>,
}

impl ThreadedImageLoader {
    /// Create a loader around a blocking decode function.
    pub fn new<F>(decode: F) -> Self
    where
        F: Fn(&str) -> Option<RasterImage> + Send + Sync + 'static,
    {
        Self {
            decode: Arc::new(decode),
        }
    }
}

impl ImageLoader for ThreadedImageLoader {
    fn load(&self, uri: &str) -> Receiver<Option<RasterImage>> {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let decode = Arc::clone(&self.decode);
        let uri = uri.to_string();

        let spawned = thread::Builder::new()
            .name("camcast-image-load".into())
            .spawn(move || {
                debug!(%uri, "Loading image");
                let image = decode(&uri);
                if image.is_none() {
                    debug!(%uri, "Image load produced nothing");
                }
                let _ = sender.send(image);
            });

        // The sender moved into the closure is dropped with it, so the
        // receiver reports a disconnect that callers treat as a failure.
        if let Err(e) = spawned {
            warn!("Failed to spawn image loader thread: {}", e);
        }

        receiver
    }
}
