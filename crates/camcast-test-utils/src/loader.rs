//! Image loader serving decoded images from a table.

use std::collections::{HashMap, HashSet};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use camcast_device::{ImageLoader, RasterImage};

/// Answers loads from a fixed URI table. Unknown URIs yield `None`.
#[derive(Debug, Default)]
pub struct StaticImageLoader {
    images: HashMap<String, RasterImage>,
    disconnected: HashSet<String>,
    loads: Mutex<Vec<String>>,
}

impl StaticImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, uri: impl Into<String>, image: RasterImage) -> Self {
        self.images.insert(uri.into(), image);
        self
    }

    /// Loads of `uri` drop the sender without answering.
    pub fn with_disconnect(mut self, uri: impl Into<String>) -> Self {
        self.disconnected.insert(uri.into());
        self
    }

    /// Every URI requested so far, in order.
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().clone()
    }
}

impl ImageLoader for StaticImageLoader {
    fn load(&self, uri: &str) -> Receiver<Option<RasterImage>> {
        self.loads.lock().push(uri.to_string());

        let (sender, receiver) = crossbeam_channel::bounded(1);
        if !self.disconnected.contains(uri) {
            let _ = sender.send(self.images.get(uri).cloned());
        }
        receiver
    }
}
