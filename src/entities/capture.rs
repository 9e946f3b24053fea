//! Capture frame metadata polled from the active backend.
//!
//! The backend's capture surface can change size or identity without any
//! notification, so the pipeline polls it (see `screen::watchdog`) instead
//! of waiting for events. A frame here is metadata only: the pixel data
//! stays on the backend side.

use uuid::Uuid;

/// Identity of a GPU-side texture (capture surface, placeholder asset,
/// or render target). Compared for change detection, never dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRef(Uuid);

impl TextureRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl Default for TextureRef {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw frame currently produced by a backend, polled for validity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureFrame {
    pub texture: TextureRef,
    pub width: u32,
    pub height: u32,
}

impl CaptureFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            texture: TextureRef::new(),
            width,
            height,
        }
    }

    /// Both dimensions meet the minimum threshold.
    pub fn meets_min(&self, min_size: u32) -> bool {
        self.width >= min_size && self.height >= min_size
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
