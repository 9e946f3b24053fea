//! Placeholder visual resources (logo, loading card, error slates).
//!
//! These are the assets the screen controller substitutes for live capture
//! when playback has nothing presentable: configured once, looked up through
//! the fallback chain in `screen::content`.

use crate::entities::capture::TextureRef;

/// A static visual asset bound to one screen content slot.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualResource {
    pub texture: TextureRef,
    pub width: u32,
    pub height: u32,
    pub name: String,
}

impl VisualResource {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            texture: TextureRef::new(),
            width,
            height,
            name: name.into(),
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}
