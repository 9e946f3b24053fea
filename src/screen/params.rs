//! Shader-level parameters and named slot mapping.
//!
//! Every output channel receives the same parameter record; what differs is
//! where it lands. Targets expose string-named slots (shader property
//! names), which are resolved once at registration time into integer slot
//! keys so the per-frame write path never touches strings. An empty name in
//! a map means "this target does not take that parameter" and the write is
//! skipped.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entities::capture::TextureRef;

/// How the presented image maps onto its surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Letterbox inside the surface.
    Fit,
    /// Crop to fill the surface.
    Fill,
    FitWidth,
    FitHeight,
    Stretch,
}

impl FitMode {
    /// Integer encoding written to shader slots.
    pub fn as_int(self) -> i32 {
        self as i32
    }
}

/// The full parameter record fanned out on every apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaParams {
    /// Effective texture: resolved override, or raw capture pass-through.
    pub texture: Option<TextureRef>,
    /// Active backend is the low-latency streaming class.
    pub is_stream: bool,
    /// Capture arrives bottom-up and needs a vertical flip.
    pub flip_y: bool,
    /// Capture needs gamma correction before display.
    pub apply_gamma: bool,
    pub fit: FitMode,
    /// Forced aspect ratio; 0.0 keeps the source aspect.
    pub aspect_ratio: f32,
}

impl Default for MediaParams {
    fn default() -> Self {
        Self {
            texture: None,
            is_stream: false,
            flip_y: false,
            apply_gamma: false,
            fit: FitMode::Fit,
            aspect_ratio: 0.0,
        }
    }
}

/// One typed value in a material slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Texture(Option<TextureRef>),
    Flag(bool),
    Int(i32),
    Float(f32),
}

/// Shader property names for one target. Empty string = skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderNameMap {
    pub texture: String,
    pub is_stream: String,
    pub flip_y: String,
    pub apply_gamma: String,
    pub fit: String,
    pub aspect_ratio: String,
}

impl Default for ShaderNameMap {
    fn default() -> Self {
        Self {
            texture: "_MainTex".into(),
            is_stream: "_IsStream".into(),
            flip_y: "_FlipY".into(),
            apply_gamma: "_ApplyGamma".into(),
            fit: "_FitMode".into(),
            aspect_ratio: "_AspectRatio".into(),
        }
    }
}

impl ShaderNameMap {
    /// A map that only carries the texture slot.
    pub fn texture_only(name: impl Into<String>) -> Self {
        Self {
            texture: name.into(),
            is_stream: String::new(),
            flip_y: String::new(),
            apply_gamma: String::new(),
            fit: String::new(),
            aspect_ratio: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.texture.is_empty()
            && self.is_stream.is_empty()
            && self.flip_y.is_empty()
            && self.apply_gamma.is_empty()
            && self.fit.is_empty()
            && self.aspect_ratio.is_empty()
    }
}

/// Interned slot index into one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotKey(usize);

/// Named parameter block of one renderer-side material (or property
/// block). The version counter advances only on writes that change a
/// value, which is what the idempotence tests observe.
#[derive(Debug, Clone, Default)]
pub struct Material {
    name: String,
    slots: IndexMap<String, ParamValue>,
    version: u64,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: IndexMap::new(),
            version: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Intern a slot name. Empty names resolve to nothing (parameter
    /// skipped for this target).
    pub fn slot_key(&mut self, name: &str) -> Option<SlotKey> {
        if name.is_empty() {
            return None;
        }
        let entry = self.slots.entry(name.to_string());
        let index = entry.index();
        entry.or_insert(ParamValue::Flag(false));
        Some(SlotKey(index))
    }

    /// Write one slot; returns true (and bumps the version) only when the
    /// stored value actually changed.
    pub fn set(&mut self, key: SlotKey, value: ParamValue) -> bool {
        match self.slots.get_index_mut(key.0) {
            Some((_, slot)) if *slot == value => false,
            Some((_, slot)) => {
                *slot = value;
                self.version += 1;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.slots.get(name).copied()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// A `ShaderNameMap` resolved against one material.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedMap {
    pub texture: Option<SlotKey>,
    pub is_stream: Option<SlotKey>,
    pub flip_y: Option<SlotKey>,
    pub apply_gamma: Option<SlotKey>,
    pub fit: Option<SlotKey>,
    pub aspect_ratio: Option<SlotKey>,
}

impl ResolvedMap {
    pub fn resolve(map: &ShaderNameMap, material: &mut Material) -> Self {
        Self {
            texture: material.slot_key(&map.texture),
            is_stream: material.slot_key(&map.is_stream),
            flip_y: material.slot_key(&map.flip_y),
            apply_gamma: material.slot_key(&map.apply_gamma),
            fit: material.slot_key(&map.fit),
            aspect_ratio: material.slot_key(&map.aspect_ratio),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.texture.is_none()
            && self.is_stream.is_none()
            && self.flip_y.is_none()
            && self.apply_gamma.is_none()
            && self.fit.is_none()
            && self.aspect_ratio.is_none()
    }

    /// Write the full parameter record through the resolved slots.
    /// Returns true if anything changed.
    pub fn write(&self, material: &mut Material, params: &MediaParams) -> bool {
        let mut changed = false;
        if let Some(key) = self.texture {
            changed |= material.set(key, ParamValue::Texture(params.texture));
        }
        if let Some(key) = self.is_stream {
            changed |= material.set(key, ParamValue::Flag(params.is_stream));
        }
        if let Some(key) = self.flip_y {
            changed |= material.set(key, ParamValue::Flag(params.flip_y));
        }
        if let Some(key) = self.apply_gamma {
            changed |= material.set(key, ParamValue::Flag(params.apply_gamma));
        }
        if let Some(key) = self.fit {
            changed |= material.set(key, ParamValue::Int(params.fit.as_int()));
        }
        if let Some(key) = self.aspect_ratio {
            changed |= material.set(key, ParamValue::Float(params.aspect_ratio));
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_interning_stable() {
        let mut material = Material::new("screen");
        let a = material.slot_key("_MainTex").expect("key");
        let b = material.slot_key("_MainTex").expect("key");
        assert_eq!(a, b);
        assert!(material.slot_key("").is_none());
    }

    #[test]
    fn test_version_bumps_only_on_change() {
        let mut material = Material::new("screen");
        let key = material.slot_key("_FlipY").expect("key");

        assert!(material.set(key, ParamValue::Flag(true)));
        let version = material.version();
        assert!(!material.set(key, ParamValue::Flag(true)));
        assert_eq!(material.version(), version);
        assert!(material.set(key, ParamValue::Flag(false)));
        assert_eq!(material.version(), version + 1);
    }

    #[test]
    fn test_resolved_write_skips_empty_names() {
        let mut material = Material::new("screen");
        let map = ShaderNameMap::texture_only("_Tex");
        let resolved = ResolvedMap::resolve(&map, &mut material);

        let texture = TextureRef::new();
        let params = MediaParams {
            texture: Some(texture),
            is_stream: true,
            aspect_ratio: 1.78,
            ..MediaParams::default()
        };
        assert!(resolved.write(&mut material, &params));

        assert_eq!(material.get("_Tex"), Some(ParamValue::Texture(Some(texture))));
        // No other slots were ever created
        assert!(material.get("_IsStream").is_none());
        assert!(material.get("_AspectRatio").is_none());
    }

    #[test]
    fn test_empty_map_resolves_empty() {
        let mut material = Material::new("screen");
        let map = ShaderNameMap {
            texture: String::new(),
            is_stream: String::new(),
            flip_y: String::new(),
            apply_gamma: String::new(),
            fit: String::new(),
            aspect_ratio: String::new(),
        };
        assert!(map.is_empty());
        let resolved = ResolvedMap::resolve(&map, &mut material);
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_write_is_idempotent() {
        let mut material = Material::new("screen");
        let resolved = ResolvedMap::resolve(&ShaderNameMap::default(), &mut material);
        let params = MediaParams {
            texture: Some(TextureRef::new()),
            is_stream: true,
            flip_y: true,
            ..MediaParams::default()
        };

        assert!(resolved.write(&mut material, &params));
        let version = material.version();
        assert!(!resolved.write(&mut material, &params));
        assert_eq!(material.version(), version);
    }
}
