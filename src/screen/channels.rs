//! Output channels: the places a resolved presentation lands.
//!
//! Five independent channel kinds, all optional per deployment:
//! - direct surface swap (replace a bound surface's texture in place),
//! - shared materials (slot writes visible to every user of the material),
//! - per-object property blocks (overrides that leave the shared material
//!   untouched),
//! - dynamic render targets (size/double-buffer/refresh lifetime managed
//!   here),
//! - global broadcast parameters (process-wide named slots).
//!
//! Targets are shared with the host as `Arc<Mutex<_>>` handles; the
//! controller is their only writer while the pipeline runs. Every write
//! path reports whether it changed anything so propagation stays
//! observably idempotent.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::entities::capture::TextureRef;
use crate::screen::params::{Material, MediaParams, ParamValue, ResolvedMap, ShaderNameMap};

/// A displayable surface whose texture is swapped directly.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    name: String,
    resource: Option<TextureRef>,
    version: u64,
}

impl Surface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: None,
            version: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Swap the bound texture; no-op (and no version bump) when unchanged.
    pub fn set_resource(&mut self, resource: Option<TextureRef>) -> bool {
        if self.resource == resource {
            return false;
        }
        self.resource = resource;
        self.version += 1;
        true
    }

    pub fn resource(&self) -> Option<TextureRef> {
        self.resource
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Renderer-side object carrying per-material-slot property blocks.
/// Writes here override the shared material for this object only.
#[derive(Debug, Clone, Default)]
pub struct RenderObject {
    name: String,
    blocks: Vec<Material>,
    object_block: Material,
}

impl RenderObject {
    pub fn new(name: impl Into<String>, material_slots: usize) -> Self {
        let name = name.into();
        let blocks = (0..material_slots)
            .map(|i| Material::new(format!("{}#{}", name, i)))
            .collect();
        let object_block = Material::new(format!("{}#object", name));
        Self {
            name,
            blocks,
            object_block,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property block for one material slot, or the object-level block.
    pub fn block(&self, slot: Option<usize>) -> Option<&Material> {
        match slot {
            Some(index) => self.blocks.get(index),
            None => Some(&self.object_block),
        }
    }

    pub fn block_mut(&mut self, slot: Option<usize>) -> Option<&mut Material> {
        match slot {
            Some(index) => self.blocks.get_mut(index),
            None => Some(&mut self.object_block),
        }
    }
}

/// Refresh cadence of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Re-render every frame (live playback).
    Continuous,
    /// Re-render only when content changes (static placeholder).
    OnDemand,
}

/// Offscreen target whose blit material is fed by the pipeline and whose
/// size/buffering is managed by `TargetBinding`.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    name: String,
    texture: TextureRef,
    width: u32,
    height: u32,
    double_buffered: bool,
    refresh: RefreshMode,
    material: Material,
    reallocations: u64,
}

impl RenderTarget {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        let name = name.into();
        let material = Material::new(format!("{}#blit", name));
        Self {
            name,
            texture: TextureRef::new(),
            width,
            height,
            double_buffered: false,
            refresh: RefreshMode::OnDemand,
            material,
            reallocations: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn texture(&self) -> TextureRef {
        self.texture
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn double_buffered(&self) -> bool {
        self.double_buffered
    }

    pub fn refresh(&self) -> RefreshMode {
        self.refresh
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn material_mut(&mut self) -> &mut Material {
        &mut self.material
    }

    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Reallocate at a new size. The texture identity changes; consumers
    /// holding the old `TextureRef` must re-fetch.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if (self.width, self.height) == (width, height) {
            return false;
        }
        self.width = width;
        self.height = height;
        self.texture = TextureRef::new();
        self.reallocations += 1;
        true
    }

    pub fn set_double_buffered(&mut self, enabled: bool) -> bool {
        if self.double_buffered == enabled {
            return false;
        }
        self.double_buffered = enabled;
        true
    }

    pub fn set_refresh(&mut self, refresh: RefreshMode) -> bool {
        if self.refresh == refresh {
            return false;
        }
        self.refresh = refresh;
        true
    }
}

/// Size and buffering policy for one render-target binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetPolicy {
    /// Follow capture resolution changes.
    pub dynamic_size: bool,
    /// Forced output aspect; 0.0 follows the capture aspect.
    pub target_aspect: f32,
    /// Grow dimensions to cover the capture at the forced aspect instead
    /// of shrinking into it.
    pub enlarge_to_fit: bool,
    /// Cap for either dimension after aspect adjustment.
    pub max_dim: u32,
    /// Toggle double buffering with the active backend class.
    pub manage_double_buffer: bool,
}

impl Default for TargetPolicy {
    fn default() -> Self {
        Self {
            dynamic_size: true,
            target_aspect: 0.0,
            enlarge_to_fit: true,
            max_dim: 4096,
            manage_double_buffer: true,
        }
    }
}

impl TargetPolicy {
    /// Target size for a capture of `width` x `height`.
    pub fn desired_size(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (width, height);
        }
        let (mut w, mut h) = (width as f64, height as f64);
        if self.target_aspect > 0.0 {
            let aspect = self.target_aspect as f64;
            if self.enlarge_to_fit {
                // Grow one dimension until the forced aspect covers the capture
                w = w.max(h * aspect);
                h = w / aspect;
            } else {
                w = w.min(h * aspect);
                h = w / aspect;
            }
        }
        if self.max_dim > 0 {
            let max = self.max_dim as f64;
            let scale = (max / w).min(max / h).min(1.0);
            w *= scale;
            h *= scale;
        }
        ((w.round() as u32).max(1), (h.round() as u32).max(1))
    }
}

// ===== Bindings =====

/// Direct surface swap channel.
pub struct SurfaceBinding {
    surface: Arc<Mutex<Surface>>,
}

impl SurfaceBinding {
    pub fn new(surface: Arc<Mutex<Surface>>) -> Self {
        Self { surface }
    }

    pub fn apply(&self, texture: Option<TextureRef>) -> bool {
        self.surface.lock().expect("lock").set_resource(texture)
    }
}

/// Shared material channel.
pub struct MaterialBinding {
    material: Arc<Mutex<Material>>,
    map: ResolvedMap,
}

impl MaterialBinding {
    /// Resolve the name map against the material. Returns None (binding
    /// skipped, pipeline degraded) when no name resolves.
    pub fn new(material: Arc<Mutex<Material>>, names: &ShaderNameMap) -> Option<Self> {
        let map = ResolvedMap::resolve(names, &mut material.lock().expect("lock"));
        if map.is_empty() {
            warn!(
                "material '{}' registered with no resolvable shader names, skipped",
                material.lock().expect("lock").name()
            );
            return None;
        }
        Some(Self { material, map })
    }

    pub fn apply(&self, params: &MediaParams) -> bool {
        self.map.write(&mut self.material.lock().expect("lock"), params)
    }
}

/// Per-object property block channel.
pub struct ObjectBinding {
    object: Arc<Mutex<RenderObject>>,
    slot: Option<usize>,
    map: ResolvedMap,
}

impl ObjectBinding {
    pub fn new(
        object: Arc<Mutex<RenderObject>>,
        slot: Option<usize>,
        names: &ShaderNameMap,
    ) -> Option<Self> {
        let map = {
            let mut guard = object.lock().expect("lock");
            let Some(block) = guard.block_mut(slot) else {
                warn!("object override registered for missing material slot {:?}", slot);
                return None;
            };
            ResolvedMap::resolve(names, block)
        };
        if map.is_empty() {
            warn!(
                "object '{}' override registered with no resolvable shader names, skipped",
                object.lock().expect("lock").name()
            );
            return None;
        }
        Some(Self { object, slot, map })
    }

    pub fn apply(&self, params: &MediaParams) -> bool {
        let mut guard = self.object.lock().expect("lock");
        match guard.block_mut(self.slot) {
            Some(block) => self.map.write(block, params),
            None => false,
        }
    }
}

/// Dynamic render-target channel.
pub struct TargetBinding {
    target: Arc<Mutex<RenderTarget>>,
    policy: TargetPolicy,
    map: ResolvedMap,
}

impl TargetBinding {
    pub fn new(
        target: Arc<Mutex<RenderTarget>>,
        policy: TargetPolicy,
        names: &ShaderNameMap,
    ) -> Option<Self> {
        let map = ResolvedMap::resolve(names, target.lock().expect("lock").material_mut());
        if map.is_empty() {
            warn!(
                "render target '{}' registered with no resolvable shader names, skipped",
                target.lock().expect("lock").name()
            );
            return None;
        }
        Some(Self {
            target,
            policy,
            map,
        })
    }

    /// Write parameters and lifetime flags. `continuous` selects the
    /// refresh mode (live playback vs static placeholder).
    pub fn apply(&self, params: &MediaParams, continuous: bool) -> bool {
        let mut guard = self.target.lock().expect("lock");
        let mut changed = self.map.write(guard.material_mut(), params);
        changed |= guard.set_refresh(if continuous {
            RefreshMode::Continuous
        } else {
            RefreshMode::OnDemand
        });
        if self.policy.manage_double_buffer {
            changed |= guard.set_double_buffered(params.is_stream);
        }
        changed
    }

    /// Follow a capture resolution change. Returns true if the target
    /// reallocated.
    pub fn resize_for_capture(&self, width: u32, height: u32) -> bool {
        if !self.policy.dynamic_size {
            return false;
        }
        let (w, h) = self.policy.desired_size(width, height);
        self.target.lock().expect("lock").resize(w, h)
    }
}

// ===== Global broadcast parameters =====

static GLOBAL_PARAMS: Lazy<Mutex<IndexMap<String, ParamValue>>> =
    Lazy::new(|| Mutex::new(IndexMap::new()));

/// Write one process-wide named slot. Empty names are skipped. Returns
/// true when the stored value changed.
pub fn set_global_param(name: &str, value: ParamValue) -> bool {
    if name.is_empty() {
        return false;
    }
    let mut globals = GLOBAL_PARAMS.lock().expect("lock");
    match globals.get(name) {
        Some(existing) if *existing == value => false,
        _ => {
            globals.insert(name.to_string(), value);
            true
        }
    }
}

/// Read one process-wide named slot.
pub fn global_param(name: &str) -> Option<ParamValue> {
    GLOBAL_PARAMS.lock().expect("lock").get(name).copied()
}

/// Global broadcast channel: same record, process-wide slots.
pub struct GlobalBinding {
    names: ShaderNameMap,
}

impl GlobalBinding {
    pub fn new(names: ShaderNameMap) -> Option<Self> {
        if names.is_empty() {
            warn!("global parameter binding with no names, skipped");
            return None;
        }
        Some(Self { names })
    }

    pub fn apply(&self, params: &MediaParams) -> bool {
        let mut changed = false;
        changed |= set_global_param(&self.names.texture, ParamValue::Texture(params.texture));
        changed |= set_global_param(&self.names.is_stream, ParamValue::Flag(params.is_stream));
        changed |= set_global_param(&self.names.flip_y, ParamValue::Flag(params.flip_y));
        changed |= set_global_param(&self.names.apply_gamma, ParamValue::Flag(params.apply_gamma));
        changed |= set_global_param(&self.names.fit, ParamValue::Int(params.fit.as_int()));
        changed |= set_global_param(
            &self.names.aspect_ratio,
            ParamValue::Float(params.aspect_ratio),
        );
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::params::FitMode;

    #[test]
    fn test_surface_swap_short_circuits() {
        let mut surface = Surface::new("screen");
        let texture = TextureRef::new();

        assert!(surface.set_resource(Some(texture)));
        let version = surface.version();
        assert!(!surface.set_resource(Some(texture)));
        assert_eq!(surface.version(), version);
        assert!(surface.set_resource(None));
    }

    #[test]
    fn test_object_blocks_do_not_touch_each_other() {
        let object = Arc::new(Mutex::new(RenderObject::new("quad", 2)));
        let binding =
            ObjectBinding::new(Arc::clone(&object), Some(1), &ShaderNameMap::default())
                .expect("binding");

        let params = MediaParams {
            texture: Some(TextureRef::new()),
            ..MediaParams::default()
        };
        assert!(binding.apply(&params));

        let guard = object.lock().expect("lock");
        assert!(guard.block(Some(1)).expect("block").get("_MainTex").is_some());
        // Slot 0 untouched
        assert!(guard.block(Some(0)).expect("block").get("_MainTex").is_none());
    }

    #[test]
    fn test_object_binding_missing_slot_skipped() {
        let object = Arc::new(Mutex::new(RenderObject::new("quad", 1)));
        assert!(ObjectBinding::new(object, Some(5), &ShaderNameMap::default()).is_none());
    }

    #[test]
    fn test_empty_name_map_skips_binding() {
        let material = Arc::new(Mutex::new(Material::new("shared")));
        let empty = ShaderNameMap {
            texture: String::new(),
            is_stream: String::new(),
            flip_y: String::new(),
            apply_gamma: String::new(),
            fit: String::new(),
            aspect_ratio: String::new(),
        };
        assert!(MaterialBinding::new(material, &empty).is_none());
    }

    #[test]
    fn test_target_policy_enlarge_and_cap() {
        let policy = TargetPolicy {
            dynamic_size: true,
            target_aspect: 16.0 / 9.0,
            enlarge_to_fit: true,
            max_dim: 2048,
            manage_double_buffer: true,
        };
        // 4:3 capture grows wider to reach 16:9
        let (w, h) = policy.desired_size(1440, 1080);
        assert_eq!((w, h), (1920, 1080));
        // Oversized capture is scaled down to the cap
        let (w, h) = policy.desired_size(7680, 4320);
        assert_eq!(w, 2048);
        assert_eq!(h, 1152);
    }

    #[test]
    fn test_target_resize_changes_identity() {
        let mut target = RenderTarget::new("crt", 1280, 720);
        let before = target.texture();
        assert!(target.resize(1920, 1080));
        assert_ne!(target.texture(), before);
        assert_eq!(target.reallocations(), 1);
        assert!(!target.resize(1920, 1080));
        assert_eq!(target.reallocations(), 1);
    }

    #[test]
    fn test_target_binding_manages_buffering_and_refresh() {
        let target = Arc::new(Mutex::new(RenderTarget::new("crt", 1280, 720)));
        let binding = TargetBinding::new(
            Arc::clone(&target),
            TargetPolicy::default(),
            &ShaderNameMap::default(),
        )
        .expect("binding");

        let params = MediaParams {
            texture: Some(TextureRef::new()),
            is_stream: true,
            fit: FitMode::Fill,
            ..MediaParams::default()
        };
        assert!(binding.apply(&params, true));
        {
            let guard = target.lock().expect("lock");
            assert_eq!(guard.refresh(), RefreshMode::Continuous);
            assert!(guard.double_buffered());
        }

        // Placeholder content: on-demand refresh, single buffered
        let placeholder = MediaParams {
            texture: Some(TextureRef::new()),
            is_stream: false,
            ..MediaParams::default()
        };
        assert!(binding.apply(&placeholder, false));
        let guard = target.lock().expect("lock");
        assert_eq!(guard.refresh(), RefreshMode::OnDemand);
        assert!(!guard.double_buffered());
    }

    #[test]
    fn test_global_params_roundtrip_and_idempotence() {
        let names = ShaderNameMap {
            texture: "_TestGlobalVideoTex".into(),
            is_stream: "_TestGlobalIsStream".into(),
            flip_y: String::new(),
            apply_gamma: String::new(),
            fit: String::new(),
            aspect_ratio: String::new(),
        };
        let binding = GlobalBinding::new(names).expect("binding");
        let params = MediaParams {
            texture: Some(TextureRef::new()),
            is_stream: true,
            ..MediaParams::default()
        };

        assert!(binding.apply(&params));
        assert_eq!(
            global_param("_TestGlobalIsStream"),
            Some(ParamValue::Flag(true))
        );
        // Unchanged record writes nothing
        assert!(!binding.apply(&params));
    }
}
