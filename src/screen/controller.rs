//! Screen controller: from playback lifecycle to pixels on every output.
//!
//! **Why**: occupants of the space must never see garbage or flicker. The
//! controller owns the entire decision of "what to show": it folds
//! normalized playback events and capture validity into one
//! `ScreenContent`, resolves that through the override/fallback tables,
//! and pushes the result to every registered output channel — always in
//! the order "notifications first, then a consistent applied state".
//!
//! **Used by**: `Player` (event forwarding + capture checks); hosts
//! register outputs and placeholder resources here at configuration time.
//!
//! # Error latch
//!
//! Reconnect attempts bounce playback through loading/stopped modes. With
//! latching enabled the screen holds the error slate through those
//! transients and only releases when playback demonstrably runs again (or
//! the host explicitly stops/loads).
//!
//! # Placeholder staging
//!
//! While playing with an invalid capture the screen shows the loading
//! placeholder for the first N validity checks, then the audio-only
//! placeholder — each stage only if its resource is actually configured,
//! otherwise the logo.

use log::debug;

use crate::config::PipelineConfig;
use crate::core::events::{ErrorCode, ScreenEvent, SourceEvent};
use crate::entities::capture::{CaptureFrame, TextureRef};
use crate::entities::resource::VisualResource;
use crate::screen::channels::{
    GlobalBinding, MaterialBinding, ObjectBinding, SurfaceBinding, TargetBinding,
};
use crate::screen::content::{OverrideTable, ScreenContent};
use crate::screen::params::{FitMode, MediaParams};
use crate::screen::watchdog::{CaptureWatchdog, NextCheck};

/// Coarse playback state derived from normalized source events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackMode {
    Uninitialized,
    Stopped,
    Loading,
    Playing,
    Syncing,
    Error(ErrorCode),
}

pub struct ScreenController {
    mode: PlaybackMode,
    syncing: bool,
    latch_errors: bool,
    latched: Option<ErrorCode>,
    loading_cycles: u32,
    correct_gamma: bool,
    fit: FitMode,
    aspect_ratio: f32,

    overrides: OverrideTable,
    watchdog: CaptureWatchdog,

    surfaces: Vec<SurfaceBinding>,
    materials: Vec<MaterialBinding>,
    objects: Vec<ObjectBinding>,
    targets: Vec<TargetBinding>,
    globals: Vec<GlobalBinding>,

    content: ScreenContent,
    last_applied: Option<(ScreenContent, MediaParams)>,
    last_out_texture: Option<TextureRef>,
    last_out_size: Option<(u32, u32)>,
    last_capture: Option<CaptureFrame>,
    active_is_stream: bool,
    display_as_logo: bool,
    editor_preview: bool,

    outbox: Vec<ScreenEvent>,
}

impl ScreenController {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            mode: PlaybackMode::Uninitialized,
            syncing: false,
            latch_errors: config.latch_errors,
            latched: None,
            loading_cycles: config.loading_check_cycles,
            correct_gamma: config.correct_gamma,
            fit: FitMode::Fit,
            aspect_ratio: 0.0,
            overrides: OverrideTable::new(),
            watchdog: CaptureWatchdog::new(config.min_capture_size, config.idle_check_interval()),
            surfaces: Vec::new(),
            materials: Vec::new(),
            objects: Vec::new(),
            targets: Vec::new(),
            globals: Vec::new(),
            content: ScreenContent::Logo,
            last_applied: None,
            last_out_texture: None,
            last_out_size: None,
            last_capture: None,
            active_is_stream: false,
            display_as_logo: false,
            editor_preview: false,
            outbox: Vec::new(),
        }
    }

    // ===== Configuration surface =====

    pub fn set_override(&mut self, content: ScreenContent, resource: VisualResource) {
        self.overrides.set(content, resource);
    }

    pub fn clear_override(&mut self, content: ScreenContent) {
        self.overrides.clear(content);
    }

    pub fn add_surface(&mut self, binding: SurfaceBinding) {
        self.surfaces.push(binding);
    }

    /// Register a shared-material output; invalid registrations were
    /// already rejected (as `None`) by the binding constructor.
    pub fn add_material(&mut self, binding: Option<MaterialBinding>) {
        if let Some(binding) = binding {
            self.materials.push(binding);
        }
    }

    pub fn add_object(&mut self, binding: Option<ObjectBinding>) {
        if let Some(binding) = binding {
            self.objects.push(binding);
        }
    }

    pub fn add_target(&mut self, binding: Option<TargetBinding>) {
        if let Some(binding) = binding {
            self.targets.push(binding);
        }
    }

    pub fn add_global(&mut self, binding: Option<GlobalBinding>) {
        if let Some(binding) = binding {
            self.globals.push(binding);
        }
    }

    pub fn set_fit(&mut self, fit: FitMode) {
        self.fit = fit;
        self.update_screen();
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.aspect_ratio = aspect;
        self.update_screen();
    }

    // ===== Queries =====

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn content(&self) -> ScreenContent {
        self.content
    }

    pub fn capture_valid(&self) -> bool {
        self.watchdog.valid()
    }

    pub fn take_events(&mut self) -> Vec<ScreenEvent> {
        std::mem::take(&mut self.outbox)
    }

    fn is_playing_mode(&self) -> bool {
        matches!(self.mode, PlaybackMode::Playing | PlaybackMode::Syncing)
    }

    // ===== State transitions =====

    /// Host began loading new media.
    pub fn on_load_started(&mut self) {
        self.mode = PlaybackMode::Loading;
        self.latched = None;
        self.watchdog.reset();
        self.update_screen();
    }

    /// Host explicitly stopped playback.
    pub fn on_stopped(&mut self) {
        self.mode = PlaybackMode::Stopped;
        self.latched = None;
        self.watchdog.reset();
        self.update_screen();
    }

    /// External AV-sync phase flag; renders as the sync slate while
    /// playing.
    pub fn set_syncing(&mut self, syncing: bool) {
        self.syncing = syncing;
        if self.is_playing_mode() {
            self.mode = if syncing {
                PlaybackMode::Syncing
            } else {
                PlaybackMode::Playing
            };
        }
        self.update_screen();
    }

    /// Content-source hint: show the logo instead of playback.
    pub fn set_display_as_logo(&mut self, hint: bool) {
        if self.display_as_logo != hint {
            self.display_as_logo = hint;
            self.update_screen();
        }
    }

    /// Authoring-time preview slate, substituted for the idle logo.
    pub fn set_editor_preview(&mut self, enabled: bool) {
        if self.editor_preview != enabled {
            self.editor_preview = enabled;
            self.update_screen();
        }
    }

    /// Fold one normalized playback event into the mode.
    pub fn on_source_event(&mut self, event: &SourceEvent, active_is_stream: bool) {
        self.active_is_stream = active_is_stream;
        match event {
            SourceEvent::Ready => {}
            SourceEvent::Start | SourceEvent::Play => {
                // Playback demonstrably runs: release any latched error
                self.latched = None;
                self.mode = if self.syncing {
                    PlaybackMode::Syncing
                } else {
                    PlaybackMode::Playing
                };
            }
            SourceEvent::Pause | SourceEvent::End => {
                self.mode = PlaybackMode::Stopped;
            }
            SourceEvent::Loop => {}
            SourceEvent::Error(code) => {
                self.mode = PlaybackMode::Error(*code);
                if self.latch_errors {
                    self.latched = Some(*code);
                }
            }
            SourceEvent::SourceChanged => {
                // New capture identity incoming; re-observe from scratch
                self.watchdog.reset();
                self.last_capture = None;
            }
            SourceEvent::SettingsChanged => {}
        }
        self.update_screen();
    }

    // ===== Capture watchdog =====

    /// Ask for a validity re-check; no-op while one is queued.
    pub fn request_capture_check(&mut self) -> bool {
        self.watchdog.try_queue()
    }

    /// Run one validity check against the active capture frame. Fires the
    /// capture notifications, resizes dynamic targets, re-propagates, and
    /// reports when the next check is due.
    pub fn run_capture_check(&mut self, frame: Option<CaptureFrame>) -> NextCheck {
        let playing = self.is_playing_mode();
        let outcome = self.watchdog.check(frame, playing);
        self.last_capture = frame;

        self.outbox.extend(outcome.events);
        if let Some((width, height)) = outcome.resized {
            for target in &self.targets {
                target.resize_for_capture(width, height);
            }
        }
        self.update_screen();
        self.watchdog.next_check(self.is_playing_mode())
    }

    // ===== Resolution and fan-out =====

    /// Combine mode, capture validity and the latch into a content index.
    fn compute_content(&self) -> ScreenContent {
        if let Some(code) = self.latched {
            return code.screen_content();
        }
        let mut content = match self.mode {
            PlaybackMode::Uninitialized => ScreenContent::Logo,
            PlaybackMode::Stopped => ScreenContent::Logo,
            PlaybackMode::Loading => ScreenContent::Loading,
            PlaybackMode::Syncing => ScreenContent::Sync,
            PlaybackMode::Error(code) => code.screen_content(),
            PlaybackMode::Playing => {
                if self.watchdog.valid() {
                    ScreenContent::Playback
                } else {
                    let loading_stage = self.watchdog.check_cycles() <= self.loading_cycles;
                    if loading_stage && self.overrides.has(ScreenContent::Loading) {
                        ScreenContent::Loading
                    } else if !loading_stage && self.overrides.has(ScreenContent::AudioOnly) {
                        ScreenContent::AudioOnly
                    } else {
                        ScreenContent::Logo
                    }
                }
            }
        };
        if self.editor_preview && content == ScreenContent::Logo {
            content = ScreenContent::EditorPreview;
        }
        // The hint only ever replaces live/audio content, never an error
        // or loading slate
        if self.display_as_logo
            && matches!(content, ScreenContent::Playback | ScreenContent::AudioOnly)
        {
            content = ScreenContent::Logo;
        }
        content
    }

    /// Recompute the resolved presentation and push it to every channel.
    /// Safe to call redundantly: unchanged state writes nothing.
    fn update_screen(&mut self) {
        let content = self.compute_content();
        let resource = self.overrides.resolve(content).cloned();

        // No resource anywhere on the chain means raw capture pass-through
        let texture = resource
            .as_ref()
            .map(|r| r.texture)
            .or_else(|| self.last_capture.map(|f| f.texture));
        let out_size = resource
            .as_ref()
            .map(|r| (r.width, r.height))
            .or_else(|| self.last_capture.map(|f| f.resolution()));

        // Class-dependent flags only apply to the raw capture, never to
        // placeholder resources
        let live = resource.is_none() && self.last_capture.is_some();
        let params = MediaParams {
            texture,
            is_stream: live && self.active_is_stream,
            flip_y: live && self.active_is_stream,
            apply_gamma: live && self.active_is_stream && self.correct_gamma,
            fit: self.fit,
            aspect_ratio: self.aspect_ratio,
        };

        if self
            .last_applied
            .as_ref()
            .is_some_and(|(c, p)| *c == content && *p == params)
        {
            return;
        }
        debug!("screen content {:?} -> {:?}", self.content, content);

        let continuous = content == ScreenContent::Playback;
        for surface in &self.surfaces {
            surface.apply(params.texture);
        }
        for material in &self.materials {
            material.apply(&params);
        }
        for object in &self.objects {
            object.apply(&params);
        }
        for target in &self.targets {
            target.apply(&params, continuous);
        }
        for global in &self.globals {
            global.apply(&params);
        }

        if self.last_out_texture != texture {
            self.last_out_texture = texture;
            self.outbox.push(ScreenEvent::ScreenTextureChanged);
        }
        if self.last_out_size != out_size {
            self.last_out_size = out_size;
            self.outbox.push(ScreenEvent::ScreenResolutionChanged);
        }
        self.content = content;
        self.last_applied = Some((content, params));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::channels::{RenderTarget, Surface, TargetPolicy};
    use crate::screen::params::{Material, ParamValue, ShaderNameMap};
    use std::sync::{Arc, Mutex};

    fn config() -> PipelineConfig {
        PipelineConfig {
            loading_check_cycles: 3,
            ..PipelineConfig::default()
        }
    }

    fn controller() -> ScreenController {
        let mut screen = ScreenController::new(&config());
        screen.set_override(ScreenContent::Logo, VisualResource::new("logo", 512, 512));
        screen
    }

    #[test]
    fn test_initial_content_is_logo() {
        let mut screen = controller();
        screen.run_capture_check(None);
        assert_eq!(screen.content(), ScreenContent::Logo);
        assert_eq!(screen.mode(), PlaybackMode::Uninitialized);
    }

    #[test]
    fn test_mode_derivation_from_events() {
        let mut screen = controller();
        screen.on_load_started();
        assert_eq!(screen.mode(), PlaybackMode::Loading);
        assert_eq!(screen.content(), ScreenContent::Loading);

        screen.on_source_event(&SourceEvent::Start, false);
        assert_eq!(screen.mode(), PlaybackMode::Playing);

        screen.on_source_event(&SourceEvent::Pause, false);
        assert_eq!(screen.mode(), PlaybackMode::Stopped);
        assert_eq!(screen.content(), ScreenContent::Logo);

        screen.on_source_event(&SourceEvent::Error(ErrorCode::InvalidUrl), false);
        assert_eq!(screen.mode(), PlaybackMode::Error(ErrorCode::InvalidUrl));
        assert_eq!(screen.content(), ScreenContent::ErrorInvalid);
    }

    #[test]
    fn test_error_latch_holds_through_reconnect() {
        let mut screen = controller();
        screen.on_source_event(&SourceEvent::Error(ErrorCode::Generic), true);
        assert_eq!(screen.content(), ScreenContent::Error);

        // Reconnect bounces through loading; the slate must not flicker
        screen.on_source_event(&SourceEvent::Ready, true);
        assert_eq!(screen.content(), ScreenContent::Error);

        // Actual playback releases the latch
        screen.on_source_event(&SourceEvent::Start, true);
        assert_ne!(screen.content(), ScreenContent::Error);
    }

    #[test]
    fn test_latch_disabled_follows_mode() {
        let mut screen = ScreenController::new(&PipelineConfig {
            latch_errors: false,
            ..config()
        });
        screen.on_source_event(&SourceEvent::Error(ErrorCode::Generic), false);
        assert_eq!(screen.content(), ScreenContent::Error);
        screen.on_load_started();
        assert_eq!(screen.content(), ScreenContent::Loading);
    }

    #[test]
    fn test_explicit_stop_clears_latch() {
        let mut screen = controller();
        screen.on_source_event(&SourceEvent::Error(ErrorCode::RateLimited), false);
        assert_eq!(screen.content(), ScreenContent::ErrorRateLimited);
        screen.on_stopped();
        assert_eq!(screen.content(), ScreenContent::Logo);
    }

    #[test]
    fn test_two_stage_placeholder_fallback() {
        let mut screen = controller();
        screen.set_override(
            ScreenContent::Loading,
            VisualResource::new("spinner", 256, 256),
        );
        screen.set_override(
            ScreenContent::AudioOnly,
            VisualResource::new("visualizer", 256, 256),
        );
        screen.on_source_event(&SourceEvent::Start, true);

        // Invalid capture: loading placeholder for the first 3 checks
        for _ in 0..3 {
            screen.run_capture_check(None);
            assert_eq!(screen.content(), ScreenContent::Loading);
        }
        // Audio-only thereafter
        screen.run_capture_check(None);
        assert_eq!(screen.content(), ScreenContent::AudioOnly);
    }

    #[test]
    fn test_stage_fallback_without_placeholders_is_logo() {
        let mut screen = controller();
        screen.on_source_event(&SourceEvent::Start, true);
        for _ in 0..5 {
            screen.run_capture_check(None);
            assert_eq!(screen.content(), ScreenContent::Logo);
        }
    }

    #[test]
    fn test_valid_capture_is_playback() {
        let mut screen = controller();
        screen.on_source_event(&SourceEvent::Start, true);
        screen.run_capture_check(Some(CaptureFrame::new(1280, 720)));
        assert_eq!(screen.content(), ScreenContent::Playback);
        assert!(screen.capture_valid());
    }

    #[test]
    fn test_display_as_logo_hint() {
        let mut screen = controller();
        screen.on_source_event(&SourceEvent::Start, true);
        screen.run_capture_check(Some(CaptureFrame::new(1280, 720)));

        screen.set_display_as_logo(true);
        assert_eq!(screen.content(), ScreenContent::Logo);

        // Never over an error slate
        screen.on_source_event(&SourceEvent::Error(ErrorCode::Generic), true);
        assert_eq!(screen.content(), ScreenContent::Error);
    }

    #[test]
    fn test_editor_preview_substitutes_idle_logo() {
        let mut screen = controller();
        screen.set_override(
            ScreenContent::EditorPreview,
            VisualResource::new("grid", 512, 512),
        );
        screen.set_editor_preview(true);
        assert_eq!(screen.content(), ScreenContent::EditorPreview);

        // Live playback wins over the preview slate
        screen.on_source_event(&SourceEvent::Start, false);
        screen.run_capture_check(Some(CaptureFrame::new(1280, 720)));
        assert_eq!(screen.content(), ScreenContent::Playback);
    }

    #[test]
    fn test_idempotent_propagation() {
        let mut screen = controller();
        let surface = Arc::new(Mutex::new(Surface::new("screen")));
        let material = Arc::new(Mutex::new(Material::new("shared")));
        screen.add_surface(SurfaceBinding::new(Arc::clone(&surface)));
        screen.add_material(MaterialBinding::new(
            Arc::clone(&material),
            &ShaderNameMap::default(),
        ));

        screen.on_source_event(&SourceEvent::Start, true);
        screen.run_capture_check(Some(CaptureFrame::new(1280, 720)));

        let surface_version = surface.lock().expect("lock").version();
        let material_version = material.lock().expect("lock").version();

        // Same frame, same state: second pass writes nothing
        let frame = screen.last_capture;
        screen.run_capture_check(frame);
        assert_eq!(surface.lock().expect("lock").version(), surface_version);
        assert_eq!(material.lock().expect("lock").version(), material_version);
    }

    #[test]
    fn test_stream_flags_only_for_live_capture() {
        let mut screen = controller();
        let material = Arc::new(Mutex::new(Material::new("shared")));
        screen.add_material(MaterialBinding::new(
            Arc::clone(&material),
            &ShaderNameMap::default(),
        ));

        screen.on_source_event(&SourceEvent::Start, true);
        screen.run_capture_check(Some(CaptureFrame::new(1280, 720)));
        assert_eq!(
            material.lock().expect("lock").get("_IsStream"),
            Some(ParamValue::Flag(true))
        );

        // Error slate: placeholder resource, class flags off
        screen.on_source_event(&SourceEvent::Error(ErrorCode::Generic), true);
        assert_eq!(
            material.lock().expect("lock").get("_IsStream"),
            Some(ParamValue::Flag(false))
        );
    }

    #[test]
    fn test_screen_events_on_output_change() {
        let mut screen = controller();
        screen.on_source_event(&SourceEvent::Start, true);
        screen.take_events();

        screen.run_capture_check(Some(CaptureFrame::new(1280, 720)));
        let events = screen.take_events();
        assert!(events.contains(&ScreenEvent::CaptureValid));
        assert!(events.contains(&ScreenEvent::ScreenTextureChanged));
        assert!(events.contains(&ScreenEvent::ScreenResolutionChanged));
        // Capture notifications precede the applied-state notifications
        let capture_pos = events
            .iter()
            .position(|e| *e == ScreenEvent::CaptureValid)
            .expect("capture event");
        let screen_pos = events
            .iter()
            .position(|e| *e == ScreenEvent::ScreenTextureChanged)
            .expect("screen event");
        assert!(capture_pos < screen_pos);
    }

    #[test]
    fn test_dynamic_target_resizes_with_capture() {
        let mut screen = controller();
        let target = Arc::new(Mutex::new(RenderTarget::new("crt", 64, 64)));
        screen.add_target(TargetBinding::new(
            Arc::clone(&target),
            TargetPolicy {
                target_aspect: 0.0,
                ..TargetPolicy::default()
            },
            &ShaderNameMap::default(),
        ));

        screen.on_source_event(&SourceEvent::Start, true);
        screen.run_capture_check(Some(CaptureFrame::new(1920, 1080)));
        assert_eq!(target.lock().expect("lock").size(), (1920, 1080));
    }

    #[test]
    fn test_source_switch_resets_capture_observation() {
        let mut screen = controller();
        screen.on_source_event(&SourceEvent::Start, true);
        screen.run_capture_check(Some(CaptureFrame::new(1280, 720)));
        assert!(screen.capture_valid());

        screen.on_source_event(&SourceEvent::SourceChanged, false);
        assert!(!screen.capture_valid());
    }

    #[test]
    fn test_capture_check_request_guard() {
        let mut screen = controller();
        assert!(screen.request_capture_check());
        assert!(!screen.request_capture_check());
        screen.run_capture_check(None);
        assert!(screen.request_capture_check());
    }
}
