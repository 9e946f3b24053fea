//! Player facade: host intents and the cooperative pump.
//!
//! **Why**: hosts drive playback with high-level intents (play, pause,
//! load, preferences) and should never touch handles, schedulers or event
//! plumbing directly. The facade owns all of it and exposes one `tick()`
//! that advances the whole pipeline on the host's frame loop.
//!
//! # Pump order
//!
//! Each tick: scheduled tasks first (deferred stops, capture checks), then
//! the content-source hint poll, then the registry event pump feeding the
//! screen controller and the consumer hubs. Intents issued between ticks
//! take effect immediately on the registry; their events surface on the
//! next pump.
//!
//! # Auto class
//!
//! The registry requires an explicit backend class per selection; "auto"
//! lives here as a preference of `None`, resolved buffered-first.

use std::time::Instant;

use log::info;

use crate::config::PipelineConfig;
use crate::core::event_bus::EventHub;
use crate::core::events::{ScreenEvent, SourceEvent};
use crate::core::registry::SourceRegistry;
use crate::core::scheduler::{Scheduler, Task};
use crate::entities::source::{BackendClass, Latency, SourceDecl};
use crate::screen::controller::ScreenController;
use crate::screen::watchdog::NextCheck;

/// Narrow interface to playlist/queue/URL-input collaborators. The core
/// only ever asks two questions.
pub trait ContentSource {
    fn current_url(&self) -> Option<String>;

    /// Hint (not a command) that this content wants the logo shown.
    fn display_as_logo(&self) -> bool {
        false
    }
}

pub struct Player {
    registry: SourceRegistry,
    screen: ScreenController,
    scheduler: Scheduler,
    source_hub: EventHub<SourceEvent>,
    screen_hub: EventHub<ScreenEvent>,
    content_source: Option<Box<dyn ContentSource>>,
}

impl Player {
    pub fn new(decls: Vec<SourceDecl>, config: &PipelineConfig) -> Self {
        let mut player = Self {
            registry: SourceRegistry::new(decls, config),
            screen: ScreenController::new(config),
            scheduler: Scheduler::new(),
            source_hub: EventHub::new(),
            screen_hub: EventHub::new(),
            content_source: None,
        };
        // Kick off the watchdog loop
        if player.screen.request_capture_check() {
            player.scheduler.in_ticks(1, Task::CaptureCheck);
        }
        info!("player initialized, caps {:?}", player.registry.capabilities());
        player
    }

    // ===== Wiring =====

    pub fn attach_content_source(&mut self, source: Box<dyn ContentSource>) {
        self.content_source = Some(source);
    }

    /// Screen controller, for output-channel and placeholder registration.
    pub fn screen(&mut self) -> &mut ScreenController {
        &mut self.screen
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn source_events(&mut self) -> &mut EventHub<SourceEvent> {
        &mut self.source_hub
    }

    pub fn screen_events(&mut self) -> &mut EventHub<ScreenEvent> {
        &mut self.screen_hub
    }

    // ===== Intents =====

    pub fn load_url(&mut self, url: &str) {
        self.registry.load(url, &mut self.scheduler);
        self.screen.on_load_started();
    }

    pub fn play(&mut self) {
        self.registry.play();
    }

    pub fn pause(&mut self) {
        self.registry.pause();
    }

    pub fn stop(&mut self) {
        self.registry.stop();
        self.screen.on_stopped();
    }

    pub fn seek(&mut self, seconds: f64) {
        self.registry.seek(seconds);
    }

    pub fn set_loop(&mut self, looped: bool) {
        self.registry.set_loop(looped);
    }

    pub fn set_auto_resync(&mut self, auto: bool) {
        self.registry.set_auto_resync(auto);
    }

    pub fn set_preferred_class(&mut self, class: Option<BackendClass>) {
        self.registry.set_preferred_class(class, &mut self.scheduler);
    }

    pub fn set_preferred_height_index(&mut self, index: usize) {
        self.registry
            .set_preferred_height_index(index, &mut self.scheduler);
    }

    pub fn set_preferred_latency(&mut self, latency: Latency) {
        self.registry
            .set_preferred_latency(latency, &mut self.scheduler);
    }

    /// External AV-sync phase flag.
    pub fn set_syncing(&mut self, syncing: bool) {
        self.screen.set_syncing(syncing);
    }

    pub fn set_editor_preview(&mut self, enabled: bool) {
        self.screen.set_editor_preview(enabled);
    }

    // ===== Pump =====

    /// Advance the pipeline by one cooperative tick.
    pub fn tick(&mut self, now: Instant) {
        for task in self.scheduler.advance(now) {
            match task {
                Task::StopSource(id) => self.registry.deferred_stop(id),
                Task::CaptureCheck => {
                    let frame = self.registry.active_capture();
                    let next = self.screen.run_capture_check(frame);
                    self.schedule_check(next, now);
                }
            }
        }

        if let Some(source) = &self.content_source {
            let hint = source.display_as_logo();
            let next_url = source.current_url();
            self.screen.set_display_as_logo(hint);
            // A queue/playlist advancing its URL is a load request
            if let Some(url) = next_url {
                if self.registry.current_url() != Some(url.as_str()) {
                    info!("content source advanced to {}", url);
                    self.registry.load(&url, &mut self.scheduler);
                    self.screen.on_load_started();
                }
            }
        }

        for event in self.registry.pump(now) {
            let is_stream = self.registry.active_class() == Some(BackendClass::Stream);
            self.screen.on_source_event(&event, is_stream);
            if event == SourceEvent::SourceChanged {
                self.reload_after_switch();
            }
            self.source_hub.emit(event);
        }

        for event in self.screen.take_events() {
            self.screen_hub.emit(event);
        }
    }

    fn schedule_check(&mut self, next: NextCheck, now: Instant) {
        if !self.screen.request_capture_check() {
            return;
        }
        match next {
            NextCheck::Ticks(ticks) => {
                self.scheduler.in_ticks(ticks, Task::CaptureCheck);
            }
            NextCheck::After(delay) => {
                self.scheduler.after(delay, now, Task::CaptureCheck);
            }
        }
    }

    /// Continuity across a hot-swap: re-issue the current URL on the new
    /// handle and resume near the previous position if it was playing.
    fn reload_after_switch(&mut self) {
        let Some(url) = self.registry.current_url().map(str::to_string) else {
            return;
        };
        // First activation is not a switch; the load intent already ran
        if self.registry.active_id().is_none() || self.registry.previous_id().is_none() {
            return;
        }
        info!("re-issuing {} on switched source", url);
        self.registry.load(&url, &mut self.scheduler);
        self.screen.on_load_started();

        if let Some(snapshot) = self.registry.last_snapshot() {
            if snapshot.was_playing {
                self.registry.play();
                if snapshot.time.is_finite() && snapshot.time > 0.0 {
                    self.registry.seek(snapshot.time);
                }
            }
        }
    }
}
