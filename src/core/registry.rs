//! Source registry: backend discovery, best-match selection, hot-swap.
//!
//! **Why**: deployments ship an arbitrary mix of backend slots (buffered
//! and streaming, several resolution ceilings, two latency classes), and
//! any of them can be absent. Playback intents must keep working against
//! "the best available match" while the desired configuration changes at
//! runtime, without ever having two backends active at once.
//!
//! **Used by**: `Player` (intents + pump), `ScreenController` (capture
//! queries through the facade).
//!
//! # Selection
//!
//! Capability tables are computed once at startup. Resolution ceilings are
//! sorted descending, so index 0 is the highest available quality. Lookup
//! tries the exact height index first, then scans the remaining indices in
//! order; for streaming, the other latency class at the same height is
//! preferred over widening the height search.
//!
//! # Switching
//!
//! At most one handle is active. On a switch the outgoing handle's
//! play-state snapshot is recorded for continuity, its stop is deferred by
//! one scheduler tick (avoids the same-tick double-stop race), and the
//! incoming handle inherits the loop and auto-resync flags. Events from a
//! no-longer-active handle are dropped on arrival.
//!
//! # End-of-stream retry
//!
//! Live backends report spurious ends. Within a grace window after start
//! they are suppressed outright; past it they convert to synthetic retry
//! errors until the retry budget is exhausted, and only then is a real end
//! forwarded. The budget resets on the next observed start.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::core::events::{DriverEvent, ErrorCode, SourceEvent};
use crate::core::scheduler::{Scheduler, Task};
use crate::entities::capture::CaptureFrame;
use crate::entities::source::{BackendClass, Latency, SourceDecl, SourceHandle, SourceOps};

/// What discovery found, for consumers that render pickers. Selection
/// itself never reads these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub has_buffered: bool,
    pub has_stream: bool,
    pub multiple_resolutions: bool,
    pub mixed_latency: bool,
}

/// Outgoing handle state captured at switch time, for continuity
/// heuristics downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSnapshot {
    pub was_playing: bool,
    pub time: f64,
    pub duration: f64,
}

/// Desired configuration tuple. `class: None` means auto (buffered tried
/// first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Desired {
    pub class: Option<BackendClass>,
    pub height_index: usize,
    pub latency: Latency,
}

impl Default for Desired {
    fn default() -> Self {
        Self {
            class: None,
            height_index: 0,
            latency: Latency::Standard,
        }
    }
}

pub struct SourceRegistry {
    handles: Vec<SourceHandle>,
    /// Distinct resolution ceilings across live handles, highest first.
    heights: Vec<u32>,
    slots: HashMap<(BackendClass, usize, Latency), usize>,
    caps: Capabilities,

    active: Option<usize>,
    previous: Option<usize>,
    desired: Desired,
    loop_enabled: bool,
    auto_resync: bool,
    current_url: Option<String>,

    started_at: Option<Instant>,
    retries: u32,
    last_snapshot: Option<PlaybackSnapshot>,

    end_grace: Duration,
    max_retries: u32,
    seekable_min_secs: f64,

    outbox: Vec<SourceEvent>,
}

impl SourceRegistry {
    pub fn new(decls: Vec<SourceDecl>, config: &PipelineConfig) -> Self {
        let handles: Vec<SourceHandle> = decls
            .into_iter()
            .enumerate()
            .map(|(id, decl)| SourceHandle::from_decl(id, decl))
            .collect();

        let mut registry = Self {
            handles,
            heights: Vec::new(),
            slots: HashMap::new(),
            caps: Capabilities::default(),
            active: None,
            previous: None,
            desired: Desired::default(),
            loop_enabled: false,
            auto_resync: false,
            current_url: None,
            started_at: None,
            retries: 0,
            last_snapshot: None,
            end_grace: config.end_grace(),
            max_retries: config.max_end_retries,
            seekable_min_secs: config.seekable_min_secs,
            outbox: Vec::new(),
        };
        registry.discover();
        registry
    }

    /// Build the capability tables from the live handles. Run once.
    fn discover(&mut self) {
        let mut heights: Vec<u32> = self
            .handles
            .iter()
            .filter(|h| h.available())
            .map(|h| h.max_height)
            .collect();
        heights.sort_unstable_by(|a, b| b.cmp(a));
        heights.dedup();
        self.heights = heights;

        let mut latencies_seen: Vec<Latency> = Vec::new();
        for handle in self.handles.iter().filter(|h| h.available()) {
            match handle.class {
                BackendClass::Buffered => self.caps.has_buffered = true,
                BackendClass::Stream => self.caps.has_stream = true,
            }
            if !latencies_seen.contains(&handle.latency) {
                latencies_seen.push(handle.latency);
            }

            let index = self
                .heights
                .iter()
                .position(|&h| h == handle.max_height)
                .expect("discovered height");
            let key = (handle.class, index, handle.latency);
            if let Some(&claimed) = self.slots.get(&key) {
                debug!(
                    "handle {} duplicates capability slot {:?} (kept handle {})",
                    handle.id, key, claimed
                );
            } else {
                self.slots.insert(key, handle.id);
            }
        }
        self.caps.multiple_resolutions = self.heights.len() >= 2;
        self.caps.mixed_latency = latencies_seen.len() >= 2;

        info!(
            "discovered {} live handle(s), ceilings {:?}, caps {:?}",
            self.handles.iter().filter(|h| h.available()).count(),
            self.heights,
            self.caps
        );
    }

    // ===== Queries =====

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn heights(&self) -> &[u32] {
        &self.heights
    }

    pub fn active_id(&self) -> Option<usize> {
        self.active
    }

    pub fn previous_id(&self) -> Option<usize> {
        self.previous
    }

    pub fn desired(&self) -> Desired {
        self.desired
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn last_snapshot(&self) -> Option<PlaybackSnapshot> {
        self.last_snapshot
    }

    pub fn handle(&self, id: usize) -> Option<&SourceHandle> {
        self.handles.get(id)
    }

    fn active_handle(&self) -> Option<&SourceHandle> {
        self.active.and_then(|id| self.handles.get(id))
    }

    fn active_handle_mut(&mut self) -> Option<&mut SourceHandle> {
        let id = self.active?;
        self.handles.get_mut(id)
    }

    /// Capture frame of the active handle, polled by the watchdog.
    pub fn active_capture(&self) -> Option<CaptureFrame> {
        self.active_handle().and_then(|h| h.capture())
    }

    pub fn active_class(&self) -> Option<BackendClass> {
        self.active_handle().map(|h| h.class)
    }

    // ===== Selection =====

    fn slot(&self, class: BackendClass, index: usize, latency: Latency) -> Option<usize> {
        self.slots.get(&(class, index, latency)).copied()
    }

    /// Best available handle for an explicit class. Pure function of the
    /// capability tables: the exact height index wins, then the other
    /// latency at that height (streaming only), then the same pair over
    /// the remaining indices in order.
    pub fn select_best(
        &self,
        class: BackendClass,
        height_index: usize,
        latency: Latency,
    ) -> Option<usize> {
        let candidates =
            std::iter::once(height_index).chain((0..self.heights.len()).filter(|&i| i != height_index));
        for index in candidates {
            let found = match class {
                BackendClass::Buffered => self.slot(class, index, Latency::Standard),
                BackendClass::Stream => self
                    .slot(class, index, latency)
                    .or_else(|| self.slot(class, index, latency.other())),
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Class preference order for the current desired tuple: explicit, or
    /// buffered-then-streaming for auto.
    fn class_order(&self) -> &'static [BackendClass] {
        match self.desired.class {
            Some(BackendClass::Buffered) => &[BackendClass::Buffered],
            Some(BackendClass::Stream) => &[BackendClass::Stream],
            None => &[BackendClass::Buffered, BackendClass::Stream],
        }
    }

    /// Re-run selection against the desired tuple and switch if the
    /// outcome differs from the active handle.
    fn refresh_selection(&mut self, sched: &mut Scheduler) {
        let selected = self.class_order().iter().find_map(|&class| {
            self.select_best(class, self.desired.height_index, self.desired.latency)
        });
        match selected {
            Some(id) => self.activate(id, sched),
            None => {
                warn!("no handle matches desired {:?}", self.desired);
                self.deactivate(sched);
                self.outbox.push(SourceEvent::SettingsChanged);
            }
        }
    }

    fn snapshot_outgoing(&mut self, id: usize) {
        if let Some(handle) = self.handles.get(id) {
            self.last_snapshot = Some(PlaybackSnapshot {
                was_playing: handle.is_playing(),
                time: handle.time(),
                duration: handle.duration(),
            });
        }
    }

    fn activate(&mut self, id: usize, sched: &mut Scheduler) {
        if self.active == Some(id) {
            return;
        }
        if let Some(old) = self.active {
            self.snapshot_outgoing(old);
            // Deferred by one tick so the old backend's stop never lands in
            // the same cycle as the new backend's activation
            sched.in_ticks(1, Task::StopSource(old));
            self.previous = Some(old);
        }
        self.active = Some(id);
        info!(
            "source changed: {:?} -> {} ({:?})",
            self.previous,
            id,
            self.handles[id].class
        );

        let loop_enabled = self.loop_enabled;
        let auto_resync = self.auto_resync;
        if let Some(source) = self.handles[id].source_mut() {
            source.set_loop(loop_enabled);
            if auto_resync {
                source.resync();
            }
        }
        self.outbox.push(SourceEvent::SourceChanged);
    }

    fn deactivate(&mut self, sched: &mut Scheduler) {
        if let Some(old) = self.active.take() {
            self.snapshot_outgoing(old);
            sched.in_ticks(1, Task::StopSource(old));
            self.previous = Some(old);
            self.outbox.push(SourceEvent::SourceChanged);
        }
    }

    /// Execute a deferred stop. Runs unconditionally: the handle may have
    /// been reactivated since the switch, but stop is idempotent and the
    /// reactivation path re-issues load/play afterwards.
    pub fn deferred_stop(&mut self, id: usize) {
        if self.active == Some(id) {
            debug!("deferred stop hits reactivated handle {}", id);
        }
        if let Some(source) = self.handles.get_mut(id).and_then(|h| h.source_mut()) {
            source.stop();
        }
    }

    // ===== Preferences =====

    pub fn set_preferred_class(&mut self, class: Option<BackendClass>, sched: &mut Scheduler) {
        if self.desired.class != class {
            self.desired.class = class;
            self.outbox.push(SourceEvent::SettingsChanged);
            self.refresh_selection(sched);
        }
    }

    pub fn set_preferred_height_index(&mut self, index: usize, sched: &mut Scheduler) {
        if self.desired.height_index != index {
            self.desired.height_index = index;
            self.outbox.push(SourceEvent::SettingsChanged);
            self.refresh_selection(sched);
        }
    }

    pub fn set_preferred_latency(&mut self, latency: Latency, sched: &mut Scheduler) {
        if self.desired.latency != latency {
            self.desired.latency = latency;
            self.outbox.push(SourceEvent::SettingsChanged);
            self.refresh_selection(sched);
        }
    }

    pub fn set_loop(&mut self, looped: bool) {
        self.loop_enabled = looped;
        if let Some(source) = self.active_handle_mut().and_then(|h| h.source_mut()) {
            source.set_loop(looped);
        }
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn set_auto_resync(&mut self, auto: bool) {
        self.auto_resync = auto;
    }

    // ===== Playback intents =====

    pub fn load(&mut self, url: &str, sched: &mut Scheduler) {
        self.current_url = Some(url.to_string());
        if self.active.is_none() {
            self.refresh_selection(sched);
        }
        match self.active_handle_mut().and_then(|h| h.source_mut()) {
            Some(source) => source.load(url),
            None => debug!("load({}) with no active handle, ignored", url),
        }
    }

    pub fn play(&mut self) {
        match self.active_handle_mut().and_then(|h| h.source_mut()) {
            Some(source) => source.play(),
            None => debug!("play with no active handle, ignored"),
        }
    }

    pub fn pause(&mut self) {
        match self.active_handle_mut().and_then(|h| h.source_mut()) {
            Some(source) => source.pause(),
            None => debug!("pause with no active handle, ignored"),
        }
    }

    pub fn stop(&mut self) {
        self.started_at = None;
        match self.active_handle_mut().and_then(|h| h.source_mut()) {
            Some(source) => source.stop(),
            None => debug!("stop with no active handle, ignored"),
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        match self.active_handle_mut().and_then(|h| h.source_mut()) {
            Some(source) => source.seek(seconds),
            None => debug!("seek with no active handle, ignored"),
        }
    }

    pub fn resync(&mut self) {
        if let Some(source) = self.active_handle_mut().and_then(|h| h.source_mut()) {
            source.resync();
        }
    }

    // ===== Event pump =====

    /// Poll every handle for raw events, drop the stale ones, normalize
    /// the rest. Returns the events emitted since the last pump (intents
    /// in between included, in order).
    pub fn pump(&mut self, now: Instant) -> Vec<SourceEvent> {
        let mut raw = Vec::new();
        for handle in &mut self.handles {
            let id = handle.id;
            let events = match handle.source_mut() {
                Some(source) => source.poll_events(),
                None => continue,
            };
            for event in events {
                handle.last_event = Some(event);
                raw.push((id, event));
            }
        }

        for (id, event) in raw {
            if self.active != Some(id) {
                debug!("ignored {:?} from non-active handle {}", event, id);
                continue;
            }
            self.normalize(event, now);
        }
        std::mem::take(&mut self.outbox)
    }

    fn normalize(&mut self, event: DriverEvent, now: Instant) {
        match event {
            DriverEvent::Ready => self.outbox.push(SourceEvent::Ready),
            DriverEvent::Play => self.outbox.push(SourceEvent::Play),
            DriverEvent::Pause => self.outbox.push(SourceEvent::Pause),
            DriverEvent::Loop => self.outbox.push(SourceEvent::Loop),
            DriverEvent::Start => {
                self.started_at = Some(now);
                self.retries = 0;
                self.outbox.push(SourceEvent::Start);
            }
            DriverEvent::End => self.handle_end(now),
            DriverEvent::Error(code) => self.handle_error(code),
        }
    }

    /// Ambiguous end-of-stream policy. On-demand content forwards ends
    /// unconditionally; live content goes through grace suppression and
    /// the bounded retry budget.
    fn handle_end(&mut self, now: Instant) {
        let duration = self.active_handle().map(|h| h.duration()).unwrap_or(0.0);
        if duration.is_finite() && duration > self.seekable_min_secs {
            self.outbox.push(SourceEvent::End);
            return;
        }

        let Some(started) = self.started_at else {
            // Never saw a start on this handle; nothing to retry toward
            self.outbox.push(SourceEvent::End);
            return;
        };
        let elapsed = now.duration_since(started);
        if elapsed < self.end_grace {
            debug!(
                "suppressed end after {:.1}s of live playback (grace {:.1}s)",
                elapsed.as_secs_f64(),
                self.end_grace.as_secs_f64()
            );
            return;
        }
        if self.retries < self.max_retries {
            self.retries += 1;
            warn!(
                "live stream ended, retry {}/{}",
                self.retries, self.max_retries
            );
            self.outbox
                .push(SourceEvent::Error(ErrorCode::RetryEndStream));
        } else {
            info!("live stream retry budget exhausted, forwarding end");
            self.outbox.push(SourceEvent::End);
        }
    }

    /// A genuine backend error during a pending retry cycle spends retry
    /// budget instead of surfacing immediately.
    fn handle_error(&mut self, code: ErrorCode) {
        if self.retries > 0 && self.retries < self.max_retries {
            self.retries += 1;
            warn!(
                "backend error {:?} folded into retry {}/{}",
                code, self.retries, self.max_retries
            );
            self.outbox
                .push(SourceEvent::Error(ErrorCode::RetryEndStream));
        } else {
            self.outbox.push(SourceEvent::Error(code));
        }
    }

    /// Apply the desired tuple for the first time (or after handles became
    /// selectable again).
    pub fn ensure_selection(&mut self, sched: &mut Scheduler) {
        if self.active.is_none() {
            self.refresh_selection(sched);
        }
    }
}
