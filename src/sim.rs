//! Scripted playback driver for demos and tests.
//!
//! `SimDriver` is a clone-able handle over shared state, so a test (or the
//! demo binary) can keep one clone for scripting — queueing lifecycle
//! events, changing the capture frame — while the registry owns another
//! boxed into a source. No real media is touched.

use std::sync::{Arc, Mutex};

use crate::core::events::DriverEvent;
use crate::entities::capture::CaptureFrame;

#[derive(Debug, Default)]
struct SimState {
    url: Option<String>,
    playing: bool,
    looped: bool,
    time: f64,
    duration: f64,
    capture: Option<CaptureFrame>,
    queued: Vec<DriverEvent>,
    auto_events: bool,
    load_calls: u32,
    play_calls: u32,
    stop_calls: u32,
}

/// Simulated backend driver with externally scriptable state.
#[derive(Clone)]
pub struct SimDriver {
    state: Arc<Mutex<SimState>>,
}

impl SimDriver {
    /// Seekable on-demand content with a finite duration.
    pub fn on_demand(duration: f64) -> Self {
        let driver = Self::empty();
        driver.state.lock().expect("lock").duration = duration;
        driver
    }

    /// Live stream: infinite duration, unseekable.
    pub fn live() -> Self {
        let driver = Self::empty();
        driver.state.lock().expect("lock").duration = f64::INFINITY;
        driver
    }

    fn empty() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Queue Ready on load and Play/Start on play automatically, so the
    /// demo binary gets a plausible lifecycle without a script.
    pub fn with_auto_events(self) -> Self {
        self.state.lock().expect("lock").auto_events = true;
        self
    }

    // ===== Scripting surface =====

    /// Queue a raw event for the next `poll_events`.
    pub fn push_event(&self, event: DriverEvent) {
        self.state.lock().expect("lock").queued.push(event);
    }

    pub fn set_capture(&self, capture: Option<CaptureFrame>) {
        self.state.lock().expect("lock").capture = capture;
    }

    pub fn set_playing(&self, playing: bool) {
        self.state.lock().expect("lock").playing = playing;
    }

    pub fn set_duration(&self, duration: f64) {
        self.state.lock().expect("lock").duration = duration;
    }

    // ===== Inspection surface =====

    pub fn loaded_url(&self) -> Option<String> {
        self.state.lock().expect("lock").url.clone()
    }

    pub fn time(&self) -> f64 {
        self.state.lock().expect("lock").time
    }

    pub fn looped(&self) -> bool {
        self.state.lock().expect("lock").looped
    }

    pub fn load_count(&self) -> u32 {
        self.state.lock().expect("lock").load_calls
    }

    pub fn play_requested(&self) -> bool {
        self.state.lock().expect("lock").play_calls > 0
    }

    pub fn stop_count(&self) -> u32 {
        self.state.lock().expect("lock").stop_calls
    }
}

impl crate::entities::source::PlaybackDriver for SimDriver {
    fn load(&mut self, url: &str) {
        let mut state = self.state.lock().expect("lock");
        state.url = Some(url.to_string());
        state.load_calls += 1;
        if state.auto_events {
            state.queued.push(DriverEvent::Ready);
        }
    }

    fn play(&mut self) {
        let mut state = self.state.lock().expect("lock");
        state.playing = true;
        state.play_calls += 1;
        if state.auto_events {
            state.queued.push(DriverEvent::Play);
            state.queued.push(DriverEvent::Start);
        }
    }

    fn pause(&mut self) {
        let mut state = self.state.lock().expect("lock");
        state.playing = false;
        if state.auto_events {
            state.queued.push(DriverEvent::Pause);
        }
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().expect("lock");
        state.playing = false;
        state.time = 0.0;
        state.stop_calls += 1;
    }

    fn seek(&mut self, seconds: f64) {
        self.state.lock().expect("lock").time = seconds;
    }

    fn set_loop(&mut self, looped: bool) {
        self.state.lock().expect("lock").looped = looped;
    }

    fn is_playing(&self) -> bool {
        self.state.lock().expect("lock").playing
    }

    fn time(&self) -> f64 {
        self.state.lock().expect("lock").time
    }

    fn duration(&self) -> f64 {
        self.state.lock().expect("lock").duration
    }

    fn capture(&self) -> Option<CaptureFrame> {
        self.state.lock().expect("lock").capture
    }

    fn poll_events(&mut self) -> Vec<DriverEvent> {
        std::mem::take(&mut self.state.lock().expect("lock").queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::source::PlaybackDriver;

    #[test]
    fn test_poll_drains_queue() {
        let sim = SimDriver::live();
        sim.push_event(DriverEvent::Ready);
        sim.push_event(DriverEvent::Start);

        let mut driver = sim.clone();
        assert_eq!(
            driver.poll_events(),
            vec![DriverEvent::Ready, DriverEvent::Start]
        );
        assert!(driver.poll_events().is_empty());
    }

    #[test]
    fn test_auto_events_on_load_and_play() {
        let sim = SimDriver::on_demand(60.0).with_auto_events();
        let mut driver = sim.clone();
        driver.load("https://example.com/a.mp4");
        driver.play();
        assert_eq!(
            driver.poll_events(),
            vec![DriverEvent::Ready, DriverEvent::Play, DriverEvent::Start]
        );
        assert_eq!(sim.loaded_url().as_deref(), Some("https://example.com/a.mp4"));
    }
}
