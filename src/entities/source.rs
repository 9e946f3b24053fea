//! Playback sources: backend classes behind one interface.
//!
//! **Why**: the environment ships exactly two interchangeable playback
//! engines — a buffered on-demand player and a low-latency stream player —
//! with different seek/resync semantics. Selection logic (`core::registry`)
//! must treat them uniformly, so both classes sit behind `SourceOps` as a
//! closed variant set (`enum_dispatch`, no open trait objects above the
//! driver seam).
//!
//! **Used by**: `SourceRegistry` (ownership, selection, event pump),
//! `ScreenController` (capture queries via the registry).
//!
//! The actual decoder is opaque: hosts implement [`PlaybackDriver`] around
//! whatever engine they embed. Codec, DRM and transport concerns live
//! entirely behind that trait.

use enum_dispatch::enum_dispatch;
use log::debug;

use crate::core::events::DriverEvent;
use crate::entities::capture::CaptureFrame;

/// The two interchangeable playback engine classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendClass {
    /// Buffered on-demand playback (seekable, finite duration).
    Buffered,
    /// Low-latency streaming playback (live edge, typically unseekable).
    Stream,
}

/// Latency class of a streaming backend. Meaningless for buffered backends,
/// which are normalized to `Standard` at discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Latency {
    Standard,
    Low,
}

impl Latency {
    /// The opposite latency class, used for same-resolution fallback.
    pub fn other(self) -> Latency {
        match self {
            Latency::Standard => Latency::Low,
            Latency::Low => Latency::Standard,
        }
    }
}

/// Opaque playback engine implemented by the host.
///
/// All calls are non-blocking; lifecycle outcomes arrive later through
/// `poll_events()`. Live content reports a duration of 0 or infinity.
pub trait PlaybackDriver {
    fn load(&mut self, url: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, seconds: f64);
    fn set_loop(&mut self, looped: bool);

    fn is_playing(&self) -> bool;
    fn time(&self) -> f64;
    fn duration(&self) -> f64;

    /// Current capture frame metadata, if the decoder has produced one.
    fn capture(&self) -> Option<CaptureFrame>;

    /// Drain raw lifecycle events accumulated since the last poll.
    fn poll_events(&mut self) -> Vec<DriverEvent>;
}

/// Uniform operations over both backend classes.
#[enum_dispatch]
pub trait SourceOps {
    fn load(&mut self, url: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, seconds: f64);
    fn set_loop(&mut self, looped: bool);

    /// Re-align playback. Streams jump back to the live edge; buffered
    /// content has nothing to re-align.
    fn resync(&mut self);

    fn is_playing(&self) -> bool;
    fn time(&self) -> f64;
    fn duration(&self) -> f64;
    fn capture(&self) -> Option<CaptureFrame>;
    fn poll_events(&mut self) -> Vec<DriverEvent>;
}

/// Buffered on-demand source.
pub struct BufferedSource {
    driver: Box<dyn PlaybackDriver>,
}

impl BufferedSource {
    pub fn new(driver: Box<dyn PlaybackDriver>) -> Self {
        Self { driver }
    }
}

impl SourceOps for BufferedSource {
    fn load(&mut self, url: &str) {
        self.driver.load(url);
    }

    fn play(&mut self) {
        self.driver.play();
    }

    fn pause(&mut self) {
        self.driver.pause();
    }

    fn stop(&mut self) {
        self.driver.stop();
    }

    fn seek(&mut self, seconds: f64) {
        let duration = self.driver.duration();
        let target = if duration.is_finite() && duration > 0.0 {
            seconds.clamp(0.0, duration)
        } else {
            seconds.max(0.0)
        };
        self.driver.seek(target);
    }

    fn set_loop(&mut self, looped: bool) {
        self.driver.set_loop(looped);
    }

    fn resync(&mut self) {
        // On-demand content is already frame-accurate
        debug!("resync requested on buffered source, ignored");
    }

    fn is_playing(&self) -> bool {
        self.driver.is_playing()
    }

    fn time(&self) -> f64 {
        self.driver.time()
    }

    fn duration(&self) -> f64 {
        self.driver.duration()
    }

    fn capture(&self) -> Option<CaptureFrame> {
        self.driver.capture()
    }

    fn poll_events(&mut self) -> Vec<DriverEvent> {
        self.driver.poll_events()
    }
}

/// Low-latency streaming source.
pub struct StreamSource {
    driver: Box<dyn PlaybackDriver>,
    latency: Latency,
}

impl StreamSource {
    pub fn new(driver: Box<dyn PlaybackDriver>, latency: Latency) -> Self {
        Self { driver, latency }
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }
}

impl SourceOps for StreamSource {
    fn load(&mut self, url: &str) {
        self.driver.load(url);
    }

    fn play(&mut self) {
        self.driver.play();
    }

    fn pause(&mut self) {
        self.driver.pause();
    }

    fn stop(&mut self) {
        self.driver.stop();
    }

    fn seek(&mut self, seconds: f64) {
        let duration = self.driver.duration();
        if duration.is_finite() && duration > 0.0 {
            // Seekable stream recording
            self.driver.seek(seconds.clamp(0.0, duration));
        } else {
            debug!("seek to {seconds:.2}s ignored on live stream");
        }
    }

    fn set_loop(&mut self, looped: bool) {
        self.driver.set_loop(looped);
    }

    fn resync(&mut self) {
        let duration = self.driver.duration();
        if duration.is_finite() && duration > 0.0 {
            self.driver.seek(duration);
        } else {
            // Live edge: nudge the decoder by re-issuing play
            self.driver.play();
        }
    }

    fn is_playing(&self) -> bool {
        self.driver.is_playing()
    }

    fn time(&self) -> f64 {
        self.driver.time()
    }

    fn duration(&self) -> f64 {
        self.driver.duration()
    }

    fn capture(&self) -> Option<CaptureFrame> {
        self.driver.capture()
    }

    fn poll_events(&mut self) -> Vec<DriverEvent> {
        self.driver.poll_events()
    }
}

/// Closed set of playback source variants.
#[enum_dispatch(SourceOps)]
pub enum Source {
    Buffered(BufferedSource),
    Stream(StreamSource),
}

/// Static capability declaration for one backend slot, supplied once at
/// startup. A declaration without a driver is a present-but-unavailable
/// slot (excluded from selection).
pub struct SourceDecl {
    pub class: BackendClass,
    pub max_height: u32,
    pub latency: Latency,
    pub driver: Option<Box<dyn PlaybackDriver>>,
}

impl SourceDecl {
    pub fn buffered(max_height: u32, driver: Box<dyn PlaybackDriver>) -> Self {
        Self {
            class: BackendClass::Buffered,
            max_height,
            latency: Latency::Standard,
            driver: Some(driver),
        }
    }

    pub fn stream(max_height: u32, latency: Latency, driver: Box<dyn PlaybackDriver>) -> Self {
        Self {
            class: BackendClass::Stream,
            max_height,
            latency,
            driver: Some(driver),
        }
    }

    /// A declared slot with no backend attached (disabled in this
    /// deployment).
    pub fn unavailable(class: BackendClass, max_height: u32, latency: Latency) -> Self {
        Self {
            class,
            max_height,
            latency,
            driver: None,
        }
    }
}

/// Registry-owned wrapper around one backend slot: stable id, static
/// capabilities, the source instance (if available) and the last raw event
/// observed from it.
pub struct SourceHandle {
    pub id: usize,
    pub class: BackendClass,
    pub max_height: u32,
    pub latency: Latency,
    source: Option<Source>,
    pub last_event: Option<DriverEvent>,
}

impl SourceHandle {
    pub fn from_decl(id: usize, decl: SourceDecl) -> Self {
        // Latency only means something for streaming backends
        let latency = match decl.class {
            BackendClass::Buffered => Latency::Standard,
            BackendClass::Stream => decl.latency,
        };
        let source = decl.driver.map(|driver| match decl.class {
            BackendClass::Buffered => Source::Buffered(BufferedSource::new(driver)),
            BackendClass::Stream => Source::Stream(StreamSource::new(driver, latency)),
        });
        Self {
            id,
            class: decl.class,
            max_height: decl.max_height,
            latency,
            source,
            last_event: None,
        }
    }

    pub fn available(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn source_mut(&mut self) -> Option<&mut Source> {
        self.source.as_mut()
    }

    pub fn capture(&self) -> Option<CaptureFrame> {
        self.source.as_ref().and_then(|s| s.capture())
    }

    pub fn is_playing(&self) -> bool {
        self.source.as_ref().map(|s| s.is_playing()).unwrap_or(false)
    }

    pub fn time(&self) -> f64 {
        self.source.as_ref().map(|s| s.time()).unwrap_or(0.0)
    }

    pub fn duration(&self) -> f64 {
        self.source.as_ref().map(|s| s.duration()).unwrap_or(0.0)
    }
}
