//! Playback and screen event catalog.
//!
//! Three layers of events flow through the pipeline:
//! - `DriverEvent`: raw lifecycle reports from one backend instance.
//! - `SourceEvent`: registry output — raw events that survived staleness
//!   filtering and the end-of-stream retry policy, plus registry-level
//!   notifications (source switch, settings change).
//! - `ScreenEvent`: presentation-side notifications from the capture
//!   watchdog and the fan-out pass.
//!
//! Each consumer-facing enum exposes a kind index so the event hub can keep
//! one subscriber list per kind.

/// Coarse backend error classification.
///
/// `RetryEndStream` is synthetic: the registry emits it in place of an
/// ambiguous end-of-stream while retries remain (never produced by a
/// driver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Generic,
    InvalidUrl,
    AccessBlocked,
    RateLimited,
    RetryEndStream,
}

/// Raw lifecycle event reported by a backend driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    /// Media is loaded and can start.
    Ready,
    /// First frame of a playback session rendered.
    Start,
    /// Playback reached the end of the media.
    End,
    /// Backend failure with a coarse code.
    Error(ErrorCode),
    /// Looped back to the beginning.
    Loop,
    Pause,
    Play,
}

/// Normalized playback event emitted by the source registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    Ready,
    Start,
    End,
    Error(ErrorCode),
    Loop,
    Pause,
    Play,
    /// The active handle changed (or became none).
    SourceChanged,
    /// Desired configuration changed, or no handle matches it.
    SettingsChanged,
}

/// Kind index for `SourceEvent` subscriber slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Ready,
    Start,
    End,
    Error,
    Loop,
    Pause,
    Play,
    SourceChanged,
    SettingsChanged,
}

impl SourceEvent {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceEvent::Ready => SourceKind::Ready,
            SourceEvent::Start => SourceKind::Start,
            SourceEvent::End => SourceKind::End,
            SourceEvent::Error(_) => SourceKind::Error,
            SourceEvent::Loop => SourceKind::Loop,
            SourceEvent::Pause => SourceKind::Pause,
            SourceEvent::Play => SourceKind::Play,
            SourceEvent::SourceChanged => SourceKind::SourceChanged,
            SourceEvent::SettingsChanged => SourceKind::SettingsChanged,
        }
    }
}

impl From<SourceKind> for usize {
    fn from(kind: SourceKind) -> usize {
        kind as usize
    }
}

/// Presentation-side notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEvent {
    CaptureValid,
    CaptureInvalid,
    CaptureTextureChanged,
    CaptureResolutionChanged,
    /// The texture presented on the outputs changed.
    ScreenTextureChanged,
    /// The resolution presented on the outputs changed.
    ScreenResolutionChanged,
}

/// Kind index for `ScreenEvent` subscriber slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    CaptureValid,
    CaptureInvalid,
    CaptureTextureChanged,
    CaptureResolutionChanged,
    ScreenTextureChanged,
    ScreenResolutionChanged,
}

impl ScreenEvent {
    pub fn kind(&self) -> ScreenKind {
        match self {
            ScreenEvent::CaptureValid => ScreenKind::CaptureValid,
            ScreenEvent::CaptureInvalid => ScreenKind::CaptureInvalid,
            ScreenEvent::CaptureTextureChanged => ScreenKind::CaptureTextureChanged,
            ScreenEvent::CaptureResolutionChanged => ScreenKind::CaptureResolutionChanged,
            ScreenEvent::ScreenTextureChanged => ScreenKind::ScreenTextureChanged,
            ScreenEvent::ScreenResolutionChanged => ScreenKind::ScreenResolutionChanged,
        }
    }
}

impl From<ScreenKind> for usize {
    fn from(kind: ScreenKind) -> usize {
        kind as usize
    }
}

/// Hub plumbing: events that can be routed into per-kind subscriber slots.
pub trait Kinded: Clone + Send + Sync + 'static {
    /// Number of distinct kinds.
    const KINDS: usize;

    fn kind_index(&self) -> usize;
}

impl Kinded for SourceEvent {
    const KINDS: usize = 9;

    fn kind_index(&self) -> usize {
        self.kind() as usize
    }
}

impl Kinded for ScreenEvent {
    const KINDS: usize = 6;

    fn kind_index(&self) -> usize {
        self.kind() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_indices_are_dense() {
        let source_events = [
            SourceEvent::Ready,
            SourceEvent::Start,
            SourceEvent::End,
            SourceEvent::Error(ErrorCode::Generic),
            SourceEvent::Loop,
            SourceEvent::Pause,
            SourceEvent::Play,
            SourceEvent::SourceChanged,
            SourceEvent::SettingsChanged,
        ];
        for (i, ev) in source_events.iter().enumerate() {
            assert_eq!(ev.kind_index(), i);
        }
        assert_eq!(source_events.len(), SourceEvent::KINDS);

        let screen_events = [
            ScreenEvent::CaptureValid,
            ScreenEvent::CaptureInvalid,
            ScreenEvent::CaptureTextureChanged,
            ScreenEvent::CaptureResolutionChanged,
            ScreenEvent::ScreenTextureChanged,
            ScreenEvent::ScreenResolutionChanged,
        ];
        for (i, ev) in screen_events.iter().enumerate() {
            assert_eq!(ev.kind_index(), i);
        }
        assert_eq!(screen_events.len(), ScreenEvent::KINDS);
    }

    #[test]
    fn test_error_kinds_collapse() {
        assert_eq!(
            SourceEvent::Error(ErrorCode::InvalidUrl).kind(),
            SourceEvent::Error(ErrorCode::RateLimited).kind()
        );
    }
}
