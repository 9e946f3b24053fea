//! Pipeline tunables, set once at startup.
//!
//! Everything here is plain data: the demo binary loads it from JSON, hosts
//! embed it directly. Handle declarations and output-channel registrations
//! are code-level configuration (they carry live driver/target references)
//! and live on `SourceDecl` / `ScreenController` instead.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seconds of playback under which an end event on live content is
    /// treated as backend noise and suppressed.
    pub end_grace_secs: f64,

    /// Ambiguous live-stream end events converted to retry errors before
    /// a real end is forwarded.
    pub max_end_retries: u32,

    /// Durations above this (finite) count as seekable on-demand content;
    /// at or below, content is treated as live.
    pub seekable_min_secs: f64,

    /// Minimum width and height for a capture frame to count as valid.
    pub min_capture_size: u32,

    /// Re-check interval once capture is stably valid.
    pub idle_check_secs: f64,

    /// Validity-check cycles showing the loading placeholder before the
    /// audio-only placeholder takes over.
    pub loading_check_cycles: u32,

    /// Keep showing an error screen through transient non-error modes
    /// until playback actually restarts.
    pub latch_errors: bool,

    /// Apply gamma correction when presenting raw stream capture.
    pub correct_gamma: bool,

    /// Upper bound for either render-target dimension when resizing.
    pub max_target_dim: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            end_grace_secs: 10.0,
            max_end_retries: 3,
            seekable_min_secs: 1.0,
            min_capture_size: 16,
            idle_check_secs: 5.0,
            loading_check_cycles: 50,
            latch_errors: true,
            correct_gamma: false,
            max_target_dim: 4096,
        }
    }
}

impl PipelineConfig {
    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.idle_check_secs.max(0.0))
    }

    pub fn end_grace(&self) -> Duration {
        Duration::from_secs_f64(self.end_grace_secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.max_end_retries, 3);
        assert_eq!(cfg.min_capture_size, 16);
        assert!(cfg.latch_errors);
        assert_eq!(cfg.end_grace(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"max_end_retries": 1, "end_grace_secs": 2.5}"#)
                .expect("parse");
        assert_eq!(cfg.max_end_retries, 1);
        assert_eq!(cfg.end_grace_secs, 2.5);
        // Untouched fields keep defaults
        assert_eq!(cfg.loading_check_cycles, 50);
    }
}
