//! MARQUEE - media-source orchestration and presentation pipeline
//!
//! Re-exports all modules for use by binary targets and embedding hosts.

// Core engine (events, scheduler, registry, player)
pub mod core;

// Domain entities and presentation layer
pub mod config;
pub mod entities;
pub mod screen;
pub mod sim;

// App modules
pub mod cli;

// Re-export commonly used types from core
pub use core::event_bus::{EventHub, ListenerId};
pub use core::events::{DriverEvent, ErrorCode, ScreenEvent, SourceEvent};
pub use core::player::{ContentSource, Player};
pub use core::registry::SourceRegistry;

// Re-export entities and screen types
pub use config::PipelineConfig;
pub use entities::{BackendClass, CaptureFrame, Latency, PlaybackDriver, SourceDecl, TextureRef, VisualResource};
pub use screen::{MediaParams, ScreenContent, ScreenController, ShaderNameMap};
pub use sim::SimDriver;
