//! Presentation layer: content resolution, output channels, watchdog.

pub mod channels;
pub mod content;
pub mod controller;
pub mod params;
pub mod watchdog;

pub use channels::{
    GlobalBinding, MaterialBinding, ObjectBinding, RefreshMode, RenderObject, RenderTarget,
    Surface, SurfaceBinding, TargetBinding, TargetPolicy, global_param, set_global_param,
};
pub use content::{OverrideTable, ScreenContent};
pub use controller::{PlaybackMode, ScreenController};
pub use params::{FitMode, Material, MediaParams, ParamValue, ShaderNameMap, SlotKey};
pub use watchdog::{CaptureWatchdog, NextCheck};
