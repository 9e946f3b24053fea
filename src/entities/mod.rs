//! Domain types: capture frames, visual resources, playback sources.

pub mod capture;
pub mod resource;
pub mod source;

pub use capture::{CaptureFrame, TextureRef};
pub use resource::VisualResource;
pub use source::{
    BackendClass, BufferedSource, Latency, PlaybackDriver, Source, SourceDecl, SourceHandle,
    SourceOps, StreamSource,
};
