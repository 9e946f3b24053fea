use clap::Parser;
use std::path::PathBuf;

use crate::entities::source::{BackendClass, Latency};

/// Media pipeline demo driver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Media URL to load into the simulated pipeline
    #[arg(value_name = "URL", default_value = "https://example.com/stream")]
    pub url: String,

    /// Preferred backend class (omit for auto: buffered first)
    #[arg(short = 'b', long = "backend", value_enum)]
    pub backend: Option<BackendArg>,

    /// Preferred resolution index (0 = highest discovered ceiling)
    #[arg(short = 'r', long = "resolution", value_name = "INDEX", default_value_t = 0)]
    pub resolution_index: usize,

    /// Prefer low-latency streaming backends
    #[arg(short = 'L', long = "low-latency")]
    pub low_latency: bool,

    /// Enable looping
    #[arg(short = 'o', long = "loop")]
    pub loop_playback: bool,

    /// Number of pump ticks to simulate
    #[arg(short = 't', long = "ticks", value_name = "N", default_value_t = 120)]
    pub ticks: u64,

    /// Pipeline config JSON (defaults used when omitted)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum BackendArg {
    Buffered,
    Stream,
}

impl From<BackendArg> for BackendClass {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Buffered => BackendClass::Buffered,
            BackendArg::Stream => BackendClass::Stream,
        }
    }
}

impl Args {
    pub fn latency(&self) -> Latency {
        if self.low_latency {
            Latency::Low
        } else {
            Latency::Standard
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
