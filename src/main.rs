use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use log::info;

use marquee::cli::Args;
use marquee::config::PipelineConfig;
use marquee::core::player::Player;
use marquee::entities::capture::CaptureFrame;
use marquee::entities::resource::VisualResource;
use marquee::entities::source::{Latency, SourceDecl};
use marquee::screen::channels::{
    MaterialBinding, RenderTarget, Surface, SurfaceBinding, TargetBinding, TargetPolicy,
};
use marquee::screen::content::ScreenContent;
use marquee::screen::params::{Material, ShaderNameMap};
use marquee::sim::SimDriver;

/// Wire a player around two simulated backends, run the pump for a while
/// and print what the pipeline does. The capture frame appears a few ticks
/// after play and drops out mid-run so the placeholder fallback is visible.
fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .init();

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    let buffered = SimDriver::on_demand(300.0).with_auto_events();
    let stream = SimDriver::live().with_auto_events();
    let decls = vec![
        SourceDecl::buffered(1080, Box::new(buffered.clone())),
        SourceDecl::stream(1080, Latency::Low, Box::new(stream.clone())),
        SourceDecl::stream(720, Latency::Standard, Box::new(SimDriver::live().with_auto_events())),
    ];

    let mut player = Player::new(decls, &config);
    info!(
        "ceilings {:?}, caps {:?}",
        player.registry().heights(),
        player.registry().capabilities()
    );

    // Outputs: one direct surface, one shared material, one dynamic target
    let surface = Arc::new(Mutex::new(Surface::new("main-screen")));
    let material = Arc::new(Mutex::new(Material::new("screen-material")));
    let target = Arc::new(Mutex::new(RenderTarget::new("mirror", 1280, 720)));

    let screen = player.screen();
    screen.set_override(ScreenContent::Logo, VisualResource::new("logo", 1024, 1024));
    screen.set_override(ScreenContent::Loading, VisualResource::new("loading", 512, 512));
    screen.set_override(ScreenContent::AudioOnly, VisualResource::new("visualizer", 512, 512));
    screen.set_override(ScreenContent::Error, VisualResource::new("error", 512, 512));
    screen.add_surface(SurfaceBinding::new(Arc::clone(&surface)));
    screen.add_material(MaterialBinding::new(
        Arc::clone(&material),
        &ShaderNameMap::default(),
    ));
    screen.add_target(TargetBinding::new(
        Arc::clone(&target),
        TargetPolicy::default(),
        &ShaderNameMap::default(),
    ));

    if let Some(backend) = args.backend {
        player.set_preferred_class(Some(backend.into()));
    }
    player.set_preferred_height_index(args.resolution_index);
    player.set_preferred_latency(args.latency());
    player.set_loop(args.loop_playback);

    player.load_url(&args.url);
    player.play();

    let start = Instant::now();
    let mut now = start;
    for tick in 0..args.ticks {
        now += Duration::from_millis(16);

        // Script the capture: up after 10 ticks, gone for a stretch, back
        let active = player.registry().active_id();
        let sim = match active {
            Some(0) => Some(&buffered),
            Some(1) => Some(&stream),
            _ => None,
        };
        if let Some(sim) = sim {
            match tick {
                10 => sim.set_capture(Some(CaptureFrame::new(1920, 1080))),
                60 => sim.set_capture(None),
                90 => sim.set_capture(Some(CaptureFrame::new(1280, 720))),
                _ => {}
            }
        }

        player.tick(now);

        for event in player.source_events().poll() {
            println!("[{:>3}] source: {:?}", tick, event);
        }
        for event in player.screen_events().poll() {
            println!("[{:>3}] screen: {:?}  (showing {:?})", tick, event, {
                let screen = player.screen();
                screen.content()
            });
        }
    }

    let surface = surface.lock().expect("lock");
    let target = target.lock().expect("lock");
    println!(
        "final: content={:?} surface_tex={:?} target={}x{} realloc={} double_buffer={}",
        player.screen().content(),
        surface.resource().map(|t| t.id()),
        target.size().0,
        target.size().1,
        target.reallocations(),
        target.double_buffered(),
    );
    Ok(())
}
