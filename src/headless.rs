use anyhow::{Context, Result};
use pixeltrail_render::{RenderContext, Renderer, RendererConfig, TextureFormat};
use std::path::PathBuf;
use std::time::Instant;

use crate::clock::FrameClock;
use crate::config::{BackgroundKind, HostConfig};
use crate::scene::{gradient_background, ParticleFeed};

pub struct HeadlessConfig {
    pub host: HostConfig,
    pub frames: u64,
    pub screenshot: Option<PathBuf>,
    /// Sleep between ticks to honour the tick rate instead of running flat out.
    pub paced: bool,
}

pub fn run(cfg: HeadlessConfig) -> Result<()> {
    let size = (cfg.host.width, cfg.host.height);
    let context = pollster::block_on(RenderContext::new_headless(size, TextureFormat::Rgba8Unorm))
        .context("failed to create headless rendering context")?;

    let mut renderer = Renderer::new(RendererConfig {
        capacity: cfg.host.capacity,
    });
    renderer.initialize(context);

    if cfg.host.background == BackgroundKind::Gradient {
        renderer.set_background(size.0, size.1, &gradient_background(size.0, size.1))?;
    }

    let mut feed = ParticleFeed::new(
        size,
        cfg.host.dynamic_per_tick,
        cfg.host.static_per_tick,
        cfg.host.seed,
    );

    let started = Instant::now();
    let mut clock = FrameClock::new(cfg.host.tick_rate_hz, started);
    let mut points = 0u64;
    while clock.ticks() < cfg.frames {
        if cfg.paced {
            let now = Instant::now();
            if !clock.poll(now) {
                std::thread::sleep(clock.next_deadline().saturating_duration_since(now));
                continue;
            }
        } else {
            clock.poll(clock.next_deadline());
        }

        feed.feed(&mut renderer);
        let stats = renderer.render();
        points += u64::from(stats.points());
    }

    tracing::info!(
        frames = clock.ticks(),
        points,
        tick_ms = clock.interval().as_secs_f64() * 1000.0,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "headless run finished"
    );

    if let Some(path) = cfg.screenshot.as_ref() {
        let frame = renderer.capture_frame()?;
        frame
            .save_png(path)
            .with_context(|| format!("failed to save screenshot {}", path.display()))?;
        tracing::info!(path = %path.display(), "screenshot written");
    }

    Ok(())
}
