//! pixeltrail - colored point particles over a persistent trail layer
//!
//! Host executable: owns the window (or a headless target), paces frame
//! ticks and feeds random particles to the renderer.

mod clock;
mod config;
mod headless;
mod scene;

use anyhow::{Context, Result};
use clock::FrameClock;
use config::{BackgroundKind, HostConfig, DEFAULT_CONFIG_PATH};
use pixeltrail_render::{RenderContext, Renderer, RendererConfig, WindowConfig, WindowManager};
use scene::{gradient_background, ParticleFeed};
use std::{env, path::PathBuf, time::Instant};
use tracing::info;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::ControlFlow;
use winit::keyboard::{KeyCode, PhysicalKey};

const DEFAULT_HEADLESS_FRAMES: u64 = 120;

fn main() -> Result<()> {
    // Initialize tracing with WARN level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    info!("Starting pixeltrail v{}", env!("CARGO_PKG_VERSION"));

    let cli = CliOptions::parse(env::args().skip(1));
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut host = HostConfig::load_from_path(&config_path);
    if let Some((width, height)) = cli.resolution {
        host.width = width;
        host.height = height;
        host.sanitize();
    }

    if cli.write_config {
        host.save_to_path(&config_path)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        info!(path = %config_path.display(), "configuration written");
    }

    if cli.headless {
        return headless::run(headless::HeadlessConfig {
            host,
            frames: cli.frames.unwrap_or(DEFAULT_HEADLESS_FRAMES),
            screenshot: cli.screenshot,
            paced: cli.paced,
        });
    }

    if cli.screenshot.is_some() {
        tracing::warn!("--screenshot has no effect without --headless");
    }
    run_windowed(host, cli.frames)
}

fn run_windowed(host: HostConfig, max_frames: Option<u64>) -> Result<()> {
    let window_manager = WindowManager::new(WindowConfig {
        title: "pixeltrail".to_string(),
        width: host.width,
        height: host.height,
        resizable: false,
    })?;

    let context = pollster::block_on(RenderContext::new(window_manager.window()))
        .context("failed to create rendering context")?;
    let size = context.size;

    let mut renderer = Renderer::new(RendererConfig {
        capacity: host.capacity,
    });
    renderer.initialize(context);

    if host.background == BackgroundKind::Gradient {
        renderer.set_background(size.0, size.1, &gradient_background(size.0, size.1))?;
    }

    let mut feed = ParticleFeed::new(
        size,
        host.dynamic_per_tick,
        host.static_per_tick,
        host.seed,
    );
    let mut clock = FrameClock::new(host.tick_rate_hz, Instant::now());

    window_manager.run(move |event, window, elwt| {
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => return false,
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state == ElementState::Pressed {
                        match event.physical_key {
                            PhysicalKey::Code(KeyCode::Escape) => return false,
                            PhysicalKey::Code(KeyCode::KeyR) => {
                                info!("clearing trail");
                                renderer.reset();
                            }
                            _ => {}
                        }
                    }
                }
                WindowEvent::Resized(new_size) => {
                    renderer.resize((new_size.width, new_size.height));
                    if let Some(size) = renderer.size() {
                        feed.set_size(size);
                    }
                }
                WindowEvent::RedrawRequested => {
                    feed.feed(&mut renderer);
                    let stats = renderer.render();
                    if stats.dropped_dynamic > 0 || stats.dropped_static > 0 {
                        tracing::debug!(?stats, "particles dropped this frame");
                    }
                    if max_frames.is_some_and(|max| clock.ticks() >= max) {
                        info!(frames = clock.ticks(), "frame limit reached");
                        return false;
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                if clock.poll(Instant::now()) {
                    window.request_redraw();
                }
                elwt.set_control_flow(ControlFlow::WaitUntil(clock.next_deadline()));
            }
            _ => {}
        }
        true
    })?;

    info!("pixeltrail shutting down");
    Ok(())
}

#[derive(Debug, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    headless: bool,
    paced: bool,
    write_config: bool,
    frames: Option<u64>,
    screenshot: Option<PathBuf>,
    resolution: Option<(u32, u32)>,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => opts.headless = true,
                "--paced" => opts.paced = true,
                "--write-config" => opts.write_config = true,
                "--config" => {
                    if let Some(path) = args.next() {
                        opts.config = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--config requires a file path");
                    }
                }
                "--frames" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<u64>() {
                            Ok(value) => opts.frames = Some(value),
                            Err(err) => {
                                tracing::error!(%err, value = %raw, "--frames must be an integer");
                            }
                        }
                    } else {
                        tracing::error!("--frames requires an integer");
                    }
                }
                "--screenshot" => {
                    if let Some(path) = args.next() {
                        opts.screenshot = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--screenshot requires a file path");
                    }
                }
                "--resolution" => {
                    if let Some(raw) = args.next() {
                        match parse_resolution(&raw) {
                            Some(value) => opts.resolution = Some(value),
                            None => {
                                tracing::error!(value = %raw, "--resolution must look like 300x300");
                            }
                        }
                    } else {
                        tracing::error!("--resolution requires WIDTHxHEIGHT");
                    }
                }
                other => tracing::warn!(arg = other, "ignoring unknown argument"),
            }
        }

        opts
    }
}

fn parse_resolution(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.split_once(['x', 'X'])?;
    let width = w.trim().parse::<u32>().ok()?;
    let height = h.trim().parse::<u32>().ok()?;
    (width > 0 && height > 0).then_some((width, height))
}
