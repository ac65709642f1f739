//! Frame protocol scenarios rendered into a headless target and read back.
//!
//! Each test skips (with a note on stderr) when no GPU adapter, hardware or
//! software, is available.

use pixeltrail_render::{FrameCapture, RenderContext, RenderError, Renderer, RendererConfig};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const BLACK: [u8; 4] = [0, 0, 0, 255];

fn headless_renderer(capacity: usize) -> Option<Renderer> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let context = match pollster::block_on(RenderContext::new_headless(
        (WIDTH, HEIGHT),
        wgpu::TextureFormat::Rgba8Unorm,
    )) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("skipping: {err}");
            return None;
        }
    };

    let mut renderer = Renderer::new(RendererConfig { capacity });
    renderer.initialize(context);
    Some(renderer)
}

fn capture(renderer: &Renderer) -> FrameCapture {
    renderer.capture_frame().expect("capture frame")
}

#[test]
fn two_dynamic_particles_draw_two_points() {
    let Some(mut renderer) = headless_renderer(3) else {
        return;
    };

    renderer.add_particle(10, 10, 0xFF0000);
    renderer.add_particle(20, 20, 0x00FF00);
    assert_eq!(renderer.dynamic_count(), 2);

    let stats = renderer.render();
    assert_eq!(stats.dynamic_points, 2);
    assert_eq!(stats.static_points, 0);
    assert!(stats.presented);
    assert_eq!(renderer.dynamic_count(), 0);
}

#[test]
fn red_packed_color_lands_in_the_blue_channel() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };

    renderer.add_particle(10, 10, 0xFF0000);
    renderer.render();

    let frame = capture(&renderer);
    assert_eq!(frame.pixel(10, 10), Some([0, 0, 255, 255]));
    assert_eq!(frame.lit_pixels(), 1);
}

#[test]
fn dynamic_particles_are_frame_local() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };

    renderer.add_particle(3, 4, 0x00FF00);
    renderer.render();
    assert_eq!(capture(&renderer).pixel(3, 4), Some([0, 255, 0, 255]));

    let stats = renderer.render();
    assert_eq!(stats.dynamic_points, 0);
    assert_eq!(capture(&renderer).pixel(3, 4), Some(BLACK));
}

#[test]
fn static_particle_is_visible_the_frame_it_is_added() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };

    renderer.add_static_particle(5, 7, 0x00FF00);
    let stats = renderer.render();

    assert_eq!(stats.static_points, 1);
    assert!(stats.trail);
    assert_eq!(renderer.static_count(), 0);
    assert_eq!(capture(&renderer).pixel(5, 7), Some([0, 255, 0, 255]));
}

#[test]
fn trail_persists_until_reset() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };

    renderer.add_static_particle(1, 2, 0x0000FF);
    renderer.render();
    renderer.add_static_particle(40, 30, 0x00FF00);
    renderer.render();

    for _ in 0..3 {
        renderer.render();
    }
    let frame = capture(&renderer);
    assert_eq!(frame.pixel(1, 2), Some([255, 0, 0, 255]));
    assert_eq!(frame.pixel(40, 30), Some([0, 255, 0, 255]));
    assert_eq!(frame.lit_pixels(), 2);

    renderer.reset();
    renderer.render();
    assert_eq!(capture(&renderer).lit_pixels(), 0);
}

#[test]
fn reset_twice_matches_reset_once() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };

    renderer.add_static_particle(6, 6, 0xFFFFFF);
    renderer.add_particle(7, 7, 0xFFFFFF);
    renderer.reset();
    renderer.reset();

    assert_eq!(renderer.dynamic_count(), 0);
    assert_eq!(renderer.static_count(), 0);
    let stats = renderer.render();
    assert_eq!(stats.points(), 0);
    assert_eq!(capture(&renderer).lit_pixels(), 0);
}

#[test]
fn overflow_drops_extra_particles() {
    let Some(mut renderer) = headless_renderer(2) else {
        return;
    };

    for i in 0..5 {
        renderer.add_particle(i, i, 0xFFFFFF);
    }
    assert_eq!(renderer.dynamic_count(), 2);

    let stats = renderer.render();
    assert_eq!(stats.dynamic_points, 2);
    assert_eq!(stats.dropped_dynamic, 3);
    assert_eq!(capture(&renderer).lit_pixels(), 2);

    // Counters rewind with the frame.
    assert_eq!(renderer.render().dropped_dynamic, 0);
}

#[test]
fn layers_stack_background_trail_then_dynamic() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };

    let gray = [40u8, 40, 40, 255];
    let pixels: Vec<u8> = gray
        .iter()
        .copied()
        .cycle()
        .take((WIDTH * HEIGHT * 4) as usize)
        .collect();
    renderer
        .set_background(WIDTH, HEIGHT, &pixels)
        .expect("background upload");

    renderer.add_static_particle(8, 8, 0x00FF00);
    renderer.add_static_particle(9, 9, 0x00FF00);
    renderer.add_particle(9, 9, 0x0000FF);
    let stats = renderer.render();
    assert!(stats.background);
    assert_eq!(stats.draw_calls, 4);

    let frame = capture(&renderer);
    assert_eq!(frame.pixel(0, 0), Some(gray));
    assert_eq!(frame.pixel(8, 8), Some([0, 255, 0, 255]));
    assert_eq!(frame.pixel(9, 9), Some([255, 0, 0, 255]));

    renderer.clear_background();
    let stats = renderer.render();
    assert!(!stats.background);
    assert_eq!(capture(&renderer).pixel(0, 0), Some(BLACK));
}

#[test]
fn background_with_wrong_length_is_rejected() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };

    let err = renderer.set_background(4, 4, &[0u8; 10]).unwrap_err();
    assert!(matches!(
        err,
        RenderError::BackgroundSize {
            len: 10,
            expected: 64,
            ..
        }
    ));
    assert!(!renderer.render().background);
}

#[test]
fn resize_discards_the_trail() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };

    renderer.add_static_particle(2, 2, 0xFFFFFF);
    renderer.render();

    renderer.resize((32, 32));
    assert_eq!(renderer.size(), Some((32, 32)));
    renderer.render();

    let frame = capture(&renderer);
    assert_eq!(frame.size(), (32, 32));
    assert_eq!(frame.lit_pixels(), 0);

    renderer.resize((0, 10));
    assert_eq!(renderer.size(), Some((32, 32)));
}

#[test]
fn clear_blanks_the_visible_target() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };

    renderer.add_particle(1, 1, 0xFFFFFF);
    renderer.render();
    assert_eq!(capture(&renderer).lit_pixels(), 1);

    renderer.clear();
    assert_eq!(capture(&renderer).lit_pixels(), 0);
}

#[test]
fn second_initialize_replaces_resources() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };
    renderer.add_static_particle(4, 4, 0xFFFFFF);
    renderer.render();

    let context = pollster::block_on(RenderContext::new_headless(
        (16, 16),
        wgpu::TextureFormat::Rgba8Unorm,
    ))
    .expect("second context");
    renderer.initialize(context);
    renderer.render();

    let frame = capture(&renderer);
    assert_eq!(frame.size(), (16, 16));
    assert_eq!(frame.lit_pixels(), 0);
}

#[test]
fn huge_capacity_is_clamped_to_device_limits() {
    let Some(mut renderer) = headless_renderer(100_000_000) else {
        return;
    };

    let capacity = renderer.capacity().expect("initialized");
    assert!(capacity < 100_000_000);
    assert!(capacity >= 1);

    renderer.add_particle(5, 5, 0xFFFFFF);
    let stats = renderer.render();
    assert_eq!(stats.dynamic_points, 1);
    assert_eq!(capture(&renderer).lit_pixels(), 1);
}

#[test]
fn background_past_texture_limit_is_rejected() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };

    let context = pollster::block_on(RenderContext::new_headless(
        (4, 4),
        wgpu::TextureFormat::Rgba8Unorm,
    ))
    .expect("context");
    let max = context.max_texture_dimension();
    drop(context);

    let width = max + 1;
    let pixels = vec![0u8; width as usize * 4];
    let err = renderer.set_background(width, 1, &pixels).unwrap_err();
    assert!(matches!(err, RenderError::BackgroundTooLarge { .. }));
    assert!(!renderer.render().background);
}

#[test]
fn oversized_targets_are_refused() {
    let Some(mut renderer) = headless_renderer(8) else {
        return;
    };

    let result = pollster::block_on(RenderContext::new_headless(
        (1_000_000, 16),
        wgpu::TextureFormat::Rgba8Unorm,
    ));
    assert!(matches!(result, Err(RenderError::SurfaceTooLarge { .. })));

    renderer.resize((1_000_000, 1_000_000));
    assert_eq!(renderer.size(), Some((WIDTH, HEIGHT)));
    renderer.add_particle(1, 1, 0xFFFFFF);
    assert_eq!(renderer.render().dynamic_points, 1);
}
