#![warn(missing_docs)]
//! Point-particle renderer with a persistent render-to-texture trail layer.
//!
//! Each frame the host pushes dynamic particles (drawn once, on top) and
//! static particles (baked into a trail texture that persists until
//! [`Renderer::reset`]), then calls [`Renderer::render`].

mod compositor;
mod context;
mod error;
mod particles;
mod pipeline;
mod resources;
mod screenshot;
mod window;

pub use compositor::{FramePlan, FrameStats, FrameStep};
pub use context::{FrameContext, HeadlessTarget, RenderContext};
pub use error::RenderError;
pub use particles::{
    capacity_within_limit, PackedColor, ParticleBuffer, ParticleStore, DEFAULT_CAPACITY,
};
pub use pipeline::{BlitUniform, PointUniform, TRAIL_FORMAT};
pub use resources::{QUAD_INDICES, QUAD_POSITIONS, QUAD_TEXCOORDS};
pub use screenshot::{
    capture_texture, record_texture_readback, write_png, FrameCapture, TextureReadback,
};
pub use window::{WindowConfig, WindowManager};
pub use wgpu::TextureFormat;

use pipeline::ShaderPrograms;
use resources::GpuResources;

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Particles each layer accepts per frame before dropping.
    pub capacity: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Everything that only exists once a context has been supplied.
struct GpuState {
    context: RenderContext,
    resources: GpuResources,
    store: ParticleStore,
    viewport: (u32, u32),
}

/// Main renderer owning GPU resources and particle buffers.
///
/// Every operation before [`Renderer::initialize`] is a silent no-op.
pub struct Renderer {
    config: RendererConfig,
    state: Option<GpuState>,
}

impl Renderer {
    /// Construct an uninitialized renderer.
    pub fn new(config: RendererConfig) -> Self {
        tracing::info!(?config, "renderer created");
        Self {
            config,
            state: None,
        }
    }

    /// Access the renderer configuration provided at construction time.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Whether [`Renderer::initialize`] has run.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Allocate particle buffers and GPU resources for `context`, then reset.
    ///
    /// Calling this again replaces every previously allocated resource.
    pub fn initialize(&mut self, context: RenderContext) {
        if self.state.is_some() {
            tracing::warn!("renderer initialized twice, replacing GPU resources");
        }

        let max_buffer_size = context.device.limits().max_buffer_size;
        let capacity = capacity_within_limit(self.config.capacity, max_buffer_size);
        if capacity != self.config.capacity {
            tracing::warn!(
                requested = self.config.capacity,
                capacity,
                max_buffer_size,
                "particle capacity clamped to device buffer limit"
            );
        }

        let programs = ShaderPrograms::new(&context.device, context.format());
        let resources = GpuResources::new(&context, capacity, programs);
        let store = ParticleStore::new(capacity);
        let viewport = context.size;

        tracing::info!(
            width = viewport.0,
            height = viewport.1,
            capacity,
            "renderer initialized"
        );

        self.state = Some(GpuState {
            context,
            resources,
            store,
            viewport,
        });
        self.reset();
    }

    /// Queue a particle drawn on top of this frame only.
    pub fn add_particle(&mut self, x: i32, y: i32, color: u32) {
        if let Some(state) = self.state.as_mut() {
            state.store.dynamic.push(x, y, color);
        }
    }

    /// Queue a particle baked into the persistent trail layer.
    pub fn add_static_particle(&mut self, x: i32, y: i32, color: u32) {
        if let Some(state) = self.state.as_mut() {
            state.store.statics.push(x, y, color);
        }
    }

    /// Particles each layer accepts per frame, after clamping to device
    /// limits. `None` before initialize.
    pub fn capacity(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.store.dynamic.capacity())
    }

    /// Pending dynamic particles.
    pub fn dynamic_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.store.dynamic.len())
    }

    /// Pending static particles.
    pub fn static_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.store.statics.len())
    }

    /// Current surface size, if initialized.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.state.as_ref().map(|s| s.context.size)
    }

    /// Clear the visible target to opaque black.
    pub fn clear(&mut self) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let frame = match state.context.acquire_frame() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(%err, "skipping clear, surface unavailable");
                state.context.reconfigure();
                return;
            }
        };
        let mut encoder =
            state
                .context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Clear Encoder"),
                });
        compositor::encode_clear(&mut encoder, &frame.view);
        state.context.queue.submit(Some(encoder.finish()));
        frame.present();
    }

    /// Run one frame: bake static particles, composite background, trail and
    /// dynamic particles, rewind both cursors and present.
    pub fn render(&mut self) -> FrameStats {
        match self.state.as_mut() {
            Some(state) => state.render(),
            None => FrameStats::default(),
        }
    }

    /// Zero both particle layers and wipe the trail texture.
    pub fn reset(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.store.zero();
        state
            .resources
            .clear_trail(&state.context.device, &state.context.queue);
        state.viewport = state.context.size;
        tracing::debug!("renderer reset");
    }

    /// Resize the surface. The trail content is discarded.
    pub fn resize(&mut self, new_size: (u32, u32)) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if !state.context.resize(new_size) {
            return;
        }
        state
            .resources
            .resize(&state.context.device, &state.context.queue, new_size);
        state.viewport = new_size;
        tracing::debug!(width = new_size.0, height = new_size.1, "renderer resized");
    }

    /// Use `width × height` RGBA8 pixels as the background layer.
    pub fn set_background(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), RenderError> {
        let state = self.state.as_mut().ok_or(RenderError::NotInitialized)?;
        check_background(width, height, rgba.len(), state.context.max_texture_dimension())?;
        state.resources.set_background(
            &state.context.device,
            &state.context.queue,
            width,
            height,
            rgba,
        );
        tracing::debug!(width, height, "background uploaded");
        Ok(())
    }

    /// Stop drawing the background layer.
    pub fn clear_background(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.resources.clear_background();
        }
    }

    /// Read back the last rendered frame. Only headless contexts keep the
    /// frame around after presenting.
    pub fn capture_frame(&self) -> anyhow::Result<FrameCapture> {
        let state = self.state.as_ref().ok_or(RenderError::NotInitialized)?;
        let headless = state
            .context
            .headless
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("frame capture needs a headless context"))?;
        capture_texture(
            &state.context.device,
            &state.context.queue,
            &headless.texture,
            state.context.format(),
            state.context.size,
        )
    }
}

/// Validate background pixels against their declared size and the device's
/// texture dimension limit.
fn check_background(width: u32, height: u32, len: usize, max: u32) -> Result<(), RenderError> {
    let expected = width as usize * height as usize * 4;
    if width == 0 || height == 0 || len != expected {
        return Err(RenderError::BackgroundSize {
            width,
            height,
            len,
            expected,
        });
    }
    if width > max || height > max {
        return Err(RenderError::BackgroundTooLarge { width, height, max });
    }
    Ok(())
}

impl GpuState {
    fn render(&mut self) -> FrameStats {
        let static_count = self.store.statics.len() as u32;
        let dynamic_count = self.store.dynamic.len() as u32;
        let plan = FramePlan::build(
            static_count,
            dynamic_count,
            self.resources.has_background(),
        );

        let mut stats = FrameStats {
            dropped_static: self.store.statics.dropped(),
            dropped_dynamic: self.store.dynamic.dropped(),
            ..Default::default()
        };

        let queue = &self.context.queue;
        self.resources.statics.upload(queue, &self.store.statics);
        self.resources.dynamic.upload(queue, &self.store.dynamic);

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                });

        compositor::encode_bake(
            &mut encoder,
            &self.resources,
            &plan,
            self.viewport,
            &mut stats,
        );

        let mut frame = match self.context.acquire_frame() {
            Ok(frame) => Some(frame),
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                tracing::warn!(%err, "surface out of date, reconfiguring");
                self.context.reconfigure();
                None
            }
            Err(err) => {
                tracing::error!(%err, "failed to acquire frame");
                None
            }
        };

        if let Some(frame) = frame.as_ref() {
            compositor::encode_composite(
                &mut encoder,
                &frame.view,
                &self.resources,
                &plan,
                self.viewport,
                &mut stats,
            );
        }

        // Static particles are baked even when the visible frame is skipped.
        self.context.queue.submit(Some(encoder.finish()));

        for step in plan.steps() {
            match step {
                FrameStep::ResetCursors => self.store.end_frame(),
                FrameStep::Present => {
                    if let Some(frame) = frame.take() {
                        frame.present();
                        stats.presented = true;
                    }
                }
                _ => {}
            }
        }

        tracing::trace!(?stats, "frame rendered");
        stats
    }
}
