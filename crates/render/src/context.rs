//! GPU device plus the presentation target the renderer draws into.

use std::sync::Arc;

use winit::window::Window;

use crate::error::RenderError;

/// Offscreen color target used when no window is attached.
pub struct HeadlessTarget {
    /// Texture standing in for the swapchain image.
    pub texture: wgpu::Texture,
}

impl HeadlessTarget {
    fn new(device: &wgpu::Device, size: (u32, u32), format: wgpu::TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Headless Surface Texture"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self { texture }
    }
}

/// GPU rendering context handed to [`crate::Renderer::initialize`].
pub struct RenderContext {
    /// Window surface, if presenting to a window.
    pub surface: Option<wgpu::Surface<'static>>,
    /// Offscreen target, if rendering headless.
    pub headless: Option<HeadlessTarget>,
    /// Logical GPU device used for issuing commands.
    pub device: wgpu::Device,
    /// Command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Target format and dimensions. Only applied to a real surface.
    pub config: wgpu::SurfaceConfiguration,
    /// Current target dimensions in pixels (width, height).
    pub size: (u32, u32),
}

impl RenderContext {
    /// Create a new render context presenting into `window`.
    pub async fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(RenderError::EmptySurface {
                width: size.width,
                height: size.height,
            });
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        let (device, queue) = request_device(&adapter).await?;

        let max = device.limits().max_texture_dimension_2d;
        let size = if fits_texture_limit((size.width, size.height), max) {
            size
        } else {
            tracing::warn!(
                width = size.width,
                height = size.height,
                max,
                "window larger than the device texture limit, clamping surface"
            );
            winit::dpi::PhysicalSize::new(size.width.min(max), size.height.min(max))
        };

        let surface_caps = surface.get_capabilities(&adapter);
        // The point shader writes exact channel values; prefer a linear format.
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderError::IncompatibleSurface)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo, // VSync
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        tracing::info!(
            width = size.width,
            height = size.height,
            format = ?surface_format,
            adapter = %adapter.get_info().name,
            "GPU rendering context initialized"
        );

        Ok(Self {
            surface: Some(surface),
            headless: None,
            device,
            queue,
            config,
            size: (size.width, size.height),
        })
    }

    /// Create a context that renders into an offscreen texture.
    ///
    /// Tries a hardware adapter first and falls back to a software one.
    pub async fn new_headless(
        size: (u32, u32),
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        if size.0 == 0 || size.1 == 0 {
            return Err(RenderError::EmptySurface {
                width: size.0,
                height: size.1,
            });
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let mut adapter = None;
        for force_fallback_adapter in [false, true] {
            adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::LowPower,
                    compatible_surface: None,
                    force_fallback_adapter,
                })
                .await;
            if adapter.is_some() {
                break;
            }
        }
        let adapter = adapter.ok_or(RenderError::NoAdapter)?;

        let (device, queue) = request_device(&adapter).await?;
        let max = device.limits().max_texture_dimension_2d;
        if !fits_texture_limit(size, max) {
            return Err(RenderError::SurfaceTooLarge {
                width: size.0,
                height: size.1,
                max,
            });
        }
        let headless = HeadlessTarget::new(&device, size, format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format,
            width: size.0,
            height: size.1,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        tracing::info!(
            width = size.0,
            height = size.1,
            ?format,
            adapter = %adapter.get_info().name,
            "headless rendering context initialized"
        );

        Ok(Self {
            surface: None,
            headless: Some(headless),
            device,
            queue,
            config,
            size,
        })
    }

    /// Resize the presentation target. Zero-sized requests and sizes past
    /// the device texture limit are ignored.
    pub fn resize(&mut self, new_size: (u32, u32)) -> bool {
        if new_size.0 == 0 || new_size.1 == 0 {
            return false;
        }
        let max = self.max_texture_dimension();
        if !fits_texture_limit(new_size, max) {
            tracing::warn!(
                width = new_size.0,
                height = new_size.1,
                max,
                "ignoring resize past the device texture limit"
            );
            return false;
        }
        self.size = new_size;
        self.config.width = new_size.0;
        self.config.height = new_size.1;
        if let Some(surface) = self.surface.as_ref() {
            surface.configure(&self.device, &self.config);
        }
        if self.headless.is_some() {
            self.headless = Some(HeadlessTarget::new(
                &self.device,
                new_size,
                self.config.format,
            ));
        }
        true
    }

    /// Reconfigure the surface after it was lost or went stale.
    pub fn reconfigure(&self) {
        if let Some(surface) = self.surface.as_ref() {
            surface.configure(&self.device, &self.config);
        }
    }

    /// Largest width or height a 2D texture may have on this device.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Format of the visible target.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Acquire the texture for this frame's visible pass.
    pub fn acquire_frame(&self) -> Result<FrameContext, wgpu::SurfaceError> {
        if let Some(surface) = self.surface.as_ref() {
            let output = surface.get_current_texture()?;
            let view = output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            return Ok(FrameContext {
                output: Some(output),
                view,
            });
        }

        match self.headless.as_ref() {
            Some(headless) => Ok(FrameContext {
                output: None,
                view: headless
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default()),
            }),
            None => Err(wgpu::SurfaceError::Lost),
        }
    }
}

fn fits_texture_limit(size: (u32, u32), max: u32) -> bool {
    size.0 <= max && size.1 <= max
}

async fn request_device(
    adapter: &wgpu::Adapter,
) -> Result<(wgpu::Device, wgpu::Queue), RenderError> {
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("pixeltrail device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
            },
            None,
        )
        .await?;
    Ok((device, queue))
}

/// Frame rendering target.
pub struct FrameContext {
    output: Option<wgpu::SurfaceTexture>,
    /// The texture view for this frame.
    pub view: wgpu::TextureView,
}

impl FrameContext {
    /// Finish the frame and present (windowed only).
    pub fn present(self) {
        if let Some(output) = self.output {
            output.present();
        }
    }
}
