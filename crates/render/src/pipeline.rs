//! Point and blit render pipelines.

use crate::particles::PackedColor;

/// Uniform block for the point pipeline.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointUniform {
    /// Target size in pixels.
    pub resolution: [f32; 2],
    /// Y scale applied after normalization (-1 flips pixel rows top-down).
    pub y_sign: f32,
    /// Padding for 16-byte alignment.
    pub _padding: f32,
}

impl PointUniform {
    /// Uniform for drawing straight onto the visible surface.
    pub fn surface(size: (u32, u32)) -> Self {
        Self {
            resolution: [size.0 as f32, size.1 as f32],
            y_sign: -1.0,
            _padding: 0.0,
        }
    }

    /// Uniform for baking into the trail texture, which is stored bottom-up
    /// and flipped back by the trail blit.
    pub fn trail(size: (u32, u32)) -> Self {
        Self {
            y_sign: 1.0,
            ..Self::surface(size)
        }
    }
}

/// Uniform block for the blit pipeline.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlitUniform {
    /// Values above 0.5 invert the sampled V coordinate.
    pub flip: f32,
    /// Padding for 16-byte alignment.
    pub _padding: [f32; 3],
}

impl BlitUniform {
    /// Sample the source as-is.
    pub const STRAIGHT: Self = Self {
        flip: 0.0,
        _padding: [0.0; 3],
    };
    /// Sample the source upside down.
    pub const FLIPPED: Self = Self {
        flip: 1.0,
        _padding: [0.0; 3],
    };
}

const POINT_POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![0 => Float32x2];
const POINT_COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![1 => Unorm8x4];
const QUAD_POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![0 => Float32x2];
const QUAD_TEXCOORD_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![1 => Float32x2];

/// Format of the persistent trail texture.
pub const TRAIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Point pipeline: one shader module, one pipeline per target format.
pub struct PointPipeline {
    offscreen: wgpu::RenderPipeline,
    surface: wgpu::RenderPipeline,
}

impl PointPipeline {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Point Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/point.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Point Pipeline Layout"),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });

        let buffers = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &POINT_POSITION_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<PackedColor>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &POINT_COLOR_ATTRIBUTES,
            },
        ];

        let build = |label: &str, format: wgpu::TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::PointList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            })
        };

        Self {
            offscreen: build("Point Pipeline (trail)", TRAIL_FORMAT),
            surface: build("Point Pipeline (surface)", surface_format),
        }
    }

    /// Pipeline drawing into the trail texture.
    pub fn offscreen(&self) -> &wgpu::RenderPipeline {
        &self.offscreen
    }

    /// Pipeline drawing onto the visible surface.
    pub fn surface(&self) -> &wgpu::RenderPipeline {
        &self.surface
    }
}

/// Blit pipeline: an opaque variant for the background and an alpha-blended
/// variant for the trail layer.
pub struct BlitPipeline {
    opaque: wgpu::RenderPipeline,
    blended: wgpu::RenderPipeline,
}

impl BlitPipeline {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });

        let buffers = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &QUAD_POSITION_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &QUAD_TEXCOORD_ATTRIBUTES,
            },
        ];

        let build = |label: &str, blend: wgpu::BlendState| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            })
        };

        Self {
            opaque: build("Blit Pipeline (opaque)", wgpu::BlendState::REPLACE),
            // src * srcAlpha + dst * (1 - srcAlpha)
            blended: build("Blit Pipeline (blended)", wgpu::BlendState::ALPHA_BLENDING),
        }
    }

    /// Replace blending (one, zero).
    pub fn opaque(&self) -> &wgpu::RenderPipeline {
        &self.opaque
    }

    /// Standard alpha blending (srcAlpha, 1 - srcAlpha).
    pub fn blended(&self) -> &wgpu::RenderPipeline {
        &self.blended
    }
}

/// Both programs plus the bind group layouts their resources are bound with.
///
/// A program that failed validation is `None` for the rest of the session.
pub struct ShaderPrograms {
    /// Layout for the point uniform.
    pub point_layout: wgpu::BindGroupLayout,
    /// Layout for texture + sampler + flip uniform.
    pub blit_layout: wgpu::BindGroupLayout,
    /// Point pipeline, if it built.
    pub point: Option<PointPipeline>,
    /// Blit pipeline, if it built.
    pub blit: Option<BlitPipeline>,
}

impl ShaderPrograms {
    /// Compile both programs for the given surface format.
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let point_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Point Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blit Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let point = checked(device, "point", || {
            PointPipeline::new(device, &point_layout, surface_format)
        });
        let blit = checked(device, "blit", || {
            BlitPipeline::new(device, &blit_layout, surface_format)
        });

        Self {
            point_layout,
            blit_layout,
            point,
            blit,
        }
    }
}

/// Run `build` inside a validation error scope, logging and discarding the
/// result if wgpu reported an error.
fn checked<T>(device: &wgpu::Device, program: &str, build: impl FnOnce() -> T) -> Option<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        None => Some(value),
        Some(err) => {
            tracing::error!(program, %err, "shader program failed to compile or link");
            None
        }
    }
}
