//! GPU-side objects created once per context: particle streams, the quad,
//! the background and trail textures, uniforms and bind groups.

use wgpu::util::DeviceExt;

use crate::context::RenderContext;
use crate::particles::{PackedColor, ParticleBuffer};
use crate::pipeline::{BlitUniform, PointUniform, ShaderPrograms, TRAIL_FORMAT};

/// Full-surface quad corners in clip space.
pub const QUAD_POSITIONS: [[f32; 2]; 4] = [[-1.0, 1.0], [1.0, 1.0], [-1.0, -1.0], [1.0, -1.0]];
/// Texture coordinates matching [`QUAD_POSITIONS`].
pub const QUAD_TEXCOORDS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
/// Two triangles covering the quad.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 3, 2, 1];

/// Position + color vertex streams for one particle layer.
pub struct ParticleStreams {
    /// `[f32; 2]` per particle.
    pub positions: wgpu::Buffer,
    /// Packed RGBA per particle.
    pub colors: wgpu::Buffer,
}

impl ParticleStreams {
    fn new(device: &wgpu::Device, label: &str, capacity: usize) -> Self {
        let positions = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} Particle Positions")),
            size: (capacity * std::mem::size_of::<[f32; 2]>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let colors = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} Particle Colors")),
            size: (capacity * std::mem::size_of::<PackedColor>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { positions, colors }
    }

    /// Stream the written prefix of `buffer` to the GPU.
    pub fn upload(&self, queue: &wgpu::Queue, buffer: &ParticleBuffer) {
        if buffer.is_empty() {
            return;
        }
        queue.write_buffer(&self.positions, 0, bytemuck::cast_slice(buffer.positions()));
        queue.write_buffer(&self.colors, 0, bytemuck::cast_slice(buffer.colors()));
    }
}

/// Unit quad used by every blit.
pub struct QuadBuffers {
    /// Clip-space corners.
    pub positions: wgpu::Buffer,
    /// Texture coordinates.
    pub texcoords: wgpu::Buffer,
    /// `u16` triangle indices.
    pub indices: wgpu::Buffer,
}

impl QuadBuffers {
    fn new(device: &wgpu::Device) -> Self {
        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Positions"),
            contents: bytemuck::cast_slice(&QUAD_POSITIONS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let texcoords = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Texcoords"),
            contents: bytemuck::cast_slice(&QUAD_TEXCOORDS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            positions,
            texcoords,
            indices,
        }
    }

    /// Number of indices to draw.
    pub fn index_count(&self) -> u32 {
        QUAD_INDICES.len() as u32
    }
}

/// A sampled texture with the bind group that feeds it to the blit program.
pub struct TextureLayer {
    /// Backing texture, owned next to its view.
    pub _texture: wgpu::Texture,
    /// Default view (also the color attachment for the trail).
    pub view: wgpu::TextureView,
    /// Blit bind group: texture, sampler, flip uniform.
    pub bind_group: wgpu::BindGroup,
}

/// Every GPU object the renderer owns.
pub struct GpuResources {
    /// Compiled programs and their layouts.
    pub programs: ShaderPrograms,
    /// Frame-local particles drawn on the surface.
    pub dynamic: ParticleStreams,
    /// Particles baked into the trail.
    pub statics: ParticleStreams,
    /// Constant blit geometry.
    pub quad: QuadBuffers,
    /// Point uniforms for the visible surface.
    pub surface_points: wgpu::BindGroup,
    /// Point uniforms for the trail texture.
    pub trail_points: wgpu::BindGroup,
    /// Background image layer (1×1 placeholder until one is supplied).
    pub background: TextureLayer,
    /// Persistent render-to-texture trail layer.
    pub trail: TextureLayer,
    has_background: bool,
    sampler: wgpu::Sampler,
    surface_uniform: wgpu::Buffer,
    trail_uniform: wgpu::Buffer,
    straight_flip: wgpu::Buffer,
    flipped_flip: wgpu::Buffer,
}

impl GpuResources {
    /// Allocate all GPU objects for a surface of `ctx.size`.
    pub fn new(ctx: &RenderContext, capacity: usize, programs: ShaderPrograms) -> Self {
        let device = &ctx.device;
        let size = ctx.size;

        let dynamic = ParticleStreams::new(device, "Dynamic", capacity);
        let statics = ParticleStreams::new(device, "Static", capacity);
        let quad = QuadBuffers::new(device);

        let surface_uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Point Uniform (surface)"),
            contents: bytemuck::cast_slice(&[PointUniform::surface(size)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let trail_uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Point Uniform (trail)"),
            contents: bytemuck::cast_slice(&[PointUniform::trail(size)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let surface_points =
            point_bind_group(device, &programs.point_layout, &surface_uniform, "surface");
        let trail_points = point_bind_group(device, &programs.point_layout, &trail_uniform, "trail");

        let straight_flip = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Blit Uniform (straight)"),
            contents: bytemuck::cast_slice(&[BlitUniform::STRAIGHT]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let flipped_flip = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Blit Uniform (flipped)"),
            contents: bytemuck::cast_slice(&[BlitUniform::FLIPPED]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        // Textures are not assumed to be power-of-two sized.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Blit Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let background = create_background(
            device,
            &ctx.queue,
            (1, 1),
            &[0, 0, 0, 0],
            &programs.blit_layout,
            &sampler,
            &straight_flip,
        );
        let trail = create_trail(
            device,
            size,
            &programs.blit_layout,
            &sampler,
            &flipped_flip,
        );

        tracing::debug!(
            capacity,
            width = size.0,
            height = size.1,
            point_program = programs.point.is_some(),
            blit_program = programs.blit.is_some(),
            "GPU resources allocated"
        );

        Self {
            programs,
            dynamic,
            statics,
            quad,
            surface_points,
            trail_points,
            background,
            trail,
            has_background: false,
            sampler,
            surface_uniform,
            trail_uniform,
            straight_flip,
            flipped_flip,
        }
    }

    /// Whether a background image has been supplied.
    pub fn has_background(&self) -> bool {
        self.has_background
    }

    /// Replace the background with `width × height` RGBA8 pixels.
    pub fn set_background(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) {
        self.background = create_background(
            device,
            queue,
            (width, height),
            pixels,
            &self.programs.blit_layout,
            &self.sampler,
            &self.straight_flip,
        );
        self.has_background = true;
    }

    /// Stop compositing the background.
    pub fn clear_background(&mut self) {
        self.has_background = false;
    }

    /// Clear the trail texture to transparent black.
    pub fn clear_trail(&self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Trail Clear Encoder"),
        });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Trail Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.trail.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
        }
        queue.submit(Some(encoder.finish()));
    }

    /// Rebuild size-dependent objects. The trail content is discarded.
    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, size: (u32, u32)) {
        queue.write_buffer(
            &self.surface_uniform,
            0,
            bytemuck::cast_slice(&[PointUniform::surface(size)]),
        );
        queue.write_buffer(
            &self.trail_uniform,
            0,
            bytemuck::cast_slice(&[PointUniform::trail(size)]),
        );
        self.trail = create_trail(
            device,
            size,
            &self.programs.blit_layout,
            &self.sampler,
            &self.flipped_flip,
        );
        self.clear_trail(device, queue);
    }
}

fn point_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform: &wgpu::Buffer,
    target: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("Point Bind Group ({target})")),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        }],
    })
}

fn blit_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    flip: &wgpu::Buffer,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: flip.as_entire_binding(),
            },
        ],
    })
}

fn create_trail(
    device: &wgpu::Device,
    size: (u32, u32),
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    flip: &wgpu::Buffer,
) -> TextureLayer {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Trail Texture"),
        size: wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TRAIL_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = blit_bind_group(device, layout, &view, sampler, flip, "Trail Bind Group");
    TextureLayer {
        _texture: texture,
        view,
        bind_group,
    }
}

fn create_background(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    size: (u32, u32),
    pixels: &[u8],
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    flip: &wgpu::Buffer,
) -> TextureLayer {
    let texture = upload_rgba_texture(device, queue, size.0, size.1, pixels, "Background Texture");
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group =
        blit_bind_group(device, layout, &view, sampler, flip, "Background Bind Group");
    TextureLayer {
        _texture: texture,
        view,
        bind_group,
    }
}

/// Rows of tightly packed RGBA8 repacked to `COPY_BYTES_PER_ROW_ALIGNMENT`.
fn pad_rows(width: u32, height: u32, pixels: &[u8]) -> (Vec<u8>, u32) {
    let row_bytes = width as usize * 4;
    let alignment = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    let padded_row_bytes = row_bytes.div_ceil(alignment) * alignment;

    let mut padded = vec![0u8; padded_row_bytes * height as usize];
    for row in 0..height as usize {
        let src_start = row * row_bytes;
        let dst_start = row * padded_row_bytes;
        padded[dst_start..dst_start + row_bytes]
            .copy_from_slice(&pixels[src_start..src_start + row_bytes]);
    }
    (padded, padded_row_bytes as u32)
}

fn upload_rgba_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    pixels: &[u8],
    label: &str,
) -> wgpu::Texture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let (padded, bytes_per_row) = pad_rows(width, height, pixels);
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &padded,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(bytes_per_row),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    texture
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_indices_cover_two_triangles() {
        assert_eq!(QUAD_INDICES.len(), 6);
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < QUAD_POSITIONS.len()));
        assert_eq!(QUAD_POSITIONS.len(), QUAD_TEXCOORDS.len());
    }

    #[test]
    fn quad_texcoords_put_v_zero_at_the_top() {
        for (pos, uv) in QUAD_POSITIONS.iter().zip(QUAD_TEXCOORDS.iter()) {
            assert_eq!(uv[0], (pos[0] + 1.0) / 2.0);
            assert_eq!(uv[1], (1.0 - pos[1]) / 2.0);
        }
    }

    #[test]
    fn pad_rows_aligns_and_preserves_pixels() {
        let pixels: Vec<u8> = (0..3 * 2 * 4).map(|v| v as u8).collect();
        let (padded, stride) = pad_rows(3, 2, &pixels);

        assert_eq!(stride % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
        assert_eq!(padded.len(), stride as usize * 2);
        assert_eq!(&padded[..12], &pixels[..12]);
        assert_eq!(&padded[stride as usize..stride as usize + 12], &pixels[12..]);
    }
}
