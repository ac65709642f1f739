//! CPU readback of rendered frames and PNG output.

use anyhow::{Context, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::ColorType;
use image::ImageEncoder;
use std::path::Path;
use std::sync::mpsc;

/// A frame copied back from the GPU as tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCapture {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl FrameCapture {
    /// Wrap RGBA8 bytes of a `width × height` image.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            anyhow::bail!(
                "capture is {width}x{height} but holds {} bytes (expected {expected})",
                rgba.len()
            );
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Pixel dimensions.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGBA of the pixel at (`x`, `y`), origin top-left.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.rgba[offset..offset + 4]);
        Some(px)
    }

    /// Number of pixels that are not opaque black.
    pub fn lit_pixels(&self) -> usize {
        self.rgba
            .chunks_exact(4)
            .filter(|px| px[0] != 0 || px[1] != 0 || px[2] != 0)
            .count()
    }

    /// Raw RGBA8 bytes.
    pub fn as_rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Write the capture to disk as a PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        write_png(path, self.size(), &self.rgba)
    }
}

/// Pending GPU readback of a texture.
pub struct TextureReadback {
    buffer: wgpu::Buffer,
    padded_bytes_per_row: u32,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

impl TextureReadback {
    /// Block until the copy finishes and unpack the rows.
    pub fn finish(self, device: &wgpu::Device) -> Result<FrameCapture> {
        let slice = self.buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });

        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .context("texture readback channel closed")?
            .context("texture readback failed")?;

        let unpadded_bytes_per_row = (self.width * 4) as usize;
        let mut rgba = Vec::with_capacity(unpadded_bytes_per_row * self.height as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(self.padded_bytes_per_row as usize) {
                rgba.extend_from_slice(&row[..unpadded_bytes_per_row]);
            }
        }
        self.buffer.unmap();

        to_rgba_order(self.format, &mut rgba)?;
        FrameCapture::new(self.width, self.height, rgba)
    }
}

fn to_rgba_order(format: wgpu::TextureFormat, pixels: &mut [u8]) -> Result<()> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => Ok(()),
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => {
            for pixel in pixels.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
            Ok(())
        }
        other => Err(anyhow::anyhow!(
            "unsupported texture format for readback: {other:?}"
        )),
    }
}

/// Record commands to copy `texture` into a mappable buffer.
///
/// Call [`TextureReadback::finish`] after submitting the encoder.
pub fn record_texture_readback(
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    texture: &wgpu::Texture,
    format: wgpu::TextureFormat,
    size: (u32, u32),
) -> TextureReadback {
    let (width, height) = size;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = (width * 4).div_ceil(align) * align;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Frame Readback Buffer"),
        size: padded_bytes_per_row as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    TextureReadback {
        buffer,
        padded_bytes_per_row,
        width,
        height,
        format,
    }
}

/// Copy `texture` back to the CPU, waiting for the GPU.
pub fn capture_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    format: wgpu::TextureFormat,
    size: (u32, u32),
) -> Result<FrameCapture> {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    let readback = record_texture_readback(device, &mut encoder, texture, format, size);
    queue.submit(Some(encoder.finish()));
    readback.finish(device)
}

/// Write an RGBA8 image to disk as a PNG.
pub fn write_png(path: &Path, size: (u32, u32), rgba: &[u8]) -> Result<()> {
    let (width, height) = size;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let encoder = PngEncoder::new_with_quality(file, CompressionType::Fast, FilterType::NoFilter);
    encoder
        .write_image(rgba, width, height, ColorType::Rgba8.into())
        .context("failed to write frame png")?;
    Ok(())
}
