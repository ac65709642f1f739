//! What the host feeds the renderer each tick.

use pixeltrail_render::Renderer;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Random particle source scattered uniformly over the surface.
pub struct ParticleFeed {
    rng: StdRng,
    size: (u32, u32),
    dynamic_per_tick: u32,
    static_per_tick: u32,
}

impl ParticleFeed {
    pub fn new(
        size: (u32, u32),
        dynamic_per_tick: u32,
        static_per_tick: u32,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            size,
            dynamic_per_tick,
            static_per_tick,
        }
    }

    /// Track a resized surface.
    pub fn set_size(&mut self, size: (u32, u32)) {
        self.size = size;
    }

    fn sample(&mut self) -> (i32, i32, u32) {
        let x = self.rng.gen_range(0..self.size.0.max(1)) as i32;
        let y = self.rng.gen_range(0..self.size.1.max(1)) as i32;
        let color = self.rng.gen_range(0..0x00FF_FFFF);
        (x, y, color)
    }

    /// Push this tick's particles into `renderer`.
    pub fn feed(&mut self, renderer: &mut Renderer) {
        for _ in 0..self.dynamic_per_tick {
            let (x, y, color) = self.sample();
            renderer.add_particle(x, y, color);
        }
        for _ in 0..self.static_per_tick {
            let (x, y, color) = self.sample();
            renderer.add_static_particle(x, y, color);
        }
    }
}

/// Opaque top-to-bottom gradient, dark blue to near black, as RGBA8.
pub fn gradient_background(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        let t = if height > 1 {
            y as f32 / (height - 1) as f32
        } else {
            0.0
        };
        let r = (24.0 * (1.0 - t)) as u8;
        let g = (32.0 * (1.0 - t)) as u8;
        let b = (72.0 * (1.0 - t) + 8.0 * t) as u8;
        for _ in 0..width {
            pixels.extend_from_slice(&[r, g, b, 255]);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_on_the_surface() {
        let mut feed = ParticleFeed::new((300, 200), 1, 1, Some(42));
        for _ in 0..1_000 {
            let (x, y, color) = feed.sample();
            assert!((0..300).contains(&x));
            assert!((0..200).contains(&y));
            assert!(color < 0x00FF_FFFF);
        }
    }

    #[test]
    fn seeded_feeds_are_deterministic() {
        let mut a = ParticleFeed::new((64, 64), 1, 1, Some(7));
        let mut b = ParticleFeed::new((64, 64), 1, 1, Some(7));
        for _ in 0..32 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn feed_before_initialize_is_harmless() {
        let mut renderer = Renderer::new(pixeltrail_render::RendererConfig { capacity: 3 });
        let mut feed = ParticleFeed::new((10, 10), 5, 5, Some(1));
        feed.feed(&mut renderer);
        assert_eq!(renderer.dynamic_count(), 0);
    }

    #[test]
    fn gradient_is_opaque_and_sized() {
        let pixels = gradient_background(3, 4);
        assert_eq!(pixels.len(), 3 * 4 * 4);
        assert!(pixels.chunks_exact(4).all(|px| px[3] == 255));
        assert_eq!(&pixels[..4], &[24, 32, 72, 255]);
        assert_eq!(&pixels[pixels.len() - 4..], &[0, 0, 8, 255]);
    }
}
