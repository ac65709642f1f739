//! CPU-side particle storage for the dynamic and static layers.

/// Default number of particles each layer can hold per frame.
pub const DEFAULT_CAPACITY: usize = 32_000;

/// Largest per-layer capacity whose position stream fits in one buffer of
/// `max_buffer_size` bytes. Never below one particle.
pub fn capacity_within_limit(requested: usize, max_buffer_size: u64) -> usize {
    let stride = std::mem::size_of::<[f32; 2]>() as u64;
    let max = usize::try_from(max_buffer_size / stride).unwrap_or(usize::MAX);
    requested.clamp(1, max.max(1))
}

/// 24-bit `0xRRGGBB` host color with the alpha byte pinned to 255.
///
/// The stored word keeps the channels in memory order R, G, B, A so that a
/// `Unorm8x4` vertex attribute reads them back as `(r, g, b, a)`.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedColor(pub u32);

impl PackedColor {
    /// Largest accepted host color.
    pub const MAX_RGB: u32 = 0x00FF_FFFF;

    /// Pack a `0xRRGGBB` value. Bits above the low 24 are ignored.
    pub fn from_rgb(rgb: u32) -> Self {
        let rgb = rgb & Self::MAX_RGB;
        let r = (rgb >> 16) as u8;
        let g = (rgb >> 8) as u8;
        let b = rgb as u8;
        Self(u32::from_le_bytes([r, g, b, 0xFF]))
    }

    /// Channel bytes in memory order (R, G, B, A).
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Recover the `0xRRGGBB` value this color was packed from.
    pub fn rgb(self) -> u32 {
        let [r, g, b, _] = self.to_bytes();
        (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
    }

    /// Color the point shader writes for this value (channel order swapped).
    pub fn shaded_rgba(self) -> [u8; 4] {
        let [r, g, b, _] = self.to_bytes();
        [b, g, r, 0xFF]
    }
}

/// Fixed-capacity structure-of-arrays particle buffer with a write cursor.
///
/// Adds past capacity are dropped and counted; the cursor never exceeds the
/// capacity.
#[derive(Debug, Clone)]
pub struct ParticleBuffer {
    positions: Vec<[f32; 2]>,
    colors: Vec<PackedColor>,
    cursor: usize,
    dropped: usize,
    overflow_logged: bool,
    label: &'static str,
}

impl ParticleBuffer {
    /// Allocate zero-filled backing arrays for `capacity` particles.
    pub fn new(label: &'static str, capacity: usize) -> Self {
        Self {
            positions: vec![[0.0; 2]; capacity],
            colors: vec![PackedColor::default(); capacity],
            cursor: 0,
            dropped: 0,
            overflow_logged: false,
            label,
        }
    }

    /// Append a particle at the cursor.
    ///
    /// Returns `false` when the buffer is full and the particle was dropped.
    pub fn push(&mut self, x: i32, y: i32, color: u32) -> bool {
        if self.cursor >= self.capacity() {
            self.dropped += 1;
            if !self.overflow_logged {
                self.overflow_logged = true;
                tracing::warn!(
                    buffer = self.label,
                    capacity = self.capacity(),
                    "particle buffer full, dropping particles until next frame"
                );
            }
            return false;
        }

        self.positions[self.cursor] = [x as f32, y as f32];
        self.colors[self.cursor] = PackedColor::from_rgb(color);
        self.cursor += 1;
        true
    }

    /// Number of particles written since the last clear.
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// Whether no particles are pending.
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Maximum number of particles per frame.
    pub fn capacity(&self) -> usize {
        self.positions.len()
    }

    /// Particles discarded because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Active positions (the written prefix).
    pub fn positions(&self) -> &[[f32; 2]] {
        &self.positions[..self.cursor]
    }

    /// Active packed colors (the written prefix).
    pub fn colors(&self) -> &[PackedColor] {
        &self.colors[..self.cursor]
    }

    /// Rewind the cursor for the next frame. Stale slots are left in place.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.dropped = 0;
        self.overflow_logged = false;
    }

    /// Zero every slot and rewind.
    pub fn zero(&mut self) {
        self.positions.fill([0.0; 2]);
        self.colors.fill(PackedColor::default());
        self.rewind();
    }

    #[cfg(test)]
    fn raw(&self) -> (&[[f32; 2]], &[PackedColor]) {
        (&self.positions, &self.colors)
    }
}

/// The dynamic (frame-local) and static (baked into the trail) layers.
#[derive(Debug, Clone)]
pub struct ParticleStore {
    /// Particles drawn directly onto the surface this frame.
    pub dynamic: ParticleBuffer,
    /// Particles baked into the trail texture this frame.
    pub statics: ParticleBuffer,
}

impl ParticleStore {
    /// Allocate both layers at the same capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            dynamic: ParticleBuffer::new("dynamic", capacity),
            statics: ParticleBuffer::new("static", capacity),
        }
    }

    /// Rewind both cursors after a frame.
    pub fn end_frame(&mut self) {
        self.dynamic.rewind();
        self.statics.rewind();
    }

    /// Zero both layers.
    pub fn zero(&mut self) {
        self.dynamic.zero();
        self.statics.zero();
    }
}
