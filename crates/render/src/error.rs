use thiserror::Error;

/// Failures surfaced by the renderer. Draw-time problems never reach the
/// caller; they are logged and the affected pass is skipped.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No adapter matched the request.
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    /// Device creation failed.
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    /// Window surface creation failed.
    #[error("failed to create window surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    /// The surface reported no supported formats for this adapter.
    #[error("surface is not supported by the selected adapter")]
    IncompatibleSurface,
    /// Width or height was zero.
    #[error("surface size {width}x{height} is empty")]
    EmptySurface {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// A target dimension is larger than the device's 2D texture limit.
    #[error("surface size {width}x{height} exceeds the device limit of {max}")]
    SurfaceTooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// `max_texture_dimension_2d` of the device.
        max: u32,
    },
    /// A background dimension is larger than the device's 2D texture limit.
    #[error("background is {width}x{height} but the device limit is {max}")]
    BackgroundTooLarge {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// `max_texture_dimension_2d` of the device.
        max: u32,
    },
    /// Background pixel data did not match the declared dimensions.
    #[error("background is {width}x{height} but {len} bytes were supplied (expected {expected})")]
    BackgroundSize {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Supplied byte count.
        len: usize,
        /// Expected byte count.
        expected: usize,
    },
    /// The operation needs `Renderer::initialize` to have run.
    #[error("renderer has not been initialized")]
    NotInitialized,
}
