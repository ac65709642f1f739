//! Host window wrapping winit.

use anyhow::Result;
use std::sync::Arc;
use winit::{
    dpi::PhysicalSize,
    event::Event,
    event_loop::{EventLoop, EventLoopWindowTarget},
    window::{Window, WindowBuilder},
};

/// Window configuration.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width
    pub width: u32,
    /// Initial height
    pub height: u32,
    /// Allow the user to resize the surface.
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "pixeltrail".to_string(),
            width: 300,
            height: 300,
            resizable: false,
        }
    }
}

/// Window manager owning the event loop until [`WindowManager::run`].
pub struct WindowManager {
    window: Arc<Window>,
    event_loop: Option<EventLoop<()>>,
}

impl WindowManager {
    /// Create a new window with the given configuration.
    pub fn new(config: WindowConfig) -> Result<Self> {
        let event_loop = EventLoop::new()?;

        let window = WindowBuilder::new()
            .with_title(config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(config.resizable)
            .build(&event_loop)?;

        tracing::debug!(
            width = config.width,
            height = config.height,
            "window created"
        );

        Ok(Self {
            window: Arc::new(window),
            event_loop: Some(event_loop),
        })
    }

    /// Shared handle to the window (used to build the render context).
    pub fn window(&self) -> Arc<Window> {
        self.window.clone()
    }

    /// Get the current window size.
    pub fn size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    /// Run the event loop with a callback.
    ///
    /// The callback receives events plus the loop target (for control-flow
    /// changes) and returns whether to continue running.
    pub fn run<F>(mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(Event<()>, &Window, &EventLoopWindowTarget<()>) -> bool + 'static,
    {
        let event_loop = self
            .event_loop
            .take()
            .ok_or_else(|| anyhow::anyhow!("Event loop already consumed"))?;

        let window = self.window;

        event_loop.run(move |event, elwt| {
            if !callback(event, &window, elwt) {
                elwt.exit();
            }
        })?;

        Ok(())
    }
}
