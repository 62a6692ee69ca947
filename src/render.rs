pub mod backbuffer;
pub mod backend;
pub mod compositor;
pub mod upload;

/// Render backends the compositor can present through.
pub mod backends {
    /// Cairo rendering backend
    #[cfg(feature = "backend_cairo")]
    pub mod cairo;
    pub mod cpu;
    pub mod null;
    /// wgpu texture backend
    #[cfg(feature = "backend_wgpu")]
    pub mod wgpu;
}

mod viewport;

pub use viewport::{Rotation, Viewport};
