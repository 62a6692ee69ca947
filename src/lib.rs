//! Drawbridge runs immediate-mode, Xlib-style drawing code on top of a
//! retained-mode compositor.
//!
//! Effects draw through a [`display::Display`] into a CPU backbuffer; the
//! [`driver::FrameDriver`] sequences their lifecycle and hands finished
//! frames to a [`render::backend::RenderBackend`].

pub mod arena;
pub mod color;
pub mod config;
pub mod display;
pub mod drawable;
pub mod driver;
pub mod effect;
pub mod effects;
pub mod errors;
pub mod event;
pub mod ffi;
pub mod fps;
pub mod gc;
pub mod geometry;
pub mod image;
pub mod logging;
pub mod options;
pub mod raster;
pub mod render;

pub use config::DriverConfig;
pub use display::Display;
pub use driver::FrameDriver;
pub use errors::BridgeError;
