//! Frame driver configuration.
//!
//! `DriverConfig` controls how a [`FrameDriver`](crate::driver::FrameDriver)
//! paces frames, which render backend it presents through and how many
//! resources a single effect may hold.
//!
//! `DriverConfig` provides defaults via [`Default`] and a fluent
//! [`DriverConfig::builder()`] with validation.
//!
//! # Examples
//!
//! ```rust
//! use drawbridge::config::{BackendKind, DriverConfig};
//! use std::time::Duration;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = DriverConfig::builder()
//!     .frame_interval(Duration::from_millis(20))
//!     .warmup_frames(2)
//!     .backend(BackendKind::Null)
//!     .build()?;
//! assert_eq!(cfg.warmup_frames, 2);
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `frame_interval`: delay between frames unless the effect asks for another (default: 1/60 s).
//! - `max_frame_delay`: upper bound on a delay requested by an effect (default: 10 s).
//! - `warmup_frames`: frame ticks skipped before the effect is initialised (default: 0).
//! - `backend`: render backend to present through (default: [`BackendKind::Cpu`]).
//! - `dirty_uploads`: upload only the changed rectangle (default: `true`).
//! - `resource_limits`: caps on pixmaps, pixmap memory and graphics contexts.

use crate::arena::ResourceLimits;
use crate::errors::BridgeError;
use crate::render::backend::RenderBackend;
use crate::render::backends::{cpu::CpuBackend, null::NullBackend};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Render backends that can be selected at runtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    Null,
    #[default]
    Cpu,
    #[cfg(feature = "backend_cairo")]
    Cairo,
    /// A headless wgpu device. Hosts with their own device build a
    /// `WgpuBackend` and pass it to the driver directly.
    #[cfg(feature = "backend_wgpu")]
    Wgpu,
}

impl BackendKind {
    /// Instantiates the backend. Failure means hardware presentation is unavailable.
    pub fn create(self) -> Result<Box<dyn RenderBackend>, BridgeError> {
        match self {
            BackendKind::Null => NullBackend::new()
                .map(|b| Box::new(b) as Box<dyn RenderBackend>)
                .map_err(|e| BridgeError::BackendUnavailable(e.to_string())),
            BackendKind::Cpu => Ok(Box::new(CpuBackend::new())),
            #[cfg(feature = "backend_cairo")]
            BackendKind::Cairo => Ok(Box::new(crate::render::backends::cairo::CairoBackend::new())),
            #[cfg(feature = "backend_wgpu")]
            BackendKind::Wgpu => {
                use crate::render::backends::wgpu::{HeadlessContext, WgpuBackend};
                let ctx = HeadlessContext::new().map_err(|e| BridgeError::BackendUnavailable(e.to_string()))?;
                Ok(Box::new(WgpuBackend::new(std::sync::Arc::new(ctx))))
            }
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "null" | "none" => Ok(BackendKind::Null),
            "cpu" | "software" => Ok(BackendKind::Cpu),
            #[cfg(feature = "backend_cairo")]
            "cairo" => Ok(BackendKind::Cairo),
            #[cfg(feature = "backend_wgpu")]
            "wgpu" | "gpu" => Ok(BackendKind::Wgpu),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub frame_interval: Duration,
    pub max_frame_delay: Duration,
    pub warmup_frames: u32,
    pub backend: BackendKind,
    pub dirty_uploads: bool,
    pub resource_limits: ResourceLimits,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_nanos(1_000_000_000 / 60),
            max_frame_delay: Duration::from_secs(10),
            warmup_frames: 0,
            backend: BackendKind::default(),
            dirty_uploads: true,
            resource_limits: ResourceLimits::default(),
        }
    }
}

impl DriverConfig {
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }
}

/// Builder for [`DriverConfig`].
#[derive(Debug, Clone, Default)]
pub struct DriverConfigBuilder {
    inner: DriverConfig,
}

impl DriverConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut DriverConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn frame_interval(self, d: Duration) -> Self { self.map(|c| c.frame_interval = d) }
    pub fn fps(self, fps: u32) -> Self { self.map(|c| c.frame_interval = Duration::from_secs(1) / fps.max(1)) }
    pub fn max_frame_delay(self, d: Duration) -> Self { self.map(|c| c.max_frame_delay = d) }
    pub fn warmup_frames(self, n: u32) -> Self { self.map(|c| c.warmup_frames = n) }
    pub fn backend(self, kind: BackendKind) -> Self { self.map(|c| c.backend = kind) }
    pub fn dirty_uploads(self, on: bool) -> Self { self.map(|c| c.dirty_uploads = on) }
    pub fn max_pixmaps(self, n: usize) -> Self { self.map(|c| c.resource_limits.max_pixmaps = n) }
    pub fn max_pixmap_bytes(self, n: usize) -> Self { self.map(|c| c.resource_limits.max_pixmap_bytes = n) }
    pub fn max_gcs(self, n: usize) -> Self { self.map(|c| c.resource_limits.max_gcs = n) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut DriverConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<DriverConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroFrameInterval,
    DelayBelowInterval { max: Duration, interval: Duration },
    TooManyWarmupFrames(u32),
    ZeroLimit(&'static str),
    UnknownBackend(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroFrameInterval =>
                write!(f, "frame_interval must be greater than zero"),
            ConfigError::DelayBelowInterval { max, interval } =>
                write!(f, "max_frame_delay ({max:?}) < frame_interval ({interval:?})"),
            ConfigError::TooManyWarmupFrames(n) =>
                write!(f, "warmup_frames {n} is out of range (expected 0..={MAX_WARMUP_FRAMES})"),
            ConfigError::ZeroLimit(name) =>
                write!(f, "{name} must be at least 1"),
            ConfigError::UnknownBackend(name) =>
                write!(f, "unknown render backend {name:?}"),
        }
    }
}
impl std::error::Error for ConfigError {}

impl From<ConfigError> for BridgeError {
    fn from(e: ConfigError) -> Self {
        BridgeError::InvalidConfig(e.to_string())
    }
}

const MAX_WARMUP_FRAMES: u32 = 600;

fn validate(c: &DriverConfig) -> Result<(), ConfigError> {
    if c.frame_interval.is_zero() {
        return Err(ConfigError::ZeroFrameInterval);
    }
    if c.max_frame_delay < c.frame_interval {
        return Err(ConfigError::DelayBelowInterval { max: c.max_frame_delay, interval: c.frame_interval });
    }
    if c.warmup_frames > MAX_WARMUP_FRAMES {
        return Err(ConfigError::TooManyWarmupFrames(c.warmup_frames));
    }
    if c.resource_limits.max_pixmaps == 0 {
        return Err(ConfigError::ZeroLimit("max_pixmaps"));
    }
    if c.resource_limits.max_gcs == 0 {
        return Err(ConfigError::ZeroLimit("max_gcs"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = DriverConfig::builder().build().unwrap();
        assert_eq!(cfg.warmup_frames, 0);
        assert_eq!(cfg.backend, BackendKind::Cpu);
        assert!(cfg.dirty_uploads);
        assert_eq!(cfg.frame_interval, Duration::from_nanos(16_666_666));
    }

    #[test]
    fn builder_validates() {
        assert_eq!(
            DriverConfig::builder().frame_interval(Duration::ZERO).build().unwrap_err(),
            ConfigError::ZeroFrameInterval
        );
        assert!(matches!(
            DriverConfig::builder().max_frame_delay(Duration::from_millis(1)).build(),
            Err(ConfigError::DelayBelowInterval { .. })
        ));
        assert_eq!(
            DriverConfig::builder().warmup_frames(601).build().unwrap_err(),
            ConfigError::TooManyWarmupFrames(601)
        );
        let err = DriverConfig::builder().max_gcs(0).build().unwrap_err();
        assert_eq!(err.to_string(), "max_gcs must be at least 1");
        assert!(matches!(BridgeError::from(err), BridgeError::InvalidConfig(_)));
    }

    #[test]
    fn with_applies_several_fields() {
        let cfg = DriverConfig::builder()
            .fps(30)
            .with(|c| {
                c.dirty_uploads = false;
                c.backend = BackendKind::Null;
            })
            .build()
            .unwrap();
        assert_eq!(cfg.frame_interval, Duration::from_nanos(33_333_333));
        assert!(!cfg.dirty_uploads);
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("CPU".parse::<BackendKind>().unwrap(), BackendKind::Cpu);
        assert_eq!("null".parse::<BackendKind>().unwrap(), BackendKind::Null);
        assert!("metal".parse::<BackendKind>().is_err());
        assert!(BackendKind::Null.create().is_ok());
    }
}
