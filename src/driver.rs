//! The animation frame driver.
//!
//! A [`FrameDriver`] owns one effect instance together with the display it
//! draws on and the compositor that presents it. It moves through
//!
//! ```text
//! Created -> Setup -> Initialized -> Running <-> Resizing -> TornDown
//!                          \-> Failed
//! ```
//!
//! Setup merges the resource database once. Init runs on the first frame
//! tick, after the window has been cleared to the `background` resource.
//! Every later tick services a pending resize, delivers queued events,
//! draws, overlays the frame rate when asked to, and composites.
//!
//! The driver is single threaded. [`runner`] wraps it in a tokio task for
//! hosts that want it driven by timers and commands.

pub mod runner;
mod tick;

pub use tick::{FrameStatus, TickResult};

use crate::arena::SweepReport;
use crate::config::DriverConfig;
use crate::display::Display;
use crate::effect::{EffectContext, EffectDescriptor, EffectInstanceId, EffectState};
use crate::errors::BridgeError;
use crate::event::Event;
use crate::fps::FpsOverlay;
use crate::options::{Preferences, Resources};
use crate::render::backend::{RenderBackend, RgbaImage};
use crate::render::backends::cpu::CpuBackend;
use crate::render::compositor::{Compositor, CompositorStats};
use crate::render::Viewport;
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Created,
    /// Resources are loaded; init runs on the next frame tick.
    Setup,
    /// The effect has been initialised but not drawn yet.
    Initialized,
    Running,
    /// The window changed size; the effect is reshaped before its next draw.
    Resizing,
    TornDown,
    /// Init failed. The effect is skipped.
    Failed(String),
}

pub struct FrameDriver {
    id: EffectInstanceId,
    config: DriverConfig,
    descriptor: Arc<EffectDescriptor>,
    prefs: Preferences,
    resources: Option<Resources>,
    display: Display,
    compositor: Compositor,
    effect: Option<Box<dyn EffectState>>,
    state: DriverState,
    setup_done: bool,
    init_done: bool,
    resize_pending: bool,
    next_frame_at: Option<Instant>,
    warmup_left: u32,
    frames: u64,
    events: VecDeque<Event>,
    fps: Option<FpsOverlay>,
    last_sweep: Option<SweepReport>,
}

impl FrameDriver {
    pub fn new(
        config: DriverConfig,
        descriptor: Arc<EffectDescriptor>,
        backend: Box<dyn RenderBackend>,
        prefs: Preferences,
        viewport: Viewport,
    ) -> Self {
        let display = Display::new(viewport, config.resource_limits);
        let compositor = Compositor::new(backend, config.dirty_uploads);
        Self {
            id: EffectInstanceId::new(),
            warmup_left: config.warmup_frames,
            config,
            descriptor,
            prefs,
            resources: None,
            display,
            compositor,
            effect: None,
            state: DriverState::Created,
            setup_done: false,
            init_done: false,
            resize_pending: false,
            next_frame_at: None,
            frames: 0,
            events: VecDeque::new(),
            fps: None,
            last_sweep: None,
        }
    }

    /// Builds the backend named in `config`. When it can't be created the
    /// driver still runs, without presenting.
    pub fn from_config(
        config: DriverConfig,
        descriptor: Arc<EffectDescriptor>,
        prefs: Preferences,
        viewport: Viewport,
    ) -> Self {
        match config.backend.create() {
            Ok(backend) => Self::new(config, descriptor, backend, prefs, viewport),
            Err(e) => {
                let mut driver = Self::new(config, descriptor, Box::new(CpuBackend::new()), prefs, viewport);
                driver.compositor.disable(e);
                driver
            }
        }
    }

    pub fn id(&self) -> EffectInstanceId {
        self.id
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn effect_name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn resources(&self) -> Option<&Resources> {
        self.resources.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.init_done
    }

    pub fn resize_pending(&self) -> bool {
        self.resize_pending
    }

    pub fn next_frame_at(&self) -> Option<Instant> {
        self.next_frame_at
    }

    /// Frames the current effect has drawn.
    /// Delay between frames when the effect does not ask for one.
    pub fn frame_interval(&self) -> Duration {
        self.config.frame_interval
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn compositor_stats(&self) -> CompositorStats {
        self.compositor.stats()
    }

    /// What the last teardown reclaimed from the effect.
    pub fn last_sweep(&self) -> Option<SweepReport> {
        self.last_sweep
    }

    /// True while ticking can make progress.
    pub fn wants_ticks(&self) -> bool {
        self.setup_done
            && self.display.window().is_visible()
            && !matches!(self.state, DriverState::TornDown | DriverState::Failed(_))
    }

    /// Loads the resource database. Only valid once, straight after creation.
    pub fn setup(&mut self) -> Result<(), BridgeError> {
        if self.state != DriverState::Created {
            return Err(BridgeError::InvalidState(format!("setup in state {:?}", self.state)));
        }
        let resources = Resources::load(self.descriptor.name(), self.descriptor.default_lines(), &self.prefs);
        self.resources = Some(resources);
        self.setup_done = true;
        self.warmup_left = self.config.warmup_frames;
        self.next_frame_at = None;
        self.state = DriverState::Setup;
        debug!("{} ({}): setup done", self.descriptor.name(), self.id);
        Ok(())
    }

    /// Runs one frame if it is due at `now`.
    pub fn tick(&mut self, now: Instant) -> Result<TickResult, BridgeError> {
        match &self.state {
            DriverState::Created => return Err(BridgeError::InvalidState("tick before setup".into())),
            DriverState::TornDown => return Ok(TickResult::idle(FrameStatus::TornDown)),
            DriverState::Failed(reason) => return Ok(TickResult::idle(FrameStatus::Failed(reason.clone()))),
            _ => {}
        }
        if !self.display.window().is_visible() {
            return Ok(TickResult::idle(FrameStatus::Suspended));
        }
        if let Some(at) = self.next_frame_at {
            if now < at {
                return Ok(TickResult { next_tick_in: Some(at - now), ..TickResult::idle(FrameStatus::Waiting) });
            }
        }

        if !self.init_done {
            if self.warmup_left > 0 {
                self.warmup_left -= 1;
                self.next_frame_at = Some(now + self.config.frame_interval);
                return Ok(TickResult {
                    next_tick_in: Some(self.config.frame_interval),
                    ..TickResult::idle(FrameStatus::WarmingUp)
                });
            }
            if let Err(reason) = self.initialize() {
                return Ok(TickResult::idle(FrameStatus::Failed(reason)));
            }
        }

        if let Err(e) = self.display.window_mut().realize() {
            warn!("{}: skipping frame, backbuffer unavailable: {e}", self.descriptor.name());
            self.next_frame_at = Some(now + self.config.frame_interval);
            return Ok(TickResult {
                next_tick_in: Some(self.config.frame_interval),
                ..TickResult::idle(FrameStatus::Skipped)
            });
        }

        let (Some(effect), Some(resources)) = (self.effect.as_mut(), self.resources.as_ref()) else {
            return Err(BridgeError::InvalidState("initialised without an effect".into()));
        };
        let mut ctx = EffectContext::new(&mut self.display, resources, self.frames);

        if self.resize_pending {
            self.resize_pending = false;
            let (w, h) = (ctx.width(), ctx.height());
            debug!("{}: reshape to {w}x{h}", self.descriptor.name());
            effect.reshape(&mut ctx, w, h);
        }

        while let Some(event) = self.events.pop_front() {
            if !effect.event(&mut ctx, &event) {
                trace!("{}: unhandled {event:?}", self.descriptor.name());
            }
        }

        let started = Instant::now();
        let requested = effect.draw(&mut ctx);
        let draw_time = started.elapsed();
        self.frames += 1;
        self.state = DriverState::Running;

        if let Some(fps) = self.fps.as_mut() {
            fps.record_frame(now, draw_time);
            fps.draw(&mut self.display);
        }

        let expected = self.display.window().size();
        let outcome = self.compositor.composite(self.display.window_mut().backbuffer_mut(), expected);
        trace!("{} frame {}: {outcome:?}", self.descriptor.name(), self.frames);
        let backend_error = self.compositor.take_error();

        let delay = requested.unwrap_or(self.config.frame_interval).min(self.config.max_frame_delay);
        self.next_frame_at = Some(now + delay);

        Ok(TickResult {
            status: FrameStatus::Drawn,
            drew: true,
            outcome: Some(outcome),
            backend_error,
            next_tick_in: Some(delay),
        })
    }

    /// Clears the window and runs the effect's init. On failure the driver
    /// moves to `Failed` and everything the effect allocated is reclaimed.
    fn initialize(&mut self) -> Result<(), String> {
        let Some(resources) = self.resources.as_ref() else {
            return Err("no resources loaded".into());
        };

        let ignore_rotation = resources.get_boolean("ignoreRotation");
        if ignore_rotation != self.display.window().ignore_rotation() {
            self.display.window_mut().set_ignore_rotation(ignore_rotation);
        }
        let background = resources.get_pixel("background");
        self.display.set_window_background(background);
        if let Err(e) = self.display.window_mut().realize() {
            warn!("{}: backbuffer unavailable at init: {e}", self.descriptor.name());
        }
        self.display.clear_window();

        let mut ctx = EffectContext::new(&mut self.display, resources, 0);
        match self.descriptor.init(&mut ctx) {
            Ok(effect) => self.effect = Some(effect),
            Err(e) => {
                let reason = format!("{} failed to initialise: {e:#}", self.descriptor.name());
                warn!("{reason}");
                self.release();
                self.state = DriverState::Failed(reason.clone());
                return Err(reason);
            }
        }

        if resources.get_boolean("doFPS") {
            self.fps = Some(FpsOverlay::new(resources.get_boolean("fpsTop")));
        }
        self.init_done = true;
        // The effect saw the current size in init.
        self.resize_pending = false;
        self.state = DriverState::Initialized;
        debug!("{} ({}): initialised", self.descriptor.name(), self.id);
        Ok(())
    }

    /// The host surface changed. The backbuffer follows before the next
    /// frame, and an initialised effect is reshaped.
    pub fn resize(&mut self, viewport: Viewport, scale: f32) {
        if matches!(self.state, DriverState::TornDown | DriverState::Failed(_)) {
            return;
        }
        let changed = self.display.window_mut().reconfigure(viewport, scale);
        if changed && self.init_done {
            self.resize_pending = true;
            self.state = DriverState::Resizing;
        }
    }

    /// Queues an input event for delivery before the next draw. Pointer
    /// positions are in surface coordinates.
    pub fn queue_event(&mut self, event: Event) {
        if matches!(self.state, DriverState::TornDown | DriverState::Failed(_)) {
            return;
        }
        let window = self.display.window();
        let event = match event.position() {
            Some(p) => {
                let logical = window.viewport().to_logical(p, window.ignore_rotation());
                self.display.window_mut().set_pointer(logical);
                event.with_position(logical)
            }
            None => event,
        };
        self.events.push_back(event);
    }

    /// Hidden windows draw nothing and give up their backend surface.
    pub fn set_visible(&mut self, visible: bool) {
        if self.display.window().is_visible() == visible {
            return;
        }
        self.display.window_mut().set_visible(visible);
        if visible {
            self.compositor.resume();
            self.display.window_mut().backbuffer_mut().mark_all_dirty();
            self.next_frame_at = None;
            debug!("{}: visible, resuming", self.descriptor.name());
        } else {
            self.compositor.release();
            debug!("{}: hidden, suspended", self.descriptor.name());
        }
    }

    /// The backend's context went away. Its surface is recreated on the next frame.
    pub fn context_lost(&mut self) {
        debug!("{}: render context lost", self.descriptor.name());
        self.compositor.invalidate();
        self.display.window_mut().backbuffer_mut().mark_all_dirty();
    }

    /// Presents through another backend from the next frame on.
    pub fn set_backend(&mut self, backend: Box<dyn RenderBackend>) {
        let old = self.compositor.replace_backend(backend);
        debug!("switched backend from {} to {}", old.name(), self.compositor.backend_name());
        self.display.window_mut().backbuffer_mut().mark_all_dirty();
    }

    /// Tears down the running effect and sets up `descriptor` in its place.
    pub fn switch_effect(&mut self, descriptor: Arc<EffectDescriptor>, prefs: Preferences) -> Result<(), BridgeError> {
        self.teardown();
        debug!("switching from {} to {}", self.descriptor.name(), descriptor.name());
        self.id = EffectInstanceId::new();
        self.descriptor = descriptor;
        self.prefs = prefs;
        self.resources = None;
        self.setup_done = false;
        self.init_done = false;
        self.resize_pending = false;
        self.frames = 0;
        self.state = DriverState::Created;
        self.compositor.resume();
        self.setup()
    }

    /// Stops the effect and frees everything it held. Safe to call more than once.
    pub fn teardown(&mut self) -> SweepReport {
        if self.state == DriverState::TornDown {
            return SweepReport::default();
        }
        if let (Some(mut effect), Some(resources)) = (self.effect.take(), self.resources.as_ref()) {
            let mut ctx = EffectContext::new(&mut self.display, resources, self.frames);
            effect.free(&mut ctx);
        }
        let report = self.release();
        self.state = DriverState::TornDown;
        debug!("{} ({}): torn down", self.descriptor.name(), self.id);
        report
    }

    /// Drops the effect's surface, backbuffer and leftover resources.
    fn release(&mut self) -> SweepReport {
        self.effect = None;
        self.fps = None;
        self.compositor.release();
        self.display.window_mut().backbuffer_mut().release();
        let report = self.display.release_all();
        if report.total() > 0 {
            debug!(
                "{}: reclaimed {} pixmaps, {} gcs, {} fonts left allocated",
                self.descriptor.name(),
                report.pixmaps,
                report.gcs,
                report.fonts
            );
        }
        self.events.clear();
        self.next_frame_at = None;
        self.last_sweep = Some(report);
        report
    }

    /// The last presented frame, read back from the backend.
    pub fn snapshot(&mut self) -> Option<RgbaImage> {
        self.compositor.snapshot()
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;
    use crate::event::{Modifiers, MouseButton};
    use crate::gc::{GcMask, GcValues};
    use crate::geometry::{Point, Rect};
    use crate::render::backbuffer::BackbufferState;
    use crate::render::backend::SurfaceSize;
    use crate::render::backends::null::{NullBackend, NullStats};
    use crate::render::compositor::{PresentOutcome, SkipReason};
    use crate::render::Rotation;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Draws a red diagonal and records every callback.
    struct Recorder {
        log: Log,
        leak: bool,
    }

    impl EffectState for Recorder {
        fn draw(&mut self, ctx: &mut EffectContext<'_>) -> Option<Duration> {
            self.log.lock().unwrap().push(format!("draw {}x{}", ctx.width(), ctx.height()));
            if self.leak {
                let _ = ctx.display.create_pixmap(ctx.window, 8, 8, 32);
            }
            None
        }

        fn reshape(&mut self, _ctx: &mut EffectContext<'_>, width: u32, height: u32) {
            self.log.lock().unwrap().push(format!("reshape {width}x{height}"));
        }

        fn event(&mut self, _ctx: &mut EffectContext<'_>, event: &Event) -> bool {
            self.log.lock().unwrap().push(format!("event {:?}", event.position()));
            true
        }

        fn free(&mut self, _ctx: &mut EffectContext<'_>) {
            self.log.lock().unwrap().push("free".into());
        }
    }

    fn recorder(log: &Log, leak: bool) -> Arc<EffectDescriptor> {
        let log = log.clone();
        Arc::new(EffectDescriptor::new("recorder", move |ctx| {
            log.lock().unwrap().push(format!("init {}x{}", ctx.width(), ctx.height()));
            Ok(Box::new(Recorder { log: log.clone(), leak }) as Box<dyn EffectState>)
        }))
    }

    fn driver_with(log: &Log, config: DriverConfig, prefs: Preferences, w: u32, h: u32) -> (FrameDriver, NullStats) {
        let (backend, stats) = NullBackend::new_with_stats();
        let mut driver = FrameDriver::new(config, recorder(log, false), Box::new(backend), prefs, Viewport::new(w, h));
        driver.setup().unwrap();
        (driver, stats)
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn lifecycle_runs_init_then_draws() {
        let log = Log::default();
        let (mut driver, stats) = driver_with(&log, DriverConfig::default(), Preferences::new(), 64, 32);
        assert_eq!(driver.state(), &DriverState::Setup);
        assert!(driver.setup().is_err());

        let t0 = Instant::now();
        let r = driver.tick(t0).unwrap();
        assert_eq!(r.status, FrameStatus::Drawn);
        assert!(r.presented());
        assert_eq!(driver.state(), &DriverState::Running);
        assert_eq!(entries(&log), vec!["init 64x32", "draw 64x32"]);
        assert_eq!(stats.presents(), 1);

        // Not due yet.
        let r = driver.tick(t0 + Duration::from_millis(1)).unwrap();
        assert_eq!(r.status, FrameStatus::Waiting);
        assert!(!r.drew);

        let r = driver.tick(t0 + driver.config.frame_interval).unwrap();
        assert!(r.drew);
        assert_eq!(driver.frames_drawn(), 2);

        driver.teardown();
        assert_eq!(entries(&log).last().map(String::as_str), Some("free"));
        assert_eq!(driver.tick(t0 + Duration::from_secs(1)).unwrap().status, FrameStatus::TornDown);
    }

    #[test]
    fn tick_before_setup_is_an_error() {
        let log = Log::default();
        let mut driver = FrameDriver::new(
            DriverConfig::default(),
            recorder(&log, false),
            Box::new(NullBackend::new().unwrap()),
            Preferences::new(),
            Viewport::new(4, 4),
        );
        assert!(matches!(driver.tick(Instant::now()), Err(BridgeError::InvalidState(_))));
    }

    #[test]
    fn background_resource_clears_the_window_before_init() {
        let log = Log::default();
        let mut prefs = Preferences::new();
        prefs.set("recorder_background", "#0000ff");
        let (mut driver, _) = driver_with(&log, DriverConfig::default(), prefs, 8, 8);
        driver.tick(Instant::now()).unwrap();

        let img = driver.display().window().backbuffer().image().unwrap();
        assert_eq!(img.get_pixel(3, 3), Some(0xFF00_00FF));
        assert_eq!(driver.display().window().background(), 0xFF00_00FF);
    }

    #[test]
    fn sequential_resizes_leave_backbuffer_at_window_size() {
        let log = Log::default();
        let (mut driver, _) = driver_with(&log, DriverConfig::default(), Preferences::new(), 100, 100);
        let mut now = Instant::now();
        driver.tick(now).unwrap();

        for (w, h) in [(120, 80), (50, 200), (300, 10), (77, 77)] {
            driver.resize(Viewport::new(w, h), 1.0);
        }
        assert_eq!(driver.state(), &DriverState::Resizing);
        assert!(driver.resize_pending());

        now += Duration::from_secs(1);
        let r = driver.tick(now).unwrap();
        assert!(r.presented());
        let window = driver.display().window();
        assert_eq!(window.backbuffer().size(), Some(SurfaceSize::new(77, 77)));
        assert_eq!(window.backbuffer().state(), BackbufferState::Allocated);

        let log = entries(&log);
        assert_eq!(&log[log.len() - 2..], ["reshape 77x77", "draw 77x77"]);
        assert_eq!(log.iter().filter(|l| l.starts_with("reshape")).count(), 1);
    }

    #[test]
    fn reshape_never_precedes_init() {
        let log = Log::default();
        let config = DriverConfig::builder().warmup_frames(2).build().unwrap();
        let (mut driver, _) = driver_with(&log, config, Preferences::new(), 40, 30);

        // Resize between setup and init.
        driver.resize(Viewport::new(50, 60), 1.0);
        assert!(!driver.resize_pending());

        let mut now = Instant::now();
        for _ in 0..2 {
            assert_eq!(driver.tick(now).unwrap().status, FrameStatus::WarmingUp);
            now += Duration::from_secs(1);
        }
        assert!(entries(&log).is_empty());

        driver.resize(Viewport::new(70, 60), 1.0);
        driver.tick(now).unwrap();
        assert_eq!(entries(&log), vec!["init 70x60", "draw 70x60"]);
    }

    #[test]
    fn leaked_resources_are_reclaimed_at_teardown() {
        let log = Log::default();
        let (backend, _) = NullBackend::new_with_stats();
        let mut prefs = Preferences::new();
        prefs.set("doFPS", true);
        let mut driver =
            FrameDriver::new(DriverConfig::default(), recorder(&log, true), Box::new(backend), prefs, Viewport::new(32, 32));
        driver.setup().unwrap();

        let mut now = Instant::now();
        for _ in 0..3 {
            driver.tick(now).unwrap();
            now += Duration::from_secs(1);
        }
        // The frame-rate overlay draws without touching the effect's resources.
        assert_eq!(driver.display().resource_counts().pixmaps, 3);
        assert_eq!(driver.display().resource_counts().gcs, 0);
        assert_eq!(driver.display().resource_counts().fonts, 0);

        let report = driver.teardown();
        assert_eq!((report.pixmaps, report.gcs, report.fonts), (3, 0, 0));
        let counts = driver.display().resource_counts();
        assert_eq!((counts.pixmaps, counts.gcs, counts.fonts, counts.pixmap_bytes), (0, 0, 0, 0));
        assert_eq!(driver.display().window().backbuffer().state(), BackbufferState::Unallocated);
        assert_eq!(driver.teardown(), SweepReport::default());
    }

    #[test]
    fn failed_allocation_keeps_drawing_without_presenting() {
        let log = Log::default();
        let (backend, stats) = NullBackend::failing();
        let mut driver = FrameDriver::new(
            DriverConfig::default(),
            recorder(&log, false),
            Box::new(backend),
            Preferences::new(),
            Viewport::new(16, 16),
        );
        driver.setup().unwrap();

        let mut now = Instant::now();
        let mut errors = Vec::new();
        for _ in 0..3 {
            let r = driver.tick(now).unwrap();
            assert!(r.drew);
            assert_eq!(r.outcome, Some(PresentOutcome::Skipped(SkipReason::Degraded)));
            errors.extend(r.backend_error);
            now += Duration::from_secs(1);
        }
        // Degradation is reported once, on the frame it happened.
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], BridgeError::BackendUnavailable(_)));
        assert!(matches!(driver.compositor().degraded_error(), Some(BridgeError::BackendUnavailable(_))));
        assert!(driver.compositor().is_degraded());
        assert_eq!(stats.presents(), 0);
        assert_eq!(entries(&log).iter().filter(|l| l.starts_with("draw")).count(), 3);
    }

    #[test]
    fn failing_init_marks_the_driver_failed() {
        let descriptor = Arc::new(EffectDescriptor::new("broken", |ctx| {
            let _ = ctx.display.create_pixmap(ctx.window, 4, 4, 32);
            Err(anyhow::anyhow!("no good"))
        }));
        let mut driver = FrameDriver::new(
            DriverConfig::default(),
            descriptor,
            Box::new(NullBackend::new().unwrap()),
            Preferences::new(),
            Viewport::new(8, 8),
        );
        driver.setup().unwrap();
        let r = driver.tick(Instant::now()).unwrap();
        assert!(matches!(r.status, FrameStatus::Failed(ref m) if m.contains("no good")));
        assert!(matches!(driver.state(), DriverState::Failed(_)));
        assert_eq!(driver.last_sweep().map(|s| s.pixmaps), Some(1));
        assert!(!driver.wants_ticks());
    }

    #[test]
    fn requested_delay_replaces_the_interval_up_to_the_cap() {
        struct Slow;
        impl EffectState for Slow {
            fn draw(&mut self, _ctx: &mut EffectContext<'_>) -> Option<Duration> {
                Some(Duration::from_secs(60))
            }
        }
        let descriptor = Arc::new(EffectDescriptor::new("slow", |_| Ok(Box::new(Slow) as Box<dyn EffectState>)));
        let config = DriverConfig::builder().max_frame_delay(Duration::from_secs(2)).build().unwrap();
        let mut driver =
            FrameDriver::new(config, descriptor, Box::new(NullBackend::new().unwrap()), Preferences::new(), Viewport::new(4, 4));
        driver.setup().unwrap();
        let now = Instant::now();
        let r = driver.tick(now).unwrap();
        assert_eq!(r.next_tick_in, Some(Duration::from_secs(2)));
        assert_eq!(driver.next_frame_at(), Some(now + Duration::from_secs(2)));
    }

    #[test]
    fn hidden_windows_suspend_and_release_the_surface() {
        let log = Log::default();
        let (mut driver, stats) = driver_with(&log, DriverConfig::default(), Preferences::new(), 10, 10);
        let mut now = Instant::now();
        driver.tick(now).unwrap();

        driver.set_visible(false);
        assert!(!driver.wants_ticks());
        now += Duration::from_secs(1);
        assert_eq!(driver.tick(now).unwrap().status, FrameStatus::Suspended);
        assert!(driver.compositor().layout().is_none());

        driver.set_visible(true);
        let r = driver.tick(now).unwrap();
        assert!(r.presented());
        assert_eq!(stats.surfaces_created(), 2);
        assert_eq!(entries(&log).iter().filter(|l| l.starts_with("draw")).count(), 2);
    }

    #[test]
    fn context_loss_recreates_the_surface_and_uploads_everything() {
        let log = Log::default();
        let (mut driver, stats) = driver_with(&log, DriverConfig::default(), Preferences::new(), 20, 10);
        let mut now = Instant::now();
        driver.tick(now).unwrap();

        driver.context_lost();
        now += Duration::from_secs(1);
        let r = driver.tick(now).unwrap();
        assert_eq!(r.outcome, Some(PresentOutcome::Presented { frame_id: 2, region: Rect::sized(20, 10) }));
        assert_eq!(stats.surfaces_created(), 2);
    }

    #[test]
    fn events_are_rotated_and_delivered_before_draw() {
        let log = Log::default();
        let mut prefs = Preferences::new();
        prefs.set("ignoreRotation", true);
        let (backend, _) = NullBackend::new_with_stats();
        let mut driver = FrameDriver::new(
            DriverConfig::default(),
            recorder(&log, false),
            Box::new(backend),
            prefs,
            Viewport::new(30, 20).with_rotation(Rotation::Deg90),
        );
        driver.setup().unwrap();
        let now = Instant::now();
        driver.tick(now).unwrap();
        assert_eq!(driver.display().window().size(), SurfaceSize::new(20, 30));

        let press = Event::ButtonPress { x: 5, y: 2, button: MouseButton::Left, modifiers: Modifiers::empty() };
        driver.queue_event(press);
        let expected = Point::new(2, 24);
        assert_eq!(driver.display().query_pointer(), expected);

        driver.tick(now + Duration::from_secs(1)).unwrap();
        let log = entries(&log);
        assert_eq!(&log[log.len() - 2..], [format!("event {:?}", Some(expected)), "draw 20x30".to_string()]);
    }

    #[test]
    fn switching_effects_sweeps_and_starts_fresh() {
        let log = Log::default();
        let (mut driver, _) = driver_with(&log, DriverConfig::default(), Preferences::new(), 10, 10);
        let first = driver.id();
        driver.tick(Instant::now()).unwrap();

        let other = Log::default();
        driver.switch_effect(recorder(&other, false), Preferences::new()).unwrap();
        assert_ne!(driver.id(), first);
        assert_eq!(driver.state(), &DriverState::Setup);
        assert!(entries(&log).contains(&"free".to_string()));

        let r = driver.tick(Instant::now()).unwrap();
        assert!(r.presented());
        assert_eq!(entries(&other), vec!["init 10x10", "draw 10x10"]);
    }

    #[test]
    fn red_diagonal_reaches_the_backend() {
        struct Diagonal;
        impl EffectState for Diagonal {
            fn draw(&mut self, ctx: &mut EffectContext<'_>) -> Option<Duration> {
                let Ok(gc) = ctx.display.create_gc(ctx.window, GcMask::empty(), &GcValues::default()) else {
                    return None;
                };
                ctx.display.set_foreground(gc, color::rgb(255, 0, 0));
                ctx.display.draw_line(ctx.window, gc, 0, 0, 199, 199);
                ctx.display.free_gc(gc);
                None
            }
        }
        let descriptor = Arc::new(EffectDescriptor::new("diagonal", |_| Ok(Box::new(Diagonal) as Box<dyn EffectState>)));
        let mut driver = FrameDriver::new(
            DriverConfig::default(),
            descriptor,
            Box::new(CpuBackend::new()),
            Preferences::new(),
            Viewport::new(200, 200),
        );
        driver.setup().unwrap();
        assert!(driver.tick(Instant::now()).unwrap().presented());

        let shot = driver.snapshot().unwrap();
        assert_eq!(shot.rgba_at(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(shot.rgba_at(150, 150), Some([255, 0, 0, 255]));
        assert_eq!(shot.rgba_at(150, 10), Some([0, 0, 0, 255]));
        assert_eq!(driver.display().misuse_count(), 0);
    }
}
