//! Drives a [`FrameDriver`] from a tokio task.
//!
//! The task owns the driver. Hosts talk to it through a [`DriverHandle`]:
//! commands go over an mpsc channel and are applied between frames, and the
//! frame timer sleeps until the driver's next frame is due.

use crate::driver::FrameDriver;
use crate::effect::EffectDescriptor;
use crate::errors::BridgeError;
use crate::event::Event;
use crate::options::Preferences;
use crate::render::Viewport;
use log::{debug, trace, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const COMMAND_QUEUE: usize = 64;

#[derive(Debug)]
pub enum DriverCommand {
    Resize { viewport: Viewport, scale: f32 },
    Event(Event),
    SetVisible(bool),
    ContextLost,
    SwitchEffect { descriptor: Arc<EffectDescriptor>, prefs: Preferences },
    Stop,
}

/// Sends commands to a running driver task.
#[derive(Clone)]
pub struct DriverHandle {
    tx: mpsc::Sender<DriverCommand>,
    cancel: CancellationToken,
}

impl DriverHandle {
    pub async fn send(&self, cmd: DriverCommand) -> Result<(), BridgeError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| BridgeError::InvalidState("driver task has stopped".into()))
    }

    pub async fn resize(&self, viewport: Viewport, scale: f32) -> Result<(), BridgeError> {
        self.send(DriverCommand::Resize { viewport, scale }).await
    }

    pub async fn queue_event(&self, event: Event) -> Result<(), BridgeError> {
        self.send(DriverCommand::Event(event)).await
    }

    pub async fn set_visible(&self, visible: bool) -> Result<(), BridgeError> {
        self.send(DriverCommand::SetVisible(visible)).await
    }

    pub async fn context_lost(&self) -> Result<(), BridgeError> {
        self.send(DriverCommand::ContextLost).await
    }

    pub async fn switch_effect(&self, descriptor: Arc<EffectDescriptor>, prefs: Preferences) -> Result<(), BridgeError> {
        self.send(DriverCommand::SwitchEffect { descriptor, prefs }).await
    }

    /// Asks the task to tear down after the commands already queued.
    pub async fn stop(&self) {
        let _ = self.send(DriverCommand::Stop).await;
    }

    /// Stops the task at the next opportunity, dropping queued commands.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Spawns the driver onto the current runtime. The task hands the torn-down
/// driver back when it ends.
pub fn spawn(driver: FrameDriver) -> (DriverHandle, JoinHandle<FrameDriver>) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let cancel = CancellationToken::new();
    let handle = DriverHandle { tx, cancel: cancel.clone() };
    let task = tokio::spawn(run(driver, rx, cancel));
    (handle, task)
}

/// Runs the driver until stopped, cancelled or every handle is dropped.
pub async fn run(
    mut driver: FrameDriver,
    mut rx: mpsc::Receiver<DriverCommand>,
    cancel: CancellationToken,
) -> FrameDriver {
    debug!("runner started for {} ({})", driver.effect_name(), driver.id());
    if let Err(e) = driver.setup() {
        debug!("runner: {e}");
    }

    let mut retry_at = None;
    loop {
        let due = next_due(driver.next_frame_at(), retry_at);

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("runner for {} cancelled", driver.effect_name());
                break;
            }

            msg = rx.recv() => {
                let Some(cmd) = msg else {
                    // Every handle is gone.
                    break;
                };
                if matches!(cmd, DriverCommand::Stop) {
                    break;
                }
                apply(&mut driver, cmd);
            }

            _ = tokio::time::sleep_until(due), if driver.wants_ticks() => {
                match driver.tick(Instant::now()) {
                    Ok(result) => {
                        retry_at = None;
                        trace!("tick: {:?}", result.status);
                    }
                    Err(e) if !e.is_recoverable() => {
                        warn!("stopping {}: {e}", driver.effect_name());
                        break;
                    }
                    Err(e) => {
                        warn!("{}: {e}, retrying in {:?}", driver.effect_name(), driver.frame_interval());
                        retry_at = Some(tokio::time::Instant::now() + driver.frame_interval());
                    }
                }
            }
        }
    }

    driver.teardown();
    debug!("runner for {} exiting", driver.effect_name());
    driver
}

/// When the frame timer fires next. A failed tick holds the timer back until
/// `retry_at` so the loop does not spin on a frame that keeps failing.
fn next_due(frame_at: Option<Instant>, retry_at: Option<tokio::time::Instant>) -> tokio::time::Instant {
    let due = frame_at.map(tokio::time::Instant::from_std).unwrap_or_else(tokio::time::Instant::now);
    retry_at.map_or(due, |r| due.max(r))
}

fn apply(driver: &mut FrameDriver, cmd: DriverCommand) {
    match cmd {
        DriverCommand::Resize { viewport, scale } => driver.resize(viewport, scale),
        DriverCommand::Event(event) => driver.queue_event(event),
        DriverCommand::SetVisible(visible) => driver.set_visible(visible),
        DriverCommand::ContextLost => driver.context_lost(),
        DriverCommand::SwitchEffect { descriptor, prefs } => {
            if let Err(e) = driver.switch_effect(descriptor, prefs) {
                warn!("switching effect failed: {e}");
            }
        }
        DriverCommand::Stop => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverConfig;
    use crate::driver::DriverState;
    use crate::effect::{EffectContext, EffectState};
    use crate::render::backend::SurfaceSize;
    use crate::render::backends::null::NullBackend;
    use std::time::Duration;

    struct Counter;

    impl EffectState for Counter {
        fn draw(&mut self, ctx: &mut EffectContext<'_>) -> Option<Duration> {
            let _ = ctx.display.create_pixmap(ctx.window, 2, 2, 1);
            None
        }
    }

    fn driver() -> FrameDriver {
        let descriptor = Arc::new(EffectDescriptor::new("counter", |_| Ok(Box::new(Counter) as Box<dyn EffectState>)));
        let config = DriverConfig::builder().frame_interval(Duration::from_millis(2)).build().unwrap();
        FrameDriver::new(config, descriptor, Box::new(NullBackend::new().unwrap()), Preferences::new(), Viewport::new(16, 16))
    }

    #[tokio::test]
    async fn runs_frames_until_stopped() {
        let (handle, task) = spawn(driver());
        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.resize(Viewport::new(24, 12), 1.0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop().await;

        let driver = task.await.unwrap();
        assert!(driver.frames_drawn() > 2, "drew {} frames", driver.frames_drawn());
        assert_eq!(driver.state(), &DriverState::TornDown);
        assert_eq!(driver.display().resource_counts().pixmaps, 0);
        assert_eq!(driver.display().window().size(), SurfaceSize::new(24, 12));
        assert!(handle.resize(Viewport::new(1, 1), 1.0).await.is_err());
    }

    #[test]
    fn failed_ticks_back_off_until_the_retry_time() {
        let now = Instant::now();
        let retry = tokio::time::Instant::from_std(now + Duration::from_millis(16));

        // An overdue frame still waits for the retry time.
        assert_eq!(next_due(Some(now - Duration::from_millis(5)), Some(retry)), retry);
        assert_eq!(next_due(None, Some(retry)), retry);

        // A frame due after the retry time keeps its own schedule.
        let later = now + Duration::from_millis(40);
        assert_eq!(next_due(Some(later), Some(retry)), tokio::time::Instant::from_std(later));
        assert_eq!(next_due(Some(now), None), tokio::time::Instant::from_std(now));
    }

    #[tokio::test]
    async fn hidden_driver_does_not_draw() {
        let (handle, task) = spawn(driver());
        handle.set_visible(false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();
        assert!(handle.is_cancelled());

        let driver = task.await.unwrap();
        assert!(driver.frames_drawn() <= 1);
        assert_eq!(driver.state(), &DriverState::TornDown);
    }
}
