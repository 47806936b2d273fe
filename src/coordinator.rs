use crate::config::OverlayConfig;
use crate::error::{RenderError, SurfaceError};
use crate::frame_mode::Ingest;
use crate::input::{Dispatch, InputRouter};
use crate::overlay::Overlay;
use crate::recorder::RecordingSession;
use crate::render::{RenderContext, Renderer};
use crate::surface::Surface;
use crate::types::*;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use image::RgbImage;
use log::{debug, error, info, trace, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Idle sleep per iteration while Stopped; the queue is not polled then.
const STOPPED_IDLE: Duration = Duration::from_millis(15);

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub iterations: u64,
    pub deliveries: u64,
    pub presented: u64,
    pub render_failures: u64,
    pub recorded: u64,
}

/// The control loop. Owns the overlay, takes deliveries from the queue,
/// routes operator input, composes and presents, and feeds the recorder.
///
/// Runs on one thread; the surface does not need to be `Send`.
pub struct Coordinator<S: Surface> {
    rx: Receiver<Delivery>,
    shutdown: Arc<AtomicBool>,
    overlay: Overlay,
    router: InputRouter,
    renderer: Renderer,
    surface: S,
    clock: SessionClock,
    poll_timeout: Duration,
    record_dir: PathBuf,
    recording: Option<RecordingSession>,
    /// Exit once the producer is gone and the queue is empty. For unattended
    /// runs; interactive sessions keep serving the UI.
    exit_when_drained: bool,
    stats: LoopStats,
}

impl<S: Surface> Coordinator<S> {
    pub fn new(
        rx: Receiver<Delivery>,
        shutdown: Arc<AtomicBool>,
        config: &OverlayConfig,
        surface: S,
        clock: SessionClock,
    ) -> Self {
        Self {
            rx,
            shutdown,
            overlay: Overlay::new(config),
            router: InputRouter::new(config.key_cooldown()),
            renderer: Renderer::new(config),
            surface,
            clock,
            poll_timeout: config.poll_timeout(),
            record_dir: PathBuf::from("./recordings"),
            recording: None,
            exit_when_drained: false,
            stats: LoopStats::default(),
        }
    }

    pub fn with_record_dir(mut self, dir: PathBuf) -> Self {
        self.record_dir = dir;
        self
    }

    pub fn with_exit_when_drained(mut self, enabled: bool) -> Self {
        self.exit_when_drained = enabled;
        self
    }

    /// Start recording right away instead of waiting for the R key.
    pub fn with_recording(mut self, enabled: bool) -> Self {
        if enabled {
            self.start_recording();
        }
        self
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Run until shutdown, quit, a closed surface, or (optionally) a drained
    /// queue. Recording is finalized on every exit path. A surface backend
    /// failure ends the loop with that error.
    pub fn run(mut self) -> Result<LoopStats, SurfaceError> {
        info!(
            "Coordinator running (auto-freeze: {}, poll timeout: {:?})",
            if self.overlay.auto_freeze() { "ON" } else { "OFF" },
            self.poll_timeout
        );
        let result = self.run_loop();
        self.stop_recording();
        match &result {
            Ok(stats) => info!(
                "Coordinator shutting down: {} deliveries, {} composites, {} render failures",
                stats.deliveries, stats.presented, stats.render_failures
            ),
            Err(e) => error!("Coordinator stopped on surface failure: {}", e),
        }
        result
    }

    fn run_loop(&mut self) -> Result<LoopStats, SurfaceError> {
        let mut disconnected = false;
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            self.stats.iterations += 1;

            let fresh = if self.overlay.is_stopped() {
                thread::sleep(STOPPED_IDLE);
                None
            } else if disconnected {
                if self.exit_when_drained {
                    info!("Producer finished and queue drained");
                    break;
                }
                thread::sleep(self.poll_timeout);
                None
            } else {
                match self.rx.recv_timeout(self.poll_timeout) {
                    Ok(delivery) => Some(delivery),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => {
                        info!("Producer disconnected; no further frames");
                        disconnected = true;
                        None
                    }
                }
            };

            // Keep the pair for recording; frame buffers are shared, not copied.
            let recorded_source = match fresh {
                Some(delivery) => self.ingest(delivery),
                None => None,
            };

            if self.handle_input() {
                break;
            }

            if let Some(image) = self.compose() {
                self.surface.present(&image, &self.overlay.status(self.recording.is_some()))?;
                self.stats.presented += 1;
                if let Some(frame) = recorded_source {
                    self.record(&frame, &image);
                }
            }

            if !self.surface.is_open() {
                info!("Operator window closed");
                self.shutdown.store(true, Ordering::Relaxed);
            }
        }
        Ok(self.stats)
    }

    /// Feed a delivery to the overlay. Returns the source frame to record,
    /// if the delivery was taken in.
    fn ingest(&mut self, delivery: Delivery) -> Option<Frame> {
        self.stats.deliveries += 1;
        let frame = delivery.frame.clone();
        trace!("delivery {}", delivery);
        match self.overlay.ingest(delivery, self.clock.now_secs()) {
            Ingest::Froze => {
                debug!("No targets; holding current frame");
                Some(frame)
            }
            Ingest::Shown | Ingest::HeldFrozen => Some(frame),
            Ingest::Ignored => None,
        }
    }

    /// Drain one batch of input. Returns true when the loop should end.
    fn handle_input(&mut self) -> bool {
        let layout = self.renderer.layout_for(&self.overlay);
        let now = Instant::now();
        for event in self.surface.poll_events() {
            match self.router.dispatch(&mut self.overlay, event, layout.as_ref(), now) {
                Dispatch::Quit => {
                    info!("Quit requested");
                    self.shutdown.store(true, Ordering::Relaxed);
                    return true;
                }
                Dispatch::ToggleRecording => {
                    if self.recording.is_some() {
                        self.stop_recording();
                    } else {
                        self.start_recording();
                    }
                }
                Dispatch::Handled | Dispatch::Ignored => {}
            }
        }
        false
    }

    fn compose(&mut self) -> Option<RgbImage> {
        let ctx = RenderContext {
            recording_elapsed: self.recording.as_ref().map(|r| r.elapsed()),
            now: Instant::now(),
            session_secs: self.clock.now_secs(),
        };
        match self.renderer.compose(&self.overlay, &ctx) {
            Ok(image) => Some(image),
            Err(RenderError::NoFrame) => None,
            Err(e) => {
                self.stats.render_failures += 1;
                warn!("Render failed, frame skipped: {}", e);
                None
            }
        }
    }

    fn record(&mut self, source: &Frame, composite: &RgbImage) {
        let Some(session) = self.recording.as_mut() else {
            return;
        };
        match session.record(self.clock.now_us(), source, composite) {
            Ok(()) => self.stats.recorded += 1,
            Err(e) => {
                error!("Recording write failed, stopping recording: {}", e);
                self.stop_recording();
            }
        }
    }

    fn start_recording(&mut self) {
        match RecordingSession::start(&self.record_dir) {
            Ok(session) => {
                self.overlay
                    .show_notice(format!("Recording to {}", session.dir().display()), Instant::now());
                self.recording = Some(session);
            }
            Err(e) => {
                error!("Cannot start recording in {:?}: {}", self.record_dir, e);
                self.overlay.show_notice("Recording failed", Instant::now());
            }
        }
    }

    fn stop_recording(&mut self) {
        if let Some(session) = self.recording.take() {
            if let Err(e) = session.finish() {
                error!("Failed to finalize recording: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputEvent, KeyAction};
    use crate::overlay::OverlayStatus;
    use crossbeam_channel::bounded;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Surface that replays one event batch per poll and keeps what it saw.
    #[derive(Default)]
    struct Scripted {
        batches: VecDeque<Vec<InputEvent>>,
        statuses: Rc<RefCell<Vec<OverlayStatus>>>,
        fail_present: bool,
    }

    impl Surface for Scripted {
        fn present(&mut self, _image: &RgbImage, status: &OverlayStatus) -> Result<(), SurfaceError> {
            if self.fail_present {
                return Err(SurfaceError::Backend("gone".into()));
            }
            self.statuses.borrow_mut().push(*status);
            Ok(())
        }

        fn poll_events(&mut self) -> Vec<InputEvent> {
            self.batches.pop_front().unwrap_or_default()
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    fn config() -> OverlayConfig {
        OverlayConfig {
            poll_timeout_ms: 5,
            ..OverlayConfig::default()
        }
    }

    fn delivery(ids: &[u64]) -> Delivery {
        let results = ids
            .iter()
            .map(|&id| DetectionResult::new(id, BBox::new(10.0, 10.0, 30.0, 30.0)))
            .collect();
        Delivery::new(Frame::solid(64, 48, [0, 0, 0]).unwrap(), results)
    }

    #[test]
    fn test_drains_queue_then_exits() {
        let (tx, rx) = bounded(8);
        for _ in 0..3 {
            tx.send(delivery(&[1])).unwrap();
        }
        drop(tx);
        let shutdown = Arc::new(AtomicBool::new(false));
        let surface = Scripted::default();
        let seen = surface.statuses.clone();
        let coord = Coordinator::new(rx, shutdown, &config(), surface, SessionClock::new())
            .with_exit_when_drained(true);
        let stats = coord.run().unwrap();
        assert_eq!(stats.deliveries, 3);
        assert!(stats.presented >= 3);
        let seen = seen.borrow();
        assert_eq!(seen.last().map(|s| s.target_count), Some(1));
        assert!(!seen.last().unwrap().recording);
        assert_eq!(stats.render_failures, 0);
    }

    #[test]
    fn test_quit_key_sets_shutdown() {
        let (tx, rx) = bounded(8);
        tx.send(delivery(&[1])).unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let surface = Scripted {
            batches: VecDeque::from(vec![vec![InputEvent::Key(KeyAction::Quit)]]),
            ..Scripted::default()
        };
        let coord = Coordinator::new(rx, shutdown.clone(), &config(), surface, SessionClock::new());
        let stats = coord.run().unwrap();
        assert!(shutdown.load(Ordering::Relaxed));
        assert_eq!(stats.iterations, 1);
        drop(tx);
    }

    #[test]
    fn test_presets_shutdown_flag_exits_immediately() {
        let (_tx, rx) = bounded::<Delivery>(1);
        let shutdown = Arc::new(AtomicBool::new(true));
        let coord = Coordinator::new(rx, shutdown, &config(), Scripted::default(), SessionClock::new());
        assert_eq!(coord.run().unwrap(), LoopStats::default());
    }

    #[test]
    fn test_surface_failure_ends_loop() {
        let (tx, rx) = bounded(8);
        tx.send(delivery(&[1])).unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let surface = Scripted {
            fail_present: true,
            ..Scripted::default()
        };
        let coord = Coordinator::new(rx, shutdown, &config(), surface, SessionClock::new());
        assert!(matches!(coord.run(), Err(SurfaceError::Backend(_))));
    }
}
