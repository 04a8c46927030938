use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::annotation::infrastructure::frame_annotator::FrameAnnotator;
use crate::capture::domain::frame_source::{CaptureError, DeviceError, FrameSource};
use crate::pipeline::acquisition_stats::{AcquisitionStats, StatsSnapshot};
use crate::pipeline::detection_guard::DetectionOutcome;
use crate::pipeline::detector_selector::DetectorSelector;
use crate::pipeline::display_sink::DisplaySink;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::constants::TICK_PERIOD;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquisitionConfig {
    pub tick_period: Duration,
    /// Convert frames to grayscale before detection.
    pub grayscale: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            tick_period: TICK_PERIOD,
            grayscale: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("no detector selected")]
    NoDetectorSelected,

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("failed to spawn acquisition worker: {0}")]
    Worker(std::io::Error),
}

/// Everything the worker mutates during a session.
struct Parts {
    source: Box<dyn FrameSource>,
    display: Box<dyn DisplaySink>,
    logger: Box<dyn PipelineLogger>,
}

/// Read-only handles the worker shares with the controller.
#[derive(Clone)]
struct WorkerContext {
    parts: Arc<Mutex<Parts>>,
    selector: Arc<DetectorSelector>,
    annotator: Arc<FrameAnnotator>,
    grayscale: Arc<AtomicBool>,
    stats: Arc<AcquisitionStats>,
    tick_period: Duration,
}

struct Session {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Periodic capture, detect, annotate and display driver.
///
/// While active, one worker thread runs a tick every `tick_period`, the
/// first immediately. Ticks never overlap: a tick that overruns the period
/// delays the next one instead of queueing more. `stop` waits for the
/// in-flight tick to finish before the device is released.
pub struct AcquisitionLoop {
    ctx: WorkerContext,
    session: Option<Session>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AcquisitionLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        display: Box<dyn DisplaySink>,
        logger: Box<dyn PipelineLogger>,
        selector: Arc<DetectorSelector>,
        annotator: FrameAnnotator,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            ctx: WorkerContext {
                parts: Arc::new(Mutex::new(Parts {
                    source,
                    display,
                    logger,
                })),
                selector,
                annotator: Arc::new(annotator),
                grayscale: Arc::new(AtomicBool::new(config.grayscale)),
                stats: Arc::new(AcquisitionStats::default()),
                tick_period: config.tick_period,
            },
            session: None,
        }
    }

    pub fn selector(&self) -> &Arc<DetectorSelector> {
        &self.ctx.selector
    }

    pub fn is_active(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    pub fn set_grayscale(&self, enabled: bool) {
        self.ctx.grayscale.store(enabled, Ordering::Relaxed);
    }

    pub fn is_grayscale(&self) -> bool {
        self.ctx.grayscale.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// Opens the device and begins ticking. A no-op while already active.
    ///
    /// Fails without touching the device when no detector is selected.
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.is_active() {
            log::debug!("Acquisition already running");
            return Ok(());
        }
        // a worker that halted on its own is joined before reuse
        self.stop();

        if !self.ctx.selector.can_start() {
            return Err(StartError::NoDetectorSelected);
        }

        let description = {
            let mut parts = lock(&self.ctx.parts);
            parts.source.open()?;
            parts.logger.begin_session();
            parts.source.describe()
        };
        self.ctx.stats.reset();

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let ctx = self.ctx.clone();
        let spawned = std::thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || run_worker(ctx, stop_rx, done_tx));

        match spawned {
            Ok(handle) => {
                log::info!(
                    "Acquisition started on {description} ({} detector, {}ms period)",
                    self.ctx.selector.current(),
                    self.ctx.tick_period.as_millis()
                );
                self.session = Some(Session {
                    stop_tx,
                    done_rx,
                    handle,
                });
                Ok(())
            }
            Err(e) => {
                lock(&self.ctx.parts).source.close();
                Err(StartError::Worker(e))
            }
        }
    }

    /// Halts ticking and releases the device. A no-op while inactive.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        drop(session.stop_tx);
        if let Err(RecvTimeoutError::Timeout) = session.done_rx.recv_timeout(self.ctx.tick_period)
        {
            log::warn!("Tick still in flight; waiting before releasing the device");
        }
        if session.handle.join().is_err() {
            log::error!("Acquisition worker panicked");
        }
        lock(&self.ctx.parts).source.close();
        log::info!("Acquisition stopped: {}", self.ctx.stats.snapshot());
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(ctx: WorkerContext, stop_rx: Receiver<()>, done_tx: Sender<()>) {
    {
        let mut parts = lock(&ctx.parts);
        let mut deadline = Instant::now();
        loop {
            if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }
            if tick(&mut parts, &ctx).is_break() {
                break;
            }
            deadline += ctx.tick_period;
            let now = Instant::now();
            if deadline < now {
                log::trace!("Tick overran the period");
                deadline = now;
            }
            if !matches!(stop_rx.recv_deadline(deadline), Err(RecvTimeoutError::Timeout)) {
                break;
            }
        }
        parts.source.close();
        parts.logger.summary();
    }
    let _ = done_tx.send(());
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

fn tick(parts: &mut Parts, ctx: &WorkerContext) -> ControlFlow<()> {
    ctx.stats.record_tick();

    let started = Instant::now();
    let frame = match parts.source.read_frame() {
        Ok(frame) => frame,
        Err(CaptureError::EmptyFrame) => {
            log::debug!("Empty frame from {}; skipping tick", parts.source.describe());
            ctx.stats.record_empty_frame();
            return ControlFlow::Continue(());
        }
        Err(CaptureError::NotOpen) => {
            log::error!("Tick ran against a closed source; halting acquisition");
            return ControlFlow::Break(());
        }
        Err(e) => {
            log::warn!("{e}");
            ctx.stats.record_capture_error();
            return ControlFlow::Continue(());
        }
    };
    let frame = if ctx.grayscale.load(Ordering::Relaxed) {
        frame.to_grayscale()
    } else {
        frame
    };
    parts.logger.timing("capture", elapsed_ms(started));

    let detect_start = Instant::now();
    let outcome = ctx.selector.detect(&frame);
    let output = match outcome {
        DetectionOutcome::PassThrough => frame,
        DetectionOutcome::Failed => {
            ctx.stats.record_detection_failure();
            frame
        }
        DetectionOutcome::Detected(detections) => {
            parts.logger.timing("detect", elapsed_ms(detect_start));
            parts.logger.metric("faces", detections.len() as f64);
            let annotate_start = Instant::now();
            let annotated = ctx.annotator.annotate(frame, &detections);
            parts.logger.timing("annotate", elapsed_ms(annotate_start));
            annotated
        }
    };

    let index = output.index();
    parts.display.present(output);
    ctx.stats.record_delivered();
    parts.logger.frame_delivered(index);
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::annotation::domain::overlay::AnnotationStyle;
    use crate::capture::infrastructure::synthetic_source::SyntheticSource;
    use crate::detection::domain::cascade_model::UnsupportedCascadeLoader;
    use crate::detection::domain::detection::{BoundingBox, Detection};
    use crate::detection::domain::detector_kind::DetectorKind;
    use crate::detection::domain::errors::DetectionError;
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::detection::infrastructure::cascade_detector::{CascadeDetector, CascadeParams};
    use crate::pipeline::detector_selector::CascadeModels;
    use crate::pipeline::display_sink::FnDisplay;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::frame::Frame;

    const WAIT: Duration = Duration::from_secs(5);

    // --- Stubs ---

    #[derive(Clone, Default)]
    struct Lifecycle {
        opens: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        open: Arc<AtomicBool>,
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    /// Wraps a synthetic source, recording lifecycle calls.
    struct TrackedSource {
        inner: SyntheticSource,
        life: Lifecycle,
        failing_opens: usize,
        read_delay: Duration,
        forget_open: bool,
    }

    impl TrackedSource {
        fn new(life: &Lifecycle) -> Self {
            Self {
                inner: SyntheticSource::new(16, 16),
                life: life.clone(),
                failing_opens: 0,
                read_delay: Duration::ZERO,
                forget_open: false,
            }
        }
    }

    impl FrameSource for TrackedSource {
        fn open(&mut self) -> Result<(), DeviceError> {
            if self.failing_opens > 0 {
                self.failing_opens -= 1;
                return Err(DeviceError::Backend("device busy".into()));
            }
            self.life.opens.fetch_add(1, Ordering::SeqCst);
            self.life.open.store(true, Ordering::SeqCst);
            self.inner.open()
        }

        fn read_frame(&mut self) -> Result<Frame, CaptureError> {
            if self.forget_open {
                return Err(CaptureError::NotOpen);
            }
            self.life.events.lock().unwrap().push("read_start");
            std::thread::sleep(self.read_delay);
            let frame = self.inner.read_frame();
            self.life.events.lock().unwrap().push("read_end");
            frame
        }

        fn close(&mut self) {
            if self.life.open.swap(false, Ordering::SeqCst) {
                self.life.closes.fetch_add(1, Ordering::SeqCst);
                self.life.events.lock().unwrap().push("close");
            }
            self.inner.close();
        }

        fn is_open(&self) -> bool {
            self.inner.is_open()
        }
    }

    struct FixedDetector(Vec<Detection>);

    impl FaceDetector for FixedDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
            Err(DetectionError::Inference("boom".into()))
        }
    }

    /// Counts deliveries per session and records the count at each summary.
    #[derive(Clone, Default)]
    struct SessionLogger {
        delivered: usize,
        summaries: Arc<Mutex<Vec<usize>>>,
    }

    impl PipelineLogger for SessionLogger {
        fn begin_session(&mut self) {
            self.delivered = 0;
        }

        fn frame_delivered(&mut self, _index: usize) {
            self.delivered += 1;
        }

        fn timing(&mut self, _stage: &str, _duration_ms: f64) {}

        fn metric(&mut self, _name: &str, _value: f64) {}

        fn summary(&self) {
            self.summaries.lock().unwrap().push(self.delivered);
        }
    }

    // --- Helpers ---

    fn selector(neural: Box<dyn FaceDetector>, kind: DetectorKind) -> Arc<DetectorSelector> {
        let selector = DetectorSelector::new(
            CascadeDetector::new(Box::new(UnsupportedCascadeLoader), CascadeParams::default()),
            Some(neural),
            CascadeModels::default(),
        );
        selector.select(kind).unwrap();
        Arc::new(selector)
    }

    fn build(
        source: Box<dyn FrameSource>,
        selector: Arc<DetectorSelector>,
    ) -> (AcquisitionLoop, Receiver<Frame>) {
        build_with_logger(source, selector, Box::new(NullPipelineLogger))
    }

    fn build_with_logger(
        source: Box<dyn FrameSource>,
        selector: Arc<DetectorSelector>,
        logger: Box<dyn PipelineLogger>,
    ) -> (AcquisitionLoop, Receiver<Frame>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let display = FnDisplay(move |frame: Frame| {
            let _ = tx.send(frame);
        });
        let config = AcquisitionConfig {
            tick_period: Duration::from_millis(5),
            grayscale: false,
        };
        let acquisition = AcquisitionLoop::new(
            source,
            Box::new(display),
            logger,
            selector,
            FrameAnnotator::new(AnnotationStyle::default()),
            config,
        );
        (acquisition, rx)
    }

    fn neural_selected() -> Arc<DetectorSelector> {
        selector(Box::new(FixedDetector(Vec::new())), DetectorKind::Neural)
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    // --- Tests ---

    #[test]
    fn test_default_config_uses_tick_period() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.tick_period, Duration::from_millis(33));
        assert!(!config.grayscale);
    }

    #[test]
    fn test_start_delivers_frames_and_stop_closes_source() {
        let life = Lifecycle::default();
        let (mut acquisition, rx) = build(Box::new(TrackedSource::new(&life)), neural_selected());

        acquisition.start().unwrap();
        assert!(acquisition.is_active());
        for _ in 0..3 {
            rx.recv_timeout(WAIT).unwrap();
        }
        acquisition.stop();

        assert!(!acquisition.is_active());
        assert!(!life.open.load(Ordering::SeqCst));
        assert_eq!(life.closes.load(Ordering::SeqCst), 1);
        assert!(acquisition.stats().delivered >= 3);
    }

    #[test]
    fn test_double_start_opens_once() {
        let life = Lifecycle::default();
        let (mut acquisition, _rx) = build(Box::new(TrackedSource::new(&life)), neural_selected());

        acquisition.start().unwrap();
        acquisition.start().unwrap();
        acquisition.stop();

        assert_eq!(life.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_while_inactive_is_noop() {
        let life = Lifecycle::default();
        let (mut acquisition, _rx) = build(Box::new(TrackedSource::new(&life)), neural_selected());

        acquisition.stop();
        acquisition.stop();

        assert!(!acquisition.is_active());
        assert_eq!(life.closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_start_without_detector_leaves_device_closed() {
        let life = Lifecycle::default();
        let selector = Arc::new(DetectorSelector::new(
            CascadeDetector::new(Box::new(UnsupportedCascadeLoader), CascadeParams::default()),
            None,
            CascadeModels::default(),
        ));
        let (mut acquisition, _rx) = build(Box::new(TrackedSource::new(&life)), selector);

        let err = acquisition.start().unwrap_err();
        assert!(matches!(err, StartError::NoDetectorSelected));
        assert!(!acquisition.is_active());
        assert_eq!(life.opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_open_failure_is_reported_and_retryable() {
        let life = Lifecycle::default();
        let mut source = TrackedSource::new(&life);
        source.failing_opens = 1;
        let (mut acquisition, rx) = build(Box::new(source), neural_selected());

        let err = acquisition.start().unwrap_err();
        assert!(matches!(err, StartError::Device(_)));
        assert!(!acquisition.is_active());

        acquisition.start().unwrap();
        rx.recv_timeout(WAIT).unwrap();
        acquisition.stop();
    }

    #[test]
    fn test_empty_frames_never_reach_display() {
        let (mut acquisition, rx) = build(
            Box::new(SyntheticSource::new(8, 8).with_empty_every(1)),
            neural_selected(),
        );

        acquisition.start().unwrap();
        assert!(wait_until(|| acquisition.stats().empty_frames >= 3));
        acquisition.stop();

        assert!(rx.try_recv().is_err());
        assert_eq!(acquisition.stats().delivered, 0);
    }

    #[test]
    fn test_closed_source_halts_worker() {
        let life = Lifecycle::default();
        let mut source = TrackedSource::new(&life);
        source.forget_open = true;
        let (mut acquisition, rx) = build(Box::new(source), neural_selected());

        acquisition.start().unwrap();
        assert!(wait_until(|| !acquisition.is_active()));
        assert!(rx.try_recv().is_err());
        assert!(!life.open.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stop_waits_for_in_flight_read() {
        let life = Lifecycle::default();
        let mut source = TrackedSource::new(&life);
        source.read_delay = Duration::from_millis(40);
        let (mut acquisition, _rx) = build(Box::new(source), neural_selected());

        acquisition.start().unwrap();
        assert!(wait_until(|| life.events.lock().unwrap().contains(&"read_start")));
        acquisition.stop();

        let events = life.events.lock().unwrap();
        let close_at = events.iter().position(|e| *e == "close").unwrap();
        let before = &events[..close_at];
        let starts = before.iter().filter(|e| **e == "read_start").count();
        let ends = before.iter().filter(|e| **e == "read_end").count();
        assert_eq!(starts, ends);
        assert_eq!(events.len(), close_at + 1);
    }

    #[test]
    fn test_detection_failure_still_delivers_raw_frame() {
        let (mut acquisition, rx) = build(
            Box::new(SyntheticSource::new(8, 8)),
            selector(Box::new(FailingDetector), DetectorKind::Neural),
        );

        acquisition.start().unwrap();
        let frame = rx.recv_timeout(WAIT).unwrap();
        acquisition.stop();

        assert!(frame.data().iter().all(|&v| v == 0));
        assert!(acquisition.stats().detection_failures >= 1);
    }

    #[test]
    fn test_detections_are_annotated_before_display() {
        let detection = Detection::neural(BoundingBox::new(2.0, 2.0, 10.0, 10.0), Vec::new(), 0.95);
        let (mut acquisition, rx) = build(
            Box::new(SyntheticSource::new(16, 16)),
            selector(Box::new(FixedDetector(vec![detection])), DetectorKind::Neural),
        );

        acquisition.start().unwrap();
        let frame = rx.recv_timeout(WAIT).unwrap();
        acquisition.stop();

        let image = frame.into_rgb_image();
        assert_eq!(image.get_pixel(2, 2).0, [0, 255, 0]);
        assert_eq!(image.get_pixel(8, 8).0, [0, 0, 0]);
    }

    #[test]
    fn test_grayscale_toggle_applies_to_next_frames() {
        let (mut acquisition, rx) = build(Box::new(SyntheticSource::new(8, 8)), neural_selected());

        acquisition.set_grayscale(true);
        assert!(acquisition.is_grayscale());
        acquisition.start().unwrap();
        let frame = rx.recv_timeout(WAIT).unwrap();
        acquisition.stop();

        assert!(frame.is_grayscale());
    }

    #[test]
    fn test_restart_after_stop_reopens() {
        let life = Lifecycle::default();
        let (mut acquisition, rx) = build(Box::new(TrackedSource::new(&life)), neural_selected());

        acquisition.start().unwrap();
        rx.recv_timeout(WAIT).unwrap();
        acquisition.stop();
        acquisition.start().unwrap();
        rx.recv_timeout(WAIT).unwrap();
        acquisition.stop();

        assert_eq!(life.opens.load(Ordering::SeqCst), 2);
        assert_eq!(life.closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_each_session_summary_covers_only_that_session() {
        let logger = SessionLogger::default();
        let summaries = logger.summaries.clone();
        let (mut acquisition, rx) = build_with_logger(
            Box::new(SyntheticSource::new(8, 8)),
            neural_selected(),
            Box::new(logger),
        );

        acquisition.start().unwrap();
        for _ in 0..3 {
            rx.recv_timeout(WAIT).unwrap();
        }
        acquisition.stop();
        let first = acquisition.stats().delivered;

        acquisition.start().unwrap();
        rx.recv_timeout(WAIT).unwrap();
        acquisition.stop();
        let second = acquisition.stats().delivered;

        assert_eq!(*summaries.lock().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_drop_stops_worker() {
        let life = Lifecycle::default();
        let (mut acquisition, _rx) = build(Box::new(TrackedSource::new(&life)), neural_selected());
        acquisition.start().unwrap();
        drop(acquisition);
        assert!(!life.open.load(Ordering::SeqCst));
    }
}
