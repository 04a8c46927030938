use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender};

use crate::detection::domain::detector_kind::DetectorKind;
use crate::detection::domain::errors::ModelLoadError;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::cascade_detector::CascadeDetector;
use crate::pipeline::detection_guard::{detect_guarded, DetectionOutcome};
use crate::shared::constants::{HAAR_MODEL_PATH, LBP_MODEL_PATH};
use crate::shared::frame::Frame;

/// Model files loaded into the shared cascade detector on selection.
#[derive(Clone, Debug, PartialEq)]
pub struct CascadeModels {
    pub haar: PathBuf,
    pub lbp: PathBuf,
}

impl CascadeModels {
    fn path_for(&self, kind: DetectorKind) -> Option<&Path> {
        match kind {
            DetectorKind::Haar => Some(&self.haar),
            DetectorKind::Lbp => Some(&self.lbp),
            _ => None,
        }
    }
}

impl Default for CascadeModels {
    fn default() -> Self {
        Self {
            haar: PathBuf::from(HAAR_MODEL_PATH),
            lbp: PathBuf::from(LBP_MODEL_PATH),
        }
    }
}

/// Observable view of the selector, published after every transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionState {
    pub kind: DetectorKind,
    /// Whether acquisition may be started.
    pub start_enabled: bool,
}

impl SelectionState {
    fn of(kind: DetectorKind) -> Self {
        Self {
            kind,
            start_enabled: kind != DetectorKind::None,
        }
    }
}

/// Single source of truth for which detector runs.
///
/// The selection is one atomic value, so a tick reading it concurrently with
/// a transition sees either the old or the new detector, never both.
/// Transitions are serialized; a failed model load leaves the previous
/// selection in place.
pub struct DetectorSelector {
    selection: AtomicU8,
    transition: Mutex<()>,
    cascade: Mutex<CascadeDetector>,
    neural: Option<Mutex<Box<dyn FaceDetector>>>,
    models: CascadeModels,
    observers: Mutex<Vec<Sender<SelectionState>>>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DetectorSelector {
    /// `neural` is `None` when the neural model failed to initialize;
    /// selecting it then reports [`ModelLoadError::Unavailable`].
    pub fn new(
        cascade: CascadeDetector,
        neural: Option<Box<dyn FaceDetector>>,
        models: CascadeModels,
    ) -> Self {
        Self {
            selection: AtomicU8::new(DetectorKind::None.as_u8()),
            transition: Mutex::new(()),
            cascade: Mutex::new(cascade),
            neural: neural.map(Mutex::new),
            models,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn current(&self) -> DetectorKind {
        DetectorKind::from_u8(self.selection.load(Ordering::Acquire))
    }

    pub fn state(&self) -> SelectionState {
        SelectionState::of(self.current())
    }

    pub fn can_start(&self) -> bool {
        self.current() != DetectorKind::None
    }

    /// Checkbox view: true only for the one selected detector.
    pub fn is_selected(&self, kind: DetectorKind) -> bool {
        kind != DetectorKind::None && self.current() == kind
    }

    /// Makes `kind` the only active detector, loading its cascade model
    /// first when needed. Selecting [`DetectorKind::None`] clears.
    pub fn select(&self, kind: DetectorKind) -> Result<SelectionState, ModelLoadError> {
        let _transition = lock(&self.transition);
        self.select_locked(kind)
    }

    /// Unchecks `kind`. Returns to `None` if it was the active detector.
    pub fn deselect(&self, kind: DetectorKind) -> SelectionState {
        let _transition = lock(&self.transition);
        self.deselect_locked(kind)
    }

    /// Checkbox toggle: selects `kind` unless it is already active.
    pub fn toggle(&self, kind: DetectorKind) -> Result<SelectionState, ModelLoadError> {
        let _transition = lock(&self.transition);
        if self.is_selected(kind) {
            Ok(self.deselect_locked(kind))
        } else {
            self.select_locked(kind)
        }
    }

    /// Receives the current state immediately, then one value per transition.
    pub fn subscribe(&self) -> Receiver<SelectionState> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let _ = tx.send(self.state());
        lock(&self.observers).push(tx);
        rx
    }

    /// Runs the selected detector on `frame`. Failures are absorbed.
    pub fn detect(&self, frame: &Frame) -> DetectionOutcome {
        let kind = self.current();
        match kind {
            DetectorKind::None => DetectionOutcome::PassThrough,
            DetectorKind::Haar | DetectorKind::Lbp => {
                let mut cascade = lock(&self.cascade);
                // the loaded model always matches the committed cascade kind
                let loaded = match self.current() {
                    current @ (DetectorKind::Haar | DetectorKind::Lbp) => current,
                    _ => kind,
                };
                detect_guarded(&mut *cascade, frame, &loaded.to_string())
            }
            DetectorKind::Neural => match &self.neural {
                Some(neural) => {
                    let mut neural = lock(neural);
                    detect_guarded(&mut **neural, frame, &kind.to_string())
                }
                None => DetectionOutcome::PassThrough,
            },
        }
    }

    /// Caller holds the transition lock.
    fn select_locked(&self, kind: DetectorKind) -> Result<SelectionState, ModelLoadError> {
        if let Some(path) = self.models.path_for(kind) {
            // ticks block on the cascade until the new kind is committed
            let mut cascade = lock(&self.cascade);
            cascade.configure(path)?;
            return Ok(self.commit(kind));
        }
        if kind == DetectorKind::Neural && self.neural.is_none() {
            return Err(ModelLoadError::Unavailable(kind.to_string()));
        }
        Ok(self.commit(kind))
    }

    /// Caller holds the transition lock.
    fn deselect_locked(&self, kind: DetectorKind) -> SelectionState {
        if self.current() == kind && kind != DetectorKind::None {
            self.commit(DetectorKind::None)
        } else {
            self.state()
        }
    }

    /// Caller holds the transition lock.
    fn commit(&self, kind: DetectorKind) -> SelectionState {
        let previous = DetectorKind::from_u8(self.selection.swap(kind.as_u8(), Ordering::AcqRel));
        let state = SelectionState::of(kind);
        if previous != kind {
            log::info!("Detector selection: {previous} -> {kind}");
        }
        lock(&self.observers).retain(|tx| tx.send(state).is_ok());
        state
    }
}
