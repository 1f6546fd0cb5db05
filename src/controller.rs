//! The editing session: one [`Signal`], the [`PeakSet`] being built against it, and the
//! state machine that turns gestures into edits, estimates, and fits.
//!
//! Every action runs to completion before returning. Gestures that make no sense in
//! the current [`EditState`] are reported as [`Outcome::Ignored`] and change nothing,
//! while edits that are rejected return a [`SessionError`] and also change nothing.
use log::{debug, warn};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::estimator::{EstimateReport, Estimator};
use crate::export::{ExportError, ExportSink, ExportView};
use crate::fitter::{FitDiagnostics, FitError, MixtureFitter};
use crate::history::{History, DEFAULT_HISTORY_DEPTH};
use crate::peak::PeakId;
use crate::peak_set::{PeakSet, PeakSetError};
use crate::signal::{Signal, SignalError};

/// What a drag changes, latched when the pointer is pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DragMode {
    /// Drag the handle in both axes, changing center and amplitude
    Move,
    /// Change the width by the horizontal distance from the press
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EditState {
    /// No peak is selected
    #[default]
    Idle,
    /// A peak's handle is the active target
    Selected(PeakId),
    /// A handle is being dragged
    Dragging {
        id: PeakId,
        mode: DragMode,
        /// The x coordinate the pointer was pressed at
        press_x: f64,
    },
}

impl EditState {
    /// The peak the state refers to, if any
    pub fn target(&self) -> Option<PeakId> {
        match self {
            Self::Idle => None,
            Self::Selected(id) | Self::Dragging { id, .. } => Some(*id),
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging { .. })
    }
}

/// How an add gesture creates a peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AddMode {
    /// Place a peak with its apex at the gesture and the default width
    #[default]
    Seeded,
    /// Place a pending peak at the gesture's x coordinate, to be estimated later
    Pending,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControllerConfig {
    pub add_mode: AddMode,
    /// The number of states kept for undo
    pub history_depth: usize,
    /// The number of points the display curve is sampled on
    pub display_samples: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            add_mode: AddMode::Seeded,
            history_depth: DEFAULT_HISTORY_DEPTH,
            display_samples: 1000,
        }
    }
}

impl ControllerConfig {
    pub fn add_mode(mut self, add_mode: AddMode) -> Self {
        self.add_mode = add_mode;
        self
    }

    pub fn history_depth(mut self, history_depth: usize) -> Self {
        self.history_depth = history_depth;
        self
    }

    pub fn display_samples(mut self, display_samples: usize) -> Self {
        self.display_samples = display_samples;
        self
    }
}

/// A user action, already translated into data coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Add { x: f64, y: f64 },
    Select(PeakId),
    Deselect,
    /// Pointer down on a handle, resizing if the resize modifier is held
    Press {
        id: PeakId,
        x: f64,
        y: f64,
        resize: bool,
    },
    DragTo { x: f64, y: f64 },
    Release,
    Delete,
    Estimate,
    Fit,
    Undo,
    Redo,
    Reset,
    ToggleWidthLock,
}

/// What handling a gesture did
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Added(PeakId),
    Selected(PeakId),
    Deselected,
    DragStarted { id: PeakId, mode: DragMode },
    Dragged(PeakId),
    /// The drag ended, `changed` is whether it changed any peak
    Released { id: PeakId, changed: bool },
    Deleted(PeakId),
    Estimated(EstimateReport),
    Fitted(FitDiagnostics),
    /// An earlier state was restored by undo or redo
    Restored,
    Reset,
    /// The width lock changed, to the locked width or to unlocked
    WidthLock(Option<f64>),
    /// The gesture does not apply in the current state and nothing changed
    Ignored,
}

/// The kinds of failure a caller needs to tell apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidSignal,
    UnknownPeak,
    InvalidWidth,
    /// A center or amplitude was not finite
    InvalidParameter,
    NothingToFit,
    UnseededPeak,
    FitDiverged,
    Export,
}

/// Every failure a session can surface
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    PeakSet(#[from] PeakSetError),
    #[error(transparent)]
    Fit(#[from] FitError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Signal(_) => ErrorKind::InvalidSignal,
            Self::PeakSet(err) => match err {
                PeakSetError::UnknownPeak(_) => ErrorKind::UnknownPeak,
                PeakSetError::InvalidWidth { .. } => ErrorKind::InvalidWidth,
                PeakSetError::PendingPeak(_) => ErrorKind::UnseededPeak,
                PeakSetError::NonFinite { .. } => ErrorKind::InvalidParameter,
            },
            Self::Fit(err) => match err {
                FitError::NothingToFit => ErrorKind::NothingToFit,
                FitError::UnseededPeak(_) => ErrorKind::UnseededPeak,
                FitError::FitDiverged { .. } => ErrorKind::FitDiverged,
            },
            Self::Export(_) => ErrorKind::Export,
        }
    }
}

/// Owns one editing session and applies gestures to it
#[derive(Debug, Clone)]
pub struct InteractionController {
    name: String,
    signal: Signal,
    peaks: PeakSet,
    state: EditState,
    estimator: Estimator,
    fitter: MixtureFitter,
    config: ControllerConfig,
    history: History,
    width_lock: Option<f64>,
    last_fit: Option<FitDiagnostics>,
}

impl InteractionController {
    pub fn new(name: impl Into<String>, signal: Signal) -> Self {
        Self::with_config(name, signal, ControllerConfig::default())
    }

    pub fn with_config(name: impl Into<String>, signal: Signal, config: ControllerConfig) -> Self {
        let peaks = PeakSet::new();
        let history = History::new(config.history_depth, peaks.snapshot());
        Self {
            name: name.into(),
            signal,
            peaks,
            state: EditState::Idle,
            estimator: Estimator::default(),
            fitter: MixtureFitter::default(),
            config,
            history,
            width_lock: None,
            last_fit: None,
        }
    }

    /// Validate `x` and `y` as a [`Signal`] and open a session on it
    pub fn from_arrays(
        name: impl Into<String>,
        x: Vec<f64>,
        y: Vec<f64>,
    ) -> Result<Self, SessionError> {
        let signal = Signal::new(x, y)?;
        Ok(Self::new(name, signal))
    }

    pub fn estimator(mut self, estimator: Estimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn fitter(mut self, fitter: MixtureFitter) -> Self {
        self.fitter = fitter;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn peaks(&self) -> &PeakSet {
        &self.peaks
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn selected(&self) -> Option<PeakId> {
        self.state.target()
    }

    pub fn width_lock(&self) -> Option<f64> {
        self.width_lock
    }

    /// The diagnostics of the most recent successful fit
    pub fn last_fit(&self) -> Option<&FitDiagnostics> {
        self.last_fit.as_ref()
    }

    /// The constant offset found by the most recent fit, if it fit one
    pub fn baseline(&self) -> Option<f64> {
        self.last_fit.as_ref().and_then(|d| d.baseline)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// The composite curve sampled across the signal's x-range, raised by any fitted
    /// baseline, for redrawing
    pub fn display_curve(&self) -> (Vec<f64>, Vec<f64>) {
        let grid = self.signal.grid(self.config.display_samples);
        let offset = self.baseline().unwrap_or_default();
        let composite = self
            .peaks
            .composite_over(&grid)
            .into_iter()
            .map(|v| v + offset)
            .collect();
        (grid, composite)
    }

    pub fn export_view(&self) -> ExportView {
        ExportView::new(
            self.name.clone(),
            &self.signal,
            &self.peaks,
            self.config.display_samples,
        )
        .with_baseline(self.baseline())
    }

    /// The tab-delimited peak table
    pub fn peak_table(&self) -> String {
        self.export_view().table()
    }

    pub fn export<S: ExportSink + ?Sized>(&self, sink: &mut S) -> Result<(), SessionError> {
        sink.export(&self.export_view())?;
        Ok(())
    }

    fn transition(&mut self, next: EditState) {
        if self.state != next {
            debug!("{:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn ignore(&self, gesture: &str) -> Result<Outcome, SessionError> {
        debug!("Ignoring {gesture} in state {:?}", self.state);
        Ok(Outcome::Ignored)
    }

    fn record(&mut self) -> bool {
        self.history.record(self.peaks.snapshot())
    }

    /// Drop the selection if the selected peak no longer exists
    fn revalidate_selection(&mut self) {
        if let Some(id) = self.state.target() {
            if !self.peaks.contains(id) {
                self.transition(EditState::Idle);
            }
        }
    }

    /// Apply `gesture`
    pub fn handle(&mut self, gesture: Gesture) -> Result<Outcome, SessionError> {
        match gesture {
            Gesture::Add { x, y } => self.add_at(x, y),
            Gesture::Select(id) => self.select(id),
            Gesture::Deselect => self.deselect(),
            Gesture::Press { id, x, y, resize } => self.press(id, x, y, resize),
            Gesture::DragTo { x, y } => self.drag_to(x, y),
            Gesture::Release => self.release(),
            Gesture::Delete => self.delete(),
            Gesture::Estimate => self.estimate(),
            Gesture::Fit => self.fit(),
            Gesture::Undo => self.undo(),
            Gesture::Redo => self.redo(),
            Gesture::Reset => self.reset(),
            Gesture::ToggleWidthLock => self.toggle_width_lock(),
        }
    }

    /// Add a peak at `(x, y)` and select it
    pub fn add_at(&mut self, x: f64, y: f64) -> Result<Outcome, SessionError> {
        if self.state.is_dragging() {
            return self.ignore("add");
        }
        let id = match self.config.add_mode {
            AddMode::Seeded => {
                let width = self
                    .width_lock
                    .unwrap_or_else(|| self.estimator.default_width_for(&self.signal));
                self.peaks.add_seeded(x, y, width)?
            }
            AddMode::Pending => self.peaks.add_pending(x)?,
        };
        self.transition(EditState::Selected(id));
        self.record();
        Ok(Outcome::Added(id))
    }

    pub fn select(&mut self, id: PeakId) -> Result<Outcome, SessionError> {
        if self.state.is_dragging() {
            return self.ignore("select");
        }
        if !self.peaks.contains(id) {
            return Err(PeakSetError::UnknownPeak(id).into());
        }
        self.transition(EditState::Selected(id));
        Ok(Outcome::Selected(id))
    }

    pub fn deselect(&mut self) -> Result<Outcome, SessionError> {
        match self.state {
            EditState::Selected(_) => {
                self.transition(EditState::Idle);
                Ok(Outcome::Deselected)
            }
            _ => self.ignore("deselect"),
        }
    }

    /// Start dragging the handle of `id`. The drag mode is fixed by `resize` for the
    /// whole drag.
    pub fn press(&mut self, id: PeakId, x: f64, _y: f64, resize: bool) -> Result<Outcome, SessionError> {
        if self.state.is_dragging() {
            return self.ignore("press");
        }
        if !self.peaks.contains(id) {
            return Err(PeakSetError::UnknownPeak(id).into());
        }
        let mode = if resize {
            DragMode::Resize
        } else {
            DragMode::Move
        };
        self.transition(EditState::Dragging {
            id,
            mode,
            press_x: x,
        });
        Ok(Outcome::DragStarted { id, mode })
    }

    pub fn drag_to(&mut self, x: f64, y: f64) -> Result<Outcome, SessionError> {
        let EditState::Dragging { id, mode, press_x } = self.state else {
            return self.ignore("drag");
        };
        match mode {
            DragMode::Move => self.peaks.move_to(id, x, y)?,
            DragMode::Resize => {
                let width = (x - press_x).abs();
                match self.width_lock {
                    Some(_) => {
                        self.peaks.check_width(width)?;
                        if self.peaks.get(id).is_some_and(|p| p.is_pending()) {
                            return Err(PeakSetError::PendingPeak(id).into());
                        }
                        self.peaks.set_all_widths(width)?;
                        self.width_lock = Some(width);
                    }
                    None => self.peaks.resize(id, width)?,
                }
            }
        }
        Ok(Outcome::Dragged(id))
    }

    pub fn release(&mut self) -> Result<Outcome, SessionError> {
        let EditState::Dragging { id, .. } = self.state else {
            return self.ignore("release");
        };
        self.transition(EditState::Selected(id));
        let changed = self.record();
        Ok(Outcome::Released { id, changed })
    }

    /// Delete the selected peak
    pub fn delete(&mut self) -> Result<Outcome, SessionError> {
        let EditState::Selected(id) = self.state else {
            return self.ignore("delete");
        };
        self.peaks.remove(id)?;
        self.transition(EditState::Idle);
        self.record();
        Ok(Outcome::Deleted(id))
    }

    /// Estimate from scratch if there are no peaks, otherwise estimate the pending peaks
    pub fn estimate(&mut self) -> Result<Outcome, SessionError> {
        let report = self.estimator.estimate(&self.signal, &mut self.peaks)?;
        if let Some(width) = self.width_lock {
            self.peaks.set_all_widths(width)?;
        }
        self.revalidate_selection();
        self.record();
        Ok(Outcome::Estimated(report))
    }

    /// Refine every peak. While widths are locked, a single shared width is fit and
    /// becomes the new locked width.
    pub fn fit(&mut self) -> Result<Outcome, SessionError> {
        let mut fitter = self.fitter.clone();
        fitter.config.shared_width = self.width_lock.is_some();
        let diagnostics = match fitter.fit(&self.signal, &mut self.peaks) {
            Ok(diagnostics) => diagnostics,
            Err(err) => {
                if matches!(err, FitError::FitDiverged { .. }) {
                    warn!("Fit of {} failed: {err}", self.name);
                }
                return Err(err.into());
            }
        };
        if self.width_lock.is_some() {
            self.width_lock = self.peaks.iter().find_map(|p| p.width());
        }
        self.record();
        self.last_fit = Some(diagnostics.clone());
        Ok(Outcome::Fitted(diagnostics))
    }

    pub fn undo(&mut self) -> Result<Outcome, SessionError> {
        if self.state.is_dragging() {
            return self.ignore("undo");
        }
        match self.history.undo() {
            Some(snapshot) => {
                self.peaks.restore(snapshot);
                self.revalidate_selection();
                Ok(Outcome::Restored)
            }
            None => self.ignore("undo"),
        }
    }

    pub fn redo(&mut self) -> Result<Outcome, SessionError> {
        if self.state.is_dragging() {
            return self.ignore("redo");
        }
        match self.history.redo() {
            Some(snapshot) => {
                self.peaks.restore(snapshot);
                self.revalidate_selection();
                Ok(Outcome::Restored)
            }
            None => self.ignore("redo"),
        }
    }

    /// Remove every peak
    pub fn reset(&mut self) -> Result<Outcome, SessionError> {
        self.peaks.clear();
        self.transition(EditState::Idle);
        self.record();
        Ok(Outcome::Reset)
    }

    /// Lock every seeded peak to the first seeded peak's width, or release the lock
    pub fn toggle_width_lock(&mut self) -> Result<Outcome, SessionError> {
        if self.width_lock.take().is_some() {
            debug!("Unlocked widths");
            return Ok(Outcome::WidthLock(None));
        }
        let Some(width) = self.peaks.iter().find_map(|p| p.width()) else {
            return self.ignore("width lock");
        };
        self.peaks.set_all_widths(width)?;
        self.width_lock = Some(width);
        self.record();
        debug!("Locked widths to {width}");
        Ok(Outcome::WidthLock(Some(width)))
    }
}
