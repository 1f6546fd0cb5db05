pub use crate::controller::{
    AddMode, ControllerConfig, DragMode, EditState, ErrorKind, Gesture, InteractionController,
    Outcome, SessionError,
};
pub use crate::estimator::{EstimateReport, Estimator};
pub use crate::export::{DirectoryExporter, ExportRow, ExportSink, ExportView, MemoryExporter};
pub use crate::fitter::{FitConfig, FitDiagnostics, FitError, MixtureFitter, Termination};
pub use crate::peak::{gaussian, Peak, PeakId, PeakShape};
pub use crate::peak_picker::{PeakPicker, PeakPickerBuilder};
pub use crate::peak_set::{PeakSet, PeakSetError};
pub use crate::signal::{Signal, SignalError};
pub use crate::smooth::Smoothing;
