//! `peakquant` decomposes a one-dimensional intensity profile, such as a densitometry
//! lane, into a sum of Gaussian peaks and reports each peak's area.
//!
//! A session is driven by an [`InteractionController`], which owns the [`Signal`], the
//! [`PeakSet`] being edited, and an undo history. Peaks can be placed by hand, found
//! automatically by the [`Estimator`], and refined jointly by the [`MixtureFitter`].
//!
//! # Usage
//! ```
//! use peakquant::prelude::*;
//!
//! let x: Vec<f64> = (0..=200).map(|i| i as f64 * 0.5).collect();
//! let y: Vec<f64> = x
//!     .iter()
//!     .map(|x| gaussian(*x, 100.0, 30.0, 4.0) + gaussian(*x, 60.0, 65.0, 3.0))
//!     .collect();
//! let mut session = InteractionController::from_arrays("lane 1", x, y).unwrap();
//! session.handle(Gesture::Estimate).unwrap();
//! session.handle(Gesture::Fit).unwrap();
//! assert_eq!(session.peaks().len(), 2);
//! println!("{}", session.peak_table());
//! ```
pub mod search;
pub mod signal;
pub mod peak_statistics;
pub mod smooth;
pub mod peak;
pub mod peak_set;
pub mod peak_picker;
pub mod estimator;
pub mod fitter;
pub mod history;
pub mod controller;
pub mod export;
pub mod text;

#[cfg(feature = "plotting")]
pub mod plot;

pub mod prelude;

#[cfg(test)]
mod test_data;

pub use crate::controller::{
    ErrorKind, EditState, Gesture, InteractionController, Outcome, SessionError,
};
pub use crate::estimator::Estimator;
pub use crate::export::{DirectoryExporter, ExportSink, ExportView};
pub use crate::fitter::{FitConfig, FitDiagnostics, MixtureFitter};
pub use crate::peak::{Peak, PeakId};
pub use crate::peak_picker::{pick_peaks, PeakPicker};
pub use crate::peak_set::PeakSet;
pub use crate::signal::Signal;
