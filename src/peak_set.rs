//! The editable collection of peaks making up a Gaussian mixture.
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peak::{Peak, PeakId, PeakShape};

/// The narrowest width a peak may take by default
pub const DEFAULT_MIN_WIDTH: f64 = 1e-9;

/// All the ways a direct peak edit can be rejected. A rejected edit never
/// changes the [`PeakSet`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PeakSetError {
    #[error("No peak with identity {0} exists")]
    UnknownPeak(PeakId),
    #[error("A peak width must be greater than {min_width}, received {width}")]
    InvalidWidth { width: f64, min_width: f64 },
    #[error("Peak {0} has no width to change until it has been estimated")]
    PendingPeak(PeakId),
    #[error("A peak {parameter} must be finite, received {value}")]
    NonFinite { parameter: &'static str, value: f64 },
}

/// A copy of a [`PeakSet`]'s members, used to restore an earlier state
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakSetSnapshot {
    peaks: Vec<Peak>,
}

impl PeakSetSnapshot {
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

/// An insertion-ordered set of [`Peak`]s with unique identities.
///
/// Insertion order is the order peaks are summed, fit, and exported in.
#[derive(Debug, Clone)]
pub struct PeakSet {
    peaks: Vec<Peak>,
    next_id: u64,
    min_width: f64,
}

impl Default for PeakSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PeakSet {
    fn eq(&self, other: &Self) -> bool {
        self.peaks == other.peaks
    }
}

impl PeakSet {
    pub fn new() -> Self {
        Self::with_min_width(DEFAULT_MIN_WIDTH)
    }

    pub fn with_min_width(min_width: f64) -> Self {
        Self {
            peaks: Vec::new(),
            next_id: 0,
            min_width,
        }
    }

    pub fn min_width(&self) -> f64 {
        self.min_width
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Peak> {
        self.peaks.iter()
    }

    pub fn as_slice(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn ids(&self) -> impl Iterator<Item = PeakId> + '_ {
        self.peaks.iter().map(|p| p.id())
    }

    pub fn get(&self, id: PeakId) -> Option<&Peak> {
        self.peaks.iter().find(|p| p.id() == id)
    }

    pub fn contains(&self, id: PeakId) -> bool {
        self.get(id).is_some()
    }

    fn position(&self, id: PeakId) -> Result<usize, PeakSetError> {
        self.peaks
            .iter()
            .position(|p| p.id() == id)
            .ok_or(PeakSetError::UnknownPeak(id))
    }

    pub fn has_pending(&self) -> bool {
        self.peaks.iter().any(|p| p.is_pending())
    }

    pub fn pending(&self) -> impl Iterator<Item = &Peak> + '_ {
        self.peaks.iter().filter(|p| p.is_pending())
    }

    pub fn check_width(&self, width: f64) -> Result<(), PeakSetError> {
        // NaN fails the comparison too
        if width > self.min_width && width.is_finite() {
            Ok(())
        } else {
            Err(PeakSetError::InvalidWidth {
                width,
                min_width: self.min_width,
            })
        }
    }

    fn check_finite(parameter: &'static str, value: f64) -> Result<(), PeakSetError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(PeakSetError::NonFinite { parameter, value })
        }
    }

    fn issue_id(&mut self) -> PeakId {
        let id = PeakId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a new peak at `center`.
    ///
    /// The peak is seeded when both `amplitude` and `width` are given, and pending
    /// estimation otherwise.
    pub fn add(
        &mut self,
        center: f64,
        amplitude: Option<f64>,
        width: Option<f64>,
    ) -> Result<PeakId, PeakSetError> {
        Self::check_finite("center", center)?;
        let shape = match (amplitude, width) {
            (Some(amplitude), Some(width)) => {
                Self::check_finite("amplitude", amplitude)?;
                self.check_width(width)?;
                PeakShape::Seeded { amplitude, width }
            }
            _ => PeakShape::Pending,
        };
        let id = self.issue_id();
        self.peaks.push(Peak::new(id, center, shape));
        log::trace!("Added peak {id} at {center}");
        Ok(id)
    }

    pub fn add_seeded(
        &mut self,
        center: f64,
        amplitude: f64,
        width: f64,
    ) -> Result<PeakId, PeakSetError> {
        self.add(center, Some(amplitude), Some(width))
    }

    pub fn add_pending(&mut self, center: f64) -> Result<PeakId, PeakSetError> {
        self.add(center, None, None)
    }

    /// Move a peak's handle to `(center, amplitude)`.
    ///
    /// A pending peak has no amplitude yet, so only its center moves.
    pub fn move_to(&mut self, id: PeakId, center: f64, amplitude: f64) -> Result<(), PeakSetError> {
        let i = self.position(id)?;
        Self::check_finite("center", center)?;
        Self::check_finite("amplitude", amplitude)?;
        let peak = &mut self.peaks[i];
        peak.set_center(center);
        if let PeakShape::Seeded { width, .. } = peak.shape() {
            peak.set_shape(PeakShape::Seeded { amplitude, width });
        }
        Ok(())
    }

    pub fn resize(&mut self, id: PeakId, width: f64) -> Result<(), PeakSetError> {
        let i = self.position(id)?;
        self.check_width(width)?;
        let peak = &mut self.peaks[i];
        match peak.shape() {
            PeakShape::Seeded { amplitude, .. } => {
                peak.set_shape(PeakShape::Seeded { amplitude, width });
                Ok(())
            }
            PeakShape::Pending => Err(PeakSetError::PendingPeak(id)),
        }
    }

    /// Give every seeded peak the same `width`, returning how many were changed
    pub fn set_all_widths(&mut self, width: f64) -> Result<usize, PeakSetError> {
        self.check_width(width)?;
        let mut count = 0;
        for peak in self.peaks.iter_mut() {
            if let PeakShape::Seeded { amplitude, .. } = peak.shape() {
                peak.set_shape(PeakShape::Seeded { amplitude, width });
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn remove(&mut self, id: PeakId) -> Result<Peak, PeakSetError> {
        let i = self.position(id)?;
        Ok(self.peaks.remove(i))
    }

    /// Remove every peak. Identities already issued stay retired.
    pub fn clear(&mut self) {
        self.peaks.clear();
    }

    /// Fill in the shape of a peak, keeping its center
    pub(crate) fn seed(&mut self, id: PeakId, amplitude: f64, width: f64) -> Result<(), PeakSetError> {
        let i = self.position(id)?;
        Self::check_finite("amplitude", amplitude)?;
        self.check_width(width)?;
        self.peaks[i].set_shape(PeakShape::Seeded { amplitude, width });
        Ok(())
    }

    /// Overwrite every peak's parameters, in set order, with `(amplitude, center, width)`
    /// triples. The caller guarantees the values are finite and the widths valid.
    pub(crate) fn overwrite_parameters(&mut self, params: &[(f64, f64, f64)]) {
        debug_assert_eq!(params.len(), self.peaks.len());
        for (peak, (amplitude, center, width)) in self.peaks.iter_mut().zip(params.iter().copied()) {
            peak.set_center(center);
            peak.set_shape(PeakShape::Seeded { amplitude, width });
        }
    }

    /// The value of the mixture at `x`, the sum of every peak's contribution
    pub fn composite_at(&self, x: f64) -> f64 {
        self.peaks.iter().map(|p| p.density(x)).sum()
    }

    pub fn composite_over(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|x| self.composite_at(*x)).collect()
    }

    /// Find the peak whose handle, drawn at `(center, amplitude)`, is closest to
    /// `(x, y)` within a `tolerance_x` by `tolerance_y` box.
    ///
    /// Pending peaks have their handle on the x-axis.
    pub fn hit_test(&self, x: f64, y: f64, tolerance_x: f64, tolerance_y: f64) -> Option<PeakId> {
        self.peaks
            .iter()
            .filter_map(|p| {
                let dx = (p.center() - x).abs();
                let dy = (p.amplitude().unwrap_or(0.0) - y).abs();
                if dx <= tolerance_x && dy <= tolerance_y {
                    let score = (dx / tolerance_x.max(f64::MIN_POSITIVE)).powi(2)
                        + (dy / tolerance_y.max(f64::MIN_POSITIVE)).powi(2);
                    Some((p.id(), score))
                } else {
                    None
                }
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    pub fn snapshot(&self) -> PeakSetSnapshot {
        PeakSetSnapshot {
            peaks: self.peaks.clone(),
        }
    }

    /// Restore the members recorded in `snapshot`. The identity counter is never
    /// rewound, so peaks added afterwards still get fresh identities.
    pub fn restore(&mut self, snapshot: &PeakSetSnapshot) {
        self.peaks = snapshot.peaks.clone();
        let floor = self
            .peaks
            .iter()
            .map(|p| p.id().get() + 1)
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(floor);
    }
}

impl<'a> IntoIterator for &'a PeakSet {
    type Item = &'a Peak;
    type IntoIter = std::slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}
