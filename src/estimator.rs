//! Initial guesses for peak parameters, derived from the signal without iteration.
use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peak::PeakId;
use crate::peak_picker::{PeakCandidate, PeakDetection, PeakPicker};
use crate::peak_set::{PeakSet, PeakSetError};
use crate::signal::Signal;

/// Which peaks an estimate covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EstimateMode {
    /// Discard every peak and create one per detected candidate
    FromScratch,
    /// Fill in the shape of pending peaks only
    PendingOnly,
}

/// What an estimate changed
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateReport {
    pub mode: EstimateMode,
    /// The number of candidates the picker accepted
    pub candidates: usize,
    /// The baseline candidate heights were measured from
    pub baseline: f64,
    /// Peaks created from candidates, in set order
    pub created: Vec<PeakId>,
    /// Pending peaks matched to a candidate
    pub matched: Vec<PeakId>,
    /// Pending peaks with no candidate nearby, given the fallback estimate
    pub fallback: Vec<PeakId>,
}

impl EstimateReport {
    fn new(mode: EstimateMode, detection: &PeakDetection) -> Self {
        Self {
            mode,
            candidates: detection.len(),
            baseline: detection.baseline,
            created: Vec::new(),
            matched: Vec::new(),
            fallback: Vec::new(),
        }
    }

    /// Whether the estimate changed any peak
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.matched.is_empty() && self.fallback.is_empty()
    }
}

/// Seeds peaks from the candidates found by a [`PeakPicker`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Estimator {
    pub picker: PeakPicker,
    /// The width given to pending peaks with no nearby candidate. When unset, a
    /// twentieth of the signal's x-range is used.
    pub default_width: Option<f64>,
}

impl Estimator {
    pub fn new(picker: PeakPicker) -> Self {
        Self {
            picker,
            default_width: None,
        }
    }

    pub fn default_width(mut self, default_width: Option<f64>) -> Self {
        self.default_width = default_width;
        self
    }

    /// The fallback width for `signal`
    pub fn default_width_for(&self, signal: &Signal) -> f64 {
        self.default_width.unwrap_or_else(|| signal.span() / 20.0)
    }

    pub fn detect(&self, signal: &Signal) -> PeakDetection {
        self.picker.discover_peaks(signal)
    }

    /// Estimate from scratch when `peaks` is empty, otherwise fill in its pending peaks
    pub fn estimate(
        &self,
        signal: &Signal,
        peaks: &mut PeakSet,
    ) -> Result<EstimateReport, PeakSetError> {
        if peaks.is_empty() {
            self.estimate_from_scratch(signal, peaks)
        } else {
            self.estimate_pending(signal, peaks)
        }
    }

    /// Replace the contents of `peaks` with one peak per detected candidate.
    ///
    /// The amplitude-ranked candidates are capped first, then added in ascending
    /// order of center.
    pub fn estimate_from_scratch(
        &self,
        signal: &Signal,
        peaks: &mut PeakSet,
    ) -> Result<EstimateReport, PeakSetError> {
        let detection = self.detect(signal);
        let mut report = EstimateReport::new(EstimateMode::FromScratch, &detection);

        let mut candidates: Vec<&PeakCandidate> = detection.candidates.iter().collect();
        candidates.sort_by(|a, b| a.center.total_cmp(&b.center));
        for candidate in candidates.iter() {
            peaks.check_width(candidate.width)?;
        }

        peaks.clear();
        for candidate in candidates {
            let id = peaks.add_seeded(candidate.center, candidate.amplitude, candidate.width)?;
            report.created.push(id);
        }
        debug!("Created {} peaks from scratch", report.created.len());
        Ok(report)
    }

    /// Give every pending peak an amplitude and width, keeping the center the operator chose.
    ///
    /// Each pending peak, in set order, claims the closest unclaimed candidate whose
    /// center lies within one full width at half max of its own. A peak with no such
    /// candidate takes the signal's height above the baseline at its center and the
    /// default width.
    ///
    /// Every assignment is validated before any is applied, so an invalid width
    /// leaves `peaks` unchanged.
    pub fn estimate_pending(
        &self,
        signal: &Signal,
        peaks: &mut PeakSet,
    ) -> Result<EstimateReport, PeakSetError> {
        let detection = self.detect(signal);
        let mut report = EstimateReport::new(EstimateMode::PendingOnly, &detection);
        if !peaks.has_pending() {
            return Ok(report);
        }

        let default_width = self.default_width_for(signal);
        peaks.check_width(default_width)?;

        let pending: Vec<(PeakId, f64)> = peaks.pending().map(|p| (p.id(), p.center())).collect();
        let mut claimed = vec![false; detection.len()];
        let mut assignments = Vec::with_capacity(pending.len());
        for (id, center) in pending {
            let nearest = detection
                .candidates
                .iter()
                .enumerate()
                .filter(|(i, c)| {
                    !claimed[*i] && (c.center - center).abs() <= c.full_width_at_half_max
                })
                .min_by(|(_, a), (_, b)| {
                    (a.center - center)
                        .abs()
                        .total_cmp(&(b.center - center).abs())
                });

            let assignment = match nearest {
                Some((i, candidate)) => {
                    claimed[i] = true;
                    (id, candidate.amplitude, candidate.width, true)
                }
                None => {
                    let amplitude = (signal.interpolate(center) - detection.baseline).max(0.0);
                    (id, amplitude, default_width, false)
                }
            };
            peaks.check_width(assignment.2)?;
            assignments.push(assignment);
        }

        for (id, amplitude, width, matched) in assignments {
            peaks.seed(id, amplitude, width)?;
            if matched {
                report.matched.push(id);
            } else {
                report.fallback.push(id);
            }
        }
        debug!(
            "Estimated {} pending peaks from candidates and {} from the fallback",
            report.matched.len(),
            report.fallback.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_data::mixture_signal;

    #[test_log::test]
    fn test_estimate_single_gaussian() {
        let signal = mixture_signal(&[(100.0, 50.0, 5.0)]);
        let mut peaks = PeakSet::new();
        let report = Estimator::default().estimate(&signal, &mut peaks).unwrap();
        assert_eq!(report.mode, EstimateMode::FromScratch);
        assert_eq!(report.created.len(), 1);
        assert_eq!(peaks.len(), 1);

        let peak = peaks.iter().next().unwrap();
        let amplitude = peak.amplitude().unwrap();
        let width = peak.width().unwrap();
        assert!((amplitude - 100.0).abs() <= 10.0, "{peak}");
        assert!((peak.center() - 50.0).abs() <= 1.0, "{peak}");
        assert!((width - 5.0).abs() <= 1.0, "{peak}");
    }

    #[test_log::test]
    fn test_from_scratch_orders_by_center() {
        let signal = mixture_signal(&[(60.0, 70.0, 3.0), (100.0, 25.0, 4.0), (80.0, 45.0, 3.0)]);
        let mut peaks = PeakSet::new();
        Estimator::default()
            .estimate_from_scratch(&signal, &mut peaks)
            .unwrap();
        let centers: Vec<f64> = peaks.iter().map(|p| p.center().round()).collect();
        assert_eq!(centers, vec![25.0, 45.0, 70.0]);
    }

    #[test]
    fn test_nothing_found() {
        let signal = Signal::new((0..100).map(|i| i as f64).collect(), vec![1.0; 100]).unwrap();
        let mut peaks = PeakSet::new();
        let report = Estimator::default().estimate(&signal, &mut peaks).unwrap();
        assert_eq!(report.candidates, 0);
        assert!(report.is_empty());
        assert!(peaks.is_empty());
    }

    #[test_log::test]
    fn test_pending_only() {
        let signal = mixture_signal(&[(100.0, 30.0, 4.0), (50.0, 70.0, 3.0)]);
        let mut peaks = PeakSet::new();
        let seeded = peaks.add_seeded(10.0, 5.0, 1.0).unwrap();
        let near = peaks.add_pending(31.0).unwrap();
        let far = peaks.add_pending(90.0).unwrap();

        let report = Estimator::default().estimate(&signal, &mut peaks).unwrap();
        assert_eq!(report.mode, EstimateMode::PendingOnly);
        assert_eq!(report.matched, vec![near]);
        assert_eq!(report.fallback, vec![far]);
        assert!(!peaks.has_pending());

        // seeded peaks are left alone
        let untouched = peaks.get(seeded).unwrap();
        assert_eq!(untouched.amplitude(), Some(5.0));
        assert_eq!(untouched.width(), Some(1.0));

        let near = peaks.get(near).unwrap();
        assert_eq!(near.center(), 31.0);
        assert!((near.amplitude().unwrap() - 100.0).abs() < 10.0);
        assert!((near.width().unwrap() - 4.0).abs() < 1.0);

        let far = peaks.get(far).unwrap();
        assert_eq!(far.center(), 90.0);
        assert_eq!(far.width(), Some(5.0));
        assert!(far.amplitude().unwrap() < 1.0);
    }

    #[test]
    fn test_pending_claims_each_candidate_once() {
        let signal = mixture_signal(&[(100.0, 50.0, 5.0)]);
        let mut peaks = PeakSet::new();
        let first = peaks.add_pending(50.5).unwrap();
        let second = peaks.add_pending(49.0).unwrap();
        let report = Estimator::default()
            .default_width(Some(2.0))
            .estimate(&signal, &mut peaks)
            .unwrap();
        assert_eq!(report.matched, vec![first]);
        assert_eq!(report.fallback, vec![second]);
        assert_eq!(peaks.get(second).unwrap().width(), Some(2.0));
    }

    #[test_log::test]
    fn test_pending_rejected_without_partial_update() {
        let signal = mixture_signal(&[(100.0, 30.0, 2.0)]);
        let mut peaks = PeakSet::with_min_width(3.0);
        peaks.add_pending(90.0).unwrap();
        peaks.add_pending(30.0).unwrap();
        let before = peaks.snapshot();

        let err = Estimator::default()
            .default_width(Some(5.0))
            .estimate(&signal, &mut peaks)
            .unwrap_err();
        assert!(matches!(err, PeakSetError::InvalidWidth { .. }), "{err}");
        assert_eq!(peaks.snapshot(), before);
        assert_eq!(peaks.pending().count(), 2);
    }
}
