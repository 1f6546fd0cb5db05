//! Algorithm for finding simple symmetric peaks in a smoothed 1D profile.
//!
//! The picker walks the smoothed signal looking for local maxima that stand out from
//! the baseline by more than the noise, then measures each one's height and its
//! Gaussian-equivalent width from the half height crossings.
use log::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peak_statistics::{full_width_at_half_max, isclose, percentile, rms_difference};
use crate::signal::Signal;
use crate::smooth::Smoothing;

/// A putative peak found by [`PeakPicker`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakCandidate {
    /// The index of the apex in the signal
    pub index: usize,
    /// The interpolated apex coordinate
    pub center: f64,
    /// The smoothed height of the apex above the baseline
    pub amplitude: f64,
    /// The Gaussian-equivalent standard deviation
    pub width: f64,
    pub full_width_at_half_max: f64,
    /// The height above the baseline relative to the noise level
    pub signal_to_noise: f64,
}

/// Everything learned while looking for peaks in a signal
#[derive(Debug, Clone, Default)]
pub struct PeakDetection {
    /// Accepted candidates, ranked by amplitude descending
    pub candidates: Vec<PeakCandidate>,
    /// The noise floor the peak heights are measured from
    pub baseline: f64,
    /// The root mean square difference between the raw and smoothed signal
    pub noise: f64,
    pub smoothed: Vec<f64>,
}

impl PeakDetection {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// A peak picker for densitometry profiles
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakPicker {
    /// How to smooth the signal before looking for maxima
    pub smoothing: Smoothing,
    /// The number of samples on either side of an apex that must all be lower than it
    pub min_separation: usize,
    /// The percentile of the smoothed signal, in `[0, 1]`, taken as the baseline
    pub noise_floor_percentile: f64,
    /// The minimum ratio of a candidate's height to the noise level
    pub signal_to_noise_threshold: f64,
    /// The minimum height of a candidate as a fraction of the tallest excursion above the baseline
    pub min_relative_height: f64,
    /// The maximum number of candidates to keep
    pub max_peaks: usize,
}

impl Default for PeakPicker {
    fn default() -> Self {
        Self {
            smoothing: Smoothing::default(),
            min_separation: 3,
            noise_floor_percentile: 0.10,
            signal_to_noise_threshold: 3.0,
            min_relative_height: 0.02,
            max_peaks: 20,
        }
    }
}

/// A builder for configuring [`PeakPicker`]
#[derive(Debug, Clone, Default)]
pub struct PeakPickerBuilder {
    picker: PeakPicker,
}

impl PeakPickerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn smoothing(&mut self, smoothing: Smoothing) -> &mut Self {
        self.picker.smoothing = smoothing;
        self
    }

    pub fn min_separation(&mut self, min_separation: usize) -> &mut Self {
        self.picker.min_separation = min_separation;
        self
    }

    pub fn noise_floor_percentile(&mut self, noise_floor_percentile: f64) -> &mut Self {
        self.picker.noise_floor_percentile = noise_floor_percentile;
        self
    }

    pub fn signal_to_noise_threshold(&mut self, signal_to_noise_threshold: f64) -> &mut Self {
        self.picker.signal_to_noise_threshold = signal_to_noise_threshold;
        self
    }

    pub fn min_relative_height(&mut self, min_relative_height: f64) -> &mut Self {
        self.picker.min_relative_height = min_relative_height;
        self
    }

    pub fn max_peaks(&mut self, max_peaks: usize) -> &mut Self {
        self.picker.max_peaks = max_peaks;
        self
    }

    pub fn build(&self) -> PeakPicker {
        self.picker.clone()
    }
}

impl From<PeakPickerBuilder> for PeakPicker {
    fn from(value: PeakPickerBuilder) -> Self {
        value.picker
    }
}

/// Refine the apex at `index` by passing a parabola through it and its neighbors
fn parabolic_apex(x: &[f64], y: &[f64], index: usize) -> f64 {
    let (y0, y1, y2) = (y[index - 1], y[index], y[index + 1]);
    let denom = y0 - 2.0 * y1 + y2;
    if denom >= 0.0 || isclose(denom, 0.0) {
        return x[index];
    }
    let offset = (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5);
    if offset >= 0.0 {
        x[index] + offset * (x[index + 1] - x[index])
    } else {
        x[index] + offset * (x[index] - x[index - 1])
    }
}

impl PeakPicker {
    pub fn builder() -> PeakPickerBuilder {
        PeakPickerBuilder::new()
    }

    /// Whether the run of equal values `start..=end` is higher than everything within
    /// [`PeakPicker::min_separation`] samples of it. Runs touching either end of the
    /// array are not maxima.
    fn is_local_maximum(&self, smoothed: &[f64], start: usize, end: usize) -> bool {
        let n = smoothed.len();
        if start == 0 || end + 1 >= n {
            return false;
        }
        let value = smoothed[start];
        let reach = self.min_separation.max(1);
        let lo = start.saturating_sub(reach);
        let hi = (end + reach).min(n - 1);
        smoothed[lo..start].iter().all(|v| *v < value)
            && smoothed[end + 1..=hi].iter().all(|v| *v < value)
    }

    /// Find the apex index of every local maximum in `smoothed`, collapsing flat tops
    /// to their middle sample.
    pub fn local_maxima(&self, smoothed: &[f64]) -> Vec<usize> {
        let n = smoothed.len();
        let mut maxima = Vec::new();
        let mut index = 1;
        while index + 1 < n {
            let mut end = index;
            while end + 1 < n && smoothed[end + 1] == smoothed[index] {
                end += 1;
            }
            if smoothed[index - 1] < smoothed[index] && self.is_local_maximum(smoothed, index, end) {
                maxima.push((index + end) / 2);
            }
            index = end + 1;
        }
        maxima
    }

    /// Pick peaks from `signal`.
    ///
    /// Finding nothing above the noise floor is not an error, the returned
    /// [`PeakDetection`] is simply empty.
    pub fn discover_peaks(&self, signal: &Signal) -> PeakDetection {
        let x = signal.x();
        let smoothed = self.smoothing.apply(signal.y());
        let baseline = percentile(&smoothed, self.noise_floor_percentile);
        let noise = rms_difference(signal.y(), &smoothed);
        let max_excursion = smoothed
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v - baseline));
        let min_height = max_excursion * self.min_relative_height;

        let mut candidates = Vec::new();
        for index in self.local_maxima(&smoothed) {
            let amplitude = smoothed[index] - baseline;
            if amplitude <= 0.0 || amplitude < min_height {
                trace!("Skipping maximum at {index} with height {amplitude:0.3}");
                continue;
            }
            let signal_to_noise = if noise > 0.0 {
                amplitude / noise
            } else {
                f64::INFINITY
            };
            if signal_to_noise < self.signal_to_noise_threshold {
                trace!("Skipping maximum at {index} with SNR {signal_to_noise:0.3}");
                continue;
            }

            let shape = full_width_at_half_max(x, &smoothed, index, baseline);
            if shape.full_width_at_half_max <= 0.0 {
                trace!("Skipping maximum at {index} without a measurable width");
                continue;
            }
            let center = if smoothed[index - 1] < smoothed[index] && smoothed[index + 1] < smoothed[index] {
                parabolic_apex(x, &smoothed, index)
            } else {
                x[index]
            };
            candidates.push(PeakCandidate {
                index,
                center,
                amplitude,
                width: shape.sigma(),
                full_width_at_half_max: shape.full_width_at_half_max,
                signal_to_noise,
            });
        }

        candidates.sort_by(|a, b| b.amplitude.total_cmp(&a.amplitude));
        candidates.truncate(self.max_peaks);
        debug!(
            "Found {} peak candidates above baseline {baseline:0.3} with noise {noise:0.3}",
            candidates.len()
        );

        PeakDetection {
            candidates,
            baseline,
            noise,
            smoothed,
        }
    }
}

/// A convenience function that uses a default peak picking configuration to pick peaks
/// from a signal.
pub fn pick_peaks(signal: &Signal) -> Vec<PeakCandidate> {
    PeakPicker::default().discover_peaks(signal).candidates
}
