//! Noise suppression applied to a profile before looking for peaks in it.
use std::ops::AddAssign;

use nalgebra::{DMatrix, DVector};
use num_traits::Float;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Average each point with its `window / 2` neighbors on either side.
///
/// The window is truncated at the ends of the array, so every output point
/// is the mean of the points that actually exist around it, and a peak's apex
/// does not shift the way it would with a trailing average.
pub fn moving_average<F: Float + AddAssign>(data: &[F], window: usize) -> Vec<F> {
    let n = data.len();
    let half = window / 2;
    if half == 0 || n == 0 {
        return data.to_vec();
    }

    let mut prefix = Vec::with_capacity(n + 1);
    let mut running_sum = F::zero();
    prefix.push(running_sum);
    for v in data.iter().copied() {
        running_sum += v;
        prefix.push(running_sum);
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            let count = F::from(hi - lo).unwrap_or_else(F::one);
            (prefix[hi] - prefix[lo]) / count
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SavitzkyGolayError {
    #[error("The window length must be an odd number, received {0}")]
    WindowLengthNotOdd(usize),
    #[error(
        "The window length must be shorter than the data, received {0} window with {1} data points"
    )]
    WindowLengthTooLong(usize, usize),
    #[error("The polynomial order term {0} must be less than the window size {1}")]
    PolynomialOrderTooLarge(usize, usize),
    #[error("Failed to solve for coefficients: {0}")]
    FailedToSolveCoefficients(&'static str),
}

#[derive(Debug, Clone)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    pub fn order(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.coefficients.iter()
    }

    /// Evaluate with Horner's rule
    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + *c)
    }

    /// Least squares fit of a polynomial of `order` through `(x, y)`
    pub fn fit(x: &[f64], y: &[f64], order: usize) -> Result<Self, SavitzkyGolayError> {
        let nc = order + 1;
        let system = DMatrix::from_fn(x.len(), nc, |row_i, col_j| x[row_i].powi(col_j as i32));
        let beta = DVector::from_column_slice(y);
        let decomp = system.svd(true, true);
        let coefficients: Vec<f64> = decomp
            .solve(&beta, 1e-18)
            .map_err(SavitzkyGolayError::FailedToSolveCoefficients)?
            .iter()
            .copied()
            .collect();
        Ok(Self::new(coefficients))
    }
}

impl AsRef<[f64]> for Polynomial {
    fn as_ref(&self) -> &[f64] {
        &self.coefficients
    }
}

#[derive(Debug, Clone)]
struct SavitzkyGolay<'a> {
    data: &'a [f64],
    window_length: usize,
    poly_order: usize,
}

impl<'a> SavitzkyGolay<'a> {
    fn new(
        data: &'a [f64],
        window_length: usize,
        poly_order: usize,
    ) -> Result<Self, SavitzkyGolayError> {
        let inst = Self {
            data,
            window_length,
            poly_order,
        };
        inst.validate()?;
        Ok(inst)
    }

    fn validate(&self) -> Result<(), SavitzkyGolayError> {
        let n = self.data.len();
        if self.window_length % 2 == 0 {
            Err(SavitzkyGolayError::WindowLengthNotOdd(self.window_length))
        } else if self.window_length > n {
            Err(SavitzkyGolayError::WindowLengthTooLong(
                self.window_length,
                n,
            ))
        } else if self.poly_order >= self.window_length {
            Err(SavitzkyGolayError::PolynomialOrderTooLarge(
                self.poly_order,
                self.window_length,
            ))
        } else {
            Ok(())
        }
    }

    const fn half_length(&self) -> usize {
        self.window_length / 2
    }

    /// Solve for the smoothing kernel, the weights that evaluate the local least
    /// squares polynomial at the window's center.
    fn estimate_coefficients(&self) -> Result<DVector<f64>, SavitzkyGolayError> {
        let half = self.half_length() as f64;
        let vandermonde = DMatrix::from_fn(self.poly_order + 1, self.window_length, |i, j| {
            (j as f64 - half).powi(i as i32)
        });
        let mut y = DVector::from_element(self.poly_order + 1, 0.0);
        y[0] = 1.0;

        let svd = vandermonde.svd(true, true);
        svd.solve(&y, 1e-12)
            .map_err(SavitzkyGolayError::FailedToSolveCoefficients)
    }

    /// Points closer than half a window to either end are taken from a polynomial
    /// fit over the first or last full window.
    fn fit_edge(
        &self,
        window_start: usize,
        interp_start: usize,
        interp_stop: usize,
        y: &mut [f64],
    ) -> Result<(), SavitzkyGolayError> {
        let positions: Vec<f64> = (0..self.window_length).map(|i| i as f64).collect();
        let values = &self.data[window_start..window_start + self.window_length];
        let poly = Polynomial::fit(&positions, values, self.poly_order)?;
        for i in interp_start..interp_stop {
            y[i] = poly.eval((i - window_start) as f64);
        }
        Ok(())
    }

    fn smooth(&self) -> Result<Vec<f64>, SavitzkyGolayError> {
        let coefs = self.estimate_coefficients()?;
        let n = self.data.len();
        let half = self.half_length();
        let mut y = self.data.to_vec();
        for i in half..(n - half) {
            let window = &self.data[i - half..=i + half];
            y[i] = window.iter().zip(coefs.iter()).map(|(a, c)| a * c).sum();
        }
        self.fit_edge(0, 0, half, &mut y)?;
        self.fit_edge(n - self.window_length, n - half, n, &mut y)?;
        Ok(y)
    }
}

/// Smooth `data` by fitting a polynomial of `poly_order` over a sliding window
/// of `window_length` points.
pub fn savitzky_golay(
    data: &[f64],
    window_length: usize,
    poly_order: usize,
) -> Result<Vec<f64>, SavitzkyGolayError> {
    let state = SavitzkyGolay::new(data, window_length, poly_order)?;
    state.smooth()
}

/// The smoothing strategy applied before peak detection
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Smoothing {
    /// Use the signal as is
    None,
    /// A centered moving average over `window` points
    MovingAverage { window: usize },
    /// A Savitzky-Golay filter, which preserves peak heights better than a moving average
    SavitzkyGolay { window: usize, poly_order: usize },
}

impl Default for Smoothing {
    fn default() -> Self {
        Self::SavitzkyGolay {
            window: 21,
            poly_order: 4,
        }
    }
}

impl Smoothing {
    /// Apply the smoothing to `data`.
    ///
    /// A Savitzky-Golay window longer than `data` is shrunk to the longest odd length
    /// that fits, and when no valid filter remains the moving average is used instead.
    pub fn apply(&self, data: &[f64]) -> Vec<f64> {
        match *self {
            Self::None => data.to_vec(),
            Self::MovingAverage { window } => moving_average(data, window),
            Self::SavitzkyGolay { window, poly_order } => {
                let mut window = window.min(data.len());
                if window % 2 == 0 {
                    window = window.saturating_sub(1);
                }
                match savitzky_golay(data, window, poly_order) {
                    Ok(smoothed) => smoothed,
                    Err(err) => {
                        log::debug!("Falling back to a moving average: {err}");
                        moving_average(data, window)
                    }
                }
            }
        }
    }
}
