//! The immutable sampled intensity profile that peaks are fit against.
use std::ops::RangeInclusive;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::search::bracket;

/// All the ways a sample series can be rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("A signal needs at least 2 points, received {0}")]
    TooFewPoints(usize),
    #[error("The x and y arrays do not match in length ({0} != {1})")]
    LengthMismatch(usize, usize),
    #[error("The x values must be strictly increasing, but x[{index}] = {value} does not exceed the previous value")]
    NotIncreasing { index: usize, value: f64 },
    #[error("Non-finite value at index {0}")]
    NonFinite(usize),
    #[error("Failed to parse line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("Failed to read signal: {0}")]
    Io(String),
}

/// An ordered series of `(x, y)` samples with strictly increasing, finite `x`
/// and finite `y`.
///
/// Once built, a [`Signal`] is never modified.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Signal {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Signal {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, SignalError> {
        if x.len() != y.len() {
            return Err(SignalError::LengthMismatch(x.len(), y.len()));
        }
        if x.len() < 2 {
            return Err(SignalError::TooFewPoints(x.len()));
        }
        if let Some(i) = x
            .iter()
            .zip(y.iter())
            .position(|(a, b)| !a.is_finite() || !b.is_finite())
        {
            return Err(SignalError::NonFinite(i));
        }
        if let Some(i) = x.windows(2).position(|w| w[1] <= w[0]) {
            return Err(SignalError::NotIncreasing {
                index: i + 1,
                value: x[i + 1],
            });
        }
        Ok(Self { x, y })
    }

    pub fn from_pairs<I: IntoIterator<Item = (f64, f64)>>(pairs: I) -> Result<Self, SignalError> {
        let (x, y): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        Self::new(x, y)
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Always `false`, a valid signal has at least two points
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<(f64, f64)> {
        Some((*self.x.get(index)?, *self.y.get(index)?))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    pub fn start(&self) -> f64 {
        self.x[0]
    }

    pub fn end(&self) -> f64 {
        self.x[self.x.len() - 1]
    }

    /// The closed x-domain covered by the samples
    pub fn domain(&self) -> RangeInclusive<f64> {
        self.start()..=self.end()
    }

    pub fn span(&self) -> f64 {
        self.end() - self.start()
    }

    /// Linearly interpolate the signal at `x`.
    ///
    /// Coordinates outside of [`Signal::domain`] take the value of the nearest
    /// end point.
    pub fn interpolate(&self, x: f64) -> f64 {
        if x <= self.start() {
            return self.y[0];
        }
        if x >= self.end() {
            return self.y[self.len() - 1];
        }
        let j = bracket(&self.x, x);
        let (x0, x1) = (self.x[j], self.x[j + 1]);
        let (y0, y1) = (self.y[j], self.y[j + 1]);
        ((y0 * (x1 - x)) + (y1 * (x - x0))) / (x1 - x0)
    }

    /// Build `n` evenly spaced coordinates spanning the signal's domain, the
    /// grid used to draw model curves.
    pub fn grid(&self, n: usize) -> Vec<f64> {
        match n {
            0 => Vec::new(),
            1 => vec![self.start()],
            _ => {
                let step = self.span() / (n - 1) as f64;
                (0..n)
                    .map(|i| {
                        if i == n - 1 {
                            self.end()
                        } else {
                            self.start() + step * i as f64
                        }
                    })
                    .collect()
            }
        }
    }
}

impl TryFrom<(Vec<f64>, Vec<f64>)> for Signal {
    type Error = SignalError;

    fn try_from(value: (Vec<f64>, Vec<f64>)) -> Result<Self, Self::Error> {
        Self::new(value.0, value.1)
    }
}
