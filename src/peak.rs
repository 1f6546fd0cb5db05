use std::f64::consts::{PI, SQRT_2};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peak_statistics::sigma_to_fwhm;

/// The height of a Gaussian with unit amplitude, `width` standard deviation, centered
/// at `center`, evaluated at `x`, times `amplitude`.
#[inline]
pub fn gaussian(x: f64, amplitude: f64, center: f64, width: f64) -> f64 {
    let z = (x - center) / width;
    amplitude * (-0.5 * z * z).exp()
}

/// The integral of a Gaussian over the whole real line
#[inline]
pub fn gaussian_area(amplitude: f64, width: f64) -> f64 {
    amplitude * width * (2.0 * PI).sqrt()
}

/// A stable handle on a [`Peak`].
///
/// Identities are issued by a [`PeakSet`](crate::peak_set::PeakSet) from a monotonic
/// counter and are never handed out twice by the same set, so a GUI may hold onto
/// one across any number of edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakId(u64);

impl PeakId {
    pub(crate) const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeakId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a peak's height and spread are known yet
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeakShape {
    /// The peak has usable parameters, either placed by hand, estimated, or fit
    Seeded { amplitude: f64, width: f64 },
    /// The peak was placed without a shape and is waiting for estimation
    Pending,
}

impl PeakShape {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// One Gaussian component of the mixture
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Peak {
    id: PeakId,
    center: f64,
    shape: PeakShape,
}

impl Peak {
    pub(crate) fn new(id: PeakId, center: f64, shape: PeakShape) -> Self {
        Self { id, center, shape }
    }

    pub fn id(&self) -> PeakId {
        self.id
    }

    pub fn center(&self) -> f64 {
        self.center
    }

    pub fn shape(&self) -> PeakShape {
        self.shape
    }

    pub fn is_pending(&self) -> bool {
        self.shape.is_pending()
    }

    pub fn amplitude(&self) -> Option<f64> {
        match self.shape {
            PeakShape::Seeded { amplitude, .. } => Some(amplitude),
            PeakShape::Pending => None,
        }
    }

    pub fn width(&self) -> Option<f64> {
        match self.shape {
            PeakShape::Seeded { width, .. } => Some(width),
            PeakShape::Pending => None,
        }
    }

    pub fn full_width_at_half_max(&self) -> Option<f64> {
        self.width().map(sigma_to_fwhm)
    }

    pub(crate) fn set_center(&mut self, center: f64) {
        self.center = center;
    }

    pub(crate) fn set_shape(&mut self, shape: PeakShape) {
        self.shape = shape;
    }

    /// This peak's contribution to the composite curve at `x`.
    ///
    /// A pending peak contributes nothing.
    #[inline]
    pub fn density(&self, x: f64) -> f64 {
        match self.shape {
            PeakShape::Seeded { amplitude, width } => gaussian(x, amplitude, self.center, width),
            PeakShape::Pending => 0.0,
        }
    }

    pub fn predict(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|x| self.density(*x)).collect()
    }

    /// The area under the whole curve, `amplitude * width * sqrt(2 * pi)`
    pub fn area(&self) -> Option<f64> {
        match self.shape {
            PeakShape::Seeded { amplitude, width } => Some(gaussian_area(amplitude, width)),
            PeakShape::Pending => None,
        }
    }

    /// The area under the curve between `lo` and `hi`
    pub fn area_between(&self, lo: f64, hi: f64) -> Option<f64> {
        let (amplitude, width) = match self.shape {
            PeakShape::Seeded { amplitude, width } => (amplitude, width),
            PeakShape::Pending => return None,
        };
        let scale = width * SQRT_2;
        let upper = libm::erf((hi - self.center) / scale);
        let lower = libm::erf((lo - self.center) / scale);
        Some(amplitude * width * (PI / 2.0).sqrt() * (upper - lower))
    }
}

impl fmt::Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.shape {
            PeakShape::Seeded { amplitude, width } => write!(
                f,
                "Peak({}, center={}, amplitude={}, width={})",
                self.id, self.center, amplitude, width
            ),
            PeakShape::Pending => write!(f, "Peak({}, center={}, pending)", self.id, self.center),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_density() {
        let peak = Peak::new(
            PeakId::new(0),
            50.0,
            PeakShape::Seeded {
                amplitude: 100.0,
                width: 5.0,
            },
        );
        assert_eq!(peak.density(50.0), 100.0);
        let half = peak.full_width_at_half_max().unwrap() / 2.0;
        assert!((peak.density(50.0 + half) - 50.0).abs() < 1e-9);
        assert!((peak.density(45.0) - peak.density(55.0)).abs() < 1e-12);

        let pending = Peak::new(PeakId::new(1), 50.0, PeakShape::Pending);
        assert_eq!(pending.density(50.0), 0.0);
        assert!(pending.area().is_none());
    }

    #[test]
    fn test_area() {
        let peak = Peak::new(
            PeakId::new(0),
            50.0,
            PeakShape::Seeded {
                amplitude: 2.0,
                width: 3.0,
            },
        );
        let expected = 2.0 * 3.0 * (2.0 * PI).sqrt();
        assert!((peak.area().unwrap() - expected).abs() < 1e-12);
        let windowed = peak.area_between(-1e3, 1e3).unwrap();
        assert!((windowed - expected).abs() < 1e-9);
        let half = peak.area_between(50.0, 1e3).unwrap();
        assert!((half - expected / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_display() {
        assert_eq!(PeakId::new(4).to_string(), "#4");
        let pending = Peak::new(PeakId::new(2), 1.5, PeakShape::Pending);
        assert_eq!(pending.to_string(), "Peak(#2, center=1.5, pending)");
    }
}
