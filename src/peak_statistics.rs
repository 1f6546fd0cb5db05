use num_traits::{Float, FromPrimitive};

/// The ratio between a Gaussian's full width at half max and its standard deviation,
/// $`2\sqrt{2\ln 2}`$
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;

pub fn _isclose<T>(x: T, y: T, rtol: T, atol: T) -> bool
where
    T: Float,
{
    (x - y).abs() <= (atol + rtol * y.abs())
}

pub fn isclose<T>(x: T, y: T) -> bool
where
    T: Float + FromPrimitive,
{
    _isclose(
        x,
        y,
        T::from_f64(1e-5).unwrap_or_else(T::epsilon),
        T::from_f64(1e-8).unwrap_or_else(T::epsilon),
    )
}

pub fn aboutzero<T>(x: T) -> bool
where
    T: Float + FromPrimitive,
{
    isclose(x, T::zero())
}

/// Convert a full width at half max into a Gaussian standard deviation
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / FWHM_PER_SIGMA
}

/// Convert a Gaussian standard deviation into a full width at half max
pub fn sigma_to_fwhm(sigma: f64) -> f64 {
    sigma * FWHM_PER_SIGMA
}

pub fn minmax<T: Float>(values: &[T]) -> (T, T) {
    let mut max = -T::infinity();
    let mut min = T::infinity();

    for v in values.iter() {
        if *v > max {
            max = *v;
        }
        if *v < min {
            min = *v
        }
    }
    (min, max)
}

/// Linearly interpolated percentile of unsorted `values`, with `percent` in `[0, 1]`.
///
/// Returns zero for an empty slice.
pub fn percentile<T: Float>(values: &[T], percent: f64) -> T {
    if values.is_empty() {
        return T::zero();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let k = (sorted.len() - 1) as f64 * percent.clamp(0.0, 1.0);
    let f = k.floor();
    let c = k.ceil();
    if f == c {
        return sorted[k as usize];
    }
    let d0 = sorted[f as usize] * T::from(c - k).unwrap_or_else(T::zero);
    let d1 = sorted[c as usize] * T::from(k - f).unwrap_or_else(T::zero);
    d0 + d1
}

/// Root mean square of the element-wise difference between two series
pub fn rms_difference(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let total: f64 = a.iter().zip(b.iter()).map(|(a, b)| (a - b).powi(2)).sum();
    (total / n as f64).sqrt()
}

/// Where the walk away from a peak's apex stopped
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HalfMaxCrossing {
    /// The signal dropped below half height at this interpolated coordinate
    Crossed(f64),
    /// The signal started rising again, or ran out, at this coordinate before
    /// reaching half height
    Truncated(f64),
}

impl HalfMaxCrossing {
    pub fn coordinate(&self) -> f64 {
        match self {
            Self::Crossed(x) | Self::Truncated(x) => *x,
        }
    }

    pub fn is_crossed(&self) -> bool {
        matches!(self, Self::Crossed(_))
    }
}

#[derive(Default, Debug, Clone)]
pub struct WidthFit {
    pub right_width: f64,
    pub left_width: f64,
    pub full_width_at_half_max: f64,
}

impl WidthFit {
    /// The Gaussian-equivalent standard deviation of this width
    pub fn sigma(&self) -> f64 {
        fwhm_to_sigma(self.full_width_at_half_max)
    }
}

fn interpolate_crossing(x1: f64, y1: f64, x2: f64, y2: f64, level: f64) -> f64 {
    if aboutzero(y2 - y1) {
        x1
    } else {
        x1 + (x2 - x1) * ((level - y1) / (y2 - y1))
    }
}

/// Walk left from `data_index` until the signal drops to `level`
pub fn fit_rising_side_width(x: &[f64], y: &[f64], data_index: usize, level: f64) -> HalfMaxCrossing {
    let mut last_y = y[data_index];
    for index in (0..data_index).rev() {
        let current = y[index];
        if current <= level {
            return HalfMaxCrossing::Crossed(interpolate_crossing(
                x[index],
                current,
                x[index + 1],
                y[index + 1],
                level,
            ));
        }
        if current > last_y {
            return HalfMaxCrossing::Truncated(x[index + 1]);
        }
        last_y = current;
    }
    HalfMaxCrossing::Truncated(x[0])
}

/// Walk right from `data_index` until the signal drops to `level`
pub fn fit_falling_side_width(x: &[f64], y: &[f64], data_index: usize, level: f64) -> HalfMaxCrossing {
    let n = y.len();
    let mut last_y = y[data_index];
    for index in (data_index + 1)..n {
        let current = y[index];
        if current <= level {
            return HalfMaxCrossing::Crossed(interpolate_crossing(
                x[index - 1],
                y[index - 1],
                x[index],
                current,
                level,
            ));
        }
        if current > last_y {
            return HalfMaxCrossing::Truncated(x[index - 1]);
        }
        last_y = current;
    }
    HalfMaxCrossing::Truncated(x[n - 1])
}

/// Measure the full width at half max of the peak whose apex is at `data_index`,
/// with the height measured above `baseline`.
///
/// When only one side reaches half height the peak is assumed symmetric and that side
/// is mirrored. When neither does, the narrower truncated side is mirrored, which
/// underestimates the width of heavily overlapped peaks rather than merging them.
pub fn full_width_at_half_max(x: &[f64], y: &[f64], data_index: usize, baseline: f64) -> WidthFit {
    let mut fit = WidthFit::default();
    if data_index >= x.len() || x.len() != y.len() {
        return fit;
    }
    let apex = x[data_index];
    let height = y[data_index] - baseline;
    if height <= 0.0 || aboutzero(height) {
        return fit;
    }
    let level = baseline + height / 2.0;

    let rising = fit_rising_side_width(x, y, data_index, level);
    let falling = fit_falling_side_width(x, y, data_index, level);
    fit.left_width = (apex - rising.coordinate()).abs();
    fit.right_width = (falling.coordinate() - apex).abs();

    fit.full_width_at_half_max = match (rising.is_crossed(), falling.is_crossed()) {
        (true, true) => fit.left_width + fit.right_width,
        (true, false) => 2.0 * fit.left_width,
        (false, true) => 2.0 * fit.right_width,
        (false, false) => 2.0 * fit.left_width.min(fit.right_width),
    };
    fit
}

#[cfg(test)]
mod test {
    use super::*;

    fn gaussian(x: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
        amplitude * (-(x - center).powi(2) / (2.0 * sigma.powi(2))).exp()
    }

    #[test]
    fn test_percentile() {
        let values = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 0.5), 3.0);
        assert_eq!(percentile(&values, 1.0), 5.0);
        assert!((percentile(&values, 0.125) - 1.5).abs() < 1e-12);
        assert_eq!(percentile::<f64>(&[], 0.5), 0.0);
    }

    #[test]
    fn test_fwhm_of_gaussian() {
        let x: Vec<f64> = (0..=400).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = x.iter().map(|x| gaussian(*x, 100.0, 50.0, 5.0)).collect();
        let fit = full_width_at_half_max(&x, &y, 200, 0.0);
        let expected = sigma_to_fwhm(5.0);
        assert!(
            (fit.full_width_at_half_max - expected).abs() < 0.05,
            "{} != {expected}",
            fit.full_width_at_half_max
        );
        assert!((fit.sigma() - 5.0).abs() < 0.05);
        assert!((fit.left_width - fit.right_width).abs() < 1e-6);
    }

    #[test]
    fn test_fwhm_mirrors_truncated_side() {
        let x: Vec<f64> = (0..=400).map(|i| i as f64 * 0.25).collect();
        // The left side of the first peak runs into the array's edge before half height
        let y: Vec<f64> = x.iter().map(|x| gaussian(*x, 100.0, 2.0, 4.0)).collect();
        let fit = full_width_at_half_max(&x, &y, 8, 0.0);
        assert!((fit.sigma() - 4.0).abs() < 0.05);
    }

    #[test]
    fn test_fwhm_stops_at_valley() {
        let x: Vec<f64> = (0..=400).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|x| gaussian(*x, 100.0, 40.0, 4.0) + gaussian(*x, 100.0, 52.0, 4.0))
            .collect();
        let apex = 161;
        let rising = fit_rising_side_width(&x, &y, apex, 50.0);
        let falling = fit_falling_side_width(&x, &y, apex, 50.0);
        assert!(rising.is_crossed());
        assert!(!falling.is_crossed());
        assert!(falling.coordinate() > 40.0 && falling.coordinate() < 52.0);
    }

    #[test]
    fn test_minmax() {
        assert_eq!(minmax(&[3.0, -1.0, 7.5]), (-1.0, 7.5));
    }
}
