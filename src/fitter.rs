//! Nonlinear least squares refinement of a Gaussian mixture.
//!
//! [`MixtureFitter`] minimizes the sum of squared residuals between a [`PeakSet`]'s
//! composite curve and a [`Signal`] with a damped Gauss-Newton (Levenberg-Marquardt)
//! iteration using the analytic Jacobian. Widths are fit on a log scale so they never
//! reach zero, and each trial step is only accepted if it lowers the residual.
//!
//! A constant offset can optionally be fit alongside the peaks. It is reported in the
//! [`FitDiagnostics`] and never folded into the peaks themselves.
use std::fmt;

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peak::PeakId;
use crate::peak_set::{PeakSet, DEFAULT_MIN_WIDTH};
use crate::signal::Signal;

/// All the ways a fit request can fail. A failed fit leaves the [`PeakSet`] unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("There are no peaks to fit")]
    NothingToFit,
    #[error("Peak {0} has not been estimated yet, estimate it before fitting")]
    UnseededPeak(PeakId),
    #[error("The fit diverged at iteration {iteration}: {reason}")]
    FitDiverged { iteration: usize, reason: String },
}

/// Hyperparameters for the Levenberg-Marquardt solver
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitConfig {
    /// The maximum number of iterations to attempt
    pub max_iter: usize,
    /// The relative reduction in the residual sum of squares below which the fit has converged
    pub ftol: f64,
    /// The relative parameter step size below which the fit has converged
    pub xtol: f64,
    /// The cosine between the residual and any Jacobian column below which the fit has converged
    pub gtol: f64,
    /// The starting damping factor
    pub initial_lambda: f64,
    /// The factor damping grows by when a step is rejected
    pub lambda_up: f64,
    /// The factor damping shrinks by when a step is accepted
    pub lambda_down: f64,
    /// The damping at which no further progress is possible
    pub max_lambda: f64,
    /// The narrowest width a peak may take
    pub min_width: f64,
    /// Fit one width shared by every peak instead of one width per peak
    pub shared_width: bool,
    /// Fit a constant baseline under the peaks, starting from the first sample's intensity
    pub fit_baseline: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iter: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-14,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            max_lambda: 1e12,
            min_width: DEFAULT_MIN_WIDTH,
            shared_width: false,
            fit_baseline: false,
        }
    }
}

impl FitConfig {
    /// The maximum number of iterations to attempt
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    pub fn gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    pub fn initial_lambda(mut self, initial_lambda: f64) -> Self {
        self.initial_lambda = initial_lambda;
        self
    }

    pub fn lambda_up(mut self, lambda_up: f64) -> Self {
        self.lambda_up = lambda_up;
        self
    }

    pub fn lambda_down(mut self, lambda_down: f64) -> Self {
        self.lambda_down = lambda_down;
        self
    }

    pub fn max_lambda(mut self, max_lambda: f64) -> Self {
        self.max_lambda = max_lambda;
        self
    }

    pub fn min_width(mut self, min_width: f64) -> Self {
        self.min_width = min_width;
        self
    }

    /// Fit one width shared by every peak
    pub fn shared_width(mut self, shared_width: bool) -> Self {
        self.shared_width = shared_width;
        self
    }

    pub fn fit_baseline(mut self, fit_baseline: bool) -> Self {
        self.fit_baseline = fit_baseline;
        self
    }
}

/// Why the solver stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Termination {
    /// The model reproduces the signal exactly
    ExactFit,
    /// The residual sum of squares stopped decreasing
    FunctionTolerance,
    /// The parameters stopped changing
    ParameterTolerance,
    /// The residual is orthogonal to every parameter direction
    GradientTolerance,
    /// No step, however small, lowers the residual
    DampingSaturated,
    /// The iteration cap was reached first
    MaxIterations,
}

impl Termination {
    pub fn is_converged(&self) -> bool {
        !matches!(self, Self::MaxIterations)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ExactFit => "exact fit",
            Self::FunctionTolerance => "small residual change",
            Self::ParameterTolerance => "small parameter change",
            Self::GradientTolerance => "small gradient",
            Self::DampingSaturated => "no further improvement possible",
            Self::MaxIterations => "maximum iterations reached",
        };
        f.write_str(text)
    }
}

/// One peak's parameters at the end of a fit
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakParameters {
    pub id: PeakId,
    pub amplitude: f64,
    pub center: f64,
    pub width: f64,
}

/// Describe a fit run's output
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitDiagnostics {
    /// Whether a convergence criterion was met within the iteration cap
    pub converged: bool,
    pub termination: Termination,
    /// The number of iterations run
    pub iterations: usize,
    /// The residual sum of squares at the end of the fit
    pub rss: f64,
    /// The residual sum of squares of the starting parameters
    pub initial_rss: f64,
    /// `1 - rss / tss`, clamped to `[0, 1]`
    pub score: f64,
    /// The fitted constant offset, if one was fit
    pub baseline: Option<f64>,
    /// Every peak's final parameters, in set order
    pub parameters: Vec<PeakParameters>,
}

impl fmt::Display for FitDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} iterations ({}), RSS {:.6e} -> {:.6e}, score {:.4}",
            if self.converged {
                "Converged"
            } else {
                "Did not converge"
            },
            self.iterations,
            self.termination,
            self.initial_rss,
            self.rss,
            self.score
        )?;
        if let Some(baseline) = self.baseline {
            write!(f, ", baseline {baseline:.6}")?;
        }
        Ok(())
    }
}

/// The packing of peak parameters into the solver's parameter vector.
///
/// Each peak owns `(amplitude, center, ln width)`, or `(amplitude, center)` followed
/// by a single trailing `ln width` when the width is shared. A fitted baseline
/// always takes the last slot.
#[derive(Debug, Clone, Copy)]
struct ParameterLayout {
    n_peaks: usize,
    shared_width: bool,
    baseline: bool,
}

impl ParameterLayout {
    fn stride(&self) -> usize {
        if self.shared_width {
            2
        } else {
            3
        }
    }

    fn peak_len(&self) -> usize {
        if self.shared_width {
            self.n_peaks * 2 + 1
        } else {
            self.n_peaks * 3
        }
    }

    fn len(&self) -> usize {
        self.peak_len() + usize::from(self.baseline)
    }

    fn baseline_index(&self) -> Option<usize> {
        self.baseline.then(|| self.peak_len())
    }

    fn log_width_index(&self, peak: usize) -> usize {
        if self.shared_width {
            self.n_peaks * 2
        } else {
            peak * 3 + 2
        }
    }

    fn pack(&self, params: &[(f64, f64, f64)], baseline: f64) -> DVector<f64> {
        let mut theta = DVector::zeros(self.len());
        for (i, (amplitude, center, _)) in params.iter().copied().enumerate() {
            theta[i * self.stride()] = amplitude;
            theta[i * self.stride() + 1] = center;
        }
        if self.shared_width {
            let mean_log_width = params.iter().map(|p| p.2.ln()).sum::<f64>() / self.n_peaks as f64;
            theta[self.log_width_index(0)] = mean_log_width;
        } else {
            for (i, (_, _, width)) in params.iter().copied().enumerate() {
                theta[self.log_width_index(i)] = width.ln();
            }
        }
        if let Some(index) = self.baseline_index() {
            theta[index] = baseline;
        }
        theta
    }

    fn unpack(&self, theta: &DVector<f64>) -> Vec<(f64, f64, f64)> {
        (0..self.n_peaks)
            .map(|i| {
                (
                    theta[i * self.stride()],
                    theta[i * self.stride() + 1],
                    theta[self.log_width_index(i)].exp(),
                )
            })
            .collect()
    }

    fn offset(&self, theta: &DVector<f64>) -> f64 {
        self.baseline_index().map(|i| theta[i]).unwrap_or_default()
    }
}

/// A signal paired with a parameter layout, able to evaluate residuals and the
/// model's Jacobian
struct MixtureModel<'a> {
    x: &'a [f64],
    y: &'a [f64],
    layout: ParameterLayout,
}

impl<'a> MixtureModel<'a> {
    fn predict(&self, theta: &DVector<f64>) -> DVector<f64> {
        let params = self.layout.unpack(theta);
        let offset = self.layout.offset(theta);
        DVector::from_iterator(
            self.x.len(),
            self.x.iter().map(|x| {
                offset
                    + params
                        .iter()
                        .map(|(a, c, w)| crate::peak::gaussian(*x, *a, *c, *w))
                        .sum::<f64>()
            }),
        )
    }

    fn residuals(&self, theta: &DVector<f64>) -> DVector<f64> {
        let mut r = DVector::from_column_slice(self.y);
        r -= self.predict(theta);
        r
    }

    /// The derivative of the model at each sample with respect to each parameter
    fn jacobian(&self, theta: &DVector<f64>) -> DMatrix<f64> {
        let params = self.layout.unpack(theta);
        let mut jac = DMatrix::zeros(self.x.len(), self.layout.len());
        for (row, x) in self.x.iter().copied().enumerate() {
            for (i, (amplitude, center, width)) in params.iter().copied().enumerate() {
                let delta = x - center;
                let w2 = width * width;
                let e = (-0.5 * delta * delta / w2).exp();
                let col = i * self.layout.stride();
                jac[(row, col)] = e;
                jac[(row, col + 1)] = amplitude * e * delta / w2;
                jac[(row, self.layout.log_width_index(i))] += amplitude * e * delta * delta / w2;
            }
            if let Some(index) = self.layout.baseline_index() {
                jac[(row, index)] = 1.0;
            }
        }
        jac
    }
}

fn sum_of_squares(r: &DVector<f64>) -> f64 {
    r.iter().map(|v| v * v).sum()
}

/// Fits the peaks of a [`PeakSet`] to a [`Signal`]
#[derive(Debug, Clone, Default)]
pub struct MixtureFitter {
    pub config: FitConfig,
}

impl MixtureFitter {
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    /// Refine every peak in `peaks` against `signal`, overwriting their parameters with
    /// the final iterate.
    ///
    /// Running out of iterations is not an error, the diagnostics report
    /// `converged = false` and the peaks still take the last iterate. If the
    /// parameters become non-finite, [`FitError::FitDiverged`] is returned and
    /// `peaks` is untouched.
    pub fn fit(&self, signal: &Signal, peaks: &mut PeakSet) -> Result<FitDiagnostics, FitError> {
        if peaks.is_empty() {
            return Err(FitError::NothingToFit);
        }
        let mut initial = Vec::with_capacity(peaks.len());
        for peak in peaks.iter() {
            match (peak.amplitude(), peak.width()) {
                (Some(amplitude), Some(width)) => initial.push((amplitude, peak.center(), width)),
                _ => return Err(FitError::UnseededPeak(peak.id())),
            }
        }

        let ids: Vec<PeakId> = peaks.ids().collect();
        let (params, mut diagnostics) = self.solve(signal, &initial)?;
        let params: Vec<(f64, f64, f64)> = params
            .into_iter()
            .map(|(amplitude, center, width)| (amplitude.max(0.0), center, width))
            .collect();

        peaks.overwrite_parameters(&params);
        diagnostics.parameters = ids
            .into_iter()
            .zip(params.iter().copied())
            .map(|(id, (amplitude, center, width))| PeakParameters {
                id,
                amplitude,
                center,
                width,
            })
            .collect();
        debug!("{diagnostics}");
        Ok(diagnostics)
    }

    /// Run the solver from `initial` `(amplitude, center, width)` triples, returning the
    /// final triples and diagnostics without per-peak parameters.
    fn solve(
        &self,
        signal: &Signal,
        initial: &[(f64, f64, f64)],
    ) -> Result<(Vec<(f64, f64, f64)>, FitDiagnostics), FitError> {
        let config = &self.config;
        let layout = ParameterLayout {
            n_peaks: initial.len(),
            shared_width: config.shared_width,
            baseline: config.fit_baseline,
        };
        let model = MixtureModel {
            x: signal.x(),
            y: signal.y(),
            layout,
        };
        let min_log_width = config.min_width.ln();

        let mut theta = layout.pack(initial, signal.y()[0]);
        if theta.iter().any(|v| !v.is_finite()) {
            return Err(FitError::FitDiverged {
                iteration: 0,
                reason: "the starting parameters are not finite".into(),
            });
        }
        let mut residuals = model.residuals(&theta);
        let mut cost = sum_of_squares(&residuals);
        if !cost.is_finite() {
            return Err(FitError::FitDiverged {
                iteration: 0,
                reason: format!("the starting residual sum of squares is {cost}"),
            });
        }
        let initial_rss = cost;

        let mut lambda = config.initial_lambda;
        let mut iterations = 0;
        let mut termination = Termination::MaxIterations;

        'outer: while iterations < config.max_iter {
            if cost == 0.0 {
                termination = Termination::ExactFit;
                break;
            }
            iterations += 1;

            let jac = model.jacobian(&theta);
            let gradient = jac.tr_mul(&residuals);
            let normal = jac.tr_mul(&jac);

            let residual_norm = cost.sqrt();
            let max_cosine = (0..layout.len())
                .map(|j| {
                    let column_norm = normal[(j, j)].sqrt();
                    if column_norm > 0.0 {
                        gradient[j].abs() / (column_norm * residual_norm)
                    } else {
                        0.0
                    }
                })
                .fold(0.0, f64::max);
            if max_cosine <= config.gtol {
                termination = Termination::GradientTolerance;
                break;
            }

            let max_diagonal = normal.diagonal().iter().copied().fold(0.0, f64::max);
            let diagonal_floor = (max_diagonal * 1e-12).max(f64::MIN_POSITIVE);

            loop {
                let mut damped = normal.clone();
                for j in 0..layout.len() {
                    damped[(j, j)] += lambda * normal[(j, j)].max(diagonal_floor);
                }

                let step = damped.cholesky().map(|chol| chol.solve(&gradient));
                let trial = step.as_ref().and_then(|step| {
                    let candidate = &theta + step;
                    let valid = candidate.iter().all(|v| v.is_finite())
                        && (0..layout.n_peaks)
                            .all(|i| candidate[layout.log_width_index(i)] > min_log_width);
                    if !valid {
                        return None;
                    }
                    let r = model.residuals(&candidate);
                    let c = sum_of_squares(&r);
                    (c.is_finite() && c < cost).then_some((candidate, r, c))
                });

                match trial {
                    Some((candidate, r, c)) => {
                        let relative_reduction = (cost - c) / cost;
                        let step_norm = step.map(|s| s.norm()).unwrap_or_default();
                        let relative_step = step_norm / (theta.norm() + config.xtol);
                        trace!(
                            "{iterations}: RSS = {c:0.6e}, lambda = {lambda:0.3e}, step = {step_norm:0.3e}"
                        );

                        theta = candidate;
                        residuals = r;
                        cost = c;
                        lambda = (lambda * config.lambda_down).max(f64::EPSILON);

                        if relative_reduction <= config.ftol {
                            termination = Termination::FunctionTolerance;
                            break 'outer;
                        }
                        if relative_step <= config.xtol {
                            termination = Termination::ParameterTolerance;
                            break 'outer;
                        }
                        break;
                    }
                    None => {
                        lambda *= config.lambda_up;
                        trace!("{iterations}: Rejected step, lambda = {lambda:0.3e}");
                        if lambda > config.max_lambda {
                            termination = Termination::DampingSaturated;
                            break 'outer;
                        }
                    }
                }
            }
        }

        let params = layout.unpack(&theta);
        let baseline = layout.baseline_index().map(|i| theta[i]);
        if params
            .iter()
            .any(|(a, c, w)| !a.is_finite() || !c.is_finite() || !w.is_finite())
            || baseline.is_some_and(|b| !b.is_finite())
        {
            return Err(FitError::FitDiverged {
                iteration: iterations,
                reason: "the parameters are no longer finite".into(),
            });
        }

        let y = signal.y();
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let tss: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
        let score = (1.0 - cost / if tss > 0.0 { tss } else { 1.0 }).clamp(0.0, 1.0);

        let diagnostics = FitDiagnostics {
            converged: termination.is_converged(),
            termination,
            iterations,
            rss: cost,
            initial_rss,
            score,
            baseline,
            parameters: Vec::new(),
        };
        Ok((params, diagnostics))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_data::{axis, mixture_at, mixture_signal, noisy_mixture_signal};
    use rstest::rstest;

    const TRUTH: [(f64, f64, f64); 3] = [(100.0, 30.0, 4.0), (60.0, 55.0, 6.0), (80.0, 70.0, 3.0)];

    fn perturbed() -> PeakSet {
        let mut peaks = PeakSet::new();
        peaks.add_seeded(31.5, 115.0, 3.4).unwrap();
        peaks.add_seeded(53.0, 50.0, 7.0).unwrap();
        peaks.add_seeded(71.0, 92.0, 3.5).unwrap();
        peaks
    }

    fn assert_recovered(peaks: &PeakSet, truth: &[(f64, f64, f64)], tolerance: f64) {
        for (peak, (amplitude, center, width)) in peaks.iter().zip(truth.iter()) {
            assert!(
                (peak.amplitude().unwrap() - amplitude).abs() / amplitude < tolerance,
                "{peak}"
            );
            assert!((peak.center() - center).abs() < tolerance * width, "{peak}");
            assert!((peak.width().unwrap() - width).abs() / width < tolerance, "{peak}");
        }
    }

    #[test_log::test]
    fn test_round_trip() {
        let signal = mixture_signal(&TRUTH);
        let mut peaks = perturbed();
        let diagnostics = MixtureFitter::default().fit(&signal, &mut peaks).unwrap();
        assert!(diagnostics.converged, "{diagnostics}");
        assert!(diagnostics.rss < diagnostics.initial_rss);
        assert!(diagnostics.rss < 1e-12, "{diagnostics}");
        assert!(diagnostics.score > 0.999_999);
        assert_recovered(&peaks, &TRUTH, 1e-5);
        assert_eq!(diagnostics.parameters.len(), 3);
        assert_eq!(diagnostics.parameters[0].id, peaks.iter().next().unwrap().id());
        assert_eq!(diagnostics.baseline, None);
    }

    /// Offset every truth peak by 20% of its amplitude and width and by a fifth of a width
    /// in center, in the direction given by the sign of `amplitude`, `center` and `width`
    #[rstest]
    #[case(1.0, 1.0, 1.0)]
    #[case(-1.0, -1.0, -1.0)]
    #[case(1.0, -1.0, 1.0)]
    #[case(-1.0, 1.0, -1.0)]
    #[case(1.0, 1.0, -1.0)]
    #[case(-1.0, -1.0, 1.0)]
    #[case(1.0, -1.0, -1.0)]
    #[case(-1.0, 1.0, 1.0)]
    fn test_round_trip_from_offset_start(
        #[case] amplitude: f64,
        #[case] center: f64,
        #[case] width: f64,
    ) {
        let signal = mixture_signal(&TRUTH);
        let mut peaks = PeakSet::new();
        for (a, c, w) in TRUTH {
            peaks
                .add_seeded(c + center * 0.2 * w, a * (1.0 + amplitude * 0.2), w * (1.0 + width * 0.2))
                .unwrap();
        }
        let diagnostics = MixtureFitter::default().fit(&signal, &mut peaks).unwrap();
        assert!(diagnostics.converged, "{diagnostics}");
        assert!(diagnostics.rss < 1e-10, "{diagnostics}");
        assert_recovered(&peaks, &TRUTH, 1e-4);
    }

    #[test_log::test]
    fn test_fit_baseline() {
        let truth = [(100.0, 30.0, 4.0), (60.0, 65.0, 3.0)];
        let x = axis();
        let y = x.iter().map(|x| 10.0 + mixture_at(*x, &truth)).collect();
        let signal = Signal::new(x, y).unwrap();

        let mut peaks = PeakSet::new();
        peaks.add_seeded(31.0, 95.0, 4.5).unwrap();
        peaks.add_seeded(64.5, 65.0, 3.5).unwrap();
        let diagnostics = MixtureFitter::new(FitConfig::default().fit_baseline(true))
            .fit(&signal, &mut peaks)
            .unwrap();
        assert!(diagnostics.converged, "{diagnostics}");
        assert!(diagnostics.rss < 1e-10, "{diagnostics}");
        let baseline = diagnostics.baseline.unwrap();
        assert!((baseline - 10.0).abs() < 1e-4, "{baseline}");
        assert_recovered(&peaks, &truth, 1e-5);
        assert!(diagnostics.to_string().contains(", baseline "));

        let composite = peaks.composite_at(30.0);
        assert!((composite - mixture_at(30.0, &truth)).abs() < 1e-3, "{composite}");
    }

    #[test_log::test]
    fn test_fit_is_idempotent() {
        let signal = mixture_signal(&TRUTH);
        let mut peaks = perturbed();
        let fitter = MixtureFitter::default();
        let first = fitter.fit(&signal, &mut peaks).unwrap();
        let before = peaks.snapshot();
        let second = fitter.fit(&signal, &mut peaks).unwrap();
        assert!(first.converged && second.converged, "{first} / {second}");
        for (a, b) in before.peaks().iter().zip(peaks.iter()) {
            assert!((a.center() - b.center()).abs() < 1e-8);
            assert!((a.amplitude().unwrap() - b.amplitude().unwrap()).abs() < 1e-8);
            assert!((a.width().unwrap() - b.width().unwrap()).abs() < 1e-8);
        }
    }

    #[test]
    fn test_nothing_to_fit() {
        let signal = mixture_signal(&TRUTH);
        let mut peaks = PeakSet::new();
        assert_eq!(
            MixtureFitter::default().fit(&signal, &mut peaks).unwrap_err(),
            FitError::NothingToFit
        );
    }

    #[test]
    fn test_unseeded_peak() {
        let signal = mixture_signal(&TRUTH);
        let mut peaks = perturbed();
        let pending = peaks.add_pending(10.0).unwrap();
        let before = peaks.snapshot();
        assert_eq!(
            MixtureFitter::default().fit(&signal, &mut peaks).unwrap_err(),
            FitError::UnseededPeak(pending)
        );
        assert_eq!(peaks.snapshot(), before);
    }

    #[test]
    fn test_diverged_leaves_peaks_unchanged() {
        let signal = mixture_signal(&TRUTH);
        let mut peaks = PeakSet::new();
        peaks.add_seeded(30.0, 1e200, 4.0).unwrap();
        let before = peaks.snapshot();
        let err = MixtureFitter::default().fit(&signal, &mut peaks).unwrap_err();
        assert!(matches!(err, FitError::FitDiverged { .. }), "{err}");
        assert_eq!(peaks.snapshot(), before);
    }

    #[test_log::test]
    fn test_soft_non_convergence() {
        let signal = mixture_signal(&TRUTH);
        let mut peaks = perturbed();
        let before = peaks.snapshot();
        let diagnostics = MixtureFitter::new(FitConfig::default().max_iter(1))
            .fit(&signal, &mut peaks)
            .unwrap();
        assert!(!diagnostics.converged);
        assert_eq!(diagnostics.termination, Termination::MaxIterations);
        assert_eq!(diagnostics.iterations, 1);
        assert!(diagnostics.rss < diagnostics.initial_rss);
        assert_ne!(peaks.snapshot(), before);
    }

    #[test_log::test]
    fn test_shared_width() {
        let truth = [(100.0, 35.0, 4.0), (70.0, 60.0, 4.0)];
        let signal = mixture_signal(&truth);
        let mut peaks = PeakSet::new();
        peaks.add_seeded(34.0, 90.0, 5.0).unwrap();
        peaks.add_seeded(61.0, 80.0, 5.0).unwrap();
        let diagnostics = MixtureFitter::new(FitConfig::default().shared_width(true))
            .fit(&signal, &mut peaks)
            .unwrap();
        assert!(diagnostics.converged, "{diagnostics}");
        assert_recovered(&peaks, &truth, 1e-5);
        let widths: Vec<f64> = peaks.iter().filter_map(|p| p.width()).collect();
        assert_eq!(widths[0], widths[1]);
    }

    #[test_log::test]
    fn test_noisy_fit() {
        let signal = noisy_mixture_signal(&TRUTH, 1.0);
        let mut peaks = perturbed();
        let diagnostics = MixtureFitter::default().fit(&signal, &mut peaks).unwrap();
        assert!(diagnostics.converged, "{diagnostics}");
        assert!(diagnostics.score > 0.99);
        assert_recovered(&peaks, &TRUTH, 0.05);
        let mean_square = diagnostics.rss / signal.len() as f64;
        assert!(mean_square < 2.0, "{mean_square}");
        let max_deviation: f64 = signal
            .x()
            .iter()
            .map(|x| (mixture_at(*x, &TRUTH) - peaks.composite_at(*x)).abs())
            .fold(0.0, f64::max);
        assert!(max_deviation < 2.0, "{max_deviation}");
    }
}
