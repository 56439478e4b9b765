//! Eigen-subspace denoising by generalized eigenvalue decomposition.
//!
//! ```text
//! conditioned X [C, N]
//!   ├─ bandpass signal_band                     → S = cov(X_sig)
//!   ├─ filter noise_band, first difference ΔX   → R = cov(X_noise) + w·cov(ΔX)  (+ ridge)
//!   ├─ S v = λ R v   via  R^{-1/2} S R^{-1/2}   → (λ_i, w_i) sorted λ desc
//!   ├─ threshold     λ > 1  |  knee             → keep k
//!   └─ X_clean = A_k · W_kᵀ · X                 A = R W,  A Wᵀ = I
//! ```
//!
//! λ is the ratio of projected signal power to projected noise power along
//! the spatial filter `w`. Covariances are not normalised per channel so
//! that λ keeps that meaning.
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, ArrayView2};
use serde::Serialize;

use crate::config::{AnalysisConfig, ThresholdStrategy};
use crate::error::{Error, Result, Stage};
use crate::filter::SignalFilter;
use crate::stats::covariance;

/// Largest accepted condition number of the (regularised) noise covariance.
pub const MAX_CONDITION: f64 = 1e12;

/// Ridge strengths tried in order, as multiples of `tr(R) / C`.
const RIDGE_STEPS: [f64; 4] = [1e-9, 1e-6, 1e-3, 1e-1];

/// Minimum normalised depth below the chord for a point to count as a knee.
const KNEE_EPS: f64 = 1e-9;

// ── Covariances ──────────────────────────────────────────────────────────────

/// Signal and noise covariance of the same conditioned matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariancePair {
    pub signal: Array2<f64>,
    pub noise: Array2<f64>,
}

impl CovariancePair {
    pub fn estimate(
        data: ArrayView2<'_, f64>,
        sfreq: f64,
        cfg: &AnalysisConfig,
        filter: &dyn SignalFilter,
    ) -> Self {
        let mut signal = data.to_owned();
        filter.band(&mut signal, sfreq, cfg.signal_band);

        let mut high = data.to_owned();
        filter.band(&mut high, sfreq, cfg.noise_band);
        let mut noise = covariance(high.view());
        if cfg.noise_derivative_weight > 0.0 {
            let diff = first_difference(data);
            noise.scaled_add(cfg.noise_derivative_weight, &covariance(diff.view()));
        }

        Self { signal: covariance(signal.view()), noise }
    }
}

/// `x[t+1] − x[t]` per row, with the last difference repeated so the length
/// stays `N`.
pub fn first_difference(data: ArrayView2<'_, f64>) -> Array2<f64> {
    let (n_ch, n_t) = data.dim();
    let mut out = Array2::zeros((n_ch, n_t));
    if n_t < 2 {
        return out;
    }
    for (mut o, x) in out.rows_mut().into_iter().zip(data.rows()) {
        for t in 0..n_t - 1 {
            o[t] = x[t + 1] - x[t];
        }
        o[n_t - 1] = o[n_t - 2];
    }
    out
}

// ── Regularisation ───────────────────────────────────────────────────────────

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

fn condition_number(eig: &SymmetricEigen<f64, nalgebra::Dyn>) -> Option<f64> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &l in eig.eigenvalues.iter() {
        if !l.is_finite() {
            return None;
        }
        min = min.min(l);
        max = max.max(l);
    }
    (min > 0.0).then(|| max / min)
}

/// Noise covariance, ridge-regularised until positive definite and
/// well conditioned, together with its eigendecomposition.
struct Whitener {
    noise: DMatrix<f64>,
    inv_sqrt: DMatrix<f64>,
    ridge: f64,
}

fn whitener(noise: &Array2<f64>) -> Result<Whitener> {
    let n = noise.nrows();
    let base = to_dmatrix(noise);
    let scale = noise.diag().sum() / n as f64;

    let attempt = |ridge: f64| -> Option<Whitener> {
        let mut r = base.clone();
        if ridge > 0.0 {
            for i in 0..n {
                r[(i, i)] += ridge;
            }
        }
        let eig = SymmetricEigen::new(r.clone());
        let cond = condition_number(&eig)?;
        if cond > MAX_CONDITION {
            return None;
        }
        let d = DMatrix::from_diagonal(&eig.eigenvalues.map(|l| 1.0 / l.sqrt()));
        let inv_sqrt = &eig.eigenvectors * d * eig.eigenvectors.transpose();
        Some(Whitener { noise: r, inv_sqrt, ridge })
    };

    if let Some(w) = attempt(0.0) {
        return Ok(w);
    }
    if scale.is_finite() && scale > 0.0 {
        for alpha in RIDGE_STEPS {
            if let Some(w) = attempt(alpha * scale) {
                log::warn!(
                    "[GEVD] noise covariance ill-conditioned; ridge {:.3e} (α = {alpha:e}) applied",
                    w.ridge
                );
                return Ok(w);
            }
        }
    }
    Err(Error::numerical(
        Stage::Eigendecomposition,
        format!("noise covariance could not be regularised below condition number {MAX_CONDITION:e}"),
    ))
}

// ── Generalised eigensystem ──────────────────────────────────────────────────

/// Generalised eigenpairs sorted by eigenvalue, descending.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenSystem {
    /// λ_i, descending.
    pub eigenvalues: Vec<f64>,
    /// Spatial filters `W` `[C, C]`, column `i` pairs with λ_i.
    /// `Wᵀ R W = I`.
    pub filters: Array2<f64>,
    /// Spatial patterns `A = R W` `[C, C]`; `A Wᵀ = I`.
    pub patterns: Array2<f64>,
    /// Ridge added to the noise covariance diagonal (0 if none).
    pub ridge: f64,
}

impl EigenSystem {
    /// Solve `S v = λ R v`.
    pub fn solve(pair: &CovariancePair) -> Result<Self> {
        let c = pair.signal.nrows();
        if c == 0 || pair.noise.dim() != (c, c) || pair.signal.ncols() != c {
            return Err(Error::numerical(
                Stage::Covariance,
                format!(
                    "covariance shapes {:?} / {:?} do not match",
                    pair.signal.dim(),
                    pair.noise.dim()
                ),
            ));
        }
        if pair.signal.iter().chain(pair.noise.iter()).any(|v| !v.is_finite()) {
            return Err(Error::numerical(Stage::Covariance, "non-finite covariance entry"));
        }

        let w = whitener(&pair.noise)?;
        let s = to_dmatrix(&pair.signal);
        let m = &w.inv_sqrt * s * &w.inv_sqrt;
        let m = (&m + m.transpose()) * 0.5;
        let eig = SymmetricEigen::new(m);

        let mut order: Vec<usize> = (0..c).collect();
        order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

        let eigenvalues: Vec<f64> = order.iter().map(|&i| eig.eigenvalues[i]).collect();
        if eigenvalues.iter().any(|l| !l.is_finite()) {
            return Err(Error::numerical(Stage::Eigendecomposition, "non-finite eigenvalue"));
        }
        let y = DMatrix::from_fn(c, c, |r, k| eig.eigenvectors[(r, order[k])]);
        let filters = &w.inv_sqrt * y;
        let patterns = &w.noise * &filters;

        Ok(Self {
            eigenvalues,
            filters: to_array2(&filters),
            patterns: to_array2(&patterns),
            ridge: w.ridge,
        })
    }

    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }

    /// Project `data` onto the first `keep` components and back.
    pub fn reconstruct(&self, data: ArrayView2<'_, f64>, keep: usize) -> Array2<f64> {
        let keep = keep.min(self.len());
        let w_k = self.filters.slice(ndarray::s![.., ..keep]);
        let a_k = self.patterns.slice(ndarray::s![.., ..keep]);
        a_k.dot(&w_k.t().dot(&data))
    }

    /// Share (%) of back-projected component energy carried by the
    /// components after the first `keep`.
    pub fn removed_power_pct(&self, data: ArrayView2<'_, f64>, keep: usize) -> f64 {
        let sources = self.filters.t().dot(&data);
        let energy: Vec<f64> = (0..self.len())
            .map(|i| {
                let s = sources.row(i);
                let a = self.patterns.column(i);
                s.dot(&s) * a.dot(&a)
            })
            .collect();
        let total: f64 = energy.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        100.0 * energy.iter().skip(keep).sum::<f64>() / total
    }
}

// ── Thresholding ─────────────────────────────────────────────────────────────

/// Number of leading components whose eigenvalue exceeds 1.
pub fn count_above_one(eigenvalues: &[f64]) -> usize {
    eigenvalues.iter().take_while(|&&l| l > 1.0).count()
}

/// Knee of a descending eigenvalue curve: index of the point furthest below
/// the chord joining first and last eigenvalues, after normalising both axes
/// to `[0, 1]`. `None` if the curve is too short, flat, or never dips below
/// the chord.
pub fn knee_index(eigenvalues: &[f64]) -> Option<usize> {
    let n = eigenvalues.len();
    if n < 3 {
        return None;
    }
    let (first, last) = (eigenvalues[0], eigenvalues[n - 1]);
    let span = first - last;
    if !(span > 0.0) {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, &l) in eigenvalues.iter().enumerate() {
        let x = i as f64 / (n - 1) as f64;
        let y = (l - last) / span;
        let below = (1.0 - x) - y;
        if below > KNEE_EPS && best.map_or(true, |(_, d)| below > d) {
            best = Some((i, below));
        }
    }
    best.map(|(i, _)| i)
}

/// Number of leading components to keep under `strategy`.
pub fn select_kept(eigenvalues: &[f64], strategy: ThresholdStrategy) -> usize {
    match strategy {
        ThresholdStrategy::FixedOne => count_above_one(eigenvalues),
        ThresholdStrategy::KneeDetection => match knee_index(eigenvalues) {
            Some(k) => k + 1,
            None => {
                log::debug!("[GEVD] no knee in eigenvalue curve; using λ > 1");
                count_above_one(eigenvalues)
            }
        },
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Summary of one eigen-subspace run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EigenReport {
    pub eigenvalues: Vec<f64>,
    pub kept: usize,
    pub discarded: usize,
    pub strategy: ThresholdStrategy,
    pub ridge: f64,
    pub removed_power_pct: f64,
}

/// Run the eigen-subspace pipeline on conditioned data. `checkpoint` is
/// called at each stage boundary and may abort the run.
pub fn denoise(
    data: ArrayView2<'_, f64>,
    sfreq: f64,
    cfg: &AnalysisConfig,
    filter: &dyn SignalFilter,
    checkpoint: &mut dyn FnMut(Stage) -> Result<()>,
) -> Result<(Array2<f64>, EigenReport)> {
    let pair = CovariancePair::estimate(data, sfreq, cfg, filter);
    log::debug!(
        "[GEVD] covariances: tr(S) = {:.4e}, tr(R) = {:.4e}",
        pair.signal.diag().sum(),
        pair.noise.diag().sum()
    );
    checkpoint(Stage::Covariance)?;

    let system = EigenSystem::solve(&pair)?;
    checkpoint(Stage::Eigendecomposition)?;

    let strategy = cfg.eigenvalue_threshold_strategy;
    let kept = select_kept(&system.eigenvalues, strategy);
    let discarded = system.len() - kept;
    log::info!(
        "[GEVD] λ = [{}] → keeping {kept}/{} ({strategy:?})",
        system
            .eigenvalues
            .iter()
            .map(|l| format!("{l:.3}"))
            .collect::<Vec<_>>()
            .join(", "),
        system.len()
    );
    if kept == 0 {
        return Err(Error::numerical(
            Stage::Thresholding,
            format!(
                "no component passed the threshold (largest λ = {:.3}); the output would be empty",
                system.eigenvalues.first().copied().unwrap_or(0.0)
            ),
        ));
    }
    checkpoint(Stage::Thresholding)?;

    let (cleaned, removed_power_pct) = if discarded == 0 {
        (data.to_owned(), 0.0)
    } else {
        let pct = system.removed_power_pct(data, kept);
        log::info!("[GEVD] removed {pct:.1}% of component power");
        (system.reconstruct(data, kept), pct)
    };
    checkpoint(Stage::SubspaceReconstruction)?;

    let report = EigenReport {
        eigenvalues: system.eigenvalues,
        kept,
        discarded,
        strategy,
        ridge: system.ridge,
        removed_power_pct,
    };
    Ok((cleaned, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn diagonal_pair_gives_ratio_eigenvalues() {
        let pair = CovariancePair {
            signal: array![[4.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 9.0]],
            noise: array![[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 3.0]],
        };
        let sys = EigenSystem::solve(&pair).unwrap();
        approx::assert_abs_diff_eq!(sys.eigenvalues[0], 4.0, epsilon = 1e-10);
        approx::assert_abs_diff_eq!(sys.eigenvalues[1], 3.0, epsilon = 1e-10);
        approx::assert_abs_diff_eq!(sys.eigenvalues[2], 0.5, epsilon = 1e-10);
        assert_eq!(sys.ridge, 0.0);
    }

    #[test]
    fn patterns_invert_filters() {
        let pair = CovariancePair {
            signal: array![[2.0, 0.5], [0.5, 1.0]],
            noise: array![[1.0, 0.2], [0.2, 0.5]],
        };
        let sys = EigenSystem::solve(&pair).unwrap();
        let id = sys.patterns.dot(&sys.filters.t());
        for ((i, j), &v) in id.indexed_iter() {
            let want = if i == j { 1.0 } else { 0.0 };
            approx::assert_abs_diff_eq!(v, want, epsilon = 1e-10);
        }
        // S w = λ R w for the leading pair.
        let w = sys.filters.column(0);
        let lhs = pair.signal.dot(&w);
        let rhs = pair.noise.dot(&w) * sys.eigenvalues[0];
        for (a, b) in lhs.iter().zip(rhs.iter()) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn singular_noise_is_regularised() {
        let pair = CovariancePair {
            signal: array![[1.0, 0.0], [0.0, 1.0]],
            noise: array![[1.0, 1.0], [1.0, 1.0]],
        };
        let sys = EigenSystem::solve(&pair).unwrap();
        assert!(sys.ridge > 0.0);
        assert!(sys.eigenvalues.iter().all(|l| l.is_finite()));
    }

    #[test]
    fn zero_noise_is_numerical_error() {
        let pair = CovariancePair { signal: Array2::eye(2), noise: Array2::zeros((2, 2)) };
        let err = EigenSystem::solve(&pair).unwrap_err();
        assert!(matches!(err, Error::Numerical { stage: Stage::Eigendecomposition, .. }));
    }

    #[test]
    fn fixed_threshold_is_strict() {
        assert_eq!(count_above_one(&[5.0, 2.0, 1.0, 0.5]), 2);
        assert_eq!(count_above_one(&[0.9, 0.2]), 0);
    }

    #[test]
    fn knee_of_elbow_curve() {
        let eig = [100.0, 90.0, 10.0, 5.0, 3.0, 2.0, 1.0];
        // Largest drop below the chord is right after the plateau.
        assert_eq!(knee_index(&eig), Some(2));
        assert_eq!(select_kept(&eig, ThresholdStrategy::KneeDetection), 3);
    }

    #[test]
    fn knee_falls_back_to_fixed_rule() {
        assert_eq!(knee_index(&[3.0, 0.5]), None);
        assert_eq!(select_kept(&[3.0, 0.5], ThresholdStrategy::KneeDetection), 1);
        // Linear curve: nothing below the chord.
        assert_eq!(knee_index(&[4.0, 3.0, 2.0, 1.0]), None);
    }

    #[test]
    fn first_difference_repeats_last() {
        let x = array![[0.0, 1.0, 3.0, 6.0]];
        let d = first_difference(x.view());
        assert_eq!(d, array![[1.0, 2.0, 3.0, 3.0]]);
    }

    #[test]
    fn full_keep_reconstruction_is_identity() {
        let pair = CovariancePair {
            signal: array![[3.0, 0.4], [0.4, 2.0]],
            noise: array![[1.0, 0.1], [0.1, 0.7]],
        };
        let sys = EigenSystem::solve(&pair).unwrap();
        let x = array![[1.0, -2.0, 0.5], [0.3, 0.0, -1.0]];
        let y = sys.reconstruct(x.view(), 2);
        for (a, b) in x.iter().zip(y.iter()) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
        approx::assert_abs_diff_eq!(sys.removed_power_pct(x.view(), 2), 0.0);
    }
}
