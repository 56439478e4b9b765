//! Built-in independent-component decomposition (FastICA via `linfa-ica`).
//!
//! linfa works on `[n_samples, n_features]`, so the `[C, N]` recording is
//! transposed on the way in. The mixing matrix is the least-squares fit of
//! the centred data onto the recovered sources:
//!
//! ```text
//! X_c  [N, C]   centred data
//! S    [N, k]   sources (FastIca::predict)
//! A    [C, k] = X_cᵀ · S · (Sᵀ S)⁻¹
//! X   ≈ mean + A · Sᵀ
//! ```
//!
//! The fit is exact only when `k` matches the rank of the data. Average
//! referencing leaves `C` channels spanning `C − 1` dimensions, so callers
//! size `k` with [`numerical_rank`].
use linfa::prelude::*;
use linfa_ica::fast_ica::FastIca;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, ArrayView2, Axis};

use crate::capability::{Decomposer, Decomposition, DecompositionParams};
use crate::error::{Error, Result, Stage};
use crate::stats::covariance;

/// Covariance eigenvalues below this fraction of the largest one count as
/// zero (singular values below ~1e-5 of the largest).
const RANK_TOL: f64 = 1e-10;

/// Number of covariance eigenvalues of `data` (`[C, N]`) above
/// `RANK_TOL · λ_max`. Zero for constant data.
pub fn numerical_rank(data: ArrayView2<'_, f64>) -> usize {
    let cov = covariance(data);
    let n = cov.nrows();
    if n == 0 {
        return 0;
    }
    let eig = SymmetricEigen::new(DMatrix::from_fn(n, n, |i, j| cov[[i, j]]));
    let max = eig.eigenvalues.iter().copied().fold(0.0_f64, f64::max);
    if !(max > 0.0) {
        return 0;
    }
    eig.eigenvalues.iter().filter(|&&l| l > RANK_TOL * max).count()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FastIcaDecomposer;

impl Decomposer for FastIcaDecomposer {
    fn decompose(
        &self,
        data: ArrayView2<'_, f64>,
        params: &DecompositionParams,
    ) -> Result<Decomposition> {
        let (n_ch, n_t) = data.dim();
        if params.n_components == 0 || params.n_components > n_ch {
            return Err(Error::numerical(
                Stage::Decomposing,
                format!("cannot extract {} components from {n_ch} channels", params.n_components),
            ));
        }
        if n_t <= n_ch {
            return Err(Error::numerical(
                Stage::Decomposing,
                format!("{n_t} samples are too few for {n_ch} channels"),
            ));
        }

        let mean = data
            .mean_axis(Axis(1))
            .ok_or_else(|| Error::numerical(Stage::Decomposing, "empty recording"))?;
        // [N, C], centred.
        let mut samples = data.t().to_owned();
        samples -= &mean;

        log::debug!(
            "[ICA] FastICA: n_components={}, max_iter={}, tol={}, seed={}",
            params.n_components,
            params.max_iter,
            params.tolerance,
            params.seed
        );
        let dataset = DatasetBase::from(samples.clone());
        let model = FastIca::params()
            .ncomponents(params.n_components)
            .max_iter(params.max_iter)
            .tol(params.tolerance)
            .random_state(params.seed as usize)
            .fit(&dataset)
            .map_err(|e| Error::numerical(Stage::Decomposing, format!("FastICA failed: {e}")))?;

        let sources: Array2<f64> = model.predict(&samples);
        if sources.iter().any(|v| !v.is_finite()) {
            return Err(Error::numerical(Stage::Decomposing, "FastICA produced non-finite sources"));
        }

        let mixing = least_squares_mixing(&samples, &sources)?;
        Ok(Decomposition { sources: sources.reversed_axes(), mixing, mean })
    }
}

/// `A = Xᵀ S (Sᵀ S)⁻¹` for `X` `[N, C]` and `S` `[N, k]`.
fn least_squares_mixing(samples: &Array2<f64>, sources: &Array2<f64>) -> Result<Array2<f64>> {
    let sts = sources.t().dot(sources);
    let sts_inv = invert(&sts).ok_or_else(|| {
        Error::numerical(Stage::Decomposing, "source covariance is singular")
    })?;
    Ok(samples.t().dot(sources).dot(&sts_inv))
}

pub(crate) fn invert(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let m = DMatrix::from_fn(n, n, |i, j| a[[i, j]]);
    let inv = m.try_inverse()?;
    Some(Array2::from_shape_fn((n, n), |(i, j)| inv[(i, j)]))
}
