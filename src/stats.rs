//! Descriptive statistics over channel rows.
//!
//! Conventions follow NumPy/SciPy defaults: population variance (`ddof=0`),
//! biased Fisher kurtosis, `np.cov` with `ddof=1`, median averaging the two
//! middle values for even counts.
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

pub fn mean(x: ArrayView1<'_, f64>) -> f64 {
    x.mean().unwrap_or(0.0)
}

/// Population variance (`ddof = 0`).
pub fn variance(x: ArrayView1<'_, f64>) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let m = mean(x);
    x.iter().map(|&v| (v - m) * (v - m)).sum::<f64>() / x.len() as f64
}

pub fn std_dev(x: ArrayView1<'_, f64>) -> f64 {
    variance(x).sqrt()
}

/// Mean and population standard deviation of a plain slice.
pub fn mean_std(x: &[f64]) -> (f64, f64) {
    if x.is_empty() {
        return (0.0, 0.0);
    }
    let n = x.len() as f64;
    let m = x.iter().sum::<f64>() / n;
    let var = x.iter().map(|&v| (v - m) * (v - m)).sum::<f64>() / n;
    (m, var.sqrt())
}

/// Median; `0.0` for an empty input. NaNs sort last.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    }
}

/// Excess kurtosis `m4 / m2² − 3` (Fisher, biased).
/// A constant signal has no defined kurtosis and yields `0.0`.
pub fn excess_kurtosis(x: ArrayView1<'_, f64>) -> f64 {
    if x.len() < 4 {
        return 0.0;
    }
    let n = x.len() as f64;
    let m = mean(x);
    let (m2, m4) = x.iter().fold((0.0, 0.0), |(m2, m4), &v| {
        let d2 = (v - m) * (v - m);
        (m2 + d2, m4 + d2 * d2)
    });
    let (m2, m4) = (m2 / n, m4 / n);
    if m2 == 0.0 || m2 <= (f64::EPSILON * m).powi(2) {
        return 0.0;
    }
    m4 / (m2 * m2) - 3.0
}

/// Pearson correlation matrix of the rows of `data`.
///
/// Rows with zero variance correlate `0.0` with everything (their diagonal
/// entry stays `1.0`).
pub fn correlation_matrix(data: ArrayView2<'_, f64>) -> Array2<f64> {
    let n_ch = data.nrows();
    let centered = center_rows(data);
    let norms: Vec<f64> = centered
        .rows()
        .into_iter()
        .map(|r| r.dot(&r).sqrt())
        .collect();

    let mut corr = Array2::eye(n_ch);
    for i in 0..n_ch {
        for j in (i + 1)..n_ch {
            let denom = norms[i] * norms[j];
            let r = if denom > 0.0 {
                (centered.row(i).dot(&centered.row(j)) / denom).clamp(-1.0, 1.0)
            } else {
                0.0
            };
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }
    corr
}

/// Sample covariance of the rows (`np.cov`, `ddof = 1`). `[C, C]`.
pub fn covariance(data: ArrayView2<'_, f64>) -> Array2<f64> {
    let n_t = data.ncols();
    let centered = center_rows(data);
    let denom = (n_t.max(2) - 1) as f64;
    let mut cov = centered.dot(&centered.t());
    cov.mapv_inplace(|v| v / denom);
    // Exact symmetry for the eigensolver.
    (&cov + &cov.t()) * 0.5
}

/// Each row minus its own mean.
pub fn center_rows(data: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut out = data.to_owned();
    if let Some(means) = data.mean_axis(Axis(1)) {
        for (mut row, m) in out.rows_mut().into_iter().zip(means.iter()) {
            row -= *m;
        }
    }
    out
}

/// Ordinary least-squares slope of `y` against `x`.
pub fn linregress_slope(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let mx = x[..n].iter().sum::<f64>() / nf;
    let my = y[..n].iter().sum::<f64>() / nf;
    let (sxy, sxx) = x[..n].iter().zip(&y[..n]).fold((0.0, 0.0), |(sxy, sxx), (&xi, &yi)| {
        (sxy + (xi - mx) * (yi - my), sxx + (xi - mx) * (xi - mx))
    });
    if sxx == 0.0 { 0.0 } else { sxy / sxx }
}
