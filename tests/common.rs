/// Shared helpers: deterministic synthetic recordings and mock capabilities.
use exgq::stats::{excess_kurtosis, std_dev};
use exgq::{
    ArtifactSubspace, ChannelKind, ComponentClass, ComponentClassifier, ComponentLabel,
    Decomposer, Decomposition, DecompositionParams, Error, MethodKind, RecordingMatrix, Stage,
    StageObserver, SubspaceModel,
};
use ndarray::{Array2, ArrayView2};
use std::f64::consts::PI;

/// Deterministic Gaussian noise (LCG + Box–Muller).
pub struct Noise {
    state: u64,
}

impl Noise {
    pub fn new(seed: u64) -> Self {
        Self { state: seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407) }
    }

    fn uniform(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        // 53 high bits → (0, 1]
        ((self.state >> 11) as f64 + 1.0) / (1u64 << 53) as f64
    }

    pub fn gaussian(&mut self) -> f64 {
        let (u1, u2) = (self.uniform(), self.uniform());
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

#[allow(unused)]
pub fn names(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("EEG{i:02}")).collect()
}

#[allow(unused)]
pub fn sine(freq: f64, amp: f64, phase: f64, sfreq: f64, n: usize) -> Vec<f64> {
    (0..n).map(|t| amp * (2.0 * PI * freq * t as f64 / sfreq + phase).sin()).collect()
}

#[allow(unused)]
/// `n_ch` channels, each its own sinusoid (`freqs[c % len]`) plus white noise
/// of standard deviation `noise_std`.
pub fn sines_plus_noise(
    n_ch: usize,
    freqs: &[f64],
    noise_std: f64,
    sfreq: f64,
    secs: f64,
    seed: u64,
) -> Array2<f64> {
    let n = (secs * sfreq) as usize;
    let mut noise = Noise::new(seed);
    let mut data = Array2::zeros((n_ch, n));
    for c in 0..n_ch {
        let f = freqs[c % freqs.len()];
        let s = sine(f, 1.0, 0.7 * c as f64, sfreq, n);
        for t in 0..n {
            data[[c, t]] = s[t] + noise_std * noise.gaussian();
        }
    }
    data
}

#[allow(unused)]
/// EEG-like recording: one shared 10 Hz source with per-channel gains, slow
/// 2 Hz drift, white noise, and broadband "muscle" noise of standard
/// deviation `muscle_std` on channel 0.
pub fn eeg_like(n_ch: usize, sfreq: f64, secs: f64, muscle_std: f64, seed: u64) -> Array2<f64> {
    let n = (secs * sfreq) as usize;
    let alpha = sine(10.0, 1.0, 0.0, sfreq, n);
    let delta = sine(2.0, 0.5, 0.3, sfreq, n);
    let mut noise = Noise::new(seed);
    Array2::from_shape_fn((n_ch, n), |(c, t)| {
        let gain = 1.0 - 0.05 * c as f64;
        let mut v = gain * alpha[t] + 0.5 * delta[t] + 0.1 * noise.gaussian();
        if c == 0 {
            v += muscle_std * noise.gaussian();
        }
        v
    })
}

#[allow(unused)]
pub fn recording(data: Array2<f64>, sfreq: f64) -> RecordingMatrix {
    let n = data.nrows();
    RecordingMatrix::new(data, sfreq, names(n)).unwrap()
}

#[allow(unused)]
/// Recording with an extra EOG channel appended after the EEG channels.
pub fn recording_with_eog(eeg: Array2<f64>, sfreq: f64) -> RecordingMatrix {
    let (n_ch, n_t) = eeg.dim();
    let mut data = Array2::zeros((n_ch + 1, n_t));
    data.slice_mut(ndarray::s![..n_ch, ..]).assign(&eeg);
    for t in 0..n_t {
        data[[n_ch, t]] = if (t / 200) % 5 == 0 { 20.0 } else { 0.0 };
    }
    let mut labels = names(n_ch);
    labels.push("EOG".into());
    let mut kinds = vec![ChannelKind::Eeg; n_ch];
    kinds.push(ChannelKind::Eog);
    RecordingMatrix::with_kinds(data, sfreq, labels, kinds).unwrap()
}

#[allow(unused)]
pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0_f64, f64::max)
}

#[allow(unused)]
pub fn row_variance(data: &Array2<f64>, row: usize) -> f64 {
    let r = data.row(row);
    let m = r.mean().unwrap();
    r.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / r.len() as f64
}

// ── Mock capabilities ─────────────────────────────────────────────────────────

/// ASR stand-in: clips every channel to ±cutoff·σ of its calibration segment.
#[allow(unused)]
pub struct ClippingAsr;

struct ClippingModel {
    limits: Vec<f64>,
}

impl ArtifactSubspace for ClippingAsr {
    fn calibrate(
        &self,
        calibration: ArrayView2<'_, f64>,
        _sfreq: f64,
        cutoff: f64,
    ) -> exgq::Result<Box<dyn SubspaceModel>> {
        let limits = calibration.rows().into_iter().map(|r| cutoff * std_dev(r)).collect();
        Ok(Box::new(ClippingModel { limits }))
    }
}

impl SubspaceModel for ClippingModel {
    fn reconstruct(&self, data: ArrayView2<'_, f64>) -> exgq::Result<Array2<f64>> {
        let mut out = data.to_owned();
        for (mut row, &lim) in out.rows_mut().into_iter().zip(&self.limits) {
            row.mapv_inplace(|v| v.clamp(-lim, lim));
        }
        Ok(out)
    }
}

/// Labels spiky (excess kurtosis > 3) components as weak brain, the rest
/// as confident brain.
#[allow(unused)]
pub struct KurtosisClassifier;

impl ComponentClassifier for KurtosisClassifier {
    fn classify(
        &self,
        _recording: &RecordingMatrix,
        decomposition: &Decomposition,
    ) -> exgq::Result<Vec<ComponentLabel>> {
        Ok(decomposition
            .sources
            .rows()
            .into_iter()
            .enumerate()
            .map(|(index, s)| {
                let probability = if excess_kurtosis(s) > 3.0 { 0.1 } else { 0.95 };
                ComponentLabel { index, class: ComponentClass::Brain, probability }
            })
            .collect())
    }
}

/// Returns the same labels for every decomposition.
#[allow(unused)]
pub struct FixedLabels(pub Vec<(ComponentClass, f64)>);

impl ComponentClassifier for FixedLabels {
    fn classify(
        &self,
        _recording: &RecordingMatrix,
        _decomposition: &Decomposition,
    ) -> exgq::Result<Vec<ComponentLabel>> {
        Ok(self
            .0
            .iter()
            .enumerate()
            .map(|(index, &(class, probability))| ComponentLabel { index, class, probability })
            .collect())
    }
}

/// Never converges.
#[allow(unused)]
pub struct FailingDecomposer;

impl Decomposer for FailingDecomposer {
    fn decompose(
        &self,
        _data: ArrayView2<'_, f64>,
        params: &DecompositionParams,
    ) -> exgq::Result<Decomposition> {
        Err(Error::Numerical {
            stage: Stage::Decomposing,
            message: format!("no convergence with seed {}", params.seed),
        })
    }
}

/// Records finished stages and cancels once `cancel_after` has finished.
#[allow(unused)]
#[derive(Default)]
pub struct RecordingObserver {
    pub seen: Vec<(Option<MethodKind>, Stage)>,
    pub cancel_after: Option<Stage>,
}

impl StageObserver for RecordingObserver {
    fn stage_finished(&mut self, method: Option<MethodKind>, stage: Stage) {
        self.seen.push((method, stage));
    }

    fn cancel_requested(&self) -> bool {
        match (self.cancel_after, self.seen.last()) {
            (Some(target), Some(&(_, last))) => last == target,
            _ => false,
        }
    }
}
