//! Quality metrics for a `[C, N]` recording.
//!
//! Every metric is computed independently from the same input snapshot; the
//! result is an immutable [`QualityMetricsSet`] with a composite score in
//! `[0, 100]` and a letter [`Grade`].
//!
//! | metric              | definition                                              |
//! |---------------------|---------------------------------------------------------|
//! | SNR (dB)            | `10·log10(P[8–13 Hz] / P[50–100 Hz])`, Welch band power |
//! | PSD slope           | OLS slope of `10·log10(PSD)` over 1–80 Hz, channel mean |
//! | artifact %          | max(amplitude > 5σ_c, \|Δx\| > 5·median\|Δx\|)            |
//! | bad channels        | variance < 0.1× or > 10× the median channel variance    |
//! | kurtosis            | mean \|excess kurtosis\| over channels                    |
//! | band powers         | integrated PSD in δ θ α β γ; α/δ ratio                  |
//! | channel correlation | mean off-diagonal Pearson r (optional)                  |
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use ndarray::{ArrayView2, Axis};
use serde::Serialize;

use crate::recording::RecordingMatrix;
use crate::spectrum::welch;
use crate::stats::{correlation_matrix, excess_kurtosis, linregress_slope, mean_std, median, variance};

// ── Constants ────────────────────────────────────────────────────────────────

pub const SNR_SIGNAL_BAND: (f64, f64) = (8.0, 13.0);
pub const SNR_NOISE_BAND: (f64, f64) = (50.0, 100.0);
/// SNR reported when the noise band carries no power.
pub const SNR_CEILING_DB: f64 = 100.0;

pub const SLOPE_BAND: (f64, f64) = (1.0, 80.0);
pub const SLOPE_NFFT: usize = 2048;
pub const BAND_NFFT: usize = 256;

pub const ARTIFACT_SD_FACTOR: f64 = 5.0;
pub const GRADIENT_MEDIAN_FACTOR: f64 = 5.0;

pub const FLAT_VARIANCE_RATIO: f64 = 0.1;
pub const NOISY_VARIANCE_RATIO: f64 = 10.0;

pub const HIGH_KURTOSIS: f64 = 5.0;

pub const BANDS: [(&str, f64, f64); 5] = [
    ("delta", 1.0, 4.0),
    ("theta", 4.0, 8.0),
    ("alpha", 8.0, 13.0),
    ("beta", 13.0, 30.0),
    ("gamma", 30.0, 80.0),
];

const W_SNR: f64 = 0.25;
const W_SLOPE: f64 = 0.20;
const W_ARTIFACT: f64 = 0.20;
const W_BAD: f64 = 0.15;
const W_KURTOSIS: f64 = 0.10;
const W_CORRELATION: f64 = 0.10;

// ── Metric names & directions ────────────────────────────────────────────────

/// Which way a metric improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
    /// Reported but not ranked.
    Neutral,
}

impl Direction {
    /// `+1`, `−1` or `0`.
    pub fn sign(self) -> f64 {
        match self {
            Direction::HigherIsBetter => 1.0,
            Direction::LowerIsBetter => -1.0,
            Direction::Neutral => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Snr,
    PsdSlope,
    ArtifactPct,
    BadChannelCount,
    BadChannelPct,
    Kurtosis,
    DeltaPower,
    ThetaPower,
    AlphaPower,
    BetaPower,
    GammaPower,
    AlphaDeltaRatio,
    ChannelCorrelation,
    CompositeScore,
}

impl Metric {
    pub const ALL: [Metric; 14] = [
        Metric::Snr,
        Metric::PsdSlope,
        Metric::ArtifactPct,
        Metric::BadChannelCount,
        Metric::BadChannelPct,
        Metric::Kurtosis,
        Metric::DeltaPower,
        Metric::ThetaPower,
        Metric::AlphaPower,
        Metric::BetaPower,
        Metric::GammaPower,
        Metric::AlphaDeltaRatio,
        Metric::ChannelCorrelation,
        Metric::CompositeScore,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Snr => "snr_db",
            Metric::PsdSlope => "psd_slope",
            Metric::ArtifactPct => "artifact_pct",
            Metric::BadChannelCount => "bad_channel_count",
            Metric::BadChannelPct => "bad_channel_pct",
            Metric::Kurtosis => "mean_abs_kurtosis",
            Metric::DeltaPower => "delta_power",
            Metric::ThetaPower => "theta_power",
            Metric::AlphaPower => "alpha_power",
            Metric::BetaPower => "beta_power",
            Metric::GammaPower => "gamma_power",
            Metric::AlphaDeltaRatio => "alpha_delta_ratio",
            Metric::ChannelCorrelation => "channel_correlation",
            Metric::CompositeScore => "composite_score",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Metric::Snr
            | Metric::AlphaDeltaRatio
            | Metric::ChannelCorrelation
            | Metric::CompositeScore => Direction::HigherIsBetter,
            Metric::PsdSlope
            | Metric::ArtifactPct
            | Metric::BadChannelCount
            | Metric::BadChannelPct
            | Metric::Kurtosis => Direction::LowerIsBetter,
            Metric::DeltaPower
            | Metric::ThetaPower
            | Metric::AlphaPower
            | Metric::BetaPower
            | Metric::GammaPower => Direction::Neutral,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Buckets ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PsdQuality {
    Garbage,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl PsdQuality {
    pub fn from_slope(slope: f64) -> Self {
        if slope >= 0.0 {
            PsdQuality::Garbage
        } else if slope >= -0.1 {
            PsdQuality::Poor
        } else if slope >= -0.2 {
            PsdQuality::Fair
        } else if slope >= -0.3 {
            PsdQuality::Good
        } else {
            PsdQuality::Excellent
        }
    }

    /// Sub-score in `[0, 1]`.
    pub fn score(self) -> f64 {
        match self {
            PsdQuality::Excellent => 1.0,
            PsdQuality::Good => 0.8,
            PsdQuality::Fair => 0.6,
            PsdQuality::Poor => 0.4,
            PsdQuality::Garbage => 0.2,
        }
    }
}

impl fmt::Display for PsdQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Grade {
    F,
    D,
    C,
    B,
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::APlus
        } else if score >= 80.0 {
            Grade::A
        } else if score >= 70.0 {
            Grade::B
        } else if score >= 60.0 {
            Grade::C
        } else if score >= 50.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Grade::APlus => "Excellent",
            Grade::A => "Very Good",
            Grade::B => "Good",
            Grade::C => "Fair",
            Grade::D => "Poor",
            Grade::F => "Very Poor",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        })
    }
}

// ── Component statistics ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarianceStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlopeStats {
    pub mean: f64,
    pub std: f64,
    pub per_channel: Vec<f64>,
    pub quality: PsdQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactStats {
    pub amplitude_pct: f64,
    pub gradient_pct: f64,
    /// `max(amplitude_pct, gradient_pct)`.
    pub total_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadChannelReason {
    Flat,
    Noisy,
}

impl fmt::Display for BadChannelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BadChannelReason::Flat => "low variance (flat)",
            BadChannelReason::Noisy => "high variance (noisy)",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadChannel {
    pub label: String,
    pub variance: f64,
    pub reason: BadChannelReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadChannelStats {
    pub count: usize,
    pub pct: f64,
    pub channels: Vec<BadChannel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KurtosisStats {
    pub mean_abs: f64,
    pub std: f64,
    pub max: f64,
    /// Channels with excess kurtosis above 5.
    pub n_high: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandPowers {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    /// Each band as % of the five-band total, in δ θ α β γ order.
    pub relative_pct: [f64; 5],
    pub alpha_delta_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

/// Normalised `[0, 1]` sub-scores behind the composite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubScores {
    pub snr: f64,
    pub psd_slope: f64,
    pub artifact: f64,
    pub bad_channels: f64,
    pub kurtosis: f64,
    pub correlation: Option<f64>,
}

impl SubScores {
    /// Weighted composite in `[0, 100]`; weights of absent sub-scores are
    /// dropped and the rest renormalised.
    pub fn composite(&self) -> f64 {
        let mut parts = vec![
            (self.snr, W_SNR),
            (self.psd_slope, W_SLOPE),
            (self.artifact, W_ARTIFACT),
            (self.bad_channels, W_BAD),
            (self.kurtosis, W_KURTOSIS),
        ];
        if let Some(c) = self.correlation {
            parts.push((c, W_CORRELATION));
        }
        let weight: f64 = parts.iter().map(|(_, w)| w).sum();
        100.0 * parts.iter().map(|(s, w)| s * w).sum::<f64>() / weight
    }
}

// ── The set ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsOptions {
    pub channel_correlation: bool,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self { channel_correlation: true }
    }
}

/// Immutable set of quality metrics for one matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetricsSet {
    n_channels: usize,
    n_samples: usize,
    sfreq: f64,
    snr_db: f64,
    variance: VarianceStats,
    psd_slope: SlopeStats,
    artifacts: ArtifactStats,
    bad_channels: BadChannelStats,
    kurtosis: KurtosisStats,
    bands: BandPowers,
    correlation: Option<CorrelationStats>,
    sub_scores: SubScores,
    score: f64,
    grade: Grade,
}

impl QualityMetricsSet {
    pub fn compute(recording: &RecordingMatrix, opts: MetricsOptions) -> Self {
        let data = recording.view();
        let sfreq = recording.sfreq();

        let snr_db = snr_db(data, sfreq);
        let variance = variance_stats(data);
        let psd_slope = slope_stats(data, sfreq);
        let artifacts = artifact_stats(data);
        let bad_channels = bad_channels(data, recording.ch_names());
        let kurtosis = kurtosis_stats(data);
        let bands = band_powers(data, sfreq);
        let correlation = if opts.channel_correlation { correlation_stats(data) } else { None };

        let sub_scores = SubScores {
            snr: (snr_db / 20.0).clamp(0.0, 1.0),
            psd_slope: psd_slope.quality.score(),
            artifact: (1.0 - artifacts.total_pct / 50.0).clamp(0.0, 1.0),
            bad_channels: (1.0 - bad_channels.pct / 30.0).clamp(0.0, 1.0),
            kurtosis: (1.0 - kurtosis.mean_abs / 10.0).clamp(0.0, 1.0),
            correlation: correlation.as_ref().map(|c| (c.mean / 0.5).clamp(0.0, 1.0)),
        };
        let score = sub_scores.composite();
        let grade = Grade::from_score(score);
        log::debug!(
            "[METRICS] {} ch × {} samples: SNR {snr_db:.2} dB, slope {:.4}, score {score:.1} ({grade})",
            recording.n_channels(),
            recording.n_samples(),
            psd_slope.mean
        );

        Self {
            n_channels: recording.n_channels(),
            n_samples: recording.n_samples(),
            sfreq,
            snr_db,
            variance,
            psd_slope,
            artifacts,
            bad_channels,
            kurtosis,
            bands,
            correlation,
            sub_scores,
            score,
            grade,
        }
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn snr_db(&self) -> f64 {
        self.snr_db
    }

    pub fn variance(&self) -> &VarianceStats {
        &self.variance
    }

    pub fn psd_slope(&self) -> &SlopeStats {
        &self.psd_slope
    }

    pub fn artifacts(&self) -> &ArtifactStats {
        &self.artifacts
    }

    pub fn bad_channels(&self) -> &BadChannelStats {
        &self.bad_channels
    }

    pub fn kurtosis(&self) -> &KurtosisStats {
        &self.kurtosis
    }

    pub fn bands(&self) -> &BandPowers {
        &self.bands
    }

    pub fn correlation(&self) -> Option<&CorrelationStats> {
        self.correlation.as_ref()
    }

    pub fn sub_scores(&self) -> &SubScores {
        &self.sub_scores
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }

    /// Scalar value of `metric`; `None` only for a disabled correlation.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        Some(match metric {
            Metric::Snr => self.snr_db,
            Metric::PsdSlope => self.psd_slope.mean,
            Metric::ArtifactPct => self.artifacts.total_pct,
            Metric::BadChannelCount => self.bad_channels.count as f64,
            Metric::BadChannelPct => self.bad_channels.pct,
            Metric::Kurtosis => self.kurtosis.mean_abs,
            Metric::DeltaPower => self.bands.delta,
            Metric::ThetaPower => self.bands.theta,
            Metric::AlphaPower => self.bands.alpha,
            Metric::BetaPower => self.bands.beta,
            Metric::GammaPower => self.bands.gamma,
            Metric::AlphaDeltaRatio => self.bands.alpha_delta_ratio,
            Metric::ChannelCorrelation => return self.correlation.as_ref().map(|c| c.mean),
            Metric::CompositeScore => self.score,
        })
    }

    /// All present scalar metrics by name.
    pub fn values(&self) -> BTreeMap<&'static str, f64> {
        Metric::ALL
            .iter()
            .filter_map(|&m| self.get(m).map(|v| (m.name(), v)))
            .collect()
    }

    /// Plain-text report.
    pub fn render_report(&self) -> String {
        let rule = "=".repeat(60);
        let mut s = String::new();
        let _ = writeln!(s, "{rule}");
        let _ = writeln!(s, "EEG DATA QUALITY REPORT");
        let _ = writeln!(s, "{rule}");
        let _ = writeln!(
            s,
            "{} channels, {} samples @ {} Hz\n",
            self.n_channels, self.n_samples, self.sfreq
        );
        let _ = writeln!(s, "Overall Quality Score: {:.1}/100", self.score);
        let _ = writeln!(s, "Quality Grade: {} ({})\n", self.grade.description(), self.grade);
        let _ = writeln!(s, "Signal-to-Noise Ratio: {:.2} dB\n", self.snr_db);

        let p = &self.psd_slope;
        let _ = writeln!(s, "PSD Slope: {:.4} ± {:.4}", p.mean, p.std);
        let _ = writeln!(s, "PSD Quality Classification: {}\n", p.quality);

        let a = &self.artifacts;
        let _ = writeln!(s, "Estimated Artifact Content: {:.2}%", a.total_pct);
        let _ = writeln!(s, "  - Amplitude-based: {:.2}%", a.amplitude_pct);
        let _ = writeln!(s, "  - Gradient-based: {:.2}%\n", a.gradient_pct);

        let b = &self.bad_channels;
        let _ = writeln!(s, "Bad Channels: {} ({:.1}%)", b.count, b.pct);
        for ch in b.channels.iter().take(5) {
            let _ = writeln!(s, "  {}: {}", ch.label, ch.reason);
        }
        if b.channels.len() > 5 {
            let _ = writeln!(s, "  ... and {} more", b.channels.len() - 5);
        }
        let _ = writeln!(s);

        let k = &self.kurtosis;
        let _ = writeln!(s, "Kurtosis (mean |excess|): {:.2} ± {:.2}", k.mean_abs, k.std);
        let _ = writeln!(s, "Channels with high kurtosis: {}\n", k.n_high);

        let bp = &self.bands;
        let _ = writeln!(s, "Frequency Band Powers:");
        let powers = [bp.delta, bp.theta, bp.alpha, bp.beta, bp.gamma];
        for (((name, lo, hi), p), rel) in BANDS.iter().zip(powers).zip(bp.relative_pct) {
            let _ = writeln!(s, "  {name:<6} ({lo}-{hi} Hz): {p:.3e}  ({rel:.1}%)");
        }
        let _ = writeln!(s, "  Alpha/Delta Ratio: {:.3}\n", bp.alpha_delta_ratio);

        match &self.correlation {
            Some(c) => {
                let _ = writeln!(s, "Channel Correlation: {:.3} ± {:.3}", c.mean, c.std);
                let _ = writeln!(s, "  Range: [{:.3}, {:.3}]", c.min, c.max);
            }
            None => {
                let _ = writeln!(s, "Channel Correlation: not computed");
            }
        }
        let _ = writeln!(s, "{rule}");
        s
    }
}

/// Compute the quality metrics of `recording`.
pub fn metrics(recording: &RecordingMatrix, opts: MetricsOptions) -> QualityMetricsSet {
    QualityMetricsSet::compute(recording, opts)
}

// ── Individual metrics ───────────────────────────────────────────────────────

fn snr_db(data: ArrayView2<'_, f64>, sfreq: f64) -> f64 {
    let psd = welch(data, sfreq, BAND_NFFT);
    let signal = psd.band_power(SNR_SIGNAL_BAND.0, SNR_SIGNAL_BAND.1);
    let noise = psd.band_power(SNR_NOISE_BAND.0, SNR_NOISE_BAND.1);
    if noise <= 0.0 {
        return SNR_CEILING_DB;
    }
    if signal <= 0.0 {
        return -SNR_CEILING_DB;
    }
    10.0 * (signal / noise).log10()
}

fn variance_stats(data: ArrayView2<'_, f64>) -> VarianceStats {
    let vars: Vec<f64> = data.rows().into_iter().map(variance).collect();
    let (mean, std) = mean_std(&vars);
    VarianceStats {
        mean,
        std,
        min: vars.iter().copied().fold(f64::INFINITY, f64::min),
        max: vars.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

fn slope_stats(data: ArrayView2<'_, f64>, sfreq: f64) -> SlopeStats {
    let psd = welch(data, sfreq, SLOPE_NFFT);
    let idx = psd.band_indices(SLOPE_BAND.0, SLOPE_BAND.1.min(sfreq / 2.0));
    let freqs: Vec<f64> = idx.iter().map(|&k| psd.freqs[k]).collect();

    let per_channel: Vec<f64> = psd
        .power
        .rows()
        .into_iter()
        .map(|row| {
            let db: Vec<f64> =
                idx.iter().map(|&k| 10.0 * row[k].max(f64::MIN_POSITIVE).log10()).collect();
            linregress_slope(&freqs, &db)
        })
        .collect();
    let (mean, std) = mean_std(&per_channel);
    SlopeStats { mean, std, per_channel, quality: PsdQuality::from_slope(mean) }
}

fn artifact_stats(data: ArrayView2<'_, f64>) -> ArtifactStats {
    let (n_ch, n_t) = data.dim();

    let mut amplitude_hits = 0usize;
    for row in data.rows() {
        let m = row.mean().unwrap_or(0.0);
        let threshold = ARTIFACT_SD_FACTOR * variance(row).sqrt();
        amplitude_hits += row.iter().filter(|&&v| (v - m).abs() > threshold).count();
    }

    let gradients: Vec<f64> = data
        .rows()
        .into_iter()
        .flat_map(|row| {
            row.iter().zip(row.iter().skip(1)).map(|(a, b)| (b - a).abs()).collect::<Vec<_>>()
        })
        .collect();
    let gradient_threshold = GRADIENT_MEDIAN_FACTOR * median(&gradients);
    let gradient_hits = gradients.iter().filter(|&&g| g > gradient_threshold).count();

    let amplitude_pct = 100.0 * amplitude_hits as f64 / (n_ch * n_t) as f64;
    let gradient_pct = if gradients.is_empty() {
        0.0
    } else {
        100.0 * gradient_hits as f64 / (n_ch * (n_t - 1)) as f64
    };
    ArtifactStats { amplitude_pct, gradient_pct, total_pct: amplitude_pct.max(gradient_pct) }
}

fn bad_channels(data: ArrayView2<'_, f64>, labels: &[String]) -> BadChannelStats {
    let vars: Vec<f64> = data.rows().into_iter().map(variance).collect();
    let med = median(&vars);
    let channels: Vec<BadChannel> = vars
        .iter()
        .zip(labels)
        .filter_map(|(&v, label)| {
            let reason = if v < FLAT_VARIANCE_RATIO * med {
                BadChannelReason::Flat
            } else if v > NOISY_VARIANCE_RATIO * med {
                BadChannelReason::Noisy
            } else {
                return None;
            };
            Some(BadChannel { label: label.clone(), variance: v, reason })
        })
        .collect();
    let count = channels.len();
    let pct = if vars.is_empty() { 0.0 } else { 100.0 * count as f64 / vars.len() as f64 };
    BadChannelStats { count, pct, channels }
}

fn kurtosis_stats(data: ArrayView2<'_, f64>) -> KurtosisStats {
    let k: Vec<f64> = data.rows().into_iter().map(excess_kurtosis).collect();
    let abs: Vec<f64> = k.iter().map(|v| v.abs()).collect();
    let (mean_abs, _) = mean_std(&abs);
    let (_, std) = mean_std(&k);
    KurtosisStats {
        mean_abs,
        std,
        max: k.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        n_high: k.iter().filter(|&&v| v > HIGH_KURTOSIS).count(),
    }
}

fn band_powers(data: ArrayView2<'_, f64>, sfreq: f64) -> BandPowers {
    let psd = welch(data, sfreq, BAND_NFFT);
    let p: Vec<f64> = BANDS.iter().map(|&(_, lo, hi)| psd.band_power(lo, hi)).collect();
    let total: f64 = p.iter().sum();
    let mut relative_pct = [0.0; 5];
    if total > 0.0 {
        for (r, v) in relative_pct.iter_mut().zip(&p) {
            *r = 100.0 * v / total;
        }
    }
    let alpha_delta_ratio = if p[0] > 0.0 { p[2] / p[0] } else { 0.0 };
    BandPowers {
        delta: p[0],
        theta: p[1],
        alpha: p[2],
        beta: p[3],
        gamma: p[4],
        relative_pct,
        alpha_delta_ratio,
    }
}

fn correlation_stats(data: ArrayView2<'_, f64>) -> Option<CorrelationStats> {
    let n = data.len_of(Axis(0));
    if n < 2 {
        return None;
    }
    let corr = correlation_matrix(data);
    let off: Vec<f64> = corr
        .indexed_iter()
        .filter(|((i, j), _)| i != j)
        .map(|(_, &v)| v)
        .collect();
    let (mean, std) = mean_std(&off);
    Some(CorrelationStats {
        mean,
        std,
        min: off.iter().copied().fold(f64::INFINITY, f64::min),
        max: off.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        median: median(&off),
    })
}
