mod common;
use common::{names, recording, sine, Noise};
use exgq::metrics::BadChannelReason;
use exgq::{metrics, Grade, Metric, MetricsOptions, PsdQuality, QualityMetricsSet, RecordingMatrix};
use ndarray::Array2;

const SFREQ: f64 = 256.0;

fn white(n_ch: usize, secs: f64, std: f64, seed: u64) -> Array2<f64> {
    let mut noise = Noise::new(seed);
    Array2::from_shape_fn((n_ch, (secs * SFREQ) as usize), |_| std * noise.gaussian())
}

fn alpha_plus_white(n_ch: usize, secs: f64, noise_std: f64, seed: u64) -> Array2<f64> {
    let n = (secs * SFREQ) as usize;
    let a = sine(10.0, 1.0, 0.0, SFREQ, n);
    let mut noise = Noise::new(seed);
    Array2::from_shape_fn((n_ch, n), |(_, t)| a[t] + noise_std * noise.gaussian())
}

fn compute(data: Array2<f64>) -> QualityMetricsSet {
    metrics(&recording(data, SFREQ), MetricsOptions::default())
}

// ── PSD slope ─────────────────────────────────────────────────────────────────

#[test]
fn psd_quality_bucket_boundaries() {
    assert_eq!(PsdQuality::from_slope(0.05), PsdQuality::Garbage);
    assert_eq!(PsdQuality::from_slope(-0.05), PsdQuality::Poor);
    assert_eq!(PsdQuality::from_slope(-0.15), PsdQuality::Fair);
    assert_eq!(PsdQuality::from_slope(-0.25), PsdQuality::Good);
    assert_eq!(PsdQuality::from_slope(-0.35), PsdQuality::Excellent);
}

#[test]
fn white_noise_has_flat_spectrum() {
    let m = compute(white(4, 30.0, 1.0, 11));
    let slope = m.psd_slope().mean;
    assert!(slope.abs() < 0.05, "white-noise slope {slope:.4} should be ≈ 0");
    assert_eq!(m.psd_slope().per_channel.len(), 4);
}

#[test]
fn brown_noise_has_falling_spectrum() {
    let mut noise = Noise::new(12);
    let n = (30.0 * SFREQ) as usize;
    let mut data = Array2::zeros((4, n));
    for mut row in data.rows_mut() {
        let mut acc = 0.0;
        for v in row.iter_mut() {
            acc += noise.gaussian();
            *v = acc;
        }
    }
    let brown = compute(data);
    let flat = compute(white(4, 30.0, 1.0, 13));
    assert!(
        brown.psd_slope().mean < -0.1,
        "1/f² slope {:.4} should be clearly negative",
        brown.psd_slope().mean
    );
    assert!(brown.sub_scores().psd_slope > flat.sub_scores().psd_slope);
}

// ── SNR ───────────────────────────────────────────────────────────────────────

#[test]
fn broadband_noise_lowers_snr() {
    let clean = compute(alpha_plus_white(4, 20.0, 0.05, 21));
    let noisy = compute(alpha_plus_white(4, 20.0, 1.0, 21));
    assert!(
        clean.snr_db() > noisy.snr_db() + 10.0,
        "clean SNR {:.2} dB vs noisy {:.2} dB",
        clean.snr_db(),
        noisy.snr_db()
    );
}

#[test]
fn snr_is_alpha_power_over_high_band_power() {
    let n = (20.0 * SFREQ) as usize;
    let alpha = sine(10.0, 1.0, 0.0, SFREQ, n);
    let beta = sine(30.0, 3.0, 0.2, SFREQ, n);
    let high = sine(70.0, 1.0, 0.5, SFREQ, n);

    // Equal power at 10 Hz and 70 Hz; the 30 Hz line sits in neither band.
    let data = Array2::from_shape_fn((2, n), |(_, t)| alpha[t] + beta[t] + high[t]);
    let m = compute(data);
    assert!(m.snr_db().abs() < 0.5, "SNR {:.3} dB should be ≈ 0", m.snr_db());

    // Ten times the alpha amplitude: +20 dB.
    let data = Array2::from_shape_fn((2, n), |(_, t)| 10.0 * alpha[t] + beta[t] + high[t]);
    let m = compute(data);
    assert!((m.snr_db() - 20.0).abs() < 0.5, "SNR {:.3} dB should be ≈ 20", m.snr_db());
}

#[test]
fn silent_recording_hits_snr_ceiling() {
    let m = compute(Array2::zeros((3, 2048)));
    assert_eq!(m.snr_db(), 100.0);
    assert!(m.score().is_finite());
}

// ── Artifacts & kurtosis ──────────────────────────────────────────────────────

#[test]
fn clean_sine_has_no_artifacts() {
    let m = compute(alpha_plus_white(3, 10.0, 0.0, 0));
    assert_eq!(m.artifacts().total_pct, 0.0);
}

#[test]
fn spikes_raise_artifacts_and_kurtosis() {
    let clean = alpha_plus_white(3, 10.0, 0.1, 31);
    let mut spiky = clean.clone();
    for t in (100..spiky.ncols()).step_by(500) {
        spiky[[1, t]] += 40.0;
    }
    let a = compute(clean);
    let b = compute(spiky);
    assert!(b.artifacts().total_pct > a.artifacts().total_pct);
    assert!(b.artifacts().amplitude_pct > 0.0);
    assert!(b.kurtosis().mean_abs > a.kurtosis().mean_abs);
    assert!(b.kurtosis().n_high >= 1, "spiky channel kurtosis {:.2}", b.kurtosis().max);
}

// ── Bad channels ──────────────────────────────────────────────────────────────

fn alternating(amplitudes: &[f64], n: usize) -> Array2<f64> {
    Array2::from_shape_fn((amplitudes.len(), n), |(c, t)| {
        if t % 2 == 0 { amplitudes[c] } else { -amplitudes[c] }
    })
}

#[test]
fn one_noisy_channel_of_four() {
    // Variances 1, 1, 1, 20 → median 1.
    let m = compute(alternating(&[1.0, 1.0, 1.0, 20f64.sqrt()], 2048));
    let bad = m.bad_channels();
    assert_eq!(bad.count, 1);
    assert_eq!(bad.pct, 25.0);
    assert_eq!(bad.channels[0].label, names(4)[3]);
    assert_eq!(bad.channels[0].reason, BadChannelReason::Noisy);
}

#[test]
fn flat_channel_detected() {
    let m = compute(alternating(&[1.0, 1.0, 0.2, 1.0, 1.0], 2048));
    let bad = m.bad_channels();
    assert_eq!(bad.count, 1);
    assert_eq!(bad.channels[0].reason, BadChannelReason::Flat);
}

// ── Band powers ───────────────────────────────────────────────────────────────

#[test]
fn alpha_sine_dominates_band_powers() {
    let m = compute(alpha_plus_white(4, 20.0, 0.01, 41));
    let b = m.bands();
    let total: f64 = b.relative_pct.iter().sum();
    assert!((total - 100.0).abs() < 1e-9, "relative powers sum to {total}");
    assert!(b.relative_pct[2] > 90.0, "alpha share {:.1}%", b.relative_pct[2]);
    assert!(b.alpha_delta_ratio > 10.0);
}

// ── Correlation ───────────────────────────────────────────────────────────────

#[test]
fn correlation_can_be_disabled() {
    let rec = recording(alpha_plus_white(4, 10.0, 0.1, 51), SFREQ);
    let on = metrics(&rec, MetricsOptions::default());
    let off = metrics(&rec, MetricsOptions { channel_correlation: false });

    assert!(on.get(Metric::ChannelCorrelation).unwrap() > 0.9);
    assert!(off.get(Metric::ChannelCorrelation).is_none());
    assert!(off.correlation().is_none());
    assert!(!off.values().contains_key(Metric::ChannelCorrelation.name()));
    assert!(off.sub_scores().correlation.is_none());
}

#[test]
fn single_channel_has_no_correlation() {
    let m = compute(alpha_plus_white(1, 10.0, 0.1, 52));
    assert!(m.correlation().is_none());
    assert!((0.0..=100.0).contains(&m.score()));
}

// ── Score & grade ─────────────────────────────────────────────────────────────

#[test]
fn grade_thresholds() {
    assert_eq!(Grade::from_score(95.0), Grade::APlus);
    assert_eq!(Grade::from_score(90.0), Grade::APlus);
    assert_eq!(Grade::from_score(89.99), Grade::A);
    assert_eq!(Grade::from_score(70.0), Grade::B);
    assert_eq!(Grade::from_score(65.0), Grade::C);
    assert_eq!(Grade::from_score(50.0), Grade::D);
    assert_eq!(Grade::from_score(10.0), Grade::F);
    assert_eq!(serde_json::to_string(&Grade::APlus).unwrap(), "\"A+\"");
}

#[test]
fn score_matches_grade_and_range() {
    for seed in 0..3 {
        let m = compute(alpha_plus_white(4, 10.0, 0.3, seed));
        assert!((0.0..=100.0).contains(&m.score()), "score {}", m.score());
        assert_eq!(m.grade(), Grade::from_score(m.score()));
    }
}

#[test]
fn metrics_are_deterministic() {
    let rec: RecordingMatrix = recording(alpha_plus_white(5, 15.0, 0.5, 61), SFREQ);
    let a = metrics(&rec, MetricsOptions::default());
    let b = metrics(&rec, MetricsOptions::default());
    assert_eq!(a, b);
}

#[test]
fn report_mentions_score_and_grade() {
    let m = compute(alpha_plus_white(4, 10.0, 0.3, 71));
    let text = m.render_report();
    assert!(text.contains(&m.grade().to_string()));
    assert!(text.contains("Signal-to-Noise"), "report:\n{text}");
}
