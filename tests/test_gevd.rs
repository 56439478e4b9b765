mod common;
use common::{eeg_like, max_abs_diff, recording, row_variance, sines_plus_noise, Noise};
use exgq::gevd::{count_above_one, knee_index, select_kept};
use exgq::{
    condition, metrics, AnalysisConfig, Capabilities, Denoiser, Error, MethodDetail,
    MetricsOptions, RecordingMatrix, Stage, ThresholdStrategy,
};
use ndarray::Array2;

const SFREQ: f64 = 256.0;

fn eigen_report(detail: &MethodDetail) -> &exgq::EigenReport {
    match detail {
        MethodDetail::Eigen(r) => r,
        other => panic!("expected eigen detail, got {other:?}"),
    }
}

fn noisy_conditioned(cfg: &AnalysisConfig) -> RecordingMatrix {
    let rec = recording(eeg_like(6, SFREQ, 20.0, 3.0, 7), SFREQ);
    condition(&rec, cfg, &exgq::FirFilter).unwrap()
}

// ── Already-clean input ───────────────────────────────────────────────────────

#[test]
fn clean_input_passes_through_unchanged() {
    // Four channels, one narrowband sine each, almost no broadband noise:
    // every direction has far more 1–40 Hz power than noise power.
    let rec = recording(sines_plus_noise(4, &[6.0, 9.0, 11.0, 14.0], 0.01, SFREQ, 20.0, 1), SFREQ);
    let cfg = AnalysisConfig::default();
    let caps = Capabilities::builtin();

    let out = Denoiser::eigen(&cfg, &caps).denoise(&rec).unwrap();
    let report = eigen_report(&out.detail);

    assert!(
        report.eigenvalues.iter().all(|&l| l > 1.0),
        "eigenvalues {:?} should all exceed 1",
        report.eigenvalues
    );
    assert_eq!(report.kept, 4);
    assert_eq!(report.discarded, 0);
    assert_eq!(report.removed_power_pct, 0.0);
    assert_eq!(out.cleaned.data(), rec.data(), "nothing discarded → output must equal input");

    let before = metrics(&rec, MetricsOptions::default());
    let after = metrics(&out.cleaned, MetricsOptions::default());
    assert!(after.score() >= before.score());
}

#[test]
fn white_noise_with_no_component_above_threshold_fails() {
    // Unfiltered white noise: the 1–40 Hz band holds under a third of the
    // power, the noise covariance well over half, so every λ < 1.
    let mut noise = Noise::new(3);
    let data = Array2::from_shape_fn((4, (20.0 * SFREQ) as usize), |_| noise.gaussian());
    let rec = recording(data, SFREQ);
    let cfg = AnalysisConfig::default();
    let caps = Capabilities::builtin();

    let err = Denoiser::eigen(&cfg, &caps).denoise(&rec).unwrap_err();
    assert!(matches!(err, Error::Numerical { stage: Stage::Thresholding, .. }), "got {err:?}");
}

// ── Noisy input ───────────────────────────────────────────────────────────────

#[test]
fn broadband_channel_noise_is_discarded() {
    let cfg = AnalysisConfig::default();
    let caps = Capabilities::builtin();
    let conditioned = noisy_conditioned(&cfg);

    let out = Denoiser::eigen(&cfg, &caps).denoise(&conditioned).unwrap();
    let report = eigen_report(&out.detail);

    assert!(report.kept >= 1 && report.kept < 6, "kept {} of 6", report.kept);
    assert_eq!(report.kept + report.discarded, 6);
    assert!(report.removed_power_pct > 0.0 && report.removed_power_pct <= 100.0);

    let before = row_variance(conditioned.data(), 0);
    let after = row_variance(out.cleaned.data(), 0);
    assert!(after < 0.5 * before, "channel 0 variance {before:.3} → {after:.3}");

    let snr_before = metrics(&conditioned, MetricsOptions::default()).snr_db();
    let snr_after = metrics(&out.cleaned, MetricsOptions::default()).snr_db();
    assert!(snr_after > snr_before, "SNR {snr_before:.2} → {snr_after:.2} dB");
}

#[test]
fn channels_and_labels_preserved() {
    let cfg = AnalysisConfig::default();
    let caps = Capabilities::builtin();
    let conditioned = noisy_conditioned(&cfg);
    let out = Denoiser::eigen(&cfg, &caps).denoise(&conditioned).unwrap();

    assert_eq!(out.cleaned.n_channels(), conditioned.n_channels());
    assert_eq!(out.cleaned.n_samples(), conditioned.n_samples());
    assert_eq!(out.cleaned.ch_names(), conditioned.ch_names());
    assert_eq!(out.cleaned.sfreq(), conditioned.sfreq());
}

#[test]
fn eigenvalues_sorted_descending() {
    let cfg = AnalysisConfig::default();
    let caps = Capabilities::builtin();
    let out = Denoiser::eigen(&cfg, &caps).denoise(&noisy_conditioned(&cfg)).unwrap();
    let ev = &eigen_report(&out.detail).eigenvalues;
    assert!(ev.windows(2).all(|w| w[0] >= w[1]), "eigenvalues not sorted: {ev:?}");
    assert!(ev.iter().all(|l| l.is_finite()));
}

#[test]
fn eigen_denoising_is_deterministic() {
    let cfg = AnalysisConfig::default();
    let caps = Capabilities::builtin();
    let conditioned = noisy_conditioned(&cfg);
    let a = Denoiser::eigen(&cfg, &caps).denoise(&conditioned).unwrap();
    let b = Denoiser::eigen(&cfg, &caps).denoise(&conditioned).unwrap();
    assert_eq!(a, b);
    assert_eq!(max_abs_diff(a.cleaned.data(), b.cleaned.data()), 0.0);
}

// ── Strategy & stages ─────────────────────────────────────────────────────────

#[test]
fn knee_strategy_is_reported() {
    let cfg = AnalysisConfig {
        eigenvalue_threshold_strategy: ThresholdStrategy::KneeDetection,
        ..AnalysisConfig::default()
    };
    let caps = Capabilities::builtin();
    let out = Denoiser::eigen(&cfg, &caps).denoise(&noisy_conditioned(&cfg)).unwrap();
    let report = eigen_report(&out.detail);
    assert_eq!(report.strategy, ThresholdStrategy::KneeDetection);
    assert!(report.kept >= 1);
    assert_eq!(report.kept, select_kept(&report.eigenvalues, ThresholdStrategy::KneeDetection));
}

#[test]
fn threshold_rules_on_fixed_curves() {
    let ev = [40.0, 20.0, 1.0, 0.5, 0.4];
    assert_eq!(count_above_one(&ev), 2, "λ = 1 must not be kept");
    assert_eq!(select_kept(&ev, ThresholdStrategy::FixedOne), 2);
    assert!(knee_index(&ev).is_some());
    // A straight line has no knee; the fixed rule decides.
    let line = [4.0, 3.0, 2.0, 1.0, 0.0];
    assert_eq!(knee_index(&line), None);
    assert_eq!(select_kept(&line, ThresholdStrategy::KneeDetection), 3);
}

#[test]
fn checkpoints_follow_stage_order() {
    let cfg = AnalysisConfig::default();
    let caps = Capabilities::builtin();
    let conditioned = noisy_conditioned(&cfg);
    let mut seen = Vec::new();
    Denoiser::eigen(&cfg, &caps)
        .denoise_with(&conditioned, &mut |stage| {
            seen.push(stage);
            Ok(())
        })
        .unwrap();
    assert_eq!(
        seen,
        [
            Stage::Covariance,
            Stage::Eigendecomposition,
            Stage::Thresholding,
            Stage::SubspaceReconstruction
        ]
    );
}
