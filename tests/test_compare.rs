mod common;
use common::{recording, sine, Noise};
use exgq::compare::{improvement_pct, MethodMetrics};
use exgq::metrics::Direction;
use exgq::{
    compare, Capability, Completeness, Metric, MetricsOptions, QualityMetricsSet, Winner,
};
use ndarray::Array2;

const SFREQ: f64 = 256.0;

fn alpha_with_noise(noise_std: f64, seed: u64) -> QualityMetricsSet {
    let n = (20.0 * SFREQ) as usize;
    let a = sine(10.0, 1.0, 0.0, SFREQ, n);
    let mut noise = Noise::new(seed);
    let data = Array2::from_shape_fn((4, n), |(c, t)| {
        (1.0 - 0.1 * c as f64) * a[t] + noise_std * noise.gaussian()
    });
    QualityMetricsSet::compute(&recording(data, SFREQ), MetricsOptions::default())
}

fn method<'a>(metrics: &'a QualityMetricsSet, completeness: &'a Completeness) -> MethodMetrics<'a> {
    MethodMetrics { metrics, completeness }
}

// ── Improvement percentages ───────────────────────────────────────────────────

#[test]
fn improvement_is_positive_when_better() {
    // SNR: higher is better.
    assert!(improvement_pct(5.0, 8.0, Direction::HigherIsBetter) > 0.0);
    // Artifacts: lower is better.
    assert!(improvement_pct(10.0, 4.0, Direction::LowerIsBetter) > 0.0);
    assert!(improvement_pct(4.0, 10.0, Direction::LowerIsBetter) < 0.0);
}

#[test]
fn snr_gain_is_reported_as_improvement() {
    let raw = alpha_with_noise(1.0, 1);
    let classical = raw.clone();
    let eigen = alpha_with_noise(0.05, 1);
    let complete = Completeness::Complete;

    let report = compare(&raw, Some(method(&classical, &complete)), Some(method(&eigen, &complete)), 1.0);
    let snr = report.metric(Metric::Snr).unwrap();

    assert!(snr.eigen.unwrap().improvement_pct > 0.0);
    assert_eq!(snr.classical.unwrap().improvement_pct, 0.0);
    assert_eq!(snr.classical.unwrap().delta, 0.0);
    assert_eq!(snr.winner, Some(Winner::Eigen));
    assert_eq!(snr.direction, Direction::HigherIsBetter);

    let overall = report.overall().unwrap();
    assert!((overall.difference - (eigen.score() - classical.score())).abs() < 1e-12);
    assert_eq!(report.winner(), Some(Winner::Eigen), "scores {overall:?}");
    assert!(report.recommendation().contains("Eigen-subspace denoising outperformed"));
}

#[test]
fn neutral_metrics_have_no_winner() {
    let raw = alpha_with_noise(0.5, 2);
    let a = alpha_with_noise(0.2, 3);
    let b = alpha_with_noise(0.1, 4);
    let complete = Completeness::Complete;
    let report = compare(&raw, Some(method(&a, &complete)), Some(method(&b, &complete)), 1.0);
    for m in report.metrics().iter().filter(|m| m.direction == Direction::Neutral) {
        assert_eq!(m.winner, None, "{} is neutral", m.metric);
    }
}

// ── Ties ──────────────────────────────────────────────────────────────────────

#[test]
fn identical_outputs_tie() {
    let raw = alpha_with_noise(0.5, 5);
    let cleaned = alpha_with_noise(0.2, 6);
    let complete = Completeness::Complete;
    let report =
        compare(&raw, Some(method(&cleaned, &complete)), Some(method(&cleaned, &complete)), 1.0);

    assert_eq!(report.winner(), Some(Winner::Tie));
    assert_eq!(report.overall().unwrap().difference, 0.0);
    for m in report.metrics() {
        assert!(matches!(m.winner, None | Some(Winner::Tie)), "{}: {:?}", m.metric, m.winner);
    }
    assert!(report.recommendation().contains("similar"));
}

#[test]
fn tie_epsilon_widens_the_tie_band() {
    let raw = alpha_with_noise(1.0, 7);
    let a = alpha_with_noise(0.3, 8);
    let b = alpha_with_noise(0.25, 9);
    let complete = Completeness::Complete;
    let diff = (b.score() - a.score()).abs();

    let strict = compare(&raw, Some(method(&a, &complete)), Some(method(&b, &complete)), 0.0);
    let loose =
        compare(&raw, Some(method(&a, &complete)), Some(method(&b, &complete)), diff + 1.0);
    if diff > 0.0 {
        assert_ne!(strict.winner(), Some(Winner::Tie));
    }
    assert_eq!(loose.winner(), Some(Winner::Tie));
    assert_eq!(loose.tie_epsilon(), diff + 1.0);
}

// ── Partial & single-method runs ──────────────────────────────────────────────

#[test]
fn single_method_has_no_overall_winner() {
    let raw = alpha_with_noise(1.0, 10);
    let eigen = alpha_with_noise(0.1, 10);
    let complete = Completeness::Complete;
    let report = compare(&raw, None, Some(method(&eigen, &complete)), 1.0);

    assert!(report.overall().is_none());
    assert!(report.winner().is_none());
    let snr = report.metric(Metric::Snr).unwrap();
    assert!(snr.classical.is_none());
    assert!(snr.eigen.is_some());
    assert_eq!(snr.winner, None);
    assert!(report.recommendation().contains("Only the eigen method"));
}

#[test]
fn partial_result_is_flagged() {
    let raw = alpha_with_noise(1.0, 11);
    let cleaned = alpha_with_noise(0.3, 12);
    let partial = Completeness::Partial { missing: vec![Capability::ArtifactSubspace] };
    let complete = Completeness::Complete;
    let report =
        compare(&raw, Some(method(&cleaned, &partial)), Some(method(&cleaned, &complete)), 1.0);

    assert!(report.recommendation().contains("classical result is partial"));
    assert!(report.render().contains("partial"));
}

#[test]
fn render_and_serialize() {
    let raw = alpha_with_noise(1.0, 13);
    let cleaned = alpha_with_noise(0.3, 14);
    let complete = Completeness::Complete;
    let report =
        compare(&raw, Some(method(&cleaned, &complete)), Some(method(&raw, &complete)), 1.0);

    let text = report.render();
    assert!(text.contains("METHOD COMPARISON REPORT"));
    assert!(text.contains(Metric::Snr.name()));

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["recommendation"].is_string());
    assert_eq!(json["metrics"].as_array().unwrap().len(), Metric::ALL.len());
}
