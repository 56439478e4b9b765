//! Comparison of raw and denoised quality metrics.
//!
//! For every [`Metric`] the report holds the raw value, each method's value,
//! its signed delta and a direction-aware improvement percentage
//! (`> 0` always means "better"), plus the per-metric winner. The overall
//! winner is decided on the composite score alone, with a tie band of
//! `tie_epsilon` points.
use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::capability::Completeness;
use crate::metrics::{Direction, Metric, QualityMetricsSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Classical,
    Eigen,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MethodKind::Classical => "classical",
            MethodKind::Eigen => "eigen",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Classical,
    Eigen,
    Tie,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Winner::Classical => "classical",
            Winner::Eigen => "eigen",
            Winner::Tie => "tie",
        })
    }
}

/// Improvement of `processed` over `raw`, in percent, signed so that a
/// positive value means better. Neutral metrics report the plain relative
/// change. A zero `raw` gives `0` when unchanged and `±100` otherwise.
pub fn improvement_pct(raw: f64, processed: f64, direction: Direction) -> f64 {
    let sign = match direction {
        Direction::Neutral => 1.0,
        d => d.sign(),
    };
    let delta = processed - raw;
    if raw == 0.0 {
        return if delta == 0.0 { 0.0 } else { 100.0 * (delta * sign).signum() };
    }
    delta / raw.abs() * 100.0 * sign
}

/// Better of two values under `direction`; `None` for neutral metrics.
fn better(classical: f64, eigen: f64, direction: Direction) -> Option<Winner> {
    if direction == Direction::Neutral {
        return None;
    }
    let d = direction.sign() * (classical - eigen);
    Some(if d > 0.0 {
        Winner::Classical
    } else if d < 0.0 {
        Winner::Eigen
    } else {
        Winner::Tie
    })
}

// ── Report pieces ────────────────────────────────────────────────────────────

/// One method's value of a metric, relative to raw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MethodDelta {
    pub value: f64,
    pub delta: f64,
    pub improvement_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub direction: Direction,
    pub raw: Option<f64>,
    pub classical: Option<MethodDelta>,
    pub eigen: Option<MethodDelta>,
    /// Only when both methods produced the metric and it is ranked.
    pub winner: Option<Winner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverallResult {
    pub classical_score: f64,
    pub eigen_score: f64,
    /// `eigen_score − classical_score`.
    pub difference: f64,
    pub winner: Winner,
}

/// Metrics of one method's cleaned output.
#[derive(Debug, Clone, Copy)]
pub struct MethodMetrics<'a> {
    pub metrics: &'a QualityMetricsSet,
    pub completeness: &'a Completeness,
}

/// Immutable result of one comparison run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    raw_score: f64,
    classical: Option<MethodSummary>,
    eigen: Option<MethodSummary>,
    metrics: Vec<MetricComparison>,
    overall: Option<OverallResult>,
    tie_epsilon: f64,
    recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct MethodSummary {
    score: f64,
    grade: String,
    completeness: Completeness,
}

impl ComparisonReport {
    pub fn metrics(&self) -> &[MetricComparison] {
        &self.metrics
    }

    pub fn metric(&self, metric: Metric) -> Option<&MetricComparison> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    pub fn overall(&self) -> Option<&OverallResult> {
        self.overall.as_ref()
    }

    pub fn winner(&self) -> Option<Winner> {
        self.overall.map(|o| o.winner)
    }

    pub fn recommendation(&self) -> &str {
        &self.recommendation
    }

    pub fn tie_epsilon(&self) -> f64 {
        self.tie_epsilon
    }

    pub fn render(&self) -> String {
        let rule = "=".repeat(70);
        let thin = "-".repeat(70);
        let mut s = String::new();
        let _ = writeln!(s, "{rule}\nMETHOD COMPARISON REPORT\n{rule}\n");

        let _ = writeln!(s, "OVERALL QUALITY SCORES:\n{thin}");
        let _ = writeln!(s, "{:15} : {:6.2}/100", "RAW", self.raw_score);
        for (name, m) in [("CLASSICAL", &self.classical), ("EIGEN", &self.eigen)] {
            if let Some(m) = m {
                let _ = writeln!(
                    s,
                    "{name:15} : {:6.2}/100  ({})  [{}]",
                    m.score, m.grade, m.completeness
                );
            }
        }
        let _ = writeln!(s);

        let _ = writeln!(s, "DETAILED METRIC COMPARISON:\n{thin}");
        let _ = writeln!(
            s,
            "{:<20} {:>12} {:>12} {:>9} {:>12} {:>9}  {}",
            "metric", "raw", "classical", "Δ%", "eigen", "Δ%", "winner"
        );
        let fmt_opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
        for m in &self.metrics {
            let _ = writeln!(
                s,
                "{:<20} {:>12} {:>12} {:>9} {:>12} {:>9}  {}",
                m.metric.name(),
                fmt_opt(m.raw),
                fmt_opt(m.classical.map(|d| d.value)),
                m.classical.map_or_else(|| "-".into(), |d| format!("{:+.1}", d.improvement_pct)),
                fmt_opt(m.eigen.map(|d| d.value)),
                m.eigen.map_or_else(|| "-".into(), |d| format!("{:+.1}", d.improvement_pct)),
                m.winner.map_or_else(|| "-".into(), |w| w.to_string()),
            );
        }
        let _ = writeln!(s, "\nRECOMMENDATION:\n{thin}\n{}\n{rule}", self.recommendation);
        s
    }
}

// ── Comparison ───────────────────────────────────────────────────────────────

/// Compare raw metrics against whichever methods produced output.
pub fn compare(
    raw: &QualityMetricsSet,
    classical: Option<MethodMetrics<'_>>,
    eigen: Option<MethodMetrics<'_>>,
    tie_epsilon: f64,
) -> ComparisonReport {
    let delta_of = |m: Metric, set: Option<MethodMetrics<'_>>| -> Option<MethodDelta> {
        let value = set?.metrics.get(m)?;
        let r = raw.get(m)?;
        Some(MethodDelta {
            value,
            delta: value - r,
            improvement_pct: improvement_pct(r, value, m.direction()),
        })
    };

    let metrics: Vec<MetricComparison> = Metric::ALL
        .iter()
        .map(|&m| {
            let c = delta_of(m, classical);
            let e = delta_of(m, eigen);
            let winner = match (c, e) {
                (Some(c), Some(e)) => better(c.value, e.value, m.direction()),
                _ => None,
            };
            MetricComparison {
                metric: m,
                direction: m.direction(),
                raw: raw.get(m),
                classical: c,
                eigen: e,
                winner,
            }
        })
        .collect();

    let overall = match (classical, eigen) {
        (Some(c), Some(e)) => {
            let difference = e.metrics.score() - c.metrics.score();
            let winner = if difference.abs() < tie_epsilon {
                Winner::Tie
            } else if difference > 0.0 {
                Winner::Eigen
            } else {
                Winner::Classical
            };
            Some(OverallResult {
                classical_score: c.metrics.score(),
                eigen_score: e.metrics.score(),
                difference,
                winner,
            })
        }
        _ => None,
    };

    let summary = |m: MethodMetrics<'_>| MethodSummary {
        score: m.metrics.score(),
        grade: m.metrics.grade().to_string(),
        completeness: m.completeness.clone(),
    };

    let recommendation = recommend(raw, classical, eigen, overall.as_ref(), tie_epsilon);
    log::info!("[COMPARE] {recommendation}");

    ComparisonReport {
        raw_score: raw.score(),
        classical: classical.map(summary),
        eigen: eigen.map(summary),
        metrics,
        overall,
        tie_epsilon,
        recommendation,
    }
}

fn recommend(
    raw: &QualityMetricsSet,
    classical: Option<MethodMetrics<'_>>,
    eigen: Option<MethodMetrics<'_>>,
    overall: Option<&OverallResult>,
    tie_epsilon: f64,
) -> String {
    let mut s = match (overall, classical, eigen) {
        (Some(o), _, _) => match o.winner {
            Winner::Eigen => format!(
                "Eigen-subspace denoising outperformed the classical pipeline by {:.2} points \
                 ({:.1} vs {:.1}); prefer eigen-subspace denoising for this recording.",
                o.difference, o.eigen_score, o.classical_score
            ),
            Winner::Classical => format!(
                "The classical pipeline outperformed eigen-subspace denoising by {:.2} points \
                 ({:.1} vs {:.1}); prefer the classical pipeline for this recording.",
                -o.difference, o.classical_score, o.eigen_score
            ),
            Winner::Tie => format!(
                "Both methods achieved similar quality scores ({:.1} vs {:.1}, within {tie_epsilon} \
                 points); either method is acceptable.",
                o.classical_score, o.eigen_score
            ),
        },
        (None, Some(m), None) | (None, None, Some(m)) => {
            let name = if classical.is_some() { MethodKind::Classical } else { MethodKind::Eigen };
            let delta = m.metrics.score() - raw.score();
            format!(
                "Only the {name} method produced output: score {:.1} ({}), {:+.2} points versus raw.",
                m.metrics.score(),
                m.metrics.grade(),
                delta
            )
        }
        _ => "No denoised output available; only raw metrics were computed.".to_string(),
    };

    for (kind, m) in [(MethodKind::Classical, classical), (MethodKind::Eigen, eigen)] {
        if let Some(m) = m.filter(|m| m.completeness.is_partial()) {
            let _ = write!(
                s,
                " Note: the {kind} result is {}; it is not a fully cleaned result.",
                m.completeness
            );
        }
    }
    s
}
