use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use exgq::{
    io::{load_recording, write_recording},
    AnalysisConfig, AnalysisReport, Analyzer, Capabilities, Method, ThresholdStrategy,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MethodArg {
    Classical,
    Eigen,
    Both,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    FixedOne,
    KneeDetection,
}

#[derive(Parser, Debug)]
#[command(name = "exgq", about = "EEG quality assessment and denoising comparison")]
struct Args {
    /// Recording(s) in safetensors format (`data`, `sfreq`, optional `ch_names`)
    #[arg(long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Directory for cleaned recordings and reports
    #[arg(long, default_value = "exgq_out")]
    output_dir: PathBuf,

    /// JSON file with an AnalysisConfig; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    method: Option<MethodArg>,

    /// Bandpass lower edge (Hz)
    #[arg(long)]
    low_freq: Option<f64>,

    /// Bandpass upper edge (Hz)
    #[arg(long)]
    high_freq: Option<f64>,

    /// Notch frequency (Hz); 0 disables the notch
    #[arg(long)]
    notch_freq: Option<f64>,

    /// ICA random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Eigenvalue threshold strategy for the eigen pipeline
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Skip the channel-correlation metric
    #[arg(long)]
    no_correlation: bool,
}

fn build_config(args: &Args) -> Result<AnalysisConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    if let Some(m) = args.method {
        cfg.method = match m {
            MethodArg::Classical => Method::Classical,
            MethodArg::Eigen => Method::Eigen,
            MethodArg::Both => Method::Both,
        };
    }
    if let Some(v) = args.low_freq {
        cfg.low_freq = v;
    }
    if let Some(v) = args.high_freq {
        cfg.high_freq = v;
    }
    if let Some(v) = args.notch_freq {
        cfg.notch_freq = (v > 0.0).then_some(v);
    }
    if let Some(v) = args.seed {
        cfg.ica_seed = v;
    }
    if let Some(s) = args.strategy {
        cfg.eigenvalue_threshold_strategy = match s {
            StrategyArg::FixedOne => ThresholdStrategy::FixedOne,
            StrategyArg::KneeDetection => ThresholdStrategy::KneeDetection,
        };
    }
    if args.no_correlation {
        cfg.channel_correlation = false;
    }
    Ok(cfg)
}

fn write_outputs(report: &AnalysisReport, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for run in report.runs() {
        let path = dir.join(format!("{}_clean.safetensors", run.outcome.method));
        write_recording(&run.outcome.cleaned, &path)?;
        println!("Written → {}", path.display());
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(dir.join("report.json"), json)?;
    std::fs::write(dir.join("quality_raw.txt"), report.raw_metrics().render_report())?;
    for run in report.runs() {
        std::fs::write(
            dir.join(format!("quality_{}.txt", run.outcome.method)),
            run.metrics.render_report(),
        )?;
    }
    std::fs::write(dir.join("comparison.txt"), report.comparison().render())?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = build_config(&args)?;

    let analyzer = Analyzer::new(cfg, Capabilities::builtin());
    let outcomes = analyzer.analyze_batch(args.input.clone(), |path| {
        load_recording(path).map_err(|e| exgq::Error::Data(format!("{e:#}")))
    });

    let single = outcomes.len() == 1;
    let mut failed = 0usize;
    for outcome in outcomes {
        let name = outcome.source.display().to_string();
        match outcome.result {
            Ok(report) => {
                println!("{}", report.raw_metrics().render_report());
                for run in report.runs() {
                    println!("[{}]\n{}", run.outcome.method, run.metrics.render_report());
                }
                for f in report.failures() {
                    eprintln!("{name}: {} method failed: {}", f.method, f.message);
                }
                println!("{}", report.comparison().render());

                let dir = if single {
                    args.output_dir.clone()
                } else {
                    let stem = outcome
                        .source
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "recording".into());
                    args.output_dir.join(stem)
                };
                write_outputs(&report, &dir)?;
            }
            Err(e) => {
                failed += 1;
                eprintln!("{name}: {e}");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} recording(s) failed");
    }
    Ok(())
}
