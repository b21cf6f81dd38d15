//! # wavefib
//!
//! Headless driver for the wave analysis engine: lists extrema and waves,
//! evaluates Fibonacci levels and confirmations, and replays the stepped
//! simulation of a wave.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, warn};
use wavefib::{
    config::{AnalysisConfig, SettingMeta, SETTINGS},
    parser::parse_date,
    prelude::*,
};

#[derive(Parser)]
#[command(name = "wavefib", version, about = "Peak/valley waves with Fibonacci confirmation")]
struct Cli {
    /// TOML file with analysis settings
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override one setting, e.g. `--set margin=3` (repeatable)
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// First date to include (inclusive)
    #[arg(long, global = true)]
    from: Option<String>,

    /// Last date to include (inclusive)
    #[arg(long, global = true)]
    to: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect extrema and list waves for one or more files
    Waves {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Fibonacci levels and confirmation bars of one wave
    Levels {
        file: PathBuf,

        #[command(flatten)]
        wave: WaveArg,

        /// Reveal only levels up to this completion fraction
        #[arg(long)]
        completion: Option<String>,
    },

    /// Step through the simulation of one wave
    Simulate {
        file: PathBuf,

        #[command(flatten)]
        wave: WaveArg,

        /// Sleep the configured tick interval between steps
        #[arg(long)]
        realtime: bool,
    },

    /// Count extrema and waves for every margin in the sweep range
    Sweep { file: PathBuf },

    /// List overridable settings with their defaults
    Settings,
}

#[derive(clap::Args)]
#[group(multiple = false)]
struct WaveArg {
    /// Wave description, e.g. "2/2/2021 - 2/5/2021"
    #[arg(long)]
    wave: Option<String>,

    /// Position in the wave list (default 0)
    #[arg(long)]
    index: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wavefib=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), &cli.overrides)?;
    let range = DateRange::parse(cli.from.as_deref(), cli.to.as_deref())?;
    let analyzer = AnalyzerBuilder::from_config(config).build()?;

    match cli.command {
        Commands::Waves { files } => waves(&analyzer, &files, range, cli.json),
        Commands::Levels {
            file,
            wave,
            completion,
        } => {
            let completion = completion
                .map(|c| Ratio::new(c.parse()?).map_err(anyhow::Error::from))
                .transpose()
                .context("--completion must be a fraction in [0, 1]")?;
            levels(&analyzer, &file, &wave, range, completion, cli.json)
        }
        Commands::Simulate {
            file,
            wave,
            realtime,
        } => simulate(&analyzer, &file, &wave, range, realtime, cli.json),
        Commands::Sweep { file } => sweep(&analyzer, &file, range),
        Commands::Settings => {
            for s in SETTINGS {
                println!("{:<18} {:<8} {}", s.name, s.default, s.description);
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, overrides: &[String]) -> Result<AnalysisConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    for item in overrides {
        let (key, value) = item
            .split_once('=')
            .with_context(|| format!("expected KEY=VALUE, got {item:?}"))?;
        config.apply(key.trim(), value)?;
    }
    Ok(config)
}

#[derive(Clone, Copy)]
struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateRange {
    fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let start = match from {
            Some(s) => parse_date(s)?,
            None => NaiveDateTime::MIN,
        };
        let end = match to {
            // a bare date covers the whole day
            Some(s) => {
                let ts = parse_date(s)?;
                if ts.time() == chrono::NaiveTime::MIN {
                    ts.date().and_hms_opt(23, 59, 59).unwrap_or(ts)
                } else {
                    ts
                }
            }
            None => NaiveDateTime::MAX,
        };
        if start > end {
            warn!(%start, %end, "inverted date range selects nothing");
        }
        Ok(Self { start, end })
    }
}

fn load(path: &Path) -> Result<Series> {
    let ingest = Series::load(path).with_context(|| format!("loading {}", path.display()))?;
    info!(
        file = %path.display(),
        bars = ingest.series.len(),
        dropped = ingest.rows_dropped,
        "loaded"
    );
    Ok(ingest.series)
}

fn symbol(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn waves(analyzer: &WaveAnalyzer, files: &[PathBuf], range: DateRange, json: bool) -> Result<()> {
    let loaded = files
        .iter()
        .map(|path| Ok((symbol(path), load(path)?)))
        .collect::<Result<Vec<_>>>()?;
    let instruments: Vec<(&str, &Series)> = loaded.iter().map(|(s, series)| (s.as_str(), series)).collect();

    let reports = analyze_parallel(analyzer, instruments, range.start, range.end);
    if json {
        return print_json(&reports);
    }

    for (report, (_, series)) in reports.iter().zip(&loaded) {
        println!("== {} ({} of {} bars)", report.symbol, report.view_len, report.source_len);
        match report.status {
            ViewStatus::NoData => {
                println!("   no data");
                continue;
            }
            ViewStatus::EmptyRange => {
                println!("   no bars in the selected range");
                continue;
            }
            ViewStatus::Ready(_) => {}
        }

        let view = series.filter_by_date(range.start, range.end);
        if let Some((lo, hi)) = view.price_bounds().padded(analyzer.config().display_buffer) {
            println!("   axis {lo} .. {hi}");
        }
        for p in &report.extrema.peaks {
            println!("   peak   #{:<4} {}  {}", p.index, p.date.date(), p.price);
        }
        for v in &report.extrema.valleys {
            println!("   valley #{:<4} {}  {}", v.index, v.date.date(), v.price);
        }
        for (i, wave) in report.waves.iter().enumerate() {
            let arrow = if wave.is_up() { "up  " } else { "down" };
            println!("   [{i:>3}] {arrow} {}", wave.describe(&view)?);
        }
    }
    Ok(())
}

fn pick_wave(analysis: &Analysis<'_>, arg: &WaveArg) -> Result<Wave> {
    if let Some(description) = &arg.wave {
        return analysis
            .find_wave(description)
            .with_context(|| format!("no wave matches {description:?}"));
    }
    let index = arg.index.unwrap_or(0);
    match analysis.waves.get(index) {
        Some(wave) => Ok(*wave),
        None => bail!("wave {index} requested but only {} detected", analysis.waves.len()),
    }
}

#[derive(serde::Serialize)]
struct LevelsReport {
    wave: String,
    retracement: Retracement,
    levels: Vec<FibLevel>,
    confirmations: Vec<Confirmation>,
}

fn levels(
    analyzer: &WaveAnalyzer,
    file: &Path,
    arg: &WaveArg,
    range: DateRange,
    completion: Option<Ratio>,
    json: bool,
) -> Result<()> {
    let series = load(file)?;
    let analysis = analyzer.analyze(&series, range.start, range.end);
    let wave = pick_wave(&analysis, arg)?;

    let retracement = Retracement::for_wave(&wave, &analysis.view)?;
    let levels = retracement.levels(completion);
    let confirmations = analyzer.confirm(&retracement, &analysis.view, &levels);
    let report = LevelsReport {
        wave: wave.describe(&analysis.view)?,
        retracement,
        levels,
        confirmations,
    };
    if json {
        return print_json(&report);
    }

    println!("wave {}  low {}  high {}", report.wave, retracement.low(), retracement.high());
    for level in &report.levels {
        println!("   {:>6}  {}", level.ratio * Decimal::ONE_HUNDRED, level.price);
    }
    println!("confirmations: {}", report.confirmations.len());
    for c in &report.confirmations {
        let date = analysis.view.bar(c.index)?.date();
        println!("   #{:<4} {}  at {}", c.index, date, c.level.price);
    }
    Ok(())
}

fn simulate(
    analyzer: &WaveAnalyzer,
    file: &Path,
    arg: &WaveArg,
    range: DateRange,
    realtime: bool,
    json: bool,
) -> Result<()> {
    let series = load(file)?;
    let analysis = analyzer.analyze(&series, range.start, range.end);
    let wave = pick_wave(&analysis, arg)?;

    let mut clock = SimulationClock::default();
    analyzer.start(&mut clock, wave, &analysis.view)?;
    let interval = analyzer.config().simulation.tick_interval();

    let mut frames = Vec::new();
    loop {
        match clock.tick()? {
            Tick::Advanced { step, price } => {
                let retracement = Retracement::simulated(&wave, &analysis.view, &clock)?;
                let levels = retracement.levels(Some(clock.completion()));
                let hits = analyzer.confirm(&retracement, &analysis.view, &levels).len();
                if json {
                    frames.push(clock.snapshot());
                } else {
                    println!(
                        "step {step:>3}/{}  price {price}  levels {}  confirmations {hits}",
                        clock.max_steps().get(),
                        levels.len()
                    );
                }
                if realtime {
                    std::thread::sleep(interval);
                }
            }
            Tick::Completed { step } => {
                if !json {
                    println!("completed at step {step}");
                }
                break;
            }
        }
    }

    if json {
        print_json(&frames)?;
    }
    Ok(())
}

fn sweep(analyzer: &WaveAnalyzer, file: &Path, range: DateRange) -> Result<()> {
    let series = load(file)?;
    let Some(meta) = SettingMeta::find("margin") else {
        bail!("margin has no sweep range");
    };

    for value in meta.grid() {
        let mut config = analyzer.config().clone();
        config.apply("margin", &value.to_string())?;
        let analysis = AnalyzerBuilder::from_config(config)
            .build()?
            .analyze(&series, range.start, range.end);
        println!(
            "margin {value}: {} peaks, {} valleys, {} waves",
            analysis.extrema.peaks.len(),
            analysis.extrema.valleys.len(),
            analysis.waves.len()
        );
    }
    Ok(())
}
