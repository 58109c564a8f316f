//! Writes the business and data understanding reports for the raw dataset.

use std::path::PathBuf;

use regionrisk::config::PipelineConfig;
use regionrisk::logging;
use regionrisk::pipeline;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let config = PipelineConfig::resolve(options.config.as_deref())
        .map_err(|err| err.to_string())?
        .with_overrides(options.input, options.out_dir);

    let outcome = pipeline::explore(&config).map_err(|err| err.to_string())?;
    let exploration = &outcome.exploration;
    let overview = &exploration.overview;
    println!(
        "records: {}  period: {}-{}  regencies: {}",
        overview.total_records, overview.year_min, overview.year_max, overview.regencies
    );
    println!(
        "with cases: {:.2}%  peak year: {}  trend: {}",
        exploration.target.non_zero_pct,
        exploration.insights.peak_year,
        exploration.insights.trend.label()
    );
    for path in &outcome.written {
        println!("wrote {}", path.display());
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    input: Option<PathBuf>,
    out_dir: Option<PathBuf>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config = Some(PathBuf::from(value));
            }
            "--input" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--input requires a value".to_string())?;
                options.input = Some(PathBuf::from(value));
            }
            "--out-dir" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--out-dir requires a value".to_string())?;
                options.out_dir = Some(PathBuf::from(value));
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "regionrisk-explore",
        "",
        "Describes the raw incident CSV: overview, target distribution, trends and hotspots.",
        "",
        "Usage:",
        "  regionrisk-explore [--config <file>] [--input <csv>] [--out-dir <dir>]",
        "",
        "Options:",
        "  --config <file>   Pipeline config (default: <app root>/regionrisk.toml, else built-in).",
        "  --input <csv>     Raw incident CSV (overrides input.path).",
        "  --out-dir <dir>   Output directory (overrides output.dir).",
    ]
    .join("\n")
}
