//! nstar-sim
//!
//! Runs the Nested STAR threshold sweep over a CSV dataset (or a synthetic
//! workload) and prints one report block per threshold to stdout.
//!
//! ```text
//! nstar-sim [--config sim.toml] [--format location|attributes] [--attrs N]
//!           [--workers N] [--json] [--log-json] [--synthetic N] [--seed S]
//!           [--thresholds 2,4,8] [<csv-file>]
//! ```

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use nstar_sim::ingest::read_file;
use nstar_sim::observability::{init_tracing, tracing_sink};
use nstar_sim::report::render;
use nstar_sim::{
    IngestPipeline, NestedStar, OutputFormat, RecordFormat, RecordParser, SimConfig,
    WorkloadConfig, WorkloadGenerator,
};
use std::path::PathBuf;
use tracing::{error, info};

const USAGE: &str = "usage: nstar-sim [--config <file.toml>] [--format location|attributes] \
[--attrs N] [--workers N] [--json] [--log-json] [--synthetic N] [--seed S] \
[--thresholds a,b,c] [<csv-file>]";

/// Command-line overrides; anything unset keeps the config file's value
#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    input: Option<PathBuf>,
    format: Option<RecordFormat>,
    num_attrs: Option<usize>,
    workers: Option<usize>,
    thresholds: Option<Vec<u64>>,
    synthetic: Option<u64>,
    seed: Option<u64>,
    json: bool,
    log_json: bool,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();

    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .ok_or_else(|| format!("{} requires a value", name))
        };
        match arg.as_str() {
            "--config" => cli.config = Some(PathBuf::from(value("--config")?)),
            "--format" => cli.format = Some(value("--format")?.parse()?),
            "--attrs" => cli.num_attrs = Some(parse_number(&value("--attrs")?)?),
            "--workers" => cli.workers = Some(parse_number(&value("--workers")?)?),
            "--synthetic" => cli.synthetic = Some(parse_number(&value("--synthetic")?)?),
            "--seed" => cli.seed = Some(parse_number(&value("--seed")?)?),
            "--thresholds" => {
                cli.thresholds = Some(
                    value("--thresholds")?
                        .split(',')
                        .map(|k| parse_number::<u64>(k.trim()))
                        .collect::<Result<_, _>>()?,
                )
            }
            "--json" => cli.json = true,
            "--log-json" => cli.log_json = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => return Err(format!("unknown flag {}", flag)),
            path => {
                if cli.input.is_some() {
                    return Err(format!("unexpected argument {}", path));
                }
                cli.input = Some(PathBuf::from(path));
            }
        }
    }

    Ok(cli)
}

fn parse_number<T: std::str::FromStr>(s: &str) -> Result<T, String> {
    s.parse().map_err(|_| format!("invalid number {:?}", s))
}

fn build_config(cli: CliArgs) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };

    if let Some(input) = cli.input {
        config.input = Some(input);
    }
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(num_attrs) = cli.num_attrs {
        config.num_attrs = num_attrs;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(thresholds) = cli.thresholds {
        config.thresholds = thresholds;
    }
    if cli.json {
        config.output = OutputFormat::Json;
    }
    if cli.log_json {
        config.log_json = true;
    }
    if cli.synthetic.is_some() || cli.seed.is_some() {
        let mut workload = config
            .synthetic
            .take()
            .unwrap_or_else(|| WorkloadConfig::default().with_attrs(config.num_attrs));
        if let Some(count) = cli.synthetic {
            workload.num_measurements = count;
        }
        if let Some(seed) = cli.seed {
            workload.seed = seed;
        }
        config.synthetic = Some(workload);
    }

    config.validate()?;
    Ok(config)
}

/// Build the tree through the single-writer pipeline
fn load(config: &SimConfig) -> Result<NestedStar, Box<dyn std::error::Error>> {
    let star = NestedStar::new(config.num_attrs).with_workers(config.workers);
    let sink = tracing_sink();
    let pipeline = IngestPipeline::spawn(star, config.queue_capacity, sink.clone())?;

    if let Some(workload) = &config.synthetic {
        info!(
            seed = workload.seed,
            measurements = workload.num_measurements,
            "Generating synthetic workload"
        );
        for msmt in WorkloadGenerator::new(workload.clone()) {
            pipeline.submit(msmt)?;
        }
    } else if let Some(input) = &config.input {
        let parser = RecordParser::new(config.format, config.num_attrs);
        let stats = read_file(input, &parser, &*sink, |msmt| pipeline.submit(msmt))?;
        if stats.skipped > 0 {
            info!(skipped = stats.skipped, "Skipped malformed records");
        }
    }

    let (star, stats) = pipeline.finish()?;
    info!(
        inserted = stats.inserted,
        rejected = stats.rejected,
        tags = star.num_tags(),
        leaf_tags = star.num_leaf_tags(),
        "Measurement tree built"
    );
    Ok(star)
}

fn run(config: &SimConfig) -> Result<(), Box<dyn std::error::Error>> {
    let star = load(config)?;
    let reports = star.sweep(&config.thresholds)?;
    print!("{}", render(&reports, config.output)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    let config = build_config(cli)?;
    init_tracing(config.log_json).map_err(|e| e.to_string())?;

    if let Err(e) = run(&config) {
        error!("Simulation failed: {}", e);
        return Err(e);
    }
    Ok(())
}
