//! ingestbeam - consolidate road-safety accident files

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ingestbeam::logging::{LogLevel, init_logging};
use ingestbeam::{
    AccidentEnricher, AccidentQueries, CsvFormat, EnrichStage, Pipeline, RunConfig, load_accidents,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "ingestbeam")]
#[command(author, version, about = "Enrich and consolidate delimited accident files")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a question about one accident file
    Query(QueryArgs),
}

/// Run settings; each one overrides the config file.
#[derive(Args, Debug)]
struct RunArgs {
    /// TOML config file
    #[arg(short, long, env = "INGESTBEAM_CONFIG")]
    config: Option<PathBuf>,

    /// Input file or glob pattern (repeatable, processed in order)
    #[arg(short, long = "input")]
    inputs: Vec<String>,

    /// Consolidated output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Records per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Slots in each stage queue
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Threads mapping each batch in the enrich stage
    #[arg(long)]
    enrich_threads: Option<usize>,

    /// Field delimiter
    #[arg(long)]
    delimiter: Option<char>,

    /// Inputs have no header row
    #[arg(long)]
    no_headers: bool,

    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Log JSON lines instead of text
    #[arg(long)]
    log_json: bool,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Accident file to load
    file: PathBuf,

    #[command(subcommand)]
    op: QueryOp,

    #[arg(long, default_value_t = ',')]
    delimiter: char,

    #[arg(long)]
    no_headers: bool,
}

#[derive(Subcommand, Debug)]
enum QueryOp {
    /// The accident with this index
    ById { id: String },
    /// Accidents inside a longitude/latitude box, bounds included
    Within {
        #[arg(allow_negative_numbers = true)]
        min_longitude: f64,
        #[arg(allow_negative_numbers = true)]
        max_longitude: f64,
        #[arg(allow_negative_numbers = true)]
        min_latitude: f64,
        #[arg(allow_negative_numbers = true)]
        max_latitude: f64,
    },
    /// Accident count per road surface condition
    SurfaceCounts,
    /// Most frequent weather conditions
    TopWeather {
        #[arg(default_value_t = 3)]
        k: usize,
    },
    /// Accident ids per district authority
    ByAuthority,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Query(query)) => {
            // Query output goes to stdout; keep the log quiet unless asked.
            if let Err(e) = init_logging(LogLevel::Warn, false) {
                eprintln!("Warning: logging disabled: {e}");
            }
            run_query(&query)
        }
        None => {
            let config = match load_config(&cli.run) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = init_logging(config.log_level, config.log_json) {
                eprintln!("Warning: logging disabled: {e}");
            }
            run_pipeline(&config, cli.run.report.as_deref())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &RunArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    if !args.inputs.is_empty() {
        config.inputs.clone_from(&args.inputs);
    }
    if let Some(output) = &args.output {
        config.output.clone_from(output);
    }
    if let Some(n) = args.batch_size {
        config.batch_size = n;
    }
    if let Some(n) = args.queue_capacity {
        config.queue_capacity = n;
    }
    if let Some(n) = args.enrich_threads {
        config.enrich_threads = n;
    }
    if let Some(d) = args.delimiter {
        config.delimiter = d;
    }
    if args.no_headers {
        config.has_headers = false;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if args.log_json {
        config.log_json = true;
    }
    Ok(config)
}

fn run_pipeline(config: &RunConfig, report_path: Option<&Path>) -> Result<()> {
    config.validate()?;
    let files = config.resolve_inputs()?;
    info!(files = files.len(), output = %config.output.display(), "starting ingestion");

    let stage = EnrichStage::with_threads(AccidentEnricher::default(), config.enrich_threads)?;
    let pipeline = Pipeline::new(stage, config.pipeline_options())?;
    let format = config.csv_format();
    let report = pipeline.run_csv(&files, &config.output, format, format)?;

    if let Some(path) = report_path {
        report
            .write_json(path)
            .with_context(|| format!("write report {}", path.display()))?;
    }
    info!(records = report.total_records, elapsed_ms = report.elapsed_ms, "ingestion complete");
    Ok(())
}

fn run_query(args: &QueryArgs) -> Result<()> {
    let delimiter =
        u8::try_from(args.delimiter).context("delimiter must be a single ASCII character")?;
    let format = CsvFormat {
        has_headers: !args.no_headers,
        delimiter,
    };
    let accidents = load_accidents(&args.file, format)?;
    let queries = AccidentQueries::new(&accidents);

    let out = match &args.op {
        QueryOp::ById { id } => serde_json::to_string_pretty(&queries.by_id(id))?,
        QueryOp::Within {
            min_longitude,
            max_longitude,
            min_latitude,
            max_latitude,
        } => serde_json::to_string_pretty(&queries.within(
            *min_longitude,
            *max_longitude,
            *min_latitude,
            *max_latitude,
        ))?,
        QueryOp::SurfaceCounts => {
            let counts: BTreeMap<_, _> = queries.count_by_road_surface().into_iter().collect();
            serde_json::to_string_pretty(&counts)?
        }
        QueryOp::TopWeather { k } => {
            serde_json::to_string_pretty(&queries.top_weather_conditions(*k))?
        }
        QueryOp::ByAuthority => serde_json::to_string_pretty(&queries.ids_by_authority())?,
    };
    println!("{out}");
    Ok(())
}
