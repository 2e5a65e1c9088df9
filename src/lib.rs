pub mod aggregate;
pub mod cli;
pub mod compare;
pub mod config;
pub mod data;
pub mod error;
pub mod format;
pub mod io_utils;
pub mod partition;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod session;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, InputOptions, OutputFormat, OutputOptions},
    config::Settings,
    data::Dataset,
    report::Report,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_rollup", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Summarize(args) => handle_summarize(&args),
        Commands::Compare(args) => handle_compare(&args),
        Commands::Classify(args) => handle_classify(&args),
    }
}

fn handle_summarize(args: &cli::SummarizeArgs) -> Result<()> {
    let settings = load_settings(&args.input_options, None)?;
    let dataset = load_dataset(&args.input, &args.input_options)?;
    let result = pipeline::summarize(&dataset, &settings)
        .with_context(|| format!("Summarizing {:?}", args.input))?;
    info!(
        "Categories: [{}]; numeric fields: [{}]",
        result.roles.category_names().iter().join(", "),
        result.roles.numeric_names().iter().join(", ")
    );
    emit(Report::for_summary(&result), &args.output)
}

fn handle_compare(args: &cli::CompareArgs) -> Result<()> {
    let settings = load_settings(&args.input_options, args.threshold)?;
    let left = load_dataset(&args.left, &args.input_options)?;
    let right = load_dataset(&args.right, &args.input_options)?;
    info!(
        "Comparing {:?} against {:?} at threshold {}",
        args.left, args.right, settings.comparison_threshold
    );
    let result = pipeline::compare_datasets(&left, &right, &settings)
        .with_context(|| format!("Comparing {:?} with {:?}", args.left, args.right))?;
    emit(Report::for_comparison(&result), &args.output)
}

fn handle_classify(args: &cli::ClassifyArgs) -> Result<()> {
    let settings = load_settings(&args.input_options, None)?;
    let dataset = load_dataset(&args.input, &args.input_options)?;
    let profiles = schema::profile_fields(&dataset, settings.category_threshold);
    let report = Report::for_profiles(&profiles, args.values);
    match args.format {
        OutputFormat::Table => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

fn load_settings(options: &InputOptions, comparison_threshold: Option<f64>) -> Result<Settings> {
    let base = match &options.config {
        Some(path) => {
            Settings::load(path).with_context(|| format!("Loading settings from {path:?}"))?
        }
        None => Settings::default(),
    };
    let settings = base.with_overrides(options.category_threshold, comparison_threshold)?;
    debug!("Effective settings: {settings:?}");
    Ok(settings)
}

fn load_dataset(path: &Path, options: &InputOptions) -> Result<Dataset> {
    let encoding = io_utils::resolve_encoding(options.input_encoding.as_deref())?;
    info!(
        "Reading '{}' with delimiter '{}'",
        path.display(),
        printable_delimiter(io_utils::resolve_input_delimiter(path, options.delimiter))
    );
    let dataset = io_utils::read_dataset(path, options.delimiter, encoding)
        .with_context(|| format!("Loading dataset {path:?}"))?;
    info!(
        "Loaded {} record(s) across {} field(s)",
        dataset.len(),
        dataset.schema().len()
    );
    Ok(dataset)
}

fn emit(report: Report, output: &OutputOptions) -> Result<()> {
    let report = if output.raw {
        report
    } else {
        report.formatted()
    };
    if let Some(dir) = &output.output_dir {
        let written = report.write_csv_dir(dir)?;
        info!("Wrote {} file(s) to {:?}", written.len(), dir);
    }
    match output.format {
        OutputFormat::Table => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
