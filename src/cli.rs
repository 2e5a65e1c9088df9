use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Roll up record sets by category and compare snapshots",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Aggregate one dataset into base, per-category and error tables
    Summarize(SummarizeArgs),
    /// Summarize two snapshots and report significant differences
    Compare(CompareArgs),
    /// Show how each field is classified (category, numeric, reserved)
    Classify(ClassifyArgs),
}

/// Input options shared by every command.
#[derive(Debug, Args, Clone)]
pub struct InputOptions {
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of CSV inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// YAML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Fields with fewer distinct values than this are treated as categories
    #[arg(long = "category-threshold")]
    pub category_threshold: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct OutputOptions {
    /// Output format for the report
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Also write every report table as CSV into this directory
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Print raw values without rounding or zero suppression
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct SummarizeArgs {
    /// Input CSV or JSON file (use '-' to read CSV from stdin)
    #[arg(short, long)]
    pub input: PathBuf,
    #[command(flatten)]
    pub input_options: InputOptions,
    #[command(flatten)]
    pub output: OutputOptions,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Earlier snapshot (side A)
    #[arg(short, long)]
    pub left: PathBuf,
    /// Later snapshot (side B)
    #[arg(short, long)]
    pub right: PathBuf,
    /// Relative difference a row must exceed to be reported (0.001 to 0.1)
    #[arg(short, long)]
    pub threshold: Option<f64>,
    #[command(flatten)]
    pub input_options: InputOptions,
    #[command(flatten)]
    pub output: OutputOptions,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Input CSV or JSON file (use '-' to read CSV from stdin)
    #[arg(short, long)]
    pub input: PathBuf,
    #[command(flatten)]
    pub input_options: InputOptions,
    /// Include the value distribution of each category field
    #[arg(long)]
    pub values: bool,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_characters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("semicolon"), Ok(b';'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn compare_args_parse_threshold() {
        let cli = Cli::try_parse_from([
            "csv-rollup",
            "compare",
            "--left",
            "a.csv",
            "--right",
            "b.csv",
            "--threshold",
            "0.05",
            "--format",
            "json",
        ])
        .expect("parse");
        let Commands::Compare(args) = cli.command else {
            panic!("expected compare command");
        };
        assert_eq!(args.threshold, Some(0.05));
        assert_eq!(args.output.format, OutputFormat::Json);
    }
}
