use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{analyze::AnalyzeArgs, query::QueryArgs, report::ReportArgs};
use crate::gateway::DEFAULT_ROW_LIMIT;

#[derive(Debug, Parser)]
#[command(
    name = "bidlens",
    version,
    about = "Guarded queries and staged reports over an auction warehouse"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub out_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub warehouse: Option<PathBuf>,

    /// Row limit appended to queries that carry no LIMIT clause.
    #[arg(
        long,
        global = true,
        value_name = "ROWS",
        default_value_t = DEFAULT_ROW_LIMIT,
        value_parser = parse_positive_rows
    )]
    pub default_limit: usize,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run guarded read-only queries against the warehouse.
    Query(QueryArgs),
    /// Build and save a multi-stage report.
    Report(ReportArgs),
    /// Run a single ad hoc analysis and print it.
    Analyze(AnalyzeArgs),
}

pub(crate) fn parse_positive_rows(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be greater than zero".to_string()),
        Ok(rows) => Ok(rows),
        Err(error) => Err(error.to_string()),
    }
}
