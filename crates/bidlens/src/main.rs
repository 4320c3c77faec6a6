#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use bidlens::cli::app::{Cli, Command, RuntimeArgs};
use bidlens::cli::commands;
use bidlens::config::{LOG_FILTER_ENV, PathOverrides, RuntimePaths};
use bidlens::error::BidlensError;
use bidlens::gateway::GatewayConfig;
use bidlens::pipeline::PipelineError;
use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    init_tracing();
    std::process::exit(run());
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    let command_name = command_name(&cli.command);
    println!("bidlens: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            println!("bidlens: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("bidlens: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let gateway_config = GatewayConfig {
        default_limit: cli.runtime.default_limit,
    };
    let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
    match cli.command {
        Command::Query(args) => commands::query::run(&args, &runtime_paths, gateway_config),
        Command::Report(args) => commands::report::run(&args, &runtime_paths, gateway_config),
        Command::Analyze(args) => commands::analyze::run(&args, &runtime_paths, gateway_config),
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    let rejected = error
        .downcast_ref::<BidlensError>()
        .map(BidlensError::kind)
        .or_else(|| error.downcast_ref::<PipelineError>().map(PipelineError::kind))
        .is_some_and(|kind| kind.is_validation());

    if rejected
        || error
            .downcast_ref::<commands::query::InvalidParams>()
            .is_some()
    {
        EXIT_VALIDATION_FAILURE
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Query(_) => "query",
        Command::Report(_) => "report",
        Command::Analyze(_) => "analyze",
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    bidlens::config::resolve_runtime_paths(
        &home_dir,
        &cwd,
        PathOverrides {
            out_dir: args.out_dir.as_deref(),
            warehouse: args.warehouse.as_deref(),
        },
    )
}
