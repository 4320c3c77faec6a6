use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;
use thiserror::Error;

use super::open_gateway;
use crate::catalog::DatasetCatalog;
use crate::config::RuntimePaths;
use crate::error::BidlensError;
use crate::format::{DEFAULT_MAX_ROWS, format_result_set};
use crate::gateway::{GatewayConfig, prepare_read_only_query};
use crate::models::{ResultSet, Row, ScalarValue};

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub command: QueryCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum QueryCommand {
    /// Execute one read-only statement.
    Sql(QuerySqlArgs),
    /// Describe the columns of an allowed dataset.
    Schema(QuerySchemaArgs),
    /// List the allowed datasets.
    Datasets,
}

#[derive(Debug, Clone, Args)]
pub struct QuerySqlArgs {
    #[arg(value_name = "SQL")]
    pub sql: String,

    /// Positional parameters bound to `?1`, `?2`, ... as a JSON array.
    #[arg(long, value_name = "JSON")]
    pub params: Option<String>,

    #[arg(
        long,
        value_name = "ROWS",
        default_value_t = DEFAULT_MAX_ROWS,
        value_parser = crate::cli::app::parse_positive_rows
    )]
    pub max_rows: usize,

    /// Print rows as JSON objects instead of a table.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct QuerySchemaArgs {
    #[arg(value_name = "DATASET")]
    pub dataset: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// `--params` could not be turned into bindable values.
#[derive(Debug, Error)]
#[error("invalid query params: {detail}")]
pub struct InvalidParams {
    pub detail: String,
}

pub fn run(
    args: &QueryArgs,
    runtime_paths: &RuntimePaths,
    gateway_config: GatewayConfig,
) -> Result<()> {
    match &args.command {
        QueryCommand::Sql(sql_args) => run_sql_query(sql_args, runtime_paths, gateway_config),
        QueryCommand::Schema(schema_args) => {
            run_schema_query(schema_args, runtime_paths, gateway_config)
        }
        QueryCommand::Datasets => {
            for name in DatasetCatalog::auction_warehouse().allowed_names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn run_sql_query(
    args: &QuerySqlArgs,
    runtime_paths: &RuntimePaths,
    gateway_config: GatewayConfig,
) -> Result<()> {
    // Reject before touching the warehouse so guardrail errors do not depend on the store.
    let prepared = prepare_read_only_query(
        &args.sql,
        &DatasetCatalog::auction_warehouse(),
        gateway_config.default_limit,
    )?;
    let params = parse_query_params(args.params.as_deref())?;
    println!(
        "query: start datasets={} params={} limit_appended={}",
        prepared.referenced_datasets.join(","),
        params.len(),
        prepared.limit_appended
    );

    let mut gateway = open_gateway(runtime_paths, gateway_config)?;
    let result = gateway.execute(&args.sql, &params)?;
    println!("query: rows={}", result.len());

    if args.json {
        let encoded = serde_json::to_string_pretty(&result.to_json_rows())
            .context("failed to encode query rows json")?;
        println!("{encoded}");
    } else {
        println!("{}", format_result_set(&result, args.max_rows));
    }
    Ok(())
}

fn run_schema_query(
    args: &QuerySchemaArgs,
    runtime_paths: &RuntimePaths,
    gateway_config: GatewayConfig,
) -> Result<()> {
    if !DatasetCatalog::auction_warehouse().is_allowed(&args.dataset) {
        return Err(BidlensError::DatasetNotAllowed {
            detail: format!("`{}` is not in the allowed catalog", args.dataset),
        }
        .into());
    }

    let mut gateway = open_gateway(runtime_paths, gateway_config)?;
    let columns = gateway.describe_schema(&args.dataset)?;
    if args.json {
        let encoded = serde_json::to_string_pretty(&columns)
            .context("failed to encode schema json")?;
        println!("{encoded}");
        return Ok(());
    }

    let table = ResultSet::new(
        format!("describe {}", args.dataset),
        vec![
            "column".to_string(),
            "data_type".to_string(),
            "nullable".to_string(),
        ],
        columns
            .into_iter()
            .map(|column| {
                Row::new(vec![
                    ScalarValue::Text(column.name),
                    ScalarValue::Text(column.data_type),
                    ScalarValue::Text(if column.nullable { "yes" } else { "no" }.to_string()),
                ])
            })
            .collect(),
    );
    println!("{}", format_result_set(&table, table.len()));
    Ok(())
}

fn parse_query_params(params_json: Option<&str>) -> Result<Vec<ScalarValue>, InvalidParams> {
    let Some(raw) = params_json else {
        return Ok(Vec::new());
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let parsed = serde_json::from_str::<Value>(trimmed).map_err(|error| InvalidParams {
        detail: format!("params must be valid JSON: {error}"),
    })?;
    let values = match parsed {
        Value::Null => Vec::new(),
        Value::Array(values) => values,
        value => vec![value],
    };
    values
        .into_iter()
        .map(|value| ScalarValue::from_json(value).map_err(|detail| InvalidParams { detail }))
        .collect()
}
