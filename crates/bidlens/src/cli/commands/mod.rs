pub mod analyze;
pub mod query;
pub mod report;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::catalog::DatasetCatalog;
use crate::config::{INSIGHT_API_KEY_ENV, RuntimePaths};
use crate::format::DEFAULT_MAX_ROWS;
use crate::gateway::{GatewayConfig, QueryGateway};
use crate::insight::http::{
    DEFAULT_INSIGHT_MODEL, DEFAULT_INSIGHT_URL, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
    DEFAULT_TIMEOUT,
};
use crate::insight::InsightConfig;
use crate::pipeline::{PipelineConfig, RetryPolicy};
use crate::sqlite::{DEFAULT_BUSY_TIMEOUT, SqliteWarehouse};

pub const DEFAULT_FISCAL_YEAR: i32 = 2026;

#[derive(Debug, Clone, Args)]
pub struct InsightArgs {
    /// Base URL of an OpenAI-compatible chat completions server.
    #[arg(long, value_name = "URL", default_value = DEFAULT_INSIGHT_URL)]
    pub insight_url: String,

    #[arg(long, value_name = "MODEL", default_value = DEFAULT_INSIGHT_MODEL)]
    pub insight_model: String,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,
}

impl InsightArgs {
    #[must_use]
    pub fn to_config(&self) -> InsightConfig {
        InsightConfig {
            base_url: self.insight_url.clone(),
            model: self.insight_model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.timeout_secs),
            api_key: std::env::var(INSIGHT_API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct PipelineArgs {
    /// Row cap for tables handed to the insight generator.
    #[arg(
        long,
        value_name = "ROWS",
        default_value_t = DEFAULT_MAX_ROWS,
        value_parser = super::app::parse_positive_rows
    )]
    pub max_rows: usize,

    /// Extra attempts for transient warehouse or generator failures.
    #[arg(long, default_value_t = 0)]
    pub retries: u32,
}

impl PipelineArgs {
    #[must_use]
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_rows: self.max_rows,
            retry: RetryPolicy::with_retries(self.retries),
            ..PipelineConfig::default()
        }
    }
}

pub fn open_gateway(
    runtime_paths: &RuntimePaths,
    gateway_config: GatewayConfig,
) -> Result<QueryGateway<SqliteWarehouse>> {
    let warehouse = SqliteWarehouse::open_read_only(&runtime_paths.warehouse, DEFAULT_BUSY_TIMEOUT)
        .with_context(|| {
            format!(
                "failed to open warehouse: {}",
                runtime_paths.warehouse.display()
            )
        })?;
    Ok(QueryGateway::new(
        warehouse,
        DatasetCatalog::auction_warehouse(),
        gateway_config,
    ))
}
