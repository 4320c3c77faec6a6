pub mod guardrail;

use std::time::Instant;

use crate::catalog::DatasetCatalog;
use crate::error::{BidlensError, Result};
use crate::models::{ColumnDescriptor, ResultSet, ScalarValue};
use crate::utils::time::elapsed_ms;

pub use guardrail::{DEFAULT_ROW_LIMIT, PreparedQuery, prepare_read_only_query};

/// A connection to the relational store behind the gateway.
///
/// Implementations hold exactly one connection. Methods take `&mut self` so a connection can
/// only serve one caller at a time; concurrent report builds need one warehouse each.
pub trait Warehouse {
    fn query(&mut self, sql: &str, params: &[ScalarValue]) -> Result<ResultSet>;

    fn describe(&mut self, dataset: &str) -> Result<Vec<ColumnDescriptor>>;
}

impl<W: Warehouse + ?Sized> Warehouse for Box<W> {
    fn query(&mut self, sql: &str, params: &[ScalarValue]) -> Result<ResultSet> {
        (**self).query(sql, params)
    }

    fn describe(&mut self, dataset: &str) -> Result<Vec<ColumnDescriptor>> {
        (**self).describe(dataset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    pub default_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_ROW_LIMIT,
        }
    }
}

/// Validates and executes read-only queries against the allowlisted catalog.
#[derive(Debug)]
pub struct QueryGateway<W> {
    warehouse: W,
    catalog: DatasetCatalog,
    config: GatewayConfig,
}

impl<W: Warehouse> QueryGateway<W> {
    #[must_use]
    pub fn new(warehouse: W, catalog: DatasetCatalog, config: GatewayConfig) -> Self {
        Self {
            warehouse,
            catalog,
            config,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &DatasetCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn config(&self) -> GatewayConfig {
        self.config
    }

    #[must_use]
    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    #[must_use]
    pub fn into_warehouse(self) -> W {
        self.warehouse
    }

    #[must_use]
    pub fn list_datasets(&self) -> Vec<String> {
        self.catalog.allowed_names().map(str::to_string).collect()
    }

    /// Runs every check and returns the query text that `execute` would send.
    pub fn prepare(&self, sql: &str) -> Result<PreparedQuery> {
        prepare_read_only_query(sql, &self.catalog, self.config.default_limit)
    }

    pub fn execute(&mut self, sql: &str, params: &[ScalarValue]) -> Result<ResultSet> {
        let prepared = self.prepare(sql)?;
        if prepared.limit_appended {
            tracing::debug!(
                limit = self.config.default_limit,
                "appended default row limit"
            );
        }

        let started = Instant::now();
        let result = self.warehouse.query(&prepared.sql, params);
        match &result {
            Ok(rows) => tracing::debug!(
                datasets = %prepared.referenced_datasets.join(","),
                params = params.len(),
                rows = rows.len(),
                duration_ms = elapsed_ms(started),
                "query executed"
            ),
            Err(error) => tracing::warn!(
                kind = error.kind().key(),
                duration_ms = elapsed_ms(started),
                "query failed: {error}"
            ),
        }
        result
    }

    pub fn describe_schema(&mut self, dataset: &str) -> Result<Vec<ColumnDescriptor>> {
        if !self.catalog.is_allowed(dataset) {
            return Err(BidlensError::DatasetNotAllowed {
                detail: format!("`{dataset}` is not in the allowed catalog"),
            });
        }
        self.warehouse.describe(dataset)
    }
}
