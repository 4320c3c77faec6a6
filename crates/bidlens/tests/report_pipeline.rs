use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;

use bidlens::catalog::{DatasetCatalog, DimensionSpec};
use bidlens::error::{BidlensError, ErrorKind, Result};
use bidlens::gateway::{GatewayConfig, QueryGateway, Warehouse};
use bidlens::insight::{InsightGenerator, InsightTask};
use bidlens::models::{ColumnDescriptor, Report, ResultSet, ScalarValue};
use bidlens::pipeline::{
    ComprehensiveOptions, PipelineConfig, ReportPipeline, RetryPolicy, StageId,
};
use bidlens::sqlite::{DEFAULT_BUSY_TIMEOUT, SqliteWarehouse};
use rusqlite::Connection;

const FIXTURE_SQL: &str = "
CREATE TABLE items (
    unique_id TEXT PRIMARY KEY,
    category TEXT,
    model TEXT,
    hammer REAL,
    total_fees REAL
);
CREATE TABLE weekly_metrics_summary (
    fiscal_year INTEGER,
    fiscal_week_number INTEGER,
    week_start_date DATE,
    total_items_sold INTEGER,
    avg_lot_value REAL,
    total_revenue REAL,
    total_bids INTEGER
);
CREATE TABLE weekly_metrics_by_industry (
    fiscal_year INTEGER,
    fiscal_week_number INTEGER,
    taxonomy_industry TEXT,
    total_items_sold INTEGER,
    avg_lot_value REAL,
    total_revenue REAL
);
INSERT INTO items VALUES
    ('A1', 'Trucks', 'F-150', 18000.0, 900.0),
    ('A2', 'Trucks', 'Silverado', 22000.0, 1100.0),
    ('B1', 'Tractors', '8R 410', 95000.0, 4000.0),
    ('C1', NULL, 'Unknown', 10.0, 1.0);
INSERT INTO weekly_metrics_summary VALUES
    (2026, 1, '2025-11-03', 100, 250.0, 25000.0, 400),
    (2026, 2, '2025-11-10', 120, 300.5, 36060.0, 520),
    (2026, 3, '2025-11-17', 90, 180.25, 16222.5, 300),
    (2025, 1, '2024-11-04', 70, 150.0, 10500.0, 200);
INSERT INTO weekly_metrics_by_industry VALUES
    (2026, 1, 'Construction', 60, 280.0, 16800.0),
    (2026, 1, 'Agriculture', 40, 205.0, 8200.0),
    (2026, 2, 'Construction', 70, 320.0, 22400.0),
    (2026, 2, 'Agriculture', 50, 272.0, 13600.0),
    (2026, 3, 'Construction', 50, 200.0, 10000.0),
    (2026, 3, 'Agriculture', 40, 155.5, 6220.0);
";

fn temp_db_path(label: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("bidlens-{label}-{nanos}.sqlite"))
}

fn fixture_warehouse(label: &str) -> SqliteWarehouse {
    let path = temp_db_path(label);
    let connection = Connection::open(&path).expect("fixture db should open");
    connection
        .execute_batch(FIXTURE_SQL)
        .expect("fixture should load");
    drop(connection);
    SqliteWarehouse::open_read_only(&path, DEFAULT_BUSY_TIMEOUT).expect("warehouse opens")
}

fn gateway<W: Warehouse>(warehouse: W) -> QueryGateway<W> {
    QueryGateway::new(
        warehouse,
        DatasetCatalog::auction_warehouse(),
        GatewayConfig::default(),
    )
}

/// Echoes a fixed narrative per task and records every task it was handed.
#[derive(Default)]
struct ScriptedGenerator {
    tasks: RefCell<Vec<InsightTask>>,
    fail_on: Option<&'static str>,
}

impl ScriptedGenerator {
    fn failing_on(task_name: &'static str) -> Self {
        Self {
            fail_on: Some(task_name),
            ..Self::default()
        }
    }

    fn task_names(&self) -> Vec<&'static str> {
        self.tasks.borrow().iter().map(|task| task.name).collect()
    }

    fn task(&self, name: &str) -> InsightTask {
        self.tasks
            .borrow()
            .iter()
            .find(|task| task.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("no `{name}` task recorded"))
    }
}

impl InsightGenerator for ScriptedGenerator {
    fn generate(&self, task: &InsightTask) -> Result<String> {
        self.tasks.borrow_mut().push(task.clone());
        if self.fail_on == Some(task.name) {
            return Err(BidlensError::insight_failure("model unavailable"));
        }
        Ok(format!("{} narrative", task.name))
    }
}

/// Fails every call with a store outage and counts the attempts.
#[derive(Default)]
struct UnreachableWarehouse {
    attempts: usize,
}

impl Warehouse for UnreachableWarehouse {
    fn query(&mut self, _sql: &str, _params: &[ScalarValue]) -> Result<ResultSet> {
        self.attempts += 1;
        Err(BidlensError::store_unavailable("connection refused"))
    }

    fn describe(&mut self, _dataset: &str) -> Result<Vec<ColumnDescriptor>> {
        self.attempts += 1;
        Err(BidlensError::store_unavailable("connection refused"))
    }
}

/// Fails the first `outages` calls, then delegates.
struct FlakyWarehouse<W> {
    inner: W,
    outages: usize,
}

impl<W: Warehouse> Warehouse for FlakyWarehouse<W> {
    fn query(&mut self, sql: &str, params: &[ScalarValue]) -> Result<ResultSet> {
        if self.outages > 0 {
            self.outages -= 1;
            return Err(BidlensError::store_unavailable("database is locked"));
        }
        self.inner.query(sql, params)
    }

    fn describe(&mut self, dataset: &str) -> Result<Vec<ColumnDescriptor>> {
        self.inner.describe(dataset)
    }
}

#[test]
fn comprehensive_report_runs_every_stage_in_order() {
    let mut gateway = gateway(fixture_warehouse("pipeline-comprehensive"));
    let generator = ScriptedGenerator::default();
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        PipelineConfig::default(),
    );

    let report = pipeline
        .build_comprehensive_report(2026)
        .expect("comprehensive report should build");

    assert_eq!(
        generator.task_names(),
        vec![
            "trend_analysis",
            "anomaly_analysis",
            "dimension_breakdown",
            "week_investigation",
            "executive_report",
        ]
    );

    let Report::Comprehensive(comprehensive) = report else {
        panic!("expected a comprehensive report");
    };
    assert_eq!(comprehensive.fiscal_year, 2026);
    assert_eq!(comprehensive.dimension, "industry");
    assert_eq!(comprehensive.focus_week, Some(3));
    assert_eq!(
        comprehensive
            .analyses
            .iter()
            .map(|analysis| analysis.name())
            .collect::<Vec<_>>(),
        vec![
            "trend_analysis",
            "anomaly_analysis",
            "dimension_breakdown",
            "week_investigation",
        ]
    );
    assert_eq!(
        comprehensive.executive_report.text(),
        "executive_report narrative"
    );
    assert_eq!(comprehensive.summary_stats.total_weeks, 3);
    assert_eq!(comprehensive.summary_stats.total_items_fy, 310);
    assert_eq!(comprehensive.summary_stats.total_bids_fy, 1_220);
    assert!((comprehensive.summary_stats.total_revenue_fy - 77_282.5).abs() < 1e-6);
    assert_eq!(comprehensive.weekly_data.len(), 3);
    assert_eq!(
        comprehensive.weekly_data[1].week_start.as_deref(),
        Some("2025-11-10")
    );
}

#[test]
fn stage_inputs_carry_formatted_tables_and_prior_narratives() {
    let mut gateway = gateway(fixture_warehouse("pipeline-inputs"));
    let generator = ScriptedGenerator::default();
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        PipelineConfig::default(),
    );
    pipeline
        .build_comprehensive_report(2026)
        .expect("comprehensive report should build");

    let trend = generator.task("trend_analysis");
    let weekly_data = trend.input_value("weekly_data").expect("weekly table");
    assert!(weekly_data.starts_with("fiscal_week_number | week_start_date"));
    assert!(weekly_data.contains("2 | 2025-11-10 | 120 | 300.50 | 36,060.00 | 520"));
    assert!(
        trend
            .input_value("summary")
            .expect("summary text")
            .contains("Total Items: 310")
    );

    let breakdown = generator.task("dimension_breakdown");
    let table = breakdown.input_value("breakdown").expect("breakdown table");
    let first_row = table.lines().nth(2).expect("first data row");
    assert!(first_row.starts_with("Construction | 180"));

    let week = generator.task("week_investigation");
    assert_eq!(
        week.input_value("focus_week"),
        Some("Week 3 of fiscal year 2026")
    );
    assert!(
        week.input_value("week_breakdown")
            .expect("week breakdown")
            .contains("Agriculture | 40 | 155.50 | 6,220.00")
    );

    let executive = generator.task("executive_report");
    assert_eq!(
        executive.input_value("trend_analysis"),
        Some("trend_analysis narrative")
    );
    assert_eq!(
        executive.input_value("week_investigation"),
        Some("week_investigation narrative")
    );
}

#[test]
fn caller_focus_week_and_dimension_are_honored() {
    let mut gateway = gateway(fixture_warehouse("pipeline-options"));
    let generator = ScriptedGenerator::default();
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        PipelineConfig::default(),
    );

    let report = pipeline
        .build_comprehensive_report_with(&ComprehensiveOptions {
            fiscal_year: 2026,
            dimension: "  Industry ".to_string(),
            focus_week: Some(1),
        })
        .expect("report should build");

    let Report::Comprehensive(comprehensive) = report else {
        panic!("expected a comprehensive report");
    };
    assert_eq!(comprehensive.focus_week, Some(1));
    assert_eq!(comprehensive.dimension, "industry");
    assert_eq!(
        generator
            .task("week_investigation")
            .input_value("focus_week"),
        Some("Week 1 of fiscal year 2026")
    );
}

#[test]
fn summary_outage_aborts_before_any_narrative() {
    let mut gateway = gateway(UnreachableWarehouse::default());
    let generator = ScriptedGenerator::default();
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        PipelineConfig::default(),
    );

    let error = pipeline
        .build_comprehensive_report(2026)
        .expect_err("store outage must abort the build");

    assert_eq!(error.stage(), Some(StageId::Summary));
    assert_eq!(error.kind(), ErrorKind::StoreUnavailable);
    assert!(error.to_string().contains("stage `summary` failed"));
    assert!(generator.task_names().is_empty());
    assert_eq!(gateway.warehouse().attempts, 1);
}

#[test]
fn generator_failure_is_attributed_to_its_stage() {
    let mut gateway = gateway(fixture_warehouse("pipeline-generator-failure"));
    let generator = ScriptedGenerator::failing_on("anomaly_analysis");
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        PipelineConfig::default(),
    );

    let error = pipeline
        .build_comprehensive_report(2026)
        .expect_err("generator failure must abort the build");

    assert_eq!(error.stage(), Some(StageId::AnomalyAnalysis));
    assert_eq!(error.kind(), ErrorKind::InsightGeneratorFailure);
    assert_eq!(
        generator.task_names(),
        vec!["trend_analysis", "anomaly_analysis"]
    );
}

#[test]
fn unknown_dimension_is_rejected_without_queries() {
    let mut gateway = gateway(UnreachableWarehouse::default());
    let generator = ScriptedGenerator::default();
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        PipelineConfig::default(),
    );

    let mut options = ComprehensiveOptions::new(2026);
    options.dimension = "planet".to_string();
    let error = pipeline
        .build_comprehensive_report_with(&options)
        .expect_err("unknown dimension must be rejected");
    assert_eq!(error.kind(), ErrorKind::UnknownDimension);
    assert_eq!(error.stage(), None);

    let error = pipeline
        .analyze_dimension("planet", 2026)
        .expect_err("unknown dimension must be rejected");
    assert_eq!(error.kind(), ErrorKind::UnknownDimension);

    assert_eq!(gateway.warehouse().attempts, 0);
    assert!(generator.task_names().is_empty());
}

#[test]
fn transient_store_failures_are_retried_when_configured() {
    let mut gateway = gateway(FlakyWarehouse {
        inner: fixture_warehouse("pipeline-retry"),
        outages: 1,
    });
    let generator = ScriptedGenerator::default();
    let config = PipelineConfig {
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::ZERO,
        },
        ..PipelineConfig::default()
    };
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        config,
    );

    let report = pipeline
        .build_weekly_trends_report(2026)
        .expect("retry should absorb one outage");

    let Report::WeeklyTrends(weekly) = report else {
        panic!("expected a weekly trends report");
    };
    assert_eq!(weekly.summary_stats.total_weeks, 3);
    assert_eq!(weekly.trend_analysis.text(), "trend_analysis narrative");
    assert_eq!(weekly.anomaly_analysis.text(), "anomaly_analysis narrative");
}

#[test]
fn without_retries_a_transient_failure_aborts() {
    let mut gateway = gateway(FlakyWarehouse {
        inner: fixture_warehouse("pipeline-no-retry"),
        outages: 1,
    });
    let generator = ScriptedGenerator::default();
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        PipelineConfig::default(),
    );

    let error = pipeline
        .build_weekly_trends_report(2026)
        .expect_err("single attempt should surface the outage");
    assert_eq!(error.stage(), Some(StageId::Summary));
}

#[test]
fn category_report_covers_each_named_category() {
    let mut gateway = gateway(fixture_warehouse("pipeline-category"));
    let generator = ScriptedGenerator::default();
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        PipelineConfig::default(),
    );

    let report = pipeline
        .build_category_report()
        .expect("category report should build");

    let Report::CategoryAnalysis(categories) = report else {
        panic!("expected a category report");
    };
    let names = categories
        .categories
        .iter()
        .map(|section| section.category.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Tractors", "Trucks"]);

    let trucks = &categories.categories[1];
    assert_eq!(trucks.stats.count, 2);
    assert!((trucks.stats.avg_price - 20_000.0).abs() < 1e-9);
    assert!((trucks.stats.total_fees - 2_000.0).abs() < 1e-9);
    assert_eq!(trucks.analysis.name(), "Trucks");

    let samples = generator
        .tasks
        .borrow()
        .iter()
        .filter(|task| task.name == "category_analysis")
        .filter_map(|task| task.input_value("sample_items").map(str::to_string))
        .collect::<Vec<_>>();
    assert_eq!(samples.len(), 2);
    assert!(samples[1].contains("A2 | Silverado | 22,000.00 | 1,100.00"));
}

#[test]
fn ad_hoc_analyses_return_named_results() {
    let mut gateway = gateway(fixture_warehouse("pipeline-ad-hoc"));
    let generator = ScriptedGenerator::default();
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        PipelineConfig::default(),
    );

    let dimension = pipeline
        .analyze_dimension("Industry", 2026)
        .expect("dimension analysis should run");
    assert_eq!(dimension.name(), "dimension_breakdown");

    let comparison = pipeline
        .compare_categories("Trucks", "Tractors")
        .expect("comparison should run");
    assert_eq!(comparison.name(), "category_comparison");
    assert_eq!(comparison.text(), "category_comparison narrative");

    let summary = pipeline
        .analyze_weekly_summary(2026)
        .expect("weekly summary should run");
    assert_eq!(summary.name(), "weekly_summary");

    assert_eq!(
        generator.task_names(),
        vec![
            "dimension_breakdown",
            "category_analysis",
            "category_analysis",
            "category_comparison",
            "weekly_summary",
        ]
    );
    let comparison_task = generator.task("category_comparison");
    assert_eq!(
        comparison_task.input_value("category1_analysis"),
        Some("Trucks:\ncategory_analysis narrative")
    );
}

#[test]
fn empty_fiscal_year_still_builds_with_sentinel_tables() {
    let mut gateway = gateway(fixture_warehouse("pipeline-empty-year"));
    let generator = ScriptedGenerator::default();
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        PipelineConfig::default(),
    );

    let report = pipeline
        .build_comprehensive_report(1999)
        .expect("an empty year is not an error");

    let Report::Comprehensive(comprehensive) = report else {
        panic!("expected a comprehensive report");
    };
    assert_eq!(comprehensive.focus_week, None);
    assert_eq!(comprehensive.summary_stats.total_weeks, 0);
    assert!(comprehensive.weekly_data.is_empty());
    assert_eq!(
        generator.task("trend_analysis").input_value("weekly_data"),
        Some("No data available.")
    );
}
