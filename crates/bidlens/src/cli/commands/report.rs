use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use super::{DEFAULT_FISCAL_YEAR, InsightArgs, PipelineArgs, open_gateway};
use crate::catalog::DimensionSpec;
use crate::config::RuntimePaths;
use crate::gateway::GatewayConfig;
use crate::insight::ChatCompletionsGenerator;
use crate::models::{Report, report_record_schema};
use crate::pipeline::{ComprehensiveOptions, DEFAULT_DIMENSION, PipelineError, ReportPipeline};
use crate::sqlite::SqliteWarehouse;
use crate::store::ReportStore;

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    #[command(subcommand)]
    pub command: ReportCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ReportCommand {
    /// Per-category analysis over the items dataset.
    Category(ReportRunArgs),
    /// Weekly trends and anomalies for one fiscal year.
    Weekly(WeeklyReportArgs),
    /// Full staged report ending in an executive narrative.
    Comprehensive(ComprehensiveReportArgs),
    /// Print the JSON Schema of saved report records.
    Schema,
}

#[derive(Debug, Clone, Args)]
pub struct ReportRunArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(flatten)]
    pub insight: InsightArgs,

    /// Skip the JSON record and write only the text document.
    #[arg(long, default_value_t = false)]
    pub text_only: bool,
}

#[derive(Debug, Clone, Args)]
pub struct WeeklyReportArgs {
    #[arg(long, default_value_t = DEFAULT_FISCAL_YEAR)]
    pub fiscal_year: i32,

    #[command(flatten)]
    pub run: ReportRunArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ComprehensiveReportArgs {
    #[arg(long, default_value_t = DEFAULT_FISCAL_YEAR)]
    pub fiscal_year: i32,

    #[arg(long, value_name = "NAME", default_value = DEFAULT_DIMENSION)]
    pub dimension: String,

    /// Fiscal week to investigate; defaults to the week with the largest lot value swing.
    #[arg(long, value_name = "WEEK")]
    pub week: Option<i64>,

    #[command(flatten)]
    pub run: ReportRunArgs,
}

type SqlitePipeline<'a> = ReportPipeline<'a, SqliteWarehouse, ChatCompletionsGenerator>;

pub fn run(
    args: &ReportArgs,
    runtime_paths: &RuntimePaths,
    gateway_config: GatewayConfig,
) -> Result<()> {
    match &args.command {
        ReportCommand::Category(run_args) => build_and_save(
            "category",
            run_args,
            runtime_paths,
            gateway_config,
            |pipeline| pipeline.build_category_report(),
        ),
        ReportCommand::Weekly(weekly) => {
            let fiscal_year = weekly.fiscal_year;
            build_and_save(
                "weekly",
                &weekly.run,
                runtime_paths,
                gateway_config,
                |pipeline| pipeline.build_weekly_trends_report(fiscal_year),
            )
        }
        ReportCommand::Comprehensive(comprehensive) => {
            // Unknown dimensions are caller errors; reject them before opening the warehouse.
            DimensionSpec::auction_warehouse().resolve(&comprehensive.dimension)?;
            let options = ComprehensiveOptions {
                fiscal_year: comprehensive.fiscal_year,
                dimension: comprehensive.dimension.clone(),
                focus_week: comprehensive.week,
            };
            build_and_save(
                "comprehensive",
                &comprehensive.run,
                runtime_paths,
                gateway_config,
                |pipeline| pipeline.build_comprehensive_report_with(&options),
            )
        }
        ReportCommand::Schema => {
            let encoded = serde_json::to_string_pretty(&report_record_schema())
                .context("failed to encode report record schema")?;
            println!("{encoded}");
            Ok(())
        }
    }
}

fn build_and_save(
    command: &str,
    args: &ReportRunArgs,
    runtime_paths: &RuntimePaths,
    gateway_config: GatewayConfig,
    build: impl FnOnce(&mut SqlitePipeline<'_>) -> Result<Report, PipelineError>,
) -> Result<()> {
    let insight_config = args.insight.to_config();
    println!(
        "report: start kind={command} warehouse={} model={} out_dir={}",
        runtime_paths.warehouse.display(),
        insight_config.model,
        runtime_paths.out_dir.display()
    );

    let generator = ChatCompletionsGenerator::new(insight_config)?;
    let mut gateway = open_gateway(runtime_paths, gateway_config)?;
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        args.pipeline.to_config(),
    );
    let report = build(&mut pipeline)?;
    println!("report: built type={}", report.kind().key());

    let store = ReportStore::new(&runtime_paths.out_dir);
    if args.text_only {
        let text_path = store.save_text(&report)?;
        println!("report: saved text={}", text_path.display());
    } else {
        let (json_path, text_path) = store.save_with_text(&report)?;
        println!(
            "report: saved json={} text={}",
            json_path.display(),
            text_path.display()
        );
    }
    Ok(())
}
