use anyhow::Result;
use clap::{Args, Subcommand};

use super::{DEFAULT_FISCAL_YEAR, InsightArgs, PipelineArgs, open_gateway};
use crate::catalog::DimensionSpec;
use crate::config::RuntimePaths;
use crate::gateway::GatewayConfig;
use crate::insight::ChatCompletionsGenerator;
use crate::models::AnalysisResult;
use crate::pipeline::{PipelineError, ReportPipeline};
use crate::sqlite::SqliteWarehouse;

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    #[command(subcommand)]
    pub command: AnalyzeCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum AnalyzeCommand {
    /// Compare groups of one dimension for a fiscal year.
    Dimension(AnalyzeDimensionArgs),
    /// Compare two item categories.
    Compare(AnalyzeCompareArgs),
    /// Summarize a fiscal year's weekly performance.
    Summary(AnalyzeSummaryArgs),
}

#[derive(Debug, Clone, Args)]
pub struct AnalysisRunArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(flatten)]
    pub insight: InsightArgs,
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeDimensionArgs {
    #[arg(value_name = "NAME")]
    pub name: String,

    #[arg(long, default_value_t = DEFAULT_FISCAL_YEAR)]
    pub fiscal_year: i32,

    #[command(flatten)]
    pub run: AnalysisRunArgs,
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeCompareArgs {
    #[arg(value_name = "CATEGORY")]
    pub first: String,

    #[arg(value_name = "CATEGORY")]
    pub second: String,

    #[command(flatten)]
    pub run: AnalysisRunArgs,
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeSummaryArgs {
    #[arg(long, default_value_t = DEFAULT_FISCAL_YEAR)]
    pub fiscal_year: i32,

    #[command(flatten)]
    pub run: AnalysisRunArgs,
}

type SqlitePipeline<'a> = ReportPipeline<'a, SqliteWarehouse, ChatCompletionsGenerator>;

pub fn run(
    args: &AnalyzeArgs,
    runtime_paths: &RuntimePaths,
    gateway_config: GatewayConfig,
) -> Result<()> {
    match &args.command {
        AnalyzeCommand::Dimension(dimension) => {
            DimensionSpec::auction_warehouse().resolve(&dimension.name)?;
            let fiscal_year = dimension.fiscal_year;
            run_analysis(
                "dimension",
                &dimension.run,
                runtime_paths,
                gateway_config,
                |pipeline| pipeline.analyze_dimension(&dimension.name, fiscal_year),
            )
        }
        AnalyzeCommand::Compare(compare) => run_analysis(
            "compare",
            &compare.run,
            runtime_paths,
            gateway_config,
            |pipeline| pipeline.compare_categories(&compare.first, &compare.second),
        ),
        AnalyzeCommand::Summary(summary) => {
            let fiscal_year = summary.fiscal_year;
            run_analysis(
                "summary",
                &summary.run,
                runtime_paths,
                gateway_config,
                |pipeline| pipeline.analyze_weekly_summary(fiscal_year),
            )
        }
    }
}

fn run_analysis(
    command: &str,
    args: &AnalysisRunArgs,
    runtime_paths: &RuntimePaths,
    gateway_config: GatewayConfig,
    analyze: impl FnOnce(&mut SqlitePipeline<'_>) -> Result<AnalysisResult, PipelineError>,
) -> Result<()> {
    let insight_config = args.insight.to_config();
    println!(
        "analyze: start kind={command} warehouse={} model={}",
        runtime_paths.warehouse.display(),
        insight_config.model
    );

    let generator = ChatCompletionsGenerator::new(insight_config)?;
    let mut gateway = open_gateway(runtime_paths, gateway_config)?;
    let mut pipeline = ReportPipeline::new(
        &mut gateway,
        &generator,
        DimensionSpec::auction_warehouse(),
        args.pipeline.to_config(),
    );
    let analysis = analyze(&mut pipeline)?;
    println!("analyze: complete name={}", analysis.name());
    println!("{}", analysis.text());
    Ok(())
}
