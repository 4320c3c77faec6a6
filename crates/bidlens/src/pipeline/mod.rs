//! Ordered, dependent analysis stages that assemble a [`Report`].
//!
//! Each stage runs fresh gateway queries, formats them, and hands the text (plus earlier
//! stage results) to the insight generator. The first failing stage aborts the build and
//! every partial result is dropped with it.

pub mod retry;
pub mod stages;

use std::fmt::{Display, Formatter};
use std::time::Instant;

use thiserror::Error;

use crate::catalog::{DimensionSpec, DimensionTarget};
use crate::error::{BidlensError, ErrorKind, Result};
use crate::format::{DEFAULT_MAX_ROWS, format_result_set};
use crate::gateway::{QueryGateway, Warehouse};
use crate::insight::{InsightGenerator, InsightTask};
use crate::models::{
    AnalysisResult, CategoryReport, CategorySection, CategoryStats, ComprehensiveReport, Report,
    ResultSet, ScalarValue, SummaryStats, WeeklyDataPoint, WeeklyTrendsReport,
};
use crate::utils::time::{elapsed_ms, now_utc};

pub use retry::RetryPolicy;

pub const DEFAULT_DIMENSION: &str = "industry";
pub const DEFAULT_SERIES_MAX_ROWS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageId {
    Summary,
    TrendAnalysis,
    AnomalyAnalysis,
    DimensionBreakdown,
    WeekInvestigation,
    ExecutiveReport,
    CategoryAnalysis,
    CategoryComparison,
    WeeklySummary,
}

impl StageId {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::TrendAnalysis => "trend_analysis",
            Self::AnomalyAnalysis => "anomaly_analysis",
            Self::DimensionBreakdown => "dimension_breakdown",
            Self::WeekInvestigation => "week_investigation",
            Self::ExecutiveReport => "executive_report",
            Self::CategoryAnalysis => "category_analysis",
            Self::CategoryComparison => "category_comparison",
            Self::WeeklySummary => "weekly_summary",
        }
    }

    #[must_use]
    pub const fn dependencies(self) -> &'static [StageId] {
        match self {
            Self::Summary
            | Self::DimensionBreakdown
            | Self::CategoryAnalysis
            | Self::WeeklySummary => &[],
            Self::TrendAnalysis | Self::AnomalyAnalysis | Self::WeekInvestigation => {
                &[Self::Summary]
            }
            Self::ExecutiveReport => &[
                Self::Summary,
                Self::TrendAnalysis,
                Self::AnomalyAnalysis,
                Self::DimensionBreakdown,
                Self::WeekInvestigation,
            ],
            Self::CategoryComparison => &[Self::CategoryAnalysis],
        }
    }

    /// Stages that a [`StageGraph`] can schedule. The category and ad hoc stages run through
    /// their own entry points.
    #[must_use]
    pub const fn is_graph_stage(self) -> bool {
        matches!(
            self,
            Self::Summary
                | Self::TrendAnalysis
                | Self::AnomalyAnalysis
                | Self::DimensionBreakdown
                | Self::WeekInvestigation
                | Self::ExecutiveReport
        )
    }
}

impl Display for StageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Stages in execution order, checked so every dependency is scheduled earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageGraph {
    stages: Vec<StageId>,
}

impl StageGraph {
    pub fn new(stages: Vec<StageId>) -> Result<Self> {
        for (position, stage) in stages.iter().enumerate() {
            if !stage.is_graph_stage() {
                return Err(precondition(*stage, "a report graph entry point"));
            }
            if stages[..position].contains(stage) {
                return Err(precondition(*stage, "a single slot in the graph"));
            }
            for dependency in stage.dependencies() {
                if !stages[..position].contains(dependency) {
                    return Err(precondition(*stage, dependency.key()));
                }
            }
        }
        Ok(Self { stages })
    }

    #[must_use]
    pub fn comprehensive() -> Self {
        Self {
            stages: vec![
                StageId::Summary,
                StageId::TrendAnalysis,
                StageId::AnomalyAnalysis,
                StageId::DimensionBreakdown,
                StageId::WeekInvestigation,
                StageId::ExecutiveReport,
            ],
        }
    }

    #[must_use]
    pub fn weekly_trends() -> Self {
        Self {
            stages: vec![
                StageId::Summary,
                StageId::TrendAnalysis,
                StageId::AnomalyAnalysis,
            ],
        }
    }

    #[must_use]
    pub fn stages(&self) -> &[StageId] {
        &self.stages
    }
}

fn precondition(stage: StageId, missing: &str) -> BidlensError {
    BidlensError::StagePreconditionUnmet {
        stage: stage.key().to_string(),
        missing: missing.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Statistics(SummaryStats),
    Analysis(AnalysisResult),
}

/// Outputs of completed stages within one build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageResults {
    outputs: Vec<(StageId, StageOutput)>,
}

impl StageResults {
    pub fn insert(&mut self, stage: StageId, output: StageOutput) {
        self.outputs.retain(|(existing, _)| *existing != stage);
        self.outputs.push((stage, output));
    }

    #[must_use]
    pub fn contains(&self, stage: StageId) -> bool {
        self.get(stage).is_some()
    }

    #[must_use]
    pub fn get(&self, stage: StageId) -> Option<&StageOutput> {
        self.outputs
            .iter()
            .find(|(existing, _)| *existing == stage)
            .map(|(_, output)| output)
    }

    pub fn statistics(&self, requester: StageId, stage: StageId) -> Result<SummaryStats> {
        match self.get(stage) {
            Some(StageOutput::Statistics(stats)) => Ok(*stats),
            _ => Err(precondition(requester, stage.key())),
        }
    }

    pub fn analysis(&self, requester: StageId, stage: StageId) -> Result<&AnalysisResult> {
        match self.get(stage) {
            Some(StageOutput::Analysis(analysis)) => Ok(analysis),
            _ => Err(precondition(requester, stage.key())),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: StageId,
        #[source]
        source: BidlensError,
    },

    /// Rejected before any stage ran, e.g. an unknown dimension.
    #[error("report request rejected: {0}")]
    Rejected(#[source] BidlensError),
}

impl PipelineError {
    #[must_use]
    pub const fn stage(&self) -> Option<StageId> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub const fn error(&self) -> &BidlensError {
        match self {
            Self::Stage { source, .. } | Self::Rejected(source) => source,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.error().kind()
    }
}

fn stage_error(stage: StageId) -> impl FnOnce(BidlensError) -> PipelineError {
    move |source| PipelineError::Stage { stage, source }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Row cap for breakdown and sample tables handed to the generator.
    pub max_rows: usize,
    /// Row cap for the weekly series, which covers a whole fiscal year.
    pub series_max_rows: usize,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            series_max_rows: DEFAULT_SERIES_MAX_ROWS,
            retry: RetryPolicy::none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComprehensiveOptions {
    pub fiscal_year: i32,
    pub dimension: String,
    pub focus_week: Option<i64>,
}

impl ComprehensiveOptions {
    #[must_use]
    pub fn new(fiscal_year: i32) -> Self {
        Self {
            fiscal_year,
            dimension: DEFAULT_DIMENSION.to_string(),
            focus_week: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BuildContext<'c> {
    fiscal_year: i32,
    dimension: Option<(&'c str, DimensionTarget)>,
    focus_week: Option<i64>,
}

#[derive(Debug, Default)]
struct BuildState {
    results: StageResults,
    weekly_series: Option<ResultSet>,
    focus_week: Option<i64>,
}

pub struct ReportPipeline<'a, W, G: ?Sized> {
    gateway: &'a mut QueryGateway<W>,
    generator: &'a G,
    dimensions: DimensionSpec,
    config: PipelineConfig,
}

impl<'a, W: Warehouse, G: InsightGenerator + ?Sized> ReportPipeline<'a, W, G> {
    pub fn new(
        gateway: &'a mut QueryGateway<W>,
        generator: &'a G,
        dimensions: DimensionSpec,
        config: PipelineConfig,
    ) -> Self {
        Self {
            gateway,
            generator,
            dimensions,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    pub fn build_category_report(&mut self) -> Result<Report, PipelineError> {
        let stage = StageId::CategoryAnalysis;
        let started = Instant::now();
        let listing = self
            .query(&stages::categories_sql(), &[])
            .map_err(stage_error(stage))?;
        let categories = listing
            .iter()
            .filter_map(|row| row.get("category"))
            .filter(|value| !value.is_null())
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        tracing::info!(categories = categories.len(), "category report started");

        let mut sections = Vec::with_capacity(categories.len());
        for category in categories {
            let (analysis, stats) = self
                .analyze_category(&category)
                .map_err(stage_error(stage))?;
            sections.push(CategorySection {
                category,
                analysis,
                stats,
            });
        }

        tracing::info!(
            sections = sections.len(),
            duration_ms = elapsed_ms(started),
            "category report assembled"
        );
        Ok(Report::CategoryAnalysis(CategoryReport {
            generated_at: now_utc(),
            categories: sections,
        }))
    }

    pub fn build_weekly_trends_report(
        &mut self,
        fiscal_year: i32,
    ) -> Result<Report, PipelineError> {
        let context = BuildContext {
            fiscal_year,
            dimension: None,
            focus_week: None,
        };
        let state = self.run_graph(&StageGraph::weekly_trends(), context)?;
        let results = &state.results;

        Ok(Report::WeeklyTrends(WeeklyTrendsReport {
            generated_at: now_utc(),
            fiscal_year,
            trend_analysis: take_analysis(results, StageId::TrendAnalysis)?,
            anomaly_analysis: take_analysis(results, StageId::AnomalyAnalysis)?,
            summary_stats: results
                .statistics(StageId::Summary, StageId::Summary)
                .map_err(stage_error(StageId::Summary))?,
        }))
    }

    pub fn build_comprehensive_report(
        &mut self,
        fiscal_year: i32,
    ) -> Result<Report, PipelineError> {
        self.build_comprehensive_report_with(&ComprehensiveOptions::new(fiscal_year))
    }

    pub fn build_comprehensive_report_with(
        &mut self,
        options: &ComprehensiveOptions,
    ) -> Result<Report, PipelineError> {
        let target = self
            .dimensions
            .resolve(&options.dimension)
            .map_err(PipelineError::Rejected)?;
        let dimension = options.dimension.trim().to_ascii_lowercase();
        let context = BuildContext {
            fiscal_year: options.fiscal_year,
            dimension: Some((dimension.as_str(), target)),
            focus_week: options.focus_week,
        };

        let graph = StageGraph::comprehensive();
        let state = self.run_graph(&graph, context)?;
        let results = &state.results;

        let mut analyses = Vec::new();
        for stage in graph.stages() {
            if matches!(stage, StageId::Summary | StageId::ExecutiveReport) {
                continue;
            }
            analyses.push(take_analysis(results, *stage)?);
        }
        let weekly_data = state
            .weekly_series
            .as_ref()
            .map(|series| series.iter().map(WeeklyDataPoint::from_row).collect())
            .unwrap_or_default();

        Ok(Report::Comprehensive(ComprehensiveReport {
            generated_at: now_utc(),
            fiscal_year: options.fiscal_year,
            dimension,
            focus_week: state.focus_week,
            analyses,
            executive_report: take_analysis(results, StageId::ExecutiveReport)?,
            summary_stats: results
                .statistics(StageId::Summary, StageId::Summary)
                .map_err(stage_error(StageId::Summary))?,
            weekly_data,
        }))
    }

    pub fn analyze_dimension(
        &mut self,
        dimension: &str,
        fiscal_year: i32,
    ) -> Result<AnalysisResult, PipelineError> {
        let target = self
            .dimensions
            .resolve(dimension)
            .map_err(PipelineError::Rejected)?;
        let name = dimension.trim().to_ascii_lowercase();
        self.dimension_breakdown(fiscal_year, &name, target)
            .map_err(stage_error(StageId::DimensionBreakdown))
    }

    pub fn compare_categories(
        &mut self,
        first: &str,
        second: &str,
    ) -> Result<AnalysisResult, PipelineError> {
        let stage = StageId::CategoryComparison;
        let (first_analysis, _) = self.analyze_category(first).map_err(stage_error(stage))?;
        let (second_analysis, _) = self.analyze_category(second).map_err(stage_error(stage))?;

        let task = stages::comparison_task(
            &format!("{first}:\n{}", first_analysis.text()),
            &format!("{second}:\n{}", second_analysis.text()),
        );
        let text = self.generate(&task).map_err(stage_error(stage))?;
        Ok(AnalysisResult::new(stage.key(), text))
    }

    pub fn analyze_weekly_summary(
        &mut self,
        fiscal_year: i32,
    ) -> Result<AnalysisResult, PipelineError> {
        let stage = StageId::WeeklySummary;
        let summary = self.summary_stats(fiscal_year).map_err(stage_error(stage))?;
        let mut series = None;
        let weekly_data = self
            .weekly_series(fiscal_year, &mut series)
            .map(|series| format_result_set(series, self.config.series_max_rows))
            .map_err(stage_error(stage))?;

        let task = stages::weekly_summary_task(&summary.render_text(), &weekly_data);
        let text = self.generate(&task).map_err(stage_error(stage))?;
        Ok(AnalysisResult::new(stage.key(), text))
    }

    fn run_graph(
        &mut self,
        graph: &StageGraph,
        context: BuildContext<'_>,
    ) -> Result<BuildState, PipelineError> {
        let mut state = BuildState::default();
        for &stage in graph.stages() {
            let started = Instant::now();
            tracing::info!(stage = stage.key(), "stage started");

            let output = self.run_stage(stage, context, &mut state).map_err(|source| {
                tracing::error!(
                    stage = stage.key(),
                    kind = source.kind().key(),
                    duration_ms = elapsed_ms(started),
                    "stage failed: {source}"
                );
                PipelineError::Stage { stage, source }
            })?;
            state.results.insert(stage, output);

            tracing::info!(
                stage = stage.key(),
                duration_ms = elapsed_ms(started),
                "stage completed"
            );
        }
        Ok(state)
    }

    fn run_stage(
        &mut self,
        stage: StageId,
        context: BuildContext<'_>,
        state: &mut BuildState,
    ) -> Result<StageOutput> {
        for dependency in stage.dependencies() {
            if !state.results.contains(*dependency) {
                return Err(precondition(stage, dependency.key()));
            }
        }

        let fiscal_year = context.fiscal_year;
        match stage {
            StageId::Summary => self.summary_stats(fiscal_year).map(StageOutput::Statistics),
            StageId::TrendAnalysis | StageId::AnomalyAnalysis => {
                let summary = state
                    .results
                    .statistics(stage, StageId::Summary)?
                    .render_text();
                let weekly_data = {
                    let series = self.weekly_series(fiscal_year, &mut state.weekly_series)?;
                    format_result_set(series, self.config.series_max_rows)
                };
                let task = if stage == StageId::TrendAnalysis {
                    stages::trend_task(&summary, &weekly_data)
                } else {
                    stages::anomaly_task(&summary, &weekly_data)
                };
                self.narrate(stage, &task)
            }
            StageId::DimensionBreakdown => {
                let (name, target) = context
                    .dimension
                    .ok_or_else(|| precondition(stage, "a resolved dimension"))?;
                self.dimension_breakdown(fiscal_year, name, target)
                    .map(StageOutput::Analysis)
            }
            StageId::WeekInvestigation => {
                let (_, target) = context
                    .dimension
                    .ok_or_else(|| precondition(stage, "a resolved dimension"))?;
                let focus_week = match context.focus_week {
                    Some(week) => Some(week),
                    None => self.find_focus_week(fiscal_year)?,
                };
                state.focus_week = focus_week;
                self.investigate_week(fiscal_year, focus_week, target)
                    .map(StageOutput::Analysis)
            }
            StageId::ExecutiveReport => {
                let results = &state.results;
                let summary = results.statistics(stage, StageId::Summary)?.render_text();
                let task = stages::executive_task(
                    &summary,
                    results.analysis(stage, StageId::TrendAnalysis)?.text(),
                    results.analysis(stage, StageId::AnomalyAnalysis)?.text(),
                    results.analysis(stage, StageId::DimensionBreakdown)?.text(),
                    results.analysis(stage, StageId::WeekInvestigation)?.text(),
                );
                self.narrate(stage, &task)
            }
            StageId::CategoryAnalysis | StageId::CategoryComparison | StageId::WeeklySummary => {
                Err(precondition(stage, "a report graph entry point"))
            }
        }
    }

    fn summary_stats(&mut self, fiscal_year: i32) -> Result<SummaryStats> {
        let result = self.query(&stages::summary_stats_sql(), &[fiscal_year.into()])?;
        Ok(result.first().map(SummaryStats::from_row).unwrap_or_default())
    }

    /// Fetches the fiscal-year series once per build; later stages reuse it.
    fn weekly_series<'s>(
        &mut self,
        fiscal_year: i32,
        cache: &'s mut Option<ResultSet>,
    ) -> Result<&'s ResultSet> {
        if cache.is_none() {
            *cache = Some(self.query(&stages::weekly_series_sql(), &[fiscal_year.into()])?);
        }
        cache
            .as_ref()
            .ok_or_else(|| BidlensError::query_failed("weekly series was not fetched"))
    }

    fn dimension_breakdown(
        &mut self,
        fiscal_year: i32,
        dimension: &str,
        target: DimensionTarget,
    ) -> Result<AnalysisResult> {
        let breakdown = self.query(
            &stages::dimension_breakdown_sql(target),
            &[fiscal_year.into()],
        )?;
        let task = stages::dimension_task(
            dimension,
            &format_result_set(&breakdown, self.config.max_rows),
        );
        let text = self.generate(&task)?;
        Ok(AnalysisResult::new(StageId::DimensionBreakdown.key(), text))
    }

    fn find_focus_week(&mut self, fiscal_year: i32) -> Result<Option<i64>> {
        let result = self.query(&stages::focus_week_sql(), &[fiscal_year.into()])?;
        Ok(result.first().and_then(|row| row.i64("fiscal_week_number")))
    }

    fn investigate_week(
        &mut self,
        fiscal_year: i32,
        focus_week: Option<i64>,
        target: DimensionTarget,
    ) -> Result<AnalysisResult> {
        let max_rows = self.config.max_rows;
        let (label, week_summary, week_breakdown) = match focus_week {
            Some(week) => {
                let params = [ScalarValue::from(fiscal_year), ScalarValue::from(week)];
                let summary = self.query(&stages::week_summary_sql(), &params)?;
                let breakdown = self.query(&stages::week_breakdown_sql(target), &params)?;
                (
                    format!("Week {week} of fiscal year {fiscal_year}"),
                    format_result_set(&summary, max_rows),
                    format_result_set(&breakdown, max_rows),
                )
            }
            None => {
                let empty = ResultSet::empty(String::new(), Vec::new());
                (
                    format!("No weeks recorded for fiscal year {fiscal_year}"),
                    format_result_set(&empty, max_rows),
                    format_result_set(&empty, max_rows),
                )
            }
        };
        let averages = self.query(&stages::all_weeks_average_sql(), &[fiscal_year.into()])?;

        let task = stages::week_investigation_task(
            &label,
            &week_summary,
            &week_breakdown,
            &format_result_set(&averages, max_rows),
        );
        let text = self.generate(&task)?;
        Ok(AnalysisResult::new(StageId::WeekInvestigation.key(), text))
    }

    fn analyze_category(&mut self, category: &str) -> Result<(AnalysisResult, CategoryStats)> {
        tracing::debug!(category, "analyzing category");
        let params = [ScalarValue::from(category)];
        let stats = self
            .query(&stages::category_stats_sql(), &params)?
            .first()
            .map(CategoryStats::from_row)
            .unwrap_or_default();
        let samples = self.query(&stages::category_samples_sql(), &params)?;

        let task = stages::category_task(
            &stats.render_text(category),
            &format_result_set(&samples, self.config.max_rows),
        );
        let text = self.generate(&task)?;
        Ok((AnalysisResult::new(category, text), stats))
    }

    fn narrate(&self, stage: StageId, task: &InsightTask) -> Result<StageOutput> {
        let text = self.generate(task)?;
        Ok(StageOutput::Analysis(AnalysisResult::new(stage.key(), text)))
    }

    fn query(&mut self, sql: &str, params: &[ScalarValue]) -> Result<ResultSet> {
        let gateway = &mut *self.gateway;
        self.config
            .retry
            .run("query", || gateway.execute(sql, params))
    }

    fn generate(&self, task: &InsightTask) -> Result<String> {
        let generator = self.generator;
        self.config
            .retry
            .run(task.name, || generator.generate(task))
    }
}

fn take_analysis(results: &StageResults, stage: StageId) -> Result<AnalysisResult, PipelineError> {
    results
        .analysis(stage, stage)
        .cloned()
        .map_err(stage_error(stage))
}
