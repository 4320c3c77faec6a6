//! Fixed SQL and generation tasks for each pipeline stage.
//!
//! Identifiers are spliced only from [`Dataset`] and [`DimensionTarget`]; caller values
//! (fiscal year, week, category) are always bound as `?N` parameters.

use crate::catalog::{Dataset, DimensionTarget};
use crate::insight::InsightTask;

const WEEKLY_COLUMNS: &str = "fiscal_week_number, week_start_date, total_items_sold, \
                              avg_lot_value, total_revenue, total_bids";

#[must_use]
pub fn summary_stats_sql() -> String {
    format!(
        "SELECT COUNT(DISTINCT fiscal_week_number) AS total_weeks, \
         AVG(avg_lot_value) AS avg_lot_value_overall, \
         SUM(total_revenue) AS total_revenue_fy, \
         SUM(total_items_sold) AS total_items_fy, \
         SUM(total_bids) AS total_bids_fy \
         FROM {} WHERE fiscal_year = ?1",
        Dataset::WeeklyMetricsSummary.name()
    )
}

#[must_use]
pub fn weekly_series_sql() -> String {
    format!(
        "SELECT {WEEKLY_COLUMNS} FROM {} WHERE fiscal_year = ?1 ORDER BY fiscal_week_number",
        Dataset::WeeklyMetricsSummary.name()
    )
}

#[must_use]
pub fn dimension_breakdown_sql(target: DimensionTarget) -> String {
    let column = target.group_column;
    format!(
        "SELECT {column}, SUM(total_items_sold) AS total_items, \
         AVG(avg_lot_value) AS avg_lot_value, SUM(total_revenue) AS total_revenue \
         FROM {} WHERE fiscal_year = ?1 GROUP BY {column} ORDER BY total_items DESC",
        target.dataset_name()
    )
}

/// Week whose average lot value sits furthest from the fiscal-year mean. Ties go to the
/// earliest week.
#[must_use]
pub fn focus_week_sql() -> String {
    let table = Dataset::WeeklyMetricsSummary.name();
    format!(
        "SELECT fiscal_week_number FROM {table} WHERE fiscal_year = ?1 \
         ORDER BY ABS(avg_lot_value - (SELECT AVG(avg_lot_value) FROM {table} \
         WHERE fiscal_year = ?1)) DESC, fiscal_week_number LIMIT 1"
    )
}

#[must_use]
pub fn week_summary_sql() -> String {
    format!(
        "SELECT {WEEKLY_COLUMNS} FROM {} WHERE fiscal_year = ?1 AND fiscal_week_number = ?2",
        Dataset::WeeklyMetricsSummary.name()
    )
}

#[must_use]
pub fn week_breakdown_sql(target: DimensionTarget) -> String {
    let column = target.group_column;
    format!(
        "SELECT {column}, SUM(total_items_sold) AS total_items, \
         AVG(avg_lot_value) AS avg_lot_value, SUM(total_revenue) AS total_revenue \
         FROM {} WHERE fiscal_year = ?1 AND fiscal_week_number = ?2 \
         GROUP BY {column} ORDER BY total_items DESC",
        target.dataset_name()
    )
}

#[must_use]
pub fn all_weeks_average_sql() -> String {
    format!(
        "SELECT AVG(total_items_sold) AS avg_items_per_week, \
         AVG(avg_lot_value) AS avg_lot_value, \
         AVG(total_revenue) AS avg_revenue_per_week, \
         AVG(total_bids) AS avg_bids_per_week \
         FROM {} WHERE fiscal_year = ?1",
        Dataset::WeeklyMetricsSummary.name()
    )
}

#[must_use]
pub fn categories_sql() -> String {
    format!(
        "SELECT DISTINCT category FROM {} WHERE category IS NOT NULL ORDER BY category",
        Dataset::Items.name()
    )
}

#[must_use]
pub fn category_stats_sql() -> String {
    format!(
        "SELECT COUNT(*) AS count, AVG(hammer) AS avg_price, MIN(hammer) AS min_price, \
         MAX(hammer) AS max_price, SUM(total_fees) AS total_fees \
         FROM {} WHERE category = ?1",
        Dataset::Items.name()
    )
}

#[must_use]
pub fn category_samples_sql() -> String {
    format!(
        "SELECT unique_id, model, hammer, total_fees FROM {} WHERE category = ?1 \
         ORDER BY hammer DESC, unique_id LIMIT 5",
        Dataset::Items.name()
    )
}

pub fn trend_task(summary: &str, weekly_data: &str) -> InsightTask {
    InsightTask::new(
        "trend_analysis",
        "Analyze how average lot value, items sold and revenue move week over week \
         across the fiscal year. Identify the overall direction, turning points and \
         sustained runs, citing week numbers.",
    )
    .input("summary", "Fiscal-year summary statistics", summary)
    .input("weekly_data", "Weekly metrics table", weekly_data)
    .output("trend_analysis", "trend narrative for the fiscal year")
}

pub fn anomaly_task(summary: &str, weekly_data: &str) -> InsightTask {
    InsightTask::new(
        "anomaly_analysis",
        "Identify weeks whose lot value, volume or revenue deviate sharply from the \
         fiscal-year norm. For each anomaly give the week number, the metric and the \
         size of the deviation.",
    )
    .input("summary", "Fiscal-year summary statistics", summary)
    .input("weekly_data", "Weekly metrics table", weekly_data)
    .output("anomaly_analysis", "list of anomalous weeks with explanations")
}

pub fn dimension_task(dimension: &str, breakdown: &str) -> InsightTask {
    InsightTask::new(
        "dimension_breakdown",
        "Compare performance across the groups of the given dimension. Point out the \
         leaders and laggards by volume, average lot value and revenue.",
    )
    .input("dimension", "Grouping dimension", dimension)
    .input("breakdown", "Aggregated metrics per group", breakdown)
    .output("dimension_analysis", "comparison across dimension groups")
}

pub fn week_investigation_task(
    focus_week: &str,
    week_summary: &str,
    week_breakdown: &str,
    all_weeks_average: &str,
) -> InsightTask {
    InsightTask::new(
        "week_investigation",
        "Explain what made the focus week different from a typical week of the fiscal \
         year. Use the week's own metrics, its breakdown by group and the all-weeks \
         averages.",
    )
    .input("focus_week", "Fiscal week under investigation", focus_week)
    .input("week_summary", "Metrics for the focus week", week_summary)
    .input("week_breakdown", "Focus week metrics per group", week_breakdown)
    .input("all_weeks_average", "Average weekly metrics for the year", all_weeks_average)
    .output("week_investigation", "explanation of the focus week")
}

pub fn executive_task(
    summary: &str,
    trend: &str,
    anomalies: &str,
    breakdown: &str,
    week_investigation: &str,
) -> InsightTask {
    InsightTask::new(
        "executive_report",
        "Write an executive report for auction leadership. Open with the headline \
         numbers, then summarize trends, anomalies and group performance, and close \
         with recommended actions.",
    )
    .input("summary", "Fiscal-year summary statistics", summary)
    .input("trend_analysis", "Trend narrative", trend)
    .input("anomaly_analysis", "Anomaly narrative", anomalies)
    .input("dimension_analysis", "Group comparison narrative", breakdown)
    .input("week_investigation", "Focus week narrative", week_investigation)
    .output("executive_report", "executive report text")
}

pub fn category_task(category_stats: &str, sample_items: &str) -> InsightTask {
    InsightTask::new(
        "category_analysis",
        "Analyze the auction results for this category. Comment on pricing, fee load \
         and anything notable in the sample items.",
    )
    .input("category_stats", "Statistics for the category", category_stats)
    .input("sample_items", "Highest-priced items in the category", sample_items)
    .output("insights", "key insights and observations about the category")
}

pub fn comparison_task(first: &str, second: &str) -> InsightTask {
    InsightTask::new(
        "category_comparison",
        "Compare the two categories. Contrast their pricing, volume and fees and say \
         which performs better and why.",
    )
    .input("category1_analysis", "Analysis of the first category", first)
    .input("category2_analysis", "Analysis of the second category", second)
    .output("comparison", "comparison of the two categories")
}

pub fn weekly_summary_task(summary: &str, weekly_data: &str) -> InsightTask {
    InsightTask::new(
        "weekly_summary",
        "Summarize the fiscal year's weekly auction performance in a few paragraphs.",
    )
    .input("summary", "Fiscal-year summary statistics", summary)
    .input("weekly_data", "Weekly metrics table", weekly_data)
    .output("summary", "weekly performance summary")
}
