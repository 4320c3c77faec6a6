use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::format::{format_currency, format_integer};
use crate::models::RowView;
use crate::utils::time::format_rfc3339;

/// Text produced by one pipeline stage, stored under the stage name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    name: String,
    text: String,
}

impl AnalysisResult {
    #[must_use]
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryStats {
    pub total_weeks: i64,
    pub avg_lot_value_overall: f64,
    pub total_revenue_fy: f64,
    pub total_items_fy: i64,
    pub total_bids_fy: i64,
}

impl SummaryStats {
    /// Missing or non-numeric aggregates (an empty fiscal year yields NULLs) count as zero.
    #[must_use]
    pub fn from_row(row: RowView<'_>) -> Self {
        Self {
            total_weeks: row.i64("total_weeks").unwrap_or(0),
            avg_lot_value_overall: row.f64("avg_lot_value_overall").unwrap_or(0.0),
            total_revenue_fy: row.f64("total_revenue_fy").unwrap_or(0.0),
            total_items_fy: row.i64("total_items_fy").unwrap_or(0),
            total_bids_fy: row.i64("total_bids_fy").unwrap_or(0),
        }
    }

    #[must_use]
    pub fn render_text(&self) -> String {
        [
            format!("Total Weeks: {}", self.total_weeks),
            format!(
                "Avg Lot Value: {}",
                format_currency(self.avg_lot_value_overall)
            ),
            format!("Total Revenue: {}", format_currency(self.total_revenue_fy)),
            format!("Total Items: {}", format_integer(self.total_items_fy)),
            format!("Total Bids: {}", format_integer(self.total_bids_fy)),
        ]
        .join("\n")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryStats {
    pub count: i64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub total_fees: f64,
}

impl CategoryStats {
    #[must_use]
    pub fn from_row(row: RowView<'_>) -> Self {
        Self {
            count: row.i64("count").unwrap_or(0),
            avg_price: row.f64("avg_price").unwrap_or(0.0),
            min_price: row.f64("min_price").unwrap_or(0.0),
            max_price: row.f64("max_price").unwrap_or(0.0),
            total_fees: row.f64("total_fees").unwrap_or(0.0),
        }
    }

    #[must_use]
    pub fn render_text(&self, category: &str) -> String {
        [
            format!("Category: {category}"),
            format!("Total Items: {}", format_integer(self.count)),
            format!("Average Price: {}", format_currency(self.avg_price)),
            format!(
                "Price Range: {} - {}",
                format_currency(self.min_price),
                format_currency(self.max_price)
            ),
            format!("Total Fees: {}", format_currency(self.total_fees)),
        ]
        .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeeklyDataPoint {
    pub week: i64,
    pub week_start: Option<String>,
    pub avg_lot_value: f64,
    pub total_items: i64,
    pub total_revenue: f64,
    pub total_bids: i64,
}

impl WeeklyDataPoint {
    #[must_use]
    pub fn from_row(row: RowView<'_>) -> Self {
        Self {
            week: row.i64("fiscal_week_number").unwrap_or(0),
            week_start: row
                .get("week_start_date")
                .filter(|value| !value.is_null())
                .map(ToString::to_string),
            avg_lot_value: row.f64("avg_lot_value").unwrap_or(0.0),
            total_items: row.i64("total_items_sold").unwrap_or(0),
            total_revenue: row.f64("total_revenue").unwrap_or(0.0),
            total_bids: row.i64("total_bids").unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    CategoryAnalysis,
    WeeklyTrends,
    Comprehensive,
}

impl ReportKind {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::CategoryAnalysis => "category_auction_analysis",
            Self::WeeklyTrends => "weekly_trends_analysis",
            Self::Comprehensive => "comprehensive_executive_report",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySection {
    pub category: String,
    pub analysis: AnalysisResult,
    pub stats: CategoryStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryReport {
    pub generated_at: OffsetDateTime,
    pub categories: Vec<CategorySection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyTrendsReport {
    pub generated_at: OffsetDateTime,
    pub fiscal_year: i32,
    pub trend_analysis: AnalysisResult,
    pub anomaly_analysis: AnalysisResult,
    pub summary_stats: SummaryStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComprehensiveReport {
    pub generated_at: OffsetDateTime,
    pub fiscal_year: i32,
    pub dimension: String,
    /// `None` when the fiscal year has no weekly rows to investigate.
    pub focus_week: Option<i64>,
    /// Stage narratives in execution order, excluding the executive narrative.
    pub analyses: Vec<AnalysisResult>,
    pub executive_report: AnalysisResult,
    pub summary_stats: SummaryStats,
    pub weekly_data: Vec<WeeklyDataPoint>,
}

/// An assembled report. Each kind carries exactly the sections it renders.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    CategoryAnalysis(CategoryReport),
    WeeklyTrends(WeeklyTrendsReport),
    Comprehensive(ComprehensiveReport),
}

impl Report {
    #[must_use]
    pub const fn kind(&self) -> ReportKind {
        match self {
            Self::CategoryAnalysis(_) => ReportKind::CategoryAnalysis,
            Self::WeeklyTrends(_) => ReportKind::WeeklyTrends,
            Self::Comprehensive(_) => ReportKind::Comprehensive,
        }
    }

    #[must_use]
    pub const fn generated_at(&self) -> OffsetDateTime {
        match self {
            Self::CategoryAnalysis(report) => report.generated_at,
            Self::WeeklyTrends(report) => report.generated_at,
            Self::Comprehensive(report) => report.generated_at,
        }
    }

    #[must_use]
    pub fn to_record(&self) -> ReportRecord {
        let mut record = ReportRecord {
            generated_at: format_rfc3339(self.generated_at()),
            report_type: self.kind().key().to_string(),
            fiscal_year: None,
            dimension: None,
            focus_week: None,
            sections: Vec::new(),
            summary_stats: None,
            categories: Vec::new(),
            weekly_data: Vec::new(),
        };

        match self {
            Self::CategoryAnalysis(report) => {
                for section in &report.categories {
                    record.sections.push(SectionRecord::from(&section.analysis));
                    record.categories.push(CategoryRecord {
                        category: section.category.clone(),
                        stats: section.stats,
                    });
                }
            }
            Self::WeeklyTrends(report) => {
                record.fiscal_year = Some(report.fiscal_year);
                record.sections = vec![
                    SectionRecord::from(&report.trend_analysis),
                    SectionRecord::from(&report.anomaly_analysis),
                ];
                record.summary_stats = Some(report.summary_stats);
            }
            Self::Comprehensive(report) => {
                record.fiscal_year = Some(report.fiscal_year);
                record.dimension = Some(report.dimension.clone());
                record.focus_week = report.focus_week;
                record.sections = report
                    .analyses
                    .iter()
                    .chain(std::iter::once(&report.executive_report))
                    .map(SectionRecord::from)
                    .collect();
                record.summary_stats = Some(report.summary_stats);
                record.weekly_data = report.weekly_data.clone();
            }
        }

        record
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionRecord {
    pub name: String,
    pub text: String,
}

impl From<&AnalysisResult> for SectionRecord {
    fn from(analysis: &AnalysisResult) -> Self {
        Self {
            name: analysis.name().to_string(),
            text: analysis.text().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryRecord {
    pub category: String,
    pub stats: CategoryStats,
}

/// Structured form persisted by the report store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportRecord {
    pub generated_at: String,
    pub report_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_week: Option<i64>,

    /// Serialized as a `{name: text}` object whose keys keep pipeline order.
    #[serde(with = "section_map")]
    #[schemars(with = "std::collections::BTreeMap<String, String>")]
    pub sections: Vec<SectionRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_stats: Option<SummaryStats>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<CategoryRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weekly_data: Vec<WeeklyDataPoint>,
}

mod section_map {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::SectionRecord;

    pub fn serialize<S: Serializer>(
        sections: &[SectionRecord],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(sections.len()))?;
        for section in sections {
            map.serialize_entry(&section.name, &section.text)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<SectionRecord>, D::Error> {
        struct SectionsVisitor;

        impl<'de> Visitor<'de> for SectionsVisitor {
            type Value = Vec<SectionRecord>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an object mapping section names to text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut sections = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, text)) = access.next_entry::<String, String>()? {
                    sections.push(SectionRecord { name, text });
                }
                Ok(sections)
            }
        }

        deserializer.deserialize_map(SectionsVisitor)
    }
}

#[must_use]
pub fn report_record_schema() -> Value {
    let schema = schemars::schema_for!(ReportRecord);
    match serde_json::to_value(schema) {
        Ok(value) => value,
        Err(error) => {
            panic!("failed to serialize generated report record schema: {error}");
        }
    }
}
