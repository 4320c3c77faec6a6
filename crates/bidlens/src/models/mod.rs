pub mod report;
pub mod result_set;

pub use report::{
    AnalysisResult, CategoryReport, CategorySection, CategoryStats, ComprehensiveReport, Report,
    ReportKind, ReportRecord, SummaryStats, WeeklyDataPoint, WeeklyTrendsReport,
    report_record_schema,
};
pub use result_set::{ColumnDescriptor, ResultSet, Row, RowView, ScalarValue};
