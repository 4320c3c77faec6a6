use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::format::format_currency;
use crate::models::{Report, SummaryStats};
use crate::utils::time::{file_stamp, format_rfc3339};

const BANNER_WIDTH: usize = 80;

/// Writes assembled reports under one output directory as `<report_type>_<stamp>.json|.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportStore {
    out_dir: PathBuf,
}

impl ReportStore {
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    #[must_use]
    pub fn path_for(&self, report: &Report, extension: &str) -> PathBuf {
        self.out_dir.join(format!(
            "{}_{}.{extension}",
            report.kind().key(),
            file_stamp(report.generated_at())
        ))
    }

    pub fn save(&self, report: &Report) -> Result<PathBuf> {
        let path = self.path_for(report, "json");
        let encoded = serde_json::to_vec_pretty(&report.to_record())
            .context("failed to encode report record json")?;
        self.write(&path, &encoded)?;
        tracing::info!(path = %path.display(), "report record saved");
        Ok(path)
    }

    pub fn save_text(&self, report: &Report) -> Result<PathBuf> {
        let path = self.path_for(report, "txt");
        self.write(&path, render_text(report).as_bytes())?;
        tracing::info!(path = %path.display(), "text report saved");
        Ok(path)
    }

    /// Writes the JSON record and the text document together. Both payloads are rendered before
    /// anything touches disk, and the record is removed again if the text write fails.
    pub fn save_with_text(&self, report: &Report) -> Result<(PathBuf, PathBuf)> {
        let json_path = self.path_for(report, "json");
        let text_path = self.path_for(report, "txt");
        let encoded = serde_json::to_vec_pretty(&report.to_record())
            .context("failed to encode report record json")?;
        let text = render_text(report);

        self.write(&json_path, &encoded)?;
        if let Err(error) = self.write(&text_path, text.as_bytes()) {
            if let Err(cleanup) = std::fs::remove_file(&json_path) {
                tracing::warn!(
                    path = %json_path.display(),
                    error = %cleanup,
                    "failed to remove report record after text write failure"
                );
            }
            return Err(error);
        }

        tracing::info!(
            json = %json_path.display(),
            text = %text_path.display(),
            "report saved"
        );
        Ok((json_path, text_path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.out_dir).with_context(|| {
            format!(
                "failed to create report output directory: {}",
                self.out_dir.display()
            )
        })?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write report artifact: {}", path.display()))
    }
}

/// Human-readable rendering used by [`ReportStore::save_text`].
#[must_use]
pub fn render_text(report: &Report) -> String {
    let heavy = "=".repeat(BANNER_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "AUCTION ANALYSIS REPORT");
    let _ = writeln!(out, "Generated: {}", format_rfc3339(report.generated_at()));
    let _ = writeln!(out, "Report Type: {}", report.kind().key());
    let _ = writeln!(out, "{heavy}\n");

    match report {
        Report::WeeklyTrends(weekly) => {
            push_section(&mut out, "WEEKLY TRENDS ANALYSIS", weekly.trend_analysis.text());
            push_section(&mut out, "ANOMALY DETECTION", weekly.anomaly_analysis.text());
            push_heading(&mut out, "SUMMARY STATISTICS");
            push_statistics(&mut out, &weekly.summary_stats);
        }
        Report::Comprehensive(comprehensive) => {
            push_section(
                &mut out,
                "EXECUTIVE REPORT",
                comprehensive.executive_report.text(),
            );
        }
        Report::CategoryAnalysis(category_report) => {
            for section in &category_report.categories {
                push_section(
                    &mut out,
                    &format!("CATEGORY: {}", section.category),
                    section.analysis.text(),
                );
                let _ = writeln!(out, "{}\n", section.stats.render_text(&section.category));
            }
        }
    }

    out
}

fn push_heading(out: &mut String, heading: &str) {
    let _ = writeln!(out, "{heading}");
    let _ = writeln!(out, "{}", "-".repeat(BANNER_WIDTH));
}

fn push_section(out: &mut String, heading: &str, body: &str) {
    push_heading(out, heading);
    let _ = writeln!(out, "{body}\n");
}

fn push_statistics(out: &mut String, stats: &SummaryStats) {
    let _ = writeln!(out, "Total Weeks: {}", stats.total_weeks);
    let _ = writeln!(
        out,
        "Avg Lot Value: {}",
        format_currency(stats.avg_lot_value_overall)
    );
    let _ = writeln!(
        out,
        "Total Revenue: {}",
        format_currency(stats.total_revenue_fy)
    );
    let _ = writeln!(out, "Total Items: {}", stats.total_items_fy);
}
