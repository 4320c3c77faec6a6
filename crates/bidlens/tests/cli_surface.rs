use std::path::Path;

use bidlens::cli::app::{Cli, Command};
use bidlens::cli::commands::analyze::AnalyzeCommand;
use bidlens::cli::commands::query::QueryCommand;
use bidlens::cli::commands::report::ReportCommand;
use clap::Parser;

#[test]
fn parses_global_runtime_flags_for_query() {
    let cli = Cli::parse_from([
        "bidlens",
        "--home-dir",
        "/home/analyst",
        "--cwd",
        "/work/auctions",
        "--warehouse",
        "~/data/fy2026.sqlite",
        "query",
        "sql",
        "SELECT * FROM items",
        "--params",
        "[2026]",
        "--default-limit",
        "50",
    ]);

    assert_eq!(
        cli.runtime.home_dir.as_deref(),
        Some(Path::new("/home/analyst"))
    );
    assert_eq!(cli.runtime.cwd.as_deref(), Some(Path::new("/work/auctions")));
    assert_eq!(
        cli.runtime.warehouse.as_deref(),
        Some(Path::new("~/data/fy2026.sqlite"))
    );
    assert_eq!(cli.runtime.default_limit, 50);

    match cli.command {
        Command::Query(args) => match args.command {
            QueryCommand::Sql(sql) => {
                assert_eq!(sql.sql, "SELECT * FROM items");
                assert_eq!(sql.params.as_deref(), Some("[2026]"));
                assert_eq!(sql.max_rows, 20);
                assert!(!sql.json);
            }
            other => panic!("expected query sql, got {other:?}"),
        },
        other => panic!("expected query command, got {other:?}"),
    }
}

#[test]
fn parses_comprehensive_report_options() {
    let cli = Cli::parse_from([
        "bidlens",
        "report",
        "comprehensive",
        "--fiscal-year",
        "2025",
        "--dimension",
        "region",
        "--week",
        "14",
        "--retries",
        "2",
        "--insight-model",
        "qwen2.5:14b",
        "--text-only",
    ]);

    match cli.command {
        Command::Report(args) => match args.command {
            ReportCommand::Comprehensive(report) => {
                assert_eq!(report.fiscal_year, 2025);
                assert_eq!(report.dimension, "region");
                assert_eq!(report.week, Some(14));
                assert!(report.run.text_only);
                assert_eq!(report.run.pipeline.retries, 2);
                assert_eq!(report.run.pipeline.to_config().retry.max_attempts, 3);
                assert_eq!(report.run.insight.insight_model, "qwen2.5:14b");
                assert_eq!(report.run.insight.insight_url, "http://localhost:11434");
            }
            other => panic!("expected comprehensive report, got {other:?}"),
        },
        other => panic!("expected report command, got {other:?}"),
    }
}

#[test]
fn report_defaults_follow_documented_values() {
    let cli = Cli::parse_from(["bidlens", "report", "weekly"]);

    assert_eq!(cli.runtime.default_limit, 100);
    match cli.command {
        Command::Report(args) => match args.command {
            ReportCommand::Weekly(weekly) => {
                assert_eq!(weekly.fiscal_year, 2026);
                assert_eq!(weekly.run.pipeline.max_rows, 20);
                assert_eq!(weekly.run.pipeline.retries, 0);
                assert!(!weekly.run.text_only);
                let insight = weekly.run.insight.to_config();
                assert_eq!(insight.model, "llama3.1:8b");
                assert_eq!(insight.max_tokens, 1_000);
                assert!((insight.temperature - 0.3).abs() < f32::EPSILON);
                assert_eq!(insight.timeout.as_secs(), 120);
            }
            other => panic!("expected weekly report, got {other:?}"),
        },
        other => panic!("expected report command, got {other:?}"),
    }
}

#[test]
fn parses_analyze_compare_positionals() {
    let cli = Cli::parse_from(["bidlens", "analyze", "compare", "Trucks", "Tractors"]);

    match cli.command {
        Command::Analyze(args) => match args.command {
            AnalyzeCommand::Compare(compare) => {
                assert_eq!(compare.first, "Trucks");
                assert_eq!(compare.second, "Tractors");
            }
            other => panic!("expected analyze compare, got {other:?}"),
        },
        other => panic!("expected analyze command, got {other:?}"),
    }
}

#[test]
fn rejects_zero_row_limits() {
    assert!(Cli::try_parse_from(["bidlens", "--default-limit", "0", "query", "datasets"]).is_err());
    assert!(
        Cli::try_parse_from(["bidlens", "report", "weekly", "--max-rows", "0"]).is_err()
    );
}
