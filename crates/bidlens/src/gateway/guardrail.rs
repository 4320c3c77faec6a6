//! Read-only query checks applied before anything reaches the warehouse.
//!
//! Matching works on identifier tokens with string literals and comments blanked out; quoted
//! identifiers only count toward the dataset allowlist. It is
//! not a SQL parser: a dataset name used only as a column alias satisfies the allowlist, and a
//! relation hidden behind an alias is not inspected.

use std::sync::OnceLock;

use regex::Regex;

use crate::catalog::DatasetCatalog;
use crate::error::{BidlensError, Result};

pub const DEFAULT_ROW_LIMIT: usize = 100;

const READ_KEYWORDS: &[&str] = &["select", "with"];

const MUTATING_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "merge", "upsert", "create", "alter", "drop", "truncate",
    "grant", "revoke", "copy", "attach", "detach", "pragma", "vacuum", "reindex", "begin",
    "commit", "rollback",
];

/// A query that passed every check, in the exact form that will be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    pub sql: String,
    pub limit_appended: bool,
    pub referenced_datasets: Vec<String>,
}

pub fn prepare_read_only_query(
    raw_sql: &str,
    catalog: &DatasetCatalog,
    default_limit: usize,
) -> Result<PreparedQuery> {
    let candidate = strip_trailing_semicolons(raw_sql);
    let masked = mask_literals_and_comments(candidate);
    let normalized = masked.text.to_ascii_lowercase();
    let leading = leading_keyword(&normalized);

    if normalized.trim().is_empty() {
        return Err(write_not_allowed(leading, "statement is empty"));
    }

    if normalized.contains(';') {
        return Err(write_not_allowed(
            leading,
            "multi-statement SQL is not allowed; submit exactly one read statement",
        ));
    }

    if !READ_KEYWORDS.contains(&leading.as_str()) {
        return Err(write_not_allowed(
            leading,
            "only SELECT and WITH ... SELECT statements are allowed",
        ));
    }

    if let Some(keyword) = first_mutating_keyword(&normalized) {
        return Err(write_not_allowed(
            leading,
            format!("mutating keyword `{keyword}` is not allowed"),
        ));
    }

    let referenced_datasets =
        referenced_datasets(&masked.identifiers.to_ascii_lowercase(), catalog);
    if referenced_datasets.is_empty() {
        return Err(BidlensError::DatasetNotAllowed {
            detail: format!(
                "query references none of the allowed datasets ({})",
                catalog.allowed_names().collect::<Vec<_>>().join(", ")
            ),
        });
    }

    if limit_clause_regex().is_match(&normalized) {
        return Ok(PreparedQuery {
            sql: raw_sql.to_string(),
            limit_appended: false,
            referenced_datasets,
        });
    }

    // An open trailing comment would swallow the appended clause.
    let glue = if masked.ends_in_line_comment {
        "\n"
    } else if masked.ends_in_block_comment {
        " */ "
    } else {
        " "
    };
    Ok(PreparedQuery {
        sql: format!("{candidate}{glue}LIMIT {default_limit}"),
        limit_appended: true,
        referenced_datasets,
    })
}

fn write_not_allowed(leading_keyword: String, reason: impl Into<String>) -> BidlensError {
    BidlensError::WriteNotAllowed {
        leading_keyword,
        reason: reason.into(),
    }
}

fn strip_trailing_semicolons(raw_sql: &str) -> &str {
    let mut candidate = raw_sql.trim();
    while let Some(stripped) = candidate.strip_suffix(';') {
        candidate = stripped.trim_end();
    }
    candidate
}

fn tokens(normalized_sql: &str) -> impl Iterator<Item = &str> {
    normalized_sql
        .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
        .filter(|token| !token.is_empty())
}

fn leading_keyword(normalized_sql: &str) -> String {
    tokens(normalized_sql).next().unwrap_or("none").to_string()
}

fn first_mutating_keyword(normalized_sql: &str) -> Option<String> {
    tokens(normalized_sql).find_map(|token| {
        MUTATING_KEYWORDS
            .contains(&token)
            .then_some(token.to_string())
    })
}

fn referenced_datasets(normalized_sql: &str, catalog: &DatasetCatalog) -> Vec<String> {
    let mut referenced: Vec<String> = Vec::new();
    for token in tokens(normalized_sql) {
        if catalog.is_allowed(token) && !referenced.iter().any(|seen| seen == token) {
            referenced.push(token.to_string());
        }
    }
    referenced
}

fn limit_clause_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"\blimit\s+(\d+|all\b|\?\d*|\$\d+|:[a-z_][a-z0-9_]*)")
            .expect("limit clause regex should compile")
    })
}

#[derive(Debug)]
struct MaskedSql {
    /// Literals, quoted identifiers and comments blanked.
    text: String,
    /// Like `text`, but quoted identifiers keep their content.
    identifiers: String,
    ends_in_line_comment: bool,
    ends_in_block_comment: bool,
}

/// Blanks literals, quoted identifiers and comments with spaces so token scans only see code.
fn mask_literals_and_comments(sql: &str) -> MaskedSql {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum State {
        Code,
        Literal,
        QuotedIdentifier(char),
        LineComment,
        BlockComment,
    }

    let chars = sql.chars().collect::<Vec<_>>();
    let mut text = String::with_capacity(sql.len());
    let mut identifiers = String::with_capacity(sql.len());
    let mut state = State::Code;
    let mut index = 0;

    fn blank(text: &mut String, identifiers: &mut String, width: usize) {
        for _ in 0..width {
            text.push(' ');
            identifiers.push(' ');
        }
    }

    while index < chars.len() {
        let current = chars[index];
        let next = chars.get(index + 1).copied();
        match state {
            State::Code => match (current, next) {
                ('\'', _) => {
                    state = State::Literal;
                    blank(&mut text, &mut identifiers, 1);
                }
                ('"' | '`', _) => {
                    state = State::QuotedIdentifier(current);
                    blank(&mut text, &mut identifiers, 1);
                }
                ('-', Some('-')) => {
                    state = State::LineComment;
                    blank(&mut text, &mut identifiers, 2);
                    index += 1;
                }
                ('/', Some('*')) => {
                    state = State::BlockComment;
                    blank(&mut text, &mut identifiers, 2);
                    index += 1;
                }
                _ => {
                    text.push(current);
                    identifiers.push(current);
                }
            },
            State::Literal => {
                if current == '\'' && next == Some('\'') {
                    blank(&mut text, &mut identifiers, 2);
                    index += 1;
                } else {
                    if current == '\'' {
                        state = State::Code;
                    }
                    blank(&mut text, &mut identifiers, 1);
                }
            }
            State::QuotedIdentifier(quote) => {
                if current == quote && next == Some(quote) {
                    blank(&mut text, &mut identifiers, 2);
                    index += 1;
                } else if current == quote {
                    state = State::Code;
                    blank(&mut text, &mut identifiers, 1);
                } else {
                    text.push(' ');
                    identifiers.push(current);
                }
            }
            State::LineComment => {
                if current == '\n' {
                    state = State::Code;
                    text.push('\n');
                    identifiers.push('\n');
                } else {
                    blank(&mut text, &mut identifiers, 1);
                }
            }
            State::BlockComment => {
                if current == '*' && next == Some('/') {
                    state = State::Code;
                    blank(&mut text, &mut identifiers, 2);
                    index += 1;
                } else {
                    blank(&mut text, &mut identifiers, 1);
                }
            }
        }
        index += 1;
    }

    MaskedSql {
        text,
        identifiers,
        ends_in_line_comment: state == State::LineComment,
        ends_in_block_comment: state == State::BlockComment,
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_ROW_LIMIT, mask_literals_and_comments, prepare_read_only_query};
    use crate::catalog::DatasetCatalog;
    use crate::error::{BidlensError, ErrorKind};

    fn prepare(sql: &str) -> crate::error::Result<super::PreparedQuery> {
        prepare_read_only_query(sql, &DatasetCatalog::auction_warehouse(), DEFAULT_ROW_LIMIT)
    }

    #[test]
    fn allows_select_and_cte_forms() {
        assert!(prepare("SELECT * FROM items").is_ok());
        assert!(prepare("select * from items ; ").is_ok());
        assert!(
            prepare("WITH recent AS (SELECT * FROM weekly_metrics_summary) SELECT * FROM recent")
                .is_ok()
        );
    }

    #[test]
    fn rejects_non_read_leading_keywords() {
        for sql in [
            "DELETE FROM items",
            "update items set hammer = 0",
            "  Insert INTO items VALUES (1)",
            "EXPLAIN SELECT * FROM items",
            "",
        ] {
            let error = prepare(sql).expect_err("non-read statement must be rejected");
            assert_eq!(error.kind(), ErrorKind::WriteNotAllowed, "sql: {sql}");
        }
    }

    #[test]
    fn rejects_stacked_and_embedded_writes() {
        let stacked = prepare("SELECT * FROM items; DROP TABLE items")
            .expect_err("stacked statements must be rejected");
        assert_eq!(stacked.kind(), ErrorKind::WriteNotAllowed);

        let embedded = prepare("WITH gone AS (DELETE FROM items RETURNING *) SELECT * FROM gone")
            .expect_err("data-modifying CTE must be rejected");
        match embedded {
            BidlensError::WriteNotAllowed {
                leading_keyword,
                reason,
            } => {
                assert_eq!(leading_keyword, "with");
                assert!(reason.contains("`delete`"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn keywords_inside_literals_are_ignored() {
        let prepared = prepare("SELECT * FROM items WHERE model = 'delete; drop'")
            .expect("literal content is not code");
        assert!(prepared.limit_appended);
    }

    #[test]
    fn requires_an_allowlisted_dataset_token() {
        let error = prepare("SELECT * FROM bidder_accounts").expect_err("unknown table");
        assert_eq!(error.kind(), ErrorKind::DatasetNotAllowed);

        let commented = prepare("SELECT 1 -- items").expect_err("comment is not a reference");
        assert_eq!(commented.kind(), ErrorKind::DatasetNotAllowed);

        let prepared = prepare("SELECT * FROM public.Weekly_Metrics_Summary JOIN items ON 1 = 1")
            .expect("qualified names match on the table token");
        assert_eq!(
            prepared.referenced_datasets,
            vec!["weekly_metrics_summary".to_string(), "items".to_string()]
        );
    }

    #[test]
    fn appends_default_limit_only_when_missing() {
        let appended = prepare("SELECT * FROM items;").expect("valid query");
        assert_eq!(appended.sql, "SELECT * FROM items LIMIT 100");
        assert!(appended.limit_appended);

        let original = "SELECT * FROM items ORDER BY hammer DESC LIMIT 5;";
        let kept = prepare(original).expect("valid query");
        assert_eq!(kept.sql, original);
        assert!(!kept.limit_appended);

        let bound = prepare("SELECT * FROM items LIMIT ?2").expect("bound limit");
        assert!(!bound.limit_appended);
    }

    #[test]
    fn limit_word_in_literal_or_column_does_not_count() {
        let literal = prepare("SELECT * FROM items WHERE model = 'limit 5'").expect("valid");
        assert!(literal.limit_appended);

        let column = prepare("SELECT credit_limit FROM items").expect("valid");
        assert!(column.limit_appended);
    }

    #[test]
    fn trailing_line_comment_moves_limit_to_next_line() {
        let prepared = prepare("SELECT * FROM items -- newest first").expect("valid");
        assert_eq!(prepared.sql, "SELECT * FROM items -- newest first\nLIMIT 100");
    }

    #[test]
    fn masking_preserves_escaped_quotes_and_block_comments() {
        let masked = mask_literals_and_comments("SELECT 'it''s' /* items */ FROM x");
        assert!(!masked.text.contains("items"));
        assert!(!masked.text.contains('\''));
        assert!(masked.text.contains("FROM x"));
        assert!(!masked.ends_in_line_comment);
        assert!(!masked.ends_in_block_comment);
    }

    #[test]
    fn unterminated_block_comment_is_closed_before_limit() {
        let prepared = prepare("SELECT * FROM items /* trailing note").expect("valid");
        assert_eq!(prepared.sql, "SELECT * FROM items /* trailing note */ LIMIT 100");
        assert!(prepared.limit_appended);

        let hidden = prepare("SELECT * FROM items /* LIMIT 5").expect("valid");
        assert!(hidden.limit_appended, "a limit inside a comment does not count");
        assert_eq!(hidden.sql, "SELECT * FROM items /* LIMIT 5 */ LIMIT 100");
    }

    #[test]
    fn quoted_identifiers_are_not_scanned_as_code() {
        let aliased = prepare(r#"SELECT model AS "notes; misc" FROM items"#)
            .expect("semicolon inside a quoted alias is not a statement break");
        assert!(aliased.limit_appended);

        assert!(prepare(r#"SELECT hammer AS "update" FROM items"#).is_ok());
        assert!(prepare("SELECT hammer AS `drop` FROM items").is_ok());

        let quoted_limit = prepare(r#"SELECT hammer AS "limit 5" FROM items"#).expect("valid");
        assert!(quoted_limit.limit_appended);
    }

    #[test]
    fn quoted_table_names_still_satisfy_the_allowlist() {
        let prepared = prepare(r#"SELECT * FROM "weekly_metrics_summary""#).expect("valid");
        assert_eq!(
            prepared.referenced_datasets,
            vec!["weekly_metrics_summary".to_string()]
        );

        let error = prepare(r#"SELECT * FROM "bidder accounts""#).expect_err("not allowed");
        assert_eq!(error.kind(), ErrorKind::DatasetNotAllowed);
    }
}
