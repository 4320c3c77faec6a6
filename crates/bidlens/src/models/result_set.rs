use std::fmt::{Display, Formatter};

use serde::Serialize;
use serde_json::{Value, json};
use time::Date;
use time::macros::format_description;

/// One cell of a warehouse row.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Date(Date),
    Null,
}

impl ScalarValue {
    #[must_use]
    pub const fn kind_key(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
            Self::Null => "null",
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric coercion used at report boundaries. Drivers disagree on whether aggregates
    /// come back as integers, floats or numeric text, so all three are accepted.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(value) => value.trim().parse::<f64>().ok(),
            Self::Date(_) | Self::Null => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Float(value) if value.is_finite() => Some(value.round() as i64),
            Self::Float(_) => None,
            Self::Text(value) => {
                let trimmed = value.trim();
                trimmed.parse::<i64>().ok().or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|parsed| parsed.is_finite())
                        .map(|parsed| parsed.round() as i64)
                })
            }
            Self::Date(_) | Self::Null => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Integer(value) => json!(value),
            Self::Float(value) => json!(value),
            Self::Text(value) => json!(value),
            Self::Date(value) => json!(format_iso_date(*value)),
            Self::Null => Value::Null,
        }
    }

    /// Converts a caller-supplied JSON scalar into a bindable parameter.
    pub fn from_json(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(flag) => Ok(Self::Integer(i64::from(flag))),
            Value::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    Ok(Self::Integer(integer))
                } else if let Some(unsigned) = number.as_u64() {
                    i64::try_from(unsigned)
                        .map(Self::Integer)
                        .map_err(|_| "params integer exceeds 64-bit range".to_string())
                } else if let Some(real) = number.as_f64() {
                    Ok(Self::Float(real))
                } else {
                    Err("unsupported numeric param value".to_string())
                }
            }
            Value::String(text) => Ok(Self::Text(text)),
            Value::Array(_) | Value::Object(_) => {
                Err("params entries must be scalar JSON values".to_string())
            }
        }
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Date(value) => f.write_str(&format_iso_date(*value)),
            Self::Null => f.write_str("NULL"),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Date> for ScalarValue {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

#[must_use]
pub fn format_iso_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

#[must_use]
pub fn parse_iso_date(raw: &str) -> Option<Date> {
    let candidate = raw.trim();
    // Timestamps stored in DATE columns keep only their calendar day.
    let day = candidate.get(..10).unwrap_or(candidate);
    Date::parse(day, format_description!("[year]-[month]-[day]")).ok()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<ScalarValue>,
}

impl Row {
    #[must_use]
    pub fn new(values: Vec<ScalarValue>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn values(&self) -> &[ScalarValue] {
        &self.values
    }
}

impl From<Vec<ScalarValue>> for Row {
    fn from(values: Vec<ScalarValue>) -> Self {
        Self::new(values)
    }
}

/// Rows returned by one gateway call, together with the query text that was executed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    query: String,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl ResultSet {
    #[must_use]
    pub fn new(query: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> Self {
        debug_assert!(
            rows.iter().all(|row| row.values.len() == columns.len()),
            "every row must share the result column set"
        );
        Self {
            query: query.into(),
            columns,
            rows,
        }
    }

    #[must_use]
    pub fn empty(query: impl Into<String>, columns: Vec<String>) -> Self {
        Self::new(query, columns, Vec::new())
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<RowView<'_>> {
        self.rows.get(index).map(|row| RowView {
            columns: &self.columns,
            values: &row.values,
        })
    }

    #[must_use]
    pub fn first(&self) -> Option<RowView<'_>> {
        self.row(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = RowView<'_>> + '_ {
        self.rows.iter().map(|row| RowView {
            columns: &self.columns,
            values: &row.values,
        })
    }

    /// JSON objects keyed by column name, one per row.
    #[must_use]
    pub fn to_json_rows(&self) -> Vec<Value> {
        self.iter()
            .map(|row| {
                let mut record = serde_json::Map::new();
                for (column, value) in row.iter() {
                    record.insert(column.to_string(), value.to_json());
                }
                Value::Object(record)
            })
            .collect()
    }
}

/// A row read as an ordered column name to value mapping.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [String],
    values: &'a [ScalarValue],
}

impl<'a> RowView<'a> {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&'a ScalarValue> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
    }

    #[must_use]
    pub fn values(&self) -> &'a [ScalarValue] {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a ScalarValue)> + 'a {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    #[must_use]
    pub fn f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(ScalarValue::as_f64)
    }

    #[must_use]
    pub fn i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(ScalarValue::as_i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}
