//! Raw submission values with inferred primitive types

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single value read from a submission table.
///
/// Fields are typed the way a dataframe reader types CSV input: anything that
/// parses as an integer or float is numeric, an empty field is missing, and
/// everything else is text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Missing,
}

impl Cell {
    /// Infer the cell type from a raw field.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return Cell::Integer(value);
        }
        // `f64::from_str` accepts "inf" and "nan"; only treat digit-bearing
        // fields as numeric so words like "info" stay text.
        if trimmed.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(value) = trimmed.parse::<f64>() {
                return Cell::Float(value);
            }
        }
        Cell::Text(trimmed.to_string())
    }

    /// Text cell without inference
    pub fn text<S: Into<String>>(value: S) -> Self {
        Cell::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Cell::Text(_))
    }

    /// Article-qualified type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Cell::Text(_) => "a string",
            Cell::Integer(_) => "an integer",
            Cell::Float(_) => "a float",
            Cell::Missing => "missing",
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(value) => f.write_str(value),
            Cell::Integer(value) => write!(f, "{value}"),
            Cell::Float(value) => write!(f, "{value}"),
            Cell::Missing => f.write_str("nan"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}
