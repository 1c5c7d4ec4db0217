//! In-memory tabular result set.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sea_orm::prelude::Decimal;

/// A single decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    /// Zone-stripped timestamp; zone-aware values are normalised to UTC first.
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view used by spreadsheet encoding.
    pub fn as_number(&self) -> Option<String> {
        match self {
            Cell::Int(v) => Some(v.to_string()),
            Cell::Float(v) if v.is_finite() => Some(v.to_string()),
            Cell::Decimal(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(v) => write!(f, "{}", v),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Decimal(v) => write!(f, "{}", v),
            Cell::Text(v) => f.write_str(v),
            Cell::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Cell::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Cell::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
            Cell::Uuid(v) => write!(f, "{}", v),
            Cell::Json(v) => write!(f, "{}", v),
            Cell::Bytes(v) => {
                f.write_str("\\x")?;
                for b in v {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

/// Ordered columns plus rows of equal width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}
