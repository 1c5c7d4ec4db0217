//! Executes report queries and materialises the rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_orm::prelude::Decimal;
use sea_orm::{ConnectionTrait, QueryResult, TryGetable};
use thiserror::Error;
use tracing::{debug, error};

use super::query::ReportQuery;
use super::table::{Cell, Table};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Report query on '{table}' failed: {message}")]
    Query { table: String, message: String },

    #[error("Column '{column}' holds a value of an unsupported type")]
    Decode { column: String },
}

pub struct DataExtractor;

impl DataExtractor {
    /// Runs the query and returns every row. An empty result is a valid,
    /// empty table; execution problems are errors.
    pub async fn extract<C>(conn: &C, query: &ReportQuery) -> Result<Table, ExtractError>
    where
        C: ConnectionTrait,
    {
        let rows = conn.query_all(query.statement()).await.map_err(|e| {
            error!(
                table = %query.table,
                sql = %query.sql,
                error = %e,
                "Report query failed"
            );
            ExtractError::Query {
                table: query.table.clone(),
                message: e.to_string(),
            }
        })?;

        let mut table = Table::new(query.labels.clone());
        for row in &rows {
            let mut cells = Vec::with_capacity(query.labels.len());
            for (idx, label) in query.labels.iter().enumerate() {
                let cell = decode_cell(row, idx).ok_or_else(|| ExtractError::Decode {
                    column: label.clone(),
                })?;
                cells.push(cell);
            }
            table.push_row(cells);
        }

        debug!(table = %query.table, rows = table.row_count(), "Report rows extracted");
        Ok(table)
    }
}

fn try_cell<T, F>(row: &QueryResult, idx: usize, wrap: F) -> Option<Cell>
where
    T: TryGetable,
    F: FnOnce(T) -> Cell,
{
    match row.try_get_by_index::<Option<T>>(idx) {
        Ok(Some(v)) => Some(wrap(v)),
        Ok(None) => Some(Cell::Null),
        Err(_) => None,
    }
}

/// Decodes column `idx` by trying the supported types in turn. Drivers
/// reject mismatched types, so the first successful decode wins.
fn decode_cell(row: &QueryResult, idx: usize) -> Option<Cell> {
    try_cell::<i64, _>(row, idx, Cell::Int)
        .or_else(|| try_cell::<i32, _>(row, idx, |v| Cell::Int(v.into())))
        .or_else(|| try_cell::<i16, _>(row, idx, |v| Cell::Int(v.into())))
        .or_else(|| try_cell::<f64, _>(row, idx, Cell::Float))
        .or_else(|| try_cell::<f32, _>(row, idx, |v| Cell::Float(v.into())))
        .or_else(|| try_cell::<Decimal, _>(row, idx, Cell::Decimal))
        .or_else(|| try_cell::<bool, _>(row, idx, Cell::Bool))
        .or_else(|| try_cell::<String, _>(row, idx, Cell::Text))
        .or_else(|| try_cell::<DateTime<Utc>, _>(row, idx, |v| Cell::Timestamp(strip_zone(v))))
        .or_else(|| try_cell::<NaiveDateTime, _>(row, idx, Cell::Timestamp))
        .or_else(|| try_cell::<NaiveDate, _>(row, idx, Cell::Date))
        .or_else(|| try_cell::<NaiveTime, _>(row, idx, Cell::Time))
        .or_else(|| try_cell::<uuid::Uuid, _>(row, idx, Cell::Uuid))
        .or_else(|| try_cell::<serde_json::Value, _>(row, idx, Cell::Json))
        .or_else(|| try_cell::<Vec<u8>, _>(row, idx, Cell::Bytes))
}

/// Zone-aware timestamps become naive UTC wall-clock values.
pub fn strip_zone(ts: DateTime<Utc>) -> NaiveDateTime {
    ts.naive_utc()
}
