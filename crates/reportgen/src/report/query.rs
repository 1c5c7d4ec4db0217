//! Tenant-scoped SQL construction for report extraction.

use sea_orm::{DbBackend, Statement, Value};
use thiserror::Error;

use super::request::{JoinSide, Tenant};
use super::schema::{ValidatedReport, BUSINESS_UNIT_COLUMN, ORGANIZATION_COLUMN};

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Nothing to select from '{0}'")]
    EmptySelect(String),

    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Unsupported database backend {0:?}")]
    UnsupportedBackend(DbBackend),
}

/// A ready-to-execute statement plus the output column labels, in order.
#[derive(Debug, Clone)]
pub struct ReportQuery {
    pub sql: String,
    pub values: Vec<Value>,
    pub labels: Vec<String>,
    pub backend: DbBackend,
    pub table: String,
}

impl ReportQuery {
    pub fn statement(&self) -> Statement {
        Statement::from_sql_and_values(self.backend, &self.sql, self.values.clone())
    }
}

pub struct QueryBuilder {
    backend: DbBackend,
    schema: String,
}

impl QueryBuilder {
    pub fn new(backend: DbBackend, schema: impl Into<String>) -> Self {
        Self {
            backend,
            schema: schema.into(),
        }
    }

    /// Builds one `SELECT … LEFT JOIN … WHERE <tenant>` statement.
    ///
    /// Identifiers come from the schema validator and are additionally
    /// quoted; tenant values are always bound parameters.
    pub fn build(
        &self,
        report: &ValidatedReport,
        tenant: &Tenant,
    ) -> Result<ReportQuery, QueryError> {
        if !matches!(self.backend, DbBackend::Postgres | DbBackend::Sqlite) {
            return Err(QueryError::UnsupportedBackend(self.backend));
        }
        let table = &report.main.table;
        let main = quote_ident(table)?;

        let mut select = Vec::new();
        let mut labels = Vec::new();

        for column in &report.main.columns {
            select.push(format!("{}.{}", main, quote_ident(column)?));
            labels.push(column.clone());
        }

        let mut joins = Vec::with_capacity(report.relationships.len());
        for (n, rel) in report.relationships.iter().enumerate() {
            let alias = quote_ident(&format!("{}_alias_{}", rel.referenced_table, n))?;
            let fk = quote_ident(&rel.foreign_key)?;

            for column in &rel.columns {
                let label = format!("{}.{}.{}", rel.foreign_key, rel.referenced_table, column);
                select.push(format!(
                    "{}.{} AS {}",
                    alias,
                    quote_ident(column)?,
                    quote_ident(&label)?
                ));
                labels.push(label);
            }

            let on = match rel.join_side {
                JoinSide::Main => format!("{}.{} = {}.\"id\"", main, fk, alias),
                JoinSide::Referenced => format!("{}.\"id\" = {}.{}", main, alias, fk),
            };
            joins.push(format!(
                "LEFT JOIN {}.{} AS {} ON {}",
                quote_ident(&self.schema)?,
                quote_ident(&rel.referenced_table)?,
                alias,
                on
            ));
        }

        if select.is_empty() {
            return Err(QueryError::EmptySelect(table.clone()));
        }

        let mut sql = format!(
            "SELECT {} FROM {}.{} AS {}",
            select.join(", "),
            quote_ident(&self.schema)?,
            main,
            main
        );
        for join in &joins {
            sql.push(' ');
            sql.push_str(join);
        }
        sql.push_str(&format!(
            " WHERE {} AND {}",
            self.tenant_predicate(&main, ORGANIZATION_COLUMN, 1)?,
            self.tenant_predicate(&main, BUSINESS_UNIT_COLUMN, 2)?,
        ));

        Ok(ReportQuery {
            sql,
            values: tenant.bind_values().to_vec(),
            labels,
            backend: self.backend,
            table: table.clone(),
        })
    }

    /// `<table>.<column> = <param>`. Tenant ids are bound as text, so on
    /// PostgreSQL the column is cast to text to match both `uuid` and
    /// character tenant columns.
    fn tenant_predicate(&self, table: &str, column: &str, n: usize) -> Result<String, QueryError> {
        let column = format!("{}.{}", table, quote_ident(column)?);
        Ok(match self.backend {
            DbBackend::Postgres => format!("CAST({} AS TEXT) = ${}", column, n),
            _ => format!("{} = ?", column),
        })
    }
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> Result<String, QueryError> {
    if name.is_empty() || name.contains('\0') {
        return Err(QueryError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}
