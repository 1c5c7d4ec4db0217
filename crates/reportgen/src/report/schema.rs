//! Schema validation against the live database catalog.
//!
//! Requested columns are checked against catalog metadata on every call;
//! nothing is cached. Missing columns are dropped with a warning and never
//! fail the request. Only catalog connectivity problems and a request with
//! nothing left to select are errors.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, Statement};
use thiserror::Error;
use tracing::{debug, warn};

use super::request::{JoinSide, Relationship, ReportRequest};

/// Tenant predicate columns every reportable table must carry.
pub const ORGANIZATION_COLUMN: &str = "organization_id";
pub const BUSINESS_UNIT_COLUMN: &str = "business_unit_id";

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Catalog lookup failed: {0}")]
    Catalog(#[from] DbErr),

    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    #[error("Table '{0}' has no organization_id/business_unit_id columns and cannot be tenant-scoped")]
    MissingTenantColumns(String),

    #[error("No valid columns requested for table '{0}'")]
    NoColumns(String),

    #[error("Catalog introspection is not supported on {0:?}")]
    UnsupportedBackend(DbBackend),
}

/// Read access to live table metadata.
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// Column names of `table`, or `None` when the table does not exist.
    async fn table_columns(&self, table: &str) -> Result<Option<Vec<String>>, SchemaError>;
}

/// Catalog backed by the tenant database itself.
pub struct SeaOrmCatalog {
    conn: DatabaseConnection,
    schema: String,
}

impl SeaOrmCatalog {
    pub fn new(conn: DatabaseConnection, schema: impl Into<String>) -> Self {
        Self {
            conn,
            schema: schema.into(),
        }
    }
}

/// Column listing for `table` in catalog order.
fn columns_statement(
    backend: DbBackend,
    schema: &str,
    table: &str,
) -> Result<Statement, SchemaError> {
    match backend {
        DbBackend::Postgres => Ok(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT CAST(column_name AS TEXT) AS column_name \
             FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 \
             ORDER BY ordinal_position",
            [schema.to_string().into(), table.to_string().into()],
        )),
        DbBackend::Sqlite => Ok(Statement::from_sql_and_values(
            DbBackend::Sqlite,
            "SELECT name AS column_name FROM pragma_table_info(?) ORDER BY cid",
            [table.to_string().into()],
        )),
        other => Err(SchemaError::UnsupportedBackend(other)),
    }
}

#[async_trait]
impl SchemaCatalog for SeaOrmCatalog {
    async fn table_columns(&self, table: &str) -> Result<Option<Vec<String>>, SchemaError> {
        let rows = self
            .conn
            .query_all(columns_statement(
                self.conn.get_database_backend(),
                &self.schema,
                table,
            )?)
            .await
            .map_err(|e| {
                tracing::error!(table = %table, error = %e, "Catalog introspection failed");
                SchemaError::Catalog(e)
            })?;

        let columns = rows
            .iter()
            .map(|row| row.try_get::<String>("", "column_name"))
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            Ok(None)
        } else {
            Ok(Some(columns))
        }
    }
}

/// Result of filtering a requested column list against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedColumns {
    pub table: String,
    pub columns: Vec<String>,
    pub dropped: Vec<String>,
}

/// A relationship whose table, foreign key and columns all exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRelationship {
    pub foreign_key: String,
    pub referenced_table: String,
    pub columns: Vec<String>,
    pub join_side: JoinSide,
    pub dropped: Vec<String>,
}

/// Everything the query builder needs, already checked against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedReport {
    pub main: ValidatedColumns,
    pub relationships: Vec<ValidatedRelationship>,
}

impl ValidatedReport {
    /// Every requested name that did not survive validation, qualified the
    /// way it would have appeared in the output.
    pub fn dropped_columns(&self) -> Vec<String> {
        let mut dropped = self.main.dropped.clone();
        for rel in &self.relationships {
            dropped.extend(
                rel.dropped
                    .iter()
                    .map(|c| format!("{}.{}.{}", rel.foreign_key, rel.referenced_table, c)),
            );
        }
        dropped
    }
}

pub struct SchemaValidator<'a> {
    catalog: &'a dyn SchemaCatalog,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(catalog: &'a dyn SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Keeps the requested columns that exist on `table`, in request order.
    pub async fn validate_columns(
        &self,
        table: &str,
        requested: &[String],
    ) -> Result<ValidatedColumns, SchemaError> {
        let existing = self.catalog.table_columns(table).await?.unwrap_or_default();
        Ok(filter_columns(table, requested, &existing))
    }

    /// Validates one relationship. `None` means it was dropped.
    pub async fn validate_relationship(
        &self,
        main_table: &str,
        main_columns: &[String],
        rel: &Relationship,
    ) -> Result<Option<ValidatedRelationship>, SchemaError> {
        let Some(related_columns) = self.catalog.table_columns(&rel.referenced_table).await?
        else {
            warn!(
                table = %rel.referenced_table,
                foreign_key = %rel.foreign_key,
                "Referenced table does not exist, dropping relationship"
            );
            return Ok(None);
        };

        let on_main = main_columns.iter().any(|c| c == &rel.foreign_key);
        let on_related = related_columns.iter().any(|c| c == &rel.foreign_key);

        let join_side = match rel.join_side {
            Some(JoinSide::Main) if on_main => JoinSide::Main,
            Some(JoinSide::Referenced) if on_related => JoinSide::Referenced,
            Some(side) => {
                warn!(
                    table = %main_table,
                    referenced_table = %rel.referenced_table,
                    foreign_key = %rel.foreign_key,
                    join_side = ?side,
                    "Foreign key not found on the stated join side, dropping relationship"
                );
                return Ok(None);
            }
            None if on_main => JoinSide::Main,
            None if on_related => {
                warn!(
                    table = %main_table,
                    referenced_table = %rel.referenced_table,
                    foreign_key = %rel.foreign_key,
                    "Foreign key not on main table, joining on the referenced side"
                );
                JoinSide::Referenced
            }
            None => {
                warn!(
                    table = %main_table,
                    referenced_table = %rel.referenced_table,
                    foreign_key = %rel.foreign_key,
                    "Foreign key exists on neither table, dropping relationship"
                );
                return Ok(None);
            }
        };

        // The non-FK side of the join is always matched on its `id`.
        let has_key = match join_side {
            JoinSide::Main => related_columns.iter().any(|c| c == "id"),
            JoinSide::Referenced => main_columns.iter().any(|c| c == "id"),
        };
        if !has_key {
            warn!(
                table = %main_table,
                referenced_table = %rel.referenced_table,
                "Join target has no 'id' column, dropping relationship"
            );
            return Ok(None);
        }

        let filtered = filter_columns(&rel.referenced_table, &rel.columns, &related_columns);
        if filtered.columns.is_empty() {
            warn!(
                referenced_table = %rel.referenced_table,
                "No valid columns left for relationship, dropping it"
            );
            return Ok(None);
        }

        Ok(Some(ValidatedRelationship {
            foreign_key: rel.foreign_key.clone(),
            referenced_table: rel.referenced_table.clone(),
            columns: filtered.columns,
            join_side,
            dropped: filtered.dropped,
        }))
    }

    /// Validates a full request: main table, tenant columns, relationships.
    pub async fn validate_request(
        &self,
        request: &ReportRequest,
    ) -> Result<ValidatedReport, SchemaError> {
        let table = &request.table_name;
        let existing = self
            .catalog
            .table_columns(table)
            .await?
            .ok_or_else(|| SchemaError::TableNotFound(table.clone()))?;

        let has_tenant_columns = existing.iter().any(|c| c == ORGANIZATION_COLUMN)
            && existing.iter().any(|c| c == BUSINESS_UNIT_COLUMN);
        if !has_tenant_columns {
            return Err(SchemaError::MissingTenantColumns(table.clone()));
        }

        let main = filter_columns(table, &request.columns, &existing);

        let mut relationships = Vec::with_capacity(request.relationships.len());
        for rel in &request.relationships {
            if let Some(valid) = self.validate_relationship(table, &existing, rel).await? {
                relationships.push(valid);
            }
        }

        if main.columns.is_empty() && relationships.is_empty() {
            return Err(SchemaError::NoColumns(table.clone()));
        }

        debug!(
            table = %table,
            columns = main.columns.len(),
            relationships = relationships.len(),
            "Report request validated"
        );

        Ok(ValidatedReport {
            main,
            relationships,
        })
    }
}

fn filter_columns(table: &str, requested: &[String], existing: &[String]) -> ValidatedColumns {
    let mut columns = Vec::with_capacity(requested.len());
    let mut dropped = Vec::new();

    for name in requested {
        if existing.iter().any(|c| c == name) {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        } else {
            dropped.push(name.clone());
        }
    }

    if !dropped.is_empty() {
        warn!(
            table = %table,
            missing = %dropped.join(", "),
            "Dropping columns missing from the live schema"
        );
    }

    ValidatedColumns {
        table: table.to_string(),
        columns,
        dropped,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::report::request::Tenant;
    use std::collections::HashMap;

    /// Fixed in-memory catalog.
    pub(crate) struct StaticCatalog {
        tables: HashMap<String, Vec<String>>,
    }

    impl StaticCatalog {
        pub(crate) fn new(tables: &[(&str, &[&str])]) -> Self {
            Self {
                tables: tables
                    .iter()
                    .map(|(t, cols)| (t.to_string(), cols.iter().map(|c| c.to_string()).collect()))
                    .collect(),
            }
        }

        pub(crate) fn freight() -> Self {
            Self::new(&[
                (
                    "orders",
                    &["id", "pro_number", "customer_id", "organization_id", "business_unit_id"],
                ),
                ("customers", &["id", "name", "organization_id", "business_unit_id"]),
                ("stops", &["id", "order_id", "city", "sequence"]),
                ("notes", &["id", "body"]),
            ])
        }
    }

    #[async_trait]
    impl SchemaCatalog for StaticCatalog {
        async fn table_columns(&self, table: &str) -> Result<Option<Vec<String>>, SchemaError> {
            Ok(self.tables.get(table).cloned())
        }
    }

    pub(crate) struct BrokenCatalog;

    #[async_trait]
    impl SchemaCatalog for BrokenCatalog {
        async fn table_columns(&self, _table: &str) -> Result<Option<Vec<String>>, SchemaError> {
            Err(SchemaError::Catalog(DbErr::Conn(sea_orm::RuntimeErr::Internal(
                "connection refused".to_string(),
            ))))
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_columns_statement_per_backend() {
        let pg = columns_statement(DbBackend::Postgres, "public", "orders").unwrap();
        assert!(pg.sql.contains("information_schema.columns"));
        let sqlite = columns_statement(DbBackend::Sqlite, "main", "orders").unwrap();
        assert!(sqlite.sql.contains("pragma_table_info"));
        assert!(matches!(
            columns_statement(DbBackend::MySql, "reports", "orders"),
            Err(SchemaError::UnsupportedBackend(DbBackend::MySql))
        ));
    }

    fn request(columns: &[&str], relationships: Vec<Relationship>) -> ReportRequest {
        ReportRequest {
            table_name: "orders".to_string(),
            columns: strings(columns),
            relationships,
            tenant: Tenant::new("org-a", "bu-b"),
            user_id: None,
            file_format: "csv".to_string(),
            delivery_method: crate::report::request::DeliveryMethod::Local,
        }
    }

    #[tokio::test]
    async fn test_missing_columns_are_dropped() {
        let catalog = StaticCatalog::freight();
        let validator = SchemaValidator::new(&catalog);
        let result = validator
            .validate_columns("orders", &strings(&["id", "nonexistent_col", "pro_number"]))
            .await
            .unwrap();
        assert_eq!(result.columns, strings(&["id", "pro_number"]));
        assert_eq!(result.dropped, strings(&["nonexistent_col"]));
    }

    #[tokio::test]
    async fn test_unknown_table_yields_no_columns() {
        let catalog = StaticCatalog::freight();
        let validator = SchemaValidator::new(&catalog);
        let result = validator
            .validate_columns("trailers", &strings(&["id"]))
            .await
            .unwrap();
        assert!(result.columns.is_empty());
        assert_eq!(result.dropped, strings(&["id"]));
    }

    #[tokio::test]
    async fn test_fk_on_main_table() {
        let catalog = StaticCatalog::freight();
        let validator = SchemaValidator::new(&catalog);
        let rel = Relationship::new("customer_id", "customers", &["name", "bogus"]);
        let main = catalog.tables["orders"].clone();
        let valid = validator
            .validate_relationship("orders", &main, &rel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(valid.join_side, JoinSide::Main);
        assert_eq!(valid.columns, strings(&["name"]));
        assert_eq!(valid.dropped, strings(&["bogus"]));
    }

    #[tokio::test]
    async fn test_fk_on_referenced_table() {
        let catalog = StaticCatalog::freight();
        let validator = SchemaValidator::new(&catalog);
        let rel = Relationship::new("order_id", "stops", &["city"]);
        let main = catalog.tables["orders"].clone();
        let valid = validator
            .validate_relationship("orders", &main, &rel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(valid.join_side, JoinSide::Referenced);
    }

    #[tokio::test]
    async fn test_fk_missing_everywhere_drops_relationship() {
        let catalog = StaticCatalog::freight();
        let validator = SchemaValidator::new(&catalog);
        let rel = Relationship::new("note_id", "notes", &["body"]);
        let main = catalog.tables["orders"].clone();
        let valid = validator
            .validate_relationship("orders", &main, &rel)
            .await
            .unwrap();
        assert!(valid.is_none());
    }

    #[tokio::test]
    async fn test_explicit_join_side_must_match_catalog() {
        let catalog = StaticCatalog::freight();
        let validator = SchemaValidator::new(&catalog);
        let main = catalog.tables["orders"].clone();

        let wrong = Relationship::new("customer_id", "customers", &["name"])
            .with_join_side(JoinSide::Referenced);
        assert!(validator
            .validate_relationship("orders", &main, &wrong)
            .await
            .unwrap()
            .is_none());

        let right = Relationship::new("order_id", "stops", &["city"])
            .with_join_side(JoinSide::Referenced);
        let valid = validator
            .validate_relationship("orders", &main, &right)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(valid.join_side, JoinSide::Referenced);
    }

    #[tokio::test]
    async fn test_missing_referenced_table_drops_relationship() {
        let catalog = StaticCatalog::freight();
        let validator = SchemaValidator::new(&catalog);
        let main = catalog.tables["orders"].clone();
        let rel = Relationship::new("trailer_id", "trailers", &["vin"]);
        assert!(validator
            .validate_relationship("orders", &main, &rel)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_validate_request_reports_dropped_columns() {
        let catalog = StaticCatalog::freight();
        let validator = SchemaValidator::new(&catalog);
        let req = request(
            &["id", "nonexistent_col"],
            vec![Relationship::new("customer_id", "customers", &["name", "zip"])],
        );
        let report = validator.validate_request(&req).await.unwrap();
        assert_eq!(report.main.columns, strings(&["id"]));
        assert_eq!(
            report.dropped_columns(),
            strings(&["nonexistent_col", "customer_id.customers.zip"])
        );
    }

    #[tokio::test]
    async fn test_validate_request_errors() {
        let catalog = StaticCatalog::freight();
        let validator = SchemaValidator::new(&catalog);

        let mut missing_table = request(&["id"], vec![]);
        missing_table.table_name = "trailers".to_string();
        assert!(matches!(
            validator.validate_request(&missing_table).await,
            Err(SchemaError::TableNotFound(t)) if t == "trailers"
        ));

        let mut untenanted = request(&["id"], vec![]);
        untenanted.table_name = "notes".to_string();
        assert!(matches!(
            validator.validate_request(&untenanted).await,
            Err(SchemaError::MissingTenantColumns(_))
        ));

        let nothing = request(&["bogus"], vec![]);
        assert!(matches!(
            validator.validate_request(&nothing).await,
            Err(SchemaError::NoColumns(_))
        ));
    }

    #[tokio::test]
    async fn test_catalog_failure_is_an_error() {
        let catalog = BrokenCatalog;
        let validator = SchemaValidator::new(&catalog);
        let result = validator.validate_request(&request(&["id"], vec![])).await;
        assert!(matches!(result, Err(SchemaError::Catalog(_))));
    }
}
