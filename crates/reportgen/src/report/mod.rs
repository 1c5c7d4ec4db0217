//! Dynamic tabular report generation: request model, schema validation,
//! query construction, extraction and file encoding.

pub mod encode;
pub mod extract;
pub mod query;
pub mod request;
pub mod schema;
pub mod table;

pub use encode::{encode, EncodeError, EncodedReport, FileFormat};
pub use extract::{DataExtractor, ExtractError};
pub use query::{QueryBuilder, QueryError, ReportQuery};
pub use request::{DeliveryMethod, JoinSide, Relationship, ReportRequest, SubmitRequest, Tenant};
pub use schema::{
    SchemaCatalog, SchemaError, SchemaValidator, SeaOrmCatalog, ValidatedColumns, ValidatedReport,
    ValidatedRelationship,
};
pub use table::{Cell, Table};
