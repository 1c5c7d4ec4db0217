use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::{debug, info_span, Instrument};

use crate::error::ReportError;
use crate::report::encode::{encode, EncodedReport};
use crate::report::extract::DataExtractor;
use crate::report::query::{QueryBuilder, ReportQuery};
use crate::report::schema::{SchemaCatalog, SchemaValidator, SeaOrmCatalog, ValidatedReport};
use crate::report::table::Table;
use crate::storage::{ReportStore, StoredReport};

use super::config::PipelineConfig;
use super::context::{PipelineContext, ReportOutcome};

pub struct ReportPipeline {
    config: Arc<PipelineConfig>,
    db: DatabaseConnection,
    catalog: Arc<dyn SchemaCatalog>,
    store: Arc<ReportStore>,
}

impl ReportPipeline {
    /// Production constructor; the catalog reads the same database.
    pub fn new(config: Arc<PipelineConfig>, db: DatabaseConnection, store: Arc<ReportStore>) -> Self {
        let catalog = Arc::new(SeaOrmCatalog::new(
            db.clone(),
            config.schema_for(db.get_database_backend()),
        ));
        Self::with_catalog(config, db, catalog, store)
    }

    pub fn with_catalog(
        config: Arc<PipelineConfig>,
        db: DatabaseConnection,
        catalog: Arc<dyn SchemaCatalog>,
        store: Arc<ReportStore>,
    ) -> Self {
        Self {
            config,
            db,
            catalog,
            store,
        }
    }

    /// Runs validate → build_query → extract → encode → upload for one
    /// request. Any step error ends the run.
    pub async fn run(&self, ctx: &mut PipelineContext) -> Result<ReportOutcome, ReportError> {
        let validated = self
            .step_validate(ctx)
            .instrument(info_span!("validate"))
            .await?;

        let query = {
            let _step = info_span!("build_query").entered();
            self.step_build_query(ctx, &validated)?
        };

        let table = self
            .step_extract(ctx, &query)
            .instrument(info_span!("extract"))
            .await?;

        let encoded = {
            let _step = info_span!("encode", format = %ctx.request.file_format).entered();
            self.step_encode(ctx, &table)?
        };

        let stored = self
            .step_upload(ctx, encoded)
            .instrument(info_span!("upload", bucket = %self.store.bucket()))
            .await?;

        Ok(ReportOutcome {
            file_url: stored.url,
            object_key: stored.key,
            bucket: stored.bucket,
            file_name: ctx.file_name.clone().unwrap_or_default(),
            row_count: ctx.row_count.unwrap_or_default(),
            delivery_method: ctx.request.delivery_method,
            dropped_columns: ctx.dropped_columns.clone(),
        })
    }

    async fn step_validate(&self, ctx: &mut PipelineContext) -> Result<ValidatedReport, ReportError> {
        let validator = SchemaValidator::new(self.catalog.as_ref());
        let validated = validator.validate_request(&ctx.request).await?;
        ctx.dropped_columns = validated.dropped_columns();
        Ok(validated)
    }

    fn step_build_query(
        &self,
        ctx: &PipelineContext,
        validated: &ValidatedReport,
    ) -> Result<ReportQuery, ReportError> {
        let backend = self.db.get_database_backend();
        let builder = QueryBuilder::new(backend, self.config.schema_for(backend));
        let query = builder.build(validated, &ctx.request.tenant)?;
        debug!(sql = %query.sql, "Report query built");
        Ok(query)
    }

    async fn step_extract(
        &self,
        ctx: &mut PipelineContext,
        query: &ReportQuery,
    ) -> Result<Table, ReportError> {
        let table = DataExtractor::extract(&self.db, query).await?;
        ctx.row_count = Some(table.row_count());
        Ok(table)
    }

    fn step_encode(
        &self,
        ctx: &mut PipelineContext,
        table: &Table,
    ) -> Result<EncodedReport, ReportError> {
        let encoded = encode(table, &ctx.request.table_name, &ctx.request.file_format)?;
        debug!(
            file_name = %encoded.file_name,
            size = encoded.bytes.len(),
            "Report encoded"
        );
        ctx.file_name = Some(encoded.file_name.clone());
        Ok(encoded)
    }

    async fn step_upload(
        &self,
        ctx: &mut PipelineContext,
        encoded: EncodedReport,
    ) -> Result<StoredReport, ReportError> {
        let stored = self.store.upload(&encoded.file_name, encoded.bytes).await?;
        ctx.stored = Some(stored.clone());
        Ok(stored)
    }
}
