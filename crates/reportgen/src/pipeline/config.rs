use sea_orm::DbBackend;

use crate::config::Config;

pub struct PipelineConfig {
    /// Schema holding the report tables on PostgreSQL.
    pub db_schema: String,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            db_schema: config.database.schema.clone(),
        }
    }

    /// Schema qualifier to emit for `backend`. SQLite only knows `main`.
    pub fn schema_for(&self, backend: DbBackend) -> &str {
        match backend {
            DbBackend::Sqlite => "main",
            DbBackend::Postgres | DbBackend::MySql => &self.db_schema,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_schema: "public".to_string(),
        }
    }
}
