pub mod config;
pub mod context;
pub mod runner;

pub use config::PipelineConfig;
pub use context::{PipelineContext, ReportOutcome};
pub use runner::ReportPipeline;
