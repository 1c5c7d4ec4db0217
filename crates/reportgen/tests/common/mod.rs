//! Shared utilities for reportgen integration tests.
//!
//! - `TestHarness`: seeded in-memory database, in-memory object store,
//!   recording notifier and a `ReportService` wired over them
//! - `SubmitRequestBuilder` for request payloads

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
