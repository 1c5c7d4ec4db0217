//! Builders for report submissions.

#![allow(dead_code)]

use reportgen::report::{JoinSide, Relationship};
use reportgen::SubmitRequest;

/// Builder for `SubmitRequest`, defaulting to a CSV of `orders` for
/// tenant `org-a/bu-b` delivered by email.
pub struct SubmitRequestBuilder {
    request: SubmitRequest,
}

impl SubmitRequestBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            request: SubmitRequest {
                table_name: table.to_string(),
                columns: vec![],
                relationships: vec![],
                organization_id: "org-a".to_string(),
                business_unit_id: "bu-b".to_string(),
                file_format: "csv".to_string(),
                delivery_method: "email".to_string(),
                user_id: Some("user-1".to_string()),
            },
        }
    }

    pub fn orders() -> Self {
        Self::new("orders")
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.request.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn join(mut self, foreign_key: &str, table: &str, columns: &[&str]) -> Self {
        self.request
            .relationships
            .push(Relationship::new(foreign_key, table, columns));
        self
    }

    pub fn join_referenced(mut self, foreign_key: &str, table: &str, columns: &[&str]) -> Self {
        self.request.relationships.push(
            Relationship::new(foreign_key, table, columns).with_join_side(JoinSide::Referenced),
        );
        self
    }

    pub fn tenant(mut self, organization_id: &str, business_unit_id: &str) -> Self {
        self.request.organization_id = organization_id.to_string();
        self.request.business_unit_id = business_unit_id.to_string();
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.request.file_format = format.to_string();
        self
    }

    pub fn delivery(mut self, method: &str) -> Self {
        self.request.delivery_method = method.to_string();
        self
    }

    pub fn build(self) -> SubmitRequest {
        self.request
    }
}
