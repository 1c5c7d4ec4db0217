//! Report request data model.

use std::fmt;
use std::str::FromStr;

use sea_orm::Value;
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;

/// An (organization, business unit) pair scoping all data access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
    pub organization_id: String,
    pub business_unit_id: String,
}

impl Tenant {
    pub fn new(organization_id: impl Into<String>, business_unit_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            business_unit_id: business_unit_id.into(),
        }
    }

    /// Query parameters in predicate order: organization, then business unit.
    /// Always text, including UUID-shaped ids; the query compares the
    /// tenant columns as text.
    pub fn bind_values(&self) -> [Value; 2] {
        [
            Value::from(self.organization_id.clone()),
            Value::from(self.business_unit_id.clone()),
        ]
    }
}

/// How the finished report reaches the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Email,
    Local,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Email => "email",
            DeliveryMethod::Local => "local",
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMethod {
    type Err = SubmitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(DeliveryMethod::Email),
            "local" => Ok(DeliveryMethod::Local),
            _ => Err(SubmitError::InvalidDeliveryMethod(s.to_string())),
        }
    }
}

/// Which side of a relationship carries the foreign key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinSide {
    /// `main.fk = related.id`
    Main,
    /// `main.id = related.fk`
    Referenced,
}

/// A one-hop join from the main table to a related table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub foreign_key: String,
    pub referenced_table: String,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Explicit join direction. Derived from the live catalog when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_side: Option<JoinSide>,
}

impl Relationship {
    pub fn new(foreign_key: &str, referenced_table: &str, columns: &[&str]) -> Self {
        Self {
            foreign_key: foreign_key.to_string(),
            referenced_table: referenced_table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            join_side: None,
        }
    }

    pub fn with_join_side(mut self, side: JoinSide) -> Self {
        self.join_side = Some(side);
        self
    }
}

/// Wire format of a submission, exactly as the client sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    pub organization_id: String,
    pub business_unit_id: String,
    pub file_format: String,
    pub delivery_method: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// A validated, immutable report request.
///
/// `file_format` is kept verbatim and only parsed by the encoder, so an
/// unsupported format fails the job rather than the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub table_name: String,
    pub columns: Vec<String>,
    pub relationships: Vec<Relationship>,
    pub tenant: Tenant,
    pub user_id: Option<String>,
    pub file_format: String,
    pub delivery_method: DeliveryMethod,
}

impl TryFrom<SubmitRequest> for ReportRequest {
    type Error = SubmitError;

    fn try_from(req: SubmitRequest) -> Result<Self, Self::Error> {
        let delivery_method: DeliveryMethod = req.delivery_method.parse()?;

        if req.table_name.trim().is_empty() {
            return Err(SubmitError::InvalidRequest(
                "tableName must not be empty".to_string(),
            ));
        }
        if req.organization_id.trim().is_empty() || req.business_unit_id.trim().is_empty() {
            return Err(SubmitError::InvalidRequest(
                "organizationId and businessUnitId are required".to_string(),
            ));
        }
        for rel in &req.relationships {
            if rel.foreign_key.trim().is_empty() || rel.referenced_table.trim().is_empty() {
                return Err(SubmitError::InvalidRequest(
                    "relationships need both foreignKey and referencedTable".to_string(),
                ));
            }
        }

        Ok(Self {
            table_name: req.table_name.trim().to_string(),
            columns: req.columns,
            relationships: req.relationships,
            tenant: Tenant::new(req.organization_id, req.business_unit_id),
            user_id: req.user_id,
            file_format: req.file_format,
            delivery_method,
        })
    }
}
