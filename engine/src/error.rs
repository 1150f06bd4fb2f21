//! Error types
//!
//! Per-leaf filter failures, schema definition failures, and the
//! problem-details report handed back across the library boundary.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ReportConfig;

/// Error taxonomy for filter validation and coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterErrorKind {
    /// Field is not declared by the resource's schema
    UnknownField,
    /// Operator is unrecognized or not allowed on the field
    InvalidOperator,
    /// Value cannot be converted to the field's declared type
    InvalidType,
    /// Value is not a hyphenated UUID
    InvalidUuid,
    /// Value is not an ISO 8601 date or date-time
    InvalidDate,
    /// Value is not one of the field's enum values
    InvalidEnum,
    /// `in`/`nin` without a list of values
    InvalidIn,
    /// Malformed input or an exceeded parser limit
    InvalidFormat,
}

impl FilterErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownField => "UNKNOWN_FIELD",
            Self::InvalidOperator => "INVALID_OPERATOR",
            Self::InvalidType => "INVALID_TYPE",
            Self::InvalidUuid => "INVALID_UUID",
            Self::InvalidDate => "INVALID_DATE",
            Self::InvalidEnum => "INVALID_ENUM",
            Self::InvalidIn => "INVALID_IN",
            Self::InvalidFormat => "INVALID_FORMAT",
        }
    }
}

impl fmt::Display for FilterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structured validation failure
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct FilterError {
    pub kind: FilterErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl FilterError {
    pub fn new(kind: FilterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            message: message.into(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn unknown_field(field: &str, resource: &str) -> Self {
        Self::new(
            FilterErrorKind::UnknownField,
            format!("Unknown field '{}' for resource '{}'", field, resource),
        )
        .with_field(field)
    }

    pub fn invalid_operator(field: &str, operator: &str) -> Self {
        Self::new(
            FilterErrorKind::InvalidOperator,
            format!("Operator '{}' is not allowed on field '{}'", operator, field),
        )
        .with_field(field)
    }

    pub fn invalid_type(field: &str, expected: &str, value: impl fmt::Display) -> Self {
        Self::new(
            FilterErrorKind::InvalidType,
            format!(
                "Invalid value '{}' for field '{}': expected {}",
                value, field, expected
            ),
        )
        .with_field(field)
    }

    pub fn invalid_uuid(field: &str, value: impl fmt::Display) -> Self {
        Self::new(
            FilterErrorKind::InvalidUuid,
            format!("Invalid UUID '{}' for field '{}'", value, field),
        )
        .with_field(field)
    }

    pub fn invalid_date(field: &str, value: impl fmt::Display) -> Self {
        Self::new(
            FilterErrorKind::InvalidDate,
            format!(
                "Invalid timestamp '{}' for field '{}'. Use ISO 8601 format.",
                value, field
            ),
        )
        .with_field(field)
    }

    pub fn invalid_enum(field: &str, value: impl fmt::Display, allowed: &[String]) -> Self {
        Self::new(
            FilterErrorKind::InvalidEnum,
            format!(
                "Invalid value '{}' for field '{}': expected one of [{}]",
                value,
                field,
                allowed.join(", ")
            ),
        )
        .with_field(field)
    }

    pub fn invalid_in(field: &str, operator: &str) -> Self {
        Self::new(
            FilterErrorKind::InvalidIn,
            format!(
                "Operator '{}' on field '{}' requires a list of values",
                operator, field
            ),
        )
        .with_field(field)
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(FilterErrorKind::InvalidFormat, message)
    }
}

/// Invalid schema definition, reported when a schema is built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Enum field with no allowed values
    #[error("Field '{field}' of type enum must declare at least one enum value")]
    EmptyEnum { field: String },

    /// Enum values on a field that is not an enum
    #[error("Field '{field}' declares enum values but is not of type enum")]
    UnexpectedEnumValues { field: String },

    /// Operator outside the field type's operator matrix
    #[error("Operator '{operator}' is not permitted for field '{field}' of type {field_type}")]
    OperatorNotPermitted {
        field: String,
        operator: String,
        field_type: String,
    },

    /// Field that allows no operator at all
    #[error("Field '{field}' declares an empty operator set")]
    NoOperators { field: String },

    /// Operator name in a schema document that is not in the vocabulary
    #[error("Unknown operator '{operator}' on field '{field}'")]
    UnknownOperator { field: String, operator: String },

    /// Column that is not a plain or table-qualified SQL identifier
    #[error("Column '{column}' of field '{field}' is not a valid SQL identifier")]
    InvalidColumn { field: String, column: String },

    /// Same public field name registered twice
    #[error("Field '{0}' is defined more than once")]
    DuplicateField(String),

    /// Schema document is not valid JSON or has the wrong shape
    #[error("Invalid schema document: {0}")]
    Document(String),
}

/// Problem-details document describing why a filter was rejected
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{title}: {}", .errors.join("; "))]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub status_code: u16,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub correlation_id: String,
    #[serde(skip)]
    details: Vec<FilterError>,
}

impl ErrorReport {
    /// Attach the request path or resource the report refers to
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Structured failures behind `errors`, in the same order
    pub fn details(&self) -> &[FilterError] {
        &self.details
    }

    pub fn kinds(&self) -> Vec<FilterErrorKind> {
        self.details.iter().map(|e| e.kind).collect()
    }
}

/// Assembles `ErrorReport` documents from filter errors
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    type_uri: String,
    title: String,
    status_code: u16,
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::from_config(&ReportConfig::default())
    }
}

impl ErrorReporter {
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            type_uri: config.type_uri.clone(),
            title: config.title.clone(),
            status_code: config.status_code,
        }
    }

    pub fn report(&self, errors: Vec<FilterError>) -> ErrorReport {
        let correlation_id = Uuid::new_v4().to_string();
        tracing::warn!(
            correlation_id = %correlation_id,
            count = errors.len(),
            first = errors.first().map(|e| e.kind.as_str()).unwrap_or("NONE"),
            "Rejected filter"
        );
        ErrorReport {
            type_uri: self.type_uri.clone(),
            title: self.title.clone(),
            status_code: self.status_code,
            errors: errors.iter().map(|e| e.message.clone()).collect(),
            instance: None,
            correlation_id,
            details: errors,
        }
    }

    pub fn report_one(&self, error: FilterError) -> ErrorReport {
        self.report(vec![error])
    }
}
