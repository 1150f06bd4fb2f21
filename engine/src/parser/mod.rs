//! Filter parsing
//!
//! Turns the two accepted input forms into the canonical `FilterOption` /
//! `FilterGroup` tree. Parsing knows nothing about schemas: unknown fields
//! and operators pass through untouched and are rejected by validation.
//!
//! ## Delimited
//!
//! `field:operator:value`, with `in`/`nin` values split on commas:
//!
//! ```
//! use filter_engine::parser::parse_delimited;
//!
//! let leaf = parse_delimited("createdAt:gte:2024-01-01T12:00:00").unwrap();
//! assert_eq!(leaf.field, "createdAt");
//! assert_eq!(leaf.operator, "gte");
//! ```
//!
//! ## Document
//!
//! Flat (`{"age": {"gte": 18}, "status": "active"}`) or an explicit tree
//! (`{"operator": "or", "filters": [{"field": "a", "op": "eq", "value": 1}], "groups": [...]}`).

mod delimited;
mod document;

use crate::config::LimitsConfig;
use crate::error::FilterError;
use crate::types::{FilterGroup, FilterOption};

/// Parser bound to a set of input limits
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser {
    limits: LimitsConfig,
}

impl Parser {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Parse one `field:operator:value` expression
    pub fn delimited(&self, expr: &str) -> Result<FilterOption, FilterError> {
        delimited::parse_expression(expr, &self.limits)
    }

    /// Parse several expressions (e.g. repeated query parameters) into one
    /// implicit AND group
    pub fn delimited_all<S: AsRef<str>>(&self, exprs: &[S]) -> Result<FilterGroup, FilterError> {
        delimited::parse_all(exprs, &self.limits)
    }

    pub fn document(&self, document: &serde_json::Value) -> Result<FilterGroup, FilterError> {
        document::parse_document(document, &self.limits)
    }

    pub fn document_str(&self, json: &str) -> Result<FilterGroup, FilterError> {
        if json.len() > self.limits.max_input_bytes {
            return Err(FilterError::invalid_format(format!(
                "Filter document exceeds maximum size of {} bytes",
                self.limits.max_input_bytes
            )));
        }
        let document: serde_json::Value = serde_json::from_str(json).map_err(|e| {
            FilterError::invalid_format(format!("Invalid filter document: {}", e))
        })?;
        self.document(&document)
    }
}

/// Parse one delimited expression with default limits
pub fn parse_delimited(expr: &str) -> Result<FilterOption, FilterError> {
    Parser::default().delimited(expr)
}

/// Parse several delimited expressions into an AND group with default limits
pub fn parse_delimited_all<S: AsRef<str>>(exprs: &[S]) -> Result<FilterGroup, FilterError> {
    Parser::default().delimited_all(exprs)
}

/// Parse a structured filter document with default limits
pub fn parse_document(document: &serde_json::Value) -> Result<FilterGroup, FilterError> {
    Parser::default().document(document)
}

/// Parse JSON text holding a structured filter document with default limits
pub fn parse_document_str(json: &str) -> Result<FilterGroup, FilterError> {
    Parser::default().document_str(json)
}
