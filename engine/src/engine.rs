//! Pipeline facade
//!
//! `FilterEngine` ties the stages together for callers at the SDK boundary:
//! raw input → parse → validate → coerce → compile, with every failure
//! surfaced as an `ErrorReport`.

use serde_json::Value;

use crate::coerce::coerce_group;
use crate::compile::compile_group;
use crate::config::EngineConfig;
use crate::error::{ErrorReport, ErrorReporter, FilterError};
use crate::parser::Parser;
use crate::types::{CompiledFilter, FilterGroup, FilterSchema, TypedFilter};
use crate::validate::validate_group;

/// Holds configuration only; one instance serves any number of schemas.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    config: EngineConfig,
    parser: Parser,
    reporter: ErrorReporter,
}

impl FilterEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            parser: Parser::new(config.limits),
            reporter: ErrorReporter::from_config(&config.report),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse repeated `field:operator:value` expressions into an AND group
    pub fn parse_delimited<S: AsRef<str>>(&self, exprs: &[S]) -> Result<FilterGroup, ErrorReport> {
        self.parser
            .delimited_all(exprs)
            .map_err(|e| self.reporter.report_one(e))
    }

    pub fn parse_document(&self, document: &Value) -> Result<FilterGroup, ErrorReport> {
        self.parser
            .document(document)
            .map_err(|e| self.reporter.report_one(e))
    }

    pub fn parse_document_str(&self, json: &str) -> Result<FilterGroup, ErrorReport> {
        self.parser
            .document_str(json)
            .map_err(|e| self.reporter.report_one(e))
    }

    /// Structural validation only, in the configured mode
    pub fn validate(&self, schema: &FilterSchema, group: &FilterGroup) -> Result<(), ErrorReport> {
        validate_group(schema, group, self.config.validation_mode)
            .map_err(|errors| self.report(schema, errors))
    }

    /// Validate and coerce the whole tree
    pub fn prepare(
        &self,
        schema: &FilterSchema,
        group: &FilterGroup,
    ) -> Result<FilterGroup<TypedFilter>, ErrorReport> {
        let typed = coerce_group(schema, group, self.config.validation_mode)
            .map_err(|errors| self.report(schema, errors))?;
        tracing::debug!(
            resource = schema.resource(),
            leaves = typed.leaf_count(),
            "Prepared filters"
        );
        Ok(typed)
    }

    /// Validate, coerce and compile. Placeholders start at `next_param_index`.
    pub fn compile(
        &self,
        schema: &FilterSchema,
        group: &FilterGroup,
        next_param_index: usize,
    ) -> Result<CompiledFilter, ErrorReport> {
        let typed = self.prepare(schema, group)?;
        compile_group(&typed, next_param_index).map_err(|e| self.report(schema, vec![e]))
    }

    fn report(&self, schema: &FilterSchema, errors: Vec<FilterError>) -> ErrorReport {
        tracing::debug!(
            resource = schema.resource(),
            errors = errors.len(),
            "Filter validation failed"
        );
        self.reporter.report(errors)
    }
}
