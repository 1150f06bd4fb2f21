//! Filter-expression engine
//!
//! Turns untrusted filter criteria into validated, strongly-typed predicates
//! and parameterized PostgreSQL fragments.
//!
//! ## Usage
//!
//! ```
//! use filter_engine::{FieldDefinition, FieldType, FilterEngine, FilterSchema, Operator};
//!
//! let schema = FilterSchema::builder("users")
//!     .field(
//!         "status",
//!         FieldDefinition::new("status", FieldType::String).with_operators([Operator::Eq, Operator::In]),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let engine = FilterEngine::default();
//! let filters = engine.parse_delimited(&["status:eq:active"]).unwrap();
//! let compiled = engine.compile(&schema, &filters, 1).unwrap();
//! assert_eq!(compiled.sql, "status = $1");
//! ```

pub mod coerce;
pub mod compile;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod parser;
pub mod sql;
pub mod telemetry;
pub mod types;
pub mod validate;

pub use config::{EngineConfig, LimitsConfig, ReportConfig, ValidationMode};
pub use engine::FilterEngine;
pub use error::{ErrorReport, ErrorReporter, FilterError, FilterErrorKind, SchemaError};
pub use types::{
    CompiledFilter, FieldDefinition, FieldType, FilterGroup, FilterNode, FilterOption,
    FilterSchema, FilterSchemaBuilder, GroupOperator, Operator, RawValue, TypedFilter, TypedValue,
};
