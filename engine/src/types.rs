//! Canonical filter model
//!
//! Value types read and written by every stage of the pipeline: schema
//! definitions, parsed (untyped) filters, coerced (typed) filters and
//! compiled SQL fragments.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchemaError;

// =============================================================================
// Operators
// =============================================================================

/// Filter operator vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Contains,
    Like,
    Ilike,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub const ALL: [Operator; 13] = [
        Self::Eq,
        Self::Neq,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::In,
        Self::Nin,
        Self::Contains,
        Self::Like,
        Self::Ilike,
        Self::IsNull,
        Self::IsNotNull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Nin => "nin",
            Self::Contains => "contains",
            Self::Like => "like",
            Self::Ilike => "ilike",
            Self::IsNull => "isNull",
            Self::IsNotNull => "isNotNull",
        }
    }

    /// Case-insensitive lookup (`isnull` and `isNull` are the same operator)
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
    }

    /// `in`/`nin` carry a list of values
    pub fn takes_list(&self) -> bool {
        matches!(self, Self::In | Self::Nin)
    }

    /// Everything except `isNull`/`isNotNull` needs a value
    pub fn takes_value(&self) -> bool {
        !self.is_null_check()
    }

    pub fn is_null_check(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Field Types
// =============================================================================

/// Declared type of a filterable field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Uuid,
    Timestamp,
    Enum,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Uuid => "uuid",
            Self::Timestamp => "timestamp",
            Self::Enum => "enum",
        }
    }

    /// Operators a field of this type gets when it declares none
    pub fn default_operators(&self) -> &'static [Operator] {
        use Operator::*;
        match self {
            Self::String => &[Eq, Neq, In, Nin, Contains, Like, Ilike],
            Self::Number => &[Eq, Neq, Gt, Gte, Lt, Lte, In, Nin],
            Self::Boolean => &[Eq],
            Self::Uuid => &[Eq, In],
            Self::Timestamp => &[Eq, Gt, Gte, Lt, Lte],
            Self::Enum => &[Eq, In],
        }
    }

    /// Whether a field of this type may list `op`. Null checks are
    /// independent of the value type and permitted everywhere.
    pub fn permits(&self, op: Operator) -> bool {
        op.is_null_check() || self.default_operators().contains(&op)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Schema
// =============================================================================

static COLUMN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("Invalid regex")
});

/// One filterable field of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    column: String,
    #[serde(rename = "type")]
    field_type: FieldType,
    operators: Vec<Operator>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    enum_values: Vec<String>,
}

impl FieldDefinition {
    /// Field with the type's default operator set
    pub fn new(column: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            column: column.into(),
            field_type,
            operators: field_type.default_operators().to_vec(),
            enum_values: Vec::new(),
        }
    }

    /// Enum field accepting exactly `values` (case-sensitive)
    pub fn enumeration<I, S>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut field = Self::new(column, FieldType::Enum);
        field.enum_values = values.into_iter().map(Into::into).collect();
        field
    }

    /// Replace the operator set. Duplicates are dropped, order is kept.
    pub fn with_operators(mut self, operators: impl IntoIterator<Item = Operator>) -> Self {
        self.operators.clear();
        for op in operators {
            if !self.operators.contains(&op) {
                self.operators.push(op);
            }
        }
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn enum_values(&self) -> &[String] {
        &self.enum_values
    }

    pub fn allows(&self, op: Operator) -> bool {
        self.operators.contains(&op)
    }

    fn check(&self, name: &str) -> Result<(), SchemaError> {
        if !COLUMN_RE.is_match(&self.column) {
            return Err(SchemaError::InvalidColumn {
                field: name.to_string(),
                column: self.column.clone(),
            });
        }
        if self.operators.is_empty() {
            return Err(SchemaError::NoOperators {
                field: name.to_string(),
            });
        }
        if let Some(op) = self
            .operators
            .iter()
            .find(|op| !self.field_type.permits(**op))
        {
            return Err(SchemaError::OperatorNotPermitted {
                field: name.to_string(),
                operator: op.to_string(),
                field_type: self.field_type.to_string(),
            });
        }
        match (self.field_type, self.enum_values.is_empty()) {
            (FieldType::Enum, true) => Err(SchemaError::EmptyEnum {
                field: name.to_string(),
            }),
            (FieldType::Enum, false) | (_, true) => Ok(()),
            (_, false) => Err(SchemaError::UnexpectedEnumValues {
                field: name.to_string(),
            }),
        }
    }
}

/// One resource's filterable surface. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSchema {
    resource: String,
    fields: BTreeMap<String, FieldDefinition>,
}

impl FilterSchema {
    pub fn builder(resource: impl Into<String>) -> FilterSchemaBuilder {
        FilterSchemaBuilder {
            resource: resource.into(),
            fields: Vec::new(),
        }
    }

    /// Load a schema document:
    /// `{"resource": "users", "fields": {"status": {"column": "status", "type": "string"}}}`
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument =
            serde_json::from_str(json).map_err(|e| SchemaError::Document(e.to_string()))?;

        let mut builder = Self::builder(document.resource);
        for (name, field) in document.fields {
            let column = field.column.unwrap_or_else(|| name.clone());
            let mut definition = FieldDefinition::new(column, field.field_type);
            definition.enum_values = field.enum_values.unwrap_or_default();
            if let Some(operators) = field.operators {
                let mut parsed = Vec::with_capacity(operators.len());
                for op in operators {
                    let operator = Operator::parse(&op).ok_or_else(|| {
                        SchemaError::UnknownOperator {
                            field: name.clone(),
                            operator: op.clone(),
                        }
                    })?;
                    parsed.push(operator);
                }
                definition = definition.with_operators(parsed);
            }
            builder = builder.field(name, definition);
        }
        builder.build()
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDefinition)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Collects field definitions and checks every invariant on `build`
#[derive(Debug)]
pub struct FilterSchemaBuilder {
    resource: String,
    fields: Vec<(String, FieldDefinition)>,
}

impl FilterSchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, definition: FieldDefinition) -> Self {
        self.fields.push((name.into(), definition));
        self
    }

    pub fn build(self) -> Result<FilterSchema, SchemaError> {
        let mut fields = BTreeMap::new();
        for (name, definition) in self.fields {
            definition.check(&name)?;
            if fields.contains_key(&name) {
                return Err(SchemaError::DuplicateField(name));
            }
            fields.insert(name, definition);
        }
        Ok(FilterSchema {
            resource: self.resource,
            fields,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDocument {
    resource: String,
    fields: BTreeMap<String, FieldDocument>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FieldDocument {
    column: Option<String>,
    #[serde(rename = "type")]
    field_type: FieldType,
    operators: Option<Vec<String>>,
    enum_values: Option<Vec<String>>,
}

// =============================================================================
// Values
// =============================================================================

/// Untyped value as it arrived from the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    List(Vec<RawValue>),
}

impl RawValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Text(s.into())).collect())
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&TypedValue> for RawValue {
    fn from(value: &TypedValue) -> Self {
        match value {
            TypedValue::Text(s) => Self::Text(s.clone()),
            TypedValue::Integer(i) => Self::Number((*i).into()),
            TypedValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Self::Number)
                .unwrap_or_else(|| Self::Text(f.to_string())),
            TypedValue::Boolean(b) => Self::Bool(*b),
            TypedValue::Uuid(u) => Self::Text(u.hyphenated().to_string()),
            TypedValue::Timestamp(ts) => {
                Self::Text(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            TypedValue::List(items) => Self::List(items.iter().map(Self::from).collect()),
        }
    }
}

/// Value coerced to a field's declared type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    List(Vec<TypedValue>),
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", RawValue::from(self))
    }
}

// =============================================================================
// Filters
// =============================================================================

/// One leaf predicate as parsed. The operator is kept verbatim so an
/// unrecognized operator is reported by validation, not by the parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOption {
    pub field: String,
    pub operator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<RawValue>,
}

impl FilterOption {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Option<RawValue>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
        }
    }

    /// Operator from the vocabulary, if recognized
    pub fn resolved_operator(&self) -> Option<Operator> {
        Operator::parse(&self.operator)
    }

    /// Serialize back to `field:operator:value`
    pub fn to_delimited(&self) -> String {
        match &self.value {
            Some(value) => format!("{}:{}:{}", self.field, self.operator, value),
            None => format!("{}:{}:", self.field, self.operator),
        }
    }
}

impl fmt::Display for FilterOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_delimited())
    }
}

/// Leaf predicate after validation and coercion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedFilter {
    pub field: String,
    pub column: String,
    pub operator: Operator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<TypedValue>,
}

/// Boolean connective of a group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupOperator {
    #[default]
    And,
    Or,
}

impl GroupOperator {
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("and") {
            Some(Self::And)
        } else if s.eq_ignore_ascii_case("or") {
            Some(Self::Or)
        } else {
            None
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Boolean combination of leaves and nested groups.
///
/// The leaf type changes as the tree moves through the pipeline:
/// `FilterGroup<FilterOption>` after parsing, `FilterGroup<TypedFilter>`
/// after coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterGroup<T = FilterOption> {
    pub operator: GroupOperator,
    pub filters: Vec<T>,
    pub groups: Vec<FilterGroup<T>>,
}

impl<T> Default for FilterGroup<T> {
    fn default() -> Self {
        Self::new(GroupOperator::And)
    }
}

/// Child of a group, visited filters first, then groups
#[derive(Debug, Clone, Copy)]
pub enum FilterNode<'a, T> {
    Leaf(&'a T),
    Group(&'a FilterGroup<T>),
}

impl<T> FilterGroup<T> {
    pub fn new(operator: GroupOperator) -> Self {
        Self {
            operator,
            filters: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Implicit AND over `filters`
    pub fn all(filters: Vec<T>) -> Self {
        Self {
            operator: GroupOperator::And,
            filters,
            groups: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: T) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_group(mut self, group: FilterGroup<T>) -> Self {
        self.groups.push(group);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.groups.iter().all(FilterGroup::is_empty)
    }

    pub fn nodes(&self) -> impl Iterator<Item = FilterNode<'_, T>> {
        self.filters
            .iter()
            .map(FilterNode::Leaf)
            .chain(self.groups.iter().map(FilterNode::Group))
    }

    /// Every leaf, depth-first, filters before groups
    pub fn leaves(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a T>) {
        for node in self.nodes() {
            match node {
                FilterNode::Leaf(leaf) => out.push(leaf),
                FilterNode::Group(group) => group.collect_leaves(out),
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.filters.len() + self.groups.iter().map(FilterGroup::leaf_count).sum::<usize>()
    }

    /// Nesting depth; a group without nested groups has depth 1
    pub fn depth(&self) -> usize {
        1 + self.groups.iter().map(FilterGroup::depth).max().unwrap_or(0)
    }

    /// Map every leaf, keeping the tree shape
    pub fn map<U, F>(&self, f: &mut F) -> FilterGroup<U>
    where
        F: FnMut(&T) -> U,
    {
        let filters = self.filters.iter().map(&mut *f).collect();
        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            groups.push(group.map(&mut *f));
        }
        FilterGroup {
            operator: self.operator,
            filters,
            groups,
        }
    }

    /// Map every leaf, stopping at the first error
    pub fn try_map<U, E, F>(&self, f: &mut F) -> Result<FilterGroup<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        let mut filters = Vec::with_capacity(self.filters.len());
        for leaf in &self.filters {
            filters.push(f(leaf)?);
        }
        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            groups.push(group.try_map(&mut *f)?);
        }
        Ok(FilterGroup {
            operator: self.operator,
            filters,
            groups,
        })
    }
}

/// Parameterized SQL fragment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledFilter {
    pub sql: String,
    pub params: Vec<TypedValue>,
    pub next_param_index: usize,
}

impl CompiledFilter {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// `(<sql>)`, or nothing for an empty fragment. Use this when the
    /// fragment is joined with other conditions, since a top-level `OR`
    /// group is not parenthesized by the compiler.
    pub fn parenthesized(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!("({})", self.sql)
        }
    }

    /// `WHERE <sql>`, or nothing for an empty fragment
    pub fn where_clause(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.sql)
        }
    }
}
