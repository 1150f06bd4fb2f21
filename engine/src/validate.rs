//! Schema validation
//!
//! Structural checks of parsed filters against a `FilterSchema`: the field
//! exists, the operator is allowed for it, and the value has the right
//! shape for the operator. Type and enum membership checks happen during
//! coercion.

use crate::config::ValidationMode;
use crate::error::FilterError;
use crate::types::{FieldDefinition, FilterGroup, FilterOption, FilterSchema, Operator, RawValue};

/// Resolve a leaf against the schema, returning its field definition and
/// operator when the leaf is structurally valid.
pub(crate) fn check<'s>(
    schema: &'s FilterSchema,
    filter: &FilterOption,
) -> Result<(&'s FieldDefinition, Operator), FilterError> {
    let definition = schema
        .field(&filter.field)
        .ok_or_else(|| FilterError::unknown_field(&filter.field, schema.resource()))?;

    let operator = filter
        .resolved_operator()
        .filter(|op| definition.allows(*op))
        .ok_or_else(|| FilterError::invalid_operator(&filter.field, &filter.operator))?;

    if operator.takes_list() {
        if !matches!(filter.value, Some(RawValue::List(_))) {
            return Err(FilterError::invalid_in(&filter.field, operator.as_str()));
        }
    } else if operator.takes_value() && filter.value.is_none() {
        return Err(FilterError::invalid_format(format!(
            "Operator '{}' on field '{}' requires a value",
            operator, filter.field
        ))
        .with_field(&filter.field));
    }

    Ok((definition, operator))
}

/// Validate one leaf
pub fn validate_filter(schema: &FilterSchema, filter: &FilterOption) -> Result<(), FilterError> {
    check(schema, filter).map(|_| ())
}

/// Validate every leaf of a tree, depth-first, filters before groups.
///
/// `FailFast` returns after the first invalid leaf; `Exhaustive` returns all
/// errors in tree order.
pub fn validate_group(
    schema: &FilterSchema,
    group: &FilterGroup,
    mode: ValidationMode,
) -> Result<(), Vec<FilterError>> {
    let mut errors = Vec::new();
    for leaf in group.leaves() {
        if let Err(e) = validate_filter(schema, leaf) {
            tracing::trace!(field = %leaf.field, kind = %e.kind, "Invalid filter");
            errors.push(e);
            if mode == ValidationMode::FailFast {
                break;
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterErrorKind;
    use crate::types::{FieldType, GroupOperator};

    fn schema() -> FilterSchema {
        FilterSchema::builder("users")
            .field(
                "status",
                FieldDefinition::new("status", FieldType::String)
                    .with_operators([Operator::Eq, Operator::In]),
            )
            .field(
                "deletedAt",
                FieldDefinition::new("deleted_at", FieldType::Timestamp)
                    .with_operators([Operator::IsNull, Operator::IsNotNull, Operator::Gt]),
            )
            .field(
                "role",
                FieldDefinition::enumeration("role", ["admin", "member"]),
            )
            .build()
            .unwrap()
    }

    fn leaf(field: &str, op: &str, value: Option<RawValue>) -> FilterOption {
        FilterOption::new(field, op, value)
    }

    #[test]
    fn test_valid_leaf() {
        let schema = schema();
        assert!(validate_filter(&schema, &leaf("status", "eq", Some(RawValue::text("a")))).is_ok());
        assert!(validate_filter(&schema, &leaf("status", "in", Some(RawValue::list(["a"])))).is_ok());
    }

    #[test]
    fn test_unknown_field() {
        let err = validate_filter(&schema(), &leaf("foo", "eq", Some(RawValue::text("bar"))))
            .unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::UnknownField);
        assert_eq!(err.field.as_deref(), Some("foo"));
    }

    #[test]
    fn test_operator_not_allowed() {
        let schema = schema();
        for op in ["contains", "between", "neq"] {
            let err = validate_filter(&schema, &leaf("status", op, Some(RawValue::text("a"))))
                .unwrap_err();
            assert_eq!(err.kind, FilterErrorKind::InvalidOperator, "op: {}", op);
            assert_eq!(err.field.as_deref(), Some("status"));
        }
    }

    #[test]
    fn test_operator_case_insensitive() {
        let filter = leaf("deletedAt", "ISNULL", None);
        assert!(validate_filter(&schema(), &filter).is_ok());
    }

    #[test]
    fn test_in_requires_list() {
        let schema = schema();
        let scalar = validate_filter(&schema, &leaf("status", "in", Some(RawValue::text("a"))))
            .unwrap_err();
        assert_eq!(scalar.kind, FilterErrorKind::InvalidIn);

        let missing = validate_filter(&schema, &leaf("status", "in", None)).unwrap_err();
        assert_eq!(missing.kind, FilterErrorKind::InvalidIn);
    }

    #[test]
    fn test_null_checks_ignore_value() {
        let schema = schema();
        assert!(validate_filter(&schema, &leaf("deletedAt", "isNull", None)).is_ok());
        assert!(
            validate_filter(&schema, &leaf("deletedAt", "isNotNull", Some(RawValue::Bool(true))))
                .is_ok()
        );
    }

    #[test]
    fn test_value_required() {
        let err = validate_filter(&schema(), &leaf("status", "eq", None)).unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::InvalidFormat);
        assert_eq!(err.field.as_deref(), Some("status"));
    }

    #[test]
    fn test_enum_membership_deferred() {
        let filter = leaf("role", "eq", Some(RawValue::text("owner")));
        assert!(validate_filter(&schema(), &filter).is_ok());
    }

    fn invalid_tree() -> FilterGroup {
        FilterGroup::all(vec![
            leaf("status", "eq", Some(RawValue::text("a"))),
            leaf("foo", "eq", Some(RawValue::text("b"))),
        ])
        .with_group(
            FilterGroup::new(GroupOperator::Or)
                .with_filter(leaf("status", "like", Some(RawValue::text("c"))))
                .with_filter(leaf("deletedAt", "isNull", None)),
        )
    }

    #[test]
    fn test_group_fail_fast() {
        let errors = validate_group(&schema(), &invalid_tree(), ValidationMode::FailFast)
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, FilterErrorKind::UnknownField);
    }

    #[test]
    fn test_group_exhaustive() {
        let errors = validate_group(&schema(), &invalid_tree(), ValidationMode::Exhaustive)
            .unwrap_err();
        let kinds: Vec<_> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![FilterErrorKind::UnknownField, FilterErrorKind::InvalidOperator]
        );
    }

    #[test]
    fn test_group_valid() {
        let group = FilterGroup::all(vec![leaf("status", "eq", Some(RawValue::text("a")))])
            .with_group(FilterGroup::all(vec![leaf("deletedAt", "isNull", None)]));
        assert!(validate_group(&schema(), &group, ValidationMode::Exhaustive).is_ok());
    }
}
