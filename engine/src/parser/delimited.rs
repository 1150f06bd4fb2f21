//! `field:operator:value` expressions

use crate::config::LimitsConfig;
use crate::error::FilterError;
use crate::types::{FilterGroup, FilterOption, Operator, RawValue};

const EXPECTED_SHAPE: &str = "expected field:operator:value";

pub(super) fn parse_expression(
    expr: &str,
    limits: &LimitsConfig,
) -> Result<FilterOption, FilterError> {
    if expr.len() > limits.max_input_bytes {
        return Err(FilterError::invalid_format(format!(
            "Filter expression exceeds maximum size of {} bytes",
            limits.max_input_bytes
        )));
    }

    // Only the first two colons separate; timestamps keep theirs
    let mut parts = expr.splitn(3, ':');
    let field = parts.next().unwrap_or_default().trim();
    let operator = match parts.next() {
        Some(op) => op.trim(),
        None => {
            return Err(FilterError::invalid_format(format!(
                "Invalid filter '{}': {}",
                expr, EXPECTED_SHAPE
            )));
        }
    };
    let value = parts.next().unwrap_or_default();

    if field.is_empty() || operator.is_empty() {
        return Err(FilterError::invalid_format(format!(
            "Invalid filter '{}': {}",
            expr, EXPECTED_SHAPE
        )));
    }

    let value = if value.is_empty() {
        None
    } else if Operator::parse(operator).is_some_and(|op| op.takes_list()) {
        Some(split_list(field, value)?)
    } else {
        Some(RawValue::Text(value.to_string()))
    };

    tracing::trace!(field, operator, has_value = value.is_some(), "Parsed delimited filter");
    Ok(FilterOption::new(field, operator, value))
}

/// Comma-split the value of an `in`/`nin` expression. Elements are trimmed
/// (`eu, us` is `["eu", "us"]`); a blank element is an error.
fn split_list(field: &str, value: &str) -> Result<RawValue, FilterError> {
    let mut items = Vec::new();
    for item in value.split(',').map(str::trim) {
        if item.is_empty() {
            return Err(FilterError::invalid_format(format!(
                "Empty list element in filter on field '{}'",
                field
            ))
            .with_field(field));
        }
        items.push(RawValue::Text(item.to_string()));
    }
    Ok(RawValue::List(items))
}

pub(super) fn parse_all<S: AsRef<str>>(
    exprs: &[S],
    limits: &LimitsConfig,
) -> Result<FilterGroup, FilterError> {
    if exprs.len() > limits.max_filters {
        return Err(FilterError::invalid_format(format!(
            "Maximum {} filters allowed",
            limits.max_filters
        )));
    }

    let filters = exprs
        .iter()
        .map(|expr| parse_expression(expr.as_ref(), limits))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(count = filters.len(), "Parsed delimited filters");
    Ok(FilterGroup::all(filters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterErrorKind;
    use crate::types::GroupOperator;

    fn parse(expr: &str) -> Result<FilterOption, FilterError> {
        parse_expression(expr, &LimitsConfig::default())
    }

    #[test]
    fn test_simple_expression() {
        let leaf = parse("status:eq:active").unwrap();
        assert_eq!(leaf.field, "status");
        assert_eq!(leaf.operator, "eq");
        assert_eq!(leaf.value, Some(RawValue::text("active")));
    }

    #[test]
    fn test_extra_colons_stay_in_value() {
        let leaf = parse("createdAt:gte:2024-01-01T12:00:00").unwrap();
        assert_eq!(leaf.value, Some(RawValue::text("2024-01-01T12:00:00")));

        let url = parse("homepage:eq:https://example.com:8080/a").unwrap();
        assert_eq!(url.value, Some(RawValue::text("https://example.com:8080/a")));
    }

    #[test]
    fn test_in_splits_on_commas() {
        let leaf = parse("region:in:eu,us").unwrap();
        assert_eq!(leaf.value, Some(RawValue::list(["eu", "us"])));

        let single = parse("region:nin:eu").unwrap();
        assert_eq!(single.value, Some(RawValue::list(["eu"])));

        let upper = parse("region:IN:eu,us").unwrap();
        assert_eq!(upper.value, Some(RawValue::list(["eu", "us"])));
    }

    #[test]
    fn test_list_elements_trimmed() {
        let leaf = parse("region:in:eu, us").unwrap();
        assert_eq!(leaf.value, Some(RawValue::list(["eu", "us"])));

        let padded = parse("status:nin: active ,\tdisabled ").unwrap();
        assert_eq!(padded.value, Some(RawValue::list(["active", "disabled"])));

        let blank = parse("region:in:eu, ,us").unwrap_err();
        assert_eq!(blank.kind, FilterErrorKind::InvalidFormat);
    }

    #[test]
    fn test_comma_is_literal_for_other_operators() {
        let leaf = parse("name:contains:a,b").unwrap();
        assert_eq!(leaf.value, Some(RawValue::text("a,b")));
    }

    #[test]
    fn test_empty_value_is_absent() {
        let leaf = parse("deletedAt:isNull:").unwrap();
        assert_eq!(leaf.operator, "isNull");
        assert_eq!(leaf.value, None);

        let bare = parse("deletedAt:isNotNull").unwrap();
        assert_eq!(bare.value, None);
    }

    #[test]
    fn test_value_whitespace_preserved() {
        let leaf = parse(" name : contains : two words ").unwrap();
        assert_eq!(leaf.field, "name");
        assert_eq!(leaf.operator, "contains");
        assert_eq!(leaf.value, Some(RawValue::text(" two words ")));
    }

    #[test]
    fn test_unknown_operator_passes_through() {
        let leaf = parse("age:between:1,5").unwrap();
        assert_eq!(leaf.operator, "between");
        assert_eq!(leaf.value, Some(RawValue::text("1,5")));
    }

    #[test]
    fn test_malformed_expressions() {
        for expr in ["", "status", ":eq:active", "status::active", "   :eq:x"] {
            let err = parse(expr).unwrap_err();
            assert_eq!(err.kind, FilterErrorKind::InvalidFormat, "expr: {:?}", expr);
        }
    }

    #[test]
    fn test_empty_list_element() {
        let err = parse("region:in:eu,,us").unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::InvalidFormat);
        assert_eq!(err.field.as_deref(), Some("region"));
    }

    #[test]
    fn test_expression_too_large() {
        let limits = LimitsConfig {
            max_input_bytes: 8,
            ..LimitsConfig::default()
        };
        let err = parse_expression("status:eq:active", &limits).unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::InvalidFormat);
    }

    #[test]
    fn test_parse_all_builds_and_group() {
        let group = parse_all(&["status:eq:active", "region:in:eu,us"], &LimitsConfig::default())
            .unwrap();
        assert_eq!(group.operator, GroupOperator::And);
        assert_eq!(group.filters.len(), 2);
        assert!(group.groups.is_empty());
    }

    #[test]
    fn test_parse_all_stops_at_first_error() {
        let err = parse_all(&["status:eq:active", "broken"], &LimitsConfig::default())
            .unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::InvalidFormat);
    }

    #[test]
    fn test_parse_all_limit() {
        let limits = LimitsConfig {
            max_filters: 1,
            ..LimitsConfig::default()
        };
        let err = parse_all(&["a:eq:1", "b:eq:2"], &limits).unwrap_err();
        assert_eq!(err.message, "Maximum 1 filters allowed");
    }

    #[test]
    fn test_round_trip() {
        for expr in [
            "status:eq:active",
            "region:in:eu,us",
            "deletedAt:isNull:",
            "createdAt:gt:2024-01-01T12:00:00",
            "name:contains:a,b",
        ] {
            let leaf = parse(expr).unwrap();
            assert_eq!(leaf.to_delimited(), expr);
            assert_eq!(parse(&leaf.to_delimited()).unwrap(), leaf);
        }
    }
}
