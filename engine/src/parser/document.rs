//! Structured filter documents
//!
//! Two shapes are accepted:
//! - flat: `{"status": "active", "age": {"gte": 18}}`, where a literal implies
//!   `eq` (or `isNull` for `null`) and a nested object maps operators to values
//! - tree: `{"operator": "and", "filters": [{"field", "op", "value"}], "groups": [...]}`

use serde_json::{Map, Value};

use crate::config::LimitsConfig;
use crate::error::FilterError;
use crate::types::{FilterGroup, FilterOption, GroupOperator, Operator, RawValue};

const GROUP_KEYS: &[&str] = &["operator", "filters", "groups"];
const LEAF_KEYS: &[&str] = &["field", "op", "operator", "value"];

pub(super) fn parse_document(
    document: &Value,
    limits: &LimitsConfig,
) -> Result<FilterGroup, FilterError> {
    let Value::Object(object) = document else {
        return Err(FilterError::invalid_format(
            "Filter document must be a JSON object",
        ));
    };

    let mut walker = Walker { limits, leaves: 0 };
    let group = if is_tree(object) {
        walker.group(object, 1)?
    } else {
        walker.flat(object)?
    };

    tracing::debug!(
        leaves = walker.leaves,
        depth = group.depth(),
        "Parsed filter document"
    );
    Ok(group)
}

/// Tree form when `filters` or `groups` holds an array. Anything else is
/// flat, so resources may have fields named `filters` or `groups`.
fn is_tree(object: &Map<String, Value>) -> bool {
    ["filters", "groups"]
        .iter()
        .any(|key| matches!(object.get(*key), Some(Value::Array(_))))
}

struct Walker<'a> {
    limits: &'a LimitsConfig,
    leaves: usize,
}

impl Walker<'_> {
    fn count_leaf(&mut self) -> Result<(), FilterError> {
        self.leaves += 1;
        if self.leaves > self.limits.max_filters {
            return Err(FilterError::invalid_format(format!(
                "Maximum {} filters allowed",
                self.limits.max_filters
            )));
        }
        Ok(())
    }

    fn flat(&mut self, object: &Map<String, Value>) -> Result<FilterGroup, FilterError> {
        let mut filters = Vec::with_capacity(object.len());
        for (field, value) in object {
            match value {
                Value::Object(ops) => {
                    if ops.is_empty() {
                        return Err(FilterError::invalid_format(format!(
                            "Empty operator map for field '{}'",
                            field
                        ))
                        .with_field(field));
                    }
                    for (operator, operand) in ops {
                        self.count_leaf()?;
                        filters.push(FilterOption::new(
                            field,
                            operator,
                            raw_value(operand, field)?,
                        ));
                    }
                }
                Value::Null => {
                    self.count_leaf()?;
                    filters.push(FilterOption::new(field, Operator::IsNull.as_str(), None));
                }
                literal => {
                    self.count_leaf()?;
                    filters.push(FilterOption::new(
                        field,
                        Operator::Eq.as_str(),
                        raw_value(literal, field)?,
                    ));
                }
            }
        }
        Ok(FilterGroup::all(filters))
    }

    fn group(
        &mut self,
        object: &Map<String, Value>,
        depth: usize,
    ) -> Result<FilterGroup, FilterError> {
        if depth > self.limits.max_depth {
            return Err(FilterError::invalid_format(format!(
                "Filter groups nested deeper than {} levels",
                self.limits.max_depth
            )));
        }
        reject_unknown_keys(object, GROUP_KEYS, "group")?;

        let operator = match object.get("operator") {
            None | Some(Value::Null) => GroupOperator::default(),
            Some(Value::String(s)) => GroupOperator::parse(s).ok_or_else(|| {
                FilterError::invalid_format(format!(
                    "Invalid group operator '{}': expected 'and' or 'or'",
                    s
                ))
            })?,
            Some(other) => {
                return Err(FilterError::invalid_format(format!(
                    "Invalid group operator {}: expected 'and' or 'or'",
                    other
                )));
            }
        };

        let mut group = FilterGroup::new(operator);
        for item in array_of_objects(object, "filters")? {
            self.count_leaf()?;
            group.filters.push(leaf(item)?);
        }
        for item in array_of_objects(object, "groups")? {
            group.groups.push(self.group(item, depth + 1)?);
        }
        Ok(group)
    }
}

fn leaf(object: &Map<String, Value>) -> Result<FilterOption, FilterError> {
    reject_unknown_keys(object, LEAF_KEYS, "filter")?;

    let field = match object.get("field") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim(),
        _ => {
            return Err(FilterError::invalid_format(
                "Each filter needs a non-empty string 'field'",
            ));
        }
    };

    let operator = match object.get("op").or_else(|| object.get("operator")) {
        None => Operator::Eq.as_str(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim(),
        Some(_) => {
            return Err(FilterError::invalid_format(format!(
                "Filter on field '{}' has an invalid 'op'",
                field
            ))
            .with_field(field));
        }
    };

    let value = match object.get("value") {
        Some(value) => raw_value(value, field)?,
        None => None,
    };

    Ok(FilterOption::new(field, operator, value))
}

fn array_of_objects<'a>(
    object: &'a Map<String, Value>,
    key: &str,
) -> Result<Vec<&'a Map<String, Value>>, FilterError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(inner) => Ok(inner),
                _ => Err(FilterError::invalid_format(format!(
                    "Every entry of '{}' must be an object",
                    key
                ))),
            })
            .collect(),
        Some(_) => Err(FilterError::invalid_format(format!(
            "'{}' must be an array",
            key
        ))),
    }
}

fn reject_unknown_keys(
    object: &Map<String, Value>,
    allowed: &[&str],
    what: &str,
) -> Result<(), FilterError> {
    match object.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(FilterError::invalid_format(format!(
            "Unknown key '{}' in filter {}",
            key, what
        ))),
        None => Ok(()),
    }
}

/// JSON value to raw filter value; `null` means no value
fn raw_value(value: &Value, field: &str) -> Result<Option<RawValue>, FilterError> {
    let raw = match value {
        Value::Null => return Ok(None),
        Value::Bool(b) => RawValue::Bool(*b),
        Value::Number(n) => RawValue::Number(n.clone()),
        Value::String(s) => RawValue::Text(s.clone()),
        Value::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                match raw_value(item, field)? {
                    Some(RawValue::List(_)) => {
                        return Err(FilterError::invalid_format(format!(
                            "Nested lists are not allowed in filter on field '{}'",
                            field
                        ))
                        .with_field(field));
                    }
                    Some(raw) => list.push(raw),
                    None => {
                        return Err(FilterError::invalid_format(format!(
                            "Null list element in filter on field '{}'",
                            field
                        ))
                        .with_field(field));
                    }
                }
            }
            RawValue::List(list)
        }
        Value::Object(_) => {
            return Err(FilterError::invalid_format(format!(
                "Unexpected object value in filter on field '{}'",
                field
            ))
            .with_field(field));
        }
    };
    Ok(Some(raw))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::FilterErrorKind;

    fn parse(document: Value) -> Result<FilterGroup, FilterError> {
        parse_document(&document, &LimitsConfig::default())
    }

    #[test]
    fn test_flat_literal_implies_eq() {
        let group = parse(json!({"status": "active"})).unwrap();
        assert_eq!(
            group.filters,
            vec![FilterOption::new("status", "eq", Some(RawValue::text("active")))]
        );
    }

    #[test]
    fn test_flat_operator_map() {
        let group = parse(json!({"age": {"gte": 18, "lt": 65}})).unwrap();
        assert_eq!(group.filters.len(), 2);
        assert_eq!(group.filters[0].field, "age");
        assert_eq!(group.filters[0].operator, "gte");
        assert_eq!(group.filters[0].value, Some(RawValue::Number(18.into())));
        assert_eq!(group.filters[1].operator, "lt");
    }

    #[test]
    fn test_flat_null_means_is_null() {
        let group = parse(json!({"deletedAt": null})).unwrap();
        assert_eq!(group.filters[0].operator, "isNull");
        assert_eq!(group.filters[0].value, None);
    }

    #[test]
    fn test_flat_list_value() {
        let group = parse(json!({"region": {"in": ["eu", "us"]}})).unwrap();
        assert_eq!(group.filters[0].value, Some(RawValue::list(["eu", "us"])));
    }

    #[test]
    fn test_flat_empty_operator_map() {
        let err = parse(json!({"age": {}})).unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::InvalidFormat);
        assert_eq!(err.field.as_deref(), Some("age"));
    }

    #[test]
    fn test_tree_with_nested_groups() {
        let group = parse(json!({
            "operator": "or",
            "filters": [{"field": "status", "op": "eq", "value": "active"}],
            "groups": [{
                "operator": "and",
                "filters": [
                    {"field": "age", "op": "gte", "value": 18},
                    {"field": "deletedAt", "op": "isNull"}
                ],
                "groups": [{"filters": [{"field": "region", "operator": "in", "value": ["eu"]}]}]
            }]
        }))
        .unwrap();

        assert_eq!(group.operator, GroupOperator::Or);
        assert_eq!(group.filters.len(), 1);
        assert_eq!(group.groups.len(), 1);
        let nested = &group.groups[0];
        assert_eq!(nested.operator, GroupOperator::And);
        assert_eq!(nested.filters[1].value, None);
        assert_eq!(nested.groups[0].operator, GroupOperator::And);
        assert_eq!(nested.groups[0].filters[0].operator, "in");
        assert_eq!(group.leaf_count(), 4);
        assert_eq!(group.depth(), 3);
    }

    #[test]
    fn test_tree_leaf_without_op_means_eq() {
        let group = parse(json!({"filters": [{"field": "active", "value": true}]})).unwrap();
        assert_eq!(group.filters[0].operator, "eq");
        assert_eq!(group.filters[0].value, Some(RawValue::Bool(true)));
    }

    #[test]
    fn test_tree_empty() {
        let group = parse(json!({"filters": []})).unwrap();
        assert!(group.is_empty());
    }

    #[test]
    fn test_unknown_shapes() {
        let cases = [
            json!("status:eq:active"),
            json!([1, 2]),
            json!({"filters": [1]}),
            json!({"filters": [], "limit": 5}),
            json!({"filters": [{"field": "a", "op": "eq", "value": 1, "extra": true}]}),
            json!({"filters": [{"op": "eq", "value": 1}]}),
            json!({"filters": [{"field": "a", "op": 5}]}),
            json!({"operator": "xor", "filters": []}),
            json!({"status": {"eq": {"nested": true}}}),
            json!({"region": {"in": [["eu"]]}}),
            json!({"region": {"in": ["eu", null]}}),
        ];
        for case in cases {
            let err = parse(case.clone()).unwrap_err();
            assert_eq!(err.kind, FilterErrorKind::InvalidFormat, "case: {}", case);
        }
    }

    #[test]
    fn test_flat_fields_named_like_tree_keys() {
        let group = parse(json!({"groups": "admin"})).unwrap();
        assert_eq!(
            group.filters,
            vec![FilterOption::new("groups", "eq", Some(RawValue::text("admin")))]
        );

        let group = parse(json!({"groups": {"in": ["admin", "ops"]}, "age": 3})).unwrap();
        assert_eq!(group.filters.len(), 2);
        assert_eq!(group.filters[0].field, "groups");
        assert_eq!(group.filters[0].operator, "in");
        assert_eq!(group.filters[0].value, Some(RawValue::list(["admin", "ops"])));

        let group = parse(json!({"filters": {"eq": "x"}})).unwrap();
        assert_eq!(group.filters[0].field, "filters");
        assert!(group.groups.is_empty());
    }

    #[test]
    fn test_depth_limit() {
        let limits = LimitsConfig {
            max_depth: 2,
            ..LimitsConfig::default()
        };
        let ok = json!({"groups": [{"filters": []}]});
        assert!(parse_document(&ok, &limits).is_ok());

        let too_deep = json!({"groups": [{"groups": [{"filters": []}]}]});
        let err = parse_document(&too_deep, &limits).unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::InvalidFormat);
    }

    #[test]
    fn test_leaf_limit_counts_whole_tree() {
        let limits = LimitsConfig {
            max_filters: 2,
            ..LimitsConfig::default()
        };
        let document = json!({
            "filters": [{"field": "a", "value": 1}],
            "groups": [{"filters": [{"field": "b", "value": 2}, {"field": "c", "value": 3}]}]
        });
        let err = parse_document(&document, &limits).unwrap_err();
        assert_eq!(err.message, "Maximum 2 filters allowed");

        let flat = json!({"a": {"gt": 1, "lt": 5}, "b": 1});
        assert!(parse_document(&flat, &limits).is_err());
    }
}
