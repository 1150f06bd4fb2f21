//! Type coercion
//!
//! Converts the raw value of a validated leaf into the value type declared
//! by its field. Coercing a value that already has the right type returns it
//! unchanged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::config::ValidationMode;
use crate::error::FilterError;
use crate::types::{
    FieldDefinition, FieldType, FilterGroup, FilterOption, FilterSchema, Operator, RawValue,
    TypedFilter, TypedValue,
};
use crate::validate;

/// Length of the hyphenated 8-4-4-4-12 UUID form
const UUID_HYPHENATED_LEN: usize = 36;

/// ISO 8601 forms without an offset, taken as UTC
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// ISO 8601 forms with a numeric offset (`+02:00` or `+0200`)
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
];

/// Validate and coerce one leaf
pub fn coerce_filter(schema: &FilterSchema, filter: &FilterOption) -> Result<TypedFilter, FilterError> {
    let (definition, operator) = validate::check(schema, filter)?;
    let value = coerce_value(definition, operator, filter.value.as_ref(), &filter.field)?;
    Ok(TypedFilter {
        field: filter.field.clone(),
        column: definition.column().to_string(),
        operator,
        value,
    })
}

/// Validate and coerce every leaf of a tree, keeping its shape
pub fn coerce_group(
    schema: &FilterSchema,
    group: &FilterGroup,
    mode: ValidationMode,
) -> Result<FilterGroup<TypedFilter>, Vec<FilterError>> {
    match mode {
        ValidationMode::FailFast => group
            .try_map(&mut |leaf| coerce_filter(schema, leaf))
            .map_err(|e| vec![e]),
        ValidationMode::Exhaustive => {
            let results = group.map(&mut |leaf| coerce_filter(schema, leaf));
            let errors: Vec<FilterError> = results
                .leaves()
                .into_iter()
                .filter_map(|r| r.as_ref().err().cloned())
                .collect();
            if !errors.is_empty() {
                return Err(errors);
            }
            results
                .try_map(&mut |r: &Result<TypedFilter, FilterError>| r.clone())
                .map_err(|e| vec![e])
        }
    }
}

/// Coerce the value carried with `operator`. Null checks have no value;
/// list operators are coerced element-wise and the first bad element decides
/// the error.
pub fn coerce_value(
    definition: &FieldDefinition,
    operator: Operator,
    value: Option<&RawValue>,
    field: &str,
) -> Result<Option<TypedValue>, FilterError> {
    if !operator.takes_value() {
        return Ok(None);
    }

    let Some(value) = value else {
        return Err(FilterError::invalid_format(format!(
            "Operator '{}' on field '{}' requires a value",
            operator, field
        ))
        .with_field(field));
    };

    if operator.takes_list() {
        let RawValue::List(items) = value else {
            return Err(FilterError::invalid_in(field, operator.as_str()));
        };
        let coerced = items
            .iter()
            .map(|item| coerce_scalar(definition, item, field))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Some(TypedValue::List(coerced)));
    }

    coerce_scalar(definition, value, field).map(Some)
}

/// Coerce a single value to the field's declared type
pub fn coerce_scalar(
    definition: &FieldDefinition,
    value: &RawValue,
    field: &str,
) -> Result<TypedValue, FilterError> {
    if let RawValue::List(_) = value {
        return Err(FilterError::invalid_type(
            field,
            &format!("a single {}", definition.field_type()),
            value,
        ));
    }

    match definition.field_type() {
        FieldType::String => Ok(TypedValue::Text(value.to_string())),
        FieldType::Number => coerce_number(value, field),
        FieldType::Boolean => coerce_boolean(value, field),
        FieldType::Uuid => match value {
            RawValue::Text(s) => parse_uuid(s)
                .map(TypedValue::Uuid)
                .ok_or_else(|| FilterError::invalid_uuid(field, s)),
            other => Err(FilterError::invalid_uuid(field, other)),
        },
        FieldType::Timestamp => match value {
            RawValue::Text(s) => parse_timestamp(s)
                .map(TypedValue::Timestamp)
                .ok_or_else(|| FilterError::invalid_date(field, s)),
            other => Err(FilterError::invalid_date(field, other)),
        },
        FieldType::Enum => {
            let candidate = match value {
                RawValue::Text(s) => s.clone(),
                RawValue::Number(n) => n.to_string(),
                other => {
                    return Err(FilterError::invalid_enum(
                        field,
                        other,
                        definition.enum_values(),
                    ));
                }
            };
            if definition.enum_values().contains(&candidate) {
                Ok(TypedValue::Text(candidate))
            } else {
                Err(FilterError::invalid_enum(
                    field,
                    candidate,
                    definition.enum_values(),
                ))
            }
        }
    }
}

fn coerce_number(value: &RawValue, field: &str) -> Result<TypedValue, FilterError> {
    let invalid = || FilterError::invalid_type(field, "a number", value);
    match value {
        RawValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(TypedValue::Integer(i))
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(TypedValue::Float)
                    .ok_or_else(invalid)
            }
        }
        RawValue::Text(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Ok(TypedValue::Integer(i))
            } else {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(TypedValue::Float)
                    .ok_or_else(invalid)
            }
        }
        _ => Err(invalid()),
    }
}

fn coerce_boolean(value: &RawValue, field: &str) -> Result<TypedValue, FilterError> {
    match value {
        RawValue::Bool(b) => Ok(TypedValue::Boolean(*b)),
        RawValue::Text(s) if s.eq_ignore_ascii_case("true") => Ok(TypedValue::Boolean(true)),
        RawValue::Text(s) if s.eq_ignore_ascii_case("false") => Ok(TypedValue::Boolean(false)),
        other => Err(FilterError::invalid_type(field, "true or false", other)),
    }
}

/// Accept only the canonical 8-4-4-4-12 hexadecimal form
pub fn parse_uuid(s: &str) -> Option<Uuid> {
    if s.len() != UUID_HYPHENATED_LEN {
        return None;
    }
    Uuid::try_parse(s).ok()
}

/// Parse an ISO 8601 date-time. Seconds are optional, offsets may be `Z`,
/// extended (`+02:00`) or basic (`+0200`). Values without an offset are
/// taken as UTC; a bare date means midnight UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(utc) = s.strip_suffix(['Z', 'z']) {
        return parse_naive(utc);
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }
    parse_naive(s).or_else(|| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

fn parse_naive(s: &str) -> Option<DateTime<Utc>> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
#[path = "coerce_tests.rs"]
mod tests;
