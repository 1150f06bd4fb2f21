//! In-memory evaluation
//!
//! Applies a coerced filter tree to JSON records keyed by public field name,
//! for callers that filter a collection they already hold instead of
//! compiling SQL. Semantics follow the SQL templates: a missing or null
//! field only satisfies `isNull`, and comparing incompatible types is false.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::coerce::{parse_timestamp, parse_uuid};
use crate::types::{FilterGroup, FilterNode, GroupOperator, Operator, TypedFilter, TypedValue};

type Record = Map<String, Value>;

/// Whether `record` satisfies the tree. Empty groups impose no constraint,
/// matching the SQL compiler which drops them.
pub fn matches(group: &FilterGroup<TypedFilter>, record: &Record) -> bool {
    let results: Vec<bool> = group
        .nodes()
        .filter_map(|node| match node {
            FilterNode::Leaf(filter) => Some(leaf_matches(filter, record)),
            FilterNode::Group(nested) if nested.is_empty() => None,
            FilterNode::Group(nested) => Some(matches(nested, record)),
        })
        .collect();

    if results.is_empty() {
        return true;
    }
    match group.operator {
        GroupOperator::And => results.iter().all(|r| *r),
        GroupOperator::Or => results.iter().any(|r| *r),
    }
}

/// Records satisfying the tree, in their original order
pub fn filter_records<'a>(group: &FilterGroup<TypedFilter>, records: &'a [Record]) -> Vec<&'a Record> {
    let kept: Vec<&Record> = records.iter().filter(|r| matches(group, r)).collect();
    tracing::debug!(total = records.len(), kept = kept.len(), "Filtered records");
    kept
}

fn leaf_matches(filter: &TypedFilter, record: &Record) -> bool {
    let actual = record.get(&filter.field).filter(|v| !v.is_null());
    let (actual, expected) = match (filter.operator, actual, filter.value.as_ref()) {
        (Operator::IsNull, actual, _) => return actual.is_none(),
        (Operator::IsNotNull, actual, _) => return actual.is_some(),
        (_, Some(actual), Some(expected)) => (actual, expected),
        _ => return false,
    };

    match filter.operator {
        Operator::Eq => compare(actual, expected) == Some(Ordering::Equal),
        Operator::Neq => matches!(compare(actual, expected), Some(o) if o != Ordering::Equal),
        Operator::Gt => compare(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::In => list(expected)
            .iter()
            .any(|item| compare(actual, item) == Some(Ordering::Equal)),
        Operator::Nin => list(expected)
            .iter()
            .all(|item| matches!(compare(actual, item), Some(o) if o != Ordering::Equal)),
        Operator::Like => text_pair(actual, expected)
            .is_some_and(|(text, pattern)| like_matches(pattern, text, false)),
        Operator::Ilike => text_pair(actual, expected)
            .is_some_and(|(text, pattern)| like_matches(pattern, text, true)),
        Operator::Contains => text_pair(actual, expected).is_some_and(|(text, needle)| {
            text.to_lowercase().contains(&needle.to_lowercase())
        }),
        Operator::IsNull | Operator::IsNotNull => false,
    }
}

fn list(value: &TypedValue) -> &[TypedValue] {
    match value {
        TypedValue::List(items) => items,
        other => std::slice::from_ref(other),
    }
}

fn text_pair<'a>(actual: &'a Value, expected: &'a TypedValue) -> Option<(&'a str, &'a str)> {
    match (actual, expected) {
        (Value::String(text), TypedValue::Text(pattern)) => Some((text.as_str(), pattern.as_str())),
        _ => None,
    }
}

/// Order a record value against a coerced value of the field's type
fn compare(actual: &Value, expected: &TypedValue) -> Option<Ordering> {
    match expected {
        TypedValue::Text(s) => actual.as_str().map(|a| a.cmp(s.as_str())),
        TypedValue::Integer(i) => match actual.as_i64() {
            Some(a) => Some(a.cmp(i)),
            None => actual.as_f64()?.partial_cmp(&(*i as f64)),
        },
        TypedValue::Float(f) => actual.as_f64()?.partial_cmp(f),
        TypedValue::Boolean(b) => actual.as_bool().map(|a| a.cmp(b)),
        TypedValue::Uuid(u) => {
            let a: Uuid = parse_uuid(actual.as_str()?)?;
            Some(a.cmp(u))
        }
        TypedValue::Timestamp(t) => Some(parse_timestamp(actual.as_str()?)?.cmp(t)),
        TypedValue::List(_) => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LikeToken {
    Literal(char),
    AnyOne,
    AnyMany,
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        tokens.push(match ch {
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            '%' => LikeToken::AnyMany,
            '_' => LikeToken::AnyOne,
            c => LikeToken::Literal(c),
        });
    }
    tokens
}

/// SQL LIKE matching with `%`, `_` and backslash escapes
fn like_matches(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (pattern, text) = if case_insensitive {
        (pattern.to_lowercase(), text.to_lowercase())
    } else {
        (pattern.to_string(), text.to_string())
    };
    let text: Vec<char> = text.chars().collect();

    // reachable[j]: the pattern consumed so far matches text[..j]
    let mut reachable = vec![false; text.len() + 1];
    reachable[0] = true;
    for token in like_tokens(&pattern) {
        let mut next = vec![false; text.len() + 1];
        match token {
            LikeToken::AnyMany => {
                let mut seen = false;
                for j in 0..=text.len() {
                    seen |= reachable[j];
                    next[j] = seen;
                }
            }
            LikeToken::AnyOne => {
                for j in 1..=text.len() {
                    next[j] = reachable[j - 1];
                }
            }
            LikeToken::Literal(c) => {
                for j in 1..=text.len() {
                    next[j] = reachable[j - 1] && text[j - 1] == c;
                }
            }
        }
        reachable = next;
    }
    reachable[text.len()]
}
