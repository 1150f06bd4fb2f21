//! SQL fragment compilation
//!
//! Turns coerced filters into PostgreSQL WHERE fragments. Values never
//! appear in the SQL text: each one becomes a `$n` placeholder and an entry
//! in `params`. The only schema-controlled text in the output is the column
//! name, which schema construction restricts to plain identifiers.
//!
//! The placeholder counter is passed in and handed back through
//! `CompiledFilter::next_param_index`, so separately compiled fragments can
//! share one parameter list:
//!
//! ```ignore
//! let tenant = compile_group(&tenant_filters, 1)?;
//! let user = compile_group(&user_filters, tenant.next_param_index)?;
//! ```

use crate::error::FilterError;
use crate::sql::{contains_pattern, placeholder};
use crate::types::{CompiledFilter, FilterGroup, Operator, TypedFilter, TypedValue};

/// Collects SQL parameters during compilation (maintains insertion order)
#[derive(Debug)]
struct SqlParams {
    values: Vec<TypedValue>,
    next_index: usize,
}

impl SqlParams {
    fn starting_at(index: usize) -> Self {
        Self {
            values: Vec::new(),
            next_index: index.max(1),
        }
    }

    /// Record a value and return its placeholder
    fn push(&mut self, value: TypedValue) -> String {
        let ph = placeholder(self.next_index);
        self.values.push(value);
        self.next_index += 1;
        ph
    }

    fn finish(self, sql: String) -> CompiledFilter {
        CompiledFilter {
            sql,
            params: self.values,
            next_param_index: self.next_index,
        }
    }
}

/// Compile one leaf. `next_param_index` is the first placeholder number to
/// use (values below 1 are treated as 1).
pub fn compile_filter(
    filter: &TypedFilter,
    next_param_index: usize,
) -> Result<CompiledFilter, FilterError> {
    let mut params = SqlParams::starting_at(next_param_index);
    let sql = leaf_sql(filter, &mut params)?;
    Ok(params.finish(sql))
}

/// Compile a tree: leaves joined by the group operator, nested groups
/// wrapped in parentheses. An empty group yields an empty fragment.
///
/// The top-level group itself is not parenthesized. Embed an `OR` fragment
/// next to other conditions with `CompiledFilter::parenthesized`.
pub fn compile_group(
    group: &FilterGroup<TypedFilter>,
    next_param_index: usize,
) -> Result<CompiledFilter, FilterError> {
    let mut params = SqlParams::starting_at(next_param_index);
    let sql = group_sql(group, &mut params)?;
    let compiled = params.finish(sql);
    tracing::debug!(
        params = compiled.params.len(),
        next_param_index = compiled.next_param_index,
        "Compiled filter group"
    );
    Ok(compiled)
}

fn group_sql(group: &FilterGroup<TypedFilter>, params: &mut SqlParams) -> Result<String, FilterError> {
    let mut parts = Vec::with_capacity(group.filters.len() + group.groups.len());
    for filter in &group.filters {
        parts.push(leaf_sql(filter, params)?);
    }
    for nested in &group.groups {
        let sql = group_sql(nested, params)?;
        if !sql.is_empty() {
            parts.push(format!("({})", sql));
        }
    }
    let separator = format!(" {} ", group.operator.keyword());
    Ok(parts.join(separator.as_str()))
}

/// SQL keyword for each operator; list operators take a parenthesized array
fn sql_keyword(op: Operator) -> &'static str {
    match op {
        Operator::Eq => "=",
        Operator::Neq => "!=",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        Operator::In => "= ANY",
        Operator::Nin => "!= ALL",
        Operator::Like => "LIKE",
        Operator::Ilike | Operator::Contains => "ILIKE",
        Operator::IsNull => "IS NULL",
        Operator::IsNotNull => "IS NOT NULL",
    }
}

fn leaf_sql(filter: &TypedFilter, params: &mut SqlParams) -> Result<String, FilterError> {
    let col = &filter.column;
    let keyword = sql_keyword(filter.operator);
    if filter.operator.is_null_check() {
        return Ok(format!("{} {}", col, keyword));
    }

    let value = filter.value.clone().ok_or_else(|| {
        FilterError::invalid_format(format!(
            "Operator '{}' on field '{}' requires a value",
            filter.operator, filter.field
        ))
        .with_field(&filter.field)
    })?;

    let sql = match (filter.operator, value) {
        (Operator::In | Operator::Nin, list @ TypedValue::List(_)) => {
            format!("{} {}({})", col, keyword, params.push(list))
        }
        (Operator::In | Operator::Nin, _) => {
            return Err(FilterError::invalid_in(&filter.field, filter.operator.as_str()));
        }
        (Operator::Contains, value) => {
            let pattern = contains_pattern(&value.to_string());
            format!("{} {} {}", col, keyword, params.push(TypedValue::Text(pattern)))
        }
        (_, value) => format!("{} {} {}", col, keyword, params.push(value)),
    };
    tracing::trace!(field = %filter.field, operator = %filter.operator, "Compiled filter");
    Ok(sql)
}
