//! The condition evaluator: a pure predicate over a [`ConditionSpec`] and a
//! [`Context`]. Preserves two source quirks deliberately, per distilled
//! spec §9: `contains` is asymmetric (`value in str(field)`, not the other
//! way around), and an unknown operator fails open (`true`), logged as a
//! warning rather than surfaced as an error.

use crate::plan::ConditionSpec;
use crate::value::{is_blank, Context, Value, ITERATION_ROW};
use tracing::warn;

pub fn evaluate(condition: &ConditionSpec, ctx: &Context) -> bool {
    if condition.is_noop() {
        return true;
    }

    let Some(field_value) = resolve_field(&condition.field, ctx) else {
        return false;
    };
    let compare_value = resolve_compare_value(&condition.value, ctx);

    match condition.operator.as_str() {
        "==" => field_value == compare_value,
        "!=" => field_value != compare_value,
        "in" => compare_value.as_array().is_some_and(|items| items.contains(&field_value)),
        "not_in" => compare_value.as_array().is_some_and(|items| !items.contains(&field_value)),
        "contains" => stringify(&field_value).contains(&stringify(&compare_value)),
        other => {
            warn!(operator = other, "unknown condition operator, failing open to true");
            true
        }
    }
}

/// `field`: `@col` reads `iteration_row`, `${name}` reads the context
/// directly (no dotted descent — the source only ever does a flat
/// `context.get(name)` for condition fields), anything else is the literal
/// field string itself. An unresolvable `@`/`${}` reference is the only case
/// that makes the whole condition `false`.
fn resolve_field(field: &str, ctx: &Context) -> Option<Value> {
    if let Some(column) = field.strip_prefix('@') {
        let row = ctx.get(ITERATION_ROW)?.as_object()?;
        row.get(column).cloned()
    } else if let Some(name) = field.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        ctx.get(name).cloned()
    } else {
        Some(Value::String(field.to_string()))
    }
}

/// `value`, when a string starting with `@`, is resolved from
/// `iteration_row`; if unresolvable it falls back to the *raw* `@column`
/// string (not stripped of its prefix) — matching the source's behavior of
/// comparing against the literal token when the column isn't present.
fn resolve_compare_value(value: &Value, ctx: &Context) -> Value {
    if let Value::String(s) = value {
        if let Some(column) = s.strip_prefix('@') {
            if let Some(row) = ctx.get(ITERATION_ROW).and_then(Value::as_object) {
                if let Some(found) = row.get(column) {
                    if !is_blank(found) {
                        return found.clone();
                    }
                }
            }
        }
    }
    value.clone()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
