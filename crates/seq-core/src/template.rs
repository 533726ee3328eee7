//! The template resolver: a pure, total tree-walk over a params value and
//! the current context, recognizing the three reference forms described in
//! the sequence document grammar (`@col`, `${name}`, `${a.b.c}`). Never
//! fails — an unresolvable reference is simply omitted.

use crate::value::{is_blank, Context, Value, ITERATION_ROW};
use serde_json::Map;

/// Resolve an entire params tree against `ctx`. `resolve(resolve(v, ctx),
/// ctx) == resolve(v, ctx)` — every resolved leaf is either a literal
/// (passed through unchanged on a second pass) or has already been dropped.
pub fn resolve(value: &Value, ctx: &Context) -> Value {
    match value {
        Value::Object(map) => Value::Object(resolve_object(map, ctx)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| resolve_array_item(item, ctx)).collect())
        }
        other => resolve_field(other, ctx).unwrap_or(Value::Null),
    }
}

/// Mapping recursion: keys whose value resolves to "absent" are dropped
/// from the output entirely.
fn resolve_object(map: &Map<String, Value>, ctx: &Context) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        if let Some(resolved) = resolve_field(value, ctx) {
            out.insert(key.clone(), resolved);
        }
    }
    out
}

/// Sequence recursion: positions are always kept. An element that would
/// have been omitted as a mapping value instead becomes `null`.
fn resolve_array_item(value: &Value, ctx: &Context) -> Value {
    resolve_field(value, ctx).unwrap_or(Value::Null)
}

/// A value reached via a mapping key: may be omitted (`None`).
fn resolve_field(value: &Value, ctx: &Context) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => Some(Value::Object(resolve_object(map, ctx))),
        Value::Array(items) => {
            Some(Value::Array(items.iter().map(|item| resolve_array_item(item, ctx)).collect()))
        }
        Value::String(s) => resolve_string(s, ctx),
        other => Some(other.clone()),
    }
}

/// Handle a single string leaf: `@col`, `${...}`, or a literal.
fn resolve_string(s: &str, ctx: &Context) -> Option<Value> {
    if let Some(column) = s.strip_prefix('@') {
        resolve_column(column, ctx)
    } else if let Some(path) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        resolve_path(path, ctx)
    } else if s.trim().is_empty() {
        None
    } else {
        Some(Value::String(s.to_string()))
    }
}

/// `@col` — look up `col` in `context.iteration_row`.
fn resolve_column(column: &str, ctx: &Context) -> Option<Value> {
    let row = ctx.get(ITERATION_ROW)?.as_object()?;
    let value = row.get(column)?;
    if is_blank(value) {
        None
    } else {
        Some(value.clone())
    }
}

/// `${a.b.c}` (and the single-segment `${name}` case, which is just a path
/// of length one): descend from `ctx[a]` through each subsequent segment,
/// indexing into a mapping by key or a sequence by decimal integer. Any
/// failed step, or a final `null`, yields `None`.
fn resolve_path(path: &str, ctx: &Context) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = ctx.get(first)?.clone();
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?.clone(),
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?.clone()
            }
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with_row(row: Value) -> Context {
        let mut ctx = Context::new();
        ctx.insert(ITERATION_ROW.to_string(), row);
        ctx
    }

    #[test]
    fn at_reference_resolves_present_column() {
        let ctx = ctx_with_row(json!({"name": "A", "tag": "t1"}));
        let params = json!({"n": "@name", "t": "@tag"});
        assert_eq!(resolve(&params, &ctx), json!({"n": "A", "t": "t1"}));
    }

    #[test]
    fn at_reference_omits_missing_or_blank_column() {
        let ctx = ctx_with_row(json!({"name": "B"}));
        let params = json!({"n": "@name", "t": "@tag"});
        assert_eq!(resolve(&params, &ctx), json!({"n": "B"}));
    }

    #[test]
    fn dollar_reference_chains_through_nested_object() {
        let mut ctx = Context::new();
        ctx.insert("S1".to_string(), json!({"data": {"id": "xyz"}}));
        let params = json!({"id": "${S1.data.id}"});
        assert_eq!(resolve(&params, &ctx), json!({"id": "xyz"}));
    }

    #[test]
    fn dollar_reference_indexes_sequences() {
        let mut ctx = Context::new();
        ctx.insert("items".to_string(), json!({"list": ["a", "b", "c"]}));
        let params = json!({"second": "${items.list.1}"});
        assert_eq!(resolve(&params, &ctx), json!({"second": "b"}));
    }

    #[test]
    fn dollar_reference_omits_on_null_or_missing() {
        let mut ctx = Context::new();
        ctx.insert("S".to_string(), Value::Null);
        let params = json!({"a": "${S}", "b": "${missing}"});
        assert_eq!(resolve(&params, &ctx), json!({}));
    }

    #[test]
    fn literal_strings_pass_through_unless_blank() {
        let ctx = Context::new();
        let params = json!({"a": "literal", "b": ""});
        assert_eq!(resolve(&params, &ctx), json!({"a": "literal"}));
    }

    #[test]
    fn non_string_scalars_and_null_leaves() {
        let ctx = Context::new();
        let params = json!({"n": 42, "f": true, "z": Value::Null});
        assert_eq!(resolve(&params, &ctx), json!({"n": 42, "f": true}));
    }

    #[test]
    fn sequence_positions_are_kept_with_null_for_unresolved() {
        let ctx = Context::new();
        let params = json!({"list": ["literal", "${missing}", 3]});
        assert_eq!(resolve(&params, &ctx), json!({"list": ["literal", null, 3]}));
    }

    #[test]
    fn resolution_is_idempotent() {
        let ctx = ctx_with_row(json!({"name": "A"}));
        let params = json!({"n": "@name", "nested": {"x": "${missing}"}});
        let once = resolve(&params, &ctx);
        let twice = resolve(&once, &ctx);
        assert_eq!(once, twice);
    }
}
