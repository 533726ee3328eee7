//! The dataset transformer: join and filter a dataset against the current
//! context before an iterating step runs over it. Both operations are pure
//! — they never mutate their input and always preserve record order.

use crate::plan::JoinSpec;
use crate::value::{is_blank, Context, Dataset, Value, ITERATION_ROW};
use serde_json::Map;

/// Keep only the records whose `local_key` column equals
/// `context.iteration_row[context_key]`. A no-op join descriptor, or a
/// missing/empty context value, returns the dataset unchanged.
pub fn apply_join(dataset: &Dataset, join: &JoinSpec, ctx: &Context) -> Dataset {
    if join.is_noop() {
        return dataset.clone();
    }
    let Some(row) = ctx.get(ITERATION_ROW).and_then(Value::as_object) else {
        return dataset.clone();
    };
    let Some(context_value) = row.get(&join.context_key) else {
        return dataset.clone();
    };
    if is_blank(context_value) {
        return dataset.clone();
    }
    dataset
        .iter()
        .filter(|record| record.get(&join.local_key) == Some(context_value))
        .cloned()
        .collect()
}

/// For each `(column, expr)` pair, narrow the dataset to records whose
/// `column` equals the resolved expression value. A `${name}` expression is
/// resolved against `iteration_row` first, falling back to the context; if
/// it is unresolvable or blank, that clause is skipped entirely rather than
/// filtering everything out. Any other expression is used as a literal.
pub fn apply_filter(dataset: &Dataset, filter: &Map<String, Value>, ctx: &Context) -> Dataset {
    let mut out = dataset.clone();
    for (column, expr) in filter {
        match expr {
            Value::String(s) if s.starts_with("${") && s.ends_with('}') => {
                let name = &s[2..s.len() - 1];
                if let Some(value) = resolve_filter_reference(name, ctx) {
                    out.retain(|record| record.get(column) == Some(&value));
                }
            }
            literal => out.retain(|record| record.get(column) == Some(literal)),
        }
    }
    out
}

fn resolve_filter_reference(name: &str, ctx: &Context) -> Option<Value> {
    let from_row = ctx
        .get(ITERATION_ROW)
        .and_then(Value::as_object)
        .and_then(|row| row.get(name))
        .filter(|v| !is_blank(v));
    if let Some(value) = from_row {
        return Some(value.clone());
    }
    ctx.get(name).filter(|v| !is_blank(v)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> Dataset {
        vec![
            serde_json::from_value(json!({"site": "A", "role": "edge"})).unwrap(),
            serde_json::from_value(json!({"site": "A", "role": "core"})).unwrap(),
            serde_json::from_value(json!({"site": "B", "role": "edge"})).unwrap(),
        ]
    }

    fn ctx_with_row(row: Value) -> Context {
        let mut ctx = Context::new();
        ctx.insert(ITERATION_ROW.to_string(), row);
        ctx
    }

    #[test]
    fn join_then_filter_narrows_to_one_record() {
        let ds = dataset();
        let ctx = ctx_with_row(json!({"name": "A"}));
        let join = JoinSpec { local_key: "site".to_string(), context_key: "name".to_string() };
        let joined = apply_join(&ds, &join, &ctx);
        assert_eq!(joined.len(), 2);

        let mut filter = Map::new();
        filter.insert("role".to_string(), json!("edge"));
        let filtered = apply_filter(&joined, &filter, &ctx);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].get("site").unwrap(), "A");
        assert_eq!(filtered[0].get("role").unwrap(), "edge");
    }

    #[test]
    fn join_is_noop_without_context_value() {
        let ds = dataset();
        let join = JoinSpec { local_key: "site".to_string(), context_key: "name".to_string() };
        let unchanged = apply_join(&ds, &join, &Context::new());
        assert_eq!(unchanged.len(), ds.len());
    }

    #[test]
    fn filter_skips_unresolvable_reference_clause() {
        let ds = dataset();
        let mut filter = Map::new();
        filter.insert("role".to_string(), json!("${missing}"));
        let out = apply_filter(&ds, &filter, &Context::new());
        assert_eq!(out.len(), ds.len());
    }

    #[test]
    fn transformers_never_invent_records() {
        let ds = dataset();
        let mut filter = Map::new();
        filter.insert("role".to_string(), json!("core"));
        let out = apply_filter(&ds, &filter, &Context::new());
        assert!(out.iter().all(|r| ds.contains(r)));
    }
}
