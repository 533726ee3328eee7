//! Loads a sequence document (the declarative unit of work) from disk.
//!
//! The document is walked as a raw [`serde_json::Value`] rather than derived
//! in one shot with `#[derive(Deserialize)]` on [`seq_core::Step`]: every
//! field has its own fallback (a missing `wait_seconds` is `1.0`, a missing
//! `step_name` is a positional `step_N`, computed from the position *before*
//! disabled steps are dropped), and `serde(default)` cannot express the
//! positional fallback on its own.

use seq_core::{ConditionSpec, EngineError, IterationScope, JoinSpec, SequencePlan, Step, Value};
use serde_json::Map;
use std::path::{Path, PathBuf};

pub fn load(path: &Path) -> Result<SequencePlan, EngineError> {
    if !path.exists() {
        return Err(EngineError::InputNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| malformed(path, e))?;
    let doc: Value = serde_json::from_str(&text).map_err(|e| malformed(path, e))?;
    let doc = doc.as_object().ok_or_else(|| {
        EngineError::SpecInvalid("sequence document must be a JSON object".to_string())
    })?;

    let master_data_source = string_field(doc, "master_data_source");
    let master_iterate_over = string_field(doc, "master_iterate_over");

    let raw_steps = doc
        .get("sequence")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| EngineError::SpecInvalid("sequence document is missing a 'sequence' array".to_string()))?;

    let mut steps = Vec::new();
    for (idx, raw) in raw_steps.iter().enumerate() {
        let Some(raw) = raw.as_object() else {
            return Err(EngineError::SpecInvalid(format!(
                "sequence[{idx}] must be a JSON object"
            )));
        };
        let enabled = raw.get("enabled").and_then(Value::as_bool).unwrap_or(true);
        if !enabled {
            continue;
        }
        steps.push(parse_step(raw, idx + 1)?);
    }

    Ok(SequencePlan { master_data_source, master_iterate_over, steps })
}

fn parse_step(raw: &Map<String, Value>, position: usize) -> Result<Step, EngineError> {
    let operation = string_field(raw, "operation");
    if operation.is_empty() {
        return Err(EngineError::SpecInvalid(format!(
            "step at position {position} is missing required field 'operation'"
        )));
    }

    let step_name = match raw.get("step_name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("step_{position}"),
    };

    let iteration_scope = match raw.get("iteration_scope").and_then(Value::as_str) {
        Some("local") => IterationScope::Local,
        _ => IterationScope::Global,
    };

    let join_on = raw
        .get("join_on")
        .and_then(|v| serde_json::from_value::<JoinSpec>(v.clone()).ok())
        .unwrap_or_default();

    let condition = raw
        .get("condition")
        .and_then(|v| serde_json::from_value::<ConditionSpec>(v.clone()).ok())
        .unwrap_or_default();

    let filter_by = raw.get("filter_by").and_then(Value::as_object).cloned().unwrap_or_default();

    Ok(Step {
        step_name,
        operation,
        params: raw.get("params").cloned().unwrap_or_else(|| Value::Object(Map::new())),
        graphql_query: string_field(raw, "graphql_query"),
        wait_seconds: raw.get("wait_seconds").and_then(Value::as_f64).unwrap_or(1.0),
        store_result_as: string_field(raw, "store_result_as"),
        iterate_over: string_field(raw, "iterate_over"),
        iteration_scope,
        data_source_file: string_field(raw, "data_source_file"),
        join_on,
        filter_by,
        condition,
    })
}

fn string_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn malformed(path: &Path, source: impl std::fmt::Display) -> EngineError {
    EngineError::InputMalformed { path: PathBuf::from(path), source: source.to_string() }
}
