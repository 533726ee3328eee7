//! The validated, immutable sequence plan. Built by `seq-io::sequence_loader`
//! from the raw JSON document; never mutated once loaded.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Parsed but currently advisory: control flow does not consult this field
/// (distilled spec §9 — preserved for forward compatibility, `Global` is the
/// effective behavior everywhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationScope {
    Global,
    Local,
}

impl Default for IterationScope {
    fn default() -> Self {
        Self::Global
    }
}

/// `{local_key, context_key}`. Empty strings mean "no-op" — the join simply
/// returns its input unchanged (see `transform::apply_join`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinSpec {
    #[serde(default)]
    pub local_key: String,
    #[serde(default)]
    pub context_key: String,
}

impl JoinSpec {
    pub fn is_noop(&self) -> bool {
        self.local_key.is_empty() || self.context_key.is_empty()
    }
}

/// `{field, operator, value}`. An empty `field` means "always true" (see
/// `condition::evaluate`), so a `ConditionSpec::default()` is itself a
/// faithful stand-in for "no condition configured".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSpec {
    #[serde(default)]
    pub field: String,
    #[serde(default = "default_operator")]
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

fn default_operator() -> String {
    "==".to_string()
}

impl Default for ConditionSpec {
    fn default() -> Self {
        Self {
            field: String::new(),
            operator: default_operator(),
            value: Value::Null,
        }
    }
}

impl ConditionSpec {
    pub fn is_noop(&self) -> bool {
        self.field.is_empty()
    }
}

/// One declarative unit of work. Immutable after load; `enabled: false`
/// steps never make it this far (dropped at load time, see
/// `seq-io::sequence_loader`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_name: String,
    pub operation: String,
    pub params: Value,
    pub graphql_query: String,
    pub wait_seconds: f64,
    pub store_result_as: String,
    pub iterate_over: String,
    pub iteration_scope: IterationScope,
    pub data_source_file: String,
    pub join_on: JoinSpec,
    pub filter_by: Map<String, Value>,
    pub condition: ConditionSpec,
}

impl Step {
    pub fn iterates(&self) -> bool {
        !self.iterate_over.is_empty()
    }
}

/// `{master_data_source, master_iterate_over, steps}`, fully normalized and
/// filtered. Immutable once returned by the loader.
#[derive(Debug, Clone, Default)]
pub struct SequencePlan {
    pub master_data_source: String,
    pub master_iterate_over: String,
    pub steps: Vec<Step>,
}

impl SequencePlan {
    pub fn has_master_iteration(&self) -> bool {
        !self.master_iterate_over.is_empty()
    }
}
