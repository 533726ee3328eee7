//! The dynamic value model shared by records, datasets, and the execution
//! context.
//!
//! The source system this engine is modeled on relies on dynamic
//! string-keyed mappings for both CSV rows and the execution context. Rather
//! than invent a bespoke tagged union, `serde_json::Value` already is that
//! union (`Null`, `Bool`, `Number`, `String`, `Array`, `Object`), and every
//! resolver/condition/transform path in this crate pattern-matches it
//! directly.

/// A single scalar, sequence, or mapping value flowing through the engine.
pub type Value = serde_json::Value;

/// One row of an input dataset: an ordered mapping from column name to
/// value. Empty-string CSV fields are never stored here (see
/// `seq-io::csv_loader`) — an absent key *is* the empty value.
pub type Record = serde_json::Map<String, Value>;

/// A finite ordered sequence of records, in file order.
pub type Dataset = Vec<Record>;

/// The mutable execution context threaded through step execution. Holds
/// `store_result_as` bindings plus the transient `iteration_row` /
/// `iteration_index` keys while a batch or row is being processed.
pub type Context = serde_json::Map<String, Value>;

pub const ITERATION_ROW: &str = "iteration_row";
pub const ITERATION_INDEX: &str = "iteration_index";

/// True for `Value::Null` and for strings that are empty after trimming.
/// Used throughout the resolver, condition evaluator, and transformer to
/// decide whether a looked-up value counts as "present".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
