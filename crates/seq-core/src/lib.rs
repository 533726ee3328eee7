//! # seq-core
//!
//! Core traits, types, and the execution engine for the sequence orchestrator.
//!
//! This crate knows nothing about the filesystem or the network: it defines
//! the domain model (`Step`, `SequencePlan`, `Context`), the pure template
//! resolver and condition evaluator, the join/filter transformer, and the
//! `Orchestrator` that drives a plan against whatever `Transport` and
//! `DatasetLoader` implementations are handed to it.
//!
//! Concrete I/O (CSV files, the GraphQL HTTP client, the INI config file)
//! lives in `seq-io`; wiring them together lives in the `seq-cli` binary.

pub mod cancel;
pub mod condition;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod result;
pub mod template;
pub mod transform;
pub mod value;

pub use cancel::CancelFlag;
pub use error::{EngineError, StepError};
pub use orchestrator::{DatasetLoader, Orchestrator, Transport};
pub use plan::{ConditionSpec, IterationScope, JoinSpec, SequencePlan, Step};
pub use result::{StepOutcome, StepStatus};
pub use value::{Context, Dataset, Record, Value};
