//! The orchestrator: owns the execution context, drives master iteration,
//! per-step iteration, conditional gating, result storage, and pacing.
//!
//! Strictly sequential by contract (distilled spec §5): every transport call
//! and every inter-step sleep is awaited to completion before the next step
//! is considered, so later steps always observe every context mutation made
//! by earlier ones.

use crate::cancel::CancelFlag;
use crate::condition;
use crate::error::{EngineError, StepError};
use crate::plan::{SequencePlan, Step};
use crate::result::{StepOutcome, StepStatus};
use crate::template;
use crate::transform;
use crate::value::{Context, Dataset, Value, ITERATION_INDEX, ITERATION_ROW};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The GraphQL transport seam. Implemented against `reqwest` in `seq-io`;
/// implemented by hand with a closure in tests (see below) — the trait is
/// small enough that a mock framework would add more ceremony than it saves.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, StepError>;
}

/// The dataset-loading seam. Implemented against the `csv` crate in
/// `seq-io`.
pub trait DatasetLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Dataset, EngineError>;
}

pub struct Orchestrator {
    transport: Box<dyn Transport>,
    loader: Box<dyn DatasetLoader>,
    account_id: String,
    context: Context,
    data_sources: HashMap<String, Dataset>,
}

impl Orchestrator {
    pub fn new(
        transport: Box<dyn Transport>,
        loader: Box<dyn DatasetLoader>,
        account_id: impl Into<String>,
        preloaded: HashMap<String, Dataset>,
    ) -> Self {
        Self {
            transport,
            loader,
            account_id: account_id.into(),
            context: Context::new(),
            data_sources: preloaded,
        }
    }

    /// Drive the whole plan. Fatal errors (distilled spec §7: a missing
    /// referenced dataset, a missing `graphql_query`, a missing master
    /// dataset) abort the run; per-step failures are recorded and do not.
    ///
    /// `cancel` is checked between steps, iterations, and master batches; on
    /// trip, the run stops before starting the next unit of work and
    /// returns the partial result list collected so far rather than
    /// aborting, so the caller can still flush it to the sinks.
    pub async fn run(
        &mut self,
        plan: &SequencePlan,
        cancel: &CancelFlag,
    ) -> Result<Vec<StepOutcome>, EngineError> {
        if plan.has_master_iteration() {
            self.run_master_iteration(plan, cancel).await
        } else {
            self.run_steps(&plan.steps, cancel).await
        }
    }

    async fn run_master_iteration(
        &mut self,
        plan: &SequencePlan,
        cancel: &CancelFlag,
    ) -> Result<Vec<StepOutcome>, EngineError> {
        let master_name = &plan.master_iterate_over;

        if !self.data_sources.contains_key(master_name) && !plan.master_data_source.is_empty() {
            let path = Path::new(&plan.master_data_source);
            if path.exists() {
                let dataset = self.loader.load(path)?;
                info!(dataset = %master_name, rows = dataset.len(), "loaded master dataset");
                self.data_sources.insert(master_name.clone(), dataset);
            }
        }

        let dataset = self
            .data_sources
            .get(master_name)
            .ok_or_else(|| {
                EngineError::SpecInvalid(format!("master dataset '{master_name}' not found"))
            })?
            .clone();

        let mut results = Vec::new();
        let total = dataset.len();
        for (idx, row) in dataset.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!("cancellation requested, stopping before next master batch");
                break;
            }
            info!(batch = idx + 1, total, "starting master batch");
            self.context.insert(ITERATION_ROW.to_string(), Value::Object(row));
            self.context.insert(ITERATION_INDEX.to_string(), Value::from(idx + 1));
            let batch_results = self.run_steps(&plan.steps, cancel).await?;
            results.extend(batch_results);
        }
        Ok(results)
    }

    async fn run_steps(
        &mut self,
        steps: &[Step],
        cancel: &CancelFlag,
    ) -> Result<Vec<StepOutcome>, EngineError> {
        let mut results = Vec::new();
        let total = steps.len();
        for (position, step) in steps.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("cancellation requested, stopping before next step");
                break;
            }
            debug!(step = %step.step_name, position = position + 1, total, "evaluating step");

            if !step.iterates() && !condition::evaluate(&step.condition, &self.context) {
                info!(step = %step.step_name, "condition not satisfied, skipping step");
                continue;
            }

            if step.iterates() {
                let mut step_results = self.run_iterating_step(step, cancel).await?;
                results.append(&mut step_results);
            } else {
                let ctx = self.context.clone();
                let outcome = self.execute_single(step, &ctx).await;
                let succeeded = outcome.is_success();
                if succeeded && !step.store_result_as.is_empty() {
                    if let Some(result) = &outcome.result {
                        self.context.insert(step.store_result_as.clone(), result.clone());
                    }
                }
                results.push(outcome);
                if succeeded && step.wait_seconds > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(step.wait_seconds)).await;
                }
            }
        }
        Ok(results)
    }

    async fn run_iterating_step(
        &mut self,
        step: &Step,
        cancel: &CancelFlag,
    ) -> Result<Vec<StepOutcome>, EngineError> {
        if !step.data_source_file.is_empty() {
            let path = Path::new(&step.data_source_file);
            if path.exists() {
                let dataset = self.loader.load(path)?;
                self.data_sources.insert(step.iterate_over.clone(), dataset);
            }
        }

        let dataset = self
            .data_sources
            .get(&step.iterate_over)
            .ok_or_else(|| {
                EngineError::SpecInvalid(format!(
                    "data source '{}' not found for step '{}'",
                    step.iterate_over, step.step_name
                ))
            })?
            .clone();

        let dataset = transform::apply_join(&dataset, &step.join_on, &self.context);
        let dataset = transform::apply_filter(&dataset, &step.filter_by, &self.context);

        let mut results = Vec::new();
        let total = dataset.len();
        for (idx, row) in dataset.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(step = %step.step_name, "cancellation requested, stopping before next row");
                break;
            }
            let mut iter_ctx = self.context.clone();
            iter_ctx.insert(ITERATION_ROW.to_string(), Value::Object(row));
            iter_ctx.insert(ITERATION_INDEX.to_string(), Value::from(idx + 1));

            if !condition::evaluate(&step.condition, &iter_ctx) {
                info!(step = %step.step_name, row = idx + 1, "condition not satisfied, skipping row");
                continue;
            }

            let outcome = self.execute_single(step, &iter_ctx).await;
            let succeeded = outcome.is_success();
            if succeeded && !step.store_result_as.is_empty() {
                if let Some(result) = &outcome.result {
                    self.context.insert(step.store_result_as.clone(), result.clone());
                }
            }
            results.push(outcome);

            if succeeded && idx + 1 < total && step.wait_seconds > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(step.wait_seconds)).await;
            }
        }
        Ok(results)
    }

    /// Resolve params, inject `accountId`, and issue the call. Failure never
    /// writes `store_result_as` and never aborts the run.
    async fn execute_single(&self, step: &Step, ctx: &Context) -> StepOutcome {
        let mut resolved = template::resolve(&step.params, ctx);
        if let Value::Object(map) = &mut resolved {
            map.insert("accountId".to_string(), Value::String(self.account_id.clone()));
        }

        let timestamp = chrono::Utc::now().to_rfc3339();

        if step.graphql_query.is_empty() {
            warn!(step = %step.step_name, "step has no graphql_query");
            return StepOutcome {
                step_name: step.step_name.clone(),
                operation: step.operation.clone(),
                status: StepStatus::Error,
                result: None,
                error: Some(format!("no graphql_query for step '{}'", step.step_name)),
                params: resolved,
                timestamp,
            };
        }

        match self.transport.execute(&step.graphql_query, resolved.clone()).await {
            Ok(body) => StepOutcome {
                step_name: step.step_name.clone(),
                operation: step.operation.clone(),
                status: StepStatus::Success,
                result: Some(body),
                error: None,
                params: resolved,
                timestamp,
            },
            Err(err) => StepOutcome {
                step_name: step.step_name.clone(),
                operation: step.operation.clone(),
                status: StepStatus::Error,
                result: None,
                error: Some(err.to_string()),
                params: resolved,
                timestamp,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ConditionSpec, IterationScope, JoinSpec};
    use serde_json::json;
    use std::sync::Mutex;

    /// A hand-written mock transport: records every call it received and
    /// returns canned responses keyed by call order.
    struct MockTransport {
        responses: Mutex<Vec<Result<Value, StepError>>>,
        calls: Mutex<Vec<Value>>,
    }

    impl MockTransport {
        fn new(responses: Vec<Result<Value, StepError>>) -> Self {
            Self { responses: Mutex::new(responses), calls: Mutex::new(Vec::new()) }
        }

        fn calls(&self) -> Vec<Value> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn execute(&self, _query: &str, variables: Value) -> Result<Value, StepError> {
            self.calls.lock().unwrap().push(variables);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(json!({}))
            } else {
                responses.remove(0)
            }
        }
    }

    struct NoopLoader;
    impl DatasetLoader for NoopLoader {
        fn load(&self, _path: &Path) -> Result<Dataset, EngineError> {
            Ok(Vec::new())
        }
    }

    fn base_step(name: &str) -> Step {
        Step {
            step_name: name.to_string(),
            operation: "op".to_string(),
            params: json!({}),
            graphql_query: "query Q { ok }".to_string(),
            wait_seconds: 0.0,
            store_result_as: String::new(),
            iterate_over: String::new(),
            iteration_scope: IterationScope::Global,
            data_source_file: String::new(),
            join_on: JoinSpec::default(),
            filter_by: Default::default(),
            condition: ConditionSpec::default(),
        }
    }

    fn record(json: Value) -> crate::value::Record {
        serde_json::from_value(json).unwrap()
    }

    // S1 — simple single step
    #[tokio::test]
    async fn single_step_injects_account_id() {
        let transport = MockTransport::new(vec![Ok(json!({"data": {"ok": true}}))]);
        let mut orch = Orchestrator::new(
            Box::new(transport),
            Box::new(NoopLoader),
            "ACC1",
            HashMap::new(),
        );
        let mut step = base_step("s1");
        step.params = json!({"x": "k"});
        let plan = SequencePlan { master_data_source: String::new(), master_iterate_over: String::new(), steps: vec![step] };

        let results = orch.run(&plan, &CancelFlag::new()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
        assert_eq!(results[0].params, json!({"x": "k", "accountId": "ACC1"}));
    }

    // S2 — @ reference across a master batch
    #[tokio::test]
    async fn at_reference_omits_blank_csv_field_per_batch() {
        let mut preloaded = HashMap::new();
        preloaded.insert(
            "rows".to_string(),
            vec![
                record(json!({"name": "A", "tag": "t1"})),
                record(json!({"name": "B"})),
            ],
        );

        let transport = MockTransport::new(vec![Ok(json!({})), Ok(json!({}))]);
        let mut orch = Orchestrator::new(Box::new(transport), Box::new(NoopLoader), "X", preloaded);

        let mut step = base_step("s2");
        step.params = json!({"n": "@name", "t": "@tag"});
        let plan = SequencePlan {
            master_data_source: String::new(),
            master_iterate_over: "rows".to_string(),
            steps: vec![step],
        };

        let results = orch.run(&plan, &CancelFlag::new()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].params, json!({"n": "A", "t": "t1", "accountId": "X"}));
        assert_eq!(results[1].params, json!({"n": "B", "accountId": "X"}));
    }

    // S3 — ${var} chaining between steps
    #[tokio::test]
    async fn dollar_reference_chains_stored_result() {
        let transport = MockTransport::new(vec![
            Ok(json!({"data": {"id": "xyz"}})),
            Ok(json!({"data": {}})),
        ]);
        let mut orch = Orchestrator::new(Box::new(transport), Box::new(NoopLoader), "X", HashMap::new());

        let mut step1 = base_step("s1");
        step1.store_result_as = "S1".to_string();
        let mut step2 = base_step("s2");
        step2.params = json!({"id": "${S1.data.id}"});

        let plan = SequencePlan {
            master_data_source: String::new(),
            master_iterate_over: String::new(),
            steps: vec![step1, step2],
        };
        let results = orch.run(&plan, &CancelFlag::new()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].params, json!({"id": "xyz", "accountId": "X"}));
    }

    // S4 — condition skip
    #[tokio::test]
    async fn condition_skip_suppresses_call() {
        let mut preloaded = HashMap::new();
        preloaded.insert("rows".to_string(), vec![record(json!({"region": "us"}))]);

        let transport = MockTransport::new(vec![]);
        let mut orch = Orchestrator::new(Box::new(transport), Box::new(NoopLoader), "X", preloaded);

        let mut step = base_step("gated");
        step.condition = ConditionSpec { field: "@region".to_string(), operator: "==".to_string(), value: json!("eu") };

        let plan = SequencePlan {
            master_data_source: String::new(),
            master_iterate_over: "rows".to_string(),
            steps: vec![step],
        };
        let results = orch.run(&plan, &CancelFlag::new()).await.unwrap();
        assert_eq!(results.len(), 0);
    }

    // S5 — join + filter
    #[tokio::test]
    async fn join_and_filter_narrow_to_single_call() {
        let transport = MockTransport::new(vec![Ok(json!({}))]);
        let mut preloaded = HashMap::new();
        preloaded.insert(
            "sites".to_string(),
            vec![
                record(json!({"site": "A", "role": "edge"})),
                record(json!({"site": "A", "role": "core"})),
                record(json!({"site": "B", "role": "edge"})),
            ],
        );
        let mut step = base_step("iter");
        step.iterate_over = "sites".to_string();
        step.join_on = JoinSpec { local_key: "site".to_string(), context_key: "name".to_string() };
        let mut filter_by = serde_json::Map::new();
        filter_by.insert("role".to_string(), json!("edge"));
        step.filter_by = filter_by;

        let plan = SequencePlan {
            master_data_source: String::new(),
            master_iterate_over: "outer".to_string(),
            steps: vec![step],
        };
        preloaded.insert("outer".to_string(), vec![record(json!({"name": "A"}))]);

        let mut orch = Orchestrator::new(Box::new(transport), Box::new(NoopLoader), "X", preloaded);
        let results = orch.run(&plan, &CancelFlag::new()).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    // S6 — failure does not store
    #[tokio::test]
    async fn failure_does_not_store_result() {
        let transport = MockTransport::new(vec![
            Err(StepError::GraphQl { errors: json!([{"message": "nope"}]) }),
            Ok(json!({})),
        ]);
        let mut orch = Orchestrator::new(Box::new(transport), Box::new(NoopLoader), "X", HashMap::new());

        let mut step1 = base_step("s1");
        step1.store_result_as = "S".to_string();
        let mut step2 = base_step("s2");
        step2.params = json!({"v": "${S.whatever}"});

        let plan = SequencePlan {
            master_data_source: String::new(),
            master_iterate_over: String::new(),
            steps: vec![step1, step2],
        };
        let results = orch.run(&plan, &CancelFlag::new()).await.unwrap();
        assert_eq!(results[0].status, StepStatus::Error);
        assert_eq!(results[1].params, json!({"accountId": "X"}));
    }
}
