//! The pipeline DAG executor: layers a `Pipeline` resource's steps by
//! dependency via Kahn's algorithm, then runs each layer's steps
//! concurrently on a `JoinSet`, cancelling everything still in flight the
//! moment any step fails (fail-fast).

use agentspec_core::{PipelineError, PipelineStep};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub name: String,
    pub status: StepStatus,
    pub error: Option<String>,
}

/// What runs one step. `agentspec-adapters`/`agentspec-mcp` supply the
/// concrete implementation (delegate to an agent, invoke a tool); this
/// trait is the seam so the executor never depends on either.
#[async_trait::async_trait]
pub trait StepRunner: Send + Sync {
    async fn run(&self, step: &PipelineStep) -> Result<(), String>;
}

/// Validate step names are unique and every `depends_on` target exists and
/// isn't the step itself, then partition the steps into dependency layers:
/// layer 0 has no dependencies, layer N depends only on layers `< N`.
pub fn layer_steps(steps: &[PipelineStep]) -> Result<Vec<Vec<PipelineStep>>, PipelineError> {
    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.name.clone()) {
            return Err(PipelineError::DuplicateStep(step.name.clone()));
        }
    }

    let names: HashSet<&str> = steps.iter().map(|s| s.name.as_str()).collect();
    for step in steps {
        for dep in &step.depends_on {
            if dep == &step.name {
                return Err(PipelineError::SelfDependency(step.name.clone()));
            }
            if !names.contains(dep.as_str()) {
                return Err(PipelineError::UnknownDependency {
                    step: step.name.clone(),
                    target: dep.clone(),
                });
            }
        }
    }

    let mut remaining: HashMap<String, PipelineStep> =
        steps.iter().map(|s| (s.name.clone(), s.clone())).collect();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let mut ready: Vec<String> = remaining
            .values()
            .filter(|s| s.depends_on.iter().all(|d| !remaining.contains_key(d)))
            .map(|s| s.name.clone())
            .collect();
        ready.sort();

        if ready.is_empty() {
            let mut cycle: Vec<String> = remaining.keys().cloned().collect();
            cycle.sort();
            return Err(PipelineError::Cycle(cycle));
        }

        let layer: Vec<PipelineStep> = ready.iter().map(|n| remaining.remove(n).unwrap()).collect();
        layers.push(layer);
    }

    Ok(layers)
}

/// Executes a pipeline's layered steps. Each layer runs fully concurrently
/// on a `JoinSet`; a failure in any step of a layer aborts every other
/// in-flight task in that layer and skips every later layer.
pub struct PipelineExecutor {
    runner: Arc<dyn StepRunner>,
}

impl PipelineExecutor {
    pub fn new(runner: Arc<dyn StepRunner>) -> Self {
        Self { runner }
    }

    pub async fn run(&self, steps: &[PipelineStep]) -> Result<(PipelineStatus, Vec<StepOutcome>), PipelineError> {
        let layers = layer_steps(steps)?;
        let mut outcomes = Vec::with_capacity(steps.len());
        let mut failed = false;

        for layer in layers {
            if failed {
                for step in layer {
                    outcomes.push(StepOutcome {
                        name: step.name,
                        status: StepStatus::Cancelled,
                        error: None,
                    });
                }
                continue;
            }

            let mut joinset: JoinSet<(String, Result<(), String>)> = JoinSet::new();
            let mut pending: HashSet<String> = HashSet::new();
            for step in &layer {
                let runner = self.runner.clone();
                let name = step.name.clone();
                pending.insert(name.clone());
                let step = step.clone();
                joinset.spawn(async move {
                    let result = runner.run(&step).await;
                    (name, result)
                });
            }

            let mut layer_failed = false;
            let mut aborted = false;
            while let Some(joined) = joinset.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => {
                        pending.remove(&name);
                        outcomes.push(StepOutcome {
                            name,
                            status: StepStatus::Completed,
                            error: None,
                        });
                    }
                    Ok((name, Err(reason))) => {
                        pending.remove(&name);
                        layer_failed = true;
                        outcomes.push(StepOutcome {
                            name,
                            status: StepStatus::Failed,
                            error: Some(reason),
                        });
                        if !aborted {
                            joinset.abort_all();
                            aborted = true;
                        }
                    }
                    Err(join_error) if aborted && join_error.is_cancelled() => {}
                    Err(join_error) => {
                        layer_failed = true;
                        outcomes.push(StepOutcome {
                            name: "<unknown>".to_string(),
                            status: StepStatus::Failed,
                            error: Some(join_error.to_string()),
                        });
                        if !aborted {
                            joinset.abort_all();
                            aborted = true;
                        }
                    }
                }
            }

            if aborted {
                let mut cancelled: Vec<String> = pending.into_iter().collect();
                cancelled.sort();
                for name in cancelled {
                    outcomes.push(StepOutcome {
                        name,
                        status: StepStatus::Cancelled,
                        error: None,
                    });
                }
            }

            if layer_failed {
                failed = true;
            }
        }

        Ok((
            if failed { PipelineStatus::Failed } else { PipelineStatus::Completed },
            outcomes,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, depends_on: &[&str]) -> PipelineStep {
        PipelineStep {
            name: name.to_string(),
            agent_ref: String::new(),
            input: None,
            output: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn layers_a_diamond_dependency_graph() {
        let steps = vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
        ];
        let layers = layer_steps(&steps).unwrap();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0].len(), 1);
        assert_eq!(layers[1].len(), 2);
        assert_eq!(layers[2].len(), 1);
        assert_eq!(layers[2][0].name, "d");
    }

    #[test]
    fn detects_cycle() {
        let steps = vec![step("a", &["b"]), step("b", &["a"])];
        let err = layer_steps(&steps).unwrap_err();
        assert!(matches!(err, PipelineError::Cycle(_)));
    }

    #[test]
    fn rejects_duplicate_step_names() {
        let steps = vec![step("a", &[]), step("a", &[])];
        let err = layer_steps(&steps).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateStep(_)));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let steps = vec![step("a", &["missing"])];
        let err = layer_steps(&steps).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownDependency { .. }));
    }

    #[test]
    fn rejects_self_dependency() {
        let steps = vec![step("a", &["a"])];
        let err = layer_steps(&steps).unwrap_err();
        assert!(matches!(err, PipelineError::SelfDependency(_)));
    }

    struct AlwaysSucceeds;

    #[async_trait::async_trait]
    impl StepRunner for AlwaysSucceeds {
        async fn run(&self, _step: &PipelineStep) -> Result<(), String> {
            Ok(())
        }
    }

    struct FailsOn(String);

    #[async_trait::async_trait]
    impl StepRunner for FailsOn {
        async fn run(&self, step: &PipelineStep) -> Result<(), String> {
            if step.name == self.0 {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn diamond_runs_to_completion_when_all_steps_succeed() {
        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["a"]), step("d", &["b", "c"])];
        let executor = PipelineExecutor::new(Arc::new(AlwaysSucceeds));
        let (status, outcomes) = executor.run(&steps).await.unwrap();
        assert_eq!(status, PipelineStatus::Completed);
        assert_eq!(outcomes.len(), 4);
    }

    struct FailFastVsSlow;

    #[async_trait::async_trait]
    impl StepRunner for FailFastVsSlow {
        async fn run(&self, step: &PipelineStep) -> Result<(), String> {
            match step.name.as_str() {
                "b" => Err("boom".to_string()),
                "c" => {
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn failure_in_a_layer_aborts_its_still_running_siblings() {
        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["a"])];
        let executor = PipelineExecutor::new(Arc::new(FailFastVsSlow));
        let (status, outcomes) =
            tokio::time::timeout(std::time::Duration::from_secs(5), executor.run(&steps))
                .await
                .expect("abort_all should let the layer finish without waiting out the sleep")
                .unwrap();
        assert_eq!(status, PipelineStatus::Failed);
        let c = outcomes.iter().find(|o| o.name == "c").unwrap();
        assert_eq!(c.status, StepStatus::Cancelled);
    }

    #[tokio::test]
    async fn failure_in_a_layer_cancels_later_layers() {
        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["a"]), step("d", &["b", "c"])];
        let executor = PipelineExecutor::new(Arc::new(FailsOn("b".to_string())));
        let (status, outcomes) = executor.run(&steps).await.unwrap();
        assert_eq!(status, PipelineStatus::Failed);
        let d = outcomes.iter().find(|o| o.name == "d").unwrap();
        assert_eq!(d.status, StepStatus::Cancelled);
    }
}
