//! The apply engine: walks a pending action list, dispatches each one to
//! the adapter its resource's binding names, and publishes a typed event
//! per action so in-process subscribers (loggers, progress bars) can
//! follow along without the engine knowing who's listening.
//!
//! Events flow one way, downstream from the engine to its subscribers —
//! there is no upstream signaling channel here, unlike a full event DAG:
//! an apply run is a single forward pass, not a graph callers traverse.

use agentspec_core::{Action, ActionType, AdapterError, ApplyResult, Fqn, ResultStatus};
use tokio::sync::broadcast;

/// One lifecycle event published while an apply run executes.
#[derive(Debug, Clone)]
pub enum ApplyEvent {
    Started { total: usize },
    ActionStarted { fqn: Fqn, action: ActionType },
    ActionCompleted { result: ApplyResult },
    Aborted { reason: String },
    Finished { results: Vec<ApplyResult> },
}

/// What an adapter exposes to the apply engine. `agentspec-adapters` owns
/// the concrete implementations; this trait is the seam between the two
/// crates so `agentspec-apply` never depends on any specific adapter.
#[async_trait::async_trait]
pub trait ActionApplier: Send + Sync {
    async fn apply(&self, action: &Action) -> Result<ApplyResult, AdapterError>;
}

/// Runs a pending action list against an `ActionApplier`, in order,
/// publishing one `ApplyEvent` per step. Stops at the first top-level
/// adapter error (one that isn't already folded into a per-action
/// `ApplyResult`); per-action failures are recorded and execution
/// continues (mark-and-continue).
pub struct ApplyEngine {
    events: broadcast::Sender<ApplyEvent>,
}

impl ApplyEngine {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApplyEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: ApplyEvent) {
        // A lagging or absent subscriber must never abort the apply run.
        let _ = self.events.send(event);
    }

    pub async fn run(&self, actions: &[Action], applier: &dyn ActionApplier) -> Vec<ApplyResult> {
        self.publish(ApplyEvent::Started { total: actions.len() });
        let mut results = Vec::with_capacity(actions.len());

        for action in actions {
            self.publish(ApplyEvent::ActionStarted {
                fqn: action.fqn.clone(),
                action: action.action_type,
            });

            match applier.apply(action).await {
                Ok(result) => {
                    self.publish(ApplyEvent::ActionCompleted { result: result.clone() });
                    results.push(result);
                }
                Err(err) => {
                    let reason = err.to_string();
                    self.publish(ApplyEvent::Aborted { reason: reason.clone() });
                    results.push(ApplyResult {
                        fqn: action.fqn.clone(),
                        action: action.action_type,
                        status: ResultStatus::Failed,
                        error: Some(reason),
                        artifact: None,
                    });
                    break;
                }
            }
        }

        self.publish(ApplyEvent::Finished { results: results.clone() });
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentspec_core::ResourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct AlwaysSucceeds {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ActionApplier for AlwaysSucceeds {
        async fn apply(&self, action: &Action) -> Result<ApplyResult, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ApplyResult {
                fqn: action.fqn.clone(),
                action: action.action_type,
                status: ResultStatus::Success,
                error: None,
                artifact: None,
            })
        }
    }

    struct FailsOnSecond {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ActionApplier for FailsOnSecond {
        async fn apply(&self, action: &Action) -> Result<ApplyResult, AdapterError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 1 {
                Err(AdapterError::ApplyAborted {
                    adapter: "test".to_string(),
                    reason: "boom".to_string(),
                })
            } else {
                Ok(ApplyResult {
                    fqn: action.fqn.clone(),
                    action: action.action_type,
                    status: ResultStatus::Success,
                    error: None,
                    artifact: None,
                })
            }
        }
    }

    fn action(name: &str) -> Action {
        Action {
            fqn: Fqn::new("acme", ResourceKind::Agent, name),
            action_type: ActionType::Create,
            resource: None,
            reason: None,
        }
    }

    #[tokio::test]
    async fn runs_every_action_and_publishes_events() {
        let engine = ApplyEngine::new(16);
        let mut rx = engine.subscribe();
        let calls = Arc::new(AtomicUsize::new(0));
        let applier = AlwaysSucceeds { calls: calls.clone() };

        let results = engine.run(&[action("a"), action("b")], &applier).await;
        assert_eq!(results.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let started = rx.recv().await.unwrap();
        assert!(matches!(started, ApplyEvent::Started { total: 2 }));
    }

    #[tokio::test]
    async fn stops_after_first_top_level_adapter_error() {
        let engine = ApplyEngine::new(16);
        let calls = Arc::new(AtomicUsize::new(0));
        let applier = FailsOnSecond { calls: calls.clone() };

        let results = engine.run(&[action("a"), action("b"), action("c")], &applier).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].status, ResultStatus::Failed);
    }
}
