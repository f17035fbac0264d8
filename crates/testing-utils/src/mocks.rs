//! Store test doubles.
//!
//! `MockGraphStore` wraps the embedded in-memory store and adds failure
//! injection, so retry and propagation paths can be exercised without a
//! real backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use orchestrator_domain::{ClaimOutcome, FanOut, GraphStore, Scenario, Task};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};
use orchestrator_infrastructure::InMemoryGraphStore;

#[derive(Default)]
pub struct MockGraphStore {
    inner: InMemoryGraphStore,
    fail_next: AtomicBool,
}

impl MockGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make the next store operation fail with `STORE_UNAVAILABLE`.
    pub fn fail_next_operation(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_failure(&self) -> OrchestratorResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(OrchestratorError::store_unavailable(
                "injected store failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MockGraphStore {
    async fn publish(&self, scenario: &Scenario, tasks: &[Task]) -> OrchestratorResult<()> {
        self.check_failure()?;
        self.inner.publish(scenario, tasks).await
    }

    async fn claim_one(
        &self,
        service: &str,
        timeout: Duration,
    ) -> OrchestratorResult<ClaimOutcome> {
        self.check_failure()?;
        self.inner.claim_one(service, timeout).await
    }

    async fn succeed(&self, task_id: &str, result_ref: &str) -> OrchestratorResult<FanOut> {
        self.check_failure()?;
        self.inner.succeed(task_id, result_ref).await
    }

    async fn fail(&self, task_id: &str, error: &str) -> OrchestratorResult<()> {
        self.check_failure()?;
        self.inner.fail(task_id, error).await
    }

    async fn fail_if_pending(&self, task_id: &str, error: &str) -> OrchestratorResult<bool> {
        self.check_failure()?;
        self.inner.fail_if_pending(task_id, error).await
    }

    async fn get_task(&self, task_id: &str) -> OrchestratorResult<Option<Task>> {
        self.check_failure()?;
        self.inner.get_task(task_id).await
    }

    async fn get_scenario(&self, scenario_id: &str) -> OrchestratorResult<Option<Scenario>> {
        self.check_failure()?;
        self.inner.get_scenario(scenario_id).await
    }

    async fn scenario_tasks(&self, scenario_id: &str) -> OrchestratorResult<Vec<Task>> {
        self.check_failure()?;
        self.inner.scenario_tasks(scenario_id).await
    }

    async fn queue_depth(&self, service: &str) -> OrchestratorResult<u64> {
        self.check_failure()?;
        self.inner.queue_depth(service).await
    }

    async fn stale_processing(
        &self,
        older_than: DateTime<Utc>,
    ) -> OrchestratorResult<Vec<Task>> {
        self.check_failure()?;
        self.inner.stale_processing(older_than).await
    }
}
