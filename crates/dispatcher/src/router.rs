use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use orchestrator_domain::{ClaimOutcome, FanOut, GraphStore, Task};
use orchestrator_errors::OrchestratorResult;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Default long-poll timeout for `claim`.
    pub claim_timeout: Duration,
    /// Propagate failure to downstream tasks. Off by default: downstream
    /// tasks stay `PENDING` behind a failed upstream until an operator
    /// repairs and replays.
    pub cascade_fail: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            claim_timeout: Duration::from_secs(5),
            cascade_fail: false,
        }
    }
}

/// Worker-facing protocol: claim the next task of a service queue, then
/// report the terminal transition with `succeed` or `fail`.
pub struct ConsumerRouter {
    store: Arc<dyn GraphStore>,
    config: RouterConfig,
}

impl ConsumerRouter {
    pub fn new(store: Arc<dyn GraphStore>, config: RouterConfig) -> Self {
        Self { store, config }
    }

    pub async fn claim(&self, service: &str) -> OrchestratorResult<Option<Task>> {
        self.claim_with_timeout(service, self.config.claim_timeout)
            .await
    }

    /// Long-poll claim. Stale queue entries (ids whose task is no longer
    /// `QUEUED`) are dropped and the loop keeps claiming until the
    /// timeout elapses.
    pub async fn claim_with_timeout(
        &self,
        service: &str,
        timeout: Duration,
    ) -> OrchestratorResult<Option<Task>> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match self.store.claim_one(service, remaining).await? {
                ClaimOutcome::Claimed(task) => {
                    info!(task_id = %task.id, service, name = %task.name, "task claimed");
                    return Ok(Some(task));
                }
                ClaimOutcome::Stale(task_id) => {
                    debug!(task_id = %task_id, service, "stale claim dropped, retrying");
                    continue;
                }
                ClaimOutcome::Empty => return Ok(None),
            }
        }
    }

    pub async fn succeed(&self, task_id: &str, result_ref: &str) -> OrchestratorResult<FanOut> {
        let fan_out = self.store.succeed(task_id, result_ref).await?;
        info!(
            task_id,
            result_ref,
            enqueued = fan_out.enqueued.len(),
            "task succeeded"
        );
        for entry in &fan_out.enqueued {
            debug!(task_id = %entry.task_id, service = %entry.service, "downstream task ready");
        }
        Ok(fan_out)
    }

    /// Terminal failure. Returns the ids of downstream tasks failed by the
    /// cascade, empty unless cascade-fail is configured.
    pub async fn fail(&self, task_id: &str, error: &str) -> OrchestratorResult<Vec<String>> {
        self.store.fail(task_id, error).await?;
        warn!(task_id, error, "task failed");

        if !self.config.cascade_fail {
            return Ok(Vec::new());
        }
        self.cascade_from(task_id).await
    }

    async fn cascade_from(&self, task_id: &str) -> OrchestratorResult<Vec<String>> {
        let mut cascaded = Vec::new();
        let mut frontier: VecDeque<String> = match self.store.get_task(task_id).await? {
            Some(task) => task.consumers.into(),
            None => return Ok(cascaded),
        };

        while let Some(consumer_id) = frontier.pop_front() {
            let error = format!("upstream task {task_id} failed");
            if self.store.fail_if_pending(&consumer_id, &error).await? {
                warn!(task_id = %consumer_id, "task failed by cascade");
                if let Some(consumer) = self.store.get_task(&consumer_id).await? {
                    frontier.extend(consumer.consumers);
                }
                cascaded.push(consumer_id);
            }
        }
        Ok(cascaded)
    }
}
