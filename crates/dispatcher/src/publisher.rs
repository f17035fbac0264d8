use std::sync::Arc;

use tracing::info;

use orchestrator_domain::{GraphStore, Scenario, Task, TaskStatus};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

pub struct GraphPublisher {
    store: Arc<dyn GraphStore>,
}

impl GraphPublisher {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Persist an expanded scenario graph. Tasks with no unmet dependencies
    /// are moved to `QUEUED` here, before the single atomic publication, so
    /// the store enqueues them in expansion order.
    pub async fn publish(
        &self,
        scenario: &Scenario,
        mut tasks: Vec<Task>,
    ) -> OrchestratorResult<()> {
        let mut initially_ready = 0usize;
        for task in &mut tasks {
            if task.is_eligible() {
                if !task.status.can_transition_to(TaskStatus::Queued) {
                    return Err(OrchestratorError::invalid_transition(
                        task.id.as_str(),
                        task.status.as_str(),
                        TaskStatus::Queued.as_str(),
                    ));
                }
                task.status = TaskStatus::Queued;
                initially_ready += 1;
            }
        }

        if initially_ready == 0 && !tasks.is_empty() {
            return Err(OrchestratorError::invalid_template(
                "no task in the scenario is initially ready",
            ));
        }

        self.store.publish(scenario, &tasks).await?;
        info!(
            scenario_id = %scenario.scenario_id,
            tasks = tasks.len(),
            initially_ready,
            "scenario published"
        );
        Ok(())
    }
}
