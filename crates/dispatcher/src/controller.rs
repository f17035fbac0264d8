use std::sync::Arc;

use orchestrator_domain::{GraphStore, Scenario, ScenarioProgress, Task};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

/// Read-side status aggregation over a published scenario.
pub struct StatusController {
    store: Arc<dyn GraphStore>,
}

impl StatusController {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub async fn scenario_progress(
        &self,
        scenario_id: &str,
    ) -> OrchestratorResult<ScenarioProgress> {
        let _ = self.require_scenario(scenario_id).await?;
        let tasks = self.store.scenario_tasks(scenario_id).await?;
        Ok(ScenarioProgress::from_tasks(scenario_id, &tasks))
    }

    pub async fn scenario_with_tasks(
        &self,
        scenario_id: &str,
    ) -> OrchestratorResult<(Scenario, Vec<Task>)> {
        let scenario = self.require_scenario(scenario_id).await?;
        let tasks = self.store.scenario_tasks(scenario_id).await?;
        Ok((scenario, tasks))
    }

    async fn require_scenario(&self, scenario_id: &str) -> OrchestratorResult<Scenario> {
        self.store
            .get_scenario(scenario_id)
            .await?
            .ok_or_else(|| OrchestratorError::scenario_not_found(scenario_id))
    }
}
