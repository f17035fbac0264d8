//! 读侧查询
//!
//! 与进行中的状态转移不做线性化，轻微滞后的视图是可接受的。

use std::sync::Arc;

use orchestrator_domain::{GraphStore, Scenario, ScenarioProgress, Task};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

pub struct QueryService {
    store: Arc<dyn GraphStore>,
}

/// 场景记录加进度汇总。
#[derive(Debug, Clone)]
pub struct ScenarioView {
    pub scenario: Scenario,
    pub progress: ScenarioProgress,
}

impl QueryService {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub async fn get_task(&self, task_id: &str) -> OrchestratorResult<Task> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| OrchestratorError::task_not_found(task_id))
    }

    pub async fn get_scenario(&self, scenario_id: &str) -> OrchestratorResult<ScenarioView> {
        let scenario = self
            .store
            .get_scenario(scenario_id)
            .await?
            .ok_or_else(|| OrchestratorError::scenario_not_found(scenario_id))?;
        let tasks = self.store.scenario_tasks(scenario_id).await?;
        let progress = ScenarioProgress::from_tasks(scenario_id, &tasks);
        Ok(ScenarioView { scenario, progress })
    }

    pub async fn queue_depth(&self, service: &str) -> OrchestratorResult<u64> {
        self.store.queue_depth(service).await
    }
}
