//! 内存图存储
//!
//! 面向内嵌部署与测试的存储实现。整个状态在一把互斥锁后面，
//! 每个复合操作持锁完成，天然满足单一线性化点的要求；
//! 阻塞式 claim 用每队列一个 [`Notify`] 实现。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use orchestrator_domain::{
    ClaimOutcome, EnqueuedTask, FanOut, GraphStore, Scenario, Task, TaskStatus,
};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

#[derive(Default)]
struct MemoryState {
    tasks: HashMap<String, Task>,
    scenarios: HashMap<String, Scenario>,
    queues: HashMap<String, VecDeque<String>>,
}

#[derive(Default)]
pub struct InMemoryGraphStore {
    state: Mutex<MemoryState>,
    notifiers: Mutex<HashMap<String, Arc<Notify>>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn notifier(&self, service: &str) -> Arc<Notify> {
        let mut notifiers = self.notifiers.lock().unwrap();
        notifiers
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// 队列深度快照（含全部队列），测试辅助。
    pub fn queue_snapshot(&self) -> HashMap<String, Vec<String>> {
        let state = self.state.lock().unwrap();
        state
            .queues
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
            .collect()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn publish(&self, scenario: &Scenario, tasks: &[Task]) -> OrchestratorResult<()> {
        let mut touched = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            for task in tasks {
                state.tasks.insert(task.id.clone(), task.clone());
            }
            for task in tasks {
                if task.status == TaskStatus::Queued {
                    state
                        .queues
                        .entry(task.service.clone())
                        .or_default()
                        .push_back(task.id.clone());
                    touched.push(task.service.clone());
                }
            }
            state
                .scenarios
                .insert(scenario.scenario_id.clone(), scenario.clone());
        }
        for service in touched {
            self.notifier(&service).notify_one();
        }
        debug!(
            scenario_id = %scenario.scenario_id,
            tasks = tasks.len(),
            "published scenario graph"
        );
        Ok(())
    }

    async fn claim_one(
        &self,
        service: &str,
        timeout: Duration,
    ) -> OrchestratorResult<ClaimOutcome> {
        let deadline = Instant::now() + timeout;
        let notify = self.notifier(service);

        loop {
            {
                let mut state = self.state.lock().unwrap();
                let popped = state
                    .queues
                    .get_mut(service)
                    .and_then(|queue| queue.pop_front());
                if let Some(task_id) = popped {
                    let Some(task) = state.tasks.get_mut(&task_id) else {
                        return Err(OrchestratorError::task_not_found(task_id));
                    };
                    if task.status != TaskStatus::Queued {
                        warn!(task_id = %task_id, "dropped stale queue entry");
                        return Ok(ClaimOutcome::Stale(task_id));
                    }
                    task.status = TaskStatus::Processing;
                    task.updated_at = Utc::now();
                    return Ok(ClaimOutcome::Claimed(task.clone()));
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(ClaimOutcome::Empty);
            }
            let _ = tokio::time::timeout(remaining, notify.notified()).await;
            if Instant::now() >= deadline {
                return Ok(ClaimOutcome::Empty);
            }
        }
    }

    async fn succeed(&self, task_id: &str, result_ref: &str) -> OrchestratorResult<FanOut> {
        let mut fan_out = FanOut::default();
        let mut touched = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            let task = state
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| OrchestratorError::task_not_found(task_id))?;
            if task.status != TaskStatus::Processing {
                return Err(OrchestratorError::InvalidTransition {
                    task_id: task_id.to_string(),
                    from: task.status.as_str().to_string(),
                    to: TaskStatus::Success.as_str().to_string(),
                });
            }
            let now = Utc::now();
            task.status = TaskStatus::Success;
            task.result_ref = Some(result_ref.to_string());
            task.updated_at = now;
            let consumers = task.consumers.clone();

            for consumer_id in consumers {
                let Some(consumer) = state.tasks.get_mut(&consumer_id) else {
                    continue;
                };
                if consumer.status != TaskStatus::Pending {
                    continue;
                }
                consumer.pending_count = consumer.pending_count.saturating_sub(1);
                if consumer.pending_count == 0 {
                    consumer.status = TaskStatus::Queued;
                    consumer.updated_at = now;
                    let service = consumer.service.clone();
                    state
                        .queues
                        .entry(service.clone())
                        .or_default()
                        .push_back(consumer_id.clone());
                    fan_out.enqueued.push(EnqueuedTask {
                        task_id: consumer_id,
                        service: service.clone(),
                    });
                    touched.push(service);
                }
            }
        }
        for service in touched {
            self.notifier(&service).notify_one();
        }
        Ok(fan_out)
    }

    async fn fail(&self, task_id: &str, error: &str) -> OrchestratorResult<()> {
        let mut state = self.state.lock().unwrap();
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| OrchestratorError::task_not_found(task_id))?;
        if task.status != TaskStatus::Processing {
            return Err(OrchestratorError::InvalidTransition {
                task_id: task_id.to_string(),
                from: task.status.as_str().to_string(),
                to: TaskStatus::Failed.as_str().to_string(),
            });
        }
        task.status = TaskStatus::Failed;
        task.error = Some(error.to_string());
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn fail_if_pending(&self, task_id: &str, error: &str) -> OrchestratorResult<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(task) = state.tasks.get_mut(task_id) else {
            return Ok(false);
        };
        if task.status != TaskStatus::Pending {
            return Ok(false);
        }
        task.status = TaskStatus::Failed;
        task.error = Some(error.to_string());
        task.updated_at = Utc::now();
        Ok(true)
    }

    async fn get_task(&self, task_id: &str) -> OrchestratorResult<Option<Task>> {
        let state = self.state.lock().unwrap();
        Ok(state.tasks.get(task_id).cloned())
    }

    async fn get_scenario(&self, scenario_id: &str) -> OrchestratorResult<Option<Scenario>> {
        let state = self.state.lock().unwrap();
        Ok(state.scenarios.get(scenario_id).cloned())
    }

    async fn scenario_tasks(&self, scenario_id: &str) -> OrchestratorResult<Vec<Task>> {
        let state = self.state.lock().unwrap();
        let Some(scenario) = state.scenarios.get(scenario_id) else {
            return Ok(Vec::new());
        };
        Ok(scenario
            .task_ids
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect())
    }

    async fn queue_depth(&self, service: &str) -> OrchestratorResult<u64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .queues
            .get(service)
            .map(|queue| queue.len() as u64)
            .unwrap_or(0))
    }

    async fn stale_processing(
        &self,
        older_than: DateTime<Utc>,
    ) -> OrchestratorResult<Vec<Task>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tasks
            .values()
            .filter(|task| task.status == TaskStatus::Processing && task.updated_at < older_than)
            .cloned()
            .collect())
    }
}
