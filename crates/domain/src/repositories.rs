//! 存储端口
//!
//! 依赖倒置：领域层定义访问共享存储的抽象接口，具体实现
//! （Redis、内存）在基础设施层。所有复合写操作都要求实现方
//! 提供单一线性化点，依赖计数的递减与条件入队必须是一步原子操作。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{Scenario, Task};
use orchestrator_errors::OrchestratorResult;

/// 一次 claim 尝试的结果。
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// 任务已原子地转入 `PROCESSING`，归调用方执行。
    Claimed(Task),
    /// 队列里弹出的 id 状态已不是 `QUEUED`（重复入队的残留），
    /// 调用方应丢弃并继续 claim。
    Stale(String),
    /// 超时内没有可领取的任务。
    Empty,
}

/// `succeed` 扇出的产物：本次调用入队的下游任务。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOut {
    pub enqueued: Vec<EnqueuedTask>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueuedTask {
    pub task_id: String,
    pub service: String,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// 原子发布：写入全部任务哈希与场景索引，并把初始就绪任务
    /// 按展开顺序推入各自的服务队列。读者在发布完成前看不到场景。
    async fn publish(&self, scenario: &Scenario, tasks: &[Task]) -> OrchestratorResult<()>;

    /// 从服务队列头部弹出一个任务 id 并原子地执行
    /// `QUEUED → PROCESSING`。阻塞至多 `timeout`。
    async fn claim_one(&self, service: &str, timeout: Duration)
        -> OrchestratorResult<ClaimOutcome>;

    /// `PROCESSING → SUCCESS` 并执行扇出：对每个仍为 `PENDING` 的
    /// 下游递减 `pending_count`，归零者转 `QUEUED` 并入队。
    /// 整个操作是一个线性化点。
    async fn succeed(&self, task_id: &str, result_ref: &str) -> OrchestratorResult<FanOut>;

    /// `PROCESSING → FAILED`。不触碰下游。
    async fn fail(&self, task_id: &str, error: &str) -> OrchestratorResult<()>;

    /// 仅当任务仍为 `PENDING` 时将其置为 `FAILED`，返回是否生效。
    /// 级联失败模式的基础操作。
    async fn fail_if_pending(&self, task_id: &str, error: &str) -> OrchestratorResult<bool>;

    async fn get_task(&self, task_id: &str) -> OrchestratorResult<Option<Task>>;

    async fn get_scenario(&self, scenario_id: &str) -> OrchestratorResult<Option<Scenario>>;

    /// 场景内全部任务，按展开顺序。
    async fn scenario_tasks(&self, scenario_id: &str) -> OrchestratorResult<Vec<Task>>;

    async fn queue_depth(&self, service: &str) -> OrchestratorResult<u64>;

    /// `updated_at` 早于 `older_than` 的 `PROCESSING` 任务（清道夫用）。
    async fn stale_processing(
        &self,
        older_than: DateTime<Utc>,
    ) -> OrchestratorResult<Vec<Task>>;
}
