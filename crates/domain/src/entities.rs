//! Domain Entities
//!
//! 核心领域实体定义：任务、场景与状态机。任务之间只通过 id 互相引用，
//! 整个图就是一组扁平的记录加一个索引，与存储层的哈希布局一一对应。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 任务状态
///
/// 生命周期：`PENDING → QUEUED → PROCESSING → SUCCESS | FAILED`。
/// 其余任何转移都是非法的，由存储层的原子操作拒绝。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Queued,
    Processing,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "queued" => Some(TaskStatus::Queued),
            "processing" => Some(TaskStatus::Processing),
            "success" => Some(TaskStatus::Success),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    /// 终态：一旦到达，`pending_count` 与 `consumers` 即被冻结。
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    /// 状态机合法转移检查。
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Queued)
                | (TaskStatus::Queued, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Success)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 上游输入引用：单个任务 id 或一组任务 id。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum InputRef {
    Single(String),
    Many(Vec<String>),
}

impl InputRef {
    pub fn ids(&self) -> Vec<&str> {
        match self {
            InputRef::Single(id) => vec![id.as_str()],
            InputRef::Many(ids) => ids.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            InputRef::Single(id) => id.is_empty(),
            InputRef::Many(ids) => ids.is_empty(),
        }
    }
}

/// 任务定义
///
/// 调度的最小单元。`service` 决定任务被路由到哪个工作队列，
/// `pending_count` 记录尚未成功的上游数量，归零后任务才可入队。
///
/// # 字段说明
///
/// - `id`: 全局唯一的短标识，展开期生成后不再变化
/// - `scenario_id`: 所属场景
/// - `service`: 执行该任务的 worker 家族（队列路由键）
/// - `name`: 服务内的操作类型，如 `CreateText`、`CreateVoice`
/// - `pending_count`: 未完成上游依赖数
/// - `status`: 当前状态
/// - `consumers`: 以本任务为输入的下游任务 id（出边）
/// - `prompt`: 可选的自由文本输入
/// - `params`: 服务自解释的参数（编排器不解析）
/// - `input_refs`: 命名的上游引用，worker 据此取回上游产物
/// - `result_ref`: worker 在成功时写入的产物定位串
/// - `error`: 失败描述
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub scenario_id: String,
    pub service: String,
    pub name: String,
    pub pending_count: u32,
    pub status: TaskStatus,
    pub consumers: Vec<String>,
    pub prompt: Option<String>,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub input_refs: BTreeMap<String, InputRef>,
    pub result_ref: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        scenario_id: impl Into<String>,
        service: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            scenario_id: scenario_id.into(),
            service: service.into(),
            name: name.into(),
            pending_count: 0,
            status: TaskStatus::Pending,
            consumers: Vec::new(),
            prompt: None,
            params: serde_json::Map::new(),
            input_refs: BTreeMap::new(),
            result_ref: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 去重后的上游任务 id 集合（保持首次出现的顺序）。
    pub fn upstream_ids(&self) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        for input in self.input_refs.values() {
            for id in input.ids() {
                if seen.insert(id.to_string()) {
                    out.push(id.to_string());
                }
            }
        }
        out
    }

    /// 就绪态：`PENDING` 且依赖计数归零，等待发布器/分发器入队。
    pub fn is_eligible(&self) -> bool {
        self.status == TaskStatus::Pending && self.pending_count == 0
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

/// 场景记录：一组任务的伞形索引。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub scenario_id: String,
    pub template_name: String,
    pub template_version: String,
    /// 场景内全部任务 id，按展开顺序排列。
    pub task_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Scenario {
    pub fn new(
        scenario_id: impl Into<String>,
        template_name: impl Into<String>,
        template_version: impl Into<String>,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            template_name: template_name.into(),
            template_version: template_version.into(),
            task_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// 场景进度汇总：各状态的任务数量与卡死判定。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioProgress {
    pub scenario_id: String,
    pub pending: usize,
    pub queued: usize,
    pub processing: usize,
    pub success: usize,
    pub failed: usize,
}

impl ScenarioProgress {
    pub fn from_tasks(scenario_id: impl Into<String>, tasks: &[Task]) -> Self {
        let mut progress = Self {
            scenario_id: scenario_id.into(),
            ..Default::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Pending => progress.pending += 1,
                TaskStatus::Queued => progress.queued += 1,
                TaskStatus::Processing => progress.processing += 1,
                TaskStatus::Success => progress.success += 1,
                TaskStatus::Failed => progress.failed += 1,
            }
        }
        progress
    }

    pub fn total(&self) -> usize {
        self.pending + self.queued + self.processing + self.success + self.failed
    }

    pub fn finished(&self) -> usize {
        self.success + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.total() > 0 && self.finished() == self.total()
    }

    /// 卡死：存在失败任务，没有任何任务在排队或执行，
    /// 但仍有任务被未完成的上游挡住。
    pub fn is_stuck(&self) -> bool {
        self.failed > 0 && self.queued == 0 && self.processing == 0 && self.pending > 0
    }
}
