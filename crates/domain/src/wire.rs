//! 任务哈希的存储编码
//!
//! `task:{id}` 哈希的字段布局。列表与结构化字段编码成 JSON 文本，
//! 时间戳用 RFC 3339，状态用小写字符串。编码必须在存储层往返后
//! 逐字节还原。

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::entities::{InputRef, Scenario, Task, TaskStatus};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

/// 任务编码为哈希字段对。`None` 字段不写入。
pub fn task_to_fields(task: &Task) -> Vec<(String, String)> {
    let mut fields = vec![
        ("id".to_string(), task.id.clone()),
        ("scenario_id".to_string(), task.scenario_id.clone()),
        ("service".to_string(), task.service.clone()),
        ("name".to_string(), task.name.clone()),
        ("pending_count".to_string(), task.pending_count.to_string()),
        ("status".to_string(), task.status.as_str().to_string()),
        (
            "consumers".to_string(),
            serde_json::to_string(&task.consumers).unwrap_or_else(|_| "[]".to_string()),
        ),
        (
            "params".to_string(),
            serde_json::to_string(&task.params).unwrap_or_else(|_| "{}".to_string()),
        ),
        (
            "input_refs".to_string(),
            serde_json::to_string(&task.input_refs).unwrap_or_else(|_| "{}".to_string()),
        ),
        ("created_at".to_string(), task.created_at.to_rfc3339()),
        ("updated_at".to_string(), task.updated_at.to_rfc3339()),
    ];
    if let Some(prompt) = &task.prompt {
        fields.push(("prompt".to_string(), prompt.clone()));
    }
    if let Some(result_ref) = &task.result_ref {
        fields.push(("result_ref".to_string(), result_ref.clone()));
    }
    if let Some(error) = &task.error {
        fields.push(("error".to_string(), error.clone()));
    }
    fields
}

/// 哈希字段解码回任务。
pub fn task_from_fields(fields: &HashMap<String, String>) -> OrchestratorResult<Task> {
    let required = |key: &str| -> OrchestratorResult<String> {
        fields.get(key).cloned().ok_or_else(|| {
            OrchestratorError::Serialization(format!("task hash missing field: {key}"))
        })
    };

    let status_raw = required("status")?;
    let status = TaskStatus::parse(&status_raw).ok_or_else(|| {
        OrchestratorError::Serialization(format!("unknown task status: {status_raw}"))
    })?;

    let pending_count: u32 = required("pending_count")?.parse().map_err(|_| {
        OrchestratorError::Serialization("pending_count is not an integer".to_string())
    })?;

    let consumers: Vec<String> = match fields.get("consumers") {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
        _ => Vec::new(),
    };
    let params: serde_json::Map<String, serde_json::Value> = match fields.get("params") {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
        _ => serde_json::Map::new(),
    };
    let input_refs: BTreeMap<String, InputRef> = match fields.get("input_refs") {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
        _ => BTreeMap::new(),
    };

    Ok(Task {
        id: required("id")?,
        scenario_id: required("scenario_id")?,
        service: required("service")?,
        name: required("name")?,
        pending_count,
        status,
        consumers,
        prompt: fields.get("prompt").cloned(),
        params,
        input_refs,
        result_ref: fields.get("result_ref").cloned(),
        error: fields.get("error").cloned(),
        created_at: parse_timestamp(&required("created_at")?)?,
        updated_at: parse_timestamp(&required("updated_at")?)?,
    })
}

/// 场景编码为哈希字段对。任务 id 列表单独存放在
/// `scenario:{id}:tasks`，不进哈希。
pub fn scenario_to_fields(scenario: &Scenario) -> Vec<(String, String)> {
    vec![
        ("scenario_id".to_string(), scenario.scenario_id.clone()),
        (
            "template_name".to_string(),
            scenario.template_name.clone(),
        ),
        (
            "template_version".to_string(),
            scenario.template_version.clone(),
        ),
        ("created_at".to_string(), scenario.created_at.to_rfc3339()),
    ]
}

pub fn scenario_from_fields(
    fields: &HashMap<String, String>,
    task_ids: Vec<String>,
) -> OrchestratorResult<Scenario> {
    let required = |key: &str| -> OrchestratorResult<String> {
        fields.get(key).cloned().ok_or_else(|| {
            OrchestratorError::Serialization(format!("scenario hash missing field: {key}"))
        })
    };

    Ok(Scenario {
        scenario_id: required("scenario_id")?,
        template_name: required("template_name")?,
        template_version: required("template_version")?,
        task_ids,
        created_at: parse_timestamp(&required("created_at")?)?,
    })
}

fn parse_timestamp(raw: &str) -> OrchestratorResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OrchestratorError::Serialization(format!("bad timestamp {raw}: {e}")))
}
