use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::Script;
use tracing::{debug, warn};

use orchestrator_config::StoreConfig;
use orchestrator_domain::wire;
use orchestrator_domain::{
    ClaimOutcome, EnqueuedTask, FanOut, GraphStore, Scenario, Task, TaskStatus,
};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

use super::connection::RedisConnectionManager;
use super::scripts;

/// Redis 图存储
///
/// 任务存在 `task:{id}` 哈希，场景存在 `scenario:{id}` 哈希加
/// `scenario:{id}:tasks` 列表，服务队列是 `queue:{service}` 列表
/// （LPUSH 入队、BRPOP 出队，先进先出）。所有复合转移走服务端脚本。
pub struct RedisGraphStore {
    conn: RedisConnectionManager,
    claim_script: Script,
    succeed_script: Script,
    fail_script: Script,
    fail_if_pending_script: Script,
}

fn task_key(id: &str) -> String {
    format!("task:{id}")
}

fn scenario_key(id: &str) -> String {
    format!("scenario:{id}")
}

fn scenario_tasks_key(id: &str) -> String {
    format!("scenario:{id}:tasks")
}

fn queue_key(service: &str) -> String {
    format!("queue:{service}")
}

fn script_error(task_id: &str, attempted: TaskStatus, e: redis::RedisError) -> OrchestratorError {
    match e.code() {
        Some("NOTFOUND") => OrchestratorError::task_not_found(task_id),
        Some("WRONGSTATUS") => OrchestratorError::InvalidTransition {
            task_id: task_id.to_string(),
            from: e.detail().unwrap_or("unknown").trim().to_string(),
            to: attempted.as_str().to_string(),
        },
        _ => OrchestratorError::StoreUnavailable(format!("Redis script failed: {e}")),
    }
}

impl RedisGraphStore {
    pub async fn connect(config: StoreConfig) -> OrchestratorResult<Self> {
        let conn = RedisConnectionManager::new(config).await?;
        Ok(Self {
            conn,
            claim_script: Script::new(scripts::CLAIM),
            succeed_script: Script::new(scripts::SUCCEED),
            fail_script: Script::new(scripts::FAIL),
            fail_if_pending_script: Script::new(scripts::FAIL_IF_PENDING),
        })
    }

    async fn read_task(&self, task_id: &str) -> OrchestratorResult<Option<Task>> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(task_key(task_id));
        let fields: HashMap<String, String> = self.conn.execute_command(&mut cmd).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        wire::task_from_fields(&fields).map(Some)
    }
}

#[async_trait]
impl GraphStore for RedisGraphStore {
    async fn publish(&self, scenario: &Scenario, tasks: &[Task]) -> OrchestratorResult<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();

        for task in tasks {
            pipe.cmd("HSET").arg(task_key(&task.id));
            for (field, value) in wire::task_to_fields(task) {
                pipe.arg(field).arg(value);
            }
            pipe.ignore();
        }

        if !scenario.task_ids.is_empty() {
            pipe.cmd("RPUSH")
                .arg(scenario_tasks_key(&scenario.scenario_id));
            for id in &scenario.task_ids {
                pipe.arg(id);
            }
            pipe.ignore();
        }

        // 初始就绪任务按展开顺序入队。
        for task in tasks {
            if task.status == TaskStatus::Queued {
                pipe.cmd("LPUSH")
                    .arg(queue_key(&task.service))
                    .arg(&task.id)
                    .ignore();
            }
        }

        // 场景哈希最后写入：读者以它的存在作为发布完成的标志。
        pipe.cmd("HSET").arg(scenario_key(&scenario.scenario_id));
        for (field, value) in wire::scenario_to_fields(scenario) {
            pipe.arg(field).arg(value);
        }
        pipe.ignore();

        let mut conn = self.conn.get_connection().await?;
        pipe.query::<()>(&mut conn).map_err(|e| {
            OrchestratorError::StoreUnavailable(format!("publish pipeline failed: {e}"))
        })?;

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
        let secs = timeout.as_secs().max(1);
        let mut cmd = redis::cmd("BRPOP");
        cmd.arg(queue_key(service)).arg(secs as usize);
        let popped: Option<(String, String)> = self.conn.execute_command(&mut cmd).await?;

        let Some((_, task_id)) = popped else {
            return Ok(ClaimOutcome::Empty);
        };

        let mut conn = self.conn.get_connection().await?;
        let claimed: i64 = self
            .claim_script
            .key(task_key(&task_id))
            .arg(Utc::now().to_rfc3339())
            .invoke(&mut conn)
            .map_err(|e| {
                OrchestratorError::StoreUnavailable(format!("claim script failed: {e}"))
            })?;

        if claimed == 0 {
            warn!(task_id = %task_id, "dropped stale queue entry");
            return Ok(ClaimOutcome::Stale(task_id));
        }

        match self.read_task(&task_id).await? {
            Some(task) => Ok(ClaimOutcome::Claimed(task)),
            None => Err(OrchestratorError::task_not_found(task_id)),
        }
    }

    async fn succeed(&self, task_id: &str, result_ref: &str) -> OrchestratorResult<FanOut> {
        let mut conn = self.conn.get_connection().await?;
        let flat: Vec<String> = self
            .succeed_script
            .key(task_key(task_id))
            .arg(result_ref)
            .arg(Utc::now().to_rfc3339())
            .invoke(&mut conn)
            .map_err(|e| script_error(task_id, TaskStatus::Success, e))?;

        let enqueued = flat
            .chunks(2)
            .filter(|pair| pair.len() == 2)
            .map(|pair| EnqueuedTask {
                task_id: pair[0].clone(),
                service: pair[1].clone(),
            })
            .collect();
        Ok(FanOut { enqueued })
    }

    async fn fail(&self, task_id: &str, error: &str) -> OrchestratorResult<()> {
        let mut conn = self.conn.get_connection().await?;
        let _: i64 = self
            .fail_script
            .key(task_key(task_id))
            .arg(error)
            .arg(Utc::now().to_rfc3339())
            .invoke(&mut conn)
            .map_err(|e| script_error(task_id, TaskStatus::Failed, e))?;
        Ok(())
    }

    async fn fail_if_pending(&self, task_id: &str, error: &str) -> OrchestratorResult<bool> {
        let mut conn = self.conn.get_connection().await?;
        let failed: i64 = self
            .fail_if_pending_script
            .key(task_key(task_id))
            .arg(error)
            .arg(Utc::now().to_rfc3339())
            .invoke(&mut conn)
            .map_err(|e| {
                OrchestratorError::StoreUnavailable(format!("fail_if_pending script failed: {e}"))
            })?;
        Ok(failed == 1)
    }

    async fn get_task(&self, task_id: &str) -> OrchestratorResult<Option<Task>> {
        self.read_task(task_id).await
    }

    async fn get_scenario(&self, scenario_id: &str) -> OrchestratorResult<Option<Scenario>> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(scenario_key(scenario_id));
        let fields: HashMap<String, String> = self.conn.execute_command(&mut cmd).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let mut cmd = redis::cmd("LRANGE");
        cmd.arg(scenario_tasks_key(scenario_id)).arg(0).arg(-1);
        let task_ids: Vec<String> = self.conn.execute_command(&mut cmd).await?;

        wire::scenario_from_fields(&fields, task_ids).map(Some)
    }

    async fn scenario_tasks(&self, scenario_id: &str) -> OrchestratorResult<Vec<Task>> {
        let mut cmd = redis::cmd("LRANGE");
        cmd.arg(scenario_tasks_key(scenario_id)).arg(0).arg(-1);
        let task_ids: Vec<String> = self.conn.execute_command(&mut cmd).await?;
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &task_ids {
            pipe.cmd("HGETALL").arg(task_key(id));
        }
        let mut conn = self.conn.get_connection().await?;
        let raw: Vec<HashMap<String, String>> = pipe.query(&mut conn).map_err(|e| {
            OrchestratorError::StoreUnavailable(format!("scenario task read failed: {e}"))
        })?;

        let mut tasks = Vec::with_capacity(raw.len());
        for fields in raw {
            if fields.is_empty() {
                continue;
            }
            tasks.push(wire::task_from_fields(&fields)?);
        }
        Ok(tasks)
    }

    async fn queue_depth(&self, service: &str) -> OrchestratorResult<u64> {
        let mut cmd = redis::cmd("LLEN");
        cmd.arg(queue_key(service));
        self.conn.execute_command(&mut cmd).await
    }

    async fn stale_processing(
        &self,
        older_than: DateTime<Utc>,
    ) -> OrchestratorResult<Vec<Task>> {
        let mut conn = self.conn.get_connection().await?;
        let mut stale = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg("task:*")
                .arg("COUNT")
                .arg(100)
                .query(&mut conn)
                .map_err(|e| {
                    OrchestratorError::StoreUnavailable(format!("SCAN failed: {e}"))
                })?;

            for key in keys {
                let fields: HashMap<String, String> =
                    redis::cmd("HGETALL").arg(&key).query(&mut conn).map_err(|e| {
                        OrchestratorError::StoreUnavailable(format!("HGETALL failed: {e}"))
                    })?;
                if fields.is_empty() {
                    continue;
                }
                let task = wire::task_from_fields(&fields)?;
                if task.status == TaskStatus::Processing && task.updated_at < older_than {
                    stale.push(task);
                }
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(stale)
    }
}
