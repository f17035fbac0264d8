use redis::{Client, Connection, RedisResult};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use orchestrator_config::StoreConfig;
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

/// Redis连接管理器
///
/// 负责建立到共享存储的连接，带有限次重试。每个操作取一条
/// 新连接，进程间不共享连接状态。
pub struct RedisConnectionManager {
    client: Client,
    config: StoreConfig,
}

impl RedisConnectionManager {
    /// 创建新的连接管理器并验证连通性。
    pub async fn new(config: StoreConfig) -> OrchestratorResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            OrchestratorError::StoreUnavailable(format!("failed to create Redis client: {e}"))
        })?;

        let manager = Self { client, config };
        manager.ping().await?;
        debug!("Successfully connected to Redis at {}", manager.config.url);
        Ok(manager)
    }

    /// 获取连接，失败时按配置重试。
    pub async fn get_connection(&self) -> OrchestratorResult<Connection> {
        let mut last_error = None;

        for attempt in 0..self.config.max_retry_attempts {
            match self.client.get_connection_with_timeout(Duration::from_secs(
                self.config.connection_timeout_seconds,
            )) {
                Ok(conn) => {
                    if attempt > 0 {
                        debug!("Reconnected to Redis after {} attempts", attempt + 1);
                    }
                    return Ok(conn);
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retry_attempts - 1 {
                        warn!(
                            "Failed to connect to Redis (attempt {}/{}): {}. Retrying in {}s...",
                            attempt + 1,
                            self.config.max_retry_attempts,
                            last_error.as_ref().unwrap(),
                            self.config.retry_delay_seconds
                        );
                        sleep(Duration::from_secs(self.config.retry_delay_seconds)).await;
                    }
                }
            }
        }

        let error_msg = format!(
            "failed to connect to Redis after {} attempts: {}",
            self.config.max_retry_attempts,
            last_error.map_or("unknown".to_string(), |e| e.to_string())
        );
        error!("{}", error_msg);
        Err(OrchestratorError::StoreUnavailable(error_msg))
    }

    /// 执行单条命令。
    pub async fn execute_command<T: redis::FromRedisValue>(
        &self,
        cmd: &mut redis::Cmd,
    ) -> OrchestratorResult<T> {
        let mut conn = self.get_connection().await?;
        cmd.query(&mut conn)
            .map_err(|e| OrchestratorError::StoreUnavailable(format!("Redis command failed: {e}")))
    }

    /// 测试连接。
    pub async fn ping(&self) -> OrchestratorResult<()> {
        let mut conn = self.get_connection().await?;
        let result: RedisResult<String> = redis::cmd("PING").query(&mut conn);
        match result {
            Ok(response) if response == "PONG" => Ok(()),
            Ok(other) => Err(OrchestratorError::StoreUnavailable(format!(
                "unexpected PING reply: {other}"
            ))),
            Err(e) => Err(OrchestratorError::StoreUnavailable(format!(
                "PING failed: {e}"
            ))),
        }
    }
}
