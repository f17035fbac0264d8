use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use orchestrator_domain::GraphStore;
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

/// Janitor for tasks stranded in `PROCESSING` by crashed workers.
///
/// The core never times out a running task on its own; this service is the
/// separate sweep that moves tasks older than the configured horizon to
/// `FAILED`. The failure path is the ordinary one, so no fan-out fires.
pub struct RecoveryService {
    store: Arc<dyn GraphStore>,
    horizon: Duration,
}

impl RecoveryService {
    pub fn new(store: Arc<dyn GraphStore>, horizon: Duration) -> Self {
        Self { store, horizon }
    }

    /// One sweep. Returns the ids of the tasks it failed.
    pub async fn run_once(&self) -> OrchestratorResult<Vec<String>> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.horizon)
                .map_err(|e| OrchestratorError::config_error(e.to_string()))?;

        let stale = self.store.stale_processing(cutoff).await?;
        let mut recovered = Vec::new();

        for task in stale {
            match self
                .store
                .fail(&task.id, "processing horizon exceeded")
                .await
            {
                Ok(()) => {
                    warn!(task_id = %task.id, service = %task.service, "stale task failed by janitor");
                    recovered.push(task.id);
                }
                // The worker finished between the scan and the sweep.
                Err(OrchestratorError::InvalidTransition { .. }) => {
                    debug!(task_id = %task.id, "task left PROCESSING before sweep");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(recovered)
    }

    /// Periodic sweep loop.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(recovered) if !recovered.is_empty() => {
                    info!(count = recovered.len(), "janitor sweep recovered tasks");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "janitor sweep failed"),
            }
        }
    }
}
