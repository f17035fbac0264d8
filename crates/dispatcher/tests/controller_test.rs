#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use orchestrator_dispatcher::StatusController;
    use orchestrator_domain::{GraphStore, TaskStatus};
    use orchestrator_testing_utils::{MockGraphStore, ScenarioBuilder, TaskBuilder};

    async fn seed(store: &Arc<MockGraphStore>, statuses: &[(&str, TaskStatus, u32)]) {
        let tasks: Vec<_> = statuses
            .iter()
            .map(|(id, status, pending)| {
                TaskBuilder::new(id)
                    .with_status(*status)
                    .with_pending_count(*pending)
                    .build()
            })
            .collect();
        let ids: Vec<&str> = statuses.iter().map(|(id, _, _)| *id).collect();
        let scenario = ScenarioBuilder::new("scenario-1")
            .with_task_ids(&ids)
            .build();
        store.publish(&scenario, &tasks).await.unwrap();
    }

    #[tokio::test]
    async fn test_progress_counts_per_status() {
        let store = MockGraphStore::shared();
        seed(
            &store,
            &[
                ("a", TaskStatus::Success, 0),
                ("b", TaskStatus::Processing, 0),
                ("c", TaskStatus::Pending, 1),
            ],
        )
        .await;

        let controller = StatusController::new(store as Arc<dyn GraphStore>);
        let progress = controller.scenario_progress("scenario-1").await.unwrap();
        assert_eq!(progress.total(), 3);
        assert_eq!(progress.success, 1);
        assert_eq!(progress.processing, 1);
        assert_eq!(progress.pending, 1);
        assert!(!progress.is_stuck());
        assert!(!progress.is_complete());
    }

    #[tokio::test]
    async fn test_stuck_scenario_is_reported() {
        let store = MockGraphStore::shared();
        seed(
            &store,
            &[
                ("a", TaskStatus::Success, 0),
                ("b", TaskStatus::Failed, 0),
                ("c", TaskStatus::Pending, 1),
            ],
        )
        .await;

        let controller = StatusController::new(store as Arc<dyn GraphStore>);
        let progress = controller.scenario_progress("scenario-1").await.unwrap();
        assert!(progress.is_stuck());
    }

    #[tokio::test]
    async fn test_unknown_scenario() {
        let store = MockGraphStore::shared();
        let controller = StatusController::new(store as Arc<dyn GraphStore>);
        let err = controller.scenario_progress("missing").await.unwrap_err();
        assert_eq!(err.kind(), "UNKNOWN_SCENARIO");
    }
}
