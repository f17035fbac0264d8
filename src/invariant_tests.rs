//! Quantified graph invariants, checked after every dispatch step.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use orchestrator_application::{ScenarioExpander, ScenarioService, TemplateRegistry};
use orchestrator_dispatcher::{ConsumerRouter, GraphPublisher, RouterConfig};
use orchestrator_domain::{GraphStore, Task, TaskStatus};
use orchestrator_infrastructure::InMemoryGraphStore;
use orchestrator_testing_utils::{default_services, params, FAN_OUT_FAN_IN_TEMPLATE};

struct Harness {
    store: Arc<InMemoryGraphStore>,
    scenarios: ScenarioService,
    router: ConsumerRouter,
}

fn harness(templates: &[&str]) -> Harness {
    let store = Arc::new(InMemoryGraphStore::new());
    let mut registry = TemplateRegistry::new();
    for template in templates {
        registry.register_str(template).unwrap();
    }
    let scenarios = ScenarioService::new(
        Arc::new(registry),
        ScenarioExpander::new(default_services()),
        GraphPublisher::new(store.clone() as Arc<dyn GraphStore>),
    );
    let router = ConsumerRouter::new(
        store.clone() as Arc<dyn GraphStore>,
        RouterConfig {
            claim_timeout: Duration::from_millis(50),
            cascade_fail: false,
        },
    );
    Harness {
        store,
        scenarios,
        router,
    }
}

/// Recompute every invariant of the published graph from scratch.
async fn assert_graph_invariants(store: &InMemoryGraphStore, scenario_id: &str) {
    let tasks = store.scenario_tasks(scenario_id).await.unwrap();
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    for task in &tasks {
        // A queued task has no unmet dependencies.
        if task.status == TaskStatus::Queued {
            assert_eq!(task.pending_count, 0, "queued task {} has deps", task.id);
        }

        // pending_count equals the recomputed number of upstream tasks
        // that have not reached SUCCESS (frozen once terminal).
        if !task.status.is_terminal() && task.status == TaskStatus::Pending {
            let unmet = task
                .upstream_ids()
                .iter()
                .filter(|id| by_id[id.as_str()].status != TaskStatus::Success)
                .count();
            assert_eq!(
                task.pending_count as usize, unmet,
                "pending_count drift on {}",
                task.id
            );
        }

        // consumers/input_refs symmetry.
        for consumer in &task.consumers {
            assert!(
                by_id[consumer.as_str()].upstream_ids().contains(&task.id),
                "consumer edge {} -> {} has no matching input_ref",
                task.id,
                consumer
            );
        }
        for upstream in task.upstream_ids() {
            assert!(
                by_id[upstream.as_str()].consumers.contains(&task.id),
                "input_ref {} -> {} has no matching consumer edge",
                upstream,
                task.id
            );
        }
    }

    // No task id sits on more than one queue, or twice on the same one,
    // and everything on a queue is QUEUED.
    let mut seen = HashSet::new();
    for (service, entries) in store.queue_snapshot() {
        for task_id in entries {
            assert!(
                seen.insert(task_id.clone()),
                "task {task_id} queued more than once"
            );
            let task = by_id
                .get(task_id.as_str())
                .unwrap_or_else(|| panic!("queued id {task_id} unknown"));
            assert_eq!(task.status, TaskStatus::Queued);
            assert_eq!(task.service, service);
        }
    }
}

#[tokio::test]
async fn test_invariants_hold_through_full_run() {
    let h = harness(&[FAN_OUT_FAN_IN_TEMPLATE]);
    let scenario_id = h
        .scenarios
        .submit_scenario("ScenarioCreateVideo", params(&[]))
        .await
        .unwrap();

    assert_graph_invariants(&h.store, &scenario_id).await;

    // Dispatch one task at a time, re-checking after every transition.
    let services = default_services();
    loop {
        let mut progressed = false;
        for service in &services {
            if let Some(task) = h
                .router
                .claim_with_timeout(service, Duration::from_millis(10))
                .await
                .unwrap()
            {
                assert_graph_invariants(&h.store, &scenario_id).await;
                h.router.succeed(&task.id, "out/ref").await.unwrap();
                assert_graph_invariants(&h.store, &scenario_id).await;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    let tasks = h.store.scenario_tasks(&scenario_id).await.unwrap();
    assert_eq!(tasks.len(), 9);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Success));
}

#[tokio::test]
async fn test_invariants_hold_after_mid_graph_failure() {
    let h = harness(&[FAN_OUT_FAN_IN_TEMPLATE]);
    let scenario_id = h
        .scenarios
        .submit_scenario("ScenarioCreateVideo", params(&[]))
        .await
        .unwrap();

    // Complete the root, then fail one of the fanned-out prompts.
    let text = h
        .router
        .claim_with_timeout("text-service", Duration::from_millis(50))
        .await
        .unwrap()
        .unwrap();
    h.router.succeed(&text.id, "out/text.txt").await.unwrap();
    assert_graph_invariants(&h.store, &scenario_id).await;

    let prompt = h
        .router
        .claim_with_timeout("text-service", Duration::from_millis(50))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prompt.name, "CreateSlidePrompt");
    h.router.fail(&prompt.id, "llm refusal").await.unwrap();
    assert_graph_invariants(&h.store, &scenario_id).await;

    // The slide behind the failed prompt is still blocked.
    let tasks = h.store.scenario_tasks(&scenario_id).await.unwrap();
    let blocked: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.upstream_ids().contains(&prompt.id))
        .collect();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].status, TaskStatus::Pending);
    assert_eq!(blocked[0].pending_count, 1);
}
