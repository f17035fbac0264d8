//! Test data builders for tasks and scenarios, with sensible defaults and
//! `with_*` customization.

use orchestrator_domain::{InputRef, Scenario, Task, TaskStatus};

pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            task: Task::new(id, "scenario-1", "text-service", "CreateText"),
        }
    }

    pub fn with_scenario(mut self, scenario_id: &str) -> Self {
        self.task.scenario_id = scenario_id.to_string();
        self
    }

    pub fn with_service(mut self, service: &str) -> Self {
        self.task.service = service.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn with_pending_count(mut self, pending_count: u32) -> Self {
        self.task.pending_count = pending_count;
        self
    }

    pub fn with_consumers(mut self, consumers: &[&str]) -> Self {
        self.task.consumers = consumers.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.task.prompt = Some(prompt.to_string());
        self
    }

    pub fn with_param(mut self, key: &str, value: serde_json::Value) -> Self {
        self.task.params.insert(key.to_string(), value);
        self
    }

    pub fn with_input(mut self, field: &str, target: &str) -> Self {
        self.task
            .input_refs
            .insert(field.to_string(), InputRef::Single(target.to_string()));
        self
    }

    pub fn with_inputs(mut self, field: &str, targets: &[&str]) -> Self {
        self.task.input_refs.insert(
            field.to_string(),
            InputRef::Many(targets.iter().map(|s| s.to_string()).collect()),
        );
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

pub struct ScenarioBuilder {
    scenario: Scenario,
}

impl ScenarioBuilder {
    pub fn new(scenario_id: &str) -> Self {
        Self {
            scenario: Scenario::new(scenario_id, "ScenarioTest", "1"),
        }
    }

    pub fn with_template(mut self, name: &str, version: &str) -> Self {
        self.scenario.template_name = name.to_string();
        self.scenario.template_version = version.to_string();
        self
    }

    pub fn with_task_ids(mut self, ids: &[&str]) -> Self {
        self.scenario.task_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn build(self) -> Scenario {
        self.scenario
    }
}
