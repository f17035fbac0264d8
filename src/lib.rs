//! Scenario-driven task orchestration core.
//!
//! 把命名场景模板展开成任务 DAG，发布到共享存储，并在上游全部
//! 成功的瞬间把下游任务分发到对应的 worker 队列。

pub mod app;

pub use app::Application;
pub use orchestrator_application::{
    QueryService, ScenarioService, ScenarioView, TemplateRegistry,
};
pub use orchestrator_config::AppConfig;
pub use orchestrator_dispatcher::{
    ConsumerRouter, GraphPublisher, RecoveryService, StatusController,
};
pub use orchestrator_domain::{
    FanOut, GraphStore, Scenario, ScenarioProgress, Task, TaskStatus,
};
pub use orchestrator_errors::{OrchestratorError, OrchestratorResult};

#[cfg(test)]
mod invariant_tests;
