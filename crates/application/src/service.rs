//! 场景提交服务
//!
//! `submit_scenario` 是编排器面向调用方的唯一写入口：
//! 查模板 → 替换 → 展开 → 原子发布，返回新场景 id。
//! 任何一步失败都同步返回结构化错误，存储里不会留下半个场景。

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use orchestrator_dispatcher::GraphPublisher;
use orchestrator_domain::TaskTemplate;
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

use crate::engine::TemplateEngine;
use crate::expander::ScenarioExpander;
use crate::registry::TemplateRegistry;

pub struct ScenarioService {
    registry: Arc<TemplateRegistry>,
    expander: ScenarioExpander,
    publisher: GraphPublisher,
}

impl ScenarioService {
    pub fn new(
        registry: Arc<TemplateRegistry>,
        expander: ScenarioExpander,
        publisher: GraphPublisher,
    ) -> Self {
        Self {
            registry,
            expander,
            publisher,
        }
    }

    #[instrument(skip(self, parameters))]
    pub async fn submit_scenario(
        &self,
        template_name: &str,
        parameters: BTreeMap<String, serde_json::Value>,
    ) -> OrchestratorResult<String> {
        let document = self.registry.get(template_name)?;
        let scenario_id = Uuid::new_v4().to_string();

        let mut variables = document.variables.clone();
        variables.extend(parameters);

        let mut engine = TemplateEngine::new(&scenario_id, variables);
        let rendered = engine.render(&document.tasks)?;
        let templates: Vec<TaskTemplate> = serde_yaml::from_value(rendered).map_err(|e| {
            OrchestratorError::invalid_template(format!("task templates malformed: {e}"))
        })?;

        let expansion = self.expander.expand(
            &scenario_id,
            &document.name,
            &document.version,
            &templates,
        )?;

        self.publisher
            .publish(&expansion.scenario, expansion.tasks)
            .await?;

        info!(
            scenario_id = %scenario_id,
            template = template_name,
            "scenario submitted"
        );
        Ok(scenario_id)
    }
}
