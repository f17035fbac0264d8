//! 模板注册表
//!
//! 场景模板以 YAML 文档注册（单文件可含多个 `---` 分隔的文档），
//! 变量默认值在注册时解析，任务节为原始 YAML 保留到提交时再替换。

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use orchestrator_errors::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Clone)]
pub struct TemplateDocument {
    pub name: String,
    pub version: String,
    /// 变量默认值，提交参数覆盖同名项。
    pub variables: BTreeMap<String, serde_json::Value>,
    /// 未替换的任务节。
    pub tasks: serde_yaml::Value,
}

#[derive(Debug, Deserialize)]
struct RawTemplate {
    name: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    variables: BTreeMap<String, serde_yaml::Value>,
    tasks: serde_yaml::Value,
}

fn default_version() -> String {
    "1".to_string()
}

#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, TemplateDocument>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一段 YAML 源里的全部模板文档，返回注册的模板名。
    pub fn register_str(&mut self, source: &str) -> OrchestratorResult<Vec<String>> {
        let mut registered = Vec::new();

        for document in serde_yaml::Deserializer::from_str(source) {
            let value = serde_yaml::Value::deserialize(document).map_err(|e| {
                OrchestratorError::invalid_template(format!("template parse failed: {e}"))
            })?;
            if value.is_null() {
                continue;
            }
            let raw: RawTemplate = serde_yaml::from_value(value).map_err(|e| {
                OrchestratorError::invalid_template(format!("template parse failed: {e}"))
            })?;

            let mut variables = BTreeMap::new();
            for (name, value) in raw.variables {
                let json = serde_json::to_value(&value).map_err(|e| {
                    OrchestratorError::invalid_template(format!(
                        "variable {name} is not representable: {e}"
                    ))
                })?;
                variables.insert(name, json);
            }

            if !raw.tasks.is_sequence() {
                return Err(OrchestratorError::invalid_template(format!(
                    "template {} has no task list",
                    raw.name
                )));
            }

            info!(template = %raw.name, version = %raw.version, "template registered");
            registered.push(raw.name.clone());
            self.templates.insert(
                raw.name.clone(),
                TemplateDocument {
                    name: raw.name,
                    version: raw.version,
                    variables,
                    tasks: raw.tasks,
                },
            );
        }

        Ok(registered)
    }

    /// 加载目录下全部 `*.yml` / `*.yaml` 模板文件，按文件名排序。
    pub fn load_dir(&mut self, path: &Path) -> OrchestratorResult<usize> {
        let entries = std::fs::read_dir(path).map_err(|e| {
            OrchestratorError::config_error(format!(
                "cannot read template directory {}: {e}",
                path.display()
            ))
        })?;

        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|ext| ext.to_str()),
                    Some("yml") | Some("yaml")
                )
            })
            .collect();
        files.sort();

        let mut loaded = 0;
        for file in files {
            let source = std::fs::read_to_string(&file).map_err(|e| {
                OrchestratorError::config_error(format!(
                    "cannot read template file {}: {e}",
                    file.display()
                ))
            })?;
            loaded += self.register_str(&source)?.len();
        }
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> OrchestratorResult<&TemplateDocument> {
        self.templates
            .get(name)
            .ok_or_else(|| OrchestratorError::unknown_template(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TWO_DOCS: &str = r#"
name: ScenarioCreateVoice
variables:
  PROMPT: hello
tasks:
  - id: "{{ SHORT_UUID('text') }}"
    service: text-service
    name: CreateText
---
name: ScenarioCreateVideo
version: "2"
variables:
  N_SLIDES: 3
tasks:
  - id: "{{ SHORT_UUID('slide') }}"
    service: image-service
    name: CreateSlide
    count: "{{ N_SLIDES }}"
"#;

    #[test]
    fn test_register_multi_document_source() {
        let mut registry = TemplateRegistry::new();
        let names = registry.register_str(TWO_DOCS).unwrap();
        assert_eq!(names, vec!["ScenarioCreateVoice", "ScenarioCreateVideo"]);

        let voice = registry.get("ScenarioCreateVoice").unwrap();
        assert_eq!(voice.version, "1");
        assert_eq!(
            voice.variables.get("PROMPT"),
            Some(&serde_json::json!("hello"))
        );

        let video = registry.get("ScenarioCreateVideo").unwrap();
        assert_eq!(video.version, "2");
        assert_eq!(
            video.variables.get("N_SLIDES"),
            Some(&serde_json::json!(3))
        );
    }

    #[test]
    fn test_unknown_template_lookup() {
        let registry = TemplateRegistry::new();
        let err = registry.get("ScenarioMissing").unwrap_err();
        assert_eq!(err.kind(), "UNKNOWN_TEMPLATE");
    }

    #[test]
    fn test_template_without_tasks_is_invalid() {
        let mut registry = TemplateRegistry::new();
        let err = registry
            .register_str("name: Broken\ntasks: 42\n")
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_TEMPLATE");
    }

    #[test]
    fn test_malformed_yaml_is_invalid() {
        let mut registry = TemplateRegistry::new();
        let err = registry.register_str("name: [unclosed").unwrap_err();
        assert_eq!(err.kind(), "INVALID_TEMPLATE");
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("scenarios.yml")).unwrap();
        file.write_all(TWO_DOCS.as_bytes()).unwrap();
        std::fs::File::create(dir.path().join("notes.txt"))
            .unwrap()
            .write_all(b"ignored")
            .unwrap();

        let mut registry = TemplateRegistry::new();
        let loaded = registry.load_dir(dir.path()).unwrap();
        assert_eq!(loaded, 2);
        assert!(registry.get("ScenarioCreateVideo").is_ok());
    }

    #[test]
    fn test_missing_dir_is_config_error() {
        let mut registry = TemplateRegistry::new();
        let err = registry
            .load_dir(Path::new("/nonexistent/templates"))
            .unwrap_err();
        assert_eq!(err.kind(), "CONFIGURATION");
    }
}
