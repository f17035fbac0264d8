//! 场景展开器
//!
//! 把替换完成的任务模板落成具体任务图：`count` 复制、别名表、
//! 引用改写、依赖计数与消费者边的计算，最后做拓扑排序拒绝环。
//! 全程纯内存，任何一步失败都不会留下持久状态。

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use orchestrator_domain::{InputRef, Scenario, Task, TaskStatus, TaskTemplate};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

pub struct ScenarioExpander {
    services: BTreeSet<String>,
}

/// 展开产物：场景记录加按展开顺序排列的任务。
#[derive(Debug, Clone)]
pub struct Expansion {
    pub scenario: Scenario,
    pub tasks: Vec<Task>,
}

impl ScenarioExpander {
    pub fn new<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            services: services.into_iter().map(Into::into).collect(),
        }
    }

    pub fn expand(
        &self,
        scenario_id: &str,
        template_name: &str,
        template_version: &str,
        templates: &[TaskTemplate],
    ) -> OrchestratorResult<Expansion> {
        self.validate_templates(templates)?;

        let alias = build_alias_table(templates)?;
        let concrete: BTreeSet<&str> = alias
            .values()
            .flat_map(|ids| ids.iter().map(String::as_str))
            .collect();

        // 物化：逐模板按 count 复制，并把引用改写成具体任务 id。
        let now = Utc::now();
        let mut tasks = Vec::new();
        for template in templates {
            let count = template.replica_count();
            for index in 1..=count {
                let id = replica_id(&template.id, count, index);
                let mut input_refs = std::collections::BTreeMap::new();
                for (field, input) in &template.input_refs {
                    let rewritten = match input {
                        InputRef::Single(target) => InputRef::Single(resolve_scalar(
                            &id, field, target, count, index, &alias, &concrete,
                        )?),
                        InputRef::Many(targets) => InputRef::Many(resolve_list(
                            &id, field, targets, &alias, &concrete,
                        )?),
                    };
                    input_refs.insert(field.clone(), rewritten);
                }

                tasks.push(Task {
                    id,
                    scenario_id: scenario_id.to_string(),
                    service: template.service.clone(),
                    name: template.name.clone(),
                    pending_count: 0,
                    status: TaskStatus::Pending,
                    consumers: Vec::new(),
                    prompt: template.prompt.clone(),
                    params: template.params.clone(),
                    input_refs,
                    result_ref: None,
                    error: None,
                    created_at: now,
                    updated_at: now,
                });
            }
        }

        // 计算边：pending_count 取去重后的上游数，消费者边按展开顺序。
        let position: HashMap<String, usize> = tasks
            .iter()
            .enumerate()
            .map(|(i, task)| (task.id.clone(), i))
            .collect();
        let mut edges = Vec::new();
        for (task_index, task) in tasks.iter().enumerate() {
            for upstream_id in task.upstream_ids() {
                edges.push((position[&upstream_id], task_index));
            }
        }
        for &(upstream, downstream) in &edges {
            let downstream_id = tasks[downstream].id.clone();
            tasks[upstream].consumers.push(downstream_id);
            tasks[downstream].pending_count += 1;
        }

        self.check_acyclic(&tasks, &edges)?;

        let scenario = Scenario {
            scenario_id: scenario_id.to_string(),
            template_name: template_name.to_string(),
            template_version: template_version.to_string(),
            task_ids: tasks.iter().map(|task| task.id.clone()).collect(),
            created_at: now,
        };

        debug!(
            scenario_id,
            template = template_name,
            tasks = tasks.len(),
            edges = edges.len(),
            "scenario expanded"
        );
        Ok(Expansion { scenario, tasks })
    }

    fn validate_templates(&self, templates: &[TaskTemplate]) -> OrchestratorResult<()> {
        for template in templates {
            if template.id.is_empty() {
                return Err(OrchestratorError::invalid_template(
                    "task template without id",
                ));
            }
            if template.replica_count() < 0 {
                return Err(OrchestratorError::invalid_template(format!(
                    "task {} has negative count",
                    template.id
                )));
            }
            if !self.services.contains(&template.service) {
                return Err(OrchestratorError::invalid_template(format!(
                    "task {} routes to unknown service {}",
                    template.id, template.service
                )));
            }
        }
        Ok(())
    }

    fn check_acyclic(&self, tasks: &[Task], edges: &[(usize, usize)]) -> OrchestratorResult<()> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for index in 0..tasks.len() {
            graph.add_node(index);
        }
        for &(upstream, downstream) in edges {
            graph.add_edge(upstream, downstream, ());
        }
        toposort(&graph, None)
            .map(|_| ())
            .map_err(|cycle| OrchestratorError::CyclicTemplate {
                task_id: tasks[cycle.node_id()].id.clone(),
            })
    }
}

fn replica_id(template_id: &str, count: i64, index: i64) -> String {
    if count == 1 {
        template_id.to_string()
    } else {
        format!("{template_id}.{index}")
    }
}

/// 别名表：模板 id → 具体任务 id 列表。count = 0 的标签映射到空表，
/// 对它的任何引用都是悬空引用。
fn build_alias_table(
    templates: &[TaskTemplate],
) -> OrchestratorResult<HashMap<String, Vec<String>>> {
    let mut alias: HashMap<String, Vec<String>> = HashMap::new();
    let mut seen = BTreeSet::new();

    for template in templates {
        if alias.contains_key(&template.id) {
            return Err(OrchestratorError::IdCollision {
                label: template.id.clone(),
            });
        }
        let count = template.replica_count();
        let ids: Vec<String> = (1..=count)
            .map(|index| replica_id(&template.id, count, index))
            .collect();
        for id in &ids {
            if !seen.insert(id.clone()) {
                return Err(OrchestratorError::IdCollision { label: id.clone() });
            }
        }
        alias.insert(template.id.clone(), ids);
    }
    Ok(alias)
}

/// 标量引用改写。被引用标签若被复制，只有引用方份数相同才能按
/// 同下标配对；显式写出的 `label.N` 形式直接按具体 id 解析。
fn resolve_scalar(
    task_id: &str,
    field: &str,
    target: &str,
    count: i64,
    index: i64,
    alias: &HashMap<String, Vec<String>>,
    concrete: &BTreeSet<&str>,
) -> OrchestratorResult<String> {
    if let Some(ids) = alias.get(target) {
        return match ids.len() {
            0 => Err(dangling(task_id, field, target)),
            1 => Ok(ids[0].clone()),
            n if count == n as i64 => Ok(ids[(index - 1) as usize].clone()),
            _ => Err(OrchestratorError::AmbiguousReference {
                task_id: task_id.to_string(),
                field: field.to_string(),
                label: target.to_string(),
            }),
        };
    }
    if concrete.contains(target) {
        return Ok(target.to_string());
    }
    Err(dangling(task_id, field, target))
}

/// 列表引用改写：每个元素展开成其标签的完整别名表。
fn resolve_list(
    task_id: &str,
    field: &str,
    targets: &[String],
    alias: &HashMap<String, Vec<String>>,
    concrete: &BTreeSet<&str>,
) -> OrchestratorResult<Vec<String>> {
    let mut out = Vec::new();
    for target in targets {
        if let Some(ids) = alias.get(target) {
            if ids.is_empty() {
                return Err(dangling(task_id, field, target));
            }
            out.extend(ids.iter().cloned());
        } else if concrete.contains(target.as_str()) {
            out.push(target.clone());
        } else {
            return Err(dangling(task_id, field, target));
        }
    }
    Ok(out)
}

fn dangling(task_id: &str, field: &str, label: &str) -> OrchestratorError {
    OrchestratorError::DanglingReference {
        task_id: task_id.to_string(),
        field: field.to_string(),
        label: label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_domain::InputRef;

    fn expander() -> ScenarioExpander {
        ScenarioExpander::new([
            "text-service",
            "voice-service",
            "image-service",
            "video-service",
        ])
    }

    fn template(id: &str, service: &str, name: &str) -> TaskTemplate {
        TaskTemplate {
            id: id.to_string(),
            service: service.to_string(),
            name: name.to_string(),
            count: None,
            prompt: None,
            params: serde_json::Map::new(),
            input_refs: std::collections::BTreeMap::new(),
        }
    }

    fn with_single_ref(mut tpl: TaskTemplate, field: &str, target: &str) -> TaskTemplate {
        tpl.input_refs
            .insert(field.to_string(), InputRef::Single(target.to_string()));
        tpl
    }

    #[test]
    fn test_linear_chain() {
        let text = template("text1", "text-service", "CreateText");
        let voice = with_single_ref(
            template("voice1", "voice-service", "CreateVoice"),
            "text_task_id",
            "text1",
        );

        let expansion = expander()
            .expand("sc1", "ScenarioCreateVoice", "1", &[text, voice])
            .unwrap();

        assert_eq!(expansion.tasks.len(), 2);
        let text = &expansion.tasks[0];
        let voice = &expansion.tasks[1];
        assert_eq!(text.pending_count, 0);
        assert_eq!(text.consumers, vec!["voice1".to_string()]);
        assert_eq!(voice.pending_count, 1);
        assert!(voice.consumers.is_empty());
        assert_eq!(
            expansion.scenario.task_ids,
            vec!["text1".to_string(), "voice1".to_string()]
        );
        assert!(expansion.tasks.iter().all(|t| t.status == TaskStatus::Pending));
    }

    #[test]
    fn test_count_multiplication_with_index_pairing() {
        let text = template("text1", "text-service", "CreateText");
        let mut prompts = with_single_ref(
            template("prompt", "text-service", "CreateSlidePrompt"),
            "text_task_id",
            "text1",
        );
        prompts.count = Some(3);
        let mut slides = with_single_ref(
            template("slide", "image-service", "CreateSlide"),
            "slide_prompt_id",
            "prompt",
        );
        slides.count = Some(3);

        let expansion = expander()
            .expand("sc1", "ScenarioCreateSlides", "1", &[text, prompts, slides])
            .unwrap();

        assert_eq!(expansion.tasks.len(), 7);
        let ids: Vec<&str> = expansion.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "text1", "prompt.1", "prompt.2", "prompt.3", "slide.1", "slide.2", "slide.3"
            ]
        );

        // 每个 slide 配对同下标的 prompt。
        for i in 1..=3 {
            let slide = expansion
                .tasks
                .iter()
                .find(|t| t.id == format!("slide.{i}"))
                .unwrap();
            assert_eq!(
                slide.input_refs.get("slide_prompt_id"),
                Some(&InputRef::Single(format!("prompt.{i}")))
            );
            assert_eq!(slide.pending_count, 1);
        }

        // text1 的消费者是三个 prompt 副本，按展开顺序。
        let text = &expansion.tasks[0];
        assert_eq!(
            text.consumers,
            vec!["prompt.1".to_string(), "prompt.2".to_string(), "prompt.3".to_string()]
        );
    }

    #[test]
    fn test_list_reference_expands_to_full_alias() {
        let mut slides = template("slide", "image-service", "CreateSlide");
        slides.count = Some(3);
        let voice = template("voice1", "voice-service", "CreateVoice");
        let mut video = template("video1", "video-service", "CreateVideo");
        video.input_refs.insert(
            "slide_ids".to_string(),
            InputRef::Many(vec!["slide".to_string()]),
        );
        video.input_refs.insert(
            "voice_track_id".to_string(),
            InputRef::Single("voice1".to_string()),
        );

        let expansion = expander()
            .expand("sc1", "ScenarioCreateVideo", "1", &[slides, voice, video])
            .unwrap();

        let video = expansion.tasks.iter().find(|t| t.id == "video1").unwrap();
        assert_eq!(
            video.input_refs.get("slide_ids").unwrap().ids(),
            vec!["slide.1", "slide.2", "slide.3"]
        );
        assert_eq!(video.pending_count, 4);
    }

    #[test]
    fn test_scalar_reference_to_multiplied_label_is_ambiguous() {
        let mut slides = template("slide", "image-service", "CreateSlide");
        slides.count = Some(3);
        let video = with_single_ref(
            template("video1", "video-service", "CreateVideo"),
            "slide_id",
            "slide",
        );

        let err = expander()
            .expand("sc1", "ScenarioCreateVideo", "1", &[slides, video])
            .unwrap_err();
        assert_eq!(err.kind(), "AMBIGUOUS_REFERENCE");
    }

    #[test]
    fn test_explicit_indexed_reference_is_allowed() {
        let mut slides = template("slide", "image-service", "CreateSlide");
        slides.count = Some(3);
        let video = with_single_ref(
            template("video1", "video-service", "CreateVideo"),
            "slide_id",
            "slide.2",
        );

        let expansion = expander()
            .expand("sc1", "ScenarioCreateVideo", "1", &[slides, video])
            .unwrap();
        let video = expansion.tasks.iter().find(|t| t.id == "video1").unwrap();
        assert_eq!(
            video.input_refs.get("slide_id"),
            Some(&InputRef::Single("slide.2".to_string()))
        );
    }

    #[test]
    fn test_zero_count_reference_is_dangling() {
        let mut slides = template("slide", "image-service", "CreateSlide");
        slides.count = Some(0);
        let video = with_single_ref(
            template("video1", "video-service", "CreateVideo"),
            "slide_id",
            "slide",
        );

        let err = expander()
            .expand("sc1", "ScenarioCreateVideo", "1", &[slides, video])
            .unwrap_err();
        assert_eq!(err.kind(), "DANGLING_REFERENCE");
    }

    #[test]
    fn test_zero_count_without_references_just_disappears() {
        let mut slides = template("slide", "image-service", "CreateSlide");
        slides.count = Some(0);
        let text = template("text1", "text-service", "CreateText");

        let expansion = expander()
            .expand("sc1", "ScenarioCreateText", "1", &[slides, text])
            .unwrap();
        assert_eq!(expansion.tasks.len(), 1);
        assert_eq!(expansion.tasks[0].id, "text1");
    }

    #[test]
    fn test_unknown_reference_is_dangling() {
        let voice = with_single_ref(
            template("voice1", "voice-service", "CreateVoice"),
            "text_task_id",
            "nope",
        );
        let err = expander()
            .expand("sc1", "ScenarioCreateVoice", "1", &[voice])
            .unwrap_err();
        assert_eq!(err.kind(), "DANGLING_REFERENCE");
    }

    #[test]
    fn test_cycle_is_rejected() {
        let a = with_single_ref(
            template("a", "text-service", "CreateText"),
            "other_id",
            "b",
        );
        let b = with_single_ref(
            template("b", "text-service", "CreateText"),
            "other_id",
            "a",
        );
        let err = expander()
            .expand("sc1", "ScenarioCycle", "1", &[a, b])
            .unwrap_err();
        assert_eq!(err.kind(), "CYCLIC_TEMPLATE");
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let a = with_single_ref(
            template("a", "text-service", "CreateText"),
            "other_id",
            "a",
        );
        let err = expander()
            .expand("sc1", "ScenarioSelf", "1", &[a])
            .unwrap_err();
        assert_eq!(err.kind(), "CYCLIC_TEMPLATE");
    }

    #[test]
    fn test_duplicate_template_ids_collide() {
        let a = template("same", "text-service", "CreateText");
        let b = template("same", "voice-service", "CreateVoice");
        let err = expander()
            .expand("sc1", "ScenarioDup", "1", &[a, b])
            .unwrap_err();
        assert_eq!(err.kind(), "ID_COLLISION");
    }

    #[test]
    fn test_unknown_service_is_invalid_template() {
        let a = template("a", "midi-service", "CreateJingle");
        let err = expander()
            .expand("sc1", "ScenarioJingle", "1", &[a])
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_TEMPLATE");
    }

    #[test]
    fn test_duplicate_upstream_counts_once() {
        let text = template("text1", "text-service", "CreateText");
        let mut video = template("video1", "video-service", "CreateVideo");
        video.input_refs.insert(
            "text_task_id".to_string(),
            InputRef::Single("text1".to_string()),
        );
        video.input_refs.insert(
            "script_id".to_string(),
            InputRef::Single("text1".to_string()),
        );

        let expansion = expander()
            .expand("sc1", "ScenarioVideo", "1", &[text, video])
            .unwrap();
        let video = expansion.tasks.iter().find(|t| t.id == "video1").unwrap();
        assert_eq!(video.pending_count, 1);
        let text = expansion.tasks.iter().find(|t| t.id == "text1").unwrap();
        assert_eq!(text.consumers, vec!["video1".to_string()]);
    }

    #[test]
    fn test_consumers_and_input_refs_are_symmetric() {
        let text = template("text1", "text-service", "CreateText");
        let mut prompts = with_single_ref(
            template("prompt", "text-service", "CreateSlidePrompt"),
            "text_task_id",
            "text1",
        );
        prompts.count = Some(2);
        let voice = with_single_ref(
            template("voice1", "voice-service", "CreateVoice"),
            "text_task_id",
            "text1",
        );

        let expansion = expander()
            .expand("sc1", "ScenarioMix", "1", &[text, prompts, voice])
            .unwrap();

        let by_id: HashMap<&str, &Task> = expansion
            .tasks
            .iter()
            .map(|t| (t.id.as_str(), t))
            .collect();
        for task in &expansion.tasks {
            for upstream in task.upstream_ids() {
                assert!(by_id[upstream.as_str()]
                    .consumers
                    .contains(&task.id));
            }
            for consumer in &task.consumers {
                assert!(by_id[consumer.as_str()]
                    .upstream_ids()
                    .contains(&task.id));
            }
        }
    }
}
