//! 模板文档模型
//!
//! 场景模板经引擎替换后反序列化成这里的类型。`count` 在替换阶段
//! 必须已经落成整数，引用字段仍指向模板级标签 id，由展开器改写。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::InputRef;

/// 单个任务模板（占位符替换之后的形态）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskTemplate {
    pub id: String,
    pub service: String,
    pub name: String,
    /// 复制份数。缺省为 1；0 表示该标签不产生任何任务。
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub input_refs: BTreeMap<String, InputRef>,
}

impl TaskTemplate {
    pub fn replica_count(&self) -> i64 {
        self.count.unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let json = serde_json::json!({
            "id": "abc123",
            "service": "text-service",
            "name": "CreateText"
        });
        let tpl: TaskTemplate = serde_json::from_value(json).unwrap();
        assert_eq!(tpl.replica_count(), 1);
        assert!(tpl.prompt.is_none());
        assert!(tpl.params.is_empty());
        assert!(tpl.input_refs.is_empty());
    }

    #[test]
    fn test_input_ref_field_shapes() {
        let json = serde_json::json!({
            "id": "v1",
            "service": "video-service",
            "name": "CreateVideo",
            "input_refs": {
                "voice_track_id": "voice1",
                "slide_ids": ["s1", "s2", "s3"]
            }
        });
        let tpl: TaskTemplate = serde_json::from_value(json).unwrap();
        assert_eq!(
            tpl.input_refs.get("voice_track_id"),
            Some(&InputRef::Single("voice1".to_string()))
        );
        assert_eq!(
            tpl.input_refs.get("slide_ids").unwrap().ids(),
            vec!["s1", "s2", "s3"]
        );
    }
}
