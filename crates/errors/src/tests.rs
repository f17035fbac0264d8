#[cfg(test)]
mod error_tests {
    use crate::*;

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::unknown_template("ScenarioCreateVideo");
        assert_eq!(err.to_string(), "unknown template: ScenarioCreateVideo");

        let err = OrchestratorError::invalid_template("missing tasks section");
        assert_eq!(err.to_string(), "invalid template: missing tasks section");

        let err = OrchestratorError::CyclicTemplate {
            task_id: "a1b2c3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "template expansion produced a cycle involving task a1b2c3"
        );

        let err = OrchestratorError::task_not_found("deadbeef");
        assert_eq!(err.to_string(), "task not found: deadbeef");

        let err = OrchestratorError::invalid_transition("t1", "success", "processing");
        assert_eq!(
            err.to_string(),
            "invalid transition for task t1: success -> processing"
        );

        let err = OrchestratorError::store_unavailable("connection refused");
        assert_eq!(err.to_string(), "store unavailable: connection refused");
    }

    #[test]
    fn test_error_kinds_are_stable() {
        let cases = [
            (OrchestratorError::unknown_template("x"), "UNKNOWN_TEMPLATE"),
            (OrchestratorError::invalid_template("x"), "INVALID_TEMPLATE"),
            (
                OrchestratorError::CyclicTemplate {
                    task_id: "x".to_string(),
                },
                "CYCLIC_TEMPLATE",
            ),
            (
                OrchestratorError::AmbiguousReference {
                    task_id: "t".to_string(),
                    field: "slide_prompt_id".to_string(),
                    label: "slide_prompt".to_string(),
                },
                "AMBIGUOUS_REFERENCE",
            ),
            (
                OrchestratorError::DanglingReference {
                    task_id: "t".to_string(),
                    field: "slide_ids".to_string(),
                    label: "slide".to_string(),
                },
                "DANGLING_REFERENCE",
            ),
            (
                OrchestratorError::IdCollision {
                    label: "slide".to_string(),
                },
                "ID_COLLISION",
            ),
            (OrchestratorError::task_not_found("x"), "UNKNOWN_TASK"),
            (
                OrchestratorError::scenario_not_found("x"),
                "UNKNOWN_SCENARIO",
            ),
            (
                OrchestratorError::invalid_transition("t", "pending", "success"),
                "INVALID_TRANSITION",
            ),
            (
                OrchestratorError::store_unavailable("x"),
                "STORE_UNAVAILABLE",
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(OrchestratorError::store_unavailable("timeout").is_retryable());
        assert!(!OrchestratorError::invalid_template("x").is_retryable());
        assert!(!OrchestratorError::invalid_transition("t", "queued", "success").is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(OrchestratorError::config_error("bad url").is_fatal());
        assert!(OrchestratorError::internal("bug").is_fatal());
        assert!(!OrchestratorError::store_unavailable("timeout").is_fatal());
        assert!(!OrchestratorError::task_not_found("x").is_fatal());
    }

    #[test]
    fn test_expansion_error_classification() {
        assert!(OrchestratorError::unknown_template("x").is_expansion_error());
        assert!(OrchestratorError::invalid_template("x").is_expansion_error());
        assert!(OrchestratorError::IdCollision {
            label: "slide".to_string()
        }
        .is_expansion_error());
        assert!(!OrchestratorError::task_not_found("x").is_expansion_error());
        assert!(!OrchestratorError::store_unavailable("x").is_expansion_error());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: OrchestratorError = json_err.into();
        assert!(matches!(err, OrchestratorError::Serialization(_)));
    }

    #[test]
    fn test_from_anyhow_error() {
        let err: OrchestratorError = anyhow::anyhow!("wiring failed").into();
        assert!(matches!(err, OrchestratorError::Internal(_)));
        assert_eq!(err.to_string(), "internal error: wiring failed");
    }

    #[test]
    fn test_result_alias() {
        fn lookup(found: bool) -> OrchestratorResult<&'static str> {
            if found {
                Ok("task")
            } else {
                Err(OrchestratorError::task_not_found("missing"))
            }
        }

        assert_eq!(lookup(true).unwrap(), "task");
        assert_eq!(lookup(false).unwrap_err().kind(), "UNKNOWN_TASK");
    }
}
