use thiserror::Error;

#[cfg(test)]
mod tests;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown template: {name}")]
    UnknownTemplate { name: String },
    #[error("invalid template: {0}")]
    InvalidTemplate(String),
    #[error("template expansion produced a cycle involving task {task_id}")]
    CyclicTemplate { task_id: String },
    #[error("scalar field {field} of task {task_id} references multiplied label {label} without a matching index")]
    AmbiguousReference {
        task_id: String,
        field: String,
        label: String,
    },
    #[error("field {field} of task {task_id} references unknown or zero-count label {label}")]
    DanglingReference {
        task_id: String,
        field: String,
        label: String,
    },
    #[error("identifier generator produced a duplicate id for label {label}")]
    IdCollision { label: String },
    #[error("task not found: {id}")]
    TaskNotFound { id: String },
    #[error("scenario not found: {id}")]
    ScenarioNotFound { id: String },
    #[error("invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl OrchestratorError {
    pub fn unknown_template<S: Into<String>>(name: S) -> Self {
        Self::UnknownTemplate { name: name.into() }
    }
    pub fn invalid_template<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTemplate(msg.into())
    }
    pub fn task_not_found<S: Into<String>>(id: S) -> Self {
        Self::TaskNotFound { id: id.into() }
    }
    pub fn scenario_not_found<S: Into<String>>(id: S) -> Self {
        Self::ScenarioNotFound { id: id.into() }
    }
    pub fn invalid_transition<S: Into<String>>(task_id: S, from: S, to: S) -> Self {
        Self::InvalidTransition {
            task_id: task_id.into(),
            from: from.into(),
            to: to.into(),
        }
    }
    pub fn store_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::StoreUnavailable(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// 稳定的错误类别标识，提交方以此区分结构化错误。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTemplate { .. } => "UNKNOWN_TEMPLATE",
            Self::InvalidTemplate(_) => "INVALID_TEMPLATE",
            Self::CyclicTemplate { .. } => "CYCLIC_TEMPLATE",
            Self::AmbiguousReference { .. } => "AMBIGUOUS_REFERENCE",
            Self::DanglingReference { .. } => "DANGLING_REFERENCE",
            Self::IdCollision { .. } => "ID_COLLISION",
            Self::TaskNotFound { .. } => "UNKNOWN_TASK",
            Self::ScenarioNotFound { .. } => "UNKNOWN_SCENARIO",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Serialization(_) => "SERIALIZATION",
            Self::Configuration(_) => "CONFIGURATION",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// 调用方可安全重试的错误（幂等操作失败后重新提交）。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Internal(_))
    }

    /// 展开期错误：同步返回给提交方，不落任何状态。
    pub fn is_expansion_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownTemplate { .. }
                | Self::InvalidTemplate(_)
                | Self::CyclicTemplate { .. }
                | Self::AmbiguousReference { .. }
                | Self::DanglingReference { .. }
                | Self::IdCollision { .. }
        )
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for OrchestratorError {
    fn from(err: anyhow::Error) -> Self {
        OrchestratorError::Internal(err.to_string())
    }
}
