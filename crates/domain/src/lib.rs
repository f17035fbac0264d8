//! Domain Model
//!
//! 场景编排系统的核心领域模型：任务、场景、模板文档与存储端口。
//! 领域层不依赖任何具体存储技术，所有编排状态通过 [`GraphStore`]
//! 抽象读写。

pub mod entities;
pub mod repositories;
pub mod template;
pub mod wire;

pub use entities::*;
pub use orchestrator_errors::{OrchestratorError, OrchestratorResult};
pub use repositories::*;
pub use template::*;
