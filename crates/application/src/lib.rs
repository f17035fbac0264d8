//! Application Layer
//!
//! 场景提交的用例层：模板注册、占位符替换、场景展开与读侧查询。
//! 展开是纯内存计算，只有发布那一步才触碰存储。

pub mod engine;
pub mod expander;
pub mod query;
pub mod registry;
pub mod service;

pub use engine::TemplateEngine;
pub use expander::{Expansion, ScenarioExpander};
pub use query::{QueryService, ScenarioView};
pub use registry::{TemplateDocument, TemplateRegistry};
pub use service::ScenarioService;
