use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use orchestrator_application::{
    QueryService, ScenarioExpander, ScenarioService, TemplateRegistry,
};
use orchestrator_config::{AppConfig, LogConfig};
use orchestrator_dispatcher::{
    ConsumerRouter, GraphPublisher, RecoveryService, RouterConfig, StatusController,
};
use orchestrator_domain::GraphStore;
use orchestrator_infrastructure::create_store;

/// 编排器应用：配置 → 存储后端 → 各服务的装配。
///
/// 进程本身无状态，同一份配置可以起任意多个实例共享存储。
pub struct Application {
    config: AppConfig,
    store: Arc<dyn GraphStore>,
    scenarios: ScenarioService,
    queries: QueryService,
    router: ConsumerRouter,
    controller: StatusController,
    janitor: Arc<RecoveryService>,
}

impl Application {
    /// 从配置构建应用。模板目录（如配置了）在这里加载。
    pub async fn new(config: AppConfig) -> Result<Self> {
        let mut registry = TemplateRegistry::new();
        if !config.templates.path.is_empty() {
            let loaded = registry
                .load_dir(Path::new(&config.templates.path))
                .context("failed to load scenario templates")?;
            info!(count = loaded, path = %config.templates.path, "templates loaded");
        }
        Self::with_registry(config, registry).await
    }

    /// 用外部装配好的模板注册表构建应用（内嵌部署、测试）。
    pub async fn with_registry(config: AppConfig, registry: TemplateRegistry) -> Result<Self> {
        let store = create_store(&config.store)
            .await
            .context("failed to create graph store")?;

        let registry = Arc::new(registry);
        let expander = ScenarioExpander::new(config.services.names.clone());
        let publisher = GraphPublisher::new(store.clone());
        let scenarios = ScenarioService::new(registry, expander, publisher);
        let queries = QueryService::new(store.clone());
        let router = ConsumerRouter::new(
            store.clone(),
            RouterConfig {
                claim_timeout: Duration::from_secs(config.dispatcher.claim_timeout_seconds),
                cascade_fail: config.dispatcher.cascade_fail,
            },
        );
        let controller = StatusController::new(store.clone());
        let janitor = Arc::new(RecoveryService::new(
            store.clone(),
            Duration::from_secs(config.dispatcher.processing_horizon_seconds),
        ));

        Ok(Self {
            config,
            store,
            scenarios,
            queries,
            router,
            controller,
            janitor,
        })
    }

    /// 安装全局日志订阅器。`RUST_LOG` 优先于配置的级别。
    pub fn init_tracing(config: &LogConfig) {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if config.format == "json" {
            let _ = builder.json().try_init();
        } else {
            let _ = builder.try_init();
        }
    }

    /// 周期运行清道夫，把滞留在 `PROCESSING` 的任务转成 `FAILED`。
    pub fn spawn_janitor(&self) -> tokio::task::JoinHandle<()> {
        let janitor = self.janitor.clone();
        let interval = Duration::from_secs(self.config.dispatcher.recovery_interval_seconds);
        tokio::spawn(janitor.run(interval))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn GraphStore> {
        self.store.clone()
    }

    pub fn scenarios(&self) -> &ScenarioService {
        &self.scenarios
    }

    pub fn queries(&self) -> &QueryService {
        &self.queries
    }

    pub fn router(&self) -> &ConsumerRouter {
        &self.router
    }

    pub fn controller(&self) -> &StatusController {
        &self.controller
    }

    pub fn janitor(&self) -> &RecoveryService {
        &self.janitor
    }
}
