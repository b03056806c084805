use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use routing_api::{create_app, AppState, OrderPlacementService, RoutingIntakeService};
use routing_core::traits::{BranchDirectory, MessageQueue, OrderRepository};
use routing_core::AppConfig;
use routing_dispatcher::{RadiusPolicy, RoutingDecisionEngine};
use routing_infrastructure::{
    create_sqlite_pool, init_schema, BroadcastNotifier, MessageQueueFactory,
    SqliteBranchDirectory, SqliteOrderRepository,
};
use routing_worker::WorkerService;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

/// Worker停止时等待进行中路由的最长时间
const WORKER_STOP_GRACE: Duration = Duration::from_secs(20);

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行路由Worker
    Worker,
    /// 仅运行API服务器
    Api,
    /// 运行所有组件
    All,
}

impl AppMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "worker" => Ok(AppMode::Worker),
            "api" => Ok(AppMode::Api),
            "all" => Ok(AppMode::All),
            other => Err(anyhow::anyhow!("无效的运行模式: {}", other)),
        }
    }
}

/// 主应用程序
#[derive(Clone)]
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    orders: Arc<SqliteOrderRepository>,
    directory: Arc<SqliteBranchDirectory>,
    notifier: BroadcastNotifier,
    message_queue: Arc<dyn MessageQueue>,
    engine: Arc<RoutingDecisionEngine>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        info!("连接数据库: {}", config.database.url);
        let pool = create_sqlite_pool(&config.database)
            .await
            .context("连接数据库失败")?;
        init_schema(&pool).await.context("初始化数据库表失败")?;

        info!("连接消息队列: {}", mask_amqp_url(&config.message_queue.url));
        let message_queue = MessageQueueFactory::create(&config.message_queue)
            .await
            .context("创建消息队列失败")?;

        let orders = Arc::new(SqliteOrderRepository::new(pool.clone()));
        let directory = Arc::new(SqliteBranchDirectory::new(pool));
        let notifier = BroadcastNotifier::new();

        let engine = Arc::new(RoutingDecisionEngine::new(
            orders.clone() as Arc<dyn OrderRepository>,
            directory.clone() as Arc<dyn BranchDirectory>,
            Arc::new(notifier.clone()),
            RadiusPolicy::from(&config.routing),
        ));

        Ok(Self {
            config,
            mode,
            orders,
            directory,
            notifier,
            message_queue,
            engine,
        })
    }

    /// 运行应用程序直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        match self.mode {
            AppMode::Worker => self.run_worker(shutdown_rx).await?,
            AppMode::Api => self.run_api(shutdown_rx).await?,
            AppMode::All => self.run_all_components(shutdown_rx).await?,
        }

        Ok(())
    }

    fn build_worker(&self) -> WorkerService {
        let worker_config = &self.config.worker;
        let queue_config = &self.config.message_queue;

        WorkerService::builder(
            worker_config.worker_id.clone(),
            Arc::clone(&self.message_queue),
            Arc::clone(&self.engine),
            queue_config.routing_queue.clone(),
            queue_config.dead_letter_queue.clone(),
        )
        .max_concurrent_passes(worker_config.max_concurrent_passes)
        .poll_interval_ms(worker_config.poll_interval_ms)
        .jitter_factor(queue_config.jitter_factor)
        .build()
    }

    fn build_state(&self) -> AppState {
        let orders: Arc<dyn OrderRepository> = self.orders.clone();
        let notifier = Arc::new(self.notifier.clone());
        let intake = Arc::new(RoutingIntakeService::new(
            Arc::clone(&self.message_queue),
            self.config.message_queue.routing_queue.clone(),
            self.config.message_queue.retry_policy(),
        ));
        let placement = Arc::new(OrderPlacementService::new(
            Arc::clone(&orders),
            notifier.clone(),
            Arc::clone(&intake),
        ));

        AppState {
            orders,
            branches: self.directory.clone(),
            branch_admin: self.directory.clone(),
            events: notifier,
            queue: Arc::clone(&self.message_queue),
            intake,
            placement,
        }
    }

    /// 运行Worker模式
    async fn run_worker(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let worker = self.build_worker();
        worker.start().await.context("启动Worker失败")?;

        let _ = shutdown_rx.recv().await;
        info!("Worker收到关闭信号");

        worker
            .stop(WORKER_STOP_GRACE)
            .await
            .context("停止Worker失败")?;
        Ok(())
    }

    /// 运行API模式
    async fn run_api(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let bind_address = &self.config.api.bind_address;
        let app = create_app(self.build_state(), &self.config.api);

        let listener = TcpListener::bind(bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", bind_address))?;

        info!("API服务器启动在 http://{}", bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await
            .context("API服务器运行失败")?;

        info!("API服务器已停止");
        Ok(())
    }

    /// 运行所有组件
    async fn run_all_components(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动所有组件");

        let mut handles = Vec::new();

        if self.config.worker.enabled {
            let app = self.clone();
            let shutdown_rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = app.run_worker(shutdown_rx).await {
                    error!("Worker运行失败: {:#}", e);
                }
            }));
        }

        if self.config.api.enabled {
            let app = self.clone();
            let shutdown_rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = app.run_api(shutdown_rx).await {
                    error!("API服务器运行失败: {:#}", e);
                }
            }));
        }

        if handles.is_empty() {
            return Err(anyhow::anyhow!("Worker与API均未启用"));
        }

        for handle in handles {
            let _ = handle.await;
        }

        info!("所有组件已停止");
        Ok(())
    }
}

/// 屏蔽AMQP URL中的密码
fn mask_amqp_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let mut masked = url.to_string();
            masked.replace_range(colon_pos + 1..at_pos, "***");
            return masked;
        }
    }
    url.to_string()
}
