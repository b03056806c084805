use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge};
use rand::Rng;
use routing_core::models::{DeadLetterRecord, Message, MessageType, RoutingRequest};
use routing_core::traits::MessageQueue;
use routing_core::{RoutingError, RoutingResult};
use routing_dispatcher::{RoutingDecisionEngine, RoutingOutcome};
use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// 单条消息的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// 路由完成并确认
    Completed(RoutingOutcome),
    /// 可重试失败，已按退避重新投递
    Retried { next_attempt: u32, delay_ms: u64 },
    /// 不可重试或次数耗尽，已写入死信队列
    DeadLettered { attempts: u32, error: String },
    /// 路由队列中出现了非路由请求，直接确认丢弃
    Discarded,
}

/// Worker服务构建器
pub struct WorkerServiceBuilder {
    worker_id: String,
    message_queue: Arc<dyn MessageQueue>,
    engine: Arc<RoutingDecisionEngine>,
    routing_queue: String,
    dead_letter_queue: String,
    max_concurrent_passes: usize,
    poll_interval_ms: u64,
    jitter_factor: f64,
    hostname: String,
}

impl WorkerServiceBuilder {
    /// 创建新的构建器
    pub fn new(
        worker_id: String,
        message_queue: Arc<dyn MessageQueue>,
        engine: Arc<RoutingDecisionEngine>,
        routing_queue: String,
        dead_letter_queue: String,
    ) -> Self {
        Self {
            worker_id,
            message_queue,
            engine,
            routing_queue,
            dead_letter_queue,
            max_concurrent_passes: 16,
            poll_interval_ms: 200,
            jitter_factor: 0.0,
            hostname: hostname::get()
                .unwrap_or_else(|_| "unknown".into())
                .to_string_lossy()
                .to_string(),
        }
    }

    /// 设置单批最大并发路由数
    pub fn max_concurrent_passes(mut self, max_concurrent_passes: usize) -> Self {
        self.max_concurrent_passes = max_concurrent_passes.max(1);
        self
    }

    /// 设置轮询间隔
    pub fn poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// 设置退避抖动比例，取值 [0, 1)
    pub fn jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 0.99);
        self
    }

    /// 设置主机名
    pub fn hostname(mut self, hostname: String) -> Self {
        self.hostname = hostname;
        self
    }

    /// 构建WorkerService
    pub fn build(self) -> WorkerService {
        WorkerService {
            worker_id: self.worker_id,
            message_queue: self.message_queue,
            engine: self.engine,
            routing_queue: self.routing_queue,
            dead_letter_queue: self.dead_letter_queue,
            max_concurrent_passes: self.max_concurrent_passes,
            poll_interval_ms: self.poll_interval_ms,
            jitter_factor: self.jitter_factor,
            hostname: self.hostname,
            active_passes: Arc::new(AtomicUsize::new(0)),
            shutdown_tx: Arc::new(RwLock::new(None)),
            is_running: Arc::new(RwLock::new(false)),
        }
    }
}

/// 路由请求消费者
///
/// 轮询路由队列，每批消息以有限并发交给决策引擎。成功即确认；
/// 可重试失败按 `base * 2^(n-1)` 延迟重新投递；不可重试或次数耗尽则
/// 写入死信队列。原消息总是在后续投递落地之后才确认，崩溃时由队列重投。
#[derive(Clone)]
pub struct WorkerService {
    /// Worker唯一标识
    worker_id: String,

    /// 消息队列客户端
    message_queue: Arc<dyn MessageQueue>,

    engine: Arc<RoutingDecisionEngine>,

    routing_queue: String,

    dead_letter_queue: String,

    max_concurrent_passes: usize,

    /// 轮询间隔（毫秒）
    poll_interval_ms: u64,

    jitter_factor: f64,

    /// 主机名
    hostname: String,

    /// 正在执行的路由数
    active_passes: Arc<AtomicUsize>,

    /// 停止信号
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,

    /// 是否正在运行
    is_running: Arc<RwLock<bool>>,
}

impl WorkerService {
    /// 创建构建器
    pub fn builder(
        worker_id: String,
        message_queue: Arc<dyn MessageQueue>,
        engine: Arc<RoutingDecisionEngine>,
        routing_queue: String,
        dead_letter_queue: String,
    ) -> WorkerServiceBuilder {
        WorkerServiceBuilder::new(
            worker_id,
            message_queue,
            engine,
            routing_queue,
            dead_letter_queue,
        )
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn active_passes(&self) -> usize {
        self.active_passes.load(Ordering::SeqCst)
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// 启动轮询任务
    pub async fn start(&self) -> RoutingResult<()> {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return Err(RoutingError::Internal("Worker服务已在运行".to_string()));
        }

        info!("启动Worker服务: {}@{}", self.worker_id, self.hostname);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        {
            let mut tx_guard = self.shutdown_tx.write().await;
            *tx_guard = Some(shutdown_tx);
        }

        let polling_service = self.clone();
        tokio::spawn(async move {
            polling_service.run_polling(shutdown_rx).await;
        });

        *is_running = true;
        info!(
            "Worker服务启动成功: {}，监听队列 {}",
            self.worker_id, self.routing_queue
        );
        Ok(())
    }

    /// 停止轮询并等待进行中的路由结束，最多等待 `grace`
    pub async fn stop(&self, grace: Duration) -> RoutingResult<()> {
        let mut is_running = self.is_running.write().await;
        if !*is_running {
            return Ok(());
        }

        info!("停止Worker服务: {}", self.worker_id);

        {
            let tx_guard = self.shutdown_tx.read().await;
            if let Some(ref shutdown_tx) = *tx_guard {
                let _ = shutdown_tx.send(());
            }
        }

        let deadline = tokio::time::Instant::now() + grace;
        while self.active_passes() > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "等待超时，仍有 {} 个路由未完成，交由队列重投",
                    self.active_passes()
                );
                break;
            }
            debug!("等待 {} 个路由完成...", self.active_passes());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        *is_running = false;
        info!("Worker服务已停止: {}", self.worker_id);
        Ok(())
    }

    async fn run_polling(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut poll_interval = interval(Duration::from_millis(self.poll_interval_ms.max(1)));

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!("路由队列轮询失败: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("路由队列轮询收到停止信号");
                    break;
                }
            }
        }
    }

    /// 拉取一批消息并处理，返回处理的消息数
    pub async fn poll_once(&self) -> RoutingResult<usize> {
        let messages = self
            .message_queue
            .consume_messages(&self.routing_queue)
            .await?;

        if let Ok(depth) = self.message_queue.get_queue_size(&self.routing_queue).await {
            gauge!("routing_queue_depth").set(depth as f64);
        }

        let count = messages.len();
        if count == 0 {
            return Ok(0);
        }
        debug!("从队列 {} 取到 {} 条消息", self.routing_queue, count);

        stream::iter(messages)
            .for_each_concurrent(self.max_concurrent_passes, |message| async move {
                if let Err(e) = self.handle_message(message).await {
                    error!("消息处理失败: {}", e);
                }
            })
            .await;

        Ok(count)
    }

    /// 处理单条消息并完成确认
    pub async fn handle_message(&self, message: Message) -> RoutingResult<Disposition> {
        self.active_passes.fetch_add(1, Ordering::SeqCst);
        let result = self.dispose(&message).await;
        self.active_passes.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(disposition) => {
                self.message_queue.ack_message(&message.id).await?;
                Ok(disposition)
            }
            Err(e) => {
                // 后续投递没有落地，原消息退回队列
                warn!("消息 {} 的后续投递失败，退回队列: {}", message.id, e);
                self.message_queue.nack_message(&message.id, true).await?;
                Err(e)
            }
        }
    }

    async fn dispose(&self, message: &Message) -> RoutingResult<Disposition> {
        let request = match &message.message_type {
            MessageType::RoutingRequest(request) => request,
            _ => {
                warn!(
                    "路由队列收到非路由消息 {} ({})，丢弃",
                    message.id,
                    message.message_type_str()
                );
                return Ok(Disposition::Discarded);
            }
        };

        debug!(
            order_id = %request.order_id,
            attempt = message.attempt,
            "开始路由"
        );

        match self.engine.route(request, &message.id).await {
            Ok(outcome) => {
                info!(
                    order_id = %request.order_id,
                    attempt = message.attempt,
                    outcome = outcome.label(),
                    "路由完成"
                );
                Ok(Disposition::Completed(outcome))
            }
            Err(e) => {
                let retryable = e.is_retryable();
                counter!(
                    "routing_failures_total",
                    "retryable" => if retryable { "true" } else { "false" }
                )
                .increment(1);

                if retryable && !message.is_retry_exhausted() {
                    self.schedule_retry(message, &e).await
                } else {
                    self.dead_letter(message, request, &e).await
                }
            }
        }
    }

    async fn schedule_retry(
        &self,
        message: &Message,
        error: &RoutingError,
    ) -> RoutingResult<Disposition> {
        let delay_ms = self.backoff_ms(message);
        let next = message.next_attempt();

        warn!(
            "消息 {} 第 {} 次路由失败 ({})，{}ms 后进行第 {} 次尝试",
            message.id, message.attempt, error, delay_ms, next.attempt
        );

        self.message_queue
            .publish_delayed(&self.routing_queue, &next, Duration::from_millis(delay_ms))
            .await?;
        counter!("routing_retries_total").increment(1);

        Ok(Disposition::Retried {
            next_attempt: next.attempt,
            delay_ms,
        })
    }

    async fn dead_letter(
        &self,
        message: &Message,
        request: &RoutingRequest,
        error: &RoutingError,
    ) -> RoutingResult<Disposition> {
        if error.requires_operator() {
            error!(
                order_id = %request.order_id,
                "路由失败需要人工处理: {}", error
            );
        } else {
            warn!(
                order_id = %request.order_id,
                attempts = message.attempt,
                "路由失败，写入死信队列: {}", error
            );
        }

        let record = DeadLetterRecord {
            original: request.clone(),
            message_id: message.id.clone(),
            attempts: message.attempt,
            error: error.to_string(),
            failed_at: Utc::now(),
        };
        self.message_queue
            .publish_message(&self.dead_letter_queue, &Message::dead_letter(record))
            .await?;
        counter!("routing_dead_letters_total").increment(1);

        Ok(Disposition::DeadLettered {
            attempts: message.attempt,
            error: error.to_string(),
        })
    }

    fn backoff_ms(&self, message: &Message) -> u64 {
        let base = message.retry_policy.backoff_ms(message.attempt);
        if self.jitter_factor <= 0.0 {
            return base;
        }
        let factor = rand::rng().random_range(-self.jitter_factor..=self.jitter_factor);
        ((base as f64) * (1.0 + factor)).round().max(0.0) as u64
    }
}
