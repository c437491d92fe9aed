//! 进程内队列后端
//!
//! 单个 actor 任务持有 `{handlers, pending}`：
//! - `enqueue` / `subscribe` 只是把命令发进无界通道，调用方从不等待处理
//! - 没有订阅者时任务进入 pending 缓冲，绝不丢弃
//! - 注册订阅者后，把缓冲中的任务投递给当前所有订阅者并清空缓冲
//!
//! 每个订阅者有独立的投递通道，按 enqueue 顺序启动任务；
//! 每次投递都是独立的 tokio 任务，并发数由信号量限制。

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, warn};

use super::{BackendKind, JobHandler, QueueBackend};
use crate::error::{AppResult, QueueError};
use crate::models::{Job, JobHandle};

enum Command {
    Enqueue(Job),
    Subscribe(Arc<dyn JobHandler>),
}

/// 进程内队列（至少一次投递，不持久化）
pub struct InProcessQueue {
    tx: mpsc::UnboundedSender<Command>,
}

impl InProcessQueue {
    /// 创建队列并启动分发循环（需要在 tokio 运行时中调用）
    ///
    /// # 参数
    /// - `max_concurrent_jobs`: 每个订阅者同时处理的任务上限
    pub fn new(max_concurrent_jobs: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatch_loop(rx, max_concurrent_jobs.max(1)));
        Self { tx }
    }

    fn send(&self, topic: &str, command: Command) -> AppResult<()> {
        self.tx.send(command).map_err(|_| {
            QueueError::Closed {
                topic: topic.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl QueueBackend for InProcessQueue {
    fn kind(&self) -> BackendKind {
        BackendKind::InProcess
    }

    async fn enqueue(&self, topic: &str, payload: JsonValue) -> AppResult<JobHandle> {
        let job = Job::new(topic, payload);
        let handle = job.handle();
        self.send(topic, Command::Enqueue(job))?;
        debug!("任务已入队: {} ({})", handle.id, handle.name);
        Ok(handle)
    }

    async fn subscribe(&self, handler: Arc<dyn JobHandler>) -> AppResult<()> {
        let name = handler.name().to_string();
        self.send(&name, Command::Subscribe(handler))?;
        debug!("订阅者已注册: {}", name);
        Ok(())
    }
}

/// 分发循环：唯一持有订阅者列表和 pending 缓冲的地方
async fn run_dispatch_loop(mut rx: mpsc::UnboundedReceiver<Command>, max_concurrent: usize) {
    let mut lanes: Vec<DeliveryLane> = Vec::new();
    let mut pending: VecDeque<Job> = VecDeque::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Enqueue(job) => {
                if lanes.is_empty() {
                    debug!("暂无订阅者，任务进入缓冲: {}", job.id);
                    pending.push_back(job);
                } else {
                    broadcast(&lanes, job);
                }
            }
            Command::Subscribe(handler) => {
                lanes.push(DeliveryLane::spawn(handler, max_concurrent));

                if !pending.is_empty() {
                    debug!("投递缓冲中的 {} 个任务", pending.len());
                    for job in pending.drain(..) {
                        broadcast(&lanes, job);
                    }
                }
            }
        }
    }

    if !pending.is_empty() {
        warn!("队列关闭时仍有 {} 个任务未投递", pending.len());
    }
    debug!("进程内队列分发循环结束");
}

fn broadcast(lanes: &[DeliveryLane], job: Job) {
    for lane in lanes {
        lane.deliver(job.clone());
    }
}

/// 单个订阅者的投递通道
struct DeliveryLane {
    name: String,
    tx: mpsc::UnboundedSender<Job>,
}

impl DeliveryLane {
    fn spawn(handler: Arc<dyn JobHandler>, max_concurrent: usize) -> Self {
        let name = handler.name().to_string();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let handler = handler.clone();

                // 单个任务失败或 panic 不影响后续投递
                tokio::spawn(async move {
                    let _permit = permit;
                    let job_id = job.id;
                    if let Err(e) = handler.handle(job).await {
                        error!("[{}] 任务 {} 处理失败: {}", handler.name(), job_id, e);
                    }
                });
            }
        });

        Self { name, tx }
    }

    fn deliver(&self, job: Job) {
        let job_id = job.id;
        if self.tx.send(job).is_err() {
            error!("[{}] 投递通道已关闭，任务 {} 未送达", self.name, job_id);
        }
    }
}
