//! 任务队列 - 基础设施层
//!
//! `enqueue(topic, payload) -> JobHandle` + `subscribe(handler)` 抽象，两种可互换的后端：
//! - 持久化 broker 后端：由外部提供，投递/重试语义继承自 broker
//! - 进程内后端：[`InProcessQueue`]，无 broker 配置时使用
//!
//! 后端在 [`JobQueue::from_config`] 构造时确定一次，之后不会改变。

pub mod in_process;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::config::Config;
use crate::error::{AppResult, ConfigError};
use crate::models::{Job, JobHandle, SubmissionJob, SUBMISSION_ANALYSIS_TOPIC};

pub use in_process::InProcessQueue;

/// 任务处理者（订阅方）
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// 日志中显示的名称
    fn name(&self) -> &str {
        "handler"
    }

    /// 处理一个任务；返回的错误只会被记录，不会影响队列
    async fn handle(&self, job: Job) -> AppResult<()>;
}

/// 队列后端
#[async_trait]
pub trait QueueBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// 投递任务，立即返回句柄，不等待处理
    async fn enqueue(&self, topic: &str, payload: JsonValue) -> AppResult<JobHandle>;

    /// 注册处理者
    async fn subscribe(&self, handler: Arc<dyn JobHandler>) -> AppResult<()>;
}

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Durable,
    InProcess,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Durable => write!(f, "durable"),
            BackendKind::InProcess => write!(f, "in-process"),
        }
    }
}

/// 任务队列服务
///
/// 显式构造后注入给生产者和消费者；克隆共享同一个后端。
#[derive(Clone)]
pub struct JobQueue {
    backend: Arc<dyn QueueBackend>,
}

impl JobQueue {
    /// 根据配置确定后端
    ///
    /// - 配置了 `broker_url`：必须提供持久化后端，否则立即返回配置错误
    /// - 未配置：创建进程内后端（需要在 tokio 运行时中调用）
    pub fn from_config(
        config: &Config,
        durable: Option<Arc<dyn QueueBackend>>,
    ) -> AppResult<Self> {
        let backend: Arc<dyn QueueBackend> = match (&config.broker_url, durable) {
            (Some(_), Some(durable)) => durable,
            (Some(broker_url), None) => {
                return Err(ConfigError::DurableBackendMissing {
                    broker_url: broker_url.clone(),
                }
                .into())
            }
            (None, _) => Arc::new(InProcessQueue::new(config.max_concurrent_jobs)),
        };

        info!("📮 任务队列后端: {}", backend.kind());
        Ok(Self { backend })
    }

    /// 使用指定后端
    pub fn with_backend(backend: Arc<dyn QueueBackend>) -> Self {
        Self { backend }
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub async fn enqueue(&self, topic: &str, payload: JsonValue) -> AppResult<JobHandle> {
        self.backend.enqueue(topic, payload).await
    }

    /// 投递提交分析任务
    pub async fn enqueue_submission(&self, submission_id: &str) -> AppResult<JobHandle> {
        self.enqueue(
            SUBMISSION_ANALYSIS_TOPIC,
            SubmissionJob::new(submission_id).to_value(),
        )
        .await
    }

    pub async fn subscribe(&self, handler: Arc<dyn JobHandler>) -> AppResult<()> {
        self.backend.subscribe(handler).await
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("backend", &self.backend.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// 记录投递的假 broker
    #[derive(Default)]
    struct FakeBroker {
        sent: Mutex<Vec<Job>>,
    }

    #[async_trait]
    impl QueueBackend for FakeBroker {
        fn kind(&self) -> BackendKind {
            BackendKind::Durable
        }

        async fn enqueue(&self, topic: &str, payload: JsonValue) -> AppResult<JobHandle> {
            let job = Job::new(topic, payload);
            let handle = job.handle();
            self.sent.lock().unwrap().push(job);
            Ok(handle)
        }

        async fn subscribe(&self, _handler: Arc<dyn JobHandler>) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_in_process_backend_without_broker() {
        let queue = JobQueue::from_config(&Config::default(), None).unwrap();
        assert_eq!(queue.kind(), BackendKind::InProcess);
    }

    #[tokio::test]
    async fn test_broker_without_backend_fails_fast() {
        let config = Config {
            broker_url: Some("redis://localhost:6379".to_string()),
            ..Config::default()
        };
        let result = JobQueue::from_config(&config, None);
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::DurableBackendMissing { .. }))
        ));
    }

    #[tokio::test]
    async fn test_backend_is_shared_between_clones() {
        let broker = Arc::new(FakeBroker::default());
        let config = Config {
            broker_url: Some("redis://localhost:6379".to_string()),
            ..Config::default()
        };
        let queue = JobQueue::from_config(&config, Some(broker.clone())).unwrap();
        let producer = queue.clone();

        let handle = producer.enqueue_submission("sub-9").await.unwrap();

        assert_eq!(queue.kind(), BackendKind::Durable);
        let sent = broker.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, handle.id);
        assert_eq!(sent[0].name, SUBMISSION_ANALYSIS_TOPIC);
        assert_eq!(sent[0].data["submissionId"], "sub-9");
    }
}
