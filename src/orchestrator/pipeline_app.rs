//! 流水线应用 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责资源装配和一次完整运行。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、加载 TOML 数据、确定队列后端、选择通知器
//! 2. **订阅**：把 `SubmissionFlow` 注册为提交分析任务的处理者
//! 3. **投递**：为每个 PENDING 提交投递一个任务
//! 4. **等待**：收集处理结果，最长等待 `drain_timeout_secs`
//! 5. **全局统计**：汇总通过 / 未通过 / 未完成数量
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个提交的细节
//! - **资源所有者**：唯一持有队列和存储的模块
//! - **向下委托**：委托 workflow::SubmissionFlow 处理单个提交

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::try_join_all;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::{InMemoryStore, JobQueue};
use crate::models::{load_all_toml_files, SubmissionStatus};
use crate::services::{LogNotifier, Notifier, WebhookNotifier};
use crate::utils::logging;
use crate::workflow::{DispatchOutcome, InFlightClaims, SubmissionFlow};

/// 应用主结构
pub struct PipelineApp {
    config: Config,
    store: Arc<InMemoryStore>,
    queue: JobQueue,
    notifier: Arc<dyn Notifier>,
    /// 该队列上所有流程共享
    claims: InFlightClaims,
}

impl PipelineApp {
    /// 初始化应用（进程内队列，数据来自 `fixture_folder`）
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::init_log_file(&config.output_log_file)?;

        info!("\n📁 正在扫描数据目录: {}", config.fixture_folder);
        let fixture = load_all_toml_files(&config.fixture_folder).await?;
        info!(
            "✓ 已加载 {} 个提交，{} 个规则集",
            fixture.submissions.len(),
            fixture.rule_sets.len()
        );

        let store = Arc::new(InMemoryStore::new(fixture.submissions, fixture.rule_sets));
        let queue = JobQueue::from_config(&config, None)?;
        logging::log_startup(&queue.kind().to_string(), config.max_concurrent_jobs);

        let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
            Some(url) => {
                info!("📣 通知方式: webhook {}", url);
                Arc::new(WebhookNotifier::new(url.clone()))
            }
            None => Arc::new(LogNotifier),
        };

        Ok(Self::with_parts(config, store, queue, notifier))
    }

    /// 使用外部提供的组件（持久化后端、自定义通知器）
    pub fn with_parts(
        config: Config,
        store: Arc<InMemoryStore>,
        queue: JobQueue,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            queue,
            notifier,
            claims: InFlightClaims::new(),
        }
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunStats> {
        let pending: Vec<String> = self
            .store
            .submissions()
            .await
            .into_iter()
            .filter(|s| s.status == SubmissionStatus::Pending)
            .map(|s| s.id)
            .collect();

        if pending.is_empty() {
            warn!("⚠️ 没有待分析的提交，程序结束");
            return Ok(RunStats::default());
        }

        let total = pending.len();
        info!("✓ 找到 {} 个待分析的提交", total);

        // 订阅
        let (tx, rx) = mpsc::unbounded_channel();
        let flow = SubmissionFlow::new(
            &self.config,
            self.store.clone(),
            self.notifier.clone(),
            self.claims.clone(),
        )
        .with_outcomes(tx);
        self.queue.subscribe(Arc::new(flow)).await?;

        // 投递
        try_join_all(pending.iter().map(|id| self.queue.enqueue_submission(id))).await?;
        info!("📮 已投递 {} 个任务", total);

        // 等待
        let stats = self.collect_outcomes(rx, total).await;
        logging::print_final_stats(stats.passed, stats.failed, stats.unresolved, stats.total);
        info!("\n日志已保存至: {}", self.config.output_log_file);

        Ok(stats)
    }

    async fn collect_outcomes(
        &self,
        mut rx: mpsc::UnboundedReceiver<DispatchOutcome>,
        total: usize,
    ) -> RunStats {
        let mut stats = RunStats {
            total,
            ..Default::default()
        };
        let mut received = 0;
        let drain_timeout = Duration::from_secs(self.config.drain_timeout_secs);

        let drained = tokio::time::timeout(drain_timeout, async {
            while received < total {
                match rx.recv().await {
                    Some(outcome) => {
                        received += 1;
                        stats.record(&outcome);
                    }
                    None => break,
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "⏳ 等待超时 ({} 秒)，{} 个任务未完成",
                self.config.drain_timeout_secs,
                total - received
            );
        }
        stats.unresolved += total - received;
        stats
    }
}

/// 运行统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// 被丢弃、被拒绝写入、出错或超时未完成
    pub unresolved: usize,
}

impl RunStats {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Completed {
                status: SubmissionStatus::Passed,
                ..
            } => self.passed += 1,
            DispatchOutcome::Completed { .. } => self.failed += 1,
            _ => self.unresolved += 1,
        }
    }
}
