//! 提交分析流程 - 流程层（Worker Dispatcher）
//!
//! 核心职责：把一个队列任务变成一次完整的分析
//!
//! 流程顺序：
//! 1. 读取提交记录（不存在 → 丢弃任务）
//! 2. 读取项目的有效规则集
//! 3. 没有可评估规则 → FAILED + `system-error`
//! 4. 分析压缩包（任何错误 → FAILED + `rule-evaluation-error`）
//! 5. 按 hasErrors 写回 PASSED / FAILED
//! 6. 发送通知（失败只记日志）

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{JobHandler, SubmissionStore};
use crate::models::{
    effective_rules, Finding, Job, Rule, SubmissionResults, SubmissionStatus,
    EVALUATION_ERROR_RULE_ID, SYSTEM_ERROR_RULE_ID,
};
use crate::services::{AnalysisService, Notification, NotificationEvent, Notifier};
use crate::workflow::submission_ctx::SubmissionCtx;

/// 单个任务的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 已写入终态
    Completed {
        submission_id: String,
        status: SubmissionStatus,
        findings: usize,
    },
    /// 任务被丢弃（载荷无效 / 提交不存在），不重试
    Dropped { job_id: Uuid, reason: String },
    /// 同一提交正在处理中，本次投递跳过
    Skipped { submission_id: String },
    /// 提交已离开 PENDING，状态机拒绝写入
    Stale {
        submission_id: String,
        current: SubmissionStatus,
    },
    /// 意外错误，提交保持原状态，可以手动重新投递
    Unresolved {
        submission_id: String,
        reason: String,
    },
}

/// 正在处理中的提交 ID 集合
///
/// 克隆共享同一个集合。订阅同一队列的所有流程必须持有同一份，
/// 广播投递时同一提交才只会被处理一次。
#[derive(Debug, Clone, Default)]
pub struct InFlightClaims {
    ids: Arc<DashSet<String>>,
}

impl InFlightClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试取得处理权，已被占用时返回 `None`
    fn acquire(&self, submission_id: &str) -> Option<InFlightClaim> {
        if self.ids.insert(submission_id.to_string()) {
            Some(InFlightClaim {
                ids: self.ids.clone(),
                submission_id: submission_id.to_string(),
            })
        } else {
            None
        }
    }

    pub fn is_claimed(&self, submission_id: &str) -> bool {
        self.ids.contains(submission_id)
    }
}

/// 提交分析流程
///
/// - 编排完整的单个提交处理流程
/// - 不持有队列，只作为订阅者被调用
/// - 同一提交 ID 同时只会被处理一次（由共享的 [`InFlightClaims`] 保证）
pub struct SubmissionFlow {
    store: Arc<dyn SubmissionStore>,
    analysis: AnalysisService,
    notifier: Arc<dyn Notifier>,
    claims: InFlightClaims,
    outcomes: Option<mpsc::UnboundedSender<DispatchOutcome>>,
}

impl SubmissionFlow {
    /// 创建新的提交分析流程
    ///
    /// # 参数
    /// - `claims`: 与同一队列上其他流程共享的处理权集合
    pub fn new(
        config: &Config,
        store: Arc<dyn SubmissionStore>,
        notifier: Arc<dyn Notifier>,
        claims: InFlightClaims,
    ) -> Self {
        Self {
            store,
            analysis: AnalysisService::new(config),
            notifier,
            claims,
            outcomes: None,
        }
    }

    /// 每个任务结束后把结果发到通道（用于统计和测试）
    pub fn with_outcomes(mut self, tx: mpsc::UnboundedSender<DispatchOutcome>) -> Self {
        self.outcomes = Some(tx);
        self
    }

    /// 处理一个任务
    ///
    /// 只有意外错误（存储失败等）才返回 `Err`，此时提交保持原状态
    pub async fn run(&self, job: &Job) -> AppResult<DispatchOutcome> {
        let payload = match job.submission_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[任务 {}] ⚠️ 载荷无效，丢弃: {}", job.id, e);
                return Ok(DispatchOutcome::Dropped {
                    job_id: job.id,
                    reason: e.to_string(),
                });
            }
        };

        let ctx = SubmissionCtx::new(job.id, payload.submission_id);

        let Some(_claim) = self.claims.acquire(&ctx.submission_id) else {
            warn!("{} ⚠️ 同一提交正在处理中，跳过本次投递", ctx);
            return Ok(DispatchOutcome::Skipped {
                submission_id: ctx.submission_id,
            });
        };

        self.process(&ctx).await
    }

    async fn process(&self, ctx: &SubmissionCtx) -> AppResult<DispatchOutcome> {
        // ========== 1. 读取提交 ==========
        let Some(submission) = self.store.get_submission(&ctx.submission_id).await? else {
            warn!("{} ⚠️ 提交不存在，丢弃任务", ctx);
            return Ok(DispatchOutcome::Dropped {
                job_id: ctx.job_id,
                reason: format!("提交不存在: {}", ctx.submission_id),
            });
        };

        info!("{} 🔍 开始分析: {}", ctx, submission.archive_location);

        // ========== 2. 有效规则集 ==========
        let rule_sets = self.store.rule_sets_for_project(&submission.project_id).await?;
        let rules: Vec<Rule> = effective_rules(&rule_sets)
            .into_iter()
            .filter(Rule::is_evaluable)
            .collect();

        // ========== 3. 没有可评估规则 ==========
        if rules.is_empty() {
            warn!("{} ⚠️ 项目 {} 没有可评估的规则", ctx, submission.project_id);
            let finding = Finding::synthetic(
                SYSTEM_ERROR_RULE_ID,
                format!(
                    "项目 {} 没有可评估的规则（需要 FilePattern 或 Content 类型），无法判定提交",
                    submission.project_id
                ),
            );
            let results = SubmissionResults {
                findings: vec![finding],
                has_errors: true,
                evaluated_rules: Vec::new(),
            };
            return self
                .finish(ctx, submission.status, results, NotificationEvent::Failed)
                .await;
        }

        // ========== 4. 分析 ==========
        let evaluated_rules: Vec<String> = rules.iter().map(|r| r.id.clone()).collect();

        let (findings, has_errors, event) = match self
            .analysis
            .analyze(&submission.archive_location, rules)
            .await
        {
            Ok(result) => (result.findings, result.has_errors, NotificationEvent::Processed),
            Err(e) => {
                error!("{} ❌ 规则评估失败: {}", ctx, e);
                let finding = Finding::synthetic(
                    EVALUATION_ERROR_RULE_ID,
                    format!("规则评估失败: {}", e),
                );
                (vec![finding], true, NotificationEvent::Failed)
            }
        };

        // ========== 5. 写回 ==========
        let results = SubmissionResults {
            findings,
            has_errors,
            evaluated_rules,
        };
        self.finish(ctx, submission.status, results, event).await
    }

    /// 状态流转 → 写回 → 通知
    async fn finish(
        &self,
        ctx: &SubmissionCtx,
        current: SubmissionStatus,
        results: SubmissionResults,
        event: NotificationEvent,
    ) -> AppResult<DispatchOutcome> {
        let target = SubmissionStatus::from_verdict(results.has_errors);

        if let Err(e) = current.transition_to(target) {
            warn!("{} ⚠️ {}，不写回结果", ctx, e);
            return Ok(DispatchOutcome::Stale {
                submission_id: ctx.submission_id.clone(),
                current,
            });
        }

        let findings = results.findings.len();
        self.store
            .save_results(&ctx.submission_id, target, results)
            .await?;

        if target == SubmissionStatus::Passed {
            info!("{} ✅ 分析通过 ({} 条 Finding)", ctx, findings);
        } else {
            info!("{} ❌ 分析未通过 ({} 条 Finding)", ctx, findings);
        }

        // ========== 6. 通知 ==========
        let notification = Notification {
            event,
            submission_id: ctx.submission_id.clone(),
            status: target,
        };
        if let Err(e) = self.notifier.send(&notification).await {
            warn!("{} ⚠️ 通知发送失败: {}", ctx, e);
        }

        Ok(DispatchOutcome::Completed {
            submission_id: ctx.submission_id.clone(),
            status: target,
            findings,
        })
    }

    fn report(&self, outcome: DispatchOutcome) {
        if let Some(tx) = &self.outcomes {
            let _ = tx.send(outcome);
        }
    }
}

#[async_trait]
impl JobHandler for SubmissionFlow {
    fn name(&self) -> &str {
        "submission-flow"
    }

    async fn handle(&self, job: Job) -> AppResult<()> {
        match self.run(&job).await {
            Ok(outcome) => {
                self.report(outcome);
                Ok(())
            }
            Err(e) => {
                let submission_id = job
                    .submission_payload()
                    .map(|p| p.submission_id)
                    .unwrap_or_default();
                self.report(DispatchOutcome::Unresolved {
                    submission_id,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

/// 提交处理权：持有期间同一 ID 的其他投递会被跳过，drop 时释放
struct InFlightClaim {
    ids: Arc<DashSet<String>>,
    submission_id: String,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.ids.remove(&self.submission_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::archive_reader::tests::build_zip;
    use crate::infrastructure::{InMemoryStore, InProcessQueue, QueueBackend};
    use crate::models::{
        FilePatternPayload, RuleSet, Severity, Submission, SubmissionJob,
        SUBMISSION_ANALYSIS_TOPIC,
    };
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> AppResult<()> {
            self.sent.lock().unwrap().push(notification.clone());
            if self.fail {
                Err(AppError::Other("webhook down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn job_for(submission_id: &str) -> Job {
        Job::new(
            SUBMISSION_ANALYSIS_TOPIC,
            SubmissionJob::new(submission_id).to_value(),
        )
    }

    fn rule_set(rules: Vec<Rule>) -> RuleSet {
        RuleSet {
            id: "rs".to_string(),
            project_id: "proj".to_string(),
            rules,
        }
    }

    fn require_readme(severity: Severity) -> Rule {
        Rule::file_pattern(
            "readme",
            severity,
            "需要 README",
            FilePatternPayload {
                require: vec!["README.md".to_string()],
                ..Default::default()
            },
        )
    }

    struct Harness {
        _dir: tempfile::TempDir,
        store: Arc<InMemoryStore>,
        notifier: Arc<RecordingNotifier>,
        flow: SubmissionFlow,
    }

    fn harness(files: &[(&str, &str)], rules: Vec<Rule>, notifier: RecordingNotifier) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.zip");
        std::fs::write(&path, build_zip(files)).unwrap();

        let store = Arc::new(InMemoryStore::new(
            vec![Submission::new("sub", "proj", path.to_string_lossy())],
            vec![rule_set(rules)],
        ));
        let notifier = Arc::new(notifier);
        let flow = SubmissionFlow::new(
            &Config::default(),
            store.clone(),
            notifier.clone(),
            InFlightClaims::new(),
        );

        Harness {
            _dir: dir,
            store,
            notifier,
            flow,
        }
    }

    #[tokio::test]
    async fn test_zero_evaluable_rules_is_system_error() {
        let ast: Rule = serde_json::from_value(serde_json::json!({
            "id": "ast", "type": "AST", "severity": "error"
        }))
        .unwrap();
        let h = harness(&[("README.md", "")], vec![ast], RecordingNotifier::default());

        let outcome = h.flow.run(&job_for("sub")).await.unwrap();
        assert!(matches!(
            outcome,
            DispatchOutcome::Completed {
                status: SubmissionStatus::Failed,
                findings: 1,
                ..
            }
        ));

        let saved = h.store.get_submission("sub").await.unwrap().unwrap();
        let results = saved.results.unwrap();
        assert_eq!(results.findings.len(), 1);
        assert_eq!(results.findings[0].rule_id, SYSTEM_ERROR_RULE_ID);
        assert_eq!(
            h.notifier.sent.lock().unwrap()[0].event,
            NotificationEvent::Failed
        );
    }

    #[tokio::test]
    async fn test_all_warnings_pass() {
        let h = harness(
            &[("src/app.js", "")],
            vec![require_readme(Severity::Warning)],
            RecordingNotifier::default(),
        );

        h.flow.run(&job_for("sub")).await.unwrap();

        let saved = h.store.get_submission("sub").await.unwrap().unwrap();
        assert_eq!(saved.status, SubmissionStatus::Passed);
        assert_eq!(saved.results.unwrap().findings.len(), 1);
        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent[0].event, NotificationEvent::Processed);
        assert_eq!(sent[0].status, SubmissionStatus::Passed);
    }

    #[tokio::test]
    async fn test_unreadable_archive_becomes_evaluation_error() {
        let store = Arc::new(InMemoryStore::new(
            vec![Submission::new("sub", "proj", "no/such/upload.zip")],
            vec![rule_set(vec![require_readme(Severity::Warning)])],
        ));
        let flow = SubmissionFlow::new(
            &Config::default(),
            store.clone(),
            Arc::new(RecordingNotifier::default()),
            InFlightClaims::new(),
        );

        flow.run(&job_for("sub")).await.unwrap();

        let saved = store.get_submission("sub").await.unwrap().unwrap();
        assert_eq!(saved.status, SubmissionStatus::Failed);
        let results = saved.results.unwrap();
        assert_eq!(results.findings.len(), 1);
        assert_eq!(results.findings[0].rule_id, EVALUATION_ERROR_RULE_ID);
    }

    #[tokio::test]
    async fn test_missing_submission_is_dropped() {
        let h = harness(&[], vec![require_readme(Severity::Error)], RecordingNotifier::default());

        let outcome = h.flow.run(&job_for("ghost")).await.unwrap();

        assert!(matches!(outcome, DispatchOutcome::Dropped { .. }));
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        let untouched = h.store.get_submission("sub").await.unwrap().unwrap();
        assert_eq!(untouched.status, SubmissionStatus::Pending);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_dropped() {
        let h = harness(&[], vec![], RecordingNotifier::default());
        let job = Job::new(SUBMISSION_ANALYSIS_TOPIC, serde_json::json!({ "nope": true }));

        let outcome = h.flow.run(&job).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Dropped { .. }));
    }

    #[tokio::test]
    async fn test_notification_failure_is_not_fatal() {
        let h = harness(
            &[("README.md", "")],
            vec![require_readme(Severity::Error)],
            RecordingNotifier {
                fail: true,
                ..Default::default()
            },
        );

        let outcome = h.flow.run(&job_for("sub")).await.unwrap();
        assert!(matches!(
            outcome,
            DispatchOutcome::Completed {
                status: SubmissionStatus::Passed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_redelivery_after_verdict_is_stale() {
        let h = harness(
            &[("src/app.js", "")],
            vec![require_readme(Severity::Error)],
            RecordingNotifier::default(),
        );

        h.flow.run(&job_for("sub")).await.unwrap();
        let first = h.store.get_submission("sub").await.unwrap().unwrap();

        let outcome = h.flow.run(&job_for("sub")).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Stale {
                submission_id: "sub".to_string(),
                current: SubmissionStatus::Failed,
            }
        );
        assert_eq!(h.store.get_submission("sub").await.unwrap().unwrap(), first);
        assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
    }

    /// get_submission 在放行前一直阻塞，用来让第一次投递停在处理中
    struct GatedStore {
        inner: InMemoryStore,
        gate: Semaphore,
    }

    #[async_trait]
    impl SubmissionStore for GatedStore {
        async fn get_submission(&self, submission_id: &str) -> AppResult<Option<Submission>> {
            let _permit = self.gate.acquire().await.unwrap();
            self.inner.get_submission(submission_id).await
        }

        async fn rule_sets_for_project(&self, project_id: &str) -> AppResult<Vec<RuleSet>> {
            self.inner.rule_sets_for_project(project_id).await
        }

        async fn save_results(
            &self,
            submission_id: &str,
            status: SubmissionStatus,
            results: SubmissionResults,
        ) -> AppResult<()> {
            self.inner.save_results(submission_id, status, results).await
        }
    }

    async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<DispatchOutcome>) -> DispatchOutcome {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for outcome")
            .expect("outcome channel closed")
    }

    #[tokio::test]
    async fn test_broadcast_to_two_flows_processes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.zip");
        std::fs::write(&path, build_zip(&[("README.md", "")])).unwrap();

        let store = Arc::new(GatedStore {
            inner: InMemoryStore::new(
                vec![Submission::new("sub", "proj", path.to_string_lossy())],
                vec![rule_set(vec![require_readme(Severity::Error)])],
            ),
            gate: Semaphore::new(0),
        });
        let claims = InFlightClaims::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let queue = InProcessQueue::new(2);
        for _ in 0..2 {
            let flow = SubmissionFlow::new(
                &Config::default(),
                store.clone(),
                Arc::new(RecordingNotifier::default()),
                claims.clone(),
            )
            .with_outcomes(tx.clone());
            queue.subscribe(Arc::new(flow)).await.unwrap();
        }

        queue
            .enqueue(SUBMISSION_ANALYSIS_TOPIC, SubmissionJob::new("sub").to_value())
            .await
            .unwrap();

        // 第一次投递停在 get_submission，第二次只能跳过
        assert_eq!(
            next_outcome(&mut rx).await,
            DispatchOutcome::Skipped {
                submission_id: "sub".to_string(),
            }
        );
        assert!(claims.is_claimed("sub"));

        store.gate.add_permits(1);
        assert!(matches!(
            next_outcome(&mut rx).await,
            DispatchOutcome::Completed {
                status: SubmissionStatus::Passed,
                ..
            }
        ));
        assert!(!claims.is_claimed("sub"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let claims = InFlightClaims::new();
        let shared = claims.clone();

        let claim = claims.acquire("sub").unwrap();
        assert!(shared.acquire("sub").is_none());
        assert!(shared.is_claimed("sub"));
        assert!(shared.acquire("other").is_some());
        drop(claim);
        assert!(!shared.is_claimed("sub"));
        assert!(shared.acquire("sub").is_some());
    }
}
