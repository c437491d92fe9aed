//! 持久化协作方
//!
//! 分发器只需要三种能力：按 ID 读提交、按项目读规则集、写回状态与结果。
//! 真正的实体映射在外部；这里提供接口和一个内存实现。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AppResult, StoreError};
use crate::models::{RuleSet, Submission, SubmissionResults, SubmissionStatus};

/// 持久化接口
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// 读取提交记录，不存在时返回 `None`
    async fn get_submission(&self, submission_id: &str) -> AppResult<Option<Submission>>;

    /// 读取项目关联的所有规则集（按关联顺序）
    async fn rule_sets_for_project(&self, project_id: &str) -> AppResult<Vec<RuleSet>>;

    /// 写回状态和结果
    async fn save_results(
        &self,
        submission_id: &str,
        status: SubmissionStatus,
        results: SubmissionResults,
    ) -> AppResult<()>;
}

/// 内存存储（用于命令行运行和测试）
#[derive(Debug, Default)]
pub struct InMemoryStore {
    submissions: RwLock<HashMap<String, Submission>>,
    rule_sets: RwLock<Vec<RuleSet>>,
}

impl InMemoryStore {
    pub fn new(submissions: Vec<Submission>, rule_sets: Vec<RuleSet>) -> Self {
        Self {
            submissions: RwLock::new(
                submissions
                    .into_iter()
                    .map(|s| (s.id.clone(), s))
                    .collect(),
            ),
            rule_sets: RwLock::new(rule_sets),
        }
    }

    pub async fn insert_submission(&self, submission: Submission) {
        self.submissions
            .write()
            .await
            .insert(submission.id.clone(), submission);
    }

    pub async fn insert_rule_set(&self, rule_set: RuleSet) {
        self.rule_sets.write().await.push(rule_set);
    }

    /// 所有提交记录（按 ID 排序）
    pub async fn submissions(&self) -> Vec<Submission> {
        let mut all: Vec<_> = self.submissions.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

#[async_trait]
impl SubmissionStore for InMemoryStore {
    async fn get_submission(&self, submission_id: &str) -> AppResult<Option<Submission>> {
        Ok(self.submissions.read().await.get(submission_id).cloned())
    }

    async fn rule_sets_for_project(&self, project_id: &str) -> AppResult<Vec<RuleSet>> {
        Ok(self
            .rule_sets
            .read()
            .await
            .iter()
            .filter(|set| set.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn save_results(
        &self,
        submission_id: &str,
        status: SubmissionStatus,
        results: SubmissionResults,
    ) -> AppResult<()> {
        let mut submissions = self.submissions.write().await;
        let submission =
            submissions
                .get_mut(submission_id)
                .ok_or_else(|| StoreError::SubmissionNotFound {
                    submission_id: submission_id.to_string(),
                })?;

        submission.record_results(status, results)?;
        Ok(())
    }
}
