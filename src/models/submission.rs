//! 提交记录与状态机
//!
//! 状态只允许按 PENDING → {PASSED, FAILED} → REVIEWED 单向流转。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StateError;
use crate::models::finding::Finding;

/// 提交状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionStatus {
    /// 等待分析（外部创建时的初始状态）
    Pending,
    /// 分析通过
    Passed,
    /// 分析未通过
    Failed,
    /// 人工复核完成（终态）
    Reviewed,
}

impl SubmissionStatus {
    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::Passed => "PASSED",
            SubmissionStatus::Failed => "FAILED",
            SubmissionStatus::Reviewed => "REVIEWED",
        }
    }

    /// 是否允许流转到目标状态
    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        matches!(
            (self, next),
            (SubmissionStatus::Pending, SubmissionStatus::Passed)
                | (SubmissionStatus::Pending, SubmissionStatus::Failed)
                | (SubmissionStatus::Passed, SubmissionStatus::Reviewed)
                | (SubmissionStatus::Failed, SubmissionStatus::Reviewed)
        )
    }

    /// 执行状态流转，非法流转返回错误
    pub fn transition_to(self, next: SubmissionStatus) -> Result<SubmissionStatus, StateError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StateError::IllegalTransition {
                from: self,
                to: next,
            })
        }
    }

    /// 分析流水线的终态（PASSED / FAILED / REVIEWED）
    pub fn is_terminal(self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }

    /// 根据 hasErrors 得出分析结论
    pub fn from_verdict(has_errors: bool) -> Self {
        if has_errors {
            SubmissionStatus::Failed
        } else {
            SubmissionStatus::Passed
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 一次分析的结果（随提交记录一起持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResults {
    pub findings: Vec<Finding>,
    pub has_errors: bool,
    /// 实际参与评估的规则 ID
    #[serde(default)]
    pub evaluated_rules: Vec<String>,
}

/// 提交记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub project_id: String,
    #[serde(default = "default_status")]
    pub status: SubmissionStatus,
    /// 本地路径或 http(s) URL，创建后不可变
    pub archive_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<SubmissionResults>,
}

fn default_status() -> SubmissionStatus {
    SubmissionStatus::Pending
}

impl Submission {
    /// 创建新的待分析提交
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        archive_location: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            status: SubmissionStatus::Pending,
            archive_location: archive_location.into(),
            results: None,
        }
    }

    /// 写入分析结果并流转状态
    pub fn record_results(
        &mut self,
        status: SubmissionStatus,
        results: SubmissionResults,
    ) -> Result<(), StateError> {
        self.status = self.status.transition_to(status)?;
        self.results = Some(results);
        Ok(())
    }

    /// 人工复核
    pub fn review(&mut self) -> Result<(), StateError> {
        self.status = self.status.transition_to(SubmissionStatus::Reviewed)?;
        Ok(())
    }
}
