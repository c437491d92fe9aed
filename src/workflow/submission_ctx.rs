//! 提交处理上下文
//!
//! 封装"我正在处理哪个任务的哪个提交"这一信息

use std::fmt::Display;

use uuid::Uuid;

/// 提交处理上下文
#[derive(Debug, Clone)]
pub struct SubmissionCtx {
    /// 任务ID
    pub job_id: Uuid,

    /// 提交ID
    pub submission_id: String,
}

impl SubmissionCtx {
    /// 创建新的提交上下文
    pub fn new(job_id: Uuid, submission_id: String) -> Self {
        Self {
            job_id,
            submission_id,
        }
    }
}

impl Display for SubmissionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[提交 {} 任务#{}]", self.submission_id, self.job_id)
    }
}
