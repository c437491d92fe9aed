//! 任务信封

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{AppResult, QueueError};

/// 提交分析任务的主题名
pub const SUBMISSION_ANALYSIS_TOPIC: &str = "submission-analysis";

/// 队列中流转的任务（对队列不透明）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub data: JsonValue,
}

impl Job {
    /// 分配新的唯一 ID
    pub fn new(name: impl Into<String>, data: JsonValue) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            data,
        }
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id,
            name: self.name.clone(),
        }
    }

    /// 解析提交分析任务载荷
    pub fn submission_payload(&self) -> AppResult<SubmissionJob> {
        serde_json::from_value(self.data.clone()).map_err(|source| {
            QueueError::InvalidPayload {
                job_id: self.id.to_string(),
                source,
            }
            .into()
        })
    }
}

/// enqueue 返回给生产者的句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: Uuid,
    pub name: String,
}

/// 提交分析任务载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionJob {
    pub submission_id: String,
}

impl SubmissionJob {
    pub fn new(submission_id: impl Into<String>) -> Self {
        Self {
            submission_id: submission_id.into(),
        }
    }

    pub fn to_value(&self) -> JsonValue {
        serde_json::json!({ "submissionId": self.submission_id })
    }
}
