//! 状态通知服务 - 业务能力层
//!
//! 只负责"告诉外部这个提交处理完了"，发送失败只记日志。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::SubmissionStatus;

/// 通知事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationEvent {
    /// 正常完成分析
    Processed,
    /// 以合成错误结束（无可评估规则 / 评估异常）
    Failed,
}

/// 通知内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub event: NotificationEvent,
    pub submission_id: String,
    pub status: SubmissionStatus,
}

/// 通知协作方
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> AppResult<()>;
}

/// 只写日志的通知器（未配置 webhook 时使用）
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> AppResult<()> {
        info!(
            "[提交 {}] 📣 {:?} -> {}",
            notification.submission_id, notification.event, notification.status
        );
        Ok(())
    }
}

/// 通过 HTTP POST JSON 发送通知
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> AppResult<()> {
        debug!("发送通知到 {}: {:?}", self.url, notification);

        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Other(format!("通知发送失败 ({}): {}", self.url, e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_wire_format() {
        let n = Notification {
            event: NotificationEvent::Processed,
            submission_id: "sub-1".to_string(),
            status: SubmissionStatus::Passed,
        };
        assert_eq!(
            serde_json::to_value(&n).unwrap(),
            serde_json::json!({
                "event": "PROCESSED",
                "submissionId": "sub-1",
                "status": "PASSED"
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook");
        let n = Notification {
            event: NotificationEvent::Failed,
            submission_id: "sub-1".to_string(),
            status: SubmissionStatus::Failed,
        };
        assert!(notifier.send(&n).await.is_err());
    }
}
