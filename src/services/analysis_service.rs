//! 分析服务 - 业务能力层
//!
//! 只负责"分析一个压缩包"能力：读取压缩包 → 评估规则 → 汇总结果。
//! 不关心提交状态，不写存储，不发通知。

use std::time::Duration;

use tracing::debug;

use crate::config::Config;
use crate::error::{AppResult, EvaluationError};
use crate::infrastructure::ArchiveReader;
use crate::models::{EvaluationResult, Rule};
use crate::services::rule_engine;

/// 分析服务
///
/// 职责：
/// - 通过 ArchiveReader 取得压缩包（下载有超时）
/// - 在阻塞线程池中解压并评估（有超时）
/// - 压缩包读取失败、超时都作为错误返回，由调用方决定如何落地
#[derive(Debug, Clone)]
pub struct AnalysisService {
    reader: ArchiveReader,
    evaluation_timeout: Duration,
}

impl AnalysisService {
    /// 创建新的分析服务
    pub fn new(config: &Config) -> Self {
        Self {
            reader: ArchiveReader::new(config),
            evaluation_timeout: Duration::from_secs(config.evaluation_timeout_secs),
        }
    }

    /// 分析压缩包
    ///
    /// # 参数
    /// - `archive_location`: 本地路径或 http(s) URL
    /// - `rules`: 有效规则集（只读）
    ///
    /// # 返回
    /// 返回 Finding 列表和 `has_errors`
    pub async fn analyze(
        &self,
        archive_location: &str,
        rules: Vec<Rule>,
    ) -> AppResult<EvaluationResult> {
        let archive = self.reader.open(archive_location).await?;
        debug!("压缩包已打开: {} ({} 个条目)", archive_location, archive.len());

        let task = tokio::task::spawn_blocking(move || -> AppResult<EvaluationResult> {
            let entries = archive.read_all()?;
            Ok(rule_engine::evaluate_rules(&rules, &entries))
        });

        match tokio::time::timeout(self.evaluation_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                Err(EvaluationError::TaskAborted(join_error.to_string()).into())
            }
            // 超时后阻塞线程不会被取消，只是不再等待其结果
            Err(_) => Err(EvaluationError::TimedOut {
                secs: self.evaluation_timeout.as_secs(),
            }
            .into()),
        }
    }
}
