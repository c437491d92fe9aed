use thiserror::Error;

use crate::models::SubmissionStatus;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 压缩包读取错误
    #[error("压缩包错误: {0}")]
    Archive(#[from] ArchiveError),
    /// 任务队列错误
    #[error("队列错误: {0}")]
    Queue(#[from] QueueError),
    /// 持久化协作方错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 规则评估错误
    #[error("评估错误: {0}")]
    Evaluation(#[from] EvaluationError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 状态流转错误
    #[error("状态错误: {0}")]
    State(#[from] StateError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 压缩包读取错误
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// 下载远程压缩包失败
    #[error("下载压缩包失败 ({url}): {source}")]
    DownloadFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 下载超时
    #[error("下载压缩包超时 ({url}), 超过 {secs} 秒")]
    DownloadTimedOut { url: String, secs: u64 },
    /// 读取本地压缩包失败
    #[error("读取压缩包失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 解压失败（文件损坏或不是 zip）
    #[error("解压失败: {0}")]
    Corrupt(#[from] zip::result::ZipError),
}

/// 任务队列错误
#[derive(Debug, Error)]
pub enum QueueError {
    /// 进程内队列已关闭
    #[error("队列已关闭，无法投递任务 ({topic})")]
    Closed { topic: String },
    /// 任务载荷解析失败
    #[error("任务载荷无效 ({job_id}): {source}")]
    InvalidPayload {
        job_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 持久化协作方错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 提交记录不存在
    #[error("提交记录不存在: {submission_id}")]
    SubmissionNotFound { submission_id: String },
    /// 后端不可用（由外部存储实现返回）
    #[error("存储后端不可用: {0}")]
    Unavailable(String),
}

/// 规则评估错误
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// 评估超时
    #[error("规则评估超时, 超过 {secs} 秒")]
    TimedOut { secs: u64 },
    /// 评估任务异常终止
    #[error("评估任务异常终止: {0}")]
    TaskAborted(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置了 broker 但没有提供持久化队列实现
    #[error("已配置 BROKER_URL={broker_url}，但未提供持久化队列后端")]
    DurableBackendMissing { broker_url: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 状态流转错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// 非法的状态流转
    #[error("非法的状态流转: {from} -> {to}")]
    IllegalTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON解析失败: {}", err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        AppError::download_failed(url, err)
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        AppError::Archive(ArchiveError::Corrupt(err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建下载失败错误
    pub fn download_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Archive(ArchiveError::DownloadFailed {
            url: url.into(),
            source: Box::new(source),
        })
    }

    /// 创建本地压缩包读取错误
    pub fn archive_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Archive(ArchiveError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display_wraps_inner_message() {
        let err: AppError = EvaluationError::TimedOut { secs: 5 }.into();
        assert_eq!(err.to_string(), "评估错误: 规则评估超时, 超过 5 秒");
    }

    #[test]
    fn test_io_error_maps_to_file_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::File(FileError::ReadFailed { .. })));
    }
}
