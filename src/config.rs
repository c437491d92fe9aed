/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 持久化 broker 地址；存在时使用持久化队列后端，否则使用进程内队列
    pub broker_url: Option<String>,
    /// 每个订阅者同时处理的任务数量
    pub max_concurrent_jobs: usize,
    /// TOML 数据目录（提交记录 + 规则集）
    pub fixture_folder: String,
    /// 单个文件内容读取上限（字节），超过的文件不参与内容规则
    pub max_file_bytes: u64,
    /// 远程压缩包下载超时（秒）
    pub download_timeout_secs: u64,
    /// 规则评估超时（秒）
    pub evaluation_timeout_secs: u64,
    /// 等待全部任务完成的最长时间（秒）
    pub drain_timeout_secs: u64,
    /// 状态通知 webhook，不配置时只写日志
    pub notify_webhook_url: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker_url: None,
            max_concurrent_jobs: 8,
            fixture_folder: "fixtures".to_string(),
            max_file_bytes: 1024 * 1024,
            download_timeout_secs: 60,
            evaluation_timeout_secs: 120,
            drain_timeout_secs: 300,
            notify_webhook_url: None,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            broker_url: non_empty_var("BROKER_URL"),
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS").ok().and_then(|v| v.parse().ok()).filter(|n| *n > 0).unwrap_or(default.max_concurrent_jobs),
            fixture_folder: std::env::var("FIXTURE_FOLDER").unwrap_or(default.fixture_folder),
            max_file_bytes: std::env::var("MAX_FILE_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_file_bytes),
            download_timeout_secs: std::env::var("DOWNLOAD_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.download_timeout_secs),
            evaluation_timeout_secs: std::env::var("EVALUATION_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.evaluation_timeout_secs),
            drain_timeout_secs: std::env::var("DRAIN_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.drain_timeout_secs),
            notify_webhook_url: non_empty_var("NOTIFY_WEBHOOK_URL"),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }
}

/// 空字符串视为未配置
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
