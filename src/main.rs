use anyhow::Result;
use submission_analysis::utils::logging;
use submission_analysis::{Config, PipelineApp};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    PipelineApp::initialize(config).await?.run().await?;

    Ok(())
}
