//! # Submission Analysis
//!
//! 异步提交分析流水线：上传的压缩包 → 规则评估 → 写回状态和 Finding
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `JobQueue` - 任务队列（持久化 broker 后端 / 进程内后端）
//! - `ArchiveReader` - 本地或远程 zip 压缩包读取
//! - `SubmissionStore` - 提交与规则集的持久化接口
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `rule_engine` - FilePattern / Content 规则评估
//! - `AnalysisService` - 分析单个压缩包
//! - `Notifier` - 状态通知
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个提交"的完整处理流程
//! - `SubmissionCtx` - 上下文封装（job_id + submission_id）
//! - `SubmissionFlow` - 流程编排（读取 → 评估 → 状态流转 → 写回 → 通知）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/pipeline_app` - 装配资源，投递任务，汇总统计
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{ArchiveReader, InMemoryStore, JobQueue, SubmissionStore};
pub use models::{Finding, Rule, RuleSet, Submission, SubmissionStatus};
pub use orchestrator::{PipelineApp, RunStats};
pub use workflow::{DispatchOutcome, InFlightClaims, SubmissionCtx, SubmissionFlow};
