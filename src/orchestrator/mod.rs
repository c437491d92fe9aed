//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责资源装配和一次完整运行，是整个系统的"指挥中心"。
//!
//! ### `pipeline_app` - 流水线应用
//! - 管理应用生命周期（初始化、运行）
//! - 加载提交和规则集（TOML 数据目录）
//! - 确定队列后端，注册 SubmissionFlow
//! - 投递所有 PENDING 提交并等待结果
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! pipeline_app (投递 Vec<Submission>)
//!     ↓ JobQueue
//! workflow::SubmissionFlow (处理单个提交)
//!     ↓
//! services (能力层：analysis / rule_engine / notifier)
//!     ↓
//! infrastructure (基础设施：queue / archive_reader / store)
//! ```

pub mod pipeline_app;

pub use pipeline_app::{PipelineApp, RunStats};
