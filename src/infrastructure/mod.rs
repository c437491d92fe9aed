//! 基础设施层
//!
//! 持有外部资源（文件、网络、队列、存储），只暴露能力，不包含业务判断

pub mod archive_reader;
pub mod queue;
pub mod store;

pub use archive_reader::{Archive, ArchiveEntry, ArchiveReader};
pub use queue::{BackendKind, InProcessQueue, JobHandler, JobQueue, QueueBackend};
pub use store::{InMemoryStore, SubmissionStore};
