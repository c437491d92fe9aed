pub mod finding;
pub mod job;
pub mod loaders;
pub mod rule;
pub mod submission;

pub use finding::{
    EvaluationResult, Finding, Location, EVALUATION_ERROR_RULE_ID, SYSTEM_ERROR_RULE_ID,
};
pub use job::{Job, JobHandle, SubmissionJob, SUBMISSION_ANALYSIS_TOPIC};
pub use loaders::{load_all_toml_files, load_toml_fixture, Fixture};
pub use rule::{
    effective_rules, ContentPayload, FilePatternPayload, Rule, RulePayload, RuleSet, RuleType,
    Severity,
};
pub use submission::{Submission, SubmissionResults, SubmissionStatus};
