//! 规则评估引擎 - 业务能力层
//!
//! 纯函数：输入规则和压缩包条目，输出 Finding，不读写任何外部状态。
//!
//! 评估顺序是对外可观察的约定：
//! 1. 先评估所有 FilePattern 规则，再评估所有 Content 规则
//! 2. 同类规则按规则集顺序
//! 3. Finding 按评估顺序追加
//!
//! 其他类型（Regex / ESLint / AST）不由本引擎评估，直接跳过。

pub mod content;
pub mod file_pattern;
pub mod glob;
pub mod syntax;

use crate::infrastructure::ArchiveEntry;
use crate::models::{EvaluationResult, Finding, Rule, RulePayload, RuleType};

/// 评估单条规则
pub fn evaluate_rule(rule: &Rule, entries: &[ArchiveEntry]) -> Vec<Finding> {
    match &rule.payload {
        RulePayload::FilePattern(payload) => file_pattern::evaluate(rule, payload, entries),
        RulePayload::Content(payload) => content::evaluate(rule, payload, entries),
        RulePayload::Unevaluated { .. } => Vec::new(),
    }
}

/// 按约定顺序评估全部规则
pub fn evaluate_rules(rules: &[Rule], entries: &[ArchiveEntry]) -> EvaluationResult {
    let ordered = rules
        .iter()
        .filter(|r| r.rule_type() == RuleType::FilePattern)
        .chain(rules.iter().filter(|r| r.rule_type() == RuleType::Content));

    let findings = ordered
        .flat_map(|rule| evaluate_rule(rule, entries))
        .collect();

    EvaluationResult::from_findings(findings)
}

/// 小写扩展名（取文件名最后一个 `.` 之后的部分）
pub(crate) fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}
