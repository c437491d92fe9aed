//! 评估结果（Finding）

use serde::{Deserialize, Serialize};

use crate::models::rule::{Rule, Severity};

/// 没有可评估规则时使用的合成规则 ID
pub const SYSTEM_ERROR_RULE_ID: &str = "system-error";
/// 压缩包读取或评估异常时使用的合成规则 ID
pub const EVALUATION_ERROR_RULE_ID: &str = "rule-evaluation-error";

/// Finding 的位置信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    /// 从 1 开始的行号
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl Location {
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            excerpt: None,
        }
    }

    pub fn line(file: impl Into<String>, line: usize, excerpt: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            excerpt: Some(excerpt.into()),
        }
    }
}

/// 一条规则评估结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl Finding {
    /// 基于规则创建 Finding，消息为"规则消息: 具体细节"
    pub fn for_rule(rule: &Rule, detail: impl AsRef<str>, locations: Vec<Location>) -> Self {
        let detail = detail.as_ref();
        let message = if rule.message.trim().is_empty() {
            detail.to_string()
        } else {
            format!("{}: {}", rule.message, detail)
        };

        Self {
            rule_id: rule.id.clone(),
            severity: rule.severity,
            message,
            locations,
        }
    }

    /// 合成的错误级 Finding（不对应任何用户规则）
    pub fn synthetic(rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity: Severity::Error,
            message: message.into(),
            locations: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// 一次评估的汇总结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationResult {
    pub findings: Vec<Finding>,
    /// 至少有一条 error 级 Finding 时为 true，决定通过与否
    pub has_errors: bool,
}

impl EvaluationResult {
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let has_errors = findings.iter().any(Finding::is_error);
        Self {
            findings,
            has_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding {
            rule_id: "r".to_string(),
            severity,
            message: "m".to_string(),
            locations: vec![],
        }
    }

    #[test]
    fn test_has_errors_only_with_error_severity() {
        let warnings = EvaluationResult::from_findings(vec![
            finding(Severity::Warning),
            finding(Severity::Warning),
        ]);
        assert!(!warnings.has_errors);

        let mixed = EvaluationResult::from_findings(vec![
            finding(Severity::Warning),
            finding(Severity::Error),
        ]);
        assert!(mixed.has_errors);

        assert!(!EvaluationResult::from_findings(vec![]).has_errors);
    }

    #[test]
    fn test_location_omits_empty_fields() {
        let json = serde_json::to_value(Location::file("a.txt")).unwrap();
        assert_eq!(json, serde_json::json!({ "file": "a.txt" }));
    }
}
