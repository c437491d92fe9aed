//! 规则与规则集
//!
//! 规则载荷在加载时（即规则集保存边界）按类型解析成强类型结构，
//! 评估引擎因此可以假设已知类型的载荷结构合法。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// 规则类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleType {
    FilePattern,
    Content,
    /// 已声明但本引擎不评估
    Regex,
    /// 已声明但本引擎不评估
    #[serde(rename = "ESLint")]
    Eslint,
    /// 已声明但本引擎不评估
    #[serde(rename = "AST")]
    Ast,
    /// 未识别的类型，不评估也不报错
    #[serde(other)]
    Unknown,
}

impl RuleType {
    /// 按存储中的类型名解析，未识别的名字归为 `Unknown`
    pub fn from_name(name: &str) -> Self {
        match name {
            "FilePattern" => RuleType::FilePattern,
            "Content" => RuleType::Content,
            "Regex" => RuleType::Regex,
            "ESLint" => RuleType::Eslint,
            "AST" => RuleType::Ast,
            _ => RuleType::Unknown,
        }
    }

    /// 本引擎能否评估该类型
    pub fn is_evaluable(self) -> bool {
        matches!(self, RuleType::FilePattern | RuleType::Content)
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleType::FilePattern => "FilePattern",
            RuleType::Content => "Content",
            RuleType::Regex => "Regex",
            RuleType::Eslint => "ESLint",
            RuleType::Ast => "AST",
            RuleType::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// 严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// FilePattern 规则载荷
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePatternPayload {
    /// 每个 glob 至少要匹配一个文件
    #[serde(deserialize_with = "lenient_strings")]
    pub require: Vec<String>,
    /// 匹配到的文件都会产生 Finding
    #[serde(deserialize_with = "lenient_strings")]
    pub block: Vec<String>,
    /// 非空时，不匹配任何 allow glob 的文件都会产生 Finding
    #[serde(deserialize_with = "lenient_strings")]
    pub allow: Vec<String>,
}

/// Content 规则载荷
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentPayload {
    /// 禁用的正则表达式（源码字符串）
    #[serde(deserialize_with = "lenient_strings")]
    pub banned: Vec<String>,
    /// 作用范围 glob，为空时作用于全部文件
    #[serde(deserialize_with = "lenient_strings")]
    pub paths: Vec<String>,
    /// 期望的语言（ts / js / py / cpp / c）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub no_emoji: bool,
    /// 只对 JS/TS 系列文件做语法检查
    pub syntax: bool,
}

/// 规则载荷（按规则类型区分）
#[derive(Debug, Clone, PartialEq)]
pub enum RulePayload {
    FilePattern(FilePatternPayload),
    Content(ContentPayload),
    /// 本引擎不评估的类型，原样保留类型名和载荷
    Unevaluated {
        rule_type: RuleType,
        type_name: String,
        raw: JsonValue,
    },
}

/// 规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub struct Rule {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    pub payload: RulePayload,
}

impl Rule {
    pub fn rule_type(&self) -> RuleType {
        match &self.payload {
            RulePayload::FilePattern(_) => RuleType::FilePattern,
            RulePayload::Content(_) => RuleType::Content,
            RulePayload::Unevaluated { rule_type, .. } => *rule_type,
        }
    }

    pub fn is_evaluable(&self) -> bool {
        self.rule_type().is_evaluable()
    }

    pub fn file_pattern(
        id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        payload: FilePatternPayload,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            payload: RulePayload::FilePattern(payload),
        }
    }

    pub fn content(
        id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        payload: ContentPayload,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            payload: RulePayload::Content(payload),
        }
    }
}

/// 存储层的规则形态：`{id, type, severity, message, payload}`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRule {
    id: String,
    #[serde(rename = "type")]
    rule_type: String,
    severity: Severity,
    #[serde(default)]
    message: String,
    #[serde(default)]
    payload: JsonValue,
}

impl TryFrom<RawRule> for Rule {
    type Error = serde_json::Error;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        let payload = match RuleType::from_name(&raw.rule_type) {
            RuleType::FilePattern => RulePayload::FilePattern(typed_payload(raw.payload)?),
            RuleType::Content => RulePayload::Content(typed_payload(raw.payload)?),
            other => RulePayload::Unevaluated {
                rule_type: other,
                type_name: raw.rule_type,
                raw: raw.payload,
            },
        };

        Ok(Self {
            id: raw.id,
            severity: raw.severity,
            message: raw.message,
            payload,
        })
    }
}

impl From<Rule> for RawRule {
    fn from(rule: Rule) -> Self {
        let (rule_type, payload) = match rule.payload {
            RulePayload::FilePattern(p) => (
                RuleType::FilePattern.to_string(),
                serde_json::to_value(p).unwrap_or(JsonValue::Null),
            ),
            RulePayload::Content(p) => (
                RuleType::Content.to_string(),
                serde_json::to_value(p).unwrap_or(JsonValue::Null),
            ),
            RulePayload::Unevaluated { type_name, raw, .. } => (type_name, raw),
        };

        Self {
            id: rule.id,
            rule_type,
            severity: rule.severity,
            message: rule.message,
            payload,
        }
    }
}

/// 缺省载荷视为空载荷
fn typed_payload<T>(value: JsonValue) -> Result<T, serde_json::Error>
where
    T: Default + serde::de::DeserializeOwned,
{
    if value.is_null() {
        Ok(T::default())
    } else {
        serde_json::from_value(value)
    }
}

/// 字符串列表字段：非字符串元素跳过并记录警告，整体不是列表时仍然报错
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<JsonValue>::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            JsonValue::String(s) => Some(s),
            other => {
                warn!("忽略规则载荷中的非字符串元素: {}", other);
                None
            }
        })
        .collect())
}

/// 规则集
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// 计算项目的有效规则集：按规则集顺序、规则顺序合并，同 ID 规则只保留第一次出现
pub fn effective_rules(rule_sets: &[RuleSet]) -> Vec<Rule> {
    let mut seen = HashSet::new();
    rule_sets
        .iter()
        .flat_map(|set| set.rules.iter())
        .filter(|rule| seen.insert(rule.id.clone()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_and_declared_types() {
        let rules: Vec<Rule> = serde_json::from_value(json!([
            {
                "id": "readme",
                "type": "FilePattern",
                "severity": "error",
                "message": "需要 README",
                "payload": { "require": ["README.md"] }
            },
            {
                "id": "todo",
                "type": "Content",
                "severity": "warning",
                "message": "不要留 TODO",
                "payload": { "banned": ["TODO"], "noEmoji": true }
            },
            {
                "id": "lint",
                "type": "ESLint",
                "severity": "error",
                "message": "eslint",
                "payload": { "config": "recommended" }
            }
        ]))
        .unwrap();

        assert_eq!(rules[0].rule_type(), RuleType::FilePattern);
        match &rules[1].payload {
            RulePayload::Content(p) => {
                assert_eq!(p.banned, vec!["TODO".to_string()]);
                assert!(p.no_emoji);
                assert!(!p.syntax);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        assert_eq!(rules[2].rule_type(), RuleType::Eslint);
        assert!(!rules[2].is_evaluable());
    }

    #[test]
    fn test_missing_payload_is_empty_payload() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "noop",
            "type": "FilePattern",
            "severity": "warning"
        }))
        .unwrap();

        assert_eq!(
            rule.payload,
            RulePayload::FilePattern(FilePatternPayload::default())
        );
    }

    #[test]
    fn test_malformed_payload_rejected_at_load() {
        let result: Result<Rule, _> = serde_json::from_value(json!({
            "id": "bad",
            "type": "Content",
            "severity": "error",
            "payload": { "banned": "TODO" }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unrecognized_type_is_inert() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "sg",
            "type": "Semgrep",
            "severity": "error",
            "payload": {}
        }))
        .unwrap();

        assert_eq!(rule.rule_type(), RuleType::Unknown);
        assert!(!rule.is_evaluable());

        let back = serde_json::to_value(&rule).unwrap();
        assert_eq!(back["type"], "Semgrep");
    }

    #[test]
    fn test_non_string_list_elements_are_skipped() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "todo",
            "type": "Content",
            "severity": "warning",
            "payload": { "banned": ["TODO", 5, null, "FIXME"], "paths": [true, "src/**"] }
        }))
        .unwrap();

        match rule.payload {
            RulePayload::Content(p) => {
                assert_eq!(p.banned, vec!["TODO".to_string(), "FIXME".to_string()]);
                assert_eq!(p.paths, vec!["src/**".to_string()]);
            }
            other => panic!("unexpected payload: {:?}", other),
        }

        let files: Rule = serde_json::from_value(json!({
            "id": "files",
            "type": "FilePattern",
            "severity": "error",
            "payload": { "require": [{ "glob": "x" }, "README.md"] }
        }))
        .unwrap();
        assert_eq!(
            files.payload,
            RulePayload::FilePattern(FilePatternPayload {
                require: vec!["README.md".to_string()],
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_effective_rules_keeps_first_duplicate() {
        let a = Rule::file_pattern("a", Severity::Error, "", FilePatternPayload::default());
        let b = Rule::content("b", Severity::Warning, "", ContentPayload::default());
        let sets = vec![
            RuleSet {
                id: "s1".to_string(),
                project_id: "p".to_string(),
                rules: vec![a.clone(), b.clone()],
            },
            RuleSet {
                id: "s2".to_string(),
                project_id: "p".to_string(),
                rules: vec![Rule::file_pattern(
                    "a",
                    Severity::Warning,
                    "dup",
                    FilePatternPayload::default(),
                )],
            },
        ];

        let rules = effective_rules(&sets);
        assert_eq!(rules, vec![a, b]);
    }
}
