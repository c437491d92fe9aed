//! FilePattern 规则：文件存在 / 禁止 / 白名单

use tracing::warn;

use super::glob::{compile_all, matches_any};
use crate::infrastructure::ArchiveEntry;
use crate::models::{FilePatternPayload, Finding, Location, Rule};

/// 评估一条 FilePattern 规则
///
/// 顺序：require → block → allow；同一类中按模式顺序、压缩包顺序产出
pub fn evaluate(rule: &Rule, payload: &FilePatternPayload, entries: &[ArchiveEntry]) -> Vec<Finding> {
    let mut findings = Vec::new();

    for glob in compile_all(&payload.require) {
        if !entries.iter().any(|e| glob.is_match(&e.path)) {
            findings.push(Finding::for_rule(
                rule,
                format!("缺少匹配 `{}` 的文件", glob.pattern()),
                Vec::new(),
            ));
        }
    }

    for glob in compile_all(&payload.block) {
        for entry in entries.iter().filter(|e| glob.is_match(&e.path)) {
            findings.push(Finding::for_rule(
                rule,
                format!("文件 `{}` 命中禁止模式 `{}`", entry.path, glob.pattern()),
                vec![Location::file(&entry.path)],
            ));
        }
    }

    if !payload.allow.is_empty() {
        let allow = compile_all(&payload.allow);
        if allow.is_empty() {
            warn!("[规则 {}] allow 列表全部非法，跳过白名单检查", rule.id);
        } else {
            for entry in entries.iter().filter(|e| !matches_any(&allow, &e.path)) {
                findings.push(Finding::for_rule(
                    rule,
                    format!("文件 `{}` 不在允许列表中", entry.path),
                    vec![Location::file(&entry.path)],
                ));
            }
        }
    }

    findings
}
