//! Content 规则：语言、emoji、语法、禁用模式

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::glob::{compile_all, matches_any};
use super::syntax::{first_diagnostic, ScriptDialect};
use crate::infrastructure::ArchiveEntry;
use crate::models::{ContentPayload, Finding, Location, Rule};
use crate::utils::logging::truncate_text;

/// 摘录最大字符数
pub const MAX_EXCERPT_CHARS: usize = 200;

static PICTOGRAPHIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{Extended_Pictographic}").expect("pictographic class is a valid regex")
});

/// 语言与扩展名分组
pub fn language_extensions(language: &str) -> Option<&'static [&'static str]> {
    match language.trim().to_ascii_lowercase().as_str() {
        "ts" => Some(&["ts", "tsx"]),
        "js" => Some(&["js", "mjs", "cjs"]),
        "py" => Some(&["py"]),
        "cpp" => Some(&["cpp", "cc", "cxx", "c++"]),
        "c" => Some(&["c"]),
        _ => None,
    }
}

/// 评估一条 Content 规则
///
/// 按压缩包顺序遍历作用范围内的文件，每个文件依次检查：
/// language → noEmoji → syntax → banned
pub fn evaluate(rule: &Rule, payload: &ContentPayload, entries: &[ArchiveEntry]) -> Vec<Finding> {
    let scope = compile_all(&payload.paths);
    let banned = compile_banned(rule, &payload.banned);

    let expected = payload.language.as_deref().and_then(|lang| {
        let group = language_extensions(lang);
        if group.is_none() {
            warn!("[规则 {}] 未知语言 `{}`，跳过语言检查", rule.id, lang);
        }
        group
    });

    let mut findings = Vec::new();

    for entry in entries {
        if !payload.paths.is_empty() && !matches_any(&scope, &entry.path) {
            continue;
        }
        if entry.oversized {
            debug!("[规则 {}] 跳过超限文件: {}", rule.id, entry.path);
            continue;
        }

        if let Some(group) = expected {
            let ext = super::extension(&entry.path);
            if !ext.as_deref().is_some_and(|e| group.contains(&e)) {
                findings.push(Finding::for_rule(
                    rule,
                    format!(
                        "文件 `{}` 不是 {} 语言文件",
                        entry.path,
                        payload.language.as_deref().unwrap_or_default()
                    ),
                    vec![Location::file(&entry.path)],
                ));
            }
        }

        if payload.no_emoji && PICTOGRAPHIC.is_match(&entry.content) {
            findings.push(Finding::for_rule(
                rule,
                format!("文件 `{}` 包含 emoji", entry.path),
                vec![Location::file(&entry.path)],
            ));
        }

        if payload.syntax {
            if let Some(dialect) = ScriptDialect::from_path(&entry.path) {
                if let Some(diagnostic) = first_diagnostic(dialect, &entry.content) {
                    let location = Location {
                        file: entry.path.clone(),
                        line: diagnostic.line,
                        excerpt: None,
                    };
                    findings.push(Finding::for_rule(
                        rule,
                        format!("文件 `{}` 语法错误: {}", entry.path, diagnostic.message),
                        vec![location],
                    ));
                }
            }
        }

        if !banned.is_empty() {
            scan_banned(rule, &banned, entry, &mut findings);
        }
    }

    findings
}

/// 编译禁用模式，非法正则直接跳过
fn compile_banned(rule: &Rule, patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                debug!("[规则 {}] 忽略非法正则 `{}`: {}", rule.id, p, e);
                None
            }
        })
        .collect()
}

/// 逐行扫描，每行只报告第一个命中的模式
fn scan_banned(rule: &Rule, banned: &[Regex], entry: &ArchiveEntry, findings: &mut Vec<Finding>) {
    for (index, line) in source_lines(&entry.content).enumerate() {
        if let Some(re) = banned.iter().find(|re| re.is_match(line)) {
            let excerpt = truncate_text(line.trim(), MAX_EXCERPT_CHARS);
            findings.push(Finding::for_rule(
                rule,
                format!("命中禁用模式 `{}`", re.as_str()),
                vec![Location::line(&entry.path, index + 1, excerpt)],
            ));
        }
    }
}

/// 按 `\r\n`、`\n` 或单独的 `\r` 切分行，末尾换行不产生空行
fn source_lines(content: &str) -> impl Iterator<Item = &str> + '_ {
    let body = content
        .strip_suffix("\r\n")
        .or_else(|| content.strip_suffix('\n'))
        .or_else(|| content.strip_suffix('\r'))
        .unwrap_or(content);

    (!content.is_empty())
        .then_some(body)
        .into_iter()
        .flat_map(|body| body.split('\n'))
        .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split('\r'))
}
