//! 路径 glob 匹配
//!
//! - 不含 `/` 的模式同时匹配文件名和完整路径（`README.md` 可以匹配任意深度）
//! - 含 `/` 的模式匹配完整路径，`*` 不跨目录，`**/` 匹配零或多层目录
//! - `*` 可以匹配以 `.` 开头的文件

use globset::{GlobBuilder, GlobMatcher};
use tracing::warn;

/// 编译后的单个 glob
#[derive(Debug, Clone)]
pub struct PathGlob {
    pattern: String,
    matcher: GlobMatcher,
    base_name: bool,
}

impl PathGlob {
    /// 编译模式，非法或空模式返回 `None`
    pub fn compile(pattern: &str) -> Option<Self> {
        let normalized = normalize(pattern);
        if normalized.is_empty() {
            return None;
        }

        match GlobBuilder::new(normalized).literal_separator(true).build() {
            Ok(glob) => Some(Self {
                pattern: pattern.to_string(),
                matcher: glob.compile_matcher(),
                base_name: !normalized.contains('/'),
            }),
            Err(e) => {
                warn!("忽略非法 glob `{}`: {}", pattern, e);
                None
            }
        }
    }

    /// 原始模式字符串
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, path: &str) -> bool {
        let path = normalize(path);
        if self.matcher.is_match(path) {
            return true;
        }
        self.base_name && self.matcher.is_match(base_name(path))
    }
}

/// 编译一组模式，跳过非法项
pub fn compile_all(patterns: &[String]) -> Vec<PathGlob> {
    patterns.iter().filter_map(|p| PathGlob::compile(p)).collect()
}

/// 是否匹配任意一个 glob
pub fn matches_any(globs: &[PathGlob], path: &str) -> bool {
    globs.iter().any(|g| g.is_match(path))
}

fn normalize(s: &str) -> &str {
    let mut s = s.trim();
    loop {
        if let Some(rest) = s.strip_prefix("./") {
            s = rest;
        } else if let Some(rest) = s.strip_prefix('/') {
            s = rest;
        } else {
            return s;
        }
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
