use crate::error::{AppError, AppResult, FileError};
use crate::models::rule::RuleSet;
use crate::models::submission::Submission;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 一个 TOML 数据文件：若干提交记录 + 若干规则集
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub submissions: Vec<Submission>,
    #[serde(default)]
    pub rule_sets: Vec<RuleSet>,
}

impl Fixture {
    /// 合并另一个数据文件
    pub fn merge(&mut self, other: Fixture) {
        self.submissions.extend(other.submissions);
        self.rule_sets.extend(other.rule_sets);
    }
}

/// 从 TOML 文件加载数据
pub async fn load_toml_fixture(toml_file_path: &Path) -> AppResult<Fixture> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(toml_file_path.display().to_string(), e))?;

    toml::from_str(&content).map_err(|e| {
        AppError::File(FileError::TomlParseFailed {
            path: toml_file_path.display().to_string(),
            source: Box::new(e),
        })
    })
}

/// 从文件夹中加载所有 TOML 文件并合并
///
/// 单个文件加载失败只记录警告，不影响其他文件
pub async fn load_all_toml_files(folder_path: &str) -> AppResult<Fixture> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        }
        .into());
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            paths.push(path);
        }
    }
    // read_dir 的顺序不稳定
    paths.sort();

    let mut fixture = Fixture::default();
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_toml_fixture(&path).await {
            Ok(loaded) => {
                tracing::info!(
                    "成功加载 {} 个提交, {} 个规则集",
                    loaded.submissions.len(),
                    loaded.rule_sets.len()
                );
                fixture.merge(loaded);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(fixture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RuleType, SubmissionStatus};

    const FIXTURE: &str = r#"
[[submissions]]
id = "sub-1"
projectId = "proj-1"
archiveLocation = "uploads/sub-1.zip"

[[rule_sets]]
id = "rs-1"
projectId = "proj-1"

[[rule_sets.rules]]
id = "readme"
type = "FilePattern"
severity = "error"
message = "缺少 README"
payload = { require = ["README.md"] }

[[rule_sets.rules]]
id = "no-console"
type = "Content"
severity = "warning"
message = "不要提交 console.log"
payload = { banned = ['console\.log'], paths = ["src/**/*.js"] }
"#;

    #[tokio::test]
    async fn test_load_folder_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), FIXTURE).unwrap();
        std::fs::write(dir.path().join("b.toml"), "[[submissions]]\nid = 3").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let fixture = load_all_toml_files(dir.path().to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(fixture.submissions.len(), 1);
        assert_eq!(fixture.submissions[0].status, SubmissionStatus::Pending);
        assert_eq!(fixture.rule_sets[0].rules.len(), 2);
        assert_eq!(fixture.rule_sets[0].rules[1].rule_type(), RuleType::Content);
    }

    #[tokio::test]
    async fn test_unknown_rule_type_keeps_file_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.toml");
        std::fs::write(
            &path,
            r#"
[[submissions]]
id = "sub-2"
projectId = "proj-2"
archiveLocation = "uploads/sub-2.zip"

[[rule_sets]]
id = "rs-2"
projectId = "proj-2"

[[rule_sets.rules]]
id = "semgrep"
type = "Semgrep"
severity = "error"
payload = { config = "p/default" }

[[rule_sets.rules]]
id = "todo"
type = "Content"
severity = "warning"
payload = { banned = ["TODO", 5] }
"#,
        )
        .unwrap();

        let fixture = load_toml_fixture(&path).await.unwrap();

        assert_eq!(fixture.submissions.len(), 1);
        let rules = &fixture.rule_sets[0].rules;
        assert_eq!(rules[0].rule_type(), RuleType::Unknown);
        assert_eq!(rules[1].rule_type(), RuleType::Content);
    }

    #[tokio::test]
    async fn test_missing_folder_is_error() {
        let result = load_all_toml_files("definitely/not/here").await;
        assert!(matches!(
            result,
            Err(AppError::File(FileError::DirectoryNotFound { .. }))
        ));
    }
}
