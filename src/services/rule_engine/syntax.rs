//! JS / TS 语法检查（tree-sitter）

use tree_sitter::{Language, Node, Parser};

/// 可以做语法检查的脚本方言
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptDialect {
    JavaScript,
    TypeScript,
    Tsx,
}

impl ScriptDialect {
    /// 根据扩展名判断方言，非 JS/TS 系列返回 `None`
    pub fn from_path(path: &str) -> Option<Self> {
        match super::extension(path)?.as_str() {
            "js" | "mjs" | "cjs" | "jsx" => Some(ScriptDialect::JavaScript),
            "ts" | "mts" | "cts" => Some(ScriptDialect::TypeScript),
            "tsx" => Some(ScriptDialect::Tsx),
            _ => None,
        }
    }

    fn language(self) -> Language {
        match self {
            ScriptDialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            ScriptDialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            ScriptDialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// 第一条语法诊断
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 从 1 开始的行号；解析器本身失败时为空
    pub line: Option<usize>,
    pub message: String,
}

/// 解析源码，返回第一条诊断；语法正确时返回 `None`
pub fn first_diagnostic(dialect: ScriptDialect, source: &str) -> Option<Diagnostic> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&dialect.language()) {
        return Some(Diagnostic {
            line: None,
            message: format!("解析器初始化失败: {}", e),
        });
    }

    let Some(tree) = parser.parse(source, None) else {
        return Some(Diagnostic {
            line: None,
            message: "解析失败".to_string(),
        });
    };

    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }

    let diagnostic = match find_first_error(root) {
        Some(node) => {
            let pos = node.start_position();
            let what = if node.is_missing() {
                format!("缺少 `{}`", node.kind())
            } else {
                "无法识别的语法".to_string()
            };
            Diagnostic {
                line: Some(pos.row + 1),
                message: format!("第 {} 行第 {} 列: {}", pos.row + 1, pos.column + 1, what),
            }
        }
        None => Diagnostic {
            line: None,
            message: "解析失败".to_string(),
        },
    };

    Some(diagnostic)
}

/// 先序遍历找到第一个 ERROR / MISSING 节点
fn find_first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_first_error(child) {
            return Some(found);
        }
    }
    None
}
