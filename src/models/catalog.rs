//! 字段目录与文档上下文

use serde::{Deserialize, Serialize};

use crate::models::field::FieldSpec;

/// 共享单元格规则
///
/// 两个字段名来自源文档的同一个物理单元格，必须报告同一个值。
/// 冲突时以 primary 一侧为准
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedCellRule {
    /// 主字段（冲突时胜出）
    pub primary: String,
    /// 从字段
    pub secondary: String,
}

/// 文档族的字段目录
///
/// 有序的规范字段名清单 + 同义词字典 + 族级格式规则 + 跨字段规则表。
/// 新文档族只需新增一个 TOML 文件，不需要新增代码路径
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCatalog {
    /// 文档族名称（如 health_policy）
    pub family: String,
    /// 有序字段定义
    pub fields: Vec<FieldSpec>,
    /// 族级格式规则（随提示词发给抽取引擎，如货币/百分比格式要求）
    #[serde(default)]
    pub format_rules: Vec<String>,
    /// 共享单元格规则表
    #[serde(default)]
    pub shared_cells: Vec<SharedCellRule>,
}

impl FieldCatalog {
    /// 目录顺序的规范字段名
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// 按规范名查找字段定义
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// 文档上下文
///
/// 已线性化的文档全文 + 标识信息。每一轮的只读输入
#[derive(Debug, Clone)]
pub struct DocumentContext {
    /// 文档全文（上游归一化器的输出，视为不透明字符串）
    pub text: String,
    /// 来源文件路径（仅用于日志与报告）
    pub file_path: Option<String>,
    /// 展示名
    pub name: String,
}

impl DocumentContext {
    /// 创建新的文档上下文
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            file_path: None,
            name: name.into(),
        }
    }
}
