//! 核心数据模型
//!
//! 定义抽取流水线贯穿使用的基础类型：
//! - `FieldSpec` - 字段目录中的单个字段定义（配置期创建，运行期不可变）
//! - `ExtractionRecord` - 一次抽取得到的字段记录
//! - `Classification` - 值/描述/未知 三分类
//! - `ComparisonRecord` - 两份结果的逐字段对比记录

use serde::{Deserialize, Serialize};

/// 字段定义
///
/// 每个文档族在配置期创建一次，运行期间不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// 规范字段名（唯一键）
    pub name: String,
    /// 手工维护的同义词列表（可为空，别名还会自动派生）
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// 期望的值形态提示（如 currency / percentage / boolean-status）
    #[serde(default)]
    pub format_hint: Option<String>,
}

/// 值的分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// 可直接使用的短答案
    Value,
    /// 概念的长篇描述（需要针对性二次提取）
    Description,
    /// 无法判定（暂时接受，后续轮次可替换）
    Unknown,
}

/// 单个字段的抽取记录
///
/// 由解析器产出；只有分类器的二次提取会改写 raw_value，
/// 控制器从不直接修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// 规范字段名
    pub field_name: String,
    /// 原始值（引擎明确返回 null 时为 None）
    pub raw_value: Option<String>,
    /// 产生该记录的轮次（从 1 开始）
    pub origin_pass: usize,
    /// 分类结果
    pub classified: Classification,
}

impl ExtractionRecord {
    /// 创建新的抽取记录（初始分类为 Unknown，由分类器改写）
    pub fn new(field_name: impl Into<String>, raw_value: Option<String>, origin_pass: usize) -> Self {
        Self {
            field_name: field_name.into(),
            raw_value,
            origin_pass,
            classified: Classification::Unknown,
        }
    }

    /// 是否持有已被接受的短答案
    pub fn is_value(&self) -> bool {
        self.classified == Classification::Value
    }
}

/// 对比状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonStatus {
    /// 两边均非空且相等
    Same,
    /// 其余情况（一边为空，或两边不等）
    Different,
    /// 两边均为空
    Missing,
}

/// 逐字段对比记录（只读，仅由 Comparator 产出）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    /// 规范字段名
    pub field: String,
    /// 文档 1 的最终值
    pub value1: Option<String>,
    /// 文档 2 的最终值
    pub value2: Option<String>,
    /// 对比状态
    pub status: ComparisonStatus,
}
