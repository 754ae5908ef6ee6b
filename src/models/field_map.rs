//! 字段映射表（FieldMap）
//!
//! 按目录顺序组织的 `规范字段名 → Option<ExtractionRecord>` 映射，
//! 是跨轮次合并的基本单位。
//!
//! ## 核心不变量
//!
//! 合并只能替换 None 槽位或 Unknown 分类的记录，
//! **绝不覆盖已分类为 Value 的记录**——
//! 这是整条流水线的正确性核心：防止后续轮次把一个正确的短答案
//! "改进"成一段更长更差的描述。

use std::collections::HashMap;

use crate::models::field::{Classification, ExtractionRecord};

/// 按目录顺序的字段映射表
///
/// 每个文档独占一份，所有修改都发生在该文档的控制流上，
/// 不需要字段级锁
#[derive(Debug, Clone)]
pub struct FieldMap {
    /// 规范字段名的目录顺序
    order: Vec<String>,
    /// 字段名 → 记录（None 表示尚未解析出任何记录）
    entries: HashMap<String, Option<ExtractionRecord>>,
}

impl FieldMap {
    /// 按字段目录创建空映射表
    pub fn new(field_names: &[String]) -> Self {
        let order = field_names.to_vec();
        let entries = order.iter().map(|n| (n.clone(), None)).collect();
        Self { order, entries }
    }

    /// 目录顺序的字段名
    pub fn field_names(&self) -> &[String] {
        &self.order
    }

    /// 读取某字段的记录
    pub fn get(&self, field: &str) -> Option<&ExtractionRecord> {
        self.entries.get(field).and_then(|slot| slot.as_ref())
    }

    /// 写入某字段的记录（不做合并检查，仅供解析/规则层使用）
    pub fn set(&mut self, field: &str, record: ExtractionRecord) {
        if let Some(slot) = self.entries.get_mut(field) {
            *slot = Some(record);
        }
    }

    /// 将一轮的局部结果合并进来
    ///
    /// 合并规则（见模块文档的不变量）：
    /// - 当前槽位为 None → 直接写入
    /// - 当前记录分类为 Unknown → 仅当新记录分类为 Value 时替换
    /// - 当前记录分类为 Value 或 Description → 保持不变
    pub fn merge(&mut self, partial: &FieldMap) {
        let order = self.order.clone();
        for name in &order {
            let Some(incoming) = partial.get(name) else {
                continue;
            };
            let should_write = match self.get(name) {
                None => true,
                Some(current) => {
                    current.classified == Classification::Unknown && incoming.is_value()
                }
            };
            if should_write {
                self.set(name, incoming.clone());
            }
        }
    }

    /// 仍未解析的字段：槽位为 None，或记录分类为 Unknown
    ///
    /// 这是下一轮选择性重查的字段清单——
    /// 已持有 Value 记录的字段永远不会出现在这里
    pub fn unresolved_fields(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| match self.get(name) {
                None => true,
                Some(rec) => rec.classified == Classification::Unknown,
            })
            .cloned()
            .collect()
    }

    /// 是否所有字段都已解析（终态 Done 的判定条件）
    pub fn is_complete(&self) -> bool {
        self.unresolved_fields().is_empty()
    }

    /// 持有非空值的字段数量
    pub fn resolved_count(&self) -> usize {
        self.order
            .iter()
            .filter(|name| {
                self.get(name)
                    .map(|rec| rec.raw_value.is_some())
                    .unwrap_or(false)
            })
            .count()
    }

    /// 按目录顺序迭代 (字段名, 记录)
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&ExtractionRecord>)> {
        self.order
            .iter()
            .map(move |name| (name.as_str(), self.get(name)))
    }

    /// 冻结为最终的 `字段名 → Option<值>` 结果（目录顺序）
    pub fn final_values(&self) -> Vec<(String, Option<String>)> {
        self.order
            .iter()
            .map(|name| {
                let value = self.get(name).and_then(|rec| rec.raw_value.clone());
                (name.clone(), value)
            })
            .collect()
    }
}
