//! 领域规则服务 - 业务能力层
//!
//! 只负责"跨字段一致性规则"能力。规则是声明式数据
//! （随字段目录 TOML 加载），新文档族加数据即可，不加代码路径。
//!
//! 目前唯一的规则形态是共享单元格：源文档里同一个物理单元格
//! 同时定义了两个字段，二者必须报告同一个值。
//! 规则必须在**每一轮**之后重跑——后续轮次补上了配对中
//! 缺失的一员时，不能留下不一致的配对

use tracing::warn;

use crate::models::catalog::SharedCellRule;
use crate::models::field::ExtractionRecord;
use crate::models::field_map::FieldMap;

/// 规则冲突记录
///
/// 配对字段都有值但不一致时，按主字段裁决并留痕，绝不抛错
#[derive(Debug, Clone)]
pub struct RuleDiscrepancy {
    /// 主字段名
    pub primary: String,
    /// 从字段名
    pub secondary: String,
    /// 裁决前从字段的值
    pub discarded_value: String,
    /// 胜出的主字段值
    pub kept_value: String,
}

/// 领域规则服务
pub struct RuleEngine {
    rules: Vec<SharedCellRule>,
}

impl RuleEngine {
    /// 按规则表创建
    pub fn new(rules: Vec<SharedCellRule>) -> Self {
        Self { rules }
    }

    /// 对字段映射表应用全部规则（幂等）
    ///
    /// 共享单元格规则：
    /// - 恰好一侧有非空值 → 复制到另一侧
    /// - 两侧都有值但不同 → 主字段胜出，两侧取主字段值，记录冲突
    pub fn apply(&self, map: &mut FieldMap) -> Vec<RuleDiscrepancy> {
        let mut discrepancies = Vec::new();

        for rule in &self.rules {
            let primary_value = map.get(&rule.primary).and_then(|r| r.raw_value.clone());
            let secondary_value = map.get(&rule.secondary).and_then(|r| r.raw_value.clone());

            match (primary_value, secondary_value) {
                (Some(_), None) => {
                    if let Some(source) = map.get(&rule.primary).cloned() {
                        map.set(&rule.secondary, copy_record(&source, &rule.secondary));
                    }
                }
                (None, Some(_)) => {
                    if let Some(source) = map.get(&rule.secondary).cloned() {
                        map.set(&rule.primary, copy_record(&source, &rule.primary));
                    }
                }
                (Some(p), Some(s)) if p != s => {
                    warn!(
                        "共享单元格冲突: {} = {:?} 与 {} = {:?} 不一致，以主字段为准",
                        rule.primary, p, rule.secondary, s
                    );
                    if let Some(source) = map.get(&rule.primary).cloned() {
                        map.set(&rule.secondary, copy_record(&source, &rule.secondary));
                    }
                    discrepancies.push(RuleDiscrepancy {
                        primary: rule.primary.clone(),
                        secondary: rule.secondary.clone(),
                        discarded_value: s,
                        kept_value: p,
                    });
                }
                _ => {}
            }
        }

        discrepancies
    }
}

/// 复制记录到配对字段：值、分类、来源轮次保持，字段名改写
fn copy_record(source: &ExtractionRecord, target_field: &str) -> ExtractionRecord {
    ExtractionRecord {
        field_name: target_field.to_string(),
        raw_value: source.raw_value.clone(),
        origin_pass: source.origin_pass,
        classified: source.classified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::Classification;

    fn pair_rule() -> Vec<SharedCellRule> {
        vec![SharedCellRule {
            primary: "CoInsurance".to_string(),
            secondary: "Deductible".to_string(),
        }]
    }

    fn catalog() -> Vec<String> {
        vec!["Deductible".to_string(), "CoInsurance".to_string()]
    }

    fn value_record(field: &str, value: &str) -> ExtractionRecord {
        ExtractionRecord {
            field_name: field.to_string(),
            raw_value: Some(value.to_string()),
            origin_pass: 1,
            classified: Classification::Value,
        }
    }

    #[test]
    fn test_copy_to_missing_member() {
        // 场景 B：Deductible 为空，CoInsurance = "Nil"，配对规则生效
        let engine = RuleEngine::new(pair_rule());
        let mut map = FieldMap::new(&catalog());
        map.set("CoInsurance", value_record("CoInsurance", "Nil"));

        let discrepancies = engine.apply(&mut map);

        assert!(discrepancies.is_empty());
        let copied = map.get("Deductible").unwrap();
        assert_eq!(copied.raw_value.as_deref(), Some("Nil"));
        assert_eq!(copied.field_name, "Deductible");
        assert_eq!(copied.classified, Classification::Value);
    }

    #[test]
    fn test_copy_from_secondary_to_primary() {
        let engine = RuleEngine::new(pair_rule());
        let mut map = FieldMap::new(&catalog());
        map.set("Deductible", value_record("Deductible", "Nil"));

        engine.apply(&mut map);

        assert_eq!(
            map.get("CoInsurance").unwrap().raw_value.as_deref(),
            Some("Nil")
        );
    }

    #[test]
    fn test_conflict_primary_wins_and_recorded() {
        let engine = RuleEngine::new(pair_rule());
        let mut map = FieldMap::new(&catalog());
        map.set("CoInsurance", value_record("CoInsurance", "10%"));
        map.set("Deductible", value_record("Deductible", "20%"));

        let discrepancies = engine.apply(&mut map);

        assert_eq!(map.get("Deductible").unwrap().raw_value.as_deref(), Some("10%"));
        assert_eq!(map.get("CoInsurance").unwrap().raw_value.as_deref(), Some("10%"));
        assert_eq!(discrepancies.len(), 1);
        assert_eq!(discrepancies[0].discarded_value, "20%");
        assert_eq!(discrepancies[0].kept_value, "10%");
    }

    #[test]
    fn test_idempotent() {
        let engine = RuleEngine::new(pair_rule());
        let mut map = FieldMap::new(&catalog());
        map.set("CoInsurance", value_record("CoInsurance", "Nil"));

        engine.apply(&mut map);
        let after_once = map.final_values();

        let discrepancies = engine.apply(&mut map);
        let after_twice = map.final_values();

        // 应用两次与应用一次结果相同，且第二次不再报冲突
        assert_eq!(after_once, after_twice);
        assert!(discrepancies.is_empty());
    }

    #[test]
    fn test_both_null_untouched() {
        let engine = RuleEngine::new(pair_rule());
        let mut map = FieldMap::new(&catalog());

        let discrepancies = engine.apply(&mut map);

        assert!(discrepancies.is_empty());
        assert!(map.get("Deductible").is_none());
        assert!(map.get("CoInsurance").is_none());
    }
}
