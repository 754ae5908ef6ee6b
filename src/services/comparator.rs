//! 对比服务 - 业务能力层
//!
//! 只负责"对两份已冻结的字段映射表做逐字段 diff"能力。
//! 纯函数：无副作用、无网络调用

use crate::models::field::{ComparisonRecord, ComparisonStatus};
use crate::models::field_map::FieldMap;

/// 对比两份基于同一目录的最终字段映射表
///
/// 逐字段产出一条记录，顺序与目录一致：
/// - 两边均非空且相等 → Same
/// - 两边均为空 → Missing
/// - 其余 → Different
pub fn compare(map1: &FieldMap, map2: &FieldMap) -> Vec<ComparisonRecord> {
    map1.field_names()
        .iter()
        .map(|field| {
            let value1 = map1.get(field).and_then(|r| r.raw_value.clone());
            let value2 = map2.get(field).and_then(|r| r.raw_value.clone());

            let status = match (&value1, &value2) {
                (Some(v1), Some(v2)) if v1 == v2 => ComparisonStatus::Same,
                (None, None) => ComparisonStatus::Missing,
                _ => ComparisonStatus::Different,
            };

            ComparisonRecord {
                field: field.clone(),
                value1,
                value2,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::{Classification, ExtractionRecord};

    fn map_with(values: &[(&str, Option<&str>)]) -> FieldMap {
        let names: Vec<String> = values.iter().map(|(n, _)| n.to_string()).collect();
        let mut map = FieldMap::new(&names);
        for (name, value) in values {
            if let Some(v) = value {
                map.set(
                    name,
                    ExtractionRecord {
                        field_name: name.to_string(),
                        raw_value: Some(v.to_string()),
                        origin_pass: 1,
                        classified: Classification::Value,
                    },
                );
            }
        }
        map
    }

    #[test]
    fn test_same() {
        let records = compare(&map_with(&[("A", Some("1"))]), &map_with(&[("A", Some("1"))]));
        assert_eq!(records[0].status, ComparisonStatus::Same);
    }

    #[test]
    fn test_missing() {
        let records = compare(&map_with(&[("A", None)]), &map_with(&[("A", None)]));
        assert_eq!(records[0].status, ComparisonStatus::Missing);
    }

    #[test]
    fn test_different_values() {
        let records = compare(&map_with(&[("A", Some("1"))]), &map_with(&[("A", Some("2"))]));
        assert_eq!(records[0].status, ComparisonStatus::Different);
    }

    #[test]
    fn test_one_sided_null_is_different() {
        let records = compare(&map_with(&[("A", Some("1"))]), &map_with(&[("A", None)]));
        assert_eq!(records[0].status, ComparisonStatus::Different);
        assert_eq!(records[0].value1.as_deref(), Some("1"));
        assert_eq!(records[0].value2, None);
    }

    #[test]
    fn test_catalog_order_preserved() {
        let m1 = map_with(&[("B", Some("x")), ("A", Some("y"))]);
        let m2 = map_with(&[("B", Some("x")), ("A", Some("y"))]);
        let records = compare(&m1, &m2);
        assert_eq!(records[0].field, "B");
        assert_eq!(records[1].field, "A");
    }
}
