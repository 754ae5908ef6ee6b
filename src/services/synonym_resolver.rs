//! 同义词解析服务 - 业务能力层
//!
//! 只负责"标签归一化与别名匹配"能力，不关心流程。
//! 抽取引擎返回的标签经常与规范字段名不完全一致
//! （连词写法、单复数、多余修饰词），本服务把它们对回规范名

use crate::models::field::FieldSpec;

/// 归一化标签：转小写，非字母数字连续段折叠为单个空格，去首尾空白
pub fn normalize(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_space = false;
    for ch in label.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_space = true;
        }
    }
    out
}

/// 派生标签的连词变体
///
/// `&` 与独立单词 `and` 双向互换，且幂等：
/// 对别名集中任意一个别名再求别名集，结果不变
fn conjunction_variants(label: &str) -> Vec<String> {
    let mut variants = Vec::new();

    if label.contains('&') {
        variants.push(label.replace('&', "and"));
    }

    // 独立的 "and" 单词（不匹配 brand / candy 之类的子串）
    let tokens: Vec<&str> = label.split_whitespace().collect();
    if tokens.iter().any(|t| t.eq_ignore_ascii_case("and")) {
        let swapped: Vec<String> = tokens
            .iter()
            .map(|t| {
                if t.eq_ignore_ascii_case("and") {
                    "&".to_string()
                } else {
                    (*t).to_string()
                }
            })
            .collect();
        variants.push(swapped.join(" "));
    }

    variants
}

/// 展开单个标签的完整别名集（原文 + 连词变体，保序去重）
pub fn expand_aliases(label: &str) -> Vec<String> {
    let mut aliases = vec![label.to_string()];
    for variant in conjunction_variants(label) {
        if !aliases.contains(&variant) {
            aliases.push(variant);
        }
    }
    aliases
}

/// 单个字段的预计算别名信息
#[derive(Debug, Clone)]
struct FieldAliases {
    canonical: String,
    /// 手工同义词（原文）
    manual: Vec<String>,
    /// 全部别名（规范名 + 同义词，含连词变体）的原文形式
    raw: Vec<String>,
    /// 全部别名的归一化形式
    normalized: Vec<String>,
}

/// 同义词解析服务
///
/// 职责：
/// - 为每个字段预计算搜索别名集
/// - 将引擎返回的标签解析回规范字段名
/// - 只处理单个标签，不出现 FieldMap
pub struct SynonymResolver {
    fields: Vec<FieldAliases>,
}

impl SynonymResolver {
    /// 按字段目录创建解析器
    pub fn new(specs: &[FieldSpec]) -> Self {
        let fields = specs
            .iter()
            .map(|spec| {
                let mut raw = expand_aliases(&spec.name);
                for syn in &spec.synonyms {
                    for alias in expand_aliases(syn) {
                        if !raw.contains(&alias) {
                            raw.push(alias);
                        }
                    }
                }
                let mut normalized = Vec::new();
                for alias in &raw {
                    let n = normalize(alias);
                    if !n.is_empty() && !normalized.contains(&n) {
                        normalized.push(n);
                    }
                }
                FieldAliases {
                    canonical: spec.name.clone(),
                    manual: spec.synonyms.clone(),
                    raw,
                    normalized,
                }
            })
            .collect();
        Self { fields }
    }

    /// 某字段的完整别名集（供提示词当同义词提示用）
    pub fn aliases_for(&self, canonical: &str) -> Vec<String> {
        self.fields
            .iter()
            .find(|f| f.canonical == canonical)
            .map(|f| f.raw.clone())
            .unwrap_or_default()
    }

    /// 将返回标签解析为规范字段名
    ///
    /// 严格按优先级逐层匹配，每一层都在**全部字段**上尝试，
    /// 命中即停——后面的层级不再参与，
    /// 避免短规范名被无关的长标签以包含关系误中：
    /// 1. 与规范名完全相等
    /// 2. 与手工同义词完全相等
    /// 3. 归一化后相等
    /// 4. 归一化后互为子串
    /// 5. 与归一化同义词 token 级包含
    pub fn resolve(&self, label: &str) -> Option<String> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }

        // 层级 1: 规范名精确匹配
        for field in &self.fields {
            if field.canonical == label {
                return Some(field.canonical.clone());
            }
        }

        // 层级 2: 手工同义词精确匹配
        for field in &self.fields {
            if field.manual.iter().any(|s| s == label) {
                return Some(field.canonical.clone());
            }
        }

        let norm_label = normalize(label);
        if norm_label.is_empty() {
            return None;
        }

        // 层级 3: 归一化相等
        for field in &self.fields {
            if field.normalized.iter().any(|a| *a == norm_label) {
                return Some(field.canonical.clone());
            }
        }

        // 层级 4: 归一化互为子串
        for field in &self.fields {
            if field
                .normalized
                .iter()
                .any(|a| a.contains(&norm_label) || norm_label.contains(a.as_str()))
            {
                return Some(field.canonical.clone());
            }
        }

        // 层级 5: token 级包含
        let label_tokens: Vec<&str> = norm_label.split(' ').collect();
        for field in &self.fields {
            for alias in &field.normalized {
                let alias_tokens: Vec<&str> = alias.split(' ').collect();
                let alias_in_label = alias_tokens.iter().all(|t| label_tokens.contains(t));
                let label_in_alias = label_tokens.iter().all(|t| alias_tokens.contains(t));
                if alias_in_label || label_in_alias {
                    return Some(field.canonical.clone());
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, synonyms: &[&str]) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            format_hint: None,
        }
    }

    #[test]
    fn test_normalize_collapses_runs() {
        assert_eq!(normalize("  Room & Board  "), "room board");
        assert_eq!(normalize("Co-Insurance (%)"), "co insurance");
        assert_eq!(normalize("Pre/Post Hospitalisation"), "pre post hospitalisation");
    }

    #[test]
    fn test_conjunction_symmetry() {
        // "A & B" 的别名集必须含 "A and B"，反之亦然
        let from_amp = expand_aliases("Room & Board");
        assert!(from_amp.contains(&"Room and Board".to_string()));

        let from_and = expand_aliases("Room and Board");
        assert!(from_and.contains(&"Room & Board".to_string()));
    }

    #[test]
    fn test_conjunction_idempotent() {
        // 对别名再求别名集，集合不增长
        let base = expand_aliases("Room & Board");
        for alias in &base {
            let derived = expand_aliases(alias);
            for d in derived {
                assert!(
                    base.contains(&d) || normalize(&d) == normalize(&base[0]),
                    "意外的新别名: {}",
                    d
                );
            }
        }
    }

    #[test]
    fn test_standalone_and_only() {
        // "Brand" 中的 and 不是独立单词，不派生变体
        let aliases = expand_aliases("Brand Name");
        assert_eq!(aliases, vec!["Brand Name".to_string()]);
    }

    #[test]
    fn test_resolve_exact_before_containment() {
        let resolver = SynonymResolver::new(&[
            spec("Co-Pay", &[]),
            spec("Co-Pay Limit", &[]),
        ]);
        // 精确匹配先于子串包含，不会命中更长的字段
        assert_eq!(resolver.resolve("Co-Pay").as_deref(), Some("Co-Pay"));
        assert_eq!(resolver.resolve("Co-Pay Limit").as_deref(), Some("Co-Pay Limit"));
    }

    #[test]
    fn test_resolve_manual_synonym() {
        let resolver = SynonymResolver::new(&[spec("Deductible", &["Excess"])]);
        assert_eq!(resolver.resolve("Excess").as_deref(), Some("Deductible"));
    }

    #[test]
    fn test_resolve_normalized_equality() {
        let resolver = SynonymResolver::new(&[spec("Room & Board", &[])]);
        assert_eq!(resolver.resolve("room and board").as_deref(), Some("Room & Board"));
        assert_eq!(resolver.resolve("ROOM & BOARD").as_deref(), Some("Room & Board"));
    }

    #[test]
    fn test_resolve_substring_containment() {
        let resolver = SynonymResolver::new(&[spec("Deductible", &[])]);
        assert_eq!(
            resolver.resolve("Annual Deductible Amount").as_deref(),
            Some("Deductible")
        );
    }

    #[test]
    fn test_resolve_token_containment_on_synonym() {
        let resolver = SynonymResolver::new(&[spec("Maternity Benefit", &["Maternity Cover"])]);
        assert_eq!(
            resolver.resolve("Cover for Maternity").as_deref(),
            Some("Maternity Benefit")
        );
    }

    #[test]
    fn test_resolve_no_match() {
        let resolver = SynonymResolver::new(&[spec("Deductible", &[])]);
        assert_eq!(resolver.resolve("Ambulance Charges"), None);
        assert_eq!(resolver.resolve(""), None);
    }
}
