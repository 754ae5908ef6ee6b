//! 值分类服务 - 业务能力层
//!
//! 只负责"判断一个原始值是答案还是概念描述"能力。
//! 抽取引擎的一个已知失败模式：不回答"免赔额是多少"，
//! 而是解释"免赔额是什么"。分类器把这类长篇描述识别出来，
//! 交由上层做针对性的二次提取
//!
//! 分类启发式按顺序应用，首个命中即定：
//! 1. 长度不超过短阈值 → Value
//! 2. 命中短答案词表 或 纯数字/货币/百分比形态 → Value
//! 3. 长度超过长阈值，或以定义式开场白开头 → Description
//! 4. 其余 → Unknown（暂时接受，后续轮次可被 Value 替换）

use phf::phf_set;
use regex::Regex;

use crate::config::Config;
use crate::models::field::Classification;

/// 短答案词表：保障状态类 token（小写比对）
static SHORT_ANSWER_VOCAB: phf::Set<&'static str> = phf_set! {
    "covered",
    "not covered",
    "nil",
    "n/a",
    "na",
    "yes",
    "no",
    "included",
    "not included",
    "excluded",
    "applicable",
    "not applicable",
    "unlimited",
    "waived",
    "optional",
    "as per policy",
    "actuals",
    "at actuals",
};

/// 值分类服务
pub struct ValueClassifier {
    short_threshold: usize,
    long_threshold: usize,
    currency_re: Regex,
    percentage_re: Regex,
    numeric_re: Regex,
    preamble_re: Regex,
}

impl ValueClassifier {
    /// 按配置创建分类器
    pub fn new(config: &Config) -> Self {
        Self {
            short_threshold: config.short_value_threshold,
            long_threshold: config.long_description_threshold,
            // 货币：可选币种符号/代码 + 数字（允许千分位与小数）
            currency_re: Regex::new(r"^(?:[$€£₹¥]|Rs\.?|INR|USD|EUR)\s*\d[\d,]*(?:\.\d+)?$")
                .expect("货币正则非法"),
            percentage_re: Regex::new(r"^\d+(?:\.\d+)?\s*%$").expect("百分比正则非法"),
            numeric_re: Regex::new(r"^\d[\d,]*(?:\.\d+)?$").expect("数字正则非法"),
            // 定义式开场白
            preamble_re: Regex::new(
                r"(?i)^(this is|these are|it is|this refers to|refers to|a fixed (amount|sum|percentage)|the (amount|portion|percentage) (that|which|of))",
            )
            .expect("开场白正则非法"),
        }
    }

    /// 对单个原始值分类
    ///
    /// 边界约定：长度恰好等于短阈值判为 Value；
    /// 超出一个字符并不直接判为 Description——
    /// 长度只是必要条件，还需要长度超过长阈值或带定义式开场白
    pub fn classify(&self, raw_value: &str) -> Classification {
        let value = raw_value.trim();
        if value.is_empty() {
            return Classification::Unknown;
        }

        let char_len = value.chars().count();

        if char_len <= self.short_threshold {
            return Classification::Value;
        }

        if self.matches_short_answer(value) {
            return Classification::Value;
        }

        if char_len > self.long_threshold || self.preamble_re.is_match(value) {
            return Classification::Description;
        }

        Classification::Unknown
    }

    /// 是否命中短答案词表或纯数值/货币/百分比形态
    fn matches_short_answer(&self, value: &str) -> bool {
        let lower = value.to_lowercase();
        SHORT_ANSWER_VOCAB.contains(lower.as_str())
            || self.currency_re.is_match(value)
            || self.percentage_re.is_match(value)
            || self.numeric_re.is_match(value)
    }
}
