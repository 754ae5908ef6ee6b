//! 抽取引擎适配服务 - 业务能力层
//!
//! 外部协作边界：把"字段清单 + 文档全文"发给生成式文本服务，
//! 拿回期望含有两列表格的原始文本。
//! 引擎的输出不可信——周围可能混有说明文字、分隔风格不一——
//! 本服务不做任何解析，解析交给 TableParser
//!
//! 职责：
//! - 构建整卷抽取提示词（含同义词提示与族级格式规则）
//! - 构建单字段二次提取提示词（只带字段名和那段长文本，不带全文）
//! - 只负责调用，不出现 FieldMap，不关心轮次

use std::future::Future;

use tracing::debug;

use crate::clients::LlmClient;
use crate::config::Config;
use crate::error::LlmError;
use crate::models::catalog::FieldCatalog;
use crate::services::synonym_resolver::SynonymResolver;

/// 抽取引擎能力
///
/// 流程层只依赖这组能力，不关心引擎背后是什么传输；
/// 测试可以注入给定响应的引擎替身
pub trait ExtractionEngine {
    /// 对给定字段子集执行一次整卷抽取，返回引擎的原始响应文本
    fn extract_fields(
        &self,
        document_text: &str,
        field_names: &[String],
        catalog: &FieldCatalog,
        resolver: &SynonymResolver,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// 对单个字段做针对性二次提取
    fn rederive_value(
        &self,
        field_name: &str,
        long_text: &str,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

/// 抽取引擎适配服务
pub struct ExtractionService {
    llm_client: LlmClient,
}

impl ExtractionEngine for ExtractionService {
    fn extract_fields(
        &self,
        document_text: &str,
        field_names: &[String],
        catalog: &FieldCatalog,
        resolver: &SynonymResolver,
    ) -> impl Future<Output = Result<String, LlmError>> + Send {
        ExtractionService::extract_fields(self, document_text, field_names, catalog, resolver)
    }

    fn rederive_value(
        &self,
        field_name: &str,
        long_text: &str,
    ) -> impl Future<Output = Result<String, LlmError>> + Send {
        ExtractionService::rederive_value(self, field_name, long_text)
    }
}

impl ExtractionService {
    /// 创建新的抽取服务
    pub fn new(config: &Config) -> Self {
        Self {
            llm_client: LlmClient::new(config),
        }
    }

    /// 对给定字段子集执行一次整卷抽取
    ///
    /// # 参数
    /// - `document_text`: 已线性化的文档全文
    /// - `field_names`: 本轮要抽取的字段（选择性重查时是未解析子集）
    /// - `catalog`: 字段目录（提供格式提示与族级格式规则）
    /// - `resolver`: 同义词解析器（提供随提示词下发的别名提示）
    ///
    /// # 返回
    /// 引擎的原始响应文本
    pub async fn extract_fields(
        &self,
        document_text: &str,
        field_names: &[String],
        catalog: &FieldCatalog,
        resolver: &SynonymResolver,
    ) -> Result<String, LlmError> {
        debug!("构建抽取提示词，字段数: {}", field_names.len());

        let prompt = self.build_extraction_prompt(document_text, field_names, catalog, resolver);
        let system_message = "You are a meticulous insurance policy analyst. \
                              You extract exact values from policy documents and never \
                              explain or define terms. You answer only with the table requested.";

        self.llm_client.chat(&prompt, Some(system_message)).await
    }

    /// 对单个字段做针对性二次提取
    ///
    /// 只发送字段名和上次拿到的那段长描述，不再发送全文，
    /// 要求引擎从描述中摘出内嵌的短答案
    /// （如句尾的金额、句首的保障状态 token）
    pub async fn rederive_value(
        &self,
        field_name: &str,
        long_text: &str,
    ) -> Result<String, LlmError> {
        debug!("二次提取字段: {}", field_name);

        let prompt = format!(
            r#"The following text was returned for the insurance field "{field_name}", but it is a definition or description instead of the value itself.

Text:
{long_text}

Extract the short concrete answer embedded in this text — for example a trailing amount, a percentage, or a coverage word such as Covered, Not Covered or Nil. Reply with that short answer only, nothing else. If the text contains no concrete answer, reply with null."#,
        );

        let system_message = "You extract a single short answer from a longer description. \
                              Reply with the answer only, no explanation.";

        self.llm_client.chat(&prompt, Some(system_message)).await
    }

    /// 构建整卷抽取提示词
    fn build_extraction_prompt(
        &self,
        document_text: &str,
        field_names: &[String],
        catalog: &FieldCatalog,
        resolver: &SynonymResolver,
    ) -> String {
        // 字段清单：每行带同义词提示与格式提示
        let mut field_lines = String::new();
        for name in field_names {
            let mut line = format!("- {name}");

            let aliases: Vec<String> = resolver
                .aliases_for(name)
                .into_iter()
                .filter(|a| a != name)
                .collect();
            if !aliases.is_empty() {
                line.push_str(&format!(" (also appears as: {})", aliases.join(", ")));
            }

            if let Some(hint) = catalog.field(name).and_then(|f| f.format_hint.as_deref()) {
                line.push_str(&format!(" [expected format: {hint}]"));
            }

            field_lines.push_str(&line);
            field_lines.push('\n');
        }

        // 族级格式规则
        let format_rules = if catalog.format_rules.is_empty() {
            String::new()
        } else {
            let rules: Vec<String> = catalog
                .format_rules
                .iter()
                .map(|r| format!("- {r}"))
                .collect();
            format!("\nFormatting rules:\n{}\n", rules.join("\n"))
        };

        format!(
            r#"Extract the fields listed below from the insurance policy document.

Rules:
- Return ONE markdown table with exactly two columns: | Field | Value |
- One row per requested field, using the field name exactly as listed
- The value must be the short concrete answer (an amount, a percentage, or a coverage word), never a definition or explanation
- If a field is not present in the document, put the literal word null as its value
- Do not add any text before or after the table
{format_rules}
Fields to extract:
{field_lines}
Document:
{document_text}"#,
        )
    }
}
