//! 多轮抽取流程 - 流程层
//!
//! 核心职责：定义"一份文档"的完整多轮处理流程
//!
//! 状态机（每轮）：
//! `INIT → EXTRACT(pass=n) → PARSE → CLASSIFY → RULES → {DONE | EXTRACT(pass=n+1, 仅未解析字段)}`
//!
//! 终态：
//! - `Done` - 没有 null/Unknown 字段剩余
//! - `Exhausted` - 轮次预算用尽仍有字段未解析（不是错误，是部分结果）
//!
//! ## 选择性重查
//!
//! 只有规则应用后仍未解析的字段才进入下一轮的字段清单；
//! 已持有 Value 记录的字段**绝不重发**。
//! 把全部字段每轮重发会让引擎把已经正确的短答案
//! "改进"成更长更差的描述——这是实测过的失败模式，不得回退

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ExtractError, LlmError};
use crate::models::catalog::{DocumentContext, FieldCatalog};
use crate::models::field::{Classification, ExtractionRecord};
use crate::models::field_map::FieldMap;
use crate::services::rule_engine::RuleDiscrepancy;
use crate::services::table_parser::{parse_table, ParseOutcome};
use crate::services::{ExtractionEngine, ExtractionService, RuleEngine, SynonymResolver, ValueClassifier};
use crate::utils::logging::truncate_text;
use crate::workflow::document_ctx::DocumentCtx;

/// 单份文档处理的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// 所有字段都已解析
    Done,
    /// 轮次预算用尽，部分字段仍未解析（正常产出）
    Exhausted,
}

/// 单份文档的最终抽取结果
#[derive(Debug)]
pub struct ExtractionOutcome {
    /// 文档展示名
    pub document_name: String,
    /// 冻结后的字段映射表
    pub field_map: FieldMap,
    /// 终态
    pub status: RunStatus,
    /// 仍未解析的字段
    pub unresolved: Vec<String>,
    /// 规则裁决留痕
    pub discrepancies: Vec<RuleDiscrepancy>,
    /// 实际用掉的轮次
    pub passes_used: usize,
}

/// 多轮抽取控制器
///
/// 职责：
/// - 编排 EXTRACT → PARSE → CLASSIFY → RULES → 合并 的每轮循环
/// - 独占持有该文档的 FieldMap，所有修改都在本控制流上
/// - 只依赖业务能力（services），不持有传输资源
pub struct PassController<E = ExtractionService> {
    extraction_service: E,
    resolver: SynonymResolver,
    classifier: ValueClassifier,
    rule_engine: RuleEngine,
    catalog: FieldCatalog,
    max_passes: usize,
    verbose_logging: bool,
}

impl PassController {
    /// 按配置与字段目录创建控制器
    pub fn new(config: &Config, catalog: &FieldCatalog) -> Self {
        Self::with_engine(ExtractionService::new(config), config, catalog)
    }
}

impl<E: ExtractionEngine> PassController<E> {
    /// 用给定的抽取引擎创建控制器
    pub fn with_engine(engine: E, config: &Config, catalog: &FieldCatalog) -> Self {
        Self {
            extraction_service: engine,
            resolver: SynonymResolver::new(&catalog.fields),
            classifier: ValueClassifier::new(config),
            rule_engine: RuleEngine::new(catalog.shared_cells.clone()),
            catalog: catalog.clone(),
            max_passes: config.max_passes.max(1),
            verbose_logging: config.verbose_logging,
        }
    }

    /// 运行完整的多轮流程
    ///
    /// 失败传播策略：单个字段失败不会中止文档；
    /// 一轮的传输层失败（客户端重试耗尽后）放弃该轮，
    /// 回退到上一轮的 FieldMap 继续——唯一的硬失败是
    /// 全部轮次结束后零可解析字段
    pub async fn run(&self, document: &DocumentContext, ctx: &DocumentCtx) -> Result<ExtractionOutcome> {
        let field_names = self.catalog.field_names();
        let mut field_map = FieldMap::new(&field_names);
        let mut discrepancies: Vec<RuleDiscrepancy> = Vec::new();
        let mut status = RunStatus::Exhausted;
        let mut passes_used = 0;

        for pass in 1..=self.max_passes {
            // 本轮字段清单：首轮全量，之后只取未解析字段（选择性重查）
            let targets = if pass == 1 {
                field_names.clone()
            } else {
                field_map.unresolved_fields()
            };
            passes_used = pass;

            info!(
                "[文档 {}] 🔍 第 {}/{} 轮抽取，字段数: {}",
                ctx.document_index,
                pass,
                self.max_passes,
                targets.len()
            );

            // EXTRACT → PARSE → CLASSIFY
            match self.run_single_pass(document, &targets, pass, ctx).await {
                Ok(Some(partial)) => {
                    field_map.merge(&partial);
                }
                Ok(None) => {
                    // 本轮响应无可解析内容，相关字段留空等下一轮
                }
                Err(e) => {
                    // 传输失败与逻辑失败（空响应/空内容）分开记日志，处置相同
                    let transport = e
                        .downcast_ref::<LlmError>()
                        .map(LlmError::is_transport)
                        .unwrap_or(false);
                    if transport {
                        warn!(
                            "[文档 {}] ⚠️ 第 {} 轮传输失败，放弃本轮，沿用上一轮结果: {}",
                            ctx.document_index, pass, e
                        );
                    } else {
                        warn!(
                            "[文档 {}] ⚠️ 第 {} 轮引擎响应无效，放弃本轮，沿用上一轮结果: {}",
                            ctx.document_index, pass, e
                        );
                    }
                }
            }

            // RULES：每一轮之后都要重跑规则
            discrepancies.extend(self.rule_engine.apply(&mut field_map));

            if field_map.is_complete() {
                status = RunStatus::Done;
                info!(
                    "[文档 {}] ✅ 第 {} 轮后所有字段已解析",
                    ctx.document_index, pass
                );
                break;
            }
        }

        if field_map.resolved_count() == 0 {
            // 唯一的真正失败：零可解析字段
            return Err(ExtractError::NoFieldsResolved {
                document: ctx.document_name.clone(),
            }
            .into());
        }

        let unresolved = field_map.unresolved_fields();
        if !unresolved.is_empty() {
            warn!(
                "[文档 {}] ⚠️ 轮次预算用尽，仍有 {} 个字段未解析: {}",
                ctx.document_index,
                unresolved.len(),
                unresolved.join(", ")
            );
        }

        Ok(ExtractionOutcome {
            document_name: ctx.document_name.clone(),
            field_map,
            status,
            unresolved,
            discrepancies,
            passes_used,
        })
    }

    /// 执行单轮：调引擎、解析表格、分类、二次提取
    ///
    /// 返回 Ok(None) 表示本轮响应没有可解析内容（逻辑失败，不重试）；
    /// Err 只代表传输层失败
    async fn run_single_pass(
        &self,
        document: &DocumentContext,
        targets: &[String],
        pass: usize,
        ctx: &DocumentCtx,
    ) -> Result<Option<FieldMap>> {
        // EXTRACT
        let response = self
            .extraction_service
            .extract_fields(&document.text, targets, &self.catalog, &self.resolver)
            .await?;

        // PARSE
        let rows = match parse_table(&response) {
            ParseOutcome::Parsed(rows) => rows,
            ParseOutcome::Empty => {
                warn!("[文档 {}] 第 {} 轮响应为空", ctx.document_index, pass);
                return Ok(None);
            }
            ParseOutcome::NoTable(reason) => {
                warn!(
                    "[文档 {}] 第 {} 轮响应无表格结构: {}",
                    ctx.document_index, pass, reason
                );
                return Ok(None);
            }
        };

        // CLASSIFY（纯分类部分）
        let mut partial = self.build_partial_map(&rows, pass, ctx);

        // Description 记录的针对性二次提取
        self.rederive_descriptions(&mut partial, ctx).await;

        Ok(Some(partial))
    }

    /// 把解析出的行装配成本轮的局部 FieldMap
    ///
    /// - 标签经同义词解析对回规范名，解析不出的标签丢弃（记日志）
    /// - 值为 null 的行不产生记录，槽位留空等下一轮
    /// - 同一规范名出现多行时，第一条非空值的行胜出
    fn build_partial_map(
        &self,
        rows: &[(String, Option<String>)],
        pass: usize,
        ctx: &DocumentCtx,
    ) -> FieldMap {
        let mut partial = FieldMap::new(&self.catalog.field_names());

        for (label, value) in rows {
            let Some(canonical) = self.resolver.resolve(label) else {
                if self.verbose_logging {
                    info!(
                        "[文档 {}] 忽略无法识别的标签: {}",
                        ctx.document_index,
                        truncate_text(label, 60)
                    );
                }
                continue;
            };

            let Some(raw) = value else {
                // 引擎明确返回 null，槽位留空
                continue;
            };

            if partial.get(&canonical).is_some() {
                continue;
            }

            let mut record = ExtractionRecord::new(&canonical, Some(raw.clone()), pass);
            record.classified = self.classifier.classify(raw);

            if self.verbose_logging {
                info!(
                    "[文档 {}] {} = {} ({:?})",
                    ctx.document_index,
                    canonical,
                    truncate_text(raw, 60),
                    record.classified
                );
            }

            partial.set(&canonical, record);
        }

        partial
    }

    /// 对本轮所有 Description 记录做一次针对性二次提取
    ///
    /// 每个字段只二次提取一次并重新分类一次，绝不递归；
    /// 二次提取失败（传输或逻辑）时保留原始长文本记录——
    /// 宁可呈现冗长的答案，也不悄悄丢掉一个已找到的字段
    async fn rederive_descriptions(&self, partial: &mut FieldMap, ctx: &DocumentCtx) {
        let description_fields: Vec<String> = partial
            .iter()
            .filter(|(_, rec)| {
                rec.map(|r| r.classified == Classification::Description && r.raw_value.is_some())
                    .unwrap_or(false)
            })
            .map(|(name, _)| name.to_string())
            .collect();

        for field in description_fields {
            let Some(long_text) = partial.get(&field).and_then(|r| r.raw_value.clone()) else {
                continue;
            };

            info!(
                "[文档 {}] 📝 字段 {} 拿到的是描述而非值，发起针对性二次提取",
                ctx.document_index, field
            );

            match self.extraction_service.rederive_value(&field, &long_text).await {
                Ok(short) => {
                    let trimmed = short.trim();
                    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                        warn!(
                            "[文档 {}] 字段 {} 二次提取无答案，保留原始描述",
                            ctx.document_index, field
                        );
                        continue;
                    }

                    let mut record = partial.get(&field).cloned().unwrap_or_else(|| {
                        ExtractionRecord::new(&field, None, 0)
                    });
                    record.raw_value = Some(trimmed.to_string());
                    // 重新分类一次，不再循环
                    record.classified = self.classifier.classify(trimmed);
                    info!(
                        "[文档 {}] ✓ 字段 {} 二次提取得到: {} ({:?})",
                        ctx.document_index,
                        field,
                        truncate_text(trimmed, 60),
                        record.classified
                    );
                    partial.set(&field, record);
                }
                Err(e) => {
                    warn!(
                        "[文档 {}] 字段 {} 二次提取失败，保留原始描述: {}",
                        ctx.document_index, field, e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::SharedCellRule;
    use crate::models::field::FieldSpec;

    fn spec(name: &str, synonyms: &[&str]) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            format_hint: None,
        }
    }

    fn test_catalog() -> FieldCatalog {
        FieldCatalog {
            family: "health_policy".to_string(),
            fields: vec![
                spec("Coverage", &["Status"]),
                spec("Deductible", &[]),
                spec("CoInsurance", &[]),
            ],
            format_rules: vec![],
            shared_cells: vec![SharedCellRule {
                primary: "CoInsurance".to_string(),
                secondary: "Deductible".to_string(),
            }],
        }
    }

    fn controller() -> PassController {
        PassController::new(&Config::default(), &test_catalog())
    }

    fn ctx() -> DocumentCtx {
        DocumentCtx::new("policy.md".to_string(), 1, "health_policy".to_string())
    }

    #[test]
    fn test_build_partial_map_resolves_synonym_label() {
        // 场景 A：表格行 "Status | Covered" 通过同义词对回 Coverage 字段
        let c = controller();
        let rows = vec![("Status".to_string(), Some("Covered".to_string()))];

        let partial = c.build_partial_map(&rows, 1, &ctx());

        let rec = partial.get("Coverage").expect("Coverage 应有记录");
        assert_eq!(rec.raw_value.as_deref(), Some("Covered"));
        assert_eq!(rec.classified, Classification::Value);
        assert_eq!(rec.origin_pass, 1);
    }

    #[test]
    fn test_build_partial_map_null_rows_leave_slot_empty() {
        let c = controller();
        let rows = vec![
            ("Deductible".to_string(), None),
            ("CoInsurance".to_string(), Some("Nil".to_string())),
        ];

        let partial = c.build_partial_map(&rows, 1, &ctx());

        assert!(partial.get("Deductible").is_none());
        assert_eq!(partial.get("CoInsurance").unwrap().raw_value.as_deref(), Some("Nil"));
    }

    #[test]
    fn test_build_partial_map_first_row_wins() {
        let c = controller();
        let rows = vec![
            ("Deductible".to_string(), Some("Nil".to_string())),
            ("Deductible".to_string(), Some("$500".to_string())),
        ];

        let partial = c.build_partial_map(&rows, 1, &ctx());
        assert_eq!(partial.get("Deductible").unwrap().raw_value.as_deref(), Some("Nil"));
    }

    #[test]
    fn test_build_partial_map_unknown_label_dropped() {
        let c = controller();
        let rows = vec![("Ambulance Charges".to_string(), Some("Covered".to_string()))];

        let partial = c.build_partial_map(&rows, 1, &ctx());
        assert!(partial.unresolved_fields().len() == 3);
    }

    #[test]
    fn test_selective_revalidation_field_list() {
        // 已持有 Value 记录的字段不得出现在下一轮的重查清单中
        let c = controller();
        let rows = vec![("Coverage".to_string(), Some("Covered".to_string()))];
        let partial = c.build_partial_map(&rows, 1, &ctx());

        let mut running = FieldMap::new(&c.catalog.field_names());
        running.merge(&partial);

        let next_targets = running.unresolved_fields();
        assert!(!next_targets.contains(&"Coverage".to_string()));
        assert!(next_targets.contains(&"Deductible".to_string()));
        assert!(next_targets.contains(&"CoInsurance".to_string()));
    }

    #[test]
    fn test_pairing_rule_after_merge() {
        // 场景 B：第 1 轮后 Deductible 为空、CoInsurance = "Nil"，
        // 规则应用后两者都是 "Nil"
        let c = controller();
        let rows = vec![
            ("Coverage".to_string(), Some("Covered".to_string())),
            ("CoInsurance".to_string(), Some("Nil".to_string())),
        ];
        let partial = c.build_partial_map(&rows, 1, &ctx());

        let mut running = FieldMap::new(&c.catalog.field_names());
        running.merge(&partial);
        c.rule_engine.apply(&mut running);

        assert_eq!(running.get("Deductible").unwrap().raw_value.as_deref(), Some("Nil"));
        assert_eq!(running.get("CoInsurance").unwrap().raw_value.as_deref(), Some("Nil"));
        assert!(running.is_complete());
    }

    #[test]
    fn test_merge_monotonicity_across_passes() {
        // 第 2 轮拿到的更长描述不得覆盖第 1 轮已接受的 Value
        let c = controller();

        let pass1 = c.build_partial_map(
            &[("Deductible".to_string(), Some("Nil".to_string()))],
            1,
            &ctx(),
        );
        let pass2 = c.build_partial_map(
            &[(
                "Deductible".to_string(),
                Some("This is a fixed amount a member pays before insurance pays.".to_string()),
            )],
            2,
            &ctx(),
        );

        let mut running = FieldMap::new(&c.catalog.field_names());
        running.merge(&pass1);
        running.merge(&pass2);

        let rec = running.get("Deductible").unwrap();
        assert_eq!(rec.raw_value.as_deref(), Some("Nil"));
        assert_eq!(rec.classified, Classification::Value);
    }

    // ========== 注入引擎替身的整轮流程测试 ==========

    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// 返回预置响应的引擎替身；None 表示该次调用失败
    struct CannedEngine {
        extract_replies: Mutex<VecDeque<Option<String>>>,
        rederive_reply: Option<String>,
        rederive_calls: Arc<AtomicUsize>,
    }

    impl CannedEngine {
        fn new(extract_replies: Vec<Option<&str>>, rederive_reply: Option<&str>) -> Self {
            Self {
                extract_replies: Mutex::new(
                    extract_replies
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                rederive_reply: rederive_reply.map(str::to_string),
                rederive_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl ExtractionEngine for CannedEngine {
        fn extract_fields(
            &self,
            _document_text: &str,
            _field_names: &[String],
            _catalog: &FieldCatalog,
            _resolver: &SynonymResolver,
        ) -> impl Future<Output = Result<String, LlmError>> + Send {
            let next = self.extract_replies.lock().unwrap().pop_front();
            async move {
                match next {
                    Some(Some(reply)) => Ok(reply),
                    _ => Err(LlmError::EmptyContent {
                        model: "canned".to_string(),
                    }),
                }
            }
        }

        fn rederive_value(
            &self,
            _field_name: &str,
            _long_text: &str,
        ) -> impl Future<Output = Result<String, LlmError>> + Send {
            self.rederive_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.rederive_reply.clone();
            async move {
                match reply {
                    Some(r) => Ok(r),
                    None => Err(LlmError::EmptyContent {
                        model: "canned".to_string(),
                    }),
                }
            }
        }
    }

    const DESCRIPTION_REPLY: &str = "\
| Coverage | Covered |\n\
| Deductible | This is a fixed amount that the member must pay before the cover applies. |\n\
| CoInsurance | Nil |\n";

    fn canned_controller(engine: CannedEngine) -> PassController<CannedEngine> {
        PassController::with_engine(engine, &Config::default(), &test_catalog())
    }

    /// 无共享单元格规则的目录：保留描述类测试需要它，
    /// 否则配对规则会按 §4.4 用 CoInsurance 的值覆盖 Deductible 的描述
    fn test_catalog_without_shared_cells() -> FieldCatalog {
        FieldCatalog {
            shared_cells: vec![],
            ..test_catalog()
        }
    }

    fn canned_controller_unpaired(engine: CannedEngine) -> PassController<CannedEngine> {
        PassController::with_engine(engine, &Config::default(), &test_catalog_without_shared_cells())
    }

    fn document() -> DocumentContext {
        DocumentContext::new("policy.md", "Policy Schedule. Deductible: Nil.")
    }

    #[tokio::test]
    async fn test_description_rederived_to_short_answer() {
        // 引擎给 Deductible 回了一段定义式描述，二次提取把它换成短答案
        let engine = CannedEngine::new(vec![Some(DESCRIPTION_REPLY)], Some("Nil"));
        let calls = engine.rederive_calls.clone();
        let controller = canned_controller(engine);

        let outcome = controller.run(&document(), &ctx()).await.expect("处理失败");

        let rec = outcome.field_map.get("Deductible").expect("应有记录");
        assert_eq!(rec.raw_value.as_deref(), Some("Nil"));
        assert_eq!(rec.classified, Classification::Value);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.status, RunStatus::Done);
        assert_eq!(outcome.passes_used, 1);
    }

    #[tokio::test]
    async fn test_rederive_null_reply_keeps_description() {
        // 二次提取回 null 视作无答案，保留原始描述而不是丢掉字段
        let engine = CannedEngine::new(vec![Some(DESCRIPTION_REPLY)], Some("null"));
        let calls = engine.rederive_calls.clone();
        let controller = canned_controller_unpaired(engine);

        let outcome = controller.run(&document(), &ctx()).await.expect("处理失败");

        let rec = outcome.field_map.get("Deductible").expect("应有记录");
        assert!(rec.raw_value.as_deref().unwrap().starts_with("This is a fixed amount"));
        assert_eq!(rec.classified, Classification::Description);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rederive_failure_keeps_description() {
        // 二次提取传输/逻辑失败时同样保留原始描述
        let engine = CannedEngine::new(vec![Some(DESCRIPTION_REPLY)], None);
        let controller = canned_controller_unpaired(engine);

        let outcome = controller.run(&document(), &ctx()).await.expect("处理失败");

        let rec = outcome.field_map.get("Deductible").expect("应有记录");
        assert_eq!(rec.classified, Classification::Description);
        assert!(rec.raw_value.is_some());
    }

    #[tokio::test]
    async fn test_rederive_result_reclassified_once() {
        // 二次提取回了另一段描述：重新分类一次后接受，不再递归二次提取
        let second_description = "It is the portion of the claim borne by the member \
                                  before any benefit amount is paid out.";
        let engine = CannedEngine::new(vec![Some(DESCRIPTION_REPLY)], Some(second_description));
        let calls = engine.rederive_calls.clone();
        let controller = canned_controller_unpaired(engine);

        let outcome = controller.run(&document(), &ctx()).await.expect("处理失败");

        let rec = outcome.field_map.get("Deductible").expect("应有记录");
        assert_eq!(rec.raw_value.as_deref(), Some(second_description));
        assert_eq!(rec.classified, Classification::Description);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_engine_reply_abandons_pass_only() {
        // 第 1 轮引擎返回空内容（逻辑失败）：放弃该轮但不中止文档，
        // 第 2 轮补齐后正常收束
        let full_reply = "\
| Coverage | Covered |\n\
| Deductible | Nil |\n\
| CoInsurance | Nil |\n";
        let engine = CannedEngine::new(vec![None, Some(full_reply)], None);
        let controller = canned_controller(engine);

        let outcome = controller.run(&document(), &ctx()).await.expect("处理失败");

        assert_eq!(outcome.status, RunStatus::Done);
        assert_eq!(outcome.passes_used, 2);
        assert_eq!(
            outcome.field_map.get("Coverage").unwrap().origin_pass,
            2
        );
    }

    #[test]
    fn test_description_classified_in_partial_map() {
        // 场景 C 的前半段：长描述被判为 Description（二次提取需要网络，见集成测试）
        let c = controller();
        let rows = vec![(
            "Deductible".to_string(),
            Some("This is a fixed amount a member pays before insurance pays. Nil.".to_string()),
        )];

        let partial = c.build_partial_map(&rows, 1, &ctx());
        assert_eq!(
            partial.get("Deductible").unwrap().classified,
            Classification::Description
        );
    }
}
