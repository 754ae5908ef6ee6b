//! 单个文档处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责处理单份文档的完整生命周期，是文档级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **读取文档**：从磁盘加载文档全文
//! 2. **流程调度**：创建并驱动 `PassController`
//! 3. **结果落盘**：把冻结后的字段表追加到输出日志文件
//! 4. **警告记录**：仍未解析的字段写入 warn 文件
//! 5. **统计输出**：记录该文档的解析情况

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::models::catalog::{DocumentContext, FieldCatalog};
use crate::services::WarnWriter;
use crate::utils::logging::append_log_file;
use crate::workflow::{DocumentCtx, ExtractionOutcome, PassController, RunStatus};

/// 处理单份文档
///
/// # 参数
/// - `file_path`: 文档文本文件路径
/// - `document_index`: 文档索引（用于日志）
/// - `catalog`: 字段目录
/// - `config`: 配置
///
/// # 返回
/// 返回是否成功处理（Exhausted 也算成功，只要有可解析字段）
pub async fn process_document(
    file_path: &Path,
    document_index: usize,
    catalog: &FieldCatalog,
    config: &Config,
) -> Result<bool> {
    let document_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.display().to_string());

    let text = tokio::fs::read_to_string(file_path)
        .await
        .with_context(|| format!("无法读取文档: {}", file_path.display()))?;

    if text.trim().is_empty() {
        warn!("[文档 {}] ⚠️ 文档为空，跳过: {}", document_index, document_name);
        return Ok(false);
    }

    let mut document = DocumentContext::new(document_name.clone(), text);
    document.file_path = Some(file_path.display().to_string());

    let ctx = DocumentCtx::new(document_name.clone(), document_index, catalog.family.clone());
    log_document_start(&ctx, catalog.fields.len());

    // 流程对象只创建一次
    let controller = PassController::new(config, catalog);
    let outcome = controller.run(&document, &ctx).await?;

    // 结果落盘
    write_outcome(&outcome, config)?;

    // 未解析字段记入 warn 文件
    if !outcome.unresolved.is_empty() {
        let warn_writer = WarnWriter::with_path(config.warn_file.clone());
        if let Err(e) = warn_writer.write(&document_name, &outcome.unresolved).await {
            warn!("[文档 {}] 警告文件写入失败: {}", document_index, e);
        }
    }

    log_document_complete(&ctx, &outcome, catalog.fields.len());

    Ok(true)
}

/// 把一份文档的最终字段表追加到输出日志文件
fn write_outcome(outcome: &ExtractionOutcome, config: &Config) -> Result<()> {
    let mut block = String::new();
    block.push_str(&format!(
        "\n{}\n文档: {} | 轮次: {} | 终态: {:?}\n{}\n",
        "─".repeat(60),
        outcome.document_name,
        outcome.passes_used,
        outcome.status,
        "─".repeat(60)
    ));
    for (field, value) in outcome.field_map.final_values() {
        block.push_str(&format!(
            "{} | {}\n",
            field,
            value.as_deref().unwrap_or("null")
        ));
    }
    for d in &outcome.discrepancies {
        block.push_str(&format!(
            "规则裁决: {} 与 {} 值不一致，已丢弃 \"{}\" 保留 \"{}\"\n",
            d.primary, d.secondary, d.discarded_value, d.kept_value
        ));
    }

    // 机器可读的单行 JSON，便于下游脚本直接消费
    let json_map: serde_json::Map<String, serde_json::Value> = outcome
        .field_map
        .final_values()
        .into_iter()
        .map(|(field, value)| {
            let v = value
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null);
            (field, v)
        })
        .collect();
    block.push_str(&format!(
        "JSON: {}\n",
        serde_json::Value::Object(json_map)
    ));

    append_log_file(&config.output_log_file, &block)
}

// ========== 日志辅助函数 ==========

fn log_document_start(ctx: &DocumentCtx, field_count: usize) {
    info!("[文档 {}] 开始处理", ctx.document_index);
    info!("[文档 {}] 名称: {}", ctx.document_index, ctx.document_name);
    info!("[文档 {}] 文档族: {}", ctx.document_index, ctx.family);
    info!("[文档 {}] 目录字段总数: {}", ctx.document_index, field_count);
}

fn log_document_complete(ctx: &DocumentCtx, outcome: &ExtractionOutcome, total: usize) {
    let resolved = outcome.field_map.resolved_count();
    match outcome.status {
        RunStatus::Done => {
            info!(
                "[文档 {}] ✅ 处理完成: 全部 {} 个字段已解析（{} 轮）\n",
                ctx.document_index, total, outcome.passes_used
            );
        }
        RunStatus::Exhausted => {
            info!(
                "[文档 {}] ⏹️ 轮次预算用尽: 已解析 {}/{}，未解析 {} 个\n",
                ctx.document_index,
                resolved,
                total,
                outcome.unresolved.len()
            );
        }
    }
}
