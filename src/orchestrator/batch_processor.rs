//! 批量文档处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量文档的处理和运行模式调度。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志文件、加载字段目录
//! 2. **模式调度**：对比模式（COMPARE_FILES）或目录批量模式
//! 3. **批量加载**：扫描文档目录下所有 .txt / .md 文件
//! 4. **并发控制**：使用 Semaphore 限制并发数量
//! 5. **分批处理**：将文档分批次处理，每批完成后再开始下一批
//! 6. **全局统计**：汇总所有文档的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个文档的细节
//! - **并发安全**：每份文档独占自己的 FieldMap，任务间无共享可变状态
//! - **向下委托**：委托 document_processor 处理单个文档

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::catalog::{DocumentContext, FieldCatalog};
use crate::models::field::ComparisonStatus;
use crate::models::load_catalog;
use crate::orchestrator::document_processor;
use crate::services::compare;
use crate::utils::logging::{
    init_log_file, log_batch_complete, log_batch_start, log_documents_loaded, print_final_stats,
};
use crate::workflow::{DocumentCtx, ExtractionOutcome, PassController};

/// 应用主结构
pub struct App {
    config: Config,
    catalog: FieldCatalog,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        // 加载字段目录
        let catalog = load_catalog(config.catalog_file.as_ref()).await?;
        info!(
            "✓ 字段目录已加载: {} (族: {}, 字段数: {}, 规则数: {})",
            config.catalog_file,
            catalog.family,
            catalog.fields.len(),
            catalog.shared_cells.len()
        );

        Ok(Self { config, catalog })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        if let Some(compare_files) = &self.config.compare_files {
            return self.run_compare_mode(compare_files).await;
        }

        // 加载所有待处理的文档
        let all_documents = self.load_documents().await?;

        if all_documents.is_empty() {
            warn!("⚠️ 没有找到待处理的文档文件，程序结束");
            return Ok(());
        }

        let total_documents = all_documents.len();
        log_documents_loaded(total_documents, self.config.max_concurrent_documents);

        // 处理所有文档
        let stats = self.process_all_documents(all_documents).await?;

        // 输出最终统计
        print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(())
    }

    /// 扫描文档目录
    async fn load_documents(&self) -> Result<Vec<PathBuf>> {
        info!("\n📁 正在扫描待处理的文档: {}", self.config.documents_folder);

        let mut entries = tokio::fs::read_dir(&self.config.documents_folder)
            .await
            .with_context(|| format!("无法读取文档目录: {}", self.config.documents_folder))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_text = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"))
                .unwrap_or(false);
            if path.is_file() && is_text {
                paths.push(path);
            }
        }

        // 固定顺序，保证日志与批次划分可复现
        paths.sort();
        Ok(paths)
    }

    /// 处理所有文档
    async fn process_all_documents(&self, all_documents: Vec<PathBuf>) -> Result<ProcessingStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_documents));
        let total_documents = all_documents.len();
        let mut stats = ProcessingStats {
            total: total_documents,
            ..Default::default()
        };

        // 分批处理
        for batch_start in (0..total_documents).step_by(self.config.max_concurrent_documents) {
            let batch_end =
                (batch_start + self.config.max_concurrent_documents).min(total_documents);
            let batch_documents = &all_documents[batch_start..batch_end];
            let batch_num = (batch_start / self.config.max_concurrent_documents) + 1;
            let total_batches = (total_documents + self.config.max_concurrent_documents - 1)
                / self.config.max_concurrent_documents;

            log_batch_start(
                batch_num,
                total_batches,
                batch_start + 1,
                batch_end,
                total_documents,
            );

            // 处理本批
            let batch_result = self
                .process_batch(batch_documents, batch_start, semaphore.clone())
                .await?;

            stats.success += batch_result.success;
            stats.failed += batch_result.failed;

            log_batch_complete(batch_num, batch_result.success, batch_documents.len());
        }

        Ok(stats)
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch_documents: &[PathBuf],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
    ) -> Result<BatchResult> {
        let mut batch_handles = Vec::new();

        // 为本批创建并发任务
        for (idx, path) in batch_documents.iter().enumerate() {
            let document_index = batch_start + idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;

            let path_clone = path.clone();
            let catalog_clone = self.catalog.clone();
            let config_clone = self.config.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                match document_processor::process_document(
                    &path_clone,
                    document_index,
                    &catalog_clone,
                    &config_clone,
                )
                .await
                {
                    Ok(ok) => Ok(ok),
                    Err(e) => {
                        error!("[文档 {}] ❌ 处理过程中发生错误: {}", document_index, e);
                        Err(e)
                    }
                }
            });
            batch_handles.push((document_index, handle));
        }

        // 等待本批所有任务完成
        let mut result = BatchResult::default();

        for (document_index, handle) in batch_handles {
            match handle.await {
                Ok(Ok(true)) => {
                    result.success += 1;
                }
                Ok(Ok(false)) | Ok(Err(_)) => {
                    result.failed += 1;
                }
                Err(e) => {
                    error!("[文档 {}] 任务执行失败: {}", document_index, e);
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }

    // ========== 对比模式 ==========

    /// 对比模式：并发跑两份文档的完整流程，然后逐字段 diff
    async fn run_compare_mode(&self, compare_files: &str) -> Result<()> {
        let parts: Vec<&str> = compare_files.split(',').map(|s| s.trim()).collect();
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
            bail!("COMPARE_FILES 需要两个以逗号分隔的文件路径，实际得到: {compare_files}");
        }

        info!("\n{}", "=".repeat(60));
        info!("🔀 对比模式: {} vs {}", parts[0], parts[1]);
        info!("{}", "=".repeat(60));

        let (result1, result2) = futures::future::join(
            self.run_single_file(parts[0], 1),
            self.run_single_file(parts[1], 2),
        )
        .await;

        // 一侧失败不吞掉另一侧的结果：成功侧照常报告，只跳过 diff
        match (result1, result2) {
            (Ok(outcome1), Ok(outcome2)) => {
                log_comparison(&outcome1, &outcome2);
                Ok(())
            }
            (Ok(outcome), Err(e)) => {
                warn!("⚠️ 对比一侧处理失败 ({}): {}", parts[1], e);
                log_one_sided(&outcome);
                Ok(())
            }
            (Err(e), Ok(outcome)) => {
                warn!("⚠️ 对比一侧处理失败 ({}): {}", parts[0], e);
                log_one_sided(&outcome);
                Ok(())
            }
            (Err(e1), Err(e2)) => {
                bail!("对比双方均处理失败: [{}] {e1}; [{}] {e2}", parts[0], parts[1])
            }
        }
    }

    /// 对比模式下跑单份文档的完整多轮流程
    async fn run_single_file(&self, path: &str, index: usize) -> Result<ExtractionOutcome> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("无法读取文档: {path}"))?;

        let name = std::path::Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());

        let mut document = DocumentContext::new(name.clone(), text);
        document.file_path = Some(path.to_string());

        let ctx = DocumentCtx::new(name, index, self.catalog.family.clone());
        let controller = PassController::new(&self.config, &self.catalog);
        controller.run(&document, &ctx).await
    }
}

/// 处理统计
#[derive(Debug, Default)]
struct ProcessingStats {
    success: usize,
    failed: usize,
    total: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    success: usize,
    failed: usize,
}

// ========== 日志辅助函数 ==========

fn log_comparison(outcome1: &ExtractionOutcome, outcome2: &ExtractionOutcome) {
    let records = compare(&outcome1.field_map, &outcome2.field_map);
    let same = records
        .iter()
        .filter(|r| r.status == ComparisonStatus::Same)
        .count();

    info!("\n{}", "─".repeat(60));
    info!("📊 对比结果: {} / {} 字段一致", same, records.len());
    info!("{}", "─".repeat(60));
    for r in &records {
        info!(
            "{:?} | {} | {} | {}",
            r.status,
            r.field,
            r.value1.as_deref().unwrap_or("null"),
            r.value2.as_deref().unwrap_or("null")
        );
    }
}

fn log_one_sided(outcome: &ExtractionOutcome) {
    info!("\n{}", "─".repeat(60));
    info!(
        "📊 仅展示成功一侧 {} 的字段表（跳过 diff），轮次: {}",
        outcome.document_name, outcome.passes_used
    );
    info!("{}", "─".repeat(60));
    for line in field_table_lines(outcome) {
        info!("{}", line);
    }
}

/// 单侧结果的字段表行（目录顺序）
fn field_table_lines(outcome: &ExtractionOutcome) -> Vec<String> {
    outcome
        .field_map
        .final_values()
        .into_iter()
        .map(|(field, value)| format!("{} | {}", field, value.as_deref().unwrap_or("null")))
        .collect()
}

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 多轮文档字段抽取模式");
    info!("📊 最大并发数: {}", config.max_concurrent_documents);
    info!("🔁 单文档最大轮次: {}", config.max_passes);
    info!("🤖 抽取引擎模型: {}", config.llm_model_name);
    info!("{}", "=".repeat(60));
}
