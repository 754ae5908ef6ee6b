//! # Policy Field Extract
//!
//! 一个从保单文档文本中批量抽取结构化字段的 Rust 应用程序。
//! 抽取引擎（LLM）的两类系统性失误在流水线内得到纠正：
//! 返回字段定义而不是字段值、因同义词标签导致字段被静默丢弃。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Clients）
//! - `clients/` - 持有传输资源，只暴露能力
//! - `LlmClient` - 唯一的网络出口，提供 chat() 能力与传输层重试
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单轮的某个环节
//! - `ExtractionService` - 提示词构建与抽取 / 二次提取能力
//! - `SynonymResolver` - 表格行标签 → 规范字段名的对回能力
//! - `parse_table` - 引擎响应的两列表格解析能力
//! - `ValueClassifier` - 值 / 描述 / 未知 三分类能力
//! - `RuleEngine` - 跨字段一致性规则能力（共享单元格）
//! - `compare` - 两份最终字段表的逐字段 diff 能力
//! - `WarnWriter` - 写 warn.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一份文档"的完整多轮处理流程
//! - `DocumentCtx` - 上下文封装（文档名 + 索引 + 族）
//! - `PassController` - 流程编排（extract → parse → classify → rules → merge）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量文档处理器，管理并发与运行模式
//! - `orchestrator/document_processor` - 单个文档处理器，落盘与警告
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::LlmClient;
pub use config::Config;
pub use error::{AppResult, ExtractError, LlmError};
pub use models::{load_catalog, Classification, DocumentContext, ExtractionRecord, FieldCatalog, FieldMap};
pub use orchestrator::{process_document, App};
pub use workflow::{DocumentCtx, ExtractionOutcome, PassController, RunStatus};
