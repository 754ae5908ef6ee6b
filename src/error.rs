//! 错误类型定义
//!
//! 子系统错误使用 `thiserror` 定义；流程层与编排层统一用
//! `anyhow::Result` 携带上下文向上传播。
//!
//! 传播策略：
//! - 单个字段失败不会中止整个文档
//! - 单个文档失败不会中止批次或对比对的另一侧
//! - 用户可见的失败只有一种："零可解析字段"；部分结果是正常产出

use thiserror::Error;

/// 抽取引擎（LLM）错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 传输层失败（网络/非 2xx）——客户端内部会带退避重试
    #[error("LLM API 调用失败 (模型: {model}): {source}")]
    RequestFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回结果为空（逻辑失败，不重试）
    #[error("LLM 返回结果为空 (模型: {model})")]
    EmptyResponse { model: String },
    /// 返回内容为空（逻辑失败，不重试）
    #[error("LLM 返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

impl LlmError {
    /// 是否为可重试的传输层失败
    pub fn is_transport(&self) -> bool {
        matches!(self, LlmError::RequestFailed { .. })
    }
}

/// 应用级错误
#[derive(Debug, Error)]
pub enum ExtractError {
    /// LLM 错误
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// 文档未能解析出任何字段（唯一的真正失败）
    #[error("文档未产出任何可解析字段: {document}")]
    NoFieldsResolved { document: String },
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, ExtractError>;
