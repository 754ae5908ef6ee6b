//! LLM API 客户端 - 基础设施层
//!
//! 封装所有与抽取引擎相关的传输细节，只暴露"发消息拿文本"能力
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）
//!
//! ## 重试策略
//! 仅传输层失败（网络/非 2xx）重试，固定次数 + 短退避；
//! 逻辑失败（空响应/空内容）立即返回，由上层决定该字段如何收场

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;

/// LLM 客户端
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    retry_attempts: usize,
    retry_backoff_ms: u64,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            retry_attempts: config.llm_retry_attempts.max(1),
            retry_backoff_ms: config.llm_retry_backoff_ms,
        }
    }

    /// 发送聊天请求
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（去除首尾空白）
    pub async fn chat(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        // 构建消息列表
        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| self.request_failed(e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| self.request_failed(e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.0)
            .max_tokens(2048u32)
            .build()
            .map_err(|e| self.request_failed(e))?;

        // 重试逻辑：只针对传输层失败
        let mut last_err = None;
        for attempt in 0..self.retry_attempts {
            if attempt > 0 {
                let backoff = Duration::from_millis(self.retry_backoff_ms * attempt as u64);
                warn!(
                    "LLM API 调用失败 (尝试 {}/{}), 等待 {:?} 后重试...",
                    attempt,
                    self.retry_attempts,
                    backoff
                );
                sleep(backoff).await;
            }

            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    debug!("LLM API 调用成功");

                    let content = response
                        .choices
                        .first()
                        .and_then(|choice| choice.message.content.clone())
                        .ok_or_else(|| LlmError::EmptyContent {
                            model: self.model_name.clone(),
                        })?;

                    return Ok(content.trim().to_string());
                }
                Err(e) => {
                    last_err = Some(self.request_failed(e));
                }
            }
        }

        // 超过最大重试次数
        warn!("LLM API 调用失败，已重试 {} 次", self.retry_attempts);
        Err(last_err.unwrap_or(LlmError::EmptyResponse {
            model: self.model_name.clone(),
        }))
    }

    fn request_failed(&self, source: impl std::error::Error + Send + Sync + 'static) -> LlmError {
        LlmError::RequestFailed {
            model: self.model_name.clone(),
            source: Box::new(source),
        }
    }
}
