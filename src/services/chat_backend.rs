//! 远程评分服务的调用接口
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（DeepSeek、Gemini、Doubao 等）
//!
//! `ChatBackend` 是引擎与远程服务之间唯一的接缝，测试中用脚本化的实现替换。

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;

/// 一次"系统指令 + 用户内容 → 文本"的远程调用
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, system_message: &str, user_message: &str) -> Result<String, LlmError>;

    /// 用于日志的模型名
    fn model_name(&self) -> &str;
}

/// 基于 OpenAI 兼容接口的实现
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiBackend {
    /// 创建新的后端（凭证检查由 `Config::validate` 负责）
    ///
    /// SDK 自带的限流重试被关闭：429 必须原样返回，由 `RetryController` 按配置退避。
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config).with_backoff(single_attempt()),
            model_name: config.llm_model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    #[allow(deprecated)]
    async fn complete(&self, system_message: &str, user_message: &str) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()
            .map_err(build_error)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(build_error)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(build_error)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            classify_openai_error(e)
        })?;

        debug!("LLM API 调用成功");

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LlmError::malformed("LLM 返回内容为空"))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// 不重试的退避策略：任何退避间隔都会超过 0 的时限
fn single_attempt() -> ExponentialBackoff {
    ExponentialBackoff {
        max_elapsed_time: Some(Duration::ZERO),
        ..Default::default()
    }
}

fn build_error(err: OpenAIError) -> LlmError {
    LlmError::transport(format!("请求构建失败: {}", err))
}

/// 把 SDK 错误映射到引擎的失败分类
fn classify_openai_error(err: OpenAIError) -> LlmError {
    let text = err.to_string();
    if looks_rate_limited(&text) {
        return LlmError::rate_limited(text);
    }
    match err {
        OpenAIError::JSONDeserialize(..) => LlmError::malformed(text),
        _ => LlmError::transport(text),
    }
}

/// 服务端是否在提示配额 / 频率耗尽
pub fn looks_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("quota")
}
