use std::time::Duration;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（在任何批次派发之前发现）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 缺少 API 凭证
    #[error("缺少 API Key，请设置环境变量 {var_name} 或在配置文件中填写 llm_api_key")]
    MissingCredentials { var_name: String },
    /// 数值参数非法
    #[error("配置项 {key} 的值 {value} 非法: {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    FileParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 单次远程评分调用的失败分类
///
/// 只有 `RateLimited` 会触发重试，其余三类对当前尝试都是终结性的。
#[derive(Debug, Error)]
pub enum LlmError {
    /// 服务端提示配额 / 频率耗尽
    #[error("请求频率限制: {message}")]
    RateLimited { message: String },
    /// 调用超过配置的时限
    #[error("调用超时 (超过 {}秒)", .limit.as_secs())]
    Timeout { limit: Duration },
    /// 网络 / 连接失败
    #[error("传输失败: {message}")]
    Transport { message: String },
    /// 返回内容不是 JSON 或形状不对
    #[error("响应格式错误: {reason}")]
    MalformedResponse { reason: String },
}

impl LlmError {
    /// 是否允许重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }

    /// 用于日志和 warn 文件的简短分类名
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::RateLimited { .. } => "rate_limited",
            LlmError::Timeout { .. } => "timeout",
            LlmError::Transport { .. } => "transport",
            LlmError::MalformedResponse { .. } => "malformed_response",
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Other(format!("{:#}", err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

impl LlmError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        LlmError::MalformedResponse {
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        LlmError::Transport {
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        LlmError::RateLimited {
            message: message.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
