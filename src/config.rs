//! 程序配置
//!
//! 加载顺序：内置默认值 → TOML 配置文件（可选）→ 环境变量（含 `.env`）。

use crate::error::{AppError, AppResult, ConfigError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "annotator.toml";

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 每次请求包含的条目数
    pub batch_size: usize,
    /// 并发工作单元数量
    pub max_workers: usize,
    /// 单个批次的最大尝试次数
    pub max_retries: usize,
    /// 限流退避的基础等待时间
    pub base_delay: Duration,
    /// 单次远程调用时限
    pub timeout: Duration,
    /// 是否复用已有输出和检查点
    pub resume: bool,
    /// 响应长度与批次不一致时直接判为格式错误
    pub strict_alignment: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 文件路径 ---
    pub items_path: PathBuf,
    pub content_dir: PathBuf,
    pub output_path: PathBuf,
    /// 为空时使用 `<output_path>.ckpt.json`
    pub checkpoint_path: Option<PathBuf>,
    pub warn_file: PathBuf,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 为空时使用内置提示词
    pub system_prompt: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_workers: 5,
            max_retries: 3,
            base_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
            resume: true,
            strict_alignment: false,
            verbose_logging: false,
            items_path: PathBuf::from("output/items.json"),
            content_dir: PathBuf::from("output/abstracts"),
            output_path: PathBuf::from("output/analysis.json"),
            checkpoint_path: None,
            warn_file: PathBuf::from("warn.txt"),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.deepseek.com".to_string(),
            llm_model_name: "deepseek-chat".to_string(),
            temperature: 0.1,
            max_tokens: 2048,
            system_prompt: None,
        }
    }
}

/// TOML 配置文件中允许出现的字段，全部可选
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    batch_size: Option<usize>,
    max_workers: Option<usize>,
    max_retries: Option<usize>,
    base_delay_secs: Option<f64>,
    timeout_secs: Option<f64>,
    resume: Option<bool>,
    strict_alignment: Option<bool>,
    verbose_logging: Option<bool>,
    items_path: Option<PathBuf>,
    content_dir: Option<PathBuf>,
    output_path: Option<PathBuf>,
    checkpoint_path: Option<PathBuf>,
    warn_file: Option<PathBuf>,
    llm_api_key: Option<String>,
    llm_api_base_url: Option<String>,
    llm_model_name: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
    system_prompt_file: Option<PathBuf>,
}

impl Config {
    /// 按 默认值 → 配置文件 → 环境变量 的顺序加载
    pub fn load() -> AppResult<Self> {
        // .env 不存在不是错误
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        let explicit = std::env::var("ANNOTATOR_CONFIG").ok();
        let file_path = explicit
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if explicit.is_some() || file_path.exists() {
            config.apply_file(&file_path)?;
        }

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// 检查点文件路径
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_path.clone().unwrap_or_else(|| {
            let mut raw = self.output_path.clone().into_os_string();
            raw.push(".ckpt.json");
            PathBuf::from(raw)
        })
    }

    /// 派发前的配置检查，失败即终止运行
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredentials {
                var_name: "LLM_API_KEY".to_string(),
            });
        }
        self.validate_limits()
    }

    /// 只检查数值参数（注入后端时不需要凭证）
    pub fn validate_limits(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("batch_size", self.batch_size),
            ("max_workers", self.max_workers),
            ("max_retries", self.max_retries),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    expected: "必须大于 0".to_string(),
                });
            }
        }
        Ok(())
    }

    fn apply_file(&mut self, path: &Path) -> AppResult<()> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        self.apply_toml(&content, path)
    }

    fn apply_toml(&mut self, content: &str, path: &Path) -> AppResult<()> {
        let file: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::FileParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;

        if let Some(v) = file.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = file.max_workers {
            self.max_workers = v;
        }
        if let Some(v) = file.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = file.base_delay_secs {
            self.base_delay = secs("base_delay_secs", v)?;
        }
        if let Some(v) = file.timeout_secs {
            self.timeout = secs("timeout_secs", v)?;
        }
        if let Some(v) = file.resume {
            self.resume = v;
        }
        if let Some(v) = file.strict_alignment {
            self.strict_alignment = v;
        }
        if let Some(v) = file.verbose_logging {
            self.verbose_logging = v;
        }
        if let Some(v) = file.items_path {
            self.items_path = v;
        }
        if let Some(v) = file.content_dir {
            self.content_dir = v;
        }
        if let Some(v) = file.output_path {
            self.output_path = v;
        }
        if file.checkpoint_path.is_some() {
            self.checkpoint_path = file.checkpoint_path;
        }
        if let Some(v) = file.warn_file {
            self.warn_file = v;
        }
        if let Some(v) = file.llm_api_key {
            self.llm_api_key = v;
        }
        if let Some(v) = file.llm_api_base_url {
            self.llm_api_base_url = v;
        }
        if let Some(v) = file.llm_model_name {
            self.llm_model_name = v;
        }
        if let Some(v) = file.temperature {
            self.temperature = v;
        }
        if let Some(v) = file.max_tokens {
            self.max_tokens = v;
        }
        if let Some(prompt_path) = file.system_prompt_file {
            let prompt = std::fs::read_to_string(&prompt_path)
                .map_err(|e| AppError::file_read_failed(prompt_path.display().to_string(), e))?;
            self.system_prompt = Some(prompt);
        }
        if file.system_prompt.is_some() {
            self.system_prompt = file.system_prompt;
        }
        Ok(())
    }

    /// 环境变量覆盖；`lookup` 便于测试注入
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<()> {
        if let Some(v) = parse_var(&lookup, "BATCH_SIZE", "usize")? {
            self.batch_size = v;
        }
        if let Some(v) = parse_var(&lookup, "MAX_WORKERS", "usize")? {
            self.max_workers = v;
        }
        if let Some(v) = parse_var(&lookup, "MAX_RETRIES", "usize")? {
            self.max_retries = v;
        }
        if let Some(v) = parse_var::<f64, _>(&lookup, "BASE_DELAY_SECS", "f64")? {
            self.base_delay = secs("BASE_DELAY_SECS", v)?;
        }
        if let Some(v) = parse_var::<f64, _>(&lookup, "TIMEOUT_SECS", "f64")? {
            self.timeout = secs("TIMEOUT_SECS", v)?;
        }
        if let Some(v) = parse_var(&lookup, "RESUME", "bool")? {
            self.resume = v;
        }
        if let Some(v) = parse_var(&lookup, "STRICT_ALIGNMENT", "bool")? {
            self.strict_alignment = v;
        }
        if let Some(v) = parse_var(&lookup, "VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        if let Some(v) = parse_var(&lookup, "TEMPERATURE", "f32")? {
            self.temperature = v;
        }
        if let Some(v) = parse_var(&lookup, "MAX_TOKENS", "u32")? {
            self.max_tokens = v;
        }
        if let Some(v) = lookup("ITEMS_PATH") {
            self.items_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CONTENT_DIR") {
            self.content_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("OUTPUT_PATH") {
            self.output_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHECKPOINT_PATH") {
            self.checkpoint_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("WARN_FILE") {
            self.warn_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("LLM_API_KEY") {
            self.llm_api_key = v;
        }
        if let Some(v) = lookup("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Some(v) = lookup("LLM_MODEL_NAME") {
            self.llm_model_name = v;
        }
        if let Some(v) = lookup("SYSTEM_PROMPT") {
            self.system_prompt = Some(v);
        }
        Ok(())
    }
}

fn parse_var<T, F>(
    lookup: &F,
    var_name: &str,
    expected_type: &str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var_name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value: raw,
                expected_type: expected_type.to_string(),
            }),
    }
}

fn secs(key: &str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "非负秒数".to_string(),
        });
    }
    Ok(Duration::from_secs_f64(value))
}
