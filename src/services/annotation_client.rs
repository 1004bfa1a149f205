//! 标注客户端 - 业务能力层
//!
//! 只负责"一个批次 → 一次请求 → 与批次等长的评分列表"，不关心重试和并发。
//!
//! ## 位置对齐
//!
//! 返回数组的第 j 个元素对应批次中的第 j 个条目，元素自带的 `id` 字段只用于告警，
//! 不参与映射。返回不足时尾部用兜底评分补齐，多出的元素丢弃。
//! 开启 `strict_alignment` 后，长度不一致直接视为格式错误。

use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::models::item::REASON_MISSING;
use crate::models::{Batch, ScoreResult, Verdict};
use crate::services::chat_backend::ChatBackend;
use crate::services::content_resolver::ContentResolver;
use crate::utils::logging::truncate_text;

/// 内置的评审指令
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"你是机器人与自动驾驶领域的资深审稿人，负责判断论文摘要对"非结构化环境路径规划"课题的参考价值。

评分标准 (1-5 分)：
* 5 分：核心主题是越野、矿区、农田、行星表面等非结构化环境下的路径或运动规划。
* 4 分：主题相关，但侧重感知或控制，或场景为半结构化且方法可迁移。
* 3 分：常规路径规划，场景以城市道路、高速等结构化道路为主。
* 2 分：只涉及自动驾驶，重点在 V2X、交通流预测或纯视觉数据集。
* 1 分：与路径规划或移动机器人无关。

输出要求：
1. 只输出一个 JSON 数组，不要包含 Markdown 标记或任何解释文字。
2. 数组元素与输入文献一一对应、顺序一致，格式为 {"id": 文献序号, "score": 整数, "reason": "20 字以内的要点"}。"#;

/// 一个批次的请求内容，重试时复用
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub user_message: String,
}

/// 标注客户端
pub struct AnnotationClient {
    backend: Arc<dyn ChatBackend>,
    resolver: ContentResolver,
    system_prompt: String,
    timeout: Duration,
    strict_alignment: bool,
}

impl AnnotationClient {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        resolver: ContentResolver,
        system_prompt: impl Into<String>,
        timeout: Duration,
        strict_alignment: bool,
    ) -> Self {
        Self {
            backend,
            resolver,
            system_prompt: system_prompt.into(),
            timeout,
            strict_alignment,
        }
    }

    pub fn from_config(config: &Config, backend: Arc<dyn ChatBackend>) -> Self {
        Self::new(
            backend,
            ContentResolver::new(&config.content_dir),
            config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            config.timeout,
            config.strict_alignment,
        )
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// 构建用户消息：每个条目一个位置标签、标题和正文
    pub async fn prepare(&self, batch: &Batch) -> PreparedRequest {
        let mut user_message = format!(
            "Assess the following {} papers and return a JSON array:\n\n",
            batch.len()
        );
        for (position, item) in batch.items.iter().enumerate() {
            let body = self.resolver.resolve(item).await;
            user_message.push_str(&format!(
                "[Item {}]\nTitle: {}\nAbstract: {}\n\n",
                position + 1,
                item.title,
                body
            ));
        }
        PreparedRequest { user_message }
    }

    /// 发送一次请求并按位置映射回批次条目
    pub async fn send(
        &self,
        batch: &Batch,
        request: &PreparedRequest,
    ) -> Result<Vec<ScoreResult>, LlmError> {
        let call = self
            .backend
            .complete(&self.system_prompt, &request.user_message);

        let raw = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(LlmError::Timeout {
                    limit: self.timeout,
                })
            }
        };

        debug!("[批次 {}] 原始响应: {}", batch.index + 1, truncate_text(&raw, 200));
        let elements = parse_response(&raw)?;
        align_results(batch, elements, self.strict_alignment)
    }

    /// `prepare` + `send`
    pub async fn annotate(&self, batch: &Batch) -> Result<Vec<ScoreResult>, LlmError> {
        let request = self.prepare(batch).await;
        self.send(batch, &request).await
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("valid fence regex"))
}

/// 去掉 Markdown 代码块标记
pub fn strip_code_fences(raw: &str) -> String {
    fence_regex().replace_all(raw, "").trim().to_string()
}

/// 解析为 JSON 数组；先去代码块，仍失败时截取首个 `[` 到末个 `]` 再试
pub fn parse_response(raw: &str) -> Result<Vec<JsonValue>, LlmError> {
    let cleaned = strip_code_fences(raw);

    let value = match serde_json::from_str::<JsonValue>(&cleaned) {
        Ok(value) => value,
        Err(first_err) => {
            let sliced = match (cleaned.find('['), cleaned.rfind(']')) {
                (Some(start), Some(end)) if start < end => &cleaned[start..=end],
                _ => return Err(LlmError::malformed(format!("不是合法 JSON: {}", first_err))),
            };
            serde_json::from_str::<JsonValue>(sliced)
                .map_err(|e| LlmError::malformed(format!("不是合法 JSON: {}", e)))?
        }
    };

    match value {
        JsonValue::Array(elements) => Ok(elements),
        other => Err(LlmError::malformed(format!(
            "返回值不是数组: {}",
            type_name(&other)
        ))),
    }
}

/// 按位置把返回元素映射到批次条目
pub fn align_results(
    batch: &Batch,
    elements: Vec<JsonValue>,
    strict: bool,
) -> Result<Vec<ScoreResult>, LlmError> {
    let expected = batch.len();
    let received = elements.len();

    if received != expected {
        if strict {
            return Err(LlmError::malformed(format!(
                "返回 {} 条结果，批次有 {} 个条目",
                received, expected
            )));
        }
        warn!(
            "[批次 {}] 返回 {} 条结果，批次有 {} 个条目，按位置对齐",
            batch.index + 1,
            received,
            expected
        );
    }

    let mut elements = elements.into_iter();
    let results = batch
        .items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let verdict = match elements.next() {
                Some(element) => {
                    check_echoed_id(batch.index, position, &element);
                    element_verdict(&element)
                }
                None => Verdict::insufficient(),
            };
            ScoreResult::new(item.id.clone(), verdict)
        })
        .collect();

    Ok(results)
}

fn element_verdict(element: &JsonValue) -> Verdict {
    let JsonValue::Object(fields) = element else {
        return Verdict::insufficient();
    };

    let score = fields.get("score").map(score_of).unwrap_or(0);
    let reason = fields
        .get("reason")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(REASON_MISSING)
        .to_string();

    Verdict::new(score, reason)
}

fn score_of(value: &JsonValue) -> i64 {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// 返回元素自带的序号和位置不一致时只告警
fn check_echoed_id(batch_index: usize, position: usize, element: &JsonValue) {
    let Some(echoed) = element.get("id").and_then(JsonValue::as_u64) else {
        return;
    };
    if echoed != (position + 1) as u64 {
        warn!(
            "[批次 {}] 第 {} 个结果自带序号 {}，仍按位置对齐",
            batch_index + 1,
            position + 1,
            echoed
        );
    } else {
        debug!("[批次 {}] 第 {} 个结果序号一致", batch_index + 1, position + 1);
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
