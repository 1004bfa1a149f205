//! 重试控制
//!
//! 每个批次的状态机：
//!
//! ```text
//! Pending → Attempting(k) ─┬─ Succeeded
//!                          ├─ RateLimitedRetry(k+1) → Attempting(k+1)
//!                          └─ FailedTerminal
//! ```
//!
//! 只有 `RateLimited` 会进入重试；第 k 次重试前等待 `base_delay * k`。

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::models::{Batch, ScoreResult};
use crate::services::{AnnotationClient, PreparedRequest};
use crate::workflow::batch_ctx::BatchCtx;

/// 重试参数，构造时显式传入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数上限（含第一次）
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_retries, config.base_delay)
    }

    /// 第 `retry` 次重试（从 1 开始）之前的等待时间
    pub fn delay_before_retry(&self, retry: usize) -> Duration {
        self.base_delay.saturating_mul(retry as u32)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// 单个批次的尝试状态
#[derive(Debug)]
pub enum AttemptState {
    Pending,
    Attempting(usize),
    RateLimitedRetry(usize),
    Succeeded(Vec<ScoreResult>),
    FailedTerminal(TerminalCause),
}

/// 终止原因
#[derive(Debug)]
pub enum TerminalCause {
    /// 非限流失败，不重试
    Failed(LlmError),
    /// 限流且重试耗尽
    RetriesExhausted { attempts: usize, last: LlmError },
}

impl TerminalCause {
    /// 用于日志和 warn 文件的描述
    pub fn label(&self) -> String {
        match self {
            TerminalCause::Failed(err) => err.kind().to_string(),
            TerminalCause::RetriesExhausted { attempts, .. } => {
                format!("rate_limited (重试 {} 次后放弃)", attempts)
            }
        }
    }
}

/// 重试结束后的结果：要么拿到评分，要么"没有结果"
#[derive(Debug)]
pub enum RetryOutcome {
    Succeeded {
        results: Vec<ScoreResult>,
        attempts: usize,
    },
    NoResult {
        cause: TerminalCause,
        attempts: usize,
    },
}

impl RetryOutcome {
    pub fn attempts(&self) -> usize {
        match self {
            RetryOutcome::Succeeded { attempts, .. } | RetryOutcome::NoResult { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// 重试控制器
///
/// 包装一次标注客户端调用；失败不会以错误的形式返回，而是 `RetryOutcome::NoResult`。
pub struct RetryController {
    client: Arc<AnnotationClient>,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(client: Arc<AnnotationClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub async fn run(
        &self,
        batch: &Batch,
        request: &PreparedRequest,
        ctx: &BatchCtx,
    ) -> RetryOutcome {
        let mut state = AttemptState::Pending;
        let mut attempts = 0;

        loop {
            state = match state {
                AttemptState::Pending => AttemptState::Attempting(1),

                AttemptState::Attempting(k) => {
                    attempts = k;
                    match self.client.send(batch, request).await {
                        Ok(results) => AttemptState::Succeeded(results),
                        Err(err) if err.is_retryable() && k < self.policy.max_retries => {
                            warn!("{} ⏳ 第 {} 次尝试被限流: {}", ctx, k, err);
                            AttemptState::RateLimitedRetry(k + 1)
                        }
                        Err(err) if err.is_retryable() => {
                            AttemptState::FailedTerminal(TerminalCause::RetriesExhausted {
                                attempts: k,
                                last: err,
                            })
                        }
                        Err(err) => AttemptState::FailedTerminal(TerminalCause::Failed(err)),
                    }
                }

                AttemptState::RateLimitedRetry(next) => {
                    let delay = self.policy.delay_before_retry(next - 1);
                    info!(
                        "{} 等待 {:.1} 秒后进行第 {} 次尝试",
                        ctx,
                        delay.as_secs_f64(),
                        next
                    );
                    tokio::time::sleep(delay).await;
                    AttemptState::Attempting(next)
                }

                AttemptState::Succeeded(results) => {
                    return RetryOutcome::Succeeded { results, attempts };
                }

                AttemptState::FailedTerminal(cause) => {
                    return RetryOutcome::NoResult { cause, attempts };
                }
            };
        }
    }
}
