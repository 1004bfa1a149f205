//! 批次处理流程 - 流程层
//!
//! 核心职责：定义"一个批次"的完整处理流程
//!
//! 流程顺序：
//! 1. 构建请求（解析正文，只做一次）
//! 2. 带重试的远程调用
//! 3. 失败兜底：整批填入默认评分，并写入 warn 文件

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::{Batch, ScoreResult, Verdict};
use crate::services::{AnnotationClient, WarnWriter};
use crate::workflow::batch_ctx::BatchCtx;
use crate::workflow::retry::{RetryController, RetryOutcome, RetryPolicy};

/// 批次处理结果状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    /// 拿到了远程评分
    Succeeded,
    /// 整批使用兜底评分
    Degraded { cause: String },
}

/// 一个批次的最终产出，条目数与批次一致
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<ScoreResult>,
    pub status: BatchStatus,
    /// 实际发出的远程调用次数
    pub attempts: usize,
}

/// 批次处理流程
///
/// - 编排 请求构建 → 重试调用 → 兜底
/// - 不持有检查点，不关心并发
pub struct BatchFlow {
    client: Arc<AnnotationClient>,
    retry: RetryController,
    warn_writer: WarnWriter,
}

impl BatchFlow {
    pub fn new(client: Arc<AnnotationClient>, policy: RetryPolicy, warn_writer: WarnWriter) -> Self {
        Self {
            retry: RetryController::new(client.clone(), policy),
            client,
            warn_writer,
        }
    }

    pub fn from_config(config: &Config, client: Arc<AnnotationClient>) -> Self {
        Self::new(
            client,
            RetryPolicy::from_config(config),
            WarnWriter::with_path(&config.warn_file),
        )
    }

    pub async fn run(&self, batch: &Batch, ctx: &BatchCtx) -> BatchOutcome {
        info!("{} 🤖 发送评审请求 (模型: {})", ctx, self.client.model_name());

        let request = self.client.prepare(batch).await;

        let outcome = self.retry.run(batch, &request, ctx).await;
        let attempts = outcome.attempts();

        match outcome {
            RetryOutcome::Succeeded { results, .. } => {
                info!("{} ✓ 评审完成 (尝试 {} 次)", ctx, attempts);
                BatchOutcome {
                    results,
                    status: BatchStatus::Succeeded,
                    attempts,
                }
            }
            RetryOutcome::NoResult { cause, .. } => {
                let label = cause.label();
                warn!("{} ❌ 评审失败，整批使用默认评分: {:?}", ctx, cause);

                if let Err(e) = self.warn_writer.write(batch, &label).await {
                    error!("{} 写入 warn 文件失败: {:#}", ctx, e);
                }

                BatchOutcome {
                    results: default_results(batch),
                    status: BatchStatus::Degraded { cause: label },
                    attempts,
                }
            }
        }
    }
}

/// 整批兜底评分
pub fn default_results(batch: &Batch) -> Vec<ScoreResult> {
    batch
        .items
        .iter()
        .map(|item| ScoreResult::new(item.id.clone(), Verdict::insufficient()))
        .collect()
}
