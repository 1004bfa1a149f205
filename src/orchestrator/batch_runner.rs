//! 单个批次处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责一个工作单元的全部动作：
//!
//! 1. **流程调度**：委托 `BatchFlow` 完成请求、重试和兜底
//! 2. **检查点落盘**：结果（真实或兜底）先写入检查点，工作单元才算结束
//! 3. **统计输出**：返回本批状态和远程调用次数

use crate::infrastructure::CheckpointStore;
use crate::models::Batch;
use crate::workflow::{BatchCtx, BatchFlow, BatchStatus};
use tracing::{error, info};

/// 单个批次的处理报告
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_index: usize,
    pub status: BatchStatus,
    pub attempts: usize,
    /// 检查点是否写盘成功
    pub persisted: bool,
}

/// 处理单个批次
///
/// # 参数
/// - `flow`: 批次处理流程（多个工作单元共享）
/// - `store`: 检查点存储（唯一的共享可变资源）
/// - `batch`: 本批条目
/// - `ctx`: 日志上下文
pub async fn process_batch(
    flow: &BatchFlow,
    store: &CheckpointStore,
    batch: &Batch,
    ctx: &BatchCtx,
) -> BatchReport {
    let outcome = flow.run(batch, ctx).await;

    let persisted = match store.merge_and_save(&outcome.results).await {
        Ok(total) => {
            info!("{} 💾 检查点已更新 (共 {} 条)", ctx, total);
            true
        }
        Err(e) => {
            error!("{} 检查点写盘失败，结果保留在内存中: {}", ctx, e);
            false
        }
    };

    BatchReport {
        batch_index: batch.index,
        status: outcome.status,
        attempts: outcome.attempts,
        persisted,
    }
}
