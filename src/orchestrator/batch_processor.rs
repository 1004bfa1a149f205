//! 批量评审处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次运行的全部调度。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、创建远程后端和批次流程
//! 2. **对账**：合并已有输出和检查点，得到待处理集合
//! 3. **并发控制**：使用 Semaphore 限制同时执行的批次数
//! 4. **检查点**：每个批次完成即落盘，进程中断后可以续跑
//! 5. **最终输出**：全部批次结束后合并、排序、写出
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个批次的细节
//! - **并发安全**：检查点是唯一的共享可变资源，由 `CheckpointStore` 串行写入
//! - **向下委托**：委托 batch_runner 处理单个批次

use crate::config::Config;
use crate::error::{AppError, AppResult, FileError};
use crate::infrastructure::CheckpointStore;
use crate::models::{load_items, Batch, BatchPlan, Item};
use crate::orchestrator::batch_runner::{self, BatchReport};
use crate::orchestrator::reconciler::{self, Reconciler};
use crate::services::{AnnotationClient, ChatBackend, OpenAiBackend};
use crate::utils::logging;
use crate::workflow::{BatchCtx, BatchFlow, BatchStatus};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 一次运行的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_items: usize,
    /// 派发前已有结果的条目数
    pub already_resolved: usize,
    pub dispatched_batches: usize,
    pub succeeded_batches: usize,
    pub degraded_batches: usize,
    /// 异常退出（panic）的工作单元数
    pub failed_tasks: usize,
    /// 检查点写盘失败的批次数（结果仍会进入本次输出）
    pub unpersisted_batches: usize,
    /// 实际发出的远程调用次数
    pub remote_calls: usize,
    pub output_rows: usize,
}

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<BatchFlow>,
}

impl App {
    /// 初始化应用（使用 OpenAI 兼容后端）
    ///
    /// 配置错误（缺少凭证等）在这里直接返回，此时还没有派发任何批次。
    pub fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;
        let backend: Arc<dyn ChatBackend> = Arc::new(OpenAiBackend::new(&config));
        Self::with_backend(config, backend)
    }

    /// 使用指定后端初始化
    pub fn with_backend(config: Config, backend: Arc<dyn ChatBackend>) -> AppResult<Self> {
        config.validate_limits()?;

        let client = Arc::new(AnnotationClient::from_config(&config, backend));
        let flow = Arc::new(BatchFlow::from_config(&config, client));

        Ok(Self { config, flow })
    }

    /// 运行应用主逻辑：从 `items_path` 加载条目并评审
    pub async fn run(&self) -> AppResult<RunSummary> {
        logging::log_startup(self.config.max_workers, self.config.batch_size);

        info!("\n📁 正在加载条目列表...");
        let items = load_items(&self.config.items_path).await.map_err(|e| {
            AppError::File(FileError::ReadFailed {
                path: self.config.items_path.display().to_string(),
                source: e.into(),
            })
        })?;

        self.run_items(items).await
    }

    /// 对给定条目执行一次完整运行
    pub async fn run_items(&self, items: Vec<Item>) -> AppResult<RunSummary> {
        let reconciler = Reconciler::new(&self.config.output_path, self.config.resume);
        let store = Arc::new(
            CheckpointStore::open(self.config.checkpoint_path(), self.config.resume).await,
        );

        info!("💾 检查点文件: {}", store.path().display());

        let prior = reconciler.load_prior().await;
        let resolved = reconciler::union(&prior, &store.snapshot().await);
        let already_resolved = items.iter().filter(|i| resolved.contains_key(&i.id)).count();

        let plan = reconciler::plan_pending(&items, &resolved, self.config.batch_size);
        logging::log_plan(
            items.len(),
            already_resolved,
            plan.pending_count(),
            plan.batch_count(),
        );

        let mut summary = RunSummary {
            total_items: items.len(),
            already_resolved,
            ..Default::default()
        };

        let resolved = match plan {
            BatchPlan::NothingToDo => resolved,
            BatchPlan::Batches(batches) => {
                let reports = self.dispatch_batches(batches, store.clone()).await;
                summary.record(&reports);
                reconciler::union(&prior, &store.snapshot().await)
            }
        };

        let rows = reconciler::finalize(&items, &resolved);
        reconciler.write(&rows).await?;
        summary.output_rows = rows.len();

        logging::print_final_stats(
            summary.succeeded_batches,
            summary.degraded_batches,
            summary.dispatched_batches,
            &self.config.output_path.display().to_string(),
        );
        info!(
            "远程调用 {} 次 | 已有结果 {} 个 | 异常任务 {} 个 | 未落盘批次 {} 个",
            summary.remote_calls,
            summary.already_resolved,
            summary.failed_tasks,
            summary.unpersisted_batches
        );

        Ok(summary)
    }

    /// 并发执行所有批次，全部结束后才返回
    ///
    /// 每个批次是一个独立任务；任务内部先写检查点再结束。
    async fn dispatch_batches(
        &self,
        batches: Vec<Batch>,
        store: Arc<CheckpointStore>,
    ) -> Vec<Result<BatchReport, usize>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let total_batches = batches.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(total_batches);

        for batch in batches {
            let batch_index = batch.index;
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                error!("[批次 {}] 信号量已关闭，停止派发", batch_index + 1);
                break;
            };
            let flow = self.flow.clone();
            let store = store.clone();
            let completed = completed.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let ctx = BatchCtx::new(batch.index, total_batches, batch.len());
                let report = batch_runner::process_batch(&flow, &store, &batch, &ctx).await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                logging::log_progress(done, total_batches);
                report
            });
            handles.push((batch_index, handle));
        }

        let (indices, handles): (Vec<usize>, Vec<_>) = handles.into_iter().unzip();
        join_all(handles)
            .await
            .into_iter()
            .zip(indices)
            .map(|(joined, batch_index)| {
                joined.map_err(|e| {
                    error!("[批次 {}] 任务执行失败: {}", batch_index + 1, e);
                    batch_index
                })
            })
            .collect()
    }
}

impl RunSummary {
    fn record(&mut self, reports: &[Result<BatchReport, usize>]) {
        self.dispatched_batches = reports.len();
        for report in reports {
            match report {
                Ok(report) => {
                    self.remote_calls += report.attempts;
                    if !report.persisted {
                        warn!("[批次 {}] 结果未写入检查点", report.batch_index + 1);
                        self.unpersisted_batches += 1;
                    }
                    match report.status {
                        BatchStatus::Succeeded => self.succeeded_batches += 1,
                        BatchStatus::Degraded { .. } => self.degraded_batches += 1,
                    }
                }
                Err(_) => self.failed_tasks += 1,
            }
        }
    }
}
