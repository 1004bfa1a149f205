//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一次运行的整体调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量评审处理器
//! - 管理应用生命周期（初始化、运行）
//! - 控制并发数量（Semaphore）
//! - 等待全部批次结束后生成最终输出
//! - 输出全局统计信息
//!
//! ### `batch_runner` - 单个批次处理器
//! - 调用 BatchFlow 处理一个批次
//! - 把结果合并写入检查点
//!
//! ### `reconciler` - 结果对账
//! - 合并上次输出与检查点
//! - 计算待处理集合
//! - 排序并写出最终结果
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Batch>)
//!     ↓
//! batch_runner (处理单个 Batch + 检查点)
//!     ↓
//! workflow::BatchFlow (请求 → 重试 → 兜底)
//!     ↓
//! services (能力层：annotation / warn)
//!     ↓
//! infrastructure (基础设施：检查点 / 输出文件)
//! ```

pub mod batch_processor;
pub mod batch_runner;
pub mod reconciler;

// 重新导出主要类型
pub use batch_processor::{App, RunSummary};
pub use batch_runner::{process_batch, BatchReport};
pub use reconciler::{Reconciler, ResolvedMap};
