//! # Relevance Annotator
//!
//! 并发批量调用 LLM 为条目打相关性分数，支持中断后续跑
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有文件资源，只暴露能力
//! - `CheckpointStore` - 检查点的唯一持有者，串行合并写盘
//! - `output_store` - 最终结果的读写
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个批次
//! - `AnnotationClient` - 组装提示词、调用模型、解析并对齐结果
//! - `ContentResolver` - 读取条目摘要
//! - `WarnWriter` - 写 warn.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个批次"的完整处理流程
//! - `BatchCtx` - 上下文封装（批次序号 + 条目数）
//! - `RetryController` - 频率限制时按线性退避重试
//! - `BatchFlow` - 流程编排（请求 → 重试 → 兜底 → warn）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 并发派发批次，生成最终输出
//! - `orchestrator/batch_runner` - 单个批次处理器，结果写入检查点
//! - `orchestrator/reconciler` - 合并已知结果，计算待处理集合
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, LlmError};
pub use infrastructure::{CheckpointStore, OutputRow};
pub use models::{Batch, Item, ItemId, ScoreResult, Verdict};
pub use orchestrator::{App, RunSummary};
pub use services::{AnnotationClient, ChatBackend, OpenAiBackend};
pub use workflow::{BatchCtx, BatchFlow, BatchStatus};
