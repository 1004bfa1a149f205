//! 批次处理上下文
//!
//! 封装"我正在处理第几批、共几批"这一信息

use std::fmt::Display;

/// 批次处理上下文（仅用于日志显示）
#[derive(Debug, Clone)]
pub struct BatchCtx {
    /// 批次序号（从1开始）
    pub batch_number: usize,

    /// 本次运行的批次总数
    pub total_batches: usize,

    /// 本批条目数
    pub item_count: usize,
}

impl BatchCtx {
    pub fn new(batch_index: usize, total_batches: usize, item_count: usize) -> Self {
        Self {
            batch_number: batch_index + 1,
            total_batches,
            item_count,
        }
    }
}

impl Display for BatchCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[批次 {}/{} 条目数 {}]",
            self.batch_number, self.total_batches, self.item_count
        )
    }
}
