//! 降级记录服务 - 业务能力层
//!
//! 只负责"把拿到兜底评分的条目追加写入 warn 文件"，不关心流程

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::Batch;

/// 降级记录服务
///
/// 每个降级条目一行：时间、批次、条目 ID、原因、标题。多个工作单元共享同一个实例，
/// 追加写入串行进行，行不会交错。
pub struct WarnWriter {
    warn_file_path: PathBuf,
    lock: Mutex<()>,
}

impl WarnWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            warn_file_path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// 记录一个降级批次
    ///
    /// # 参数
    /// - `batch`: 整批拿到兜底评分的批次
    /// - `cause`: 降级原因（失败分类或"重试耗尽"）
    pub async fn write(&self, batch: &Batch, cause: &str) -> Result<()> {
        debug!(
            "写入降级记录: 批次 {} | {} 个条目 | 原因: {}",
            batch.index + 1,
            batch.len(),
            cause
        );

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut lines = String::new();
        for item in &batch.items {
            lines.push_str(&format!(
                "{} | 批次 {} | 条目 {} | 原因: {} | 标题: {}\n",
                timestamp,
                batch.index + 1,
                item.id,
                cause,
                item.title
            ));
        }

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)
            .await
            .with_context(|| format!("无法打开 warn 文件: {}", self.warn_file_path.display()))?;

        file.write_all(lines.as_bytes())
            .await
            .with_context(|| format!("无法写入 warn 文件: {}", self.warn_file_path.display()))?;
        file.flush().await?;

        Ok(())
    }
}
