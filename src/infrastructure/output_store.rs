//! 最终输出文件的读写
//!
//! 输出是一张按分数降序排列的表，每行一个条目，以 JSON 记录数组保存。

use crate::error::{AppError, AppResult};
use crate::infrastructure::atomic_file::write_json_atomic;
use crate::models::{ItemId, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// 输出表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    pub item_id: ItemId,
    #[serde(default)]
    pub title: String,
    pub score: i64,
    pub reason: String,
}

impl OutputRow {
    pub fn verdict(&self) -> Verdict {
        Verdict::new(self.score, self.reason.clone())
    }
}

/// 原子写出最终结果
pub async fn write_output(path: &Path, rows: &[OutputRow]) -> AppResult<()> {
    write_json_atomic(path, rows)
        .await
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
    info!("💾 结果已写入 {} (共 {} 行)", path.display(), rows.len());
    Ok(())
}

/// 读取上一次运行写出的最终结果
///
/// 读取失败或内容损坏时返回空映射。标记为 "processing incomplete" 的行不算已解决。
pub async fn load_prior_output(path: &Path) -> HashMap<ItemId, Verdict> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!("⚠️ 无法读取已有结果 {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    let rows: Vec<OutputRow> = match serde_json::from_slice(&raw) {
        Ok(rows) => rows,
        Err(e) => {
            warn!("⚠️ 已有结果无法解析 {}: {}，忽略", path.display(), e);
            return HashMap::new();
        }
    };

    rows.into_iter()
        .map(|row| (row.item_id.clone(), row.verdict()))
        .filter(|(_, verdict)| !verdict.is_incomplete())
        .collect()
}
