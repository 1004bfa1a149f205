//! 检查点存储 - 基础设施层
//!
//! 持有唯一的检查点映射和它的落盘文件，只暴露"读取"与"合并并保存"两个能力。

use crate::error::{AppError, AppResult};
use crate::infrastructure::atomic_file::write_json_atomic;
use crate::models::{ItemId, ScoreResult, Verdict};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// 条目 ID → 评分
pub type CheckpointMap = BTreeMap<ItemId, Verdict>;

/// 检查点存储
///
/// 职责：
/// - 单一所有者：工作单元只能通过 `merge_and_save` 写入，不直接碰文件
/// - 合并与落盘在同一把锁内完成，并发完成的批次不会互相覆盖
/// - 每次保存都是完整映射的原子替换
pub struct CheckpointStore {
    path: PathBuf,
    entries: Mutex<CheckpointMap>,
}

impl CheckpointStore {
    /// 打开检查点；`resume = false` 时忽略磁盘上的旧内容
    pub async fn open(path: impl Into<PathBuf>, resume: bool) -> Self {
        let path = path.into();
        let entries = if resume {
            Self::load(&path).await
        } else {
            CheckpointMap::new()
        };
        debug!("检查点已打开: {} ({} 条)", path.display(), entries.len());
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// 读取磁盘上的检查点
    ///
    /// 文件不存在、无法读取或内容损坏时返回空映射，损坏不会中止运行。
    pub async fn load(path: &Path) -> CheckpointMap {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CheckpointMap::new(),
            Err(e) => {
                warn!("⚠️ 无法读取检查点 {}: {}，按空检查点处理", path.display(), e);
                return CheckpointMap::new();
            }
        };

        match serde_json::from_slice::<CheckpointMap>(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!("⚠️ 检查点已损坏 {}: {}，按空检查点处理", path.display(), e);
                CheckpointMap::new()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 当前映射的副本
    pub async fn snapshot(&self) -> CheckpointMap {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// 合并新结果并把完整映射原子写盘
    ///
    /// 已有的真实评分不会被兜底评分覆盖。写盘失败时内存中的合并仍然保留，
    /// 下一次保存会把它们一起写出。
    pub async fn merge_and_save(&self, results: &[ScoreResult]) -> AppResult<usize> {
        let mut entries = self.entries.lock().await;

        for result in results {
            let incoming = result.verdict();
            match entries.get(&result.item_id) {
                Some(existing) if is_degraded(&incoming) && !is_degraded(existing) => {
                    debug!("保留条目 {} 的已有评分，忽略兜底结果", result.item_id);
                }
                _ => {
                    entries.insert(result.item_id.clone(), incoming);
                }
            }
        }

        write_json_atomic(&self.path, &*entries)
            .await
            .map_err(|e| AppError::file_write_failed(self.path.display().to_string(), e))?;

        Ok(entries.len())
    }
}

fn is_degraded(verdict: &Verdict) -> bool {
    verdict.score == 0
        && (verdict.reason == crate::models::item::REASON_INSUFFICIENT || verdict.is_incomplete())
}
