//! 结果对账 - 编排层
//!
//! ## 职责
//!
//! 1. **合并已知结果**：上次的最终输出 ∪ 检查点，检查点优先（它更新）
//! 2. **确定待处理集合**：全部条目 − 已知结果的键
//! 3. **生成最终输出**：每个条目一行，缺失的填 "processing incomplete"，
//!    按分数降序，同分保持输入顺序

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::error::AppResult;
use crate::infrastructure::{load_prior_output, write_output, CheckpointMap, OutputRow};
use crate::models::{BatchPlan, Item, ItemId, Verdict};

/// 条目 ID → 已知的最佳评分
pub type ResolvedMap = HashMap<ItemId, Verdict>;

pub struct Reconciler {
    output_path: PathBuf,
    resume: bool,
}

impl Reconciler {
    pub fn new(output_path: impl Into<PathBuf>, resume: bool) -> Self {
        Self {
            output_path: output_path.into(),
            resume,
        }
    }

    /// 上一次运行的最终输出；`resume = false` 时视为空
    pub async fn load_prior(&self) -> ResolvedMap {
        if !self.resume {
            return ResolvedMap::new();
        }
        load_prior_output(&self.output_path).await
    }

    /// 写出最终输出
    pub async fn write(&self, rows: &[OutputRow]) -> AppResult<()> {
        write_output(&self.output_path, rows).await
    }
}

/// 合并，检查点覆盖旧输出中的同一 ID
pub fn union(prior: &ResolvedMap, checkpoint: &CheckpointMap) -> ResolvedMap {
    let mut resolved = prior.clone();
    for (id, verdict) in checkpoint {
        resolved.insert(id.clone(), verdict.clone());
    }
    resolved
}

/// 待处理批次划分
pub fn plan_pending(items: &[Item], resolved: &ResolvedMap, batch_size: usize) -> BatchPlan {
    let done: HashSet<ItemId> = resolved.keys().cloned().collect();
    BatchPlan::build(items, &done, batch_size)
}

/// 每个条目一行，分数降序，同分保持输入顺序
pub fn finalize(items: &[Item], resolved: &ResolvedMap) -> Vec<OutputRow> {
    let mut rows: Vec<OutputRow> = items
        .iter()
        .map(|item| {
            let verdict = resolved
                .get(&item.id)
                .cloned()
                .unwrap_or_else(Verdict::incomplete);
            OutputRow {
                item_id: item.id.clone(),
                title: item.title.clone(),
                score: verdict.score,
                reason: verdict.reason,
            }
        })
        .collect();

    // sort_by 是稳定排序
    rows.sort_by(|a, b| b.score.cmp(&a.score));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::REASON_INCOMPLETE;

    fn items(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item::new(i, format!("Paper {}", i))).collect()
    }

    fn id(i: usize) -> ItemId {
        ItemId::from(i)
    }

    #[test]
    fn checkpoint_wins_over_prior_output() {
        let prior: ResolvedMap = [(id(0), Verdict::new(2, "old")), (id(1), Verdict::new(3, "kept"))]
            .into_iter()
            .collect();
        let checkpoint: CheckpointMap = [(id(0), Verdict::new(5, "fresh"))].into_iter().collect();

        let resolved = union(&prior, &checkpoint);
        assert_eq!(resolved[&id(0)], Verdict::new(5, "fresh"));
        assert_eq!(resolved[&id(1)], Verdict::new(3, "kept"));
    }

    #[test]
    fn pending_is_all_minus_resolved() {
        let resolved: ResolvedMap = (0..5).map(|i| (id(i), Verdict::new(1, "x"))).collect();
        let plan = plan_pending(&items(12), &resolved, 5);
        let BatchPlan::Batches(batches) = plan else {
            panic!("expected batches");
        };
        let ids: Vec<ItemId> = batches.iter().flat_map(|b| b.ids()).collect();
        assert_eq!(ids, (5..12).map(id).collect::<Vec<_>>());
    }

    #[test]
    fn finalize_sorts_desc_and_keeps_input_order_on_ties() {
        let resolved: ResolvedMap = [
            (id(0), Verdict::new(3, "a")),
            (id(1), Verdict::new(5, "b")),
            (id(2), Verdict::new(3, "c")),
        ]
        .into_iter()
        .collect();

        let rows = finalize(&items(4), &resolved);
        let order: Vec<&str> = rows.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(order, vec!["1", "0", "2", "3"]);
        assert_eq!(rows[3].reason, REASON_INCOMPLETE);
        assert_eq!(rows[3].score, 0);
    }

    #[test]
    fn finalize_has_one_row_per_item() {
        let rows = finalize(&items(7), &ResolvedMap::new());
        assert_eq!(rows.len(), 7);
    }
}
