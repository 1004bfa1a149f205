//! 待处理集合与批次划分

use super::item::{Item, ItemId};
use std::collections::HashSet;

/// 一次远程请求携带的条目组
///
/// 非空，条目顺序与原始输入一致；`index` 是批次在本次运行中的序号（从 0 开始）。
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    pub items: Vec<Item>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}

/// 划分结果
#[derive(Debug)]
pub enum BatchPlan {
    /// 没有待处理条目，不需要任何远程调用
    NothingToDo,
    Batches(Vec<Batch>),
}

impl BatchPlan {
    /// 从全部条目中剔除已解决的 ID，再按 `batch_size` 顺序切片
    ///
    /// `batch_size` 为 0 时按 1 处理（配置校验会先拦下这种情况）。
    pub fn build(items: &[Item], resolved: &HashSet<ItemId>, batch_size: usize) -> Self {
        let pending = pending_items(items, resolved);
        partition(pending, batch_size)
    }

    pub fn batch_count(&self) -> usize {
        match self {
            BatchPlan::NothingToDo => 0,
            BatchPlan::Batches(batches) => batches.len(),
        }
    }

    pub fn pending_count(&self) -> usize {
        match self {
            BatchPlan::NothingToDo => 0,
            BatchPlan::Batches(batches) => batches.iter().map(Batch::len).sum(),
        }
    }
}

/// 待处理子序列，保持原始顺序
pub fn pending_items(items: &[Item], resolved: &HashSet<ItemId>) -> Vec<Item> {
    items
        .iter()
        .filter(|item| !resolved.contains(&item.id))
        .cloned()
        .collect()
}

/// 顺序切片成若干批次，最后一批可能不满
pub fn partition(pending: Vec<Item>, batch_size: usize) -> BatchPlan {
    if pending.is_empty() {
        return BatchPlan::NothingToDo;
    }

    let size = batch_size.max(1);
    let batches = pending
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            items: chunk.to_vec(),
        })
        .collect();

    BatchPlan::Batches(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item::new(i, format!("Paper {}", i))).collect()
    }

    #[test]
    fn twelve_items_in_fives_gives_three_batches() {
        let plan = BatchPlan::build(&items(12), &HashSet::new(), 5);
        let BatchPlan::Batches(batches) = plan else {
            panic!("expected batches");
        };

        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![5, 5, 2]);

        let covered: Vec<ItemId> = batches.iter().flat_map(Batch::ids).collect();
        let expected: Vec<ItemId> = (0..12usize).map(ItemId::from).collect();
        assert_eq!(covered, expected);
    }

    #[test]
    fn resolved_ids_are_skipped_in_order() {
        let resolved: HashSet<ItemId> = [1usize, 3, 4].into_iter().map(ItemId::from).collect();
        let pending = pending_items(&items(6), &resolved);
        let ids: Vec<&str> = pending.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "2", "5"]);
    }

    #[test]
    fn everything_resolved_means_nothing_to_do() {
        let all: HashSet<ItemId> = items(4).into_iter().map(|item| item.id).collect();
        let plan = BatchPlan::build(&items(4), &all, 5);
        assert!(matches!(plan, BatchPlan::NothingToDo));
        assert_eq!(plan.batch_count(), 0);
    }

    #[test]
    fn batch_indices_follow_input_order() {
        let plan = BatchPlan::build(&items(7), &HashSet::new(), 3);
        let BatchPlan::Batches(batches) = plan else {
            panic!("expected batches");
        };
        assert_eq!(
            batches.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(batches[2].ids(), vec![ItemId::from(6usize)]);
    }
}
