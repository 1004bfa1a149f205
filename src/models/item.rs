use serde::{Deserialize, Serialize};
use std::fmt;

/// 远程调用失败或返回不足时的兜底理由
pub const REASON_INSUFFICIENT: &str = "insufficient results";
/// 从未得到结果的条目（本次运行未完成）
pub const REASON_INCOMPLETE: &str = "processing incomplete";
/// 返回元素缺少 reason 字段
pub const REASON_MISSING: &str = "no reason given";

/// 条目的稳定标识
///
/// 上游可能给出整数或字符串，入口处统一转换为文本，之后所有查找都用同一种类型。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<usize> for ItemId {
    fn from(value: usize) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Visitor;

        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = ItemId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer item id")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(E::custom("item id must not be empty"));
                }
                Ok(ItemId(trimmed.to_string()))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ItemId(value.to_string()))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ItemId(value.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// 待评分条目，由上游采集器产生，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    /// 指向可读取正文的不透明引用（通常是摘要文件名）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content_ref: None,
        }
    }

    pub fn with_content_ref(mut self, content_ref: impl Into<String>) -> Self {
        self.content_ref = Some(content_ref.into());
        self
    }
}

/// 检查点中保存的评分（不含 ID，ID 是映射的键）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: i64,
    pub reason: String,
}

impl Verdict {
    pub fn new(score: i64, reason: impl Into<String>) -> Self {
        Self {
            score,
            reason: reason.into(),
        }
    }

    /// 返回不足 / 调用失败时的兜底评分
    pub fn insufficient() -> Self {
        Self::new(0, REASON_INSUFFICIENT)
    }

    /// 本次运行从未得到结果
    pub fn incomplete() -> Self {
        Self::new(0, REASON_INCOMPLETE)
    }

    pub fn is_incomplete(&self) -> bool {
        self.reason == REASON_INCOMPLETE
    }
}

/// 单个条目的评分结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreResult {
    pub item_id: ItemId,
    pub score: i64,
    pub reason: String,
}

impl ScoreResult {
    pub fn new(item_id: ItemId, verdict: Verdict) -> Self {
        Self {
            item_id,
            score: verdict.score,
            reason: verdict.reason,
        }
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::new(self.score, self.reason.clone())
    }
}
