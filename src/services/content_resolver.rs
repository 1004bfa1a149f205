//! 正文解析服务 - 业务能力层
//!
//! 只负责"把 content_ref 变成可发送的正文"，永远返回非空文本

use serde_json::Value as JsonValue;
use std::path::PathBuf;
use tracing::debug;

use crate::models::Item;

/// 上游采集器标记"没抓到摘要"的取值
pub const NOT_FOUND_MARKER: &str = "Not_Found";

pub const PLACEHOLDER_NO_CONTENT: &str = "no abstract available";
pub const PLACEHOLDER_MISSING_FILE: &str = "abstract file not found";
pub const PLACEHOLDER_CORRUPT: &str = "abstract file corrupt";
pub const PLACEHOLDER_EMPTY: &str = "abstract is empty";

/// 正文解析服务
///
/// - `.json` 文件取 `abstract` 字段
/// - 其他文件取整个文本
/// - 任何缺失 / 损坏都用占位文本代替
#[derive(Debug, Clone)]
pub struct ContentResolver {
    content_dir: PathBuf,
}

impl ContentResolver {
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
        }
    }

    pub async fn resolve(&self, item: &Item) -> String {
        let Some(content_ref) = item
            .content_ref
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty() && *r != NOT_FOUND_MARKER)
        else {
            return PLACEHOLDER_NO_CONTENT.to_string();
        };

        let path = self.content_dir.join(content_ref);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("条目 {} 的正文文件不存在: {}", item.id, path.display());
                return PLACEHOLDER_MISSING_FILE.to_string();
            }
            Err(e) => {
                debug!("条目 {} 的正文文件无法读取: {}", item.id, e);
                return PLACEHOLDER_CORRUPT.to_string();
            }
        };

        let text = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            match serde_json::from_str::<JsonValue>(&raw) {
                Ok(doc) => doc
                    .get("abstract")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                Err(_) => return PLACEHOLDER_CORRUPT.to_string(),
            }
        } else {
            raw.trim().to_string()
        };

        if text.is_empty() {
            PLACEHOLDER_EMPTY.to_string()
        } else {
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(content_ref: Option<&str>) -> Item {
        let item = Item::new(1usize, "Traversability");
        match content_ref {
            Some(r) => item.with_content_ref(r),
            None => item,
        }
    }

    #[tokio::test]
    async fn reads_abstract_field_from_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("t.json"),
            r#"{"title": "T", "abstract": "  Rough terrain planning.  "}"#,
        )
        .unwrap();

        let resolver = ContentResolver::new(dir.path());
        assert_eq!(
            resolver.resolve(&item(Some("t.json"))).await,
            "Rough terrain planning."
        );
    }

    #[tokio::test]
    async fn placeholders_are_never_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{oops").unwrap();
        std::fs::write(dir.path().join("empty.json"), r#"{"abstract": ""}"#).unwrap();
        std::fs::write(dir.path().join("plain.txt"), "Plain body").unwrap();

        let resolver = ContentResolver::new(dir.path());
        assert_eq!(resolver.resolve(&item(None)).await, PLACEHOLDER_NO_CONTENT);
        assert_eq!(
            resolver.resolve(&item(Some(NOT_FOUND_MARKER))).await,
            PLACEHOLDER_NO_CONTENT
        );
        assert_eq!(
            resolver.resolve(&item(Some("gone.json"))).await,
            PLACEHOLDER_MISSING_FILE
        );
        assert_eq!(resolver.resolve(&item(Some("bad.json"))).await, PLACEHOLDER_CORRUPT);
        assert_eq!(resolver.resolve(&item(Some("empty.json"))).await, PLACEHOLDER_EMPTY);
        assert_eq!(resolver.resolve(&item(Some("plain.txt"))).await, "Plain body");
    }
}
