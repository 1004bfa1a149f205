use crate::models::item::{Item, ItemId};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

/// TOML 条目文件的外层结构：`[[items]]`
#[derive(Debug, Deserialize)]
struct TomlItems {
    #[serde(default)]
    items: Vec<Item>,
}

/// 从上游采集器产生的文件加载条目列表
///
/// - `.toml`：`[[items]]` 表数组
/// - 其他扩展名按 JSON 数组解析
///
/// 返回的顺序即原始输入顺序；ID 重复视为错误。
pub async fn load_items(path: &Path) -> Result<Vec<Item>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取条目文件: {}", path.display()))?;

    let items = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
        let parsed: TomlItems = toml::from_str(&content)
            .with_context(|| format!("无法解析TOML条目文件: {}", path.display()))?;
        parsed.items
    } else {
        serde_json::from_str::<Vec<Item>>(&content)
            .with_context(|| format!("无法解析JSON条目文件: {}", path.display()))?
    };

    ensure_unique_ids(&items).with_context(|| format!("条目文件非法: {}", path.display()))?;

    tracing::info!("成功加载 {} 个条目: {}", items.len(), path.display());
    Ok(items)
}

fn ensure_unique_ids(items: &[Item]) -> Result<()> {
    let mut seen: HashSet<&ItemId> = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(&item.id) {
            anyhow::bail!("条目 ID 重复: {}", item.id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_json_array_with_mixed_id_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(
            &path,
            r#"[
                {"id": 0, "title": "Off-road planning", "content_ref": "off_road.json"},
                {"id": "doi-10.1/x", "title": "Urban lanes"}
            ]"#,
        )
        .unwrap();

        let items = load_items(&path).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_str(), "0");
        assert_eq!(items[0].content_ref.as_deref(), Some("off_road.json"));
        assert_eq!(items[1].id.as_str(), "doi-10.1/x");
    }

    #[tokio::test]
    async fn loads_toml_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.toml");
        std::fs::write(
            &path,
            "[[items]]\nid = 7\ntitle = \"Mining haul roads\"\n\n[[items]]\nid = 8\ntitle = \"Lunar rover\"\ncontent_ref = \"lunar.json\"\n",
        )
        .unwrap();

        let items = load_items(&path).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id.as_str(), "8");
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, r#"[{"id": 1, "title": "a"}, {"id": "1", "title": "b"}]"#).unwrap();

        let err = load_items(&path).await.unwrap_err();
        assert!(format!("{:#}", err).contains("重复"));
    }
}
