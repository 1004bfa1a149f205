//! 原子写文件：先写同目录临时文件，刷盘后 rename 覆盖目标

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// 临时文件路径：`<path>.tmp`
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(".tmp");
    PathBuf::from(raw)
}

/// 把 `value` 序列化为格式化 JSON 并原子替换 `path`
///
/// 崩溃时磁盘上要么是旧文件，要么是新文件，不会留下写了一半的目标文件。
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp = tmp_path(path);
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(&json).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path).await
}
