// 播放列表写出
//
// 输出顺序：可选头 → 非频道行 → 按频道号升序的频道对；每行以单个 '\n' 结尾

use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use crate::playlist::types::AssignedChannel;

/// 渲染播放列表文本
///
/// `channels` 按给定顺序输出，调用方负责按频道号排序
pub fn render_playlist(
    header: Option<&str>,
    other_lines: &[String],
    channels: &[AssignedChannel],
) -> String {
    let mut out = String::new();

    if let Some(header) = header {
        push_line(&mut out, header);
    }
    for line in other_lines {
        push_line(&mut out, line);
    }
    for channel in channels {
        push_line(&mut out, &channel.metadata_line);
        push_line(&mut out, &channel.url_line);
    }

    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line.trim_end_matches(['\r', '\n']));
    out.push('\n');
}

/// 原子写入：先写临时文件，再重命名替换目标
///
/// 失败时目标文件保持原样
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let unique_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp_path = path.with_extension(format!("tmp.{}", unique_suffix));

    let written = (|| -> Result<()> {
        let mut tmp_file = std::fs::File::create(&tmp_path)?;
        tmp_file.write_all(content.as_bytes())?;
        tmp_file.sync_all()?;
        Ok(())
    })();

    let result = written.and_then(|_| std::fs::rename(&tmp_path, path).map_err(Into::into));

    if let Err(err) = result {
        if tmp_path.exists() {
            if let Err(cleanup_err) = std::fs::remove_file(&tmp_path) {
                tracing::warn!("写入失败后清理临时文件失败: {}", cleanup_err);
            }
        }
        return Err(err);
    }

    Ok(())
}
