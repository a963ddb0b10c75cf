// 播放列表读取
//
// 频道条目 = `#EXTINF:` 行 + 紧随其后以 `http` 开头的 URL 行；
// `#EXTM3U` 头不保留，其余行原样保留

use std::path::Path;

use anyhow::{Context, Result};

use crate::playlist::extinf::EXTINF_TAG;
use crate::playlist::types::{Playlist, RawEntry};

pub const HEADER_TAG: &str = "#EXTM3U";

/// 读取并解析播放列表文件
///
/// 文件不存在或不可读时返回错误（致命）
pub fn read_playlist(path: &Path) -> Result<Playlist> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取播放列表: {}", path.display()))?;
    Ok(parse_playlist(&content))
}

/// 解析播放列表文本
pub fn parse_playlist(content: &str) -> Playlist {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let lines: Vec<&str> = content.lines().collect();

    let mut playlist = Playlist::default();
    let mut i = 0;

    while i < lines.len() {
        let current = lines[i].trim();

        if current.starts_with(EXTINF_TAG) {
            if let Some(next) = lines.get(i + 1) {
                if next.trim().starts_with("http") {
                    playlist.entries.push(RawEntry {
                        position: playlist.entries.len(),
                        metadata_line: lines[i].to_string(),
                        url_line: next.to_string(),
                    });
                    i += 2;
                    continue;
                }
            }
        }

        if current.starts_with(HEADER_TAG) {
            if playlist.header.is_none() {
                playlist.header = Some(current.to_string());
            }
        } else {
            playlist.other_lines.push(lines[i].to_string());
        }
        i += 1;
    }

    tracing::debug!(
        "播放列表解析完成: {} 个频道, {} 行非频道内容",
        playlist.entries.len(),
        playlist.other_lines.len()
    );

    playlist
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "#EXTM3U x-tvg-url=\"guide.xml\"\n\
#EXTINF:-1 tvg-name=\"La 1\",La 1\n\
http://example.com/la1.m3u8\n\
# comentario\n\
\n\
#EXTINF:-1,Sin URL\n\
#EXTVLCOPT:http-user-agent=VLC\n\
#EXTINF:-1,Antena 3 HD\r\n\
https://example.com/a3.m3u8\r\n";

    #[test]
    fn test_parse_entries_and_other_lines() {
        let playlist = parse_playlist(SAMPLE);

        assert_eq!(playlist.header.as_deref(), Some("#EXTM3U x-tvg-url=\"guide.xml\""));
        assert_eq!(playlist.entries.len(), 2);
        assert_eq!(playlist.entries[0].position, 0);
        assert_eq!(playlist.entries[0].url(), "http://example.com/la1.m3u8");
        assert_eq!(playlist.entries[1].position, 1);
        assert_eq!(playlist.entries[1].metadata_line, "#EXTINF:-1,Antena 3 HD");
        assert_eq!(playlist.entries[1].display_name(), "Antena 3 HD");

        assert_eq!(
            playlist.other_lines,
            vec![
                "# comentario",
                "",
                "#EXTINF:-1,Sin URL",
                "#EXTVLCOPT:http-user-agent=VLC",
            ]
        );
    }

    #[test]
    fn test_parse_without_header_and_bom() {
        let playlist = parse_playlist("\u{feff}#EXTINF:-1,Clan\nhttp://example.com/clan\n");
        assert!(playlist.header.is_none());
        assert_eq!(playlist.entries.len(), 1);
        assert!(playlist.other_lines.is_empty());
    }

    #[test]
    fn test_trailing_extinf_without_url_is_preserved() {
        let playlist = parse_playlist("#EXTINF:-1,Ultimo");
        assert!(playlist.entries.is_empty());
        assert_eq!(playlist.other_lines, vec!["#EXTINF:-1,Ultimo"]);
    }

    #[test]
    fn test_read_playlist_missing_file_is_error() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let result = read_playlist(&temp.path().join("missing.m3u"));
        assert!(result.is_err());
    }
}
