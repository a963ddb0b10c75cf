// 播放列表数据模型
//
// RawEntry（读入）→ ChannelCandidate（探测成功）→ AssignedChannel（可输出）

use serde::Serialize;

use crate::matching::normalize;
use crate::playlist::extinf;

/// 原始频道条目：#EXTINF 行 + 紧随其后的 URL 行
///
/// 行内容不含换行符；读入后不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// 在文件中的频道序号（从 0 开始），用于恢复原始顺序
    pub position: usize,
    pub metadata_line: String,
    pub url_line: String,
}

impl RawEntry {
    /// 去除首尾空白后的 URL
    pub fn url(&self) -> &str {
        self.url_line.trim()
    }

    /// 频道显示名（tvg-name 优先，否则为逗号后的文本）
    pub fn display_name(&self) -> String {
        extinf::display_name(&self.metadata_line)
    }
}

/// 解析后的播放列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    /// 输入中的第一行 #EXTM3U 头（原样，含 x-tvg-url 等属性）
    pub header: Option<String>,
    /// 频道条目（文件顺序）
    pub entries: Vec<RawEntry>,
    /// 非频道行（注释、空行、其他指令），原样保留，保持相对顺序
    pub other_lines: Vec<String>,
}

/// 候选频道（探测成功后创建）
///
/// 仅 EPG 匹配（写 resolved_guide_id）与编号分配（写 assigned_number）会修改它
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCandidate {
    pub position: usize,
    pub metadata_line: String,
    pub url_line: String,
    pub display_name: String,
    pub normalized_key: String,
    pub resolved_guide_id: Option<String>,
    pub assigned_number: Option<u32>,
}

impl ChannelCandidate {
    pub fn from_entry(entry: &RawEntry) -> Self {
        let display_name = entry.display_name();
        let normalized_key = normalize(&display_name);
        Self {
            position: entry.position,
            metadata_line: entry.metadata_line.clone(),
            url_line: entry.url_line.clone(),
            display_name,
            normalized_key,
            resolved_guide_id: None,
            assigned_number: None,
        }
    }
}

/// 最终输出记录，编号全局唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignedChannel {
    pub number: u32,
    pub metadata_line: String,
    pub url_line: String,
}

/// 探测失败的频道
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedChannel {
    pub display_name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_from_entry() {
        let entry = RawEntry {
            position: 3,
            metadata_line: r#"#EXTINF:-1 tvg-name="Antena 3 HD" group-title="TDT",A3"#.to_string(),
            url_line: "http://example.com/a3.m3u8".to_string(),
        };

        let candidate = ChannelCandidate::from_entry(&entry);
        assert_eq!(candidate.position, 3);
        assert_eq!(candidate.display_name, "Antena 3 HD");
        assert_eq!(candidate.normalized_key, "antena 3");
        assert!(candidate.resolved_guide_id.is_none());
        assert!(candidate.assigned_number.is_none());
    }

    #[test]
    fn test_entry_url_trimmed() {
        let entry = RawEntry {
            position: 0,
            metadata_line: "#EXTINF:-1,La 1".to_string(),
            url_line: "  http://example.com/la1  ".to_string(),
        };
        assert_eq!(entry.url(), "http://example.com/la1");
        assert_eq!(entry.display_name(), "La 1");
    }
}
