//! 重复频道过滤
//!
//! 按规范键分组（组序、组内顺序均为首次出现顺序），按策略选出保留者。
//! 只做选择，不修改候选频道。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::playlist::ChannelCandidate;

/// 重复频道处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DuplicatePolicy {
    /// 保留全部
    #[default]
    #[serde(rename = "all")]
    KeepAll,
    /// 每组保留第一个
    #[serde(rename = "first")]
    KeepFirst,
    /// 每组保留画质最高者（同分取最先出现者）
    #[serde(rename = "quality")]
    KeepBestQuality,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::KeepAll => "all",
            DuplicatePolicy::KeepFirst => "first",
            DuplicatePolicy::KeepBestQuality => "quality",
        }
    }

    /// 显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            DuplicatePolicy::KeepAll => "保留全部",
            DuplicatePolicy::KeepFirst => "保留第一个",
            DuplicatePolicy::KeepBestQuality => "画质优先 (UHD > FHD > HD > SD)",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(DuplicatePolicy::KeepAll),
            "first" => Ok(DuplicatePolicy::KeepFirst),
            "quality" => Ok(DuplicatePolicy::KeepBestQuality),
            other => anyhow::bail!("未知的重复处理策略: {} (可选: all, first, quality)", other),
        }
    }
}

/// 画质分数：按 uhd → fhd → hd → sd 顺序检查子串，首个命中生效
pub fn quality_score(display_name: &str) -> u8 {
    let lower = display_name.to_lowercase();
    if lower.contains("uhd") {
        4
    } else if lower.contains("fhd") {
        3
    } else if lower.contains("hd") {
        2
    } else if lower.contains("sd") {
        1
    } else {
        0
    }
}

/// 按策略过滤重复频道
pub fn filter_duplicates(
    candidates: Vec<ChannelCandidate>,
    policy: DuplicatePolicy,
) -> Vec<ChannelCandidate> {
    if policy == DuplicatePolicy::KeepAll {
        return candidates;
    }

    // 分组：保持首次出现顺序
    let mut group_of: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<ChannelCandidate>> = Vec::new();
    for candidate in candidates {
        let slot = *group_of
            .entry(candidate.normalized_key.clone())
            .or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
        groups[slot].push(candidate);
    }

    let mut survivors = Vec::with_capacity(groups.len());
    for group in groups {
        let group_size = group.len();
        let chosen = match policy {
            DuplicatePolicy::KeepAll | DuplicatePolicy::KeepFirst => group.into_iter().next(),
            DuplicatePolicy::KeepBestQuality => pick_best_quality(group),
        };

        if let Some(chosen) = chosen {
            if group_size > 1 {
                tracing::debug!(
                    "重复频道 '{}' ({} 个)，保留: {}",
                    chosen.normalized_key,
                    group_size,
                    chosen.display_name
                );
            }
            survivors.push(chosen);
        }
    }

    survivors
}

/// 取画质最高者，同分保留最先出现的一个
fn pick_best_quality(group: Vec<ChannelCandidate>) -> Option<ChannelCandidate> {
    let mut best: Option<(u8, ChannelCandidate)> = None;
    for candidate in group {
        let score = quality_score(&candidate.display_name);
        let better = match &best {
            Some((best_score, _)) => score > *best_score,
            None => true,
        };
        if better {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, candidate)| candidate)
}
