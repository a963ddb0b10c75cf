//! 频道号分配
//!
//! 两阶段，严格先后：
//! 1. 优先表阶段：按表的声明顺序，为每个未被占用的号码寻找第一个尚未分配、规范键相同的候选
//! 2. 顺序填充阶段：剩余候选按规范键升序，从起始号开始跳过已占用号码依次分配
//!
//! 分配过程中惰性解析 EPG 标识。结果只取决于（候选顺序、优先表、起始号、预留号码）。

use std::collections::{BTreeSet, HashMap, VecDeque};

use anyhow::Result;

use crate::matching::GuideMatcher;
use crate::playlist::ChannelCandidate;
use super::priority::PriorityTable;

/// 分配统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumberingStats {
    /// 优先表阶段分配数
    pub priority: usize,
    /// 顺序填充阶段分配数
    pub sequential: usize,
    /// 本次新解析到 EPG 标识的频道数
    pub guide_resolved: usize,
}

impl NumberingStats {
    pub fn numbered(&self) -> usize {
        self.priority + self.sequential
    }
}

/// 分配结果：频道按分配先后排列，均已带 `assigned_number`
#[derive(Debug, Clone)]
pub struct NumberingOutcome {
    pub channels: Vec<ChannelCandidate>,
    pub stats: NumberingStats,
}

/// 频道号分配器
#[derive(Debug, Clone)]
pub struct ChannelNumberAssigner<'a> {
    table: &'a PriorityTable,
    start_number: u32,
    reserved: BTreeSet<u32>,
}

impl<'a> ChannelNumberAssigner<'a> {
    pub fn new(table: &'a PriorityTable, start_number: u32) -> Self {
        Self {
            table,
            start_number,
            reserved: BTreeSet::new(),
        }
    }

    /// 预先占用的号码，两个阶段都不会分配它们
    pub fn with_reserved(mut self, reserved: impl IntoIterator<Item = u32>) -> Self {
        self.reserved.extend(reserved);
        self
    }

    /// 号码空间（至 `u32::MAX`）不足以容纳全部候选时返回错误
    pub fn assign(
        &self,
        candidates: Vec<ChannelCandidate>,
        matcher: &GuideMatcher<'_>,
    ) -> Result<NumberingOutcome> {
        let mut candidates = candidates;
        let mut used: BTreeSet<u32> = self.reserved.clone();
        let mut stats = NumberingStats::default();
        let mut order: Vec<usize> = Vec::with_capacity(candidates.len());

        // 规范键 → 候选下标（原始顺序）
        let mut by_key: HashMap<&str, VecDeque<usize>> = HashMap::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            by_key
                .entry(candidate.normalized_key.as_str())
                .or_default()
                .push_back(idx);
        }
        let mut priority_hits: Vec<(usize, u32)> = Vec::new();

        // ========== 阶段 1：优先表 ==========
        for entry in self.table.entries() {
            if used.contains(&entry.number) {
                continue;
            }
            let Some(idx) = by_key.get_mut(entry.key.as_str()).and_then(VecDeque::pop_front) else {
                continue;
            };
            used.insert(entry.number);
            priority_hits.push((idx, entry.number));
        }
        drop(by_key);

        for (idx, number) in priority_hits {
            let candidate = &mut candidates[idx];
            candidate.assigned_number = Some(number);
            if resolve_guide(candidate, matcher) {
                stats.guide_resolved += 1;
            }
            stats.priority += 1;
            order.push(idx);
            tracing::info!("分配（优先）: '{}' -> tvg-chno={}", candidate.display_name, number);
        }

        // ========== 阶段 2：顺序填充 ==========
        let mut remaining: Vec<usize> = (0..candidates.len())
            .filter(|idx| candidates[*idx].assigned_number.is_none())
            .collect();
        remaining.sort_by(|a, b| {
            candidates[*a]
                .normalized_key
                .cmp(&candidates[*b].normalized_key)
                .then_with(|| a.cmp(b))
        });

        // None 表示号码已用尽
        let mut cursor = Some(self.start_number);
        for idx in remaining {
            let number = loop {
                match cursor {
                    Some(n) if used.contains(&n) => cursor = n.checked_add(1),
                    Some(n) => break n,
                    None => anyhow::bail!(
                        "频道号已用尽 (起始 {}), 无法为 '{}' 分配",
                        self.start_number,
                        candidates[idx].display_name
                    ),
                }
            };

            let candidate = &mut candidates[idx];
            candidate.assigned_number = Some(number);
            used.insert(number);
            if resolve_guide(candidate, matcher) {
                stats.guide_resolved += 1;
            }
            stats.sequential += 1;
            order.push(idx);
            tracing::info!("分配（顺序）: '{}' -> tvg-chno={}", candidate.display_name, number);

            cursor = number.checked_add(1);
        }

        // 按分配先后重排
        let mut slots: Vec<Option<ChannelCandidate>> = candidates.into_iter().map(Some).collect();
        let channels = order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect();

        Ok(NumberingOutcome { channels, stats })
    }
}

/// 未解析过时尝试解析 EPG 标识，返回是否新解析成功
fn resolve_guide(candidate: &mut ChannelCandidate, matcher: &GuideMatcher<'_>) -> bool {
    if candidate.resolved_guide_id.is_some() {
        return false;
    }
    match matcher.resolve_detailed(&candidate.display_name) {
        Some(found) => {
            tracing::debug!(
                "EPG 匹配: '{}' -> {} ({:?}, {})",
                candidate.display_name,
                found.guide_id,
                found.kind,
                found.score
            );
            candidate.resolved_guide_id = Some(found.guide_id.to_string());
            true
        }
        None => false,
    }
}
