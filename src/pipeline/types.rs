// Pipeline 核心类型定义
//
// - 输出目标 (OutputTarget)
// - 运行汇总 (RunSummary)
// - 处理结果 (PipelineResult)

use std::fmt;

use serde::Serialize;

use crate::playlist::{AssignedChannel, FailedChannel};

/// 输出目标
///
/// 决定是否输出 #EXTM3U 头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// 写入单独的输出文件：总是输出头
    NewFile,
    /// 覆盖输入文件：仅当输入含有头时输出
    Overwrite,
}

/// 运行汇总（只用于展示）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// 完成检测的频道数
    pub probed: usize,
    /// 可达频道数
    pub reachable: usize,
    /// 不可达频道数
    pub failed: usize,
    /// 因中断未检测的频道数
    pub skipped: usize,
    /// 去重后剩余频道数
    pub after_dedup: usize,
    /// 分配到 tvg-id 的频道数
    pub guide_resolved: usize,
    /// 分配到 tvg-chno 的频道数
    pub numbered: usize,
    /// 检测是否被中断
    pub cancelled: bool,
}

impl RunSummary {
    /// 覆盖输入文件时，是否有值得写回的变化
    pub fn has_changes(&self) -> bool {
        self.failed > 0 || self.skipped > 0 || self.guide_resolved > 0 || self.numbered > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- 分析完成 ---")?;
        writeln!(f, "已检测频道: {}", self.probed)?;
        writeln!(f, "可用频道: {}", self.reachable)?;
        writeln!(f, "去重后频道: {}", self.after_dedup)?;
        writeln!(f, "失败频道: {}", self.failed)?;
        if self.skipped > 0 {
            writeln!(f, "未检测频道（已中断）: {}", self.skipped)?;
        }
        writeln!(f, "已分配 tvg-id: {}", self.guide_resolved)?;
        write!(f, "已分配 tvg-chno: {}", self.numbered)
    }
}

/// Pipeline 处理结果
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// 按频道号升序的输出频道
    pub channels: Vec<AssignedChannel>,
    /// 不可达频道（文件顺序）
    pub failed: Vec<FailedChannel>,
    pub summary: RunSummary,
}
