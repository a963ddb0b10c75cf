// Reconcile 模块 - 去重与频道编号
//
// - priority: 优先频道表（固定编号约定）
// - dedup: 重复频道过滤策略
// - numbering: 两阶段频道号分配

mod dedup;
mod numbering;
mod priority;

pub use dedup::{filter_duplicates, quality_score, DuplicatePolicy};
pub use numbering::{ChannelNumberAssigner, NumberingOutcome, NumberingStats};
pub use priority::{PriorityEntry, PriorityTable, PriorityTableRecord};
