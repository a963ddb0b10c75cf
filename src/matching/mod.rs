//! 频道名匹配层
//!
//! ## 处理流程
//! 1. 规范化：去重音、小写、剔除画质标记、空白折叠
//! 2. EPG 精确匹配（规范键）
//! 3. token-set 模糊匹配（阈值 75，同分按 EPG 标识排序）

mod fuzzy;
mod guide;
mod normalizer;

pub use fuzzy::{best_match, ratio, token_set_ratio, FuzzyMatch};
pub use guide::{GuideIndex, GuideMatch, GuideMatchKind, GuideMatcher, FUZZY_ACCEPT_THRESHOLD};
pub use normalizer::{normalize, NOISE_TOKENS};
