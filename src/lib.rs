// M3U 播放列表整理
//
// 检测失效频道、按编号约定分配 tvg-chno、按 EPG 匹配 tvg-id

pub mod cli;
pub mod config;
pub mod guide_source;
pub mod matching;
pub mod pipeline;
pub mod playlist;
pub mod probe;
pub mod reconcile;
