// Playlist 模块 - M3U 读写
//
// - parser: 读取播放列表，拆分频道条目与非频道行
// - extinf: #EXTINF 属性语法与重写
// - writer: 渲染与原子写回

pub mod extinf;
mod parser;
mod types;
mod writer;

pub use parser::{parse_playlist, read_playlist, HEADER_TAG};
pub use types::*;
pub use writer::{render_playlist, write_atomic};
