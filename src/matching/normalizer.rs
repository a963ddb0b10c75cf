//! 频道名规范化
//!
//! 将任意频道标签归约为比较用的规范键（NormalizedKey）：
//! 1. Unicode 分解（NFKD）+ 去除组合附加符号（重音）
//! 2. 小写
//! 3. 删除 `[a-z0-9+]` 与空白以外的字符
//! 4. 按空白分词，整词剔除画质/噪声标记
//! 5. 单空格拼接
//!
//! 纯函数，无外部状态；`normalize(normalize(x)) == normalize(x)`。

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// 整词匹配时剔除的噪声标记
pub const NOISE_TOKENS: &[&str] = &["hd", "sd", "fhd", "uhd", "720", "1080", "tv", "plus+"];

/// 规范化频道名
pub fn normalize(label: &str) -> String {
    // 1-3. 去重音 + 小写 + 字符过滤（'+' 暂时保留，用于识别 "plus+"）
    let mut folded = String::with_capacity(label.len());
    for ch in label.nfkd().filter(|c| !is_combining_mark(*c)) {
        for lower in ch.to_lowercase() {
            if lower.is_whitespace() {
                folded.push(' ');
            } else if lower.is_ascii_lowercase() || lower.is_ascii_digit() || lower == '+' {
                folded.push(lower);
            }
        }
    }

    // 4-5. 整词剔除噪声标记，再去掉残余的 '+'
    let mut key = String::with_capacity(folded.len());
    for token in folded.split_whitespace() {
        if is_noise(token) {
            continue;
        }
        let stripped: String = token.chars().filter(|c| *c != '+').collect();
        if stripped.is_empty() || is_noise(&stripped) {
            continue;
        }
        if !key.is_empty() {
            key.push(' ');
        }
        key.push_str(&stripped);
    }

    key
}

fn is_noise(token: &str) -> bool {
    NOISE_TOKENS.contains(&token)
}
