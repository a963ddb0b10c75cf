//! 模糊匹配
//!
//! token-set 相似度（0-100）：与词序、重复词无关，且对称

use std::cmp::Ordering;
use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

/// 模糊匹配结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyMatch<'a> {
    /// 命中的规范键
    pub key: &'a str,
    /// 对应的 EPG 标识
    pub guide_id: &'a str,
    /// 相似度 (0 - 100)
    pub score: u8,
}

/// 两个字符串的编辑距离相似度（0-100）
///
/// 任一为空返回 0
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    (normalized_levenshtein(a, b) * 100.0).round() as u8
}

/// token-set 相似度
///
/// 交集词 + 各自差集词分别排序拼接，取三组两两相似度的最大值。
/// 一方的词集是另一方的子集时得分为 100。
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let tokens_a = token_set(a);
    let tokens_b = token_set(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let intersection = join(tokens_a.intersection(&tokens_b));
    let diff_a = join(tokens_a.difference(&tokens_b));
    let diff_b = join(tokens_b.difference(&tokens_a));

    let combined_a = format!("{} {}", intersection, diff_a).trim().to_string();
    let combined_b = format!("{} {}", intersection, diff_b).trim().to_string();

    [
        ratio(&intersection, &combined_a),
        ratio(&intersection, &combined_b),
        ratio(&combined_a, &combined_b),
    ]
    .into_iter()
    .max()
    .unwrap_or(0)
}

/// 在候选 (规范键, EPG 标识) 中选出得分最高且 **严格大于** `threshold` 的一项
///
/// 同分时取字典序最小的 EPG 标识，再取最小的规范键，结果与遍历顺序无关
pub fn best_match<'a, I>(query: &str, candidates: I, threshold: u8) -> Option<FuzzyMatch<'a>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut best: Option<FuzzyMatch<'a>> = None;

    for (key, guide_id) in candidates {
        let score = token_set_ratio(query, key);
        if score <= threshold {
            continue;
        }

        let candidate = FuzzyMatch {
            key,
            guide_id,
            score,
        };
        best = match best {
            Some(current) if rank(&current, &candidate) != Ordering::Greater => Some(current),
            _ => Some(candidate),
        };
    }

    best
}

/// 排序规则：分数高者在前，其次 EPG 标识小者在前，再次规范键小者在前
fn rank(a: &FuzzyMatch<'_>, b: &FuzzyMatch<'_>) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.guide_id.cmp(b.guide_id))
        .then_with(|| a.key.cmp(b.key))
}

fn token_set(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn join<'a>(tokens: impl Iterator<Item = &'a String>) -> String {
    tokens.map(String::as_str).collect::<Vec<_>>().join(" ")
}
