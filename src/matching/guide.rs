//! EPG 索引与匹配
//!
//! 先精确匹配规范键，未命中时退化为 token-set 模糊匹配

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::matching::fuzzy::best_match;
use crate::matching::normalizer::normalize;

/// 模糊匹配接受阈值（得分须严格大于该值）
pub const FUZZY_ACCEPT_THRESHOLD: u8 = 75;

/// EPG 索引：规范键 → EPG 频道标识
///
/// 同键冲突时先到先得；构建后只读
#[derive(Debug, Clone, Default)]
pub struct GuideIndex {
    entries: HashMap<String, String>,
}

impl GuideIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一条映射，键已存在时保留旧值
    ///
    /// 返回是否真正插入
    pub fn insert_first_wins(&mut self, key: String, guide_id: String) -> bool {
        match self.entries.entry(key) {
            Entry::Vacant(e) => {
                e.insert(guide_id);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// 以原始标签（频道 id 或显示名）建立映射，键为其规范化结果
    pub fn insert_label(&mut self, label: &str, guide_id: &str) -> bool {
        let key = normalize(label);
        if key.is_empty() {
            return false;
        }
        self.insert_first_wins(key, guide_id.to_string())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 不同 EPG 频道的数量
    pub fn channel_count(&self) -> usize {
        self.entries.values().collect::<HashSet<_>>().len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for GuideIndex {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut index = GuideIndex::new();
        for (k, v) in iter {
            index.insert_first_wins(k.into(), v.into());
        }
        index
    }
}

/// 匹配类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideMatchKind {
    /// 规范键精确命中
    Exact,
    /// token-set 模糊匹配
    Fuzzy,
}

/// 匹配结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideMatch<'a> {
    pub guide_id: &'a str,
    pub kind: GuideMatchKind,
    /// 相似度 (0 - 100)，精确匹配为 100
    pub score: u8,
}

/// EPG 匹配器（只读，可并发调用）
#[derive(Debug, Clone, Copy)]
pub struct GuideMatcher<'a> {
    index: &'a GuideIndex,
    threshold: u8,
}

impl<'a> GuideMatcher<'a> {
    pub fn new(index: &'a GuideIndex) -> Self {
        Self {
            index,
            threshold: FUZZY_ACCEPT_THRESHOLD,
        }
    }

    /// 解析频道显示名对应的 EPG 标识
    pub fn resolve(&self, display_name: &str) -> Option<&'a str> {
        self.resolve_detailed(display_name).map(|m| m.guide_id)
    }

    /// 同 [`resolve`](Self::resolve)，附带匹配类型与得分
    pub fn resolve_detailed(&self, display_name: &str) -> Option<GuideMatch<'a>> {
        if self.index.is_empty() {
            return None;
        }

        let key = normalize(display_name);

        // 1. 精确匹配
        if let Some(guide_id) = self.index.get(&key) {
            return Some(GuideMatch {
                guide_id,
                kind: GuideMatchKind::Exact,
                score: 100,
            });
        }

        // 2. 模糊匹配
        best_match(&key, self.index.iter(), self.threshold).map(|m| GuideMatch {
            guide_id: m.guide_id,
            kind: GuideMatchKind::Fuzzy,
            score: m.score,
        })
    }
}
