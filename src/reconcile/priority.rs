//! 优先频道表
//!
//! 固定的 (规范键 → 期望频道号) 有序列表，启动时加载一次，之后只读。
//! 声明顺序即优先顺序；同一频道号可出现多次（别名），先被消费者生效。

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::matching::normalize;

/// 西班牙频道常用编号约定（声明顺序）
const SPANISH_CHANNEL_ORDER: &[(&str, u32)] = &[
    ("la 1", 1),
    ("la 2", 2),
    ("antena 3", 3),
    ("cuatro", 4),
    ("telecinco", 5),
    ("la sexta", 6),
    ("movistar plus", 7),
    ("movistar plus+", 7),
    ("movistar estrenos", 8),
    ("movistar estrenos 2", 9),
    ("movistar cine", 10),
    ("movistar series", 11),
    ("movistar series 2", 12),
    ("movistar comedia", 13),
    ("movistar drama", 14),
    ("movistar accion", 15),
    ("movistar clasicos", 16),
    ("movistar festivales", 17),
    ("movistar va de cine", 18),
    ("movistar la liga", 20),
    ("movistar la liga 2", 21),
    ("movistar liga de campeones", 22),
    ("movistar liga de campeones 2", 23),
    ("movistar f1", 24),
    ("movistar deportes", 25),
    ("movistar deportes 2", 26),
    ("movistar golf", 27),
    ("movistar toros", 28),
    ("movistar vamos", 29),
    ("movistar zero", 30),
    ("movistar documentales", 31),
    ("movistar investigacion", 32),
    ("movistar clasica", 33),
    ("movistar pop", 34),
    ("movistar rock", 35),
    ("movistar jazz", 36),
    ("movistar hits", 37),
    ("movistar cines", 38),
    ("movistar seriesmania", 39),
    ("atreseries", 40),
    ("neox", 41),
    ("nova", 42),
    ("mega", 43),
    ("fdf", 44),
    ("energy", 45),
    ("divinity", 46),
    ("boing", 47),
    ("clan", 48),
    ("paramount network", 49),
    ("dmax", 50),
    ("trece", 51),
    ("dkiss", 52),
    ("gol play", 53),
    ("real madrid tv", 54),
    ("barca tv", 55),
    ("teledeporte", 56),
    ("24h", 57),
    ("rtve play", 58),
    ("sx3", 59),
    ("tv3", 60),
    ("33", 61),
    ("esport3", 62),
    ("super3", 63),
    ("8tv", 64),
    ("telemadrid", 70),
    ("la otra", 71),
    ("canal sur", 80),
    ("canal sur 2", 81),
    ("etb1", 90),
    ("etb2", 91),
    ("etb3", 92),
    ("etb4", 93),
    ("tvg", 100),
    ("tvg2", 101),
    ("apunt", 110),
    ("apunt esports", 111),
    ("aragontv", 120),
    ("rtpa", 130),
    ("canal extremadura", 140),
    ("la 7 tv murcia", 150),
    ("ib3", 160),
    ("rtvc", 170),
    ("rtvcm", 180),
    ("cyld", 190),
    ("la rioja tv", 200),
    ("navarra tv", 210),
    ("castilla la mancha media", 220),
    ("cyl7", 230),
    ("cyl8", 231),
];

lazy_static::lazy_static! {
    static ref SPANISH_TABLE: PriorityTable =
        PriorityTable::from_labels(SPANISH_CHANNEL_ORDER.iter().copied());
}

/// 优先表条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityEntry {
    pub key: String,
    pub number: u32,
}

/// 自定义优先表文件中的条目（JSON 数组元素）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityTableRecord {
    pub name: String,
    pub number: u32,
}

/// 优先频道表（不可变）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityTable {
    entries: Vec<PriorityEntry>,
}

impl PriorityTable {
    /// 由原始标签构建，标签在此规范化；规范化后为空的标签被忽略
    pub fn from_labels<S, I>(labels: I) -> Self
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, u32)>,
    {
        let entries = labels
            .into_iter()
            .filter_map(|(label, number)| {
                let key = normalize(label.as_ref());
                if key.is_empty() {
                    tracing::warn!("优先表条目规范化后为空，已忽略: {:?}", label.as_ref());
                    None
                } else {
                    Some(PriorityEntry { key, number })
                }
            })
            .collect();
        Self { entries }
    }

    /// 默认表：西班牙频道编号约定
    pub fn spanish() -> &'static PriorityTable {
        &SPANISH_TABLE
    }

    /// 从 JSON 文件加载：`[{"name": "La 1", "number": 1}, ...]`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取优先表: {}", path.display()))?;
        let records: Vec<PriorityTableRecord> = serde_json::from_str(&content)
            .with_context(|| format!("优先表格式不合法: {}", path.display()))?;

        tracing::info!("已加载自定义优先表: {} 条 ({})", records.len(), path.display());
        Ok(Self::from_labels(records.into_iter().map(|r| (r.name, r.number))))
    }

    pub fn entries(&self) -> &[PriorityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
