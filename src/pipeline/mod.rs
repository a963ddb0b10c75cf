// Pipeline 模块 - 播放列表整理流程
//
// 阶段严格按顺序执行：
// 检测结果 → 去重 → 编号（期间惰性匹配 EPG）→ 重写 #EXTINF → 按频道号排序 → 渲染
//
// 检测阶段之外全部为单线程、确定性的纯计算。

mod types;

pub use types::*;

use anyhow::Result;

use crate::matching::GuideMatcher;
use crate::playlist::{extinf, render_playlist, AssignedChannel, Playlist, HEADER_TAG};
use crate::probe::ProbeReport;
use crate::reconcile::{filter_duplicates, ChannelNumberAssigner, DuplicatePolicy, PriorityTable};

/// 整理流程（不含检测与写盘）
#[derive(Debug, Clone)]
pub struct ReconcilePipeline<'a> {
    table: &'a PriorityTable,
    policy: DuplicatePolicy,
    start_number: u32,
    reserved: Vec<u32>,
}

impl<'a> ReconcilePipeline<'a> {
    pub fn new(table: &'a PriorityTable, policy: DuplicatePolicy, start_number: u32) -> Self {
        Self {
            table,
            policy,
            start_number,
            reserved: Vec::new(),
        }
    }

    pub fn with_reserved(mut self, reserved: &[u32]) -> Self {
        self.reserved = reserved.to_vec();
        self
    }

    /// 对检测结果执行去重、编号与重写
    pub fn run(&self, report: ProbeReport, matcher: &GuideMatcher<'_>) -> Result<PipelineResult> {
        let ProbeReport {
            reachable,
            failed,
            skipped,
            cancelled,
        } = report;

        let mut summary = RunSummary {
            probed: reachable.len() + failed.len(),
            reachable: reachable.len(),
            failed: failed.len(),
            skipped,
            cancelled,
            ..RunSummary::default()
        };

        tracing::info!("应用重复处理策略: {}", self.policy.display_name());
        let survivors = filter_duplicates(reachable, self.policy);
        summary.after_dedup = survivors.len();
        tracing::info!("去重后频道: {}", survivors.len());

        let outcome = ChannelNumberAssigner::new(self.table, self.start_number)
            .with_reserved(self.reserved.iter().copied())
            .assign(survivors, matcher)?;
        summary.guide_resolved = outcome.stats.guide_resolved;
        summary.numbered = outcome.stats.numbered();

        let mut channels: Vec<AssignedChannel> = outcome
            .channels
            .into_iter()
            .filter_map(|candidate| {
                let number = candidate.assigned_number?;
                let metadata_line = extinf::rewrite(
                    &candidate.metadata_line,
                    candidate.resolved_guide_id.as_deref(),
                    Some(number),
                );
                Some(AssignedChannel {
                    number,
                    metadata_line,
                    url_line: candidate.url_line,
                })
            })
            .collect();
        channels.sort_by_key(|channel| channel.number);

        Ok(PipelineResult {
            channels,
            failed,
            summary,
        })
    }
}

/// 渲染输出文本
///
/// 写入新文件时总是带头（沿用输入的头，否则为 `#EXTM3U`）；覆盖输入时仅在输入有头时输出
pub fn render_output(playlist: &Playlist, result: &PipelineResult, target: OutputTarget) -> String {
    let header = match target {
        OutputTarget::NewFile => Some(playlist.header.as_deref().unwrap_or(HEADER_TAG)),
        OutputTarget::Overwrite => playlist.header.as_deref(),
    };
    render_playlist(header, &playlist.other_lines, &result.channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::GuideIndex;
    use crate::playlist::{parse_playlist, ChannelCandidate, FailedChannel};

    const INPUT: &str = "#EXTM3U x-tvg-url=\"http://guia.example/epg.xml\"\n\
# Lista de prueba\n\
#EXTINF:-1 group-title=\"Nacionales\",Antena 3 HD\n\
http://example.com/a3\n\
#EXTINF:-1 tvg-logo=\"la1.png\",La 1\n\
http://example.com/la1\n\
#EXTINF:-1,Caido\n\
http://example.com/caido\n";

    fn report_for(playlist: &Playlist, failed_urls: &[&str]) -> ProbeReport {
        let mut report = ProbeReport::default();
        for entry in &playlist.entries {
            if failed_urls.contains(&entry.url()) {
                report.failed.push(FailedChannel {
                    display_name: entry.display_name(),
                    url: entry.url().to_string(),
                });
            } else {
                report.reachable.push(ChannelCandidate::from_entry(entry));
            }
        }
        report
    }

    fn sample_table() -> PriorityTable {
        PriorityTable::from_labels(vec![("La 1", 1u32), ("Antena 3", 3)])
    }

    #[test]
    fn test_end_to_end_priority_numbers_and_guide_ids() {
        let playlist = parse_playlist(INPUT);
        let report = report_for(&playlist, &["http://example.com/caido"]);
        let mut index = GuideIndex::new();
        index.insert_label("La 1", "La1.es");
        index.insert_label("Antena 3", "Antena3.es");
        let matcher = GuideMatcher::new(&index);
        let table = sample_table();

        let result = ReconcilePipeline::new(&table, DuplicatePolicy::KeepAll, 1)
            .run(report, &matcher)
            .expect("run pipeline");

        assert_eq!(result.channels.len(), 2);
        assert_eq!(result.channels[0].number, 1);
        assert_eq!(
            result.channels[0].metadata_line,
            "#EXTINF:-1 tvg-id=\"La1.es\" tvg-chno=\"1\" tvg-logo=\"la1.png\",La 1"
        );
        assert_eq!(result.channels[1].number, 3);
        assert_eq!(
            result.channels[1].metadata_line,
            "#EXTINF:-1 tvg-id=\"Antena3.es\" tvg-chno=\"3\" group-title=\"Nacionales\",Antena 3 HD"
        );

        assert_eq!(result.summary.probed, 3);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.summary.guide_resolved, 2);
        assert_eq!(result.summary.numbered, 2);
        assert_eq!(result.failed[0].display_name, "Caido");

        let text = render_output(&playlist, &result, OutputTarget::NewFile);
        assert_eq!(
            text,
            "#EXTM3U x-tvg-url=\"http://guia.example/epg.xml\"\n\
# Lista de prueba\n\
#EXTINF:-1 tvg-id=\"La1.es\" tvg-chno=\"1\" tvg-logo=\"la1.png\",La 1\n\
http://example.com/la1\n\
#EXTINF:-1 tvg-id=\"Antena3.es\" tvg-chno=\"3\" group-title=\"Nacionales\",Antena 3 HD\n\
http://example.com/a3\n"
        );
    }

    #[test]
    fn test_empty_guide_still_numbers_without_ids() {
        let playlist = parse_playlist(INPUT);
        let report = report_for(&playlist, &[]);
        let index = GuideIndex::new();
        let matcher = GuideMatcher::new(&index);
        let table = sample_table();

        let result = ReconcilePipeline::new(&table, DuplicatePolicy::KeepAll, 1)
            .run(report, &matcher)
            .expect("run pipeline");

        let numbers: Vec<u32> = result.channels.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        for channel in &result.channels {
            assert!(!channel.metadata_line.contains("tvg-id="));
            assert!(channel.metadata_line.contains("tvg-chno="));
        }
        assert_eq!(result.summary.guide_resolved, 0);
    }

    #[test]
    fn test_dedup_applied_before_numbering() {
        let input = "#EXTINF:-1,Neox SD\nhttp://a\n#EXTINF:-1,Neox HD\nhttp://b\n#EXTINF:-1,Clan\nhttp://c\n";
        let playlist = parse_playlist(input);
        let report = report_for(&playlist, &[]);
        let index = GuideIndex::new();
        let matcher = GuideMatcher::new(&index);
        let table = PriorityTable::default();

        let result = ReconcilePipeline::new(&table, DuplicatePolicy::KeepBestQuality, 10)
            .run(report, &matcher)
            .expect("run pipeline");

        assert_eq!(result.summary.reachable, 3);
        assert_eq!(result.summary.after_dedup, 2);
        let urls: Vec<&str> = result.channels.iter().map(|c| c.url_line.as_str()).collect();
        // "clan" < "neox"
        assert_eq!(urls, vec!["http://c", "http://b"]);
        assert_eq!(result.channels[0].number, 10);
        assert_eq!(result.channels[1].number, 11);
    }

    #[test]
    fn test_reserved_numbers_are_skipped() {
        let playlist = parse_playlist(INPUT);
        let report = report_for(&playlist, &["http://example.com/caido"]);
        let index = GuideIndex::new();
        let matcher = GuideMatcher::new(&index);
        let table = sample_table();

        let result = ReconcilePipeline::new(&table, DuplicatePolicy::KeepAll, 1)
            .with_reserved(&[1])
            .run(report, &matcher)
            .expect("run pipeline");

        let numbers: Vec<u32> = result.channels.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![2, 3]);
    }

    #[test]
    fn test_header_rules() {
        let with_header = parse_playlist(INPUT);
        let without_header = parse_playlist("#EXTINF:-1,La 1\nhttp://example.com/la1\n");
        let result = PipelineResult {
            channels: Vec::new(),
            failed: Vec::new(),
            summary: RunSummary::default(),
        };

        assert!(render_output(&without_header, &result, OutputTarget::NewFile).starts_with("#EXTM3U\n"));
        assert_eq!(render_output(&without_header, &result, OutputTarget::Overwrite), "");
        assert!(render_output(&with_header, &result, OutputTarget::Overwrite)
            .starts_with("#EXTM3U x-tvg-url="));
    }
}
