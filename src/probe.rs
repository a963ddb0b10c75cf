//! 频道连通性检测
//!
//! 每个 URL 独立检测，有并发上限与单次超时；失败与超时等价（不可达）。
//! 取消标志置位后不再启动新的检测，已在进行中的检测自然结束。

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};

use crate::playlist::{ChannelCandidate, FailedChannel, RawEntry};

/// 连通性检测器
pub trait Prober: Sync {
    /// 返回 URL 是否可达
    fn probe(&self, url: &str) -> impl Future<Output = bool> + Send;
}

/// 基于 HTTP GET 的检测器：在超时内返回 2xx 即视为可达
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self { client })
    }
}

impl Prober for HttpProber {
    fn probe(&self, url: &str) -> impl Future<Output = bool> + Send {
        let request = self.client.get(url);
        let url = url.to_string();
        async move {
            // 只等待响应头，不读取流内容
            match request.send().await {
                Ok(response) => is_reachable_status(response.status()),
                Err(err) => {
                    tracing::debug!("检测失败 {}: {}", url, err);
                    false
                }
            }
        }
    }
}

/// 2xx 视为可达
pub fn is_reachable_status(status: StatusCode) -> bool {
    status.is_success()
}

/// 单个条目的检测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
    /// 取消后未检测
    Skipped,
}

/// 检测阶段汇总
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    /// 可达频道（文件顺序）
    pub reachable: Vec<ChannelCandidate>,
    /// 不可达频道（文件顺序）
    pub failed: Vec<FailedChannel>,
    /// 因取消而未检测的条目数
    pub skipped: usize,
    /// 检测过程中是否收到取消信号
    pub cancelled: bool,
}

impl ProbeReport {
    /// 实际完成检测的条目数
    pub fn probed(&self) -> usize {
        self.reachable.len() + self.failed.len()
    }
}

/// 并发检测全部条目
///
/// 结果按条目原始顺序汇总，与检测完成顺序无关
pub async fn probe_entries<P: Prober>(
    prober: &P,
    entries: &[RawEntry],
    concurrency: usize,
    cancel: &AtomicBool,
) -> ProbeReport {
    let concurrency = concurrency.max(1);
    let total = entries.len();
    tracing::info!("开始检测 {} 个频道 (并发 {})", total, concurrency);

    let outcomes: Vec<(usize, ProbeOutcome)> = stream::iter(entries.iter().enumerate())
        .map(|(idx, entry)| async move {
            if cancel.load(Ordering::SeqCst) {
                return (idx, ProbeOutcome::Skipped);
            }

            let url = entry.url();
            let outcome = if prober.probe(url).await {
                ProbeOutcome::Reachable
            } else {
                ProbeOutcome::Unreachable
            };

            let name = entry.display_name();
            match outcome {
                ProbeOutcome::Reachable => tracing::info!("[{}/{}] {} ({}) ... OK", idx + 1, total, name, url),
                _ => tracing::warn!("[{}/{}] {} ({}) ... 失败", idx + 1, total, name, url),
            }
            (idx, outcome)
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut ordered = vec![ProbeOutcome::Skipped; total];
    for (idx, outcome) in outcomes {
        ordered[idx] = outcome;
    }

    let mut report = ProbeReport {
        cancelled: cancel.load(Ordering::SeqCst),
        ..ProbeReport::default()
    };
    for (entry, outcome) in entries.iter().zip(ordered) {
        match outcome {
            ProbeOutcome::Reachable => report.reachable.push(ChannelCandidate::from_entry(entry)),
            ProbeOutcome::Unreachable => report.failed.push(FailedChannel {
                display_name: entry.display_name(),
                url: entry.url().to_string(),
            }),
            ProbeOutcome::Skipped => report.skipped += 1,
        }
    }

    tracing::info!(
        "检测完成: 可达 {}, 失败 {}, 跳过 {}",
        report.reachable.len(),
        report.failed.len(),
        report.skipped
    );
    report
}

/// 监听 Ctrl-C，收到后置位取消标志
pub fn spawn_ctrl_c_listener(cancel: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("收到中断信号，停止启动新的检测");
                cancel.store(true, Ordering::SeqCst);
            }
            Err(err) => tracing::warn!("无法监听中断信号: {}", err),
        }
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::Prober;

    /// 按 URL 集合判定可达性的检测器
    pub(crate) struct FakeProber {
        reachable: HashSet<String>,
        pub(crate) calls: AtomicUsize,
        /// 第 N 次检测时置位取消标志
        pub(crate) cancel_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl FakeProber {
        pub(crate) fn new(reachable: &[&str]) -> Self {
            Self {
                reachable: reachable.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
                cancel_after: None,
            }
        }
    }

    impl Prober for FakeProber {
        fn probe(&self, url: &str) -> impl Future<Output = bool> + Send {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, flag)) = &self.cancel_after {
                if calls >= *limit {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            let ok = self.reachable.contains(url);
            async move {
                tokio::task::yield_now().await;
                ok
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeProber;
    use super::*;

    fn entries(names: &[&str]) -> Vec<RawEntry> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| RawEntry {
                position: i,
                metadata_line: format!("#EXTINF:-1,{}", name),
                url_line: format!("http://example.com/{}", i),
            })
            .collect()
    }

    #[test]
    fn test_reachable_status() {
        assert!(is_reachable_status(StatusCode::OK));
        assert!(is_reachable_status(StatusCode::NO_CONTENT));
        assert!(!is_reachable_status(StatusCode::FOUND));
        assert!(!is_reachable_status(StatusCode::NOT_FOUND));
        assert!(!is_reachable_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_http_prober_builds() {
        assert!(HttpProber::new(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_probe_entries_splits_and_keeps_order() {
        let prober = FakeProber::new(&[
            "http://example.com/0",
            "http://example.com/2",
            "http://example.com/3",
        ]);
        let input = entries(&["La 1", "Caido", "Neox", "Clan"]);
        let cancel = AtomicBool::new(false);

        let report = probe_entries(&prober, &input, 3, &cancel).await;

        let names: Vec<&str> = report.reachable.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(names, vec!["La 1", "Neox", "Clan"]);
        assert_eq!(
            report.failed,
            vec![FailedChannel {
                display_name: "Caido".to_string(),
                url: "http://example.com/1".to_string(),
            }]
        );
        assert_eq!(report.probed(), 4);
        assert_eq!(report.skipped, 0);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let prober = FakeProber::new(&["http://example.com/0"]);
        let input = entries(&["La 1", "La 2"]);
        let cancel = AtomicBool::new(true);

        let report = probe_entries(&prober, &input, 2, &cancel).await;

        assert!(report.cancelled);
        assert_eq!(report.skipped, 2);
        assert!(report.reachable.is_empty());
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_midway_keeps_probed_channels() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut prober = FakeProber::new(&["http://example.com/0", "http://example.com/1"]);
        prober.cancel_after = Some((2, flag.clone()));
        let input = entries(&["La 1", "La 2", "Neox", "Clan"]);

        // 并发为 1：第二次检测后置位，后两个条目被跳过
        let report = probe_entries(&prober, &input, 1, &flag).await;

        assert!(report.cancelled);
        assert_eq!(report.reachable.len(), 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2);
    }
}
