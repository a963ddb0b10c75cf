// 命令行入口
//
// 加载配置 → 命令行覆盖 → 加载 EPG 与优先表 → 检测 → 整理 → 写回

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{normalize_output_path, ProcessorConfig};
use crate::guide_source::load_guide_index;
use crate::matching::{GuideIndex, GuideMatcher};
use crate::pipeline::{render_output, OutputTarget, ReconcilePipeline, RunSummary};
use crate::playlist::{read_playlist, write_atomic, FailedChannel};
use crate::probe::{probe_entries, spawn_ctrl_c_listener, HttpProber, Prober};
use crate::reconcile::{DuplicatePolicy, PriorityTable};

/// 检测 IPTV 播放列表中的失效频道，并按编号约定与 EPG 整理 tvg-chno / tvg-id
#[derive(Parser, Debug)]
#[command(name = "m3u-tuner", version)]
pub struct Args {
    /// 输入播放列表 (.m3u / .m3u8)
    pub input: Option<PathBuf>,

    /// 输出文件；不指定时覆盖输入文件
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 单个频道检测超时（秒）
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// 顺序编号起始值
    #[arg(short, long)]
    pub start: Option<u32>,

    /// 重复频道处理: all | first | quality
    #[arg(short, long, value_parser = parse_policy)]
    pub policy: Option<DuplicatePolicy>,

    /// EPG 地址或本地 XMLTV 文件（支持 gzip）
    #[arg(long, conflicts_with = "no_guide")]
    pub guide: Option<String>,

    /// 不匹配 EPG
    #[arg(long)]
    pub no_guide: bool,

    /// 同时进行的检测数
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// 自定义优先表 (JSON: [{"name": "La 1", "number": 1}, ...])
    #[arg(long)]
    pub priority_table: Option<PathBuf>,

    /// 保留号码（逗号分隔），不参与分配
    #[arg(long = "reserve", value_delimiter = ',')]
    pub reserve: Vec<u32>,

    /// 覆盖输入时直接删除失败频道并写回，不再询问
    #[arg(long)]
    pub auto_delete_failed: bool,

    /// 对所有确认提示回答“是”
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// 配置文件路径
    #[arg(long, env = "M3U_TUNER_CONFIG")]
    pub config: Option<PathBuf>,

    /// 保存本次生效的配置
    #[arg(long)]
    pub save_config: bool,

    /// 输出调试日志
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// 只输出警告与错误
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_policy(value: &str) -> Result<DuplicatePolicy, String> {
    value.parse::<DuplicatePolicy>().map_err(|e| e.to_string())
}

impl Args {
    /// 用命令行参数覆盖配置
    pub fn apply_to(&self, config: &mut ProcessorConfig) {
        if let Some(input) = &self.input {
            config.input_path = Some(input.clone());
        }
        if let Some(output) = &self.output {
            config.output_path = normalize_output_path(output);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_seconds = timeout;
        }
        if let Some(start) = self.start {
            config.start_channel_number = start;
        }
        if let Some(policy) = self.policy {
            config.duplicate_policy = policy;
        }
        if self.no_guide {
            config.guide_url = None;
        } else if let Some(guide) = &self.guide {
            config.guide_url = Some(guide.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(path) = &self.priority_table {
            config.priority_table_path = Some(path.clone());
        }
        if !self.reserve.is_empty() {
            config.reserved_numbers = self.reserve.clone();
        }
        if self.auto_delete_failed {
            config.auto_delete_failed = true;
        }
    }

    fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// 覆盖输入文件时的写回决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBack {
    /// 无变化，不写
    Skip,
    Write,
    /// 询问用户
    Ask,
}

pub fn write_back_decision(summary: &RunSummary, auto_delete_failed: bool, assume_yes: bool) -> WriteBack {
    if !summary.has_changes() {
        WriteBack::Skip
    } else if auto_delete_failed || assume_yes {
        WriteBack::Write
    } else {
        WriteBack::Ask
    }
}

/// y / yes / s / si 视为肯定
pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "s" | "si" | "sí" | "是"
    )
}

/// 询问 y/n
///
/// 读取 stdin 在阻塞线程中进行；等待回答时收到 Ctrl-C 即以 130 退出，不写入任何更改
async fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    print!("{} (y/n): ", question);
    std::io::stdout().flush()?;

    let answer = tokio::task::spawn_blocking(read_answer);
    tokio::select! {
        answer = answer => {
            // stdin 已关闭时视为否
            Ok(answer??.is_some_and(|answer| is_affirmative(&answer)))
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n操作已中断，未写入任何更改");
            std::process::exit(130);
        }
    }
}

fn read_answer() -> std::io::Result<Option<String>> {
    let mut answer = String::new();
    let read = std::io::stdin().read_line(&mut answer)?;
    Ok((read > 0).then_some(answer))
}

fn init_logging(level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn load_config(args: &Args) -> Result<ProcessorConfig> {
    let mut config = match &args.config {
        Some(path) => ProcessorConfig::load_from(path)?,
        None => match ProcessorConfig::load() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("加载默认配置失败，使用默认值: {:#}", err);
                ProcessorConfig::new()
            }
        },
    };
    args.apply_to(&mut config);
    config.validate()?;

    if args.save_config {
        match &args.config {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
    }
    Ok(config)
}

fn print_failed(failed: &[FailedChannel]) {
    if failed.is_empty() {
        return;
    }
    println!("\n不可用的频道:");
    for channel in failed {
        println!("- {}: {}", channel.display_name, channel.url);
    }
}

pub async fn run(args: Args) -> Result<()> {
    init_logging(args.log_level());

    let config = load_config(&args)?;
    let prober = HttpProber::new(config.timeout())?;
    let cancel = Arc::new(AtomicBool::new(false));
    // 监听保持到流程结束，提示阶段的 Ctrl-C 由 confirm 处理
    let listener = spawn_ctrl_c_listener(cancel.clone());

    let result = run_with(&config, &prober, &cancel, args.yes).await;
    listener.abort();
    result
}

/// 按已生效的配置执行完整流程：检测 → 整理 → 写回
pub async fn run_with<P: Prober>(
    config: &ProcessorConfig,
    prober: &P,
    cancel: &AtomicBool,
    assume_yes: bool,
) -> Result<()> {
    let input = config
        .input_path
        .clone()
        .ok_or_else(|| anyhow::anyhow!("未指定输入播放列表"))?;

    let custom_table;
    let table: &PriorityTable = match &config.priority_table_path {
        Some(path) => {
            custom_table = PriorityTable::load(path)?;
            &custom_table
        }
        None => PriorityTable::spanish(),
    };

    let index = match &config.guide_url {
        Some(source) => load_guide_index(source, config.guide_timeout()).await,
        None => {
            tracing::info!("已禁用 EPG 匹配");
            GuideIndex::new()
        }
    };

    tracing::info!("读取播放列表: {}", input.display());
    let playlist = read_playlist(&input)?;
    if playlist.entries.is_empty() && playlist.other_lines.is_empty() {
        println!("播放列表为空: {}", input.display());
        return Ok(());
    }

    // ========== 检测 ==========
    tracing::info!("检测频道连通性 (超时 {}s)", config.timeout_seconds);
    let report = probe_entries(prober, &playlist.entries, config.concurrency, cancel).await;

    if report.cancelled {
        println!("\n频道检测已被中断 (已检测 {}, 未检测 {})", report.probed(), report.skipped);
        if !confirm("是否继续为已检测的频道分配 EPG/编号并保存?", assume_yes).await? {
            println!("操作已取消，未写入任何更改");
            return Ok(());
        }
    }

    // ========== 整理 ==========
    let matcher = GuideMatcher::new(&index);
    let result = ReconcilePipeline::new(table, config.duplicate_policy, config.start_channel_number)
        .with_reserved(&config.reserved_numbers)
        .run(report, &matcher)?;

    println!("\n{}", result.summary);
    print_failed(&result.failed);

    // ========== 写回 ==========
    let target = config.target_path().unwrap_or(&input);
    if !config.overwrites_input() {
        let content = render_output(&playlist, &result, OutputTarget::NewFile);
        write_atomic(target, &content)
            .with_context(|| format!("无法创建输出文件: {}", target.display()))?;
        println!("\n已创建新的播放列表: {}", target.display());
        if !result.failed.is_empty() {
            println!("失败的频道未写入新文件");
        }
        return Ok(());
    }

    let write = match write_back_decision(&result.summary, config.auto_delete_failed, assume_yes) {
        WriteBack::Skip => {
            println!("\n所有频道均可用且无需分配 tvg-id/tvg-chno，原文件未修改");
            return Ok(());
        }
        WriteBack::Write => true,
        WriteBack::Ask => {
            confirm(
                "\n已产生更改（分配 tvg-id/tvg-chno 和/或删除失败频道），是否保存到原文件?",
                false,
            )
            .await?
        }
    };

    if !write {
        println!("原文件未修改");
        return Ok(());
    }

    let content = render_output(&playlist, &result, OutputTarget::Overwrite);
    write_atomic(target, &content)
        .with_context(|| format!("无法写入原文件: {}", target.display()))?;
    println!("更改已保存到原文件: {}", target.display());
    Ok(())
}
