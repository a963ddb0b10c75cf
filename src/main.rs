use std::process::ExitCode;

use clap::Parser;
use m3u_tuner::cli::{run, Args};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("处理失败: {:#}", err);
            eprintln!("错误: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
