use anyhow::Result;
use clap::Parser;
use std::fs;
use std::path::Path;
use tracing::info;

use crawl_cnki::app::config::AppConfig;
use crawl_cnki::{logger, runner, source};

/// 按期刊清单区间爬取各年度发表数量，一个期刊产出一行
#[derive(Parser, Debug)]
#[command(name = "crawl_publish_num", override_usage = "crawl_publish_num <start> <end>")]
struct Args {
    /// 期刊清单起始行（含）
    start: usize,
    /// 期刊清单结束行（含）
    end: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(Path::new("crawl_publish_num.log"))?;
    info!("{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));

    let cfg = AppConfig::load(None)?;
    source::ensure_journal_list(
        Path::new(&cfg.paths.journal_spreadsheet),
        Path::new(&cfg.paths.journal_list),
    )?;
    let journals = source::read_range(Path::new(&cfg.paths.journal_list), args.start, args.end)?;

    let output_dir = Path::new(&cfg.paths.aggregate_output_dir);
    fs::create_dir_all(output_dir)?;

    let tasks = source::build_aggregate_tasks(&journals, cfg.crawl.aggregate_bucket(), output_dir);
    let stats = runner::run_tasks(tasks, |task| runner::run_aggregate_task(&cfg, task)).await;

    info!("{}", stats.summary_line());
    Ok(())
}
