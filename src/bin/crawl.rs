use anyhow::Result;
use clap::Parser;
use std::fs;
use std::path::Path;
use tracing::info;

use crawl_cnki::app::config::AppConfig;
use crawl_cnki::crawl::schema::RecordSchema;
use crawl_cnki::{logger, runner, source};

/// 按期刊清单区间爬取文献列表，一个期刊 × 一个年份桶产出一个文件
#[derive(Parser, Debug)]
#[command(name = "crawl", override_usage = "crawl <start> <end>")]
struct Args {
    /// 期刊清单起始行（含）
    start: usize,
    /// 期刊清单结束行（含）
    end: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(Path::new("crawl.log"))?;
    info!("{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));

    let cfg = AppConfig::load(None)?;
    source::ensure_journal_list(
        Path::new(&cfg.paths.journal_spreadsheet),
        Path::new(&cfg.paths.journal_list),
    )?;
    let journals = source::read_range(Path::new(&cfg.paths.journal_list), args.start, args.end)?;

    let output_dir = Path::new(&cfg.paths.listing_output_dir);
    fs::create_dir_all(output_dir)?;

    let schema = RecordSchema::listing(&cfg.crawl.study_window);
    schema
        .validate()
        .map_err(|e| anyhow::anyhow!("列模式配置无效: {e}"))?;

    let tasks = source::build_listing_tasks(&journals, &cfg.crawl.buckets(), output_dir);
    let stats = runner::run_tasks(tasks, |task| runner::run_listing_task(&cfg, &schema, task)).await;

    info!("{}", stats.summary_line());
    Ok(())
}
