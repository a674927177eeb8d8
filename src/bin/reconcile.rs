use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::info;

use crawl_cnki::app::config::AppConfig;
use crawl_cnki::{logger, merge, source};

/// 对账与合并：隔离多余产出、报告缺失、按期刊合并列表产出、
/// 汇总发表数量并核对两个来源的计数
#[derive(Parser, Debug)]
#[command(name = "reconcile", override_usage = "reconcile <start> <end>")]
struct Args {
    /// 期刊清单起始行（含）
    start: usize,
    /// 期刊清单结束行（含）
    end: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(Path::new("reconcile.log"))?;

    let cfg = AppConfig::load(None)?;
    source::ensure_journal_list(
        Path::new(&cfg.paths.journal_spreadsheet),
        Path::new(&cfg.paths.journal_list),
    )?;
    let journals = source::read_range(Path::new(&cfg.paths.journal_list), args.start, args.end)?;

    let listing_dir = Path::new(&cfg.paths.listing_output_dir);
    let aggregate_dir = Path::new(&cfg.paths.aggregate_output_dir);
    let merged_dir = Path::new(&cfg.paths.merged_output_dir);
    let quarantine_dir = Path::new(&cfg.paths.quarantine_dir);

    let expected = merge::expected_listing_files(&journals, cfg.crawl.buckets().len());
    let (extra, missing) = merge::find_extra_missing(listing_dir, &expected, quarantine_dir)?;
    info!("extra files: {:?}", extra);
    info!("missing files: {:?}", missing);

    merge::merge_listing_artifacts(listing_dir, merged_dir)?;
    merge::merge_aggregate_artifacts(aggregate_dir, merged_dir)?;

    let invalid = merge::check_publish_numbers(merged_dir, aggregate_dir)?;
    info!("发表数量不一致的期刊: {:?}", invalid);

    Ok(())
}
