//! 任务循环：顺序执行、按产出文件跳过、统计与进度输出。
//! 失败不回滚，下次运行自然重试；产出文件的存在是唯一的跨进程协调手段。

use std::future::Future;
use tracing::{info, warn};

use crate::app::config::AppConfig;
use crate::browser::BrowserSession;
use crate::core::types::{RunStats, Task};
use crate::crawl;
use crate::crawl::schema::RecordSchema;
use crate::error::CrawlError;
use crate::proxy::ProxyBroker;
use crate::storage::artifact;

/// 顺序跑完一组任务。产出文件已存在的直接跳过；
/// 每个非跳过任务之后输出一条进度
pub async fn run_tasks<F, Fut>(tasks: Vec<Task>, mut execute: F) -> RunStats
where
    F: FnMut(Task) -> Fut,
    Fut: Future<Output = Result<usize, CrawlError>>,
{
    let mut stats = RunStats::start(tasks.len());
    for task in tasks {
        if task.output.is_file() {
            stats.skipped += 1;
            continue;
        }
        stats.attempted += 1;
        match execute(task.clone()).await {
            Ok(n) => {
                stats.succeeded += 1;
                info!("✅ 任务 {} 完成，共 {} 条", task.ident(), n);
            }
            Err(e) => {
                stats.failed += 1;
                warn!("❌ 任务 {} 失败 [{}]: {}", task.ident(), e.kind(), e);
            }
        }
        info!("{}", stats.progress_line());
    }
    stats
}

/// 执行一个列表任务：租代理（可选）→ 开会话 → 跑状态机 → 关会话 → 落盘
pub async fn run_listing_task(
    cfg: &AppConfig,
    schema: &RecordSchema,
    task: Task,
) -> Result<usize, CrawlError> {
    info!(
        "Start crawling papers from {} published during {} - {}",
        task.journal, task.year_start, task.year_end
    );

    let proxy = lease_proxy_if_enabled(cfg).await?;
    let session = BrowserSession::launch(&cfg.browser, &cfg.waits, proxy.as_deref())
        .await
        .map_err(|e| CrawlError::step("启动浏览器会话", e))?;

    let result = crawl::listing::crawl_listing(&session, cfg, schema, &task).await;
    // 无论成败都关闭会话，不把站点会话状态带进下一个任务
    session.close().await;

    let records = result?;
    artifact::save_rows(&task.output, &schema.headers(), &records)
        .map_err(|e| CrawlError::Storage(e.to_string()))?;

    info!(
        "Finish crawling papers from {} published in year: {} - {}, number of papers: {}",
        task.journal,
        task.year_start,
        task.year_end,
        records.len()
    );
    Ok(records.len())
}

/// 执行一个发表数量任务，产出恰好一行
pub async fn run_aggregate_task(cfg: &AppConfig, task: Task) -> Result<usize, CrawlError> {
    info!(
        "Start crawling publish number of journal {} during {} - {}",
        task.journal, task.year_start, task.year_end
    );

    let proxy = lease_proxy_if_enabled(cfg).await?;
    let session = BrowserSession::launch(&cfg.browser, &cfg.waits, proxy.as_deref())
        .await
        .map_err(|e| CrawlError::step("启动浏览器会话", e))?;

    let result = crawl::aggregate::crawl_publish_numbers(&session, cfg, &task).await;
    session.close().await;

    let row = result?;
    artifact::save_year_count(&task.output, &row)
        .map_err(|e| CrawlError::Storage(e.to_string()))?;

    info!(
        "Finish crawling publish number of journal {} during {} - {}, expected number of papers: {}",
        task.journal, task.year_start, task.year_end, row.total
    );
    Ok(1)
}

async fn lease_proxy_if_enabled(cfg: &AppConfig) -> Result<Option<String>, CrawlError> {
    if !cfg.proxy.enabled {
        return Ok(None);
    }
    let broker = ProxyBroker::new(cfg.proxy.clone()).map_err(|e| CrawlError::Proxy(e.to_string()))?;
    let proxy = broker
        .lease_validated()
        .await
        .map_err(|e| CrawlError::Proxy(e.to_string()))?;
    Ok(Some(proxy))
}
