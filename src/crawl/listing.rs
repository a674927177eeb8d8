//! 文献列表变体：把检索结果逐页抓成记录序列

use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::app::config::AppConfig;
use crate::browser::driver::Driver;
use crate::core::types::Task;
use crate::crawl::schema::RecordSchema;
use crate::crawl::{selectors, setup_search};
use crate::error::{CrawlError, SessionError};

/// 跑完一个列表任务的状态机，返回抓到的全部记录。
/// 翻页的正常结束条件是下一页按键限时内不可点击（结果翻完了），这是成功；
/// 零条记录按失败处理，真实期刊的空结果集更可能是上游配置出了问题。
pub async fn crawl_listing<D: Driver>(
    drv: &D,
    cfg: &AppConfig,
    schema: &RecordSchema,
    task: &Task,
) -> Result<Vec<Vec<String>>, CrawlError> {
    setup_search(drv, cfg, task).await?;
    select_page_size(drv, cfg).await?;

    let w = &cfg.waits;
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut page_cnt: u32 = 0;

    loop {
        page_cnt += 1;
        let rows = drv
            .find_all(&selectors::result_rows())
            .await
            .map_err(|e| CrawlError::step("定位结果表格行", e))?;
        for row in &rows {
            records.push(schema.extract_row(drv, row).await?);
        }

        // 下一页按键等不到即翻页结束
        let next = match drv
            .wait_clickable(&selectors::next_page_button(), w.clickable())
            .await
        {
            Ok(el) => el,
            Err(SessionError::Timeout { .. }) => break,
            Err(e) => return Err(CrawlError::step("等待下一页按键", e)),
        };

        drv.scroll_into_view(&next)
            .await
            .map_err(|e| CrawlError::step("滚动到下一页按键", e))?;
        let marker = drv
            .find(&selectors::current_page_label())
            .await
            .map_err(|e| CrawlError::step("定位当前页码标签", e))?;
        drv.click(&next)
            .await
            .map_err(|e| CrawlError::step("点击下一页", e))?;

        // 连续翻页会触发验证码，按固定间隔冷却
        if cfg.crawl.cooldown_every_pages > 0 && page_cnt % cfg.crawl.cooldown_every_pages == 0 {
            debug!("已翻 {} 页，冷却 {} 秒", page_cnt, cfg.crawl.cooldown_secs);
            sleep(Duration::from_secs(cfg.crawl.cooldown_secs)).await;
        }

        drv.wait_stale(&marker, w.stale())
            .await
            .map_err(|e| CrawlError::step("等待翻页后的列表刷新", e))?;
    }

    if records.is_empty() {
        return Err(CrawlError::ZeroResult);
    }
    Ok(records)
}

/// 把每页条数切到配置值，以旧的条数标签失效为刷新完成信号
async fn select_page_size<D: Driver>(drv: &D, cfg: &AppConfig) -> Result<(), CrawlError> {
    let w = &cfg.waits;

    let dropdown = drv
        .find(&selectors::page_size_dropdown())
        .await
        .map_err(|e| CrawlError::step("定位每页条数下拉框", e))?;
    drv.scroll_into_view(&dropdown)
        .await
        .map_err(|e| CrawlError::step("滚动到每页条数下拉框", e))?;
    drv.click(&dropdown)
        .await
        .map_err(|e| CrawlError::step("展开每页条数下拉框", e))?;

    let option = drv
        .wait_clickable(&selectors::page_size_option(cfg.crawl.page_size), w.clickable())
        .await
        .map_err(|e| CrawlError::step("等待每页条数选项加载", e))?;
    let marker = drv
        .find(&selectors::page_size_label())
        .await
        .map_err(|e| CrawlError::step("定位每页条数标签", e))?;
    drv.click(&option)
        .await
        .map_err(|e| CrawlError::step("点击每页条数选项", e))?;
    drv.wait_stale(&marker, w.stale())
        .await
        .map_err(|e| CrawlError::step("等待切换每页条数后的刷新", e))?;
    Ok(())
}
