//! 发表数量变体：不抓逐篇列表，只读发表年度筛选面板里各年的计数，
//! 一个任务产出一行

use tracing::info;

use crate::app::config::AppConfig;
use crate::browser::driver::Driver;
use crate::core::types::{Task, YearCountRow};
use crate::crawl::wait_policy::{LookupMode, WaitThenProbe};
use crate::crawl::{selectors, setup_search};
use crate::error::{CrawlError, SessionError};
use crate::utils::text::parse_paren_count;

pub async fn crawl_publish_numbers<D: Driver>(
    drv: &D,
    cfg: &AppConfig,
    task: &Task,
) -> Result<YearCountRow, CrawlError> {
    let expected_total = setup_search(drv, cfg, task).await?;

    let w = &cfg.waits;
    let header = drv
        .wait_clickable(&selectors::year_facet_header(), w.clickable())
        .await
        .map_err(|e| CrawlError::step("等待发表年度分组加载", e))?;

    // 只在折叠状态下点击；展开状态下再点会把分组折回去
    let parent_class = drv
        .parent_attribute(&header, "class")
        .await
        .map_err(|e| CrawlError::step("读取发表年度分组状态", e))?;
    if parent_class.as_deref() == Some(selectors::YEAR_FACET_FOLDED_CLASS) {
        drv.script_click(&header)
            .await
            .map_err(|e| CrawlError::step("展开发表年度分组", e))?;
    }

    let facet_list = drv
        .wait_visible(&selectors::year_facet_list(), w.visible())
        .await
        .map_err(|e| CrawlError::step("等待发表年度列表显示", e))?;
    // 列表默认只展开一部分，悬浮其上让它完全展开
    drv.hover(&facet_list)
        .await
        .map_err(|e| CrawlError::step("悬浮发表年度列表", e))?;

    let mut policy = WaitThenProbe::new(cfg.crawl.checkpoint_year);
    let mut counts: Vec<(i32, i64)> = Vec::new();
    let mut actual_total: i64 = 0;

    for year in task.year_start..=task.year_end {
        let loc = selectors::year_count_label(year);
        let label = match policy.mode_for(year) {
            LookupMode::FullWait => match drv.wait_visible(&loc, w.visible()).await {
                Ok(el) => Some(el),
                Err(SessionError::Timeout { .. }) => {
                    info!("期刊 {} 在 {} 年没有检索到文献", task.journal, year);
                    policy.note_timeout();
                    None
                }
                Err(e) => {
                    return Err(CrawlError::step(format!("等待 {year} 年计数标签"), e));
                }
            },
            LookupMode::Probe => drv.find(&loc).await.ok(),
        };

        // 缺失的年份计 0，不算错误
        let count = match label {
            Some(el) => {
                let text = drv
                    .read_text(&el)
                    .await
                    .map_err(|e| CrawlError::step(format!("读取 {year} 年计数"), e))?;
                parse_paren_count(&text)
                    .ok_or_else(|| CrawlError::Parse(format!("无法解析年度计数: {text:?}")))?
            }
            None => 0,
        };
        actual_total += count;
        counts.push((year, count));
    }

    // 年度计数来自筛选面板，总数来自结果栏，两边独立取得；
    // 不一致说明面板被站点静默截断了，这一行不能落盘
    if actual_total != expected_total {
        return Err(CrawlError::CountMismatch {
            expected: expected_total,
            actual: actual_total,
        });
    }

    Ok(YearCountRow {
        journal: task.journal.clone(),
        counts,
        total: expected_total,
    })
}
