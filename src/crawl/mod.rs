pub mod aggregate;
pub mod listing;
pub mod schema;
pub mod selectors;
pub mod wait_policy;

use tracing::debug;

use crate::app::config::AppConfig;
use crate::browser::driver::Driver;
use crate::core::types::Task;
use crate::error::CrawlError;
use crate::utils::text::parse_grouped_int;

/// 两个爬取变体共享的检索条件设置：从首页一路走到检索结果出现。
/// 返回结果栏报告的文献总数。
///
/// 顺序严格固定，每一步都是「等条件、做动作」一对；面板刷新一律以
/// 之前捕获的标记元素失效为完成信号，而不是定长延时。
pub(crate) async fn setup_search<D: Driver>(
    drv: &D,
    cfg: &AppConfig,
    task: &Task,
) -> Result<i64, CrawlError> {
    let w = &cfg.waits;

    drv.open(&cfg.base_url)
        .await
        .map_err(|e| CrawlError::step("打开首页", e))?;

    let link = drv
        .wait_clickable(&selectors::advanced_search_link(), w.clickable())
        .await
        .map_err(|e| CrawlError::step("等待高级检索按键加载", e))?;
    drv.click(&link)
        .await
        .map_err(|e| CrawlError::step("点击高级检索", e))?;
    drv.switch_to_new_window()
        .await
        .map_err(|e| CrawlError::step("切换到高级检索窗口", e))?;

    // 先抓住文献来源标签再点学术期刊：点击会重建整个输入面板，
    // 旧标签失效即刷新完成
    let marker = drv
        .find(&selectors::source_field_label())
        .await
        .map_err(|e| CrawlError::step("定位文献来源标签", e))?;
    let doctype = drv
        .wait_clickable(&selectors::journal_doctype_button(), w.clickable())
        .await
        .map_err(|e| CrawlError::step("等待学术期刊按键加载", e))?;
    drv.script_click(&doctype)
        .await
        .map_err(|e| CrawlError::step("点击学术期刊按键", e))?;
    drv.wait_stale(&marker, w.stale())
        .await
        .map_err(|e| CrawlError::step("等待点击学术期刊后的刷新", e))?;

    let journal_input = drv
        .wait_present(&selectors::journal_name_input(), w.present())
        .await
        .map_err(|e| CrawlError::step("等待期刊名称输入框加载", e))?;
    drv.send_text(&journal_input, &task.journal)
        .await
        .map_err(|e| CrawlError::step("输入期刊名称", e))?;

    let start_input = drv
        .find(&selectors::year_start_input())
        .await
        .map_err(|e| CrawlError::step("定位起始年输入框", e))?;
    drv.send_text(&start_input, &task.year_start.to_string())
        .await
        .map_err(|e| CrawlError::step("输入起始年", e))?;

    let end_input = drv
        .find(&selectors::year_end_input())
        .await
        .map_err(|e| CrawlError::step("定位结束年输入框", e))?;
    drv.send_text(&end_input, &task.year_end.to_string())
        .await
        .map_err(|e| CrawlError::step("输入结束年", e))?;

    let search = drv
        .find(&selectors::search_button())
        .await
        .map_err(|e| CrawlError::step("定位检索键", e))?;
    drv.click(&search)
        .await
        .map_err(|e| CrawlError::step("点击检索", e))?;

    // 结果总数标签出现即检索刷新完成
    let total_el = drv
        .wait_visible(&selectors::total_count_label(), w.visible())
        .await
        .map_err(|e| CrawlError::step("等待检索结果总数标签", e))?;
    let text = drv
        .read_text(&total_el)
        .await
        .map_err(|e| CrawlError::step("读取检索结果总数", e))?;
    let total = parse_grouped_int(&text)
        .ok_or_else(|| CrawlError::Parse(format!("无法解析检索结果总数: {text:?}")))?;
    debug!("检索结果总数: {}", total);
    Ok(total)
}
