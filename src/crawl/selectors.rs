//! 高级检索页面的元素定位，集中放在一处，站点改版时只改这里

use crate::browser::driver::Locator;

pub fn advanced_search_link() -> Locator {
    Locator::link_text("高级检索")
}

/// 文献来源输入区的标签。点击学术期刊后整个面板重建，
/// 用它的失效作为刷新完成的信号
pub fn source_field_label() -> Locator {
    Locator::css("#gradetxt dd:nth-child(3) .input-box span")
}

pub fn journal_doctype_button() -> Locator {
    Locator::css("ul.doctype-menus.keji li[data-id=\"xsqk\"] a span")
}

pub fn journal_name_input() -> Locator {
    Locator::css("#gradetxt dd:nth-child(3) .input-box input")
}

pub fn year_start_input() -> Locator {
    Locator::css("input[placeholder=\"起始年\"]")
}

pub fn year_end_input() -> Locator {
    Locator::css("input[placeholder=\"结束年\"]")
}

pub fn search_button() -> Locator {
    Locator::css("input[value=\"检索\"]")
}

pub fn total_count_label() -> Locator {
    Locator::css("#countPageDiv span:first-child em")
}

pub fn page_size_dropdown() -> Locator {
    Locator::css("#perPageDiv div")
}

pub fn page_size_option(size: u32) -> Locator {
    Locator::css(format!("#perPageDiv ul li[data-val=\"{size}\"]"))
}

/// 当前每页条数的标签，切换条数后随列表一起重建
pub fn page_size_label() -> Locator {
    Locator::css("#perPageDiv span")
}

pub fn result_rows() -> Locator {
    Locator::css("#gridTable table tbody tr")
}

pub const ROW_CELLS: &str = "td";
pub const CELL_LINK: &str = "a";

pub fn next_page_button() -> Locator {
    Locator::css("#PageNext")
}

pub fn current_page_label() -> Locator {
    Locator::css("span.cur")
}

pub fn year_facet_header() -> Locator {
    Locator::css("dt[groupitem=\"发表年度\"]")
}

/// 发表年度分组折叠时父节点的 class 值
pub const YEAR_FACET_FOLDED_CLASS: &str = "is-up-fold off";

pub fn year_facet_list() -> Locator {
    Locator::css("dd[tit=\"发表年度\"] div")
}

pub fn year_count_label(year: i32) -> Locator {
    Locator::css(format!(
        "input[type=\"checkbox\"][value=\"{year}\"] + span"
    ))
}
