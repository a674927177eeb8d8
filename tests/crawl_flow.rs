//! 用脚本化的假浏览器驱动跑完整的爬取状态机，
//! 不依赖真实浏览器验证翻页、提取、降级策略与计数校验

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

use crawl_cnki::app::config::AppConfig;
use crawl_cnki::browser::driver::{Driver, Locator};
use crawl_cnki::core::types::Task;
use crawl_cnki::crawl::schema::RecordSchema;
use crawl_cnki::crawl::{aggregate, listing, selectors};
use crawl_cnki::error::{CrawlError, SessionError};
use crawl_cnki::{runner, storage};

#[derive(Debug, Clone)]
struct FakeElem {
    key: String,
    epoch: u64,
}

#[derive(Debug)]
struct FakeState {
    epoch: u64,
    /// 当前页码，1 起
    page_no: usize,
    /// 每页的结果行数
    pages: Vec<usize>,
    /// 结果栏显示的总数文本
    total_text: String,
    /// 筛选面板里存在的年份及其计数
    years: BTreeMap<i32, i64>,
    year_range: (i32, i32),
    facet_parent_class: String,
    full_wait_years: Vec<i32>,
    probe_years: Vec<i32>,
    clicked: Vec<String>,
}

struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    fn listing(pages: Vec<usize>, total_text: &str) -> Self {
        Self {
            state: Mutex::new(FakeState {
                epoch: 0,
                page_no: 1,
                pages,
                total_text: total_text.to_string(),
                years: BTreeMap::new(),
                year_range: (2012, 2020),
                facet_parent_class: String::new(),
                full_wait_years: Vec::new(),
                probe_years: Vec::new(),
                clicked: Vec::new(),
            }),
        }
    }

    fn aggregate(years: BTreeMap<i32, i64>, total_text: &str, facet_class: &str) -> Self {
        Self {
            state: Mutex::new(FakeState {
                epoch: 0,
                page_no: 1,
                pages: vec![0],
                total_text: total_text.to_string(),
                years,
                year_range: (2012, 2020),
                facet_parent_class: facet_class.to_string(),
                full_wait_years: Vec::new(),
                probe_years: Vec::new(),
                clicked: Vec::new(),
            }),
        }
    }

    fn clicked(&self) -> Vec<String> {
        self.state.lock().expect("状态锁").clicked.clone()
    }

    fn full_wait_years(&self) -> Vec<i32> {
        self.state.lock().expect("状态锁").full_wait_years.clone()
    }

    fn probe_years(&self) -> Vec<i32> {
        self.state.lock().expect("状态锁").probe_years.clone()
    }
}

fn timeout(what: impl std::fmt::Display) -> SessionError {
    SessionError::Timeout {
        what: what.to_string(),
        after: Duration::from_secs(0),
    }
}

fn elem(st: &FakeState, key: impl Into<String>) -> FakeElem {
    FakeElem {
        key: key.into(),
        epoch: st.epoch,
    }
}

fn year_of(loc: &Locator, range: (i32, i32)) -> Option<i32> {
    (range.0..=range.1).find(|y| &selectors::year_count_label(*y) == loc)
}

fn key_parts(key: &str) -> Vec<&str> {
    key.split(':').collect()
}

#[async_trait]
impl Driver for FakeDriver {
    type Elem = FakeElem;

    async fn open(&self, _url: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn switch_to_new_window(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn wait_clickable(
        &self,
        loc: &Locator,
        _timeout: Duration,
    ) -> Result<FakeElem, SessionError> {
        let st = self.state.lock().expect("状态锁");
        if *loc == selectors::advanced_search_link() {
            return Ok(elem(&st, "adv"));
        }
        if *loc == selectors::journal_doctype_button() {
            return Ok(elem(&st, "doctype"));
        }
        if *loc == selectors::page_size_option(50) {
            return Ok(elem(&st, "li50"));
        }
        if *loc == selectors::next_page_button() {
            return if st.page_no < st.pages.len() {
                Ok(elem(&st, "next"))
            } else {
                Err(timeout(loc))
            };
        }
        if *loc == selectors::year_facet_header() {
            return Ok(elem(&st, "facet-header"));
        }
        Err(SessionError::NotFound(loc.to_string()))
    }

    async fn wait_present(
        &self,
        loc: &Locator,
        _timeout: Duration,
    ) -> Result<FakeElem, SessionError> {
        let st = self.state.lock().expect("状态锁");
        if *loc == selectors::journal_name_input() {
            return Ok(elem(&st, "journal-input"));
        }
        Err(SessionError::NotFound(loc.to_string()))
    }

    async fn wait_visible(
        &self,
        loc: &Locator,
        _timeout: Duration,
    ) -> Result<FakeElem, SessionError> {
        let mut st = self.state.lock().expect("状态锁");
        if *loc == selectors::total_count_label() {
            return Ok(elem(&st, "total"));
        }
        if *loc == selectors::year_facet_list() {
            return Ok(elem(&st, "facet-list"));
        }
        if let Some(year) = year_of(loc, st.year_range) {
            st.full_wait_years.push(year);
            return if st.years.contains_key(&year) {
                Ok(elem(&st, format!("year:{year}")))
            } else {
                Err(timeout(loc))
            };
        }
        Err(SessionError::NotFound(loc.to_string()))
    }

    async fn wait_stale(&self, el: &FakeElem, _timeout: Duration) -> Result<(), SessionError> {
        let st = self.state.lock().expect("状态锁");
        if el.epoch < st.epoch {
            Ok(())
        } else {
            Err(timeout(format!("stale {}", el.key)))
        }
    }

    async fn click(&self, el: &FakeElem) -> Result<(), SessionError> {
        let mut st = self.state.lock().expect("状态锁");
        st.clicked.push(el.key.clone());
        match el.key.as_str() {
            // 翻页与切每页条数都会重建列表，旧标记随之失效
            "next" => {
                st.epoch += 1;
                st.page_no += 1;
            }
            "li50" => st.epoch += 1,
            _ => {}
        }
        Ok(())
    }

    async fn script_click(&self, el: &FakeElem) -> Result<(), SessionError> {
        let mut st = self.state.lock().expect("状态锁");
        st.clicked.push(format!("script:{}", el.key));
        match el.key.as_str() {
            "doctype" => st.epoch += 1,
            "facet-header" => st.facet_parent_class = "is-up-fold".to_string(),
            _ => {}
        }
        Ok(())
    }

    async fn send_text(&self, _el: &FakeElem, _text: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn hover(&self, _el: &FakeElem) -> Result<(), SessionError> {
        Ok(())
    }

    async fn scroll_into_view(&self, _el: &FakeElem) -> Result<(), SessionError> {
        Ok(())
    }

    async fn find(&self, loc: &Locator) -> Result<FakeElem, SessionError> {
        let mut st = self.state.lock().expect("状态锁");
        if *loc == selectors::source_field_label() {
            return Ok(elem(&st, "src-label"));
        }
        if *loc == selectors::year_start_input() {
            return Ok(elem(&st, "start-year"));
        }
        if *loc == selectors::year_end_input() {
            return Ok(elem(&st, "end-year"));
        }
        if *loc == selectors::search_button() {
            return Ok(elem(&st, "search-btn"));
        }
        if *loc == selectors::page_size_dropdown() {
            return Ok(elem(&st, "perpage-dropdown"));
        }
        if *loc == selectors::page_size_label() {
            return Ok(elem(&st, "perpage-label"));
        }
        if *loc == selectors::current_page_label() {
            return Ok(elem(&st, "cur"));
        }
        if let Some(year) = year_of(loc, st.year_range) {
            st.probe_years.push(year);
            return if st.years.contains_key(&year) {
                Ok(elem(&st, format!("year:{year}")))
            } else {
                Err(SessionError::NotFound(loc.to_string()))
            };
        }
        Err(SessionError::NotFound(loc.to_string()))
    }

    async fn find_all(&self, loc: &Locator) -> Result<Vec<FakeElem>, SessionError> {
        let st = self.state.lock().expect("状态锁");
        if *loc == selectors::result_rows() {
            let rows = st.pages.get(st.page_no - 1).copied().unwrap_or(0);
            return Ok((0..rows)
                .map(|i| elem(&st, format!("row:{}:{}", st.page_no, i)))
                .collect());
        }
        Err(SessionError::NotFound(loc.to_string()))
    }

    async fn find_in(&self, el: &FakeElem, css: &str) -> Result<FakeElem, SessionError> {
        let st = self.state.lock().expect("状态锁");
        if css != selectors::CELL_LINK {
            return Err(SessionError::NotFound(css.to_string()));
        }
        let parts = key_parts(&el.key);
        if parts.len() == 4 && parts[0] == "cell" {
            let page: usize = parts[1].parse().expect("页号");
            let row: usize = parts[2].parse().expect("行号");
            let col: usize = parts[3].parse().expect("列号");
            // 日期列没有链接；第一页第一行的作者列也造成一个无链接的格子
            if col == 4 || (col == 2 && page == 1 && row == 0) {
                return Err(SessionError::NotFound(css.to_string()));
            }
            return Ok(elem(&st, format!("link:{page}:{row}:{col}")));
        }
        Err(SessionError::NotFound(css.to_string()))
    }

    async fn find_all_in(&self, el: &FakeElem, css: &str) -> Result<Vec<FakeElem>, SessionError> {
        let st = self.state.lock().expect("状态锁");
        let parts = key_parts(&el.key);
        if css == selectors::ROW_CELLS && parts.len() == 3 && parts[0] == "row" {
            let page = parts[1];
            let row = parts[2];
            return Ok((0..7)
                .map(|col| elem(&st, format!("cell:{page}:{row}:{col}")))
                .collect());
        }
        Ok(Vec::new())
    }

    async fn read_text(&self, el: &FakeElem) -> Result<String, SessionError> {
        let st = self.state.lock().expect("状态锁");
        let parts = key_parts(&el.key);
        match parts.as_slice() {
            ["total"] => Ok(st.total_text.clone()),
            ["year", year] => {
                let year: i32 = year.parse().expect("年份");
                Ok(format!("({})", st.years[&year]))
            }
            ["link", page, row, col] => Ok(match *col {
                "1" => format!("论文{page}-{row}"),
                "2" => "张三; 李四".to_string(),
                "3" => "测试期刊".to_string(),
                "5" => "12".to_string(),
                "6" => "345".to_string(),
                _ => String::new(),
            }),
            ["cell", _page, row, "4"] => {
                let row: usize = row.parse().expect("行号");
                Ok(format!("2013-05-{:02}", (row % 28) + 1))
            }
            _ => Ok(String::new()),
        }
    }

    async fn read_attribute(
        &self,
        _el: &FakeElem,
        _name: &str,
    ) -> Result<Option<String>, SessionError> {
        Ok(None)
    }

    async fn parent_attribute(
        &self,
        el: &FakeElem,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        let st = self.state.lock().expect("状态锁");
        if el.key == "facet-header" && name == "class" {
            return Ok(Some(st.facet_parent_class.clone()));
        }
        Ok(None)
    }
}

fn test_task(output: &std::path::Path) -> Task {
    Task {
        journal: "测试期刊".into(),
        year_start: 2012,
        year_end: 2014,
        output: output.to_path_buf(),
    }
}

fn aggregate_task(output: &std::path::Path) -> Task {
    Task {
        journal: "测试期刊".into(),
        year_start: 2012,
        year_end: 2020,
        output: output.to_path_buf(),
    }
}

#[tokio::test]
async fn test_listing_crawls_two_full_pages_and_a_tail() {
    let dir = tempdir().expect("临时目录");
    let cfg = AppConfig::default();
    let schema = RecordSchema::listing(&cfg.crawl.study_window);
    let task = test_task(&dir.path().join("测试期刊1.csv"));

    let drv = FakeDriver::listing(vec![50, 50, 1], "101");
    let records = listing::crawl_listing(&drv, &cfg, &schema, &task)
        .await
        .expect("爬取应成功");

    assert_eq!(records.len(), 101, "两整页加一行应恰好 101 条");
    for record in &records {
        assert_eq!(record.len(), 7, "每条记录的字段必须齐全");
    }
    assert_eq!(records[0][0], "2012-2020");
    assert_eq!(records[0][1], "论文1-0");
    assert_eq!(records[0][2], "", "无链接的作者格子应取空字符串而不是报错");
    assert_eq!(records[1][2], "张三; 李四");
    assert_eq!(records[100][1], "论文3-0", "最后一条来自第三页");

    let clicked = drv.clicked();
    assert!(clicked.contains(&"script:doctype".to_string()), "学术期刊按键应以 JS 点击");
    assert_eq!(
        clicked.iter().filter(|k| k.as_str() == "next").count(),
        2,
        "三页结果应翻页两次"
    );
}

#[tokio::test]
async fn test_listing_zero_records_is_failure() {
    let dir = tempdir().expect("临时目录");
    let cfg = AppConfig::default();
    let schema = RecordSchema::listing(&cfg.crawl.study_window);
    let task = test_task(&dir.path().join("测试期刊1.csv"));

    let drv = FakeDriver::listing(vec![0], "0");
    let err = listing::crawl_listing(&drv, &cfg, &schema, &task)
        .await
        .expect_err("空结果集应判为失败");
    assert!(matches!(err, CrawlError::ZeroResult));
}

#[tokio::test]
async fn test_runner_is_idempotent_over_completed_tasks() {
    let dir = tempdir().expect("临时目录");
    let cfg = AppConfig::default();
    let schema = RecordSchema::listing(&cfg.crawl.study_window);
    let output = dir.path().join("测试期刊1.csv");

    let execute = |task: Task| {
        let cfg = cfg.clone();
        let schema = schema.clone();
        async move {
            let drv = FakeDriver::listing(vec![50, 50, 1], "101");
            let records = listing::crawl_listing(&drv, &cfg, &schema, &task).await?;
            storage::artifact::save_rows(&task.output, &schema.headers(), &records)
                .map_err(|e| CrawlError::Storage(e.to_string()))?;
            Ok(records.len())
        }
    };

    let stats = runner::run_tasks(vec![test_task(&output)], execute).await;
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.skipped, 0);
    let table = storage::artifact::load_table(&output).expect("产出应可读");
    assert_eq!(table.rows.len(), 101);

    // 产出已存在，重跑只应增加 skipped
    let stats = runner::run_tasks(vec![test_task(&output)], execute).await;
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.attempted, 0);
    assert_eq!(stats.succeeded, 0);
}

#[tokio::test]
async fn test_aggregate_reads_all_years_and_checks_total() {
    let dir = tempdir().expect("临时目录");
    let cfg = AppConfig::default();
    let task = aggregate_task(&dir.path().join("测试期刊.csv"));

    let years: BTreeMap<i32, i64> = (2012..=2020).map(|y| (y, i64::from(y - 2010))).collect();
    let total: i64 = years.values().sum();
    let drv = FakeDriver::aggregate(years, &total.to_string(), "is-up-fold off");

    let row = aggregate::crawl_publish_numbers(&drv, &cfg, &task)
        .await
        .expect("爬取应成功");

    assert_eq!(row.journal, "测试期刊");
    assert_eq!(row.total, total);
    assert_eq!(row.counts.len(), 9);
    assert_eq!(row.counts[0], (2012, 2));
    assert_eq!(row.counts[8], (2020, 10));
    assert!(
        drv.clicked().contains(&"script:facet-header".to_string()),
        "折叠的分组应被点开"
    );
}

#[tokio::test]
async fn test_aggregate_expanded_facet_is_not_clicked() {
    let dir = tempdir().expect("临时目录");
    let cfg = AppConfig::default();
    let task = aggregate_task(&dir.path().join("测试期刊.csv"));

    let years: BTreeMap<i32, i64> = (2012..=2020).map(|y| (y, 1)).collect();
    let drv = FakeDriver::aggregate(years, "9", "is-up-fold");

    aggregate::crawl_publish_numbers(&drv, &cfg, &task)
        .await
        .expect("爬取应成功");
    assert!(
        !drv.clicked().contains(&"script:facet-header".to_string()),
        "已展开的分组再点会折回去"
    );
}

#[tokio::test]
async fn test_aggregate_probes_after_first_timeout_except_checkpoint() {
    let dir = tempdir().expect("临时目录");
    let cfg = AppConfig::default();
    let task = aggregate_task(&dir.path().join("测试期刊.csv"));

    // 2013 缺失触发降级；检查点 2014 仍应全额等待
    let mut years = BTreeMap::new();
    years.insert(2012, 3i64);
    years.insert(2014, 5);
    for y in 2015..=2020 {
        years.insert(y, 2);
    }
    let total: i64 = years.values().sum();
    let drv = FakeDriver::aggregate(years, &total.to_string(), "is-up-fold");

    let row = aggregate::crawl_publish_numbers(&drv, &cfg, &task)
        .await
        .expect("爬取应成功");

    assert_eq!(drv.full_wait_years(), vec![2012, 2013, 2014], "降级后只有检查点年份全额等待");
    assert_eq!(drv.probe_years(), vec![2015, 2016, 2017, 2018, 2019, 2020]);
    let counts: BTreeMap<i32, i64> = row.counts.iter().copied().collect();
    assert_eq!(counts[&2013], 0, "缺失年份计 0");
    assert_eq!(row.total, total);
}

#[tokio::test]
async fn test_aggregate_count_mismatch_aborts_without_artifact() {
    let dir = tempdir().expect("临时目录");
    let cfg = AppConfig::default();
    let output = dir.path().join("测试期刊.csv");
    let task = aggregate_task(&output);

    let years: BTreeMap<i32, i64> = (2012..=2020).map(|y| (y, 1)).collect();
    // 结果栏报 10，面板合计只有 9
    let drv = FakeDriver::aggregate(years, "10", "is-up-fold");

    let err = aggregate::crawl_publish_numbers(&drv, &cfg, &task)
        .await
        .expect_err("计数不一致应中止");
    assert!(matches!(
        err,
        CrawlError::CountMismatch {
            expected: 10,
            actual: 9
        }
    ));
    assert!(!output.exists(), "中止的任务不能留下产出");
}
