use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::types::YearBucket;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub waits: WaitTimeouts,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub browser: BrowserOptions,
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path.unwrap_or_else(|| Path::new("config.toml"));
        if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
            let cfg: AppConfig = toml::from_str(&raw)
                .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
            return Ok(cfg);
        }
        Ok(AppConfig::default())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            waits: WaitTimeouts::default(),
            crawl: CrawlConfig::default(),
            paths: PathConfig::default(),
            proxy: ProxyConfig::default(),
            browser: BrowserOptions::default(),
        }
    }
}

/// 各类等待的超时上限。翻页刷新和筛选面板展开的耗时特征不同，分开配置
#[derive(Debug, Deserialize, Clone)]
pub struct WaitTimeouts {
    #[serde(default = "default_wait_secs")]
    pub clickable_secs: u64,
    #[serde(default = "default_wait_secs")]
    pub present_secs: u64,
    #[serde(default = "default_wait_secs")]
    pub visible_secs: u64,
    #[serde(default = "default_wait_secs")]
    pub stale_secs: u64,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

impl WaitTimeouts {
    pub fn clickable(&self) -> Duration {
        Duration::from_secs(self.clickable_secs)
    }
    pub fn present(&self) -> Duration {
        Duration::from_secs(self.present_secs)
    }
    pub fn visible(&self) -> Duration {
        Duration::from_secs(self.visible_secs)
    }
    pub fn stale(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

impl Default for WaitTimeouts {
    fn default() -> Self {
        Self {
            clickable_secs: default_wait_secs(),
            present_secs: default_wait_secs(),
            visible_secs: default_wait_secs(),
            stale_secs: default_wait_secs(),
            poll_ms: default_poll_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_cooldown_every_pages")]
    pub cooldown_every_pages: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_checkpoint_year")]
    pub checkpoint_year: i32,
    /// 时间段列写入的研究窗口标签，与年份桶无关
    #[serde(default = "default_study_window")]
    pub study_window: String,
    #[serde(default = "default_year_buckets")]
    pub year_buckets: Vec<[i32; 2]>,
    #[serde(default = "default_aggregate_range")]
    pub aggregate_range: [i32; 2],
}

impl CrawlConfig {
    pub fn buckets(&self) -> Vec<YearBucket> {
        self.year_buckets
            .iter()
            .map(|b| YearBucket::new(b[0], b[1]))
            .collect()
    }

    pub fn aggregate_bucket(&self) -> YearBucket {
        YearBucket::new(self.aggregate_range[0], self.aggregate_range[1])
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            cooldown_every_pages: default_cooldown_every_pages(),
            cooldown_secs: default_cooldown_secs(),
            checkpoint_year: default_checkpoint_year(),
            study_window: default_study_window(),
            year_buckets: default_year_buckets(),
            aggregate_range: default_aggregate_range(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathConfig {
    #[serde(default = "default_journal_spreadsheet")]
    pub journal_spreadsheet: String,
    #[serde(default = "default_journal_list")]
    pub journal_list: String,
    #[serde(default = "default_listing_output_dir")]
    pub listing_output_dir: String,
    #[serde(default = "default_aggregate_output_dir")]
    pub aggregate_output_dir: String,
    #[serde(default = "default_merged_output_dir")]
    pub merged_output_dir: String,
    #[serde(default = "default_quarantine_dir")]
    pub quarantine_dir: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            journal_spreadsheet: default_journal_spreadsheet(),
            journal_list: default_journal_list(),
            listing_output_dir: default_listing_output_dir(),
            aggregate_output_dir: default_aggregate_output_dir(),
            merged_output_dir: default_merged_output_dir(),
            quarantine_dir: default_quarantine_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_proxy_api_base")]
    pub api_base: String,
    #[serde(default = "default_probe_url")]
    pub probe_url: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_proxy_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_proxy_api_base(),
            probe_url: default_probe_url(),
            probe_timeout_secs: default_probe_timeout_secs(),
            max_attempts: default_proxy_max_attempts(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserOptions {
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

fn default_base_url() -> String {
    "https://chn.oversea.cnki.net/".to_string()
}

fn default_wait_secs() -> u64 {
    15
}

fn default_poll_ms() -> u64 {
    250
}

fn default_page_size() -> u32 {
    50
}

fn default_cooldown_every_pages() -> u32 {
    30
}

fn default_cooldown_secs() -> u64 {
    15
}

fn default_checkpoint_year() -> i32 {
    2014
}

fn default_study_window() -> String {
    "2012-2020".to_string()
}

fn default_year_buckets() -> Vec<[i32; 2]> {
    vec![[2012, 2014], [2015, 2017], [2018, 2020]]
}

fn default_aggregate_range() -> [i32; 2] {
    [2012, 2020]
}

fn default_journal_spreadsheet() -> String {
    "待爬取数据.csv".to_string()
}

fn default_journal_list() -> String {
    "journals.txt".to_string()
}

fn default_listing_output_dir() -> String {
    "output".to_string()
}

fn default_aggregate_output_dir() -> String {
    "publish_numbers".to_string()
}

fn default_merged_output_dir() -> String {
    "merged_output".to_string()
}

fn default_quarantine_dir() -> String {
    "others".to_string()
}

fn default_proxy_api_base() -> String {
    "http://127.0.0.1:5010".to_string()
}

fn default_probe_url() -> String {
    "http://httpbin.org/ip".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_proxy_max_attempts() -> u32 {
    5
}

fn default_window_width() -> u32 {
    1400
}

fn default_window_height() -> u32 {
    900
}
