//! 任务来源：期刊清单的转换、缓存与任务集构造

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::core::types::{Task, YearBucket};

/// 把候选期刊表格（首行列头，第二列为期刊名）转存为行式清单。
/// 清单已存在则直接复用，重复运行不重复转换
pub fn ensure_journal_list(spreadsheet: &Path, txt: &Path) -> Result<()> {
    if txt.is_file() {
        return Ok(());
    }
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(spreadsheet)
        .with_context(|| format!("读取期刊清单表格失败: {}", spreadsheet.display()))?;

    let mut names = Vec::new();
    for rec in rdr.records() {
        let rec = rec.context("读取期刊清单记录失败")?;
        if let Some(name) = rec.get(1) {
            let name = name.trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
    }

    let mut content = names.join("\n");
    content.push('\n');
    fs::write(txt, content).with_context(|| format!("写入期刊清单失败: {}", txt.display()))?;
    info!("已把期刊清单转存到 {}（共 {} 个）", txt.display(), names.len());
    Ok(())
}

/// 读取清单中第 start 到 end 行（含两端，0 起）的期刊名
pub fn read_range(txt: &Path, start: usize, end: usize) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(txt).with_context(|| format!("读取期刊清单失败: {}", txt.display()))?;
    Ok(content
        .lines()
        .enumerate()
        .filter(|(i, _)| *i >= start && *i <= end)
        .map(|(_, line)| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

/// 列表变体的任务集：期刊在外层，年份桶在内层，顺序固定可复现
pub fn build_listing_tasks(
    journals: &[String],
    buckets: &[YearBucket],
    output_dir: &Path,
) -> Vec<Task> {
    journals
        .iter()
        .flat_map(|journal| {
            buckets.iter().enumerate().map(move |(i, bucket)| Task {
                journal: journal.clone(),
                year_start: bucket.start,
                year_end: bucket.end,
                output: output_dir.join(format!("{}{}.csv", journal, i + 1)),
            })
        })
        .collect()
}

/// 聚合变体的任务集：一个期刊一个全区间任务
pub fn build_aggregate_tasks(
    journals: &[String],
    range: YearBucket,
    output_dir: &Path,
) -> Vec<Task> {
    journals
        .iter()
        .map(|journal| Task {
            journal: journal.clone(),
            year_start: range.start,
            year_end: range.end,
            output: output_dir.join(format!("{journal}.csv")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_journal_list_converts_second_column() {
        let dir = tempdir().expect("临时目录");
        let spreadsheet = dir.path().join("待爬取数据.csv");
        let txt = dir.path().join("journals.txt");
        fs::write(&spreadsheet, "序号,期刊名称\n1,经济研究\n2,管理世界\n3,\n").expect("写入");

        ensure_journal_list(&spreadsheet, &txt).expect("转换应成功");
        let content = fs::read_to_string(&txt).expect("读取");
        assert_eq!(content, "经济研究\n管理世界\n");
    }

    #[test]
    fn test_ensure_journal_list_reuses_cache() {
        let dir = tempdir().expect("临时目录");
        let spreadsheet = dir.path().join("不存在.csv");
        let txt = dir.path().join("journals.txt");
        fs::write(&txt, "已有清单\n").expect("写入");

        // 清单已存在时不应去读表格
        ensure_journal_list(&spreadsheet, &txt).expect("应直接复用缓存");
        assert_eq!(fs::read_to_string(&txt).expect("读取"), "已有清单\n");
    }

    #[test]
    fn test_read_range_inclusive() {
        let dir = tempdir().expect("临时目录");
        let txt = dir.path().join("journals.txt");
        fs::write(&txt, "甲\n乙\n丙\n丁\n").expect("写入");

        assert_eq!(read_range(&txt, 1, 2).expect("读取"), vec!["乙", "丙"]);
        assert_eq!(read_range(&txt, 0, 0).expect("读取"), vec!["甲"]);
        assert_eq!(read_range(&txt, 3, 10).expect("读取"), vec!["丁"]);
    }

    #[test]
    fn test_build_listing_tasks_order_and_paths() {
        let journals = vec!["甲".to_string(), "乙".to_string()];
        let buckets = vec![YearBucket::new(2012, 2014), YearBucket::new(2015, 2017)];
        let tasks = build_listing_tasks(&journals, &buckets, Path::new("output"));

        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].journal, "甲");
        assert_eq!(tasks[0].year_start, 2012);
        assert_eq!(tasks[0].output, Path::new("output/甲1.csv"));
        assert_eq!(tasks[1].output, Path::new("output/甲2.csv"));
        assert_eq!(tasks[2].journal, "乙", "期刊在外层，年份桶在内层");
    }

    #[test]
    fn test_build_aggregate_tasks() {
        let journals = vec!["甲".to_string()];
        let tasks =
            build_aggregate_tasks(&journals, YearBucket::new(2012, 2020), Path::new("publish_numbers"));
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].year_start, 2012);
        assert_eq!(tasks[0].year_end, 2020);
        assert_eq!(tasks[0].output, Path::new("publish_numbers/甲.csv"));
    }
}
