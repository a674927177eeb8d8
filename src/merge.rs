//! 合并与对账：把逐任务产出归并成按期刊与全局的数据集，
//! 并核对文件集合的缺漏与两个来源的计数

use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::storage::artifact::{load_table, save_rows, Table};

pub const INDEX_HEADER: &str = "序号";
const DATE_HEADER: &str = "发表时间";
const JOURNAL_HEADER: &str = "期刊名称";
const TOTAL_HEADER: &str = "总数";
pub const AGGREGATE_MERGED_FILE: &str = "发表数量.csv";

/// 列表任务空间应有的全部文件名：期刊 × 年份桶
pub fn expected_listing_files(journals: &[String], bucket_count: usize) -> Vec<String> {
    journals
        .iter()
        .flat_map(|j| (1..=bucket_count).map(move |i| format!("{j}{i}.csv")))
        .collect()
}

/// 对比目录中实际存在与预期的文件集合。
/// 多出的文件移入隔离目录（不删除），缺失的只报告，返回 (多出, 缺失)
pub fn find_extra_missing(
    dir: &Path,
    expected: &[String],
    quarantine: &Path,
) -> Result<(Vec<String>, Vec<String>)> {
    fs::create_dir_all(quarantine)
        .with_context(|| format!("创建隔离目录失败: {}", quarantine.display()))?;

    let present: BTreeSet<String> = fs::read_dir(dir)
        .with_context(|| format!("遍历目录失败: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    let expected: BTreeSet<String> = expected.iter().cloned().collect();

    let mut extra = Vec::new();
    for name in &present {
        if !expected.contains(name) {
            fs::rename(dir.join(name), quarantine.join(name))
                .with_context(|| format!("移动多余文件失败: {name}"))?;
            extra.push(name.clone());
            info!("extra file: {}, moved: {}, total: {}", name, extra.len(), present.len());
        }
    }

    let mut missing = Vec::new();
    for name in &expected {
        if !present.contains(name) {
            missing.push(name.clone());
            info!(
                "missing file: {}, missing: {}, total: {}",
                name,
                missing.len(),
                expected.len()
            );
        }
    }

    Ok((extra, missing))
}

/// 去掉文件名里的年份桶后缀，得到期刊汇总文件名（"期刊3.csv" -> "期刊.csv"）
fn strip_bucket_suffix(file: &str) -> Option<String> {
    let stem = file.strip_suffix(".csv")?;
    let mut chars = stem.chars();
    let last = chars.next_back()?;
    if !last.is_ascii_digit() || chars.as_str().is_empty() {
        return None;
    }
    Some(format!("{}.csv", chars.as_str()))
}

fn csv_files_sorted(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files: Vec<(String, PathBuf)> = fs::read_dir(dir)
        .with_context(|| format!("遍历目录失败: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .filter(|(name, path)| path.is_file() && name.ends_with(".csv"))
        .collect();
    files.sort();
    Ok(files)
}

/// 序号一类的合成列在合并时丢弃、重新生成
fn is_synthetic_index(header: &str) -> bool {
    header == INDEX_HEADER || header.is_empty() || header.starts_with("Unnamed")
}

/// 以第一个表的列头为准，逐表按列名对位拼接
fn concat_tables(tables: &[Table]) -> Result<Table> {
    let first = tables.first().ok_or_else(|| anyhow!("没有可合并的表"))?;
    let headers: Vec<String> = first
        .headers
        .iter()
        .filter(|h| !is_synthetic_index(h))
        .cloned()
        .collect();

    let mut rows = Vec::new();
    for table in tables {
        let mapping: Vec<Option<usize>> =
            headers.iter().map(|h| table.column_index(h)).collect();
        for row in &table.rows {
            rows.push(
                mapping
                    .iter()
                    .map(|idx| idx.and_then(|i| row.get(i)).cloned().unwrap_or_default())
                    .collect(),
            );
        }
    }
    Ok(Table { headers, rows })
}

fn save_with_index(path: &Path, table: &Table) -> Result<()> {
    let mut headers = vec![INDEX_HEADER.to_string()];
    headers.extend(table.headers.iter().cloned());
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut out = vec![(i + 1).to_string()];
            out.extend(row.iter().cloned());
            out
        })
        .collect();
    save_rows(path, &headers, &rows)
}

/// 把同一期刊各年份桶的产出合并成一个文件：
/// 丢掉合成的序号列，按发表时间升序，从 1 重新编号
pub fn merge_listing_artifacts(src: &Path, dst: &Path) -> Result<usize> {
    info!("Start merging files in {}", src.display());
    fs::create_dir_all(dst).with_context(|| format!("创建目录失败: {}", dst.display()))?;

    let mut groups: BTreeMap<String, Vec<Table>> = BTreeMap::new();
    let mut num_before = 0usize;
    for (name, path) in csv_files_sorted(src)? {
        num_before += 1;
        let Some(merged_name) = strip_bucket_suffix(&name) else {
            warn!("跳过无法识别桶后缀的文件: {}", name);
            continue;
        };
        groups.entry(merged_name).or_default().push(load_table(&path)?);
    }

    for (name, tables) in &groups {
        let mut merged = concat_tables(tables)?;
        let date_idx = merged
            .column_index(DATE_HEADER)
            .ok_or_else(|| anyhow!("{name} 缺少{DATE_HEADER}列"))?;
        merged
            .rows
            .sort_by(|a, b| a[date_idx].cmp(&b[date_idx]));
        save_with_index(&dst.join(name), &merged)?;
    }

    info!(
        "Finish merging files in {}. There are {} files before merge, {} files after merge.",
        src.display(),
        num_before,
        groups.len()
    );
    Ok(groups.len())
}

/// 把所有期刊的发表数量行并成一张表，按期刊名去重保留先出现的
pub fn merge_aggregate_artifacts(src: &Path, dst: &Path) -> Result<PathBuf> {
    info!("Start merging files in {}", src.display());
    fs::create_dir_all(dst).with_context(|| format!("创建目录失败: {}", dst.display()))?;

    let mut tables = Vec::new();
    for (_, path) in csv_files_sorted(src)? {
        tables.push(load_table(&path)?);
    }
    let merged = concat_tables(&tables)?;

    let journal_idx = merged
        .column_index(JOURNAL_HEADER)
        .ok_or_else(|| anyhow!("缺少{JOURNAL_HEADER}列"))?;
    let mut seen = BTreeSet::new();
    let deduped: Vec<Vec<String>> = merged
        .rows
        .into_iter()
        .filter(|row| seen.insert(row[journal_idx].clone()))
        .collect();

    let out = dst.join(AGGREGATE_MERGED_FILE);
    save_with_index(
        &out,
        &Table {
            headers: merged.headers,
            rows: deduped,
        },
    )?;
    info!("Finish merging files in {}. There are {} files before merge.", src.display(), tables.len());
    Ok(out)
}

/// 逐期刊核对合并后的文献条数与发表数量产出的总数，返回不一致的文件名。
/// 只报告不修复，两个来源谁对谁错要人工判断
pub fn check_publish_numbers(listing_dir: &Path, aggregate_dir: &Path) -> Result<Vec<String>> {
    info!("Start checking files in {}", listing_dir.display());
    let mut invalid = Vec::new();
    let mut total = 0usize;

    for (name, path) in csv_files_sorted(listing_dir)? {
        // 汇总出的发表数量总表不参与逐期刊核对
        if name == AGGREGATE_MERGED_FILE {
            continue;
        }
        total += 1;
        let listing = load_table(&path)?;
        let agg_path = aggregate_dir.join(&name);
        if !agg_path.is_file() {
            warn!("缺少发表数量文件: {}", name);
            invalid.push(name);
            continue;
        }
        let aggregate = load_table(&agg_path)?;
        let total_idx = aggregate
            .column_index(TOTAL_HEADER)
            .ok_or_else(|| anyhow!("{name} 缺少{TOTAL_HEADER}列"))?;
        let expected: usize = aggregate
            .rows
            .first()
            .and_then(|row| row.get(total_idx))
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| anyhow!("{name} 的{TOTAL_HEADER}无法解析"))?;
        if listing.rows.len() != expected {
            warn!(
                "Expected number: {}, actual number: {}, file: {}",
                expected,
                listing.rows.len(),
                name
            );
            invalid.push(name);
        }
    }

    info!(
        "Finish checking files in {}. Valid: {}, invalid: {}, total: {}",
        listing_dir.display(),
        total - invalid.len(),
        invalid.len(),
        total
    );
    Ok(invalid)
}
