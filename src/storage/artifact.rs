//! 产出文件的读写。
//! 写入是单次原子动作：先写临时文件再改名，进程中途被杀不会留下半截产出。

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::types::YearCountRow;

/// 带列头的通用表格，合并与对账步骤用
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

pub fn save_rows(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    let tmp = tmp_path(path);
    {
        let mut wtr = csv::WriterBuilder::new()
            .from_path(&tmp)
            .with_context(|| format!("创建临时产出文件失败: {}", tmp.display()))?;
        wtr.write_record(headers)
            .with_context(|| format!("写入列头失败: {}", path.display()))?;
        for row in rows {
            wtr.write_record(row)
                .with_context(|| format!("写入记录失败: {}", path.display()))?;
        }
        wtr.flush()
            .with_context(|| format!("落盘失败: {}", tmp.display()))?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("改名为正式产出失败: {}", path.display()))?;
    Ok(())
}

pub fn save_year_count(path: &Path, row: &YearCountRow) -> Result<()> {
    let mut headers = vec!["期刊名称".to_string()];
    let mut values = vec![row.journal.clone()];
    for (year, count) in &row.counts {
        headers.push(year.to_string());
        values.push(count.to_string());
    }
    headers.push("总数".to_string());
    values.push(row.total.to_string());
    save_rows(path, &headers, &[values])
}

pub fn load_table(path: &Path) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("读取产出文件失败: {}", path.display()))?;
    let headers = rdr
        .headers()
        .with_context(|| format!("读取列头失败: {}", path.display()))?
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec.with_context(|| format!("读取记录失败: {}", path.display()))?;
        rows.push(rec.iter().map(|s| s.to_string()).collect());
    }
    Ok(Table { headers, rows })
}

// 不用 with_extension：期刊名里可能带点号
fn tmp_path(path: &Path) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempdir().expect("临时目录");
        let path = dir.path().join("期刊A1.csv");
        let headers: Vec<String> = vec!["篇名".into(), "作者".into()];
        let rows = vec![
            vec!["论文一".to_string(), "作者甲".to_string()],
            vec!["论文二".to_string(), String::new()],
        ];
        save_rows(&path, &headers, &rows).expect("写入应成功");

        let table = load_table(&path).expect("读取应成功");
        assert_eq!(table.headers, headers);
        assert_eq!(table.rows, rows);
        assert_eq!(table.column_index("作者"), Some(1));
        assert_eq!(table.column_index("不存在"), None);
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = tempdir().expect("临时目录");
        let path = dir.path().join("期刊A.csv");
        save_rows(&path, &["a".to_string()], &[vec!["1".to_string()]]).expect("写入应成功");
        assert!(path.is_file());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("遍历目录")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "不应残留临时文件");
    }

    #[test]
    fn test_save_year_count_layout() {
        let dir = tempdir().expect("临时目录");
        let path = dir.path().join("期刊B.csv");
        let row = YearCountRow {
            journal: "期刊B".into(),
            counts: vec![(2012, 3), (2013, 0), (2014, 7)],
            total: 10,
        };
        save_year_count(&path, &row).expect("写入应成功");

        let table = load_table(&path).expect("读取应成功");
        assert_eq!(table.headers, vec!["期刊名称", "2012", "2013", "2014", "总数"]);
        assert_eq!(table.rows, vec![vec!["期刊B", "3", "0", "7", "10"]]);
    }
}
