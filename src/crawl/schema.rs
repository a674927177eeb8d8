//! 结果表格的列模式：字段名 -> 提取规则。
//! 替掉硬编码的列下标，启动时校验一次，两个变体共用同一套提取逻辑。

use std::collections::HashSet;

use crate::browser::driver::Driver;
use crate::crawl::selectors::{CELL_LINK, ROW_CELLS};
use crate::error::{CrawlError, SessionError};

/// 单元格取值方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRule {
    /// 固定写入的常量列
    Synthetic(String),
    /// 取第 n 列里超链接的文字，无链接时为空字符串
    LinkText(usize),
    /// 取第 n 列的单元格文字
    CellText(usize),
}

#[derive(Debug, Clone)]
pub struct RecordSchema {
    columns: Vec<(String, ColumnRule)>,
}

impl RecordSchema {
    /// 检索结果表格的默认列布局（第 0 列是行首复选框，跳过）
    pub fn listing(study_window: &str) -> Self {
        Self {
            columns: vec![
                ("时间段".into(), ColumnRule::Synthetic(study_window.into())),
                ("篇名".into(), ColumnRule::LinkText(1)),
                ("作者".into(), ColumnRule::LinkText(2)),
                ("期刊名称".into(), ColumnRule::LinkText(3)),
                ("发表时间".into(), ColumnRule::CellText(4)),
                ("被引次数".into(), ColumnRule::LinkText(5)),
                ("被下载次数".into(), ColumnRule::LinkText(6)),
            ],
        }
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    /// 列下标不允许重复，重复说明模式配置错了
    pub fn validate(&self) -> Result<(), CrawlError> {
        let mut seen = HashSet::new();
        for (name, rule) in &self.columns {
            let index = match rule {
                ColumnRule::LinkText(i) | ColumnRule::CellText(i) => *i,
                ColumnRule::Synthetic(_) => continue,
            };
            if !seen.insert(index) {
                return Err(CrawlError::Parse(format!(
                    "列模式下标重复: {name} -> {index}"
                )));
            }
        }
        Ok(())
    }

    /// 从一行结果中按模式提取一条记录。
    /// 除日期列外，单元格里至多一个超链接，没有就取空字符串，字段永远齐全
    pub async fn extract_row<D: Driver>(
        &self,
        drv: &D,
        row: &D::Elem,
    ) -> Result<Vec<String>, CrawlError> {
        let cells = drv
            .find_all_in(row, ROW_CELLS)
            .await
            .map_err(|e| CrawlError::step("读取结果行单元格", e))?;

        let mut out = Vec::with_capacity(self.columns.len());
        for (name, rule) in &self.columns {
            let value = match rule {
                ColumnRule::Synthetic(v) => v.clone(),
                ColumnRule::CellText(i) => match cells.get(*i) {
                    Some(cell) => drv
                        .read_text(cell)
                        .await
                        .map_err(|e| CrawlError::step(format!("读取{name}列"), e))?,
                    None => String::new(),
                },
                ColumnRule::LinkText(i) => match cells.get(*i) {
                    Some(cell) => match drv.find_in(cell, CELL_LINK).await {
                        Ok(a) => drv
                            .read_text(&a)
                            .await
                            .map_err(|e| CrawlError::step(format!("读取{name}列链接"), e))?,
                        Err(SessionError::NotFound(_)) => String::new(),
                        Err(e) => {
                            return Err(CrawlError::step(format!("读取{name}列链接"), e));
                        }
                    },
                    None => String::new(),
                },
            };
            out.push(value);
        }
        Ok(out)
    }
}
