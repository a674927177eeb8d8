use std::path::PathBuf;
use std::time::Instant;

/// 一次爬取任务：一个期刊 × 一个年份区间，对应一个产出文件。
/// 产出文件存在即任务完成，重复运行直接跳过。
#[derive(Debug, Clone)]
pub struct Task {
    pub journal: String,
    pub year_start: i32,
    pub year_end: i32,
    pub output: PathBuf,
}

impl Task {
    /// 日志里用的任务标识，方便事后按期刊与年份区间检索
    pub fn ident(&self) -> String {
        format!("{} {}-{}", self.journal, self.year_start, self.year_end)
    }
}

/// 年份区间桶
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearBucket {
    pub start: i32,
    pub end: i32,
}

impl YearBucket {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }
}

/// 聚合变体的单行产出：期刊名、每年计数、总数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearCountRow {
    pub journal: String,
    pub counts: Vec<(i32, i64)>,
    pub total: i64,
}

/// 进程级运行统计，只由任务循环修改，进程结束时汇报一次
#[derive(Debug)]
pub struct RunStats {
    pub total: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    started: Instant,
}

impl RunStats {
    pub fn start(total: usize) -> Self {
        Self {
            total,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            started: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn progress_line(&self) -> String {
        format!(
            "Progress: {}/{}, succeed: {}, failed: {}, skipped: {}, used time: {:.1}s",
            self.attempted + self.skipped,
            self.total,
            self.succeeded,
            self.failed,
            self.skipped,
            self.elapsed_secs()
        )
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Finished crawl. Total succeed: {}, total failed: {}, total skipped: {}, total used time: {:.1}s",
            self.succeeded,
            self.failed,
            self.skipped,
            self.elapsed_secs()
        )
    }
}
