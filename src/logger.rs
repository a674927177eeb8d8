use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// 追加写入固定日志文件的 writer，多层共用一个文件句柄
#[derive(Clone)]
struct LogFile(Arc<Mutex<File>>);

struct LogFileGuard(Arc<Mutex<File>>);

impl Write for LogFileGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("日志文件锁").write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().expect("日志文件锁").flush()
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogFileGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogFileGuard(self.0.clone())
    }
}

/// 初始化日志：标准输出一份，固定名称的追加日志文件一份，内容一致，便于事后审计
pub fn init(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("打开日志文件失败: {}", log_file.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer();
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(LogFile(Arc::new(Mutex::new(file))));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
