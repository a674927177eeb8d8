use std::time::Duration;
use thiserror::Error;

/// 浏览器会话层错误
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("元素未找到: {0}")]
    NotFound(String),

    #[error("等待 {what} 超时 ({}s)", .after.as_secs())]
    Timeout { what: String, after: Duration },

    #[error("浏览器通信失败: {0}")]
    Backend(String),
}

impl SessionError {
    pub fn backend(e: impl std::fmt::Display) -> Self {
        Self::Backend(e.to_string())
    }
}

/// 单个爬取任务的失败分类。
/// 所有失败都在任务边界被拦下并计数，绝不向上传播到进程退出。
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("{step}: {source}")]
    Step {
        step: String,
        #[source]
        source: SessionError,
    },

    #[error("发表数量总和与检索结果总数不一致，预期 {expected}，实际 {actual}")]
    CountMismatch { expected: i64, actual: i64 },

    #[error("未爬取到任何文献")]
    ZeroResult,

    #[error("解析失败: {0}")]
    Parse(String),

    #[error("代理租用失败: {0}")]
    Proxy(String),

    #[error("产出文件写入失败: {0}")]
    Storage(String),
}

impl CrawlError {
    pub fn step(step: impl Into<String>, source: SessionError) -> Self {
        Self::Step {
            step: step.into(),
            source,
        }
    }

    /// 日志与事后排查用的粗分类
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Step {
                source: SessionError::NotFound(_),
                ..
            } => "element-not-found",
            Self::Step {
                source: SessionError::Timeout { .. },
                ..
            } => "wait-timeout",
            Self::Step { .. } => "browser",
            Self::CountMismatch { .. } => "count-mismatch",
            Self::ZeroResult => "zero-result",
            Self::Parse(_) => "parse",
            Self::Proxy(_) => "proxy",
            Self::Storage(_) => "storage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let timeout = CrawlError::step(
            "等待下一页按键",
            SessionError::Timeout {
                what: "css=#PageNext".into(),
                after: Duration::from_secs(15),
            },
        );
        assert_eq!(timeout.kind(), "wait-timeout");

        let missing = CrawlError::step("定位检索键", SessionError::NotFound("input".into()));
        assert_eq!(missing.kind(), "element-not-found");

        let mismatch = CrawlError::CountMismatch {
            expected: 100,
            actual: 99,
        };
        assert_eq!(mismatch.kind(), "count-mismatch");
        assert!(mismatch.to_string().contains("100"), "错误信息应包含两个计数");
        assert!(mismatch.to_string().contains("99"), "错误信息应包含两个计数");
    }

    #[test]
    fn test_step_message_keeps_original_detail() {
        let e = CrawlError::step("定位文献来源标签", SessionError::NotFound("span".into()));
        let msg = e.to_string();
        assert!(msg.contains("定位文献来源标签"));
    }
}
