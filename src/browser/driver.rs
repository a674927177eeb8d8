use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::error::SessionError;

/// 元素定位方式。CDP 原生只认 CSS 选择器，按链接文字定位单独处理
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    LinkText(String),
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self {
        Self::Css(s.into())
    }

    pub fn link_text(s: impl Into<String>) -> Self {
        Self::LinkText(s.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::LinkText(s) => write!(f, "link={s}"),
        }
    }
}

/// 浏览器会话的统一抽象。真实实现走 CDP，测试里用脚本化的假实现替代。
/// 所有等待都有超时上限，超时只令当前任务失败，绝不中止进程。
#[async_trait]
pub trait Driver: Send + Sync {
    type Elem: Send + Sync;

    async fn open(&self, url: &str) -> Result<(), SessionError>;

    /// 切换到最新打开的窗口（高级检索在新标签页打开）
    async fn switch_to_new_window(&self) -> Result<(), SessionError>;

    async fn wait_clickable(
        &self,
        loc: &Locator,
        timeout: Duration,
    ) -> Result<Self::Elem, SessionError>;

    async fn wait_present(
        &self,
        loc: &Locator,
        timeout: Duration,
    ) -> Result<Self::Elem, SessionError>;

    async fn wait_visible(
        &self,
        loc: &Locator,
        timeout: Duration,
    ) -> Result<Self::Elem, SessionError>;

    /// 阻塞直到之前捕获的元素句柄失效。
    /// 局部刷新会重建面板里的节点，旧句柄失效即刷新完成，比定长等待可靠
    async fn wait_stale(&self, el: &Self::Elem, timeout: Duration) -> Result<(), SessionError>;

    async fn click(&self, el: &Self::Elem) -> Result<(), SessionError>;

    /// 通过 JS 派发点击，绕过遮挡与可见性限制
    async fn script_click(&self, el: &Self::Elem) -> Result<(), SessionError>;

    async fn send_text(&self, el: &Self::Elem, text: &str) -> Result<(), SessionError>;

    async fn hover(&self, el: &Self::Elem) -> Result<(), SessionError>;

    async fn scroll_into_view(&self, el: &Self::Elem) -> Result<(), SessionError>;

    /// 立即查找，不等待
    async fn find(&self, loc: &Locator) -> Result<Self::Elem, SessionError>;

    async fn find_all(&self, loc: &Locator) -> Result<Vec<Self::Elem>, SessionError>;

    async fn find_in(&self, el: &Self::Elem, css: &str) -> Result<Self::Elem, SessionError>;

    async fn find_all_in(&self, el: &Self::Elem, css: &str)
        -> Result<Vec<Self::Elem>, SessionError>;

    async fn read_text(&self, el: &Self::Elem) -> Result<String, SessionError>;

    async fn read_attribute(
        &self,
        el: &Self::Elem,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    /// 读取父节点的属性（CSS 选择器无法向上选择）
    async fn parent_attribute(
        &self,
        el: &Self::Elem,
        name: &str,
    ) -> Result<Option<String>, SessionError>;
}
