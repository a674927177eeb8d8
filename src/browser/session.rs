use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::app::config::{BrowserOptions, WaitTimeouts};
use crate::browser::driver::{Driver, Locator};
use crate::error::SessionError;

#[derive(Clone, Copy)]
enum WaitKind {
    Present,
    Visible,
    Clickable,
}

/// 一个任务独占一个浏览器会话。任务结束（无论成败）即关闭，绝不跨任务复用，
/// 避免把站点侧的会话状态带进下一个任务
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Mutex<Page>,
    poll: Duration,
}

impl BrowserSession {
    pub async fn launch(
        opts: &BrowserOptions,
        waits: &WaitTimeouts,
        proxy: Option<&str>,
    ) -> Result<Self, SessionError> {
        let mut builder = BrowserConfig::builder()
            .window_size(opts.window_width, opts.window_height)
            .no_sandbox()
            .args(vec![
                "--disable-gpu",
                "--disable-infobars",
                "--disable-extensions",
            ]);
        if !opts.headless {
            builder = builder.with_head();
        }
        if let Some(addr) = proxy {
            builder = builder.arg(format!("--proxy-server={addr}"));
        }
        let config = builder.build().map_err(SessionError::Backend)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(SessionError::backend)?;

        // 后台消费 CDP 事件流，连接断开即退出
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(SessionError::backend)?;
        debug!("浏览器会话已启动");

        Ok(Self {
            browser,
            handler: handler_task,
            page: Mutex::new(page),
            poll: waits.poll(),
        })
    }

    /// 每个退出路径都要走到这里，避免泄漏浏览器进程
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("关闭浏览器失败: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }

    fn page(&self) -> Page {
        self.page.lock().expect("页面句柄锁").clone()
    }

    async fn try_find(&self, loc: &Locator) -> Option<Element> {
        let page = self.page();
        match loc {
            Locator::Css(css) => page.find_element(css.as_str()).await.ok(),
            Locator::LinkText(text) => {
                let anchors = page.find_elements("a").await.ok()?;
                for a in anchors {
                    if let Ok(Some(t)) = a.inner_text().await {
                        if t.trim() == text {
                            return Some(a);
                        }
                    }
                }
                None
            }
        }
    }

    async fn wait_element(
        &self,
        loc: &Locator,
        timeout: Duration,
        kind: WaitKind,
    ) -> Result<Element, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(el) = self.try_find(loc).await {
                let ok = match kind {
                    WaitKind::Present => true,
                    // 无法计算可点击坐标的元素视为不可见（尺寸为零或被隐藏）
                    WaitKind::Visible => el.clickable_point().await.is_ok(),
                    WaitKind::Clickable => {
                        el.clickable_point().await.is_ok()
                            && el.attribute("disabled").await.ok().flatten().is_none()
                    }
                };
                if ok {
                    return Ok(el);
                }
            }
            if Instant::now() >= deadline {
                return Err(SessionError::Timeout {
                    what: loc.to_string(),
                    after: timeout,
                });
            }
            sleep(self.poll).await;
        }
    }
}

#[async_trait]
impl Driver for BrowserSession {
    type Elem = Element;

    async fn open(&self, url: &str) -> Result<(), SessionError> {
        self.page()
            .goto(url)
            .await
            .map(|_| ())
            .map_err(SessionError::backend)
    }

    async fn switch_to_new_window(&self) -> Result<(), SessionError> {
        // 新标签页由站点的点击打开，轮询直到出现，超时则保持当前页面继续
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let pages = self
                .browser
                .pages()
                .await
                .map_err(SessionError::backend)?;
            if pages.len() > 1 || Instant::now() >= deadline {
                if let Some(p) = pages.into_iter().last() {
                    let _ = p.activate().await;
                    *self.page.lock().expect("页面句柄锁") = p;
                }
                return Ok(());
            }
            sleep(self.poll).await;
        }
    }

    async fn wait_clickable(
        &self,
        loc: &Locator,
        timeout: Duration,
    ) -> Result<Element, SessionError> {
        self.wait_element(loc, timeout, WaitKind::Clickable).await
    }

    async fn wait_present(
        &self,
        loc: &Locator,
        timeout: Duration,
    ) -> Result<Element, SessionError> {
        self.wait_element(loc, timeout, WaitKind::Present).await
    }

    async fn wait_visible(
        &self,
        loc: &Locator,
        timeout: Duration,
    ) -> Result<Element, SessionError> {
        self.wait_element(loc, timeout, WaitKind::Visible).await
    }

    async fn wait_stale(&self, el: &Element, timeout: Duration) -> Result<(), SessionError> {
        // 节点被刷新销毁后，按句柄查询节点描述会出错，以此为失效信号
        let deadline = Instant::now() + timeout;
        loop {
            if el.description().await.is_err() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SessionError::Timeout {
                    what: "旧元素失效".to_string(),
                    after: timeout,
                });
            }
            sleep(self.poll).await;
        }
    }

    async fn click(&self, el: &Element) -> Result<(), SessionError> {
        el.click().await.map(|_| ()).map_err(SessionError::backend)
    }

    async fn script_click(&self, el: &Element) -> Result<(), SessionError> {
        el.call_js_fn("function() { this.click(); }", false)
            .await
            .map(|_| ())
            .map_err(SessionError::backend)
    }

    async fn send_text(&self, el: &Element, text: &str) -> Result<(), SessionError> {
        el.focus().await.map_err(SessionError::backend)?;
        el.type_str(text)
            .await
            .map(|_| ())
            .map_err(SessionError::backend)
    }

    async fn hover(&self, el: &Element) -> Result<(), SessionError> {
        el.hover().await.map(|_| ()).map_err(SessionError::backend)
    }

    async fn scroll_into_view(&self, el: &Element) -> Result<(), SessionError> {
        el.scroll_into_view()
            .await
            .map(|_| ())
            .map_err(SessionError::backend)
    }

    async fn find(&self, loc: &Locator) -> Result<Element, SessionError> {
        self.try_find(loc)
            .await
            .ok_or_else(|| SessionError::NotFound(loc.to_string()))
    }

    async fn find_all(&self, loc: &Locator) -> Result<Vec<Element>, SessionError> {
        let page = self.page();
        match loc {
            Locator::Css(css) => page
                .find_elements(css.as_str())
                .await
                .map_err(|_| SessionError::NotFound(loc.to_string())),
            Locator::LinkText(text) => {
                let anchors = page
                    .find_elements("a")
                    .await
                    .map_err(|_| SessionError::NotFound(loc.to_string()))?;
                let mut out = Vec::new();
                for a in anchors {
                    if let Ok(Some(t)) = a.inner_text().await {
                        if t.trim() == text {
                            out.push(a);
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    async fn find_in(&self, el: &Element, css: &str) -> Result<Element, SessionError> {
        el.find_element(css)
            .await
            .map_err(|_| SessionError::NotFound(css.to_string()))
    }

    async fn find_all_in(&self, el: &Element, css: &str) -> Result<Vec<Element>, SessionError> {
        el.find_elements(css)
            .await
            .map_err(|_| SessionError::NotFound(css.to_string()))
    }

    async fn read_text(&self, el: &Element) -> Result<String, SessionError> {
        let text = el.inner_text().await.map_err(SessionError::backend)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn read_attribute(
        &self,
        el: &Element,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        el.attribute(name).await.map_err(SessionError::backend)
    }

    async fn parent_attribute(
        &self,
        el: &Element,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        let js = format!(
            "function() {{ const p = this.parentElement; return p ? p.getAttribute('{name}') : null; }}"
        );
        let ret = el
            .call_js_fn(js, false)
            .await
            .map_err(SessionError::backend)?;
        Ok(ret
            .result
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string())))
    }
}
