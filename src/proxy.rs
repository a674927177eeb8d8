//! 代理池客户端。
//! 租约在会话启动前校验一次，校验不过就释放换新，不算任务失败。

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::app::config::ProxyConfig;

#[derive(Debug, Deserialize)]
struct LeaseResponse {
    proxy: Option<String>,
}

pub struct ProxyBroker {
    cfg: ProxyConfig,
    client: reqwest::Client,
}

impl ProxyBroker {
    pub fn new(cfg: ProxyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.probe_timeout_secs))
            .build()
            .context("创建代理池客户端失败")?;
        Ok(Self { cfg, client })
    }

    pub async fn lease(&self) -> Result<String> {
        let url = format!("{}/get/", self.cfg.api_base.trim_end_matches('/'));
        let resp: LeaseResponse = self
            .client
            .get(&url)
            .send()
            .await
            .context("请求代理池失败")?
            .json()
            .await
            .context("解析代理池响应失败")?;
        resp.proxy.ok_or_else(|| anyhow!("代理池返回为空"))
    }

    pub async fn release(&self, proxy: &str) {
        let url = format!(
            "{}/delete/?proxy={}",
            self.cfg.api_base.trim_end_matches('/'),
            proxy
        );
        if let Err(e) = self.client.get(&url).send().await {
            warn!("释放代理 {} 失败: {}", proxy, e);
        }
    }

    /// 通过代理访问外部探测地址验证可达性，尽力而为
    pub async fn validate(&self, proxy: &str) -> bool {
        let proxied = match reqwest::Proxy::http(format!("http://{proxy}")) {
            Ok(p) => p,
            Err(_) => return false,
        };
        let client = match reqwest::Client::builder()
            .proxy(proxied)
            .timeout(Duration::from_secs(self.cfg.probe_timeout_secs))
            .build()
        {
            Ok(c) => c,
            Err(_) => return false,
        };
        client.get(&self.cfg.probe_url).send().await.is_ok()
    }

    /// 租一个校验通过的代理；不可达的立刻释放并换下一个，有尝试上限
    pub async fn lease_validated(&self) -> Result<String> {
        for attempt in 1..=self.cfg.max_attempts {
            let proxy = self.lease().await.context("向代理池租用代理失败")?;
            if self.validate(&proxy).await {
                info!("Using proxy: {}", proxy);
                return Ok(proxy);
            }
            warn!(
                "代理 {} 不可达，重新租用 ({}/{})",
                proxy, attempt, self.cfg.max_attempts
            );
            self.release(&proxy).await;
        }
        Err(anyhow!("连续 {} 次未能租到可用代理", self.cfg.max_attempts))
    }
}
