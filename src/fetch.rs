//! HTTP page fetching.
//!
//! [`HttpBrowser`] hands out [`HttpSession`]s, each with its own
//! `reqwest::Client` (and so its own connection pool). Pages are fetched
//! as served; no scripts run.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use corpus_qa_core::browse::{Browser, PageSession};
use corpus_qa_core::models::FetchedPage;

pub struct HttpBrowser {
    user_agent: String,
}

impl HttpBrowser {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn launch(&self) -> Result<Box<dyn PageSession>> {
        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .build()
            .context("Failed to create HTTP client")?;
        tracing::debug!("browsing session started");
        Ok(Box::new(HttpSession {
            client,
            pages_loaded: 0,
        }))
    }
}

pub struct HttpSession {
    client: reqwest::Client,
    pages_loaded: u64,
}

#[async_trait]
impl PageSession for HttpSession {
    async fn load(&mut self, url: &str, timeout: Duration) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("Failed to load {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Loading {} returned {}", url, status);
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;

        self.pages_loaded += 1;
        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        tracing::debug!(pages_loaded = self.pages_loaded, "browsing session closed");
        Ok(())
    }
}
