//! REST affiliate backend
//!
//! Talks to a hosted PostgREST-style data API: affiliate lookup by code,
//! click-record insert, and a counter-increment RPC. Calls are issued
//! with a short-timeout blocking agent inside `spawn_blocking`; every
//! failure surfaces as an `anyhow` error for the caller to log and drop.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;
use ureq::Agent;

use super::{Affiliate, AffiliateBackend, ClickRecord};
use crate::clicks::ClickSink;

/// HTTP request timeout.
const HTTP_TIMEOUT_SECS: u64 = 5;

/// Global HTTP agent (ureq's Agent is Send + Sync).
static HTTP_AGENT: OnceLock<Agent> = OnceLock::new();

fn get_agent() -> &'static Agent {
    HTTP_AGENT.get_or_init(|| {
        Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(HTTP_TIMEOUT_SECS)))
            .build()
            .into()
    })
}

#[derive(Clone)]
pub struct RestBackend {
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct IncrementRequest<'a> {
    code: &'a str,
    amount: usize,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn lookup_url(&self, code: &str) -> anyhow::Result<String> {
        let mut url = Url::parse(&format!("{}/affiliates", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("code", &format!("eq.{}", code))
            .append_pair("status", "eq.active")
            .append_pair("select", "id,code,status")
            .append_pair("limit", "1");
        Ok(url.into())
    }

    fn fetch_affiliate_sync(
        url: String,
        api_key: Option<String>,
    ) -> anyhow::Result<Option<Affiliate>> {
        let agent = get_agent();
        let mut request = agent.get(&url);
        if let Some(key) = &api_key {
            request = request
                .header("apikey", key.as_str())
                .header("Authorization", format!("Bearer {}", key));
        }

        let response = request.call()?;
        let mut rows: Vec<Affiliate> = response.into_body().read_json()?;
        Ok(rows.pop())
    }

    fn post_json_sync<T: Serialize>(
        url: String,
        api_key: Option<String>,
        body: T,
    ) -> anyhow::Result<()> {
        let agent = get_agent();
        let mut request = agent.post(&url);
        if let Some(key) = &api_key {
            request = request
                .header("apikey", key.as_str())
                .header("Authorization", format!("Bearer {}", key));
        }

        request.send_json(&body)?;
        Ok(())
    }
}

#[async_trait]
impl AffiliateBackend for RestBackend {
    async fn find_active_affiliate(&self, code: &str) -> anyhow::Result<Option<Affiliate>> {
        let url = self.lookup_url(code)?;
        let api_key = self.api_key.clone();
        tokio::task::spawn_blocking(move || Self::fetch_affiliate_sync(url, api_key)).await?
    }

    async fn insert_click(&self, record: ClickRecord) -> anyhow::Result<()> {
        let url = format!("{}/affiliate_clicks", self.base_url);
        let api_key = self.api_key.clone();
        tokio::task::spawn_blocking(move || Self::post_json_sync(url, api_key, record)).await?
    }
}

#[async_trait]
impl ClickSink for RestBackend {
    async fn flush_clicks(&self, updates: Vec<(String, usize)>) -> anyhow::Result<()> {
        let url = format!("{}/rpc/increment_clicks", self.base_url);
        let api_key = self.api_key.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            for (code, amount) in &updates {
                Self::post_json_sync(
                    url.clone(),
                    api_key.clone(),
                    IncrementRequest {
                        code: code.as_str(),
                        amount: *amount,
                    },
                )?;
            }
            Ok(())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_url_encodes_code() {
        let backend = RestBackend::new("https://api.example.com/rest/v1/", None);
        let url = backend.lookup_url("A&B").unwrap();
        assert!(url.starts_with("https://api.example.com/rest/v1/affiliates?"));
        assert!(url.contains("code=eq.A%26B"));
        assert!(url.contains("status=eq.active"));
    }
}
