use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::gateway::messages::{parse_search_response, RawListing, SearchRequest};
use crate::gateway::MarketplaceGateway;
use crate::types::QueryCriteria;

/// `reqwest`-backed gateway for the public P2P search endpoint.
#[derive(Debug, Clone)]
pub struct P2pClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl P2pClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    async fn search(
        &self,
        criteria: &QueryCriteria,
    ) -> std::result::Result<Vec<RawListing>, GatewayError> {
        let request = SearchRequest::first_page(criteria);

        let resp = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Http(status.as_u16()));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| self.classify(e))?;
        let listings = parse_search_response(&body);
        debug!(
            asset = %criteria.asset,
            fiat = %criteria.fiat,
            trade_type = %criteria.trade_type,
            count = listings.len(),
            "P2P search answered"
        );
        Ok(listings)
    }

    fn classify(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else if let Some(status) = e.status() {
            GatewayError::Http(status.as_u16())
        } else if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl MarketplaceGateway for P2pClient {
    async fn fetch_listings(
        &self,
        criteria: &QueryCriteria,
    ) -> std::result::Result<Vec<RawListing>, GatewayError> {
        self.search(criteria).await
    }
}
