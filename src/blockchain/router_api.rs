//! HTTP client for the route-aggregation API.

use async_trait::async_trait;
use ethers::types::Address;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::traits::Router;
use super::types::{
    IndexedTransaction, Route, RouteRequest, RouterChain, TokenMapping, TransactionQuery,
    UnsignedTransfer,
};
use crate::core::errors::{HarnessError, Result};

/// Router API client
pub struct RouterApiClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChainsResponse {
    chains: Vec<RouterChain>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenMappingsResponse {
    token_mappings: Vec<TokenMapping>,
}

#[derive(Debug, Deserialize)]
struct RoutesResponse {
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Vec<IndexedTransaction>,
}

impl RouterApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HarnessError::Router(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarnessError::Router(format!("{} returned {}: {}", what, status, body)));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| HarnessError::Router(format!("{}: invalid response body: {}", what, e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        debug!(path, "GET router");
        let response = self.client.get(self.url(path)).query(query).send().await?;
        Self::decode(response, path).await
    }

    async fn post<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        debug!(path, "POST router");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::decode(response, path).await
    }
}

fn hex_address(address: Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

#[async_trait]
impl Router for RouterApiClient {
    async fn get_all_chains(&self) -> Result<Vec<RouterChain>> {
        let response: ChainsResponse = self.get("/chains", &[]).await?;
        Ok(response.chains)
    }

    async fn get_token_mappings(&self, token_address: Address) -> Result<Vec<TokenMapping>> {
        let response: TokenMappingsResponse = self
            .get("/token-mappings", &[("tokenAddress", hex_address(token_address))])
            .await?;
        Ok(response.token_mappings)
    }

    async fn get_routes(&self, request: &RouteRequest) -> Result<Vec<Route>> {
        let response: RoutesResponse = self.post("/routes", request).await?;
        Ok(response.routes)
    }

    async fn get_unsigned_transaction(&self, route: &Route) -> Result<UnsignedTransfer> {
        self.post("/routes/build-transaction", route).await
    }

    async fn get_claim_unsigned_transaction(
        &self,
        source_network_id: u32,
        deposit_count: u64,
    ) -> Result<UnsignedTransfer> {
        self.get(
            "/claim-transaction",
            &[
                ("sourceNetworkId", source_network_id.to_string()),
                ("depositCount", deposit_count.to_string()),
            ],
        )
        .await
    }

    async fn get_transactions(&self, query: &TransactionQuery) -> Result<Vec<IndexedTransaction>> {
        let mut params = vec![("limit", query.limit.to_string())];
        if let Some(address) = query.address {
            params.push(("userAddress", hex_address(address)));
        }
        if let Some(sort) = &query.sort {
            params.push(("sort", sort.clone()));
        }
        let response: TransactionsResponse = self.get("/transactions", &params).await?;
        Ok(response.transactions)
    }
}
