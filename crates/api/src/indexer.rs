//! Subgraph indexer client (C9 input, §6.5).
//!
//! The indexer is a GraphQL endpoint returning a paginated `users { id }`
//! query; the agent pages through it with `(first, skip)` until a page
//! smaller than `first` arrives, which is the only exhaustion signal the
//! interface offers.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// GraphQL client for the borrower-list subgraph.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    client: reqwest::Client,
    url: String,
    page_size: u32,
}

impl IndexerClient {
    pub fn new(url: impl Into<String>, page_size: u32, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            url: url.into(),
            page_size: page_size.max(1),
        }
    }

    /// Fetch the complete borrower list, paging with `(first, skip)` until a
    /// page smaller than `first` arrives (§6.5, §4.9).
    #[instrument(skip(self))]
    pub async fn fetch_all_users(&self) -> Result<Vec<Address>> {
        let mut out = Vec::new();
        let mut skip = 0u32;

        loop {
            let page = self.fetch_page(skip).await?;
            let page_len = page.len() as u32;
            out.extend(page.into_iter().filter_map(|u| u.id.parse::<Address>().ok()));

            debug!(skip, page_len, total = out.len(), "indexer page fetched");

            if page_len < self.page_size {
                break;
            }
            skip += self.page_size;
        }

        Ok(out)
    }

    async fn fetch_page(&self, skip: u32) -> Result<Vec<UserNode>> {
        let query = json!({
            "query": "query Users($first: Int!, $skip: Int!) { users(first: $first, skip: $skip) { id } }",
            "variables": { "first": self.page_size, "skip": skip },
        });

        let response = self
            .client
            .post(&self.url)
            .json(&query)
            .send()
            .await
            .context("indexer request failed")?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "indexer returned non-success status");
            anyhow::bail!("indexer returned HTTP {}", response.status());
        }

        let body: GraphQlResponse = response.json().await.context("malformed indexer response")?;
        if let Some(errors) = body.errors {
            anyhow::bail!("indexer GraphQL errors: {errors:?}");
        }
        Ok(body.data.map(|d| d.users).unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<UsersData>,
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct UsersData {
    users: Vec<UserNode>,
}

#[derive(Debug, Deserialize, Serialize)]
struct UserNode {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_at_least_one() {
        let client = IndexerClient::new("http://localhost", 0, Duration::from_secs(1));
        assert_eq!(client.page_size, 1);
    }
}
