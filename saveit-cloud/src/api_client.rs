//! HTTP client for the dashboard's ledger API.
//!
//! Used from the extension's privileged context, which cannot reach the
//! database directly. All bodies are JSON with camelCase keys. An optional
//! bearer token is attached to every request once set.

use crate::config::CloudConfig;
use crate::error::{CloudError, CloudResult};
use crate::ledger::RemoteLedger;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use saveit_types::{AccountId, AccountUsage, CommitOutcome, Item, RemoteId, RemoteItem};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// HTTP client for the SaveIt ledger API.
#[derive(Clone)]
pub struct LedgerApiClient {
    client: Client,
    config: CloudConfig,
    token: Arc<RwLock<Option<String>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_saved_count: u64,
    #[serde(default)]
    is_pro: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitRequest<'a> {
    user_id: &'a AccountId,
    item: &'a Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
}

impl LedgerApiClient {
    pub fn new(config: CloudConfig) -> CloudResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CloudError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Sets the bearer token sent with every request.
    pub async fn set_token(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> CloudResult<reqwest::Response> {
        let req = match self.token.read().await.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        req.send().await.map_err(CloudError::from_send)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> CloudResult<reqwest::Response> {
        debug!("POST {path}");
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> CloudResult<reqwest::Response> {
        debug!("GET {path}");
        self.send(self.client.get(self.url(path)).query(query)).await
    }
}

fn api_error(e: reqwest::Error) -> CloudError {
    CloudError::Api(e.to_string())
}

#[async_trait]
impl RemoteLedger for LedgerApiClient {
    async fn get_usage(&self, account_id: &AccountId) -> CloudResult<AccountUsage> {
        let resp: StatsResponse = self
            .post(
                "/api/user-stats",
                &serde_json::json!({ "userId": account_id }),
            )
            .await?
            .error_for_status()
            .map_err(api_error)?
            .json()
            .await?;

        Ok(AccountUsage {
            account_id: account_id.clone(),
            lifetime_saved_count: resp.total_saved_count,
            is_pro: resp.is_pro,
        })
    }

    async fn commit_item(
        &self,
        account_id: &AccountId,
        item: &Item,
        cap: Option<u64>,
    ) -> CloudResult<CommitOutcome> {
        let resp = self
            .post(
                "/api/items",
                &CommitRequest {
                    user_id: account_id,
                    item,
                    limit: cap,
                },
            )
            .await?;

        // 402 carries a LimitReached outcome with the current usage.
        if resp.status() == StatusCode::PAYMENT_REQUIRED {
            return Ok(resp.json().await?);
        }

        Ok(resp.error_for_status().map_err(api_error)?.json().await?)
    }

    async fn delete_item(&self, remote_id: &RemoteId) -> CloudResult<bool> {
        let resp = self
            .post(
                "/api/delete-item",
                &serde_json::json!({ "itemId": remote_id }),
            )
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        resp.error_for_status().map_err(api_error)?;
        Ok(true)
    }

    async fn existing_ids(&self, ids: &[RemoteId]) -> CloudResult<Vec<RemoteId>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Resp {
            existing_ids: Vec<RemoteId>,
        }

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let data: Resp = self
            .post("/api/check-items", &serde_json::json!({ "itemIds": ids }))
            .await?
            .error_for_status()
            .map_err(api_error)?
            .json()
            .await?;
        Ok(data.existing_ids)
    }

    async fn list_items(&self, account_id: &AccountId) -> CloudResult<Vec<RemoteItem>> {
        #[derive(Deserialize)]
        struct Resp {
            items: Vec<RemoteItem>,
        }

        let data: Resp = self
            .get("/api/items", &[("userId", account_id.as_str())])
            .await?
            .error_for_status()
            .map_err(api_error)?
            .json()
            .await?;
        Ok(data.items)
    }
}
