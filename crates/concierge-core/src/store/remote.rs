//! Primary store client: a remote schemaless realtime document tree.
//!
//! The tree speaks a REST dialect where every node is addressable as
//! `{base}/{path}.json` and GET on an absent node returns JSON `null`.
//! Credentials come from the environment; when they are absent the gateway
//! simply runs without a primary store and the flat files carry persistence.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::error::StoreError;
use crate::store::RecordStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client for the realtime document tree.
pub struct RemoteStore {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl RemoteStore {
    /// Build from `CONCIERGE_STORE_URL` / `CONCIERGE_STORE_TOKEN`.
    /// Returns `None` when no URL is configured.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("CONCIERGE_STORE_URL").ok()?;
        let base_url = base_url.trim().to_string();
        if base_url.is_empty() {
            return None;
        }
        let auth_token = std::env::var("CONCIERGE_STORE_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Some(Self::new(base_url, auth_token))
    }

    pub fn new(base_url: String, auth_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        match &self.auth_token {
            Some(token) => format!("{}/{}.json?auth={}", self.base_url, path, token),
            None => format!("{}/{}.json", self.base_url, path),
        }
    }

    async fn check(&self, res: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        Err(StoreError::Http(format!("store error {status}: {body}")))
    }
}

#[async_trait::async_trait]
impl RecordStore for RemoteStore {
    async fn get_all(&self, collection: &str) -> Result<HashMap<String, Value>, StoreError> {
        let res = self
            .client
            .get(self.url(collection))
            .send()
            .await
            .map_err(StoreError::from_reqwest)?;
        let value: Value = self
            .check(res)
            .await?
            .json()
            .await
            .map_err(StoreError::from_reqwest)?;
        match value {
            Value::Null => Ok(HashMap::new()),
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(StoreError::Malformed(format!(
                "expected object at {collection}, got {other}"
            ))),
        }
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let res = self
            .client
            .get(self.url(&format!("{collection}/{id}")))
            .send()
            .await
            .map_err(StoreError::from_reqwest)?;
        let value: Value = self
            .check(res)
            .await?
            .json()
            .await
            .map_err(StoreError::from_reqwest)?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    async fn put(&self, collection: &str, id: &str, value: &Value) -> Result<(), StoreError> {
        let res = self
            .client
            .put(self.url(&format!("{collection}/{id}")))
            .json(value)
            .send()
            .await
            .map_err(StoreError::from_reqwest)?;
        self.check(res).await?;
        Ok(())
    }

    async fn patch(&self, collection: &str, id: &str, value: &Value) -> Result<(), StoreError> {
        let res = self
            .client
            .patch(self.url(&format!("{collection}/{id}")))
            .json(value)
            .send()
            .await
            .map_err(StoreError::from_reqwest)?;
        self.check(res).await?;
        Ok(())
    }

    async fn push(&self, collection: &str, value: &Value) -> Result<String, StoreError> {
        let res = self
            .client
            .post(self.url(collection))
            .json(value)
            .send()
            .await
            .map_err(StoreError::from_reqwest)?;
        let body: Value = self
            .check(res)
            .await?
            .json()
            .await
            .map_err(StoreError::from_reqwest)?;
        body.get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Malformed("push response missing generated key".into()))
    }

    // The REST dialect exposes no transaction primitive, so the bump is a
    // read-then-put. The counter is advisory; the canonical user total is the
    // aggregator's union-dedup count.
    async fn increment_counter(&self, path: &str) -> Result<i64, StoreError> {
        let current = match self.client.get(self.url(path)).send().await {
            Ok(res) => self
                .check(res)
                .await?
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
            Err(err) => return Err(StoreError::from_reqwest(err)),
        };
        let next = current + 1;
        let res = self
            .client
            .put(self.url(path))
            .json(&Value::from(next))
            .send()
            .await
            .map_err(StoreError::from_reqwest)?;
        self.check(res).await?;
        Ok(next)
    }
}
