use crate::assistant::{AssistantFetcher, AssistantInfo};
use crate::callrecord::RawCall;
use crate::config::CallsApiConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Upstream calls API surface the orchestrator depends on.
#[async_trait]
pub trait CallsApi: Send + Sync {
    /// Bulk call listing, optionally filtered server-side by assistant
    /// ids (empty slice means no filter).
    async fn list_calls(&self, assistant_ids: &[String]) -> Result<Vec<RawCall>>;

    /// Single call lookup; a 404 is `Ok(None)`, not an error.
    async fn get_call(&self, call_id: &str) -> Result<Option<RawCall>>;
}

/// Bearer-token HTTP client for the hosted voice-AI calls API.
pub struct CallsApiClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl CallsApiClient {
    pub fn new(config: &CallsApiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!("calls api key is not configured"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn list_calls_url(&self, assistant_ids: &[String]) -> String {
        let mut url = format!("{}/call", self.base_url);
        let mut sep = '?';
        for id in assistant_ids {
            url.push(sep);
            url.push_str("assistantId=");
            url.push_str(&urlencoding::encode(id));
            sep = '&';
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<Option<T>> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| anyhow!("calls api request error: {}", e))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(anyhow!("calls api request failed with status {}", status)),
        }
    }
}

#[async_trait]
impl CallsApi for CallsApiClient {
    async fn list_calls(&self, assistant_ids: &[String]) -> Result<Vec<RawCall>> {
        let calls: Option<Vec<RawCall>> = self.get_json(self.list_calls_url(assistant_ids)).await?;
        Ok(calls.unwrap_or_default())
    }

    async fn get_call(&self, call_id: &str) -> Result<Option<RawCall>> {
        let url = format!("{}/call/{}", self.base_url, urlencoding::encode(call_id));
        self.get_json(url).await
    }
}

#[async_trait]
impl AssistantFetcher for CallsApiClient {
    async fn fetch_assistant(&self, assistant_id: &str) -> Result<Option<AssistantInfo>> {
        let url = format!(
            "{}/assistant/{}",
            self.base_url,
            urlencoding::encode(assistant_id)
        );
        let payload: Option<Value> = self.get_json(url).await?;
        Ok(payload.map(|value| assistant_from_payload(assistant_id, &value)))
    }
}

// The assistant payload drifted too: the phone number may be a bare
// string or an object carrying a `number` field.
fn assistant_from_payload(assistant_id: &str, value: &Value) -> AssistantInfo {
    let phone_number = value
        .get("phoneNumber")
        .or_else(|| value.get("phone_number"))
        .and_then(|p| match p {
            Value::String(s) => Some(s.clone()),
            other => other
                .get("number")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    AssistantInfo {
        id: value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(assistant_id)
            .to_string(),
        name: value
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string),
        phone_number,
    }
}
