use super::{MappingStore, UserAssistantMapping};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// REST row-store backend for the permission relation, one row per
/// (user email, assistant id) pair, in the style of hosted database
/// REST layers: GET with query filters, POST to insert, DELETE with
/// query filters. Field names and auth headers are configurable.
pub struct HttpMappingStore {
    url: String,
    email_field: String,
    assistant_field: String,
    headers: HashMap<String, String>,
    client: Client,
}

impl HttpMappingStore {
    pub fn new(
        url: &str,
        email_field: &Option<String>,
        assistant_field: &Option<String>,
        headers: &Option<HashMap<String, String>>,
    ) -> Self {
        let email_field = email_field
            .as_ref()
            .map_or_else(|| "user_email".to_string(), |s| s.clone());
        let assistant_field = assistant_field
            .as_ref()
            .map_or_else(|| "assistant_id".to_string(), |s| s.clone());

        Self {
            url: url.trim_end_matches('/').to_string(),
            email_field,
            assistant_field,
            headers: headers.clone().unwrap_or_default(),
            client: Client::new(),
        }
    }

    fn filtered_url(&self, filters: &[(&str, &str)]) -> String {
        let mut url = self.url.clone();
        let mut sep = '?';
        for (field, value) in filters {
            url.push(sep);
            url.push_str(field);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
            sep = '&';
        }
        url
    }

    fn apply_headers(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        request
    }

    async fn fetch_rows(&self, filters: &[(&str, &str)]) -> Result<Vec<Value>> {
        let request = self.apply_headers(self.client.get(self.filtered_url(filters)));
        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("mapping store request error: {}", e))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "mapping store request failed with status {}",
                response.status()
            ));
        }
        let rows: Vec<Value> = response.json().await?;
        Ok(rows)
    }

    fn row_field<'a>(&self, row: &'a Value, field: &str) -> Option<&'a str> {
        row.get(field).and_then(Value::as_str)
    }
}

#[async_trait]
impl MappingStore for HttpMappingStore {
    async fn allowed_assistants(&self, user_email: &str) -> Result<HashSet<String>> {
        let email = user_email.to_lowercase();
        let rows = self
            .fetch_rows(&[(self.email_field.as_str(), email.as_str())])
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| self.row_field(row, &self.assistant_field))
            .map(str::to_string)
            .collect())
    }

    async fn all_mappings(&self) -> Result<Vec<UserAssistantMapping>> {
        let rows = self.fetch_rows(&[]).await?;
        let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for row in &rows {
            let (Some(email), Some(assistant_id)) = (
                self.row_field(row, &self.email_field),
                self.row_field(row, &self.assistant_field),
            ) else {
                continue;
            };
            grouped
                .entry(email.to_lowercase())
                .or_default()
                .insert(assistant_id.to_string());
        }
        Ok(grouped
            .into_iter()
            .map(|(user_email, ids)| UserAssistantMapping {
                user_email,
                assistant_ids: ids.into_iter().collect(),
            })
            .collect())
    }

    async fn add_mapping(&self, user_email: &str, assistant_id: &str) -> Result<bool> {
        let email = user_email.to_lowercase();
        // Rows are unique per (email, assistant) pair; an existing row
        // means there is nothing to insert.
        let existing = self
            .fetch_rows(&[
                (self.email_field.as_str(), email.as_str()),
                (self.assistant_field.as_str(), assistant_id),
            ])
            .await?;
        if !existing.is_empty() {
            return Ok(true);
        }

        let mut body = serde_json::Map::new();
        body.insert(self.email_field.clone(), Value::String(email));
        body.insert(
            self.assistant_field.clone(),
            Value::String(assistant_id.to_string()),
        );
        let request = self.apply_headers(self.client.post(&self.url).json(&Value::Object(body)));
        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("mapping store request error: {}", e))?;
        Ok(response.status().is_success())
    }

    async fn remove_mapping(&self, user_email: &str, assistant_id: &str) -> Result<bool> {
        let email = user_email.to_lowercase();
        let url = self.filtered_url(&[
            (self.email_field.as_str(), email.as_str()),
            (self.assistant_field.as_str(), assistant_id),
        ]);
        let request = self.apply_headers(self.client.delete(url));
        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("mapping store request error: {}", e))?;
        Ok(response.status().is_success())
    }
}
