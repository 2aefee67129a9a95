use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::ActionsConfig;
use crate::error::Error;

/// Task board snapshot: column name → items, in backend order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskBoard {
    #[serde(default)]
    pub data: serde_json::Map<String, Value>,
}

impl TaskBoard {
    /// Per-column item counts, preserving backend column order.
    pub fn column_counts(&self) -> Vec<(&str, usize)> {
        self.data
            .iter()
            .map(|(column, items)| {
                (
                    column.as_str(),
                    items.as_array().map(Vec::len).unwrap_or(0),
                )
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Deployment phase and its action list.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployPlan {
    pub phase: Option<String>,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// Normalized payload of a named resource lookup.
///
/// The backend answers with `{data: string | {url} | object}`; the three
/// shapes are resolved here so handlers never see the raw value.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourcePayload {
    Text(String),
    Link(String),
    Raw(Value),
}

/// Trait for the structured-action backend (tasks, orders, deployments,
/// named resources). Implementors must be thread-safe (`Send + Sync`).
pub trait ActionsBackend: Send + Sync {
    fn task_board(&self) -> impl std::future::Future<Output = Result<TaskBoard, Error>> + Send;

    /// Order count, optionally filtered by status.
    fn orders(
        &self,
        status: Option<&str>,
    ) -> impl std::future::Future<Output = Result<u64, Error>> + Send;

    fn deploy(
        &self,
        phase: Option<&str>,
    ) -> impl std::future::Future<Output = Result<DeployPlan, Error>> + Send;

    fn resource(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<ResourcePayload, Error>> + Send;

    /// Liveness probe.
    fn ping(&self) -> impl std::future::Future<Output = Result<(), Error>> + Send;
}

/// HTTP client for the structured-action backend.
///
/// Every request carries the fixed bearer credential; a non-2xx response or
/// transport error becomes an `Error` surfaced at the call site, never retried.
pub struct ActionsClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ActionsClient {
    pub fn new(config: &ActionsConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, Error> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

impl ActionsBackend for ActionsClient {
    async fn task_board(&self) -> Result<TaskBoard, Error> {
        let value = self.post("/commands/tasks/status", json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn orders(&self, status: Option<&str>) -> Result<u64, Error> {
        let value = self.post("/commands/orders/list", orders_body(status)).await?;
        Ok(parse_order_count(&value))
    }

    async fn deploy(&self, phase: Option<&str>) -> Result<DeployPlan, Error> {
        let value = self.post("/commands/deploy", deploy_body(phase)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn resource(&self, name: &str) -> Result<ResourcePayload, Error> {
        let value = self.post(&format!("/commands/{name}"), json!({})).await?;
        Ok(normalize_resource(value))
    }

    async fn ping(&self) -> Result<(), Error> {
        self.post("/health", json!({})).await.map(|_| ())
    }
}

/// `{status}` filter body; no filter means an empty body, never an error.
fn orders_body(status: Option<&str>) -> Value {
    match status {
        Some(status) => json!({ "status": status }),
        None => json!({}),
    }
}

fn deploy_body(phase: Option<&str>) -> Value {
    match phase {
        Some(phase) => json!({ "phase": phase }),
        None => json!({}),
    }
}

fn parse_order_count(value: &Value) -> u64 {
    value.get("count").and_then(Value::as_u64).unwrap_or(0)
}

/// Resolve the resource payload shape: plain string, `{url}` object, or
/// anything else verbatim.
fn normalize_resource(value: Value) -> ResourcePayload {
    let payload = match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    match payload {
        Value::String(text) => ResourcePayload::Text(text),
        Value::Object(map) => match map.get("url").and_then(Value::as_str) {
            Some(url) => ResourcePayload::Link(url.to_string()),
            None => ResourcePayload::Raw(Value::Object(map)),
        },
        other => ResourcePayload::Raw(other),
    }
}
