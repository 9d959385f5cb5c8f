//! Hand-rolled JSON-RPC 1.0 client for the upstream Bitcoin node, modeled
//! on the legacy `getwork`/`getblockcount`/`getblockhash` method set.
use pd_core::error::UpstreamError;
use pd_core::types::Template;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    url: String,
    user: String,
    password: String,
}

impl UpstreamClient {
    pub fn new(url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("build reqwest client"),
            url: url.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, UpstreamError> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": "pool-dance",
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    UpstreamError::Unreachable
                } else {
                    UpstreamError::Request(e.to_string())
                }
            })?;

        let value: Value = resp
            .json()
            .await
            .map_err(|e| UpstreamError::MalformedResponse(e.to_string()))?;

        if let Some(err) = value.get("error") {
            if !err.is_null() {
                let code = err.get("code").and_then(Value::as_i64).unwrap_or(-1);
                let message = err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(UpstreamError::Rpc { code, message });
            }
        }

        let result = value.get("result").cloned().unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| UpstreamError::MalformedResponse(e.to_string()))
    }

    /// `getwork` with no arguments: requests a new block template.
    pub async fn get_work(&self) -> Result<Template, UpstreamError> {
        self.call("getwork", json!([])).await
    }

    /// `getwork` with the miner's submitted data as its sole argument:
    /// the legacy way of submitting a solved share upstream.
    pub async fn submit_work(&self, data: &str) -> Result<bool, UpstreamError> {
        self.call("getwork", json!([data])).await
    }

    pub async fn get_block_count(&self) -> Result<u64, UpstreamError> {
        self.call("getblockcount", json!([])).await
    }

    pub async fn get_block_hash(&self, height: u64) -> Result<String, UpstreamError> {
        self.call("getblockhash", json!([height])).await
    }
}
