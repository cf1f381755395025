//! Lightweight client for the chain's REST Access API
//!
//! Implements the handful of endpoints the keeper needs:
//! 1. Run read-only scripts via POST /v1/scripts
//! 2. Read account keys and balances via GET /v1/accounts/{address}
//! 3. Submit signed transactions via POST /v1/transactions
//! 4. Poll GET /v1/transaction_results/{id} until sealed
//!
//! Reference: <https://developers.flow.com/http-api>

use super::cadence::{Argument, Value};
use super::types::{
    Account, Block, SubmittedTransaction, TransactionBody, TransactionResult, TxStatus,
};
use anyhow::{Context, Result};
use base64::Engine;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const SEAL_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("access node returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transaction {id} failed with code {code}: {message}")]
    Reverted {
        id: String,
        code: u32,
        message: String,
    },
    #[error("transaction {id} expired before sealing")]
    Expired { id: String },
    #[error("transaction {id} not sealed within {timeout:?}")]
    Timeout { id: String, timeout: Duration },
}

/// HTTP client bound to one access node
#[derive(Debug, Clone)]
pub struct AccessClient {
    base_url: String,
    http: Client,
}

impl AccessClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build reqwest client")?;

        info!("Access API client created for {}", base_url);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a read-only script against the latest sealed block
    pub async fn execute_script(&self, code: &str, args: &[Argument]) -> Result<Value> {
        let url = format!("{}/v1/scripts?block_height=sealed", self.base_url);
        let body = json!({
            "script": b64(code.as_bytes()),
            "arguments": args.iter().map(|a| b64(&a.encode())).collect::<Vec<_>>(),
        });

        debug!("Executing script ({} bytes, {} args)", code.len(), args.len());

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("failed to send script request")?;

        // The result is a JSON string holding base64 encoded JSON-Cadence
        let encoded: String = read_json(resp).await?;
        decode_script_result(&encoded)
    }

    pub async fn get_account(&self, address: &str) -> Result<Account> {
        let url = format!(
            "{}/v1/accounts/{}?expand=keys",
            self.base_url,
            address.trim_start_matches("0x")
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to fetch account {}", address))?;
        read_json(resp).await
    }

    pub async fn latest_sealed_block_id(&self) -> Result<String> {
        let url = format!("{}/v1/blocks?height=sealed", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("failed to fetch latest sealed block")?;
        let blocks: Vec<Block> = read_json(resp).await?;
        let header = blocks
            .into_iter()
            .next()
            .map(|b| b.header)
            .ok_or_else(|| anyhow::anyhow!("access node returned no sealed block"))?;
        debug!("Reference block {} at height {}", header.id, header.height);
        Ok(header.id)
    }

    /// Submit a signed transaction, returning its id
    pub async fn send_transaction(&self, tx: &TransactionBody) -> Result<String> {
        let url = format!("{}/v1/transactions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(tx)
            .send()
            .await
            .context("failed to submit transaction")?;
        let submitted: SubmittedTransaction = read_json(resp).await?;
        Ok(submitted.id)
    }

    pub async fn transaction_result(&self, id: &str) -> Result<TransactionResult> {
        let url = format!("{}/v1/transaction_results/{}", self.base_url, id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to fetch result of {}", id))?;
        read_json(resp).await
    }

    /// Poll until the transaction is sealed, failing on revert or expiry
    pub async fn wait_sealed(&self, id: &str, timeout: Duration) -> Result<TransactionResult> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self.transaction_result(id).await {
                Ok(result) => {
                    if !result.error_message.is_empty() {
                        return Err(AccessError::Reverted {
                            id: id.to_string(),
                            code: result.status_code,
                            message: result.error_message,
                        }
                        .into());
                    }
                    match result.status {
                        TxStatus::Sealed => {
                            debug!("Transaction {} sealed", id);
                            return Ok(result);
                        }
                        TxStatus::Expired => {
                            return Err(AccessError::Expired { id: id.to_string() }.into())
                        }
                        status => debug!("Transaction {} is {:?}", id, status),
                    }
                }
                // Results can 404 briefly right after submission
                Err(e) => warn!("Polling transaction {}: {}", id, e),
            }

            if tokio::time::Instant::now() + SEAL_POLL_INTERVAL > deadline {
                return Err(AccessError::Timeout {
                    id: id.to_string(),
                    timeout,
                }
                .into());
            }
            tokio::time::sleep(SEAL_POLL_INTERVAL).await;
        }
    }
}

pub(crate) fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn decode_script_result(encoded: &str) -> Result<Value> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .context("script result is not base64")?;
    let doc: serde_json::Value =
        serde_json::from_slice(&raw).context("script result is not JSON")?;
    Ok(Value::from_json(&doc)?)
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AccessError::Status {
            status: status.as_u16(),
            body,
        }
        .into());
    }
    resp.json::<T>()
        .await
        .context("failed to decode access node response")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client =
            AccessClient::new("https://rest-testnet.onflow.org/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://rest-testnet.onflow.org");
    }

    #[test]
    fn test_decode_script_result() {
        let doc = br#"{"type":"Array","value":[{"type":"UInt64","value":"9"}]}"#;
        let value = decode_script_result(&b64(doc)).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_u64().unwrap(), 9);
    }

    #[test]
    fn test_decode_script_result_rejects_garbage() {
        assert!(decode_script_result("***").is_err());
        assert!(decode_script_result(&b64(b"not json")).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_node_is_an_error() {
        let client = AccessClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(client.latest_sealed_block_id().await.is_err());
    }
}
