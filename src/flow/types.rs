//! Registry records and Access API payloads

use super::cadence::{CadenceError, Value};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A hotspot as stored in the on-chain registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub id: u64,
    pub owner: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub online: bool,
    /// Unix seconds of the last registry write
    pub last_updated: f64,
    pub total_uptime: f64,
}

impl Hotspot {
    pub fn has_location(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.last_updated as i64, 0).single()
    }
}

impl TryFrom<&Value> for Hotspot {
    type Error = CadenceError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.field("id")?.as_u64()?,
            owner: value.field("owner")?.as_str()?.to_string(),
            lat: optional_f64(value.field("lat")?)?,
            lng: optional_f64(value.field("lng")?)?,
            online: value.field("online")?.as_bool()?,
            last_updated: value.field("lastUpdated")?.as_f64()?,
            total_uptime: value.field("totalUptime")?.as_f64()?,
        })
    }
}

fn optional_f64(value: &Value) -> Result<Option<f64>, CadenceError> {
    value.optional().map(Value::as_f64).transpose()
}

/// A HotspotOperatorNFT held in a user's collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorNft {
    pub id: u64,
    pub uuid: Option<u64>,
    pub metadata: BTreeMap<String, String>,
    /// Balance of the attached rewards vault, if the NFT carries one
    pub rewards_balance: Option<f64>,
}

impl OperatorNft {
    pub fn name(&self) -> &str {
        self.metadata
            .get("name")
            .map(String::as_str)
            .unwrap_or("Unnamed NFT")
    }
}

impl TryFrom<&Value> for OperatorNft {
    type Error = CadenceError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let id = value.field("id")?.as_u64()?;
        let uuid = value.field("uuid").ok().and_then(|v| v.as_u64().ok());

        let mut metadata = BTreeMap::new();
        if let Ok(meta) = value.field("metadata") {
            collect_strings(meta, &mut metadata);
        }

        let rewards_balance = match value.field("rewardsVault").ok().and_then(Value::optional) {
            Some(vault) => Some(vault.field("balance")?.as_f64()?),
            None => None,
        };

        Ok(Self {
            id,
            uuid,
            metadata,
            rewards_balance,
        })
    }
}

/// Flatten scalar entries of a metadata struct or dictionary
fn collect_strings(value: &Value, out: &mut BTreeMap<String, String>) {
    let entries: Vec<(String, &Value)> = match value.optional() {
        Some(Value::Composite { fields, .. }) => {
            fields.iter().map(|(k, v)| (k.clone(), v)).collect()
        }
        Some(Value::Dictionary(entries)) => entries
            .iter()
            .filter_map(|(k, v)| k.as_str().ok().map(|k| (k.to_string(), v)))
            .collect(),
        _ => return,
    };

    for (key, val) in entries {
        let text = match val.optional() {
            Some(Value::String(s)) | Some(Value::Address(s)) => s.clone(),
            Some(Value::Number { repr, .. }) => repr.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => continue,
        };
        out.insert(key, text);
    }
}

/// A generated coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.8}, {:.8})", self.lat, self.lng)
    }
}

/// Result of an admin write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Sealed { id: String },
    /// Every admin key had a transaction in flight
    Skipped,
}

/// `GET /v1/accounts/{address}?expand=keys`
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub address: String,
    /// Balance in the smallest unit (1e-8 FLOW)
    #[serde(deserialize_with = "de_u64_string")]
    pub balance: u64,
    #[serde(default)]
    pub keys: Vec<AccountKey>,
}

impl Account {
    pub fn key(&self, index: u32) -> Option<&AccountKey> {
        self.keys.iter().find(|k| k.index == index)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountKey {
    #[serde(deserialize_with = "de_u32_string")]
    pub index: u32,
    pub public_key: String,
    #[serde(deserialize_with = "de_u64_string")]
    pub sequence_number: u64,
    #[serde(default)]
    pub revoked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeader {
    pub id: String,
    pub height: String,
}

/// Lifecycle states reported by `GET /v1/transaction_results/{id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TxStatus {
    Pending,
    Finalized,
    Executed,
    Sealed,
    Expired,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResult {
    pub status: TxStatus,
    #[serde(default)]
    pub status_code: u32,
    #[serde(default)]
    pub error_message: String,
}

/// Body of `POST /v1/transactions`
#[derive(Debug, Clone, Serialize)]
pub struct TransactionBody {
    pub script: String,
    pub arguments: Vec<String>,
    pub reference_block_id: String,
    pub gas_limit: String,
    pub payer: String,
    pub proposal_key: ProposalKeyBody,
    pub authorizers: Vec<String>,
    pub payload_signatures: Vec<SignatureBody>,
    pub envelope_signatures: Vec<SignatureBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposalKeyBody {
    pub address: String,
    pub key_index: String,
    pub sequence_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignatureBody {
    pub address: String,
    pub key_index: String,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedTransaction {
    pub id: String,
}

fn de_u64_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

fn de_u32_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}
