use super::access::{b64, AccessClient};
use super::cadence::{resolve_imports, Argument};
use super::scripts;
use super::signer::{AdminSigner, UnsignedTransaction};
use super::types::{
    Hotspot, Location, OperatorNft, ProposalKeyBody, SignatureBody, TransactionBody, TxOutcome,
};
use super::Registry;
use crate::config::FlowConfig;
use crate::keys::KeyPool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Smallest units per FLOW
const FLOW_DECIMALS: f64 = 100_000_000.0;

/// Registry reads and admin-signed registry writes
#[derive(Clone)]
pub struct FlowService {
    access: AccessClient,
    aliases: BTreeMap<String, String>,
    gas_limit: u64,
    seal_timeout: Duration,
    signer: Option<Arc<AdminSigner>>,
    pool: KeyPool,
}

impl FlowService {
    /// A service that can only run scripts
    pub fn read_only(config: &FlowConfig) -> Result<Self> {
        let access = AccessClient::new(config.access_node(), config.request_timeout)?;
        Ok(Self {
            access,
            aliases: config.contract_aliases(),
            gas_limit: config.gas_limit,
            seal_timeout: config.seal_timeout,
            signer: None,
            pool: KeyPool::new(0),
        })
    }

    /// A service that signs writes with `signer`, rotating over `pool`
    pub fn with_signer(config: &FlowConfig, signer: AdminSigner, pool: KeyPool) -> Result<Self> {
        let mut service = Self::read_only(config)?;
        info!(
            "Admin signer {} with {} rotating keys",
            signer.address(),
            pool.capacity()
        );
        service.signer = Some(Arc::new(signer));
        service.pool = pool;
        Ok(service)
    }

    pub fn key_pool(&self) -> &KeyPool {
        &self.pool
    }

    pub fn signer(&self) -> Option<&AdminSigner> {
        self.signer.as_deref()
    }

    async fn query(&self, code: &str, args: &[Argument]) -> Result<super::cadence::Value> {
        let script = resolve_imports(code, &self.aliases);
        self.access.execute_script(&script, args).await
    }

    pub async fn operator_nfts(&self, address: &str) -> Result<Vec<OperatorNft>> {
        let result = self
            .query(
                scripts::GET_OPERATOR_NFTS,
                &[Argument::Address(address.to_string())],
            )
            .await?;

        result
            .as_array()?
            .iter()
            .map(|v| OperatorNft::try_from(v).map_err(anyhow::Error::from))
            .collect()
    }

    pub async fn owns_operator_nft(&self, address: &str) -> Result<bool> {
        let result = self
            .query(
                scripts::OWNS_OPERATOR_NFT,
                &[Argument::Address(address.to_string())],
            )
            .await?;
        Ok(result.as_bool()?)
    }

    /// Account balance in FLOW
    pub async fn flow_balance(&self, address: &str) -> Result<f64> {
        let account = self.access.get_account(address).await?;
        Ok(account.balance as f64 / FLOW_DECIMALS)
    }

    /// Register `count` more copies of the admin public key
    pub async fn add_keys(&self, public_key_hex: &str, count: u32) -> Result<TxOutcome> {
        self.send_admin_transaction(
            "add-keys",
            scripts::ADD_ADMIN_KEYS,
            vec![
                Argument::String(public_key_hex.trim_start_matches("0x").to_string()),
                Argument::Int(i64::from(count)),
            ],
        )
        .await
    }

    /// Empty transaction, used to exercise key rotation
    pub async fn probe(&self) -> Result<TxOutcome> {
        self.send_admin_transaction("probe", scripts::PROBE, Vec::new())
            .await
    }

    /// Sign and submit an admin transaction on a leased key, then wait for
    /// it to seal. Returns `Skipped` without any network I/O when every key
    /// is busy.
    pub async fn send_admin_transaction(
        &self,
        label: &str,
        code: &str,
        args: Vec<Argument>,
    ) -> Result<TxOutcome> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no admin signer configured"))?;

        let Some(lease) = self.pool.try_acquire() else {
            warn!(
                "All {} admin keys busy, skipping {}",
                self.pool.capacity(),
                label
            );
            return Ok(TxOutcome::Skipped);
        };
        let key_index = u32::try_from(lease.index()).context("key index out of range")?;

        let account = self.access.get_account(signer.address()).await?;
        let key = account
            .key(key_index)
            .ok_or_else(|| anyhow::anyhow!("admin account has no key #{}", key_index))?;
        if key.revoked {
            anyhow::bail!("admin key #{} is revoked", key_index);
        }
        if !same_public_key(&key.public_key, &signer.public_key_hex()) {
            anyhow::bail!("admin key #{} does not match the configured signer", key_index);
        }
        let sequence_number = key.sequence_number;
        let reference_block_id = self.access.latest_sealed_block_id().await?;

        let script = resolve_imports(code, &self.aliases);
        let arguments: Vec<Vec<u8>> = args.iter().map(Argument::encode).collect();
        let address = rest_address(signer.address());

        let unsigned = UnsignedTransaction {
            script,
            arguments,
            reference_block_id,
            gas_limit: self.gas_limit,
            proposer: address.clone(),
            key_index,
            sequence_number,
            payer: address.clone(),
            authorizers: vec![address.clone()],
        };
        let signature = signer.sign_envelope(&unsigned)?;

        let body = TransactionBody {
            script: b64(unsigned.script.as_bytes()),
            arguments: unsigned.arguments.iter().map(|a| b64(a)).collect(),
            reference_block_id: unsigned.reference_block_id.clone(),
            gas_limit: self.gas_limit.to_string(),
            payer: address.clone(),
            proposal_key: ProposalKeyBody {
                address: address.clone(),
                key_index: key_index.to_string(),
                sequence_number: sequence_number.to_string(),
            },
            authorizers: vec![address.clone()],
            payload_signatures: Vec::new(),
            envelope_signatures: vec![SignatureBody {
                address,
                key_index: key_index.to_string(),
                signature: b64(&signature),
            }],
        };

        let id = self.access.send_transaction(&body).await?;
        info!("Submitted {} as {} (key #{})", label, id, key_index);

        self.access.wait_sealed(&id, self.seal_timeout).await?;
        info!("Transaction {} sealed, releasing key #{}", id, key_index);
        drop(lease);

        Ok(TxOutcome::Sealed { id })
    }
}

#[async_trait]
impl Registry for FlowService {
    async fn all_hotspots(&self) -> Result<Vec<Hotspot>> {
        let result = self.query(scripts::GET_ALL_HOTSPOTS, &[]).await?;
        let items = result.as_array()?;

        let mut hotspots = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match Hotspot::try_from(item) {
                Ok(hotspot) => hotspots.push(hotspot),
                // An undecodable record is left out rather than guessed at
                Err(e) => warn!("Skipping hotspot #{} in registry: {}", index, e),
            }
        }
        debug!("Registry returned {} hotspots", hotspots.len());
        Ok(hotspots)
    }

    async fn update_location(&self, id: u64, location: Location) -> Result<TxOutcome> {
        let (code, lng) = if location.lng < 0.0 {
            (
                scripts::UPDATE_HOTSPOT_LOCATION_SIGNED,
                Argument::Fix64(location.lng),
            )
        } else {
            (scripts::UPDATE_HOTSPOT_LOCATION, Argument::UFix64(location.lng))
        };

        self.send_admin_transaction(
            "update-location",
            code,
            vec![Argument::UInt64(id), Argument::UFix64(location.lat), lng],
        )
        .await
    }

    async fn update_status(&self, id: u64, online: bool) -> Result<TxOutcome> {
        self.send_admin_transaction(
            "update-status",
            scripts::UPDATE_HOTSPOT_STATUS,
            vec![Argument::UInt64(id), Argument::Bool(online)],
        )
        .await
    }
}

/// Access API addresses are 16 hex chars without a prefix
fn rest_address(address: &str) -> String {
    format!("{:0>16}", address.trim_start_matches("0x"))
}

fn same_public_key(a: &str, b: &str) -> bool {
    a.trim_start_matches("0x")
        .eq_ignore_ascii_case(b.trim_start_matches("0x"))
}
