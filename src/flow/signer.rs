//! Admin transaction signing
//!
//! Transactions are RLP encoded, prefixed with the transaction domain tag,
//! hashed with SHA3-256 and signed with ECDSA P-256. The admin account acts
//! as proposer, payer and sole authorizer, so a single envelope signature
//! covers the whole transaction.

use super::cadence::with_hex_prefix;
use crate::keys::crypto;
use anyhow::{Context, Result};
use p256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};
use rlp::RlpStream;
use sha3::{Digest, Sha3_256};

/// `FLOW-V0.0-transaction` right-padded with zeros to 32 bytes
pub fn transaction_domain_tag() -> [u8; 32] {
    let mut tag = [0u8; 32];
    let text = b"FLOW-V0.0-transaction";
    tag[..text.len()].copy_from_slice(text);
    tag
}

/// Everything that goes into the signed payload
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub script: String,
    pub arguments: Vec<Vec<u8>>,
    pub reference_block_id: String,
    pub gas_limit: u64,
    pub proposer: String,
    pub key_index: u32,
    pub sequence_number: u64,
    pub payer: String,
    pub authorizers: Vec<String>,
}

impl UnsignedTransaction {
    fn append_payload(&self, stream: &mut RlpStream) -> Result<()> {
        stream.begin_list(9);
        stream.append(&self.script.as_bytes());
        stream.begin_list(self.arguments.len());
        for arg in &self.arguments {
            stream.append(&arg.as_slice());
        }
        stream.append(&decode_hex(&self.reference_block_id, 32)?.as_slice());
        stream.append(&self.gas_limit);
        stream.append(&decode_hex(&self.proposer, 8)?.as_slice());
        stream.append(&u64::from(self.key_index));
        stream.append(&self.sequence_number);
        stream.append(&decode_hex(&self.payer, 8)?.as_slice());
        stream.begin_list(self.authorizers.len());
        for authorizer in &self.authorizers {
            stream.append(&decode_hex(authorizer, 8)?.as_slice());
        }
        Ok(())
    }

    /// RLP of `[payload, payload_signatures]` with no payload signatures
    pub fn envelope_rlp(&self) -> Result<Vec<u8>> {
        let mut stream = RlpStream::new_list(2);
        self.append_payload(&mut stream)?;
        stream.begin_list(0);
        Ok(stream.out().to_vec())
    }

    /// Domain-tagged envelope message that the payer signs
    pub fn envelope_message(&self) -> Result<Vec<u8>> {
        let mut message = transaction_domain_tag().to_vec();
        message.extend(self.envelope_rlp()?);
        Ok(message)
    }
}

/// Left-pad a hex string to `width` bytes
fn decode_hex(value: &str, width: usize) -> Result<Vec<u8>> {
    let trimmed = value.trim_start_matches("0x");
    let padded = format!("{:0>width$}", trimmed, width = width * 2);
    let bytes = hex::decode(&padded).with_context(|| format!("invalid hex value {:?}", value))?;
    if bytes.len() != width {
        anyhow::bail!("hex value {:?} is longer than {} bytes", value, width);
    }
    Ok(bytes)
}

/// Signs transactions for the admin account
pub struct AdminSigner {
    address: String,
    key: SigningKey,
}

impl AdminSigner {
    /// Build from a hex encoded P-256 private scalar
    pub fn from_hex(address: &str, private_key_hex: &str) -> Result<Self> {
        let raw = decode_hex(private_key_hex.trim(), 32).context("invalid admin private key")?;
        let key = SigningKey::from_slice(&raw)
            .map_err(|e| anyhow::anyhow!("invalid admin private key: {}", e))?;
        Ok(Self {
            address: with_hex_prefix(address),
            key,
        })
    }

    /// Build from the passphrase-encrypted key the deployment stores
    pub fn from_encrypted(address: &str, encrypted: &str, passphrase: &str) -> Result<Self> {
        let private_key =
            crypto::decrypt(encrypted, passphrase).context("failed to decrypt admin key")?;
        Self::from_hex(address, &private_key)
    }

    #[cfg(test)]
    pub fn random(address: &str) -> Self {
        Self {
            address: with_hex_prefix(address),
            key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Uncompressed public key as 64 hex chars (x || y), as the chain stores it
    pub fn public_key_hex(&self) -> String {
        let point = self.key.verifying_key().to_encoded_point(false);
        hex::encode(&point.as_bytes()[1..])
    }

    /// Raw `r || s` signature over the transaction envelope
    pub fn sign_envelope(&self, tx: &UnsignedTransaction) -> Result<Vec<u8>> {
        let digest = Sha3_256::digest(tx.envelope_message()?);
        let signature: Signature = self
            .key
            .sign_prehash(&digest)
            .map_err(|e| anyhow::anyhow!("failed to sign transaction: {}", e))?;
        Ok(signature.to_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::hazmat::PrehashVerifier;

    const BLOCK_ID: &str = "7bc42fe85d32ca513769a74f97f7e1a7bad6c9407f0d934c2aa645ef9cf613c7";

    fn unsigned(sequence_number: u64) -> UnsignedTransaction {
        UnsignedTransaction {
            script: "transaction { prepare(acct: &Account) {} }".to_string(),
            arguments: vec![br#"{"type":"UInt64","value":"1"}"#.to_vec()],
            reference_block_id: BLOCK_ID.to_string(),
            gas_limit: 9999,
            proposer: "0xcc6a3536f37381a2".to_string(),
            key_index: 3,
            sequence_number,
            payer: "0xcc6a3536f37381a2".to_string(),
            authorizers: vec!["0xcc6a3536f37381a2".to_string()],
        }
    }

    #[test]
    fn test_domain_tag_is_padded() {
        let tag = transaction_domain_tag();
        assert_eq!(&tag[..21], b"FLOW-V0.0-transaction");
        assert!(tag[21..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_decode_hex_pads_short_addresses() {
        assert_eq!(decode_hex("0x01", 8).unwrap(), vec![0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(decode_hex("0x0102030405060708aa", 8).is_err());
        assert!(decode_hex("zz", 8).is_err());
    }

    #[test]
    fn test_envelope_is_an_rlp_list() {
        let rlp = unsigned(0).envelope_rlp().unwrap();
        // long-form list header
        assert!(rlp[0] >= 0xf8);
        assert_ne!(rlp, unsigned(1).envelope_rlp().unwrap());
    }

    #[test]
    fn test_bad_reference_block_is_rejected() {
        let mut tx = unsigned(0);
        tx.reference_block_id = "not-hex".to_string();
        assert!(tx.envelope_message().is_err());
    }

    #[test]
    fn test_signature_verifies() {
        let signer = AdminSigner::random("cc6a3536f37381a2");
        let tx = unsigned(5);
        let signature = signer.sign_envelope(&tx).unwrap();
        assert_eq!(signature.len(), 64);

        let digest = Sha3_256::digest(tx.envelope_message().unwrap());
        let parsed = Signature::from_slice(&signature).unwrap();
        signer
            .key
            .verifying_key()
            .verify_prehash(&digest, &parsed)
            .unwrap();
        assert_eq!(signer.address(), "0xcc6a3536f37381a2");
        assert_eq!(signer.public_key_hex().len(), 128);
    }

    #[test]
    fn test_from_encrypted_key() {
        let original = AdminSigner::random("0x01");
        let private_hex = hex::encode(original.key.to_bytes());
        let encrypted = crypto::encrypt(&private_hex, "passphrase").unwrap();

        let restored = AdminSigner::from_encrypted("0x01", &encrypted, "passphrase").unwrap();
        assert_eq!(restored.public_key_hex(), original.public_key_hex());
    }
}
