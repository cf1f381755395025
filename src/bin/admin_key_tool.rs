//! Admin Key Tool
//!
//! Encrypts the admin private key for `ADMIN_ENCRYPTED_PRIVATE_KEY`, or
//! checks that an encrypted key decrypts to a usable signing key. The
//! passphrase is read from `SECRET_PASSPHRASE` (a `.env` file works too).
//!
//! Usage:
//!   cargo run --bin admin-key-tool encrypt <private_key_hex>
//!   cargo run --bin admin-key-tool decrypt [encrypted]

use hotspot_keeper::config::required_env;
use hotspot_keeper::flow::signer::AdminSigner;
use hotspot_keeper::keys::crypto;
use std::env;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args: Vec<String> = env::args().collect();
    let passphrase = required_env("SECRET_PASSPHRASE")?;

    match args.get(1).map(String::as_str) {
        Some("encrypt") => {
            let private_key = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("usage: admin-key-tool encrypt <private_key_hex>"))?;

            // Refuse to encrypt something that is not a P-256 key
            let signer = AdminSigner::from_hex("0x0", private_key)?;
            let encrypted = crypto::encrypt(private_key.trim(), &passphrase)?;

            println!("🔐 Public key: {}", signer.public_key_hex());
            println!("ADMIN_ENCRYPTED_PRIVATE_KEY={}", encrypted);
        }
        Some("decrypt") => {
            let encrypted = match args.get(2) {
                Some(value) => value.clone(),
                None => required_env("ADMIN_ENCRYPTED_PRIVATE_KEY")?,
            };
            let address = env::var("ADMIN_ADDRESS").unwrap_or_else(|_| "0x0".to_string());

            let signer = AdminSigner::from_encrypted(&address, &encrypted, &passphrase)?;
            println!("✅ Key decrypts with the configured passphrase");
            println!("   Address:    {}", signer.address());
            println!("   Public key: {}", signer.public_key_hex());
        }
        _ => {
            eprintln!("usage: admin-key-tool <encrypt <private_key_hex> | decrypt [encrypted]>");
            std::process::exit(2);
        }
    }

    Ok(())
}
