use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub flow: FlowConfig,
    pub admin: AdminConfig,
    pub jobs: JobsConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Which chain deployment to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Emulator,
}

impl Network {
    pub fn default_access_node(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://rest-mainnet.onflow.org",
            Network::Testnet => "https://rest-testnet.onflow.org",
            Network::Emulator => "http://localhost:8888",
        }
    }

    /// Contract aliases known for each deployment. Entries in
    /// `[flow.contracts]` are layered on top.
    pub fn contract_presets(&self) -> BTreeMap<String, String> {
        let pairs: &[(&str, &str)] = match self {
            Network::Mainnet => &[
                ("HybridCustody", "0xd8a7e05a7ac670c0"),
                ("MetadataViews", "0x1d7e57aa55817448"),
                ("ViewResolver", "0x1d7e57aa55817448"),
                ("NonFungibleToken", "0x1d7e57aa55817448"),
                ("CapabilityFactory", "0xd8a7e05a7ac670c0"),
                ("CapabilityFilter", "0xd8a7e05a7ac670c0"),
                ("CapabilityDelegator", "0xd8a7e05a7ac670c0"),
            ],
            Network::Testnet => &[
                ("HotspotOperatorNFT", "0xcc6a3536f37381a2"),
                ("HotspotRegistry", "0xcc6a3536f37381a2"),
                ("UptimeProof", "0xcc6a3536f37381a2"),
                ("FIVEGCOIN", "0xcc6a3536f37381a2"),
                ("RandomPicker", "0xcc6a3536f37381a2"),
                ("HybridCustody", "0x294e44e1ec6993c6"),
                ("MetadataViews", "0x631e88ae7f1d7c20"),
                ("ViewResolver", "0x631e88ae7f1d7c20"),
                ("NonFungibleToken", "0x631e88ae7f1d7c20"),
                ("CapabilityFactory", "0x294e44e1ec6993c6"),
                ("CapabilityFilter", "0x294e44e1ec6993c6"),
                ("CapabilityDelegator", "0x294e44e1ec6993c6"),
            ],
            Network::Emulator => &[
                ("HotspotOperatorNFT", "0xf8d6e0586b0a20c7"),
                ("HotspotRegistry", "0xf8d6e0586b0a20c7"),
                ("UptimeProof", "0xf8d6e0586b0a20c7"),
                ("FIVEGCOIN", "0xf8d6e0586b0a20c7"),
                ("RandomPicker", "0xf8d6e0586b0a20c7"),
                ("HybridCustody", "0xf8d6e0586b0a20c7"),
                ("MetadataViews", "0xf8d6e0586b0a20c7"),
                ("ViewResolver", "0xf8d6e0586b0a20c7"),
                ("NonFungibleToken", "0xf8d6e0586b0a20c7"),
                ("CapabilityFactory", "0xf8d6e0586b0a20c7"),
                ("CapabilityFilter", "0xf8d6e0586b0a20c7"),
                ("CapabilityDelegator", "0xf8d6e0586b0a20c7"),
            ],
        };
        pairs
            .iter()
            .map(|(name, addr)| (name.to_string(), addr.to_string()))
            .collect()
    }
}

impl std::str::FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "emulator" | "local" => Ok(Network::Emulator),
            other => Err(anyhow::anyhow!("Unknown network: {}", other)),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Emulator => write!(f, "emulator"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub network: Network,
    /// Access API base URL; the network's public node when unset
    pub access_node: Option<String>,
    pub gas_limit: u64,
    #[serde(with = "humantime_serde")]
    pub seal_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub contracts: BTreeMap<String, String>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            access_node: None,
            gas_limit: 9999,
            seal_timeout: Duration::from_secs(120),
            request_timeout: Duration::from_secs(30),
            contracts: BTreeMap::new(),
        }
    }
}

impl FlowConfig {
    pub fn access_node(&self) -> &str {
        self.access_node
            .as_deref()
            .unwrap_or_else(|| self.network.default_access_node())
    }

    /// Network presets overlaid with the explicitly configured aliases
    pub fn contract_aliases(&self) -> BTreeMap<String, String> {
        let mut aliases = self.network.contract_presets();
        aliases.extend(self.contracts.clone());
        aliases
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub address: String,
    /// Number of signing keys registered on the admin account
    pub key_count: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            key_count: 500,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub location: LocationJobConfig,
    pub status: StatusJobConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationJobConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Map western longitudes onto [180, 360) for unsigned contract fields.
    /// Turning this off needs a registry that accepts a signed `Fix64` lng.
    pub normalize_longitude: bool,
}

impl Default for LocationJobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(10 * 60),
            normalize_longitude: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusJobConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Probability that a hotspot is reported online on a given pass
    pub online_ratio: f64,
}

impl Default for StatusJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(15 * 60),
            online_ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8001".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the environment variables the dashboard deployment already sets
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars<F>(&mut self, var: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = var("FLOW_NETWORK") {
            self.flow.network = network.parse()?;
        }
        if let Some(url) = var("ACCESS_NODE_API") {
            self.flow.access_node = Some(url);
        }
        if let Some(address) = var("ADMIN_ADDRESS") {
            self.admin.address = address;
        }
        if let Some(port) = var("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT {:?}: {}", port, e))?;
            self.http.bind = format!("0.0.0.0:{}", port);
        }
        self.validate()
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.admin.key_count == 0 {
            anyhow::bail!("admin.key_count must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.jobs.status.online_ratio) {
            anyhow::bail!(
                "jobs.status.online_ratio must be within [0, 1], got {}",
                self.jobs.status.online_ratio
            );
        }
        Ok(())
    }
}

/// Secrets for the admin signer, read from the environment only
#[derive(Clone)]
pub struct AdminSecrets {
    pub encrypted_private_key: String,
    pub passphrase: String,
}

impl fmt::Debug for AdminSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSecrets").finish_non_exhaustive()
    }
}

impl AdminSecrets {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            encrypted_private_key: required_env("ADMIN_ENCRYPTED_PRIVATE_KEY")?,
            passphrase: required_env("SECRET_PASSPHRASE")?,
        })
    }
}

pub fn required_env(name: &str) -> anyhow::Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => anyhow::bail!("environment variable {} is not set", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.flow.network, Network::Testnet);
        assert_eq!(config.flow.access_node(), "https://rest-testnet.onflow.org");
        assert_eq!(config.admin.key_count, 500);
        assert_eq!(config.jobs.location.interval, Duration::from_secs(600));
        assert!(config.jobs.location.normalize_longitude);
        assert_eq!(config.http.bind, "0.0.0.0:8001");
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            [flow]
            network = "emulator"
            seal_timeout = "45s"

            [flow.contracts]
            HotspotRegistry = "0x01cf0e2f2f715450"

            [admin]
            address = "0xf8d6e0586b0a20c7"
            key_count = 16

            [jobs.location]
            interval = "2m"
            normalize_longitude = false

            [jobs.status]
            enabled = true
            online_ratio = 0.5

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.flow.network, Network::Emulator);
        assert_eq!(config.flow.access_node(), "http://localhost:8888");
        assert_eq!(config.flow.seal_timeout, Duration::from_secs(45));
        assert_eq!(config.admin.key_count, 16);
        assert_eq!(config.jobs.location.interval, Duration::from_secs(120));
        assert!(!config.jobs.location.normalize_longitude);
        assert!(config.jobs.status.enabled);
        assert_eq!(config.logging.level, "debug");

        let aliases = config.flow.contract_aliases();
        assert_eq!(aliases["HotspotRegistry"], "0x01cf0e2f2f715450");
        assert_eq!(aliases["MetadataViews"], "0xf8d6e0586b0a20c7");
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(include_str!("../config.example.toml")).unwrap();
        assert_eq!(config.admin.address, "0xcc6a3536f37381a2");
        assert!(!config.jobs.status.enabled);
    }

    #[test]
    fn test_zero_keys_rejected() {
        assert!(Config::parse("[admin]\nkey_count = 0").is_err());
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("FLOW_NETWORK", "mainnet"),
            ("ACCESS_NODE_API", "http://access.example:8070"),
            ("ADMIN_ADDRESS", "0x1234"),
            ("PORT", "9000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.flow.network, Network::Mainnet);
        assert_eq!(config.flow.access_node(), "http://access.example:8070");
        assert_eq!(config.admin.address, "0x1234");
        assert_eq!(config.http.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_bad_port_rejected() {
        let mut config = Config::default();
        assert!(config
            .apply_vars(|name| (name == "PORT").then(|| "eighty".to_string()))
            .is_err());
    }
}
