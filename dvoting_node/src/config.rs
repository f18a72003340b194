use crate::NodeError;
use dvoting::NodeSigner;
use ed25519_dalek::{PublicKey, SecretKey};
use hkdf::Hkdf;
use sha2::Sha256;
use std::env::var;
use std::time::Duration;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:2000";
pub const DEFAULT_INCLUSION_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_MAX_RETRIES: usize = 10;

const BLS_INFO: &[u8] = b"dvoting_node_bls";
const CLIENT_INFO: &[u8] = b"dvoting_node_ed25519";

/// The keys of a node: a BLS key for its contributions and an ed25519 key for
/// the ledger envelope of the transactions it submits
pub struct NodeKeys {
    pub signer: NodeSigner,
    pub client: SecretKey,
}

impl NodeKeys {
    /// Derive both keys from a master secret of at least 32 bytes
    pub fn derive(master: &[u8]) -> Result<Self, NodeError> {
        if master.len() < 32 {
            return Err(NodeError::Config(format!(
                "node secret must be at least 32 bytes, got {}",
                master.len()
            )));
        }

        let signer = NodeSigner::from_ikm(&expand(master, BLS_INFO)?)?;
        let client = SecretKey::from_bytes(&expand(master, CLIENT_INFO)?)
            .map_err(|e| NodeError::Config(e.to_string()))?;

        Ok(NodeKeys { signer, client })
    }

    /// Fresh random keys
    pub fn generate() -> Result<Self, NodeError> {
        let mut master = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng {}, &mut master);
        NodeKeys::derive(&master)
    }

    pub fn client_public(&self) -> PublicKey {
        (&self.client).into()
    }
}

fn expand(master: &[u8], info: &[u8]) -> Result<[u8; 32], NodeError> {
    let mut okm = [0u8; 32];
    Hkdf::<Sha256>::new(None, master)
        .expand(info, &mut okm)
        .map_err(|_| NodeError::Config("key derivation failed".to_owned()))?;
    Ok(okm)
}

pub struct Config {
    pub keys: NodeKeys,
    pub address: String,
    pub inclusion_timeout: Duration,
    pub max_retries: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, NodeError> {
        Config::from_vars(|key| var(key).ok())
    }

    /// Build the configuration from a variable lookup
    pub fn from_vars<F: Fn(&str) -> Option<String>>(get: F) -> Result<Self, NodeError> {
        let keys = match get("DVOTING_NODE_SECRET") {
            Some(val) => {
                let bytes = hex::decode(val.trim()).map_err(|e| {
                    NodeError::Config(format!("DVOTING_NODE_SECRET is not hex: {}", e))
                })?;
                NodeKeys::derive(&bytes)?
            }
            None => {
                return Err(NodeError::Config(
                    "DVOTING_NODE_SECRET environment variable must be set".to_owned(),
                ))
            }
        };

        let address = get("DVOTING_NODE_ADDRESS").unwrap_or_else(|| DEFAULT_ADDRESS.to_owned());

        let inclusion_timeout = match get("DVOTING_INCLUSION_TIMEOUT_MS") {
            Some(val) => Duration::from_millis(parse_var("DVOTING_INCLUSION_TIMEOUT_MS", &val)?),
            None => Duration::from_millis(DEFAULT_INCLUSION_TIMEOUT_MS),
        };

        let max_retries = match get("DVOTING_MAX_RETRIES") {
            Some(val) => parse_var("DVOTING_MAX_RETRIES", &val)?,
            None => DEFAULT_MAX_RETRIES,
        };

        Ok(Config {
            keys,
            address,
            inclusion_timeout,
            max_retries,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, val: &str) -> Result<T, NodeError>
where
    T::Err: std::fmt::Display,
{
    val.trim()
        .parse()
        .map_err(|e| NodeError::Config(format!("{}: {}", name, e)))
}
