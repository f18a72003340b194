use ed25519_dalek::Keypair;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use sha2::{Digest, Sha256};

/// Generate an ed25519 keypair for signing ledger transactions
pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let mut csprng = rand::rngs::OsRng {};
    let Keypair { public, secret } = Keypair::generate(&mut csprng);
    (secret, public)
}

/// SHA-256 of the given bytes
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Decode a hex form identifier into the 32 bytes used as its storage key
pub fn decode_form_id(form_id: &str) -> Result<[u8; 32], crate::Error> {
    let bytes = hex::decode(form_id)?;
    if bytes.len() != 32 {
        return Err(crate::Error::IdentifierBadLen);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}
