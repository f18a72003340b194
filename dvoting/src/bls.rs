//! BLS signatures (min-pk, BLS12-381) used by nodes to sign their contributions.

use crate::*;
use blst::min_pk;
use blst::BLST_ERROR;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// A node's public key
#[derive(Clone, Copy, Debug)]
pub struct NodePublicKey(min_pk::PublicKey);

/// A node's signature over a fingerprint
#[derive(Clone, Copy, Debug)]
pub struct NodeSignature(min_pk::Signature);

/// A node's signing key
pub struct NodeSigner {
    secret: min_pk::SecretKey,
    public: NodePublicKey,
}

impl NodeSigner {
    /// Derive a signing key from at least 32 bytes of key material
    pub fn from_ikm(ikm: &[u8]) -> Result<Self, Error> {
        let secret = min_pk::SecretKey::key_gen(ikm, &[]).map_err(|_| Error::InvalidNodeKey)?;
        let public = NodePublicKey(secret.sk_to_pk());
        Ok(NodeSigner { secret, public })
    }

    /// Generate a fresh signing key
    pub fn generate() -> Result<Self, Error> {
        let mut ikm = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng {}, &mut ikm);
        NodeSigner::from_ikm(&ikm)
    }

    pub fn public_key(&self) -> NodePublicKey {
        self.public
    }

    pub fn sign(&self, msg: &[u8]) -> NodeSignature {
        NodeSignature(self.secret.sign(msg, DST, &[]))
    }
}

impl NodePublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        min_pk::PublicKey::key_validate(bytes)
            .map(NodePublicKey)
            .map_err(|_| Error::InvalidNodeKey)
    }

    pub fn to_bytes(&self) -> [u8; 48] {
        self.0.compress()
    }

    /// Verify a signature over `msg`
    pub fn verify(&self, msg: &[u8], signature: &NodeSignature) -> Result<(), Error> {
        let res = signature.0.verify(true, msg, DST, &[], &self.0, true);
        if matches!(res, BLST_ERROR::BLST_SUCCESS) {
            Ok(())
        } else {
            Err(Error::SignatureVerificationFailed)
        }
    }
}

impl NodeSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        min_pk::Signature::from_bytes(bytes)
            .map(NodeSignature)
            .map_err(|_| Error::InvalidNodeSignature)
    }

    pub fn to_bytes(&self) -> [u8; 96] {
        self.0.compress()
    }
}

impl PartialEq for NodePublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes()[..] == other.to_bytes()[..]
    }
}

impl Eq for NodePublicKey {}

impl PartialEq for NodeSignature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes()[..] == other.to_bytes()[..]
    }
}

impl Eq for NodeSignature {}

impl std::fmt::Display for NodePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.to_bytes()[..]))
    }
}

impl Serialize for NodePublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NodePublicKeyHex::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for NodePublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        NodePublicKeyHex::deserialize(deserializer)
    }
}

impl Serialize for NodeSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NodeSignatureHex::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for NodeSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        NodeSignatureHex::deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let signer = NodeSigner::from_ikm(&[7u8; 32]).unwrap();
        let other = NodeSigner::from_ikm(&[8u8; 32]).unwrap();

        let sig = signer.sign(b"fingerprint");
        signer.public_key().verify(b"fingerprint", &sig).unwrap();

        assert!(signer.public_key().verify(b"other", &sig).is_err());
        assert!(other.public_key().verify(b"fingerprint", &sig).is_err());

        // Key derivation is deterministic
        let again = NodeSigner::from_ikm(&[7u8; 32]).unwrap();
        assert_eq!(again.public_key(), signer.public_key());

        assert!(NodeSigner::from_ikm(&[1u8; 16]).is_err());
    }

    #[test]
    fn hex_serde() {
        let signer = NodeSigner::generate().unwrap();
        let sig = signer.sign(b"msg");

        let key_json = serde_json::to_string(&signer.public_key()).unwrap();
        let sig_json = serde_json::to_string(&sig).unwrap();
        assert_eq!(key_json.len(), 96 + 2);
        assert_eq!(sig_json.len(), 192 + 2);

        let key: NodePublicKey = serde_json::from_str(&key_json).unwrap();
        let sig: NodeSignature = serde_json::from_str(&sig_json).unwrap();
        key.verify(b"msg", &sig).unwrap();

        assert!(serde_json::from_str::<NodePublicKey>("\"abcd\"").is_err());
    }
}
