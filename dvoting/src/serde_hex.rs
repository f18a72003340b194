use crate::*;
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::PublicKey;
use ed25519_dalek::Signature;
use std::borrow::Cow;
use std::convert::TryFrom;

pub use hex_buffer_serde::Hex;

// a single-purpose type for use in `#[serde(with)]`
pub enum EdPublicKeyHex {}

impl Hex<PublicKey> for EdPublicKeyHex {
    type Error = String;

    fn create_bytes(public_key: &PublicKey) -> Cow<[u8]> {
        public_key.as_ref().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<PublicKey, String> {
        PublicKey::from_bytes(bytes).map_err(|e| format!("{}", e))
    }
}

// a single-purpose type for use in `#[serde(with)]`
pub enum EdSignatureHex {}

impl Hex<Signature> for EdSignatureHex {
    type Error = String;

    fn create_bytes(sig: &Signature) -> Cow<[u8]> {
        let bytes = sig.to_bytes().to_vec();
        Cow::from(bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Signature, String> {
        Signature::try_from(bytes).map_err(|e| format!("{}", e))
    }
}

// a single-purpose type for use in `#[serde(with)]`
pub enum ScalarHex {}

impl Hex<Scalar> for ScalarHex {
    type Error = Error;

    fn create_bytes(scalar: &Scalar) -> Cow<[u8]> {
        scalar.as_bytes()[..].into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Scalar, Error> {
        let bytes = <[u8; 32]>::try_from(bytes).map_err(|_| Error::InvalidScalar)?;
        Scalar::from_canonical_bytes(bytes).ok_or(Error::InvalidScalar)
    }
}

/// A list of scalars as one hex string, 32 bytes per scalar
pub enum ScalarsHex {}

impl Hex<Vec<Scalar>> for ScalarsHex {
    type Error = Error;

    fn create_bytes(scalars: &Vec<Scalar>) -> Cow<[u8]> {
        let bytes: Vec<u8> = scalars.iter().flat_map(|s| s.to_bytes().to_vec()).collect();
        Cow::from(bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Vec<Scalar>, Error> {
        if bytes.len() % 32 != 0 {
            return Err(Error::InvalidScalar);
        }
        bytes
            .chunks(32)
            .map(<ScalarHex as Hex<Scalar>>::from_bytes)
            .collect()
    }
}

// Points and node keys serialize through these everywhere they appear
pub enum PointHex {}

impl Hex<Point> for PointHex {
    type Error = Error;

    fn create_bytes(point: &Point) -> Cow<[u8]> {
        point.to_bytes().to_vec().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Point, Error> {
        Point::from_bytes(bytes)
    }
}

pub enum NodePublicKeyHex {}

impl Hex<NodePublicKey> for NodePublicKeyHex {
    type Error = Error;

    fn create_bytes(key: &NodePublicKey) -> Cow<[u8]> {
        key.to_bytes().to_vec().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<NodePublicKey, Error> {
        NodePublicKey::from_bytes(bytes)
    }
}

pub enum NodeSignatureHex {}

impl Hex<NodeSignature> for NodeSignatureHex {
    type Error = Error;

    fn create_bytes(sig: &NodeSignature) -> Cow<[u8]> {
        sig.to_bytes().to_vec().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<NodeSignature, Error> {
        NodeSignature::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Scalars {
        #[serde(with = "ScalarHex")]
        one: Scalar,
        #[serde(with = "ScalarsHex")]
        many: Vec<Scalar>,
    }

    #[test]
    fn scalars_are_canonical_hex() {
        let value = Scalars {
            one: Scalar::from(7u64),
            many: vec![Scalar::from(1u64), Scalar::from(2u64)],
        };
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["one"].as_str().unwrap().len(), 64);
        assert_eq!(json["many"].as_str().unwrap().len(), 128);

        let back: Scalars = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);

        // Above the group order
        let high = format!("\"{}\"", "ff".repeat(32));
        let json = format!(r#"{{"one": {}, "many": ""}}"#, high);
        assert!(serde_json::from_str::<Scalars>(&json).is_err());

        // Not a whole number of scalars
        let json = format!(r#"{{"one": "{}", "many": "{}"}}"#, "00".repeat(32), "00".repeat(33));
        assert!(serde_json::from_str::<Scalars>(&json).is_err());
    }

    #[test]
    fn points_refuse_small_order() {
        // The order-2 point (0, -1)
        let mut torsion = [0u8; 32];
        torsion[0] = 0xec;
        for b in torsion.iter_mut().take(31).skip(1) {
            *b = 0xff;
        }
        torsion[31] = 0x7f;
        let json = format!("\"{}\"", hex::encode(torsion));
        assert!(serde_json::from_str::<Point>(&json).is_err());
    }
}
