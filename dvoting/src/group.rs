//! Group arithmetic on the Ed25519 curve: points with hex serialization, data
//! embedding, ElGamal and deterministic "semi-random" streams.

use crate::*;
use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::{Identity, IsIdentity};
use rand::{CryptoRng, RngCore};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of bytes that can be embedded into a single point
pub const EMBED_LEN: usize = 29;

/// A point in the prime-order subgroup of Ed25519
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Point(pub EdwardsPoint);

impl Point {
    /// The standard base point
    pub fn base() -> Self {
        Point(&Scalar::one() * &ED25519_BASEPOINT_TABLE)
    }

    pub fn identity() -> Self {
        Point(EdwardsPoint::identity())
    }

    /// `scalar * G`
    pub fn mul_base(scalar: &Scalar) -> Self {
        Point(scalar * &ED25519_BASEPOINT_TABLE)
    }

    /// Decode a compressed point, refusing points outside the prime-order subgroup
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 32 {
            return Err(Error::InvalidPoint);
        }
        let point = CompressedEdwardsY::from_slice(bytes)
            .decompress()
            .ok_or(Error::InvalidPoint)?;

        if !point.is_torsion_free() {
            return Err(Error::InvalidPoint);
        }

        Ok(Point(point))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_identity()
    }
}

impl From<EdwardsPoint> for Point {
    fn from(point: EdwardsPoint) -> Self {
        Point(point)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PointHex::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PointHex::deserialize(deserializer)
    }
}

/// Embed up to `EMBED_LEN` bytes into a point.
///
/// The first byte of the encoding holds the data length, followed by the data.
/// The remaining bytes are random and re-drawn until the encoding is a point of
/// the prime-order subgroup.
pub fn embed<R: RngCore + CryptoRng>(rng: &mut R, data: &[u8]) -> Result<Point, Error> {
    if data.len() > EMBED_LEN {
        return Err(Error::EmbedTooLong(data.len()));
    }

    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        bytes[0] = data.len() as u8;
        bytes[1..1 + data.len()].copy_from_slice(data);

        if let Some(point) = CompressedEdwardsY(bytes).decompress() {
            // Non-canonical encodings would not survive a round-trip
            if point.is_torsion_free() && point.compress().to_bytes() == bytes {
                return Ok(Point(point));
            }
        }
    }
}

/// Recover the bytes embedded with `embed`
pub fn extract(point: &Point) -> Result<Vec<u8>, Error> {
    let bytes = point.to_bytes();
    let len = bytes[0] as usize;
    if len > EMBED_LEN {
        return Err(Error::EmbedTooLong(len));
    }
    Ok(bytes[1..1 + len].to_vec())
}

/// A deterministic random stream seeded from a hash of `seed`.
///
/// Every replica deriving values from the same seed gets the same values.
pub fn semi_random_stream(seed: &[u8]) -> ChaCha20Rng {
    ChaCha20Rng::from_seed(sha256(seed))
}

/// Pick a point of the prime-order subgroup with unknown discrete logarithm
pub fn pick_generator<R: RngCore>(rng: &mut R) -> EdwardsPoint {
    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);

        if let Some(point) = CompressedEdwardsY(bytes).decompress() {
            let point = point.mul_by_cofactor();
            if !point.is_identity() {
                return point;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn embed_and_extract() {
        let mut rng = rand::rngs::OsRng {};

        for len in 0..=EMBED_LEN {
            let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            let point = embed(&mut rng, &data).unwrap();
            assert_eq!(extract(&point).unwrap(), data);

            // The embedded point must decode as a valid group element
            let decoded = Point::from_bytes(&point.to_bytes()).unwrap();
            assert_eq!(decoded, point);
        }

        assert!(embed(&mut rng, &[0u8; 30]).is_err());
    }

    #[test]
    fn point_hex() {
        let point = Point::mul_base(&Scalar::from(42u64));
        let json = serde_json::to_string(&point).unwrap();
        let decoded: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(point, decoded);

        assert!(Point::from_bytes(&[1u8; 31]).is_err());
        assert!(serde_json::from_str::<Point>("\"zz\"").is_err());
    }

    #[test]
    fn semi_random_is_deterministic() {
        let mut a = semi_random_stream(b"seed");
        let mut b = semi_random_stream(b"seed");
        let mut c = semi_random_stream(b"other seed");

        let x = Scalar::random(&mut a);
        assert_eq!(x, Scalar::random(&mut b));
        assert_ne!(x, Scalar::random(&mut c));
    }

    #[test]
    fn generators_are_in_the_prime_order_subgroup() {
        let mut stream = semi_random_stream(b"generators");
        for _ in 0..8 {
            let g = pick_generator(&mut stream);
            assert!(g.is_torsion_free());
            assert!(!g.is_identity());
        }
    }
}
