use crate::*;
use curve25519_dalek::scalar::Scalar;
use digest::Digest;
use rand::{CryptoRng, RngCore};

/// An ElGamal ciphertext `(K, C) = (k·G, M + k·PK)`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EgPair {
    #[serde(rename = "K")]
    pub k: Point,
    #[serde(rename = "C")]
    pub c: Point,
}

impl EgPair {
    /// Encrypt a point under `public_key`
    pub fn encrypt<R: RngCore + CryptoRng>(rng: &mut R, public_key: &Point, message: &Point) -> Self {
        let r = Scalar::random(rng);
        EgPair {
            k: Point::mul_base(&r),
            c: Point(message.0 + r * public_key.0),
        }
    }

    /// Decrypt with the full secret key
    pub fn decrypt(&self, secret: &Scalar) -> Point {
        Point(self.c.0 - secret * self.k.0)
    }
}

/// An encrypted ballot: one ElGamal pair per chunk of the encoded ballot
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Ciphervote(pub Vec<EgPair>);

impl Ciphervote {
    /// Embed and encrypt an encoded ballot into exactly `chunks` pairs.
    ///
    /// Unused trailing chunks embed no data.
    pub fn encrypt<R: RngCore + CryptoRng>(
        rng: &mut R,
        public_key: &Point,
        encoded: &[u8],
        chunks: usize,
    ) -> Result<Self, Error> {
        if encoded.len() > chunks * EMBED_LEN {
            return Err(Error::BallotTooLarge {
                size: encoded.len(),
                max: chunks * EMBED_LEN,
            });
        }

        let mut pairs = Vec::with_capacity(chunks);
        for i in 0..chunks {
            let start = std::cmp::min(i * EMBED_LEN, encoded.len());
            let end = std::cmp::min(start + EMBED_LEN, encoded.len());

            let message = embed(rng, &encoded[start..end])?;
            pairs.push(EgPair::encrypt(rng, public_key, &message));
        }

        Ok(Ciphervote(pairs))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairs(&self) -> &[EgPair] {
        &self.0
    }

    /// Write K then C of every pair into the hasher
    pub fn fingerprint<D: Digest>(&self, hasher: &mut D) {
        for pair in &self.0 {
            hasher.update(pair.k.to_bytes());
            hasher.update(pair.c.to_bytes());
        }
    }

    /// Split into the K and C components
    pub fn split(&self) -> (Vec<Point>, Vec<Point>) {
        self.0.iter().map(|p| (p.k, p.c)).unzip()
    }
}

/// Decrypt every chunk with the full secret key and concatenate the embedded bytes
pub fn decrypt_ciphervote(secret: &Scalar, vote: &Ciphervote) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    for pair in vote.pairs() {
        out.extend(extract(&pair.decrypt(secret))?);
    }
    Ok(out)
}
