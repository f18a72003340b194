//! Verifiable re-encryption shuffle of ElGamal pairs.
//!
//! The proof is a commitment-consistent proof of a shuffle in the style of
//! Terelius and Wikström, made non-interactive with a SHA-512 transcript under
//! the "PairShuffle" domain. Sequences of pairs (one sequence per ballot) are
//! shuffled as a whole: every chunk of a ballot follows the same permutation,
//! and the proof runs on the combination of the chunks weighted by a public
//! random vector.

use crate::*;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use digest::Digest;
use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};
use sha2::Sha512;

/// Domain separation for generators and challenges
pub const SHUFFLE_DOMAIN: &[u8] = b"PairShuffle";

/// Non-interactive proof that a list of pairs is a re-encrypted permutation of another
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ShuffleProof {
    /// Commitment to the permutation
    pub commitments: Vec<Point>,

    /// Commitment chain binding the challenges to the permutation
    pub chain: Vec<Point>,

    pub t1: Point,
    pub t2: Point,
    pub t3: Point,
    pub t4_k: Point,
    pub t4_c: Point,
    pub t_hat: Vec<Point>,

    #[serde(with = "ScalarHex")]
    pub s1: Scalar,
    #[serde(with = "ScalarHex")]
    pub s2: Scalar,
    #[serde(with = "ScalarHex")]
    pub s3: Scalar,
    #[serde(with = "ScalarHex")]
    pub s4: Scalar,
    #[serde(with = "ScalarsHex")]
    pub s_hat: Vec<Scalar>,
    #[serde(with = "ScalarsHex")]
    pub s_prime: Vec<Scalar>,
}

/// The secret output of a shuffle of ballots: only the shuffler knows it
pub struct SequenceShuffle {
    /// Output `i` is input `permutation[i]` re-encrypted
    pub outputs: Vec<Ciphervote>,
    pub permutation: Vec<usize>,

    /// `rerandomizers[i][j]` was added to chunk `j` of output `i`
    pub rerandomizers: Vec<Vec<Scalar>>,
}

/// Shuffle and re-encrypt a list of ciphervotes under `public_key`
pub fn shuffle_sequences<R: RngCore + CryptoRng>(
    rng: &mut R,
    public_key: &Point,
    inputs: &[Ciphervote],
) -> Result<SequenceShuffle, Error> {
    let chunks = check_sequences(inputs, None)?;

    let mut permutation: Vec<usize> = (0..inputs.len()).collect();
    permutation.shuffle(rng);

    let mut outputs = Vec::with_capacity(inputs.len());
    let mut rerandomizers = Vec::with_capacity(inputs.len());

    for &source in &permutation {
        let rhos: Vec<Scalar> = (0..chunks).map(|_| Scalar::random(rng)).collect();
        let pairs = inputs[source]
            .pairs()
            .iter()
            .zip(&rhos)
            .map(|(pair, rho)| reencrypt(public_key, pair, rho))
            .collect();

        outputs.push(Ciphervote(pairs));
        rerandomizers.push(rhos);
    }

    Ok(SequenceShuffle {
        outputs,
        permutation,
        rerandomizers,
    })
}

impl SequenceShuffle {
    /// Prove the shuffle, combining chunks with the random vector `e`
    pub fn prove<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        public_key: &Point,
        inputs: &[Ciphervote],
        e: &[Scalar],
    ) -> Result<ShuffleProof, Error> {
        check_sequences(inputs, Some(e.len()))?;
        check_sequences(&self.outputs, Some(e.len()))?;

        let combined_inputs = combine(inputs, e);
        let combined_outputs = combine(&self.outputs, e);
        let combined_rhos: Vec<Scalar> = self
            .rerandomizers
            .iter()
            .map(|rhos| rhos.iter().zip(e).map(|(rho, e)| rho * e).sum())
            .collect();

        Ok(prove_pairs(
            rng,
            public_key,
            &combined_inputs,
            &combined_outputs,
            &self.permutation,
            &combined_rhos,
        ))
    }
}

/// Verify a shuffle of ciphervotes against its proof and random vector
pub fn verify_sequences(
    public_key: &Point,
    inputs: &[Ciphervote],
    outputs: &[Ciphervote],
    e: &[Scalar],
    proof: &ShuffleProof,
) -> Result<(), Error> {
    check_sequences(inputs, Some(e.len()))?;
    check_sequences(outputs, Some(e.len()))?;
    if inputs.len() != outputs.len() {
        return Err(Error::ShuffleShape(format!(
            "{} inputs but {} outputs",
            inputs.len(),
            outputs.len()
        )));
    }

    verify_pairs(
        public_key,
        &combine(inputs, e),
        &combine(outputs, e),
        proof,
    )
}

fn check_sequences(sequences: &[Ciphervote], chunks: Option<usize>) -> Result<usize, Error> {
    let first = sequences
        .first()
        .ok_or_else(|| Error::ShuffleShape("nothing to shuffle".to_owned()))?;
    let chunks = chunks.unwrap_or_else(|| first.len());

    if chunks == 0 {
        return Err(Error::ShuffleShape("ballots have no chunks".to_owned()));
    }
    if let Some(bad) = sequences.iter().find(|s| s.len() != chunks) {
        return Err(Error::ShuffleShape(format!(
            "ballot has {} chunks, expected {}",
            bad.len(),
            chunks
        )));
    }
    Ok(chunks)
}

fn reencrypt(public_key: &Point, pair: &EgPair, rho: &Scalar) -> EgPair {
    EgPair {
        k: Point(pair.k.0 + Point::mul_base(rho).0),
        c: Point(pair.c.0 + rho * public_key.0),
    }
}

/// Collapse each sequence into one pair: `Σ e_j · pair_j`
fn combine(sequences: &[Ciphervote], e: &[Scalar]) -> Vec<EgPair> {
    sequences
        .iter()
        .map(|seq| {
            let mut k = EdwardsPoint::identity();
            let mut c = EdwardsPoint::identity();
            for (pair, e) in seq.pairs().iter().zip(e) {
                k += e * pair.k.0;
                c += e * pair.c.0;
            }
            EgPair {
                k: Point(k),
                c: Point(c),
            }
        })
        .collect()
}

/// Pedersen generators `H` and `H_1..H_n`, nobody knows their discrete logarithms
fn generators(n: usize) -> (EdwardsPoint, Vec<EdwardsPoint>) {
    let mut seed = SHUFFLE_DOMAIN.to_vec();
    seed.extend_from_slice(&(n as u64).to_be_bytes());
    let mut stream = semi_random_stream(&seed);

    let h = pick_generator(&mut stream);
    let hs = (0..n).map(|_| pick_generator(&mut stream)).collect();
    (h, hs)
}

struct Transcript(Sha512);

impl Transcript {
    fn new(public_key: &Point, inputs: &[EgPair], outputs: &[EgPair]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(SHUFFLE_DOMAIN);
        hasher.update(public_key.to_bytes());
        for pair in inputs.iter().chain(outputs) {
            hasher.update(pair.k.to_bytes());
            hasher.update(pair.c.to_bytes());
        }
        Transcript(hasher)
    }

    fn append(&mut self, points: &[Point]) {
        for p in points {
            self.0.update(p.to_bytes());
        }
    }

    /// The per-position challenges `u_1..u_n`
    fn challenges(&self, n: usize) -> Vec<Scalar> {
        (0..n)
            .map(|i| {
                let mut h = self.0.clone();
                h.update(b"u");
                h.update((i as u64).to_be_bytes());
                Scalar::from_hash(h)
            })
            .collect()
    }

    fn challenge(&self) -> Scalar {
        let mut h = self.0.clone();
        h.update(b"c");
        Scalar::from_hash(h)
    }
}

fn prove_pairs<R: RngCore + CryptoRng>(
    rng: &mut R,
    public_key: &Point,
    inputs: &[EgPair],
    outputs: &[EgPair],
    permutation: &[usize],
    rhos: &[Scalar],
) -> ShuffleProof {
    let n = inputs.len();
    let g = Point::base().0;
    let pk = public_key.0;
    let (h, hs) = generators(n);

    // Commit to the permutation: column permutation[i] holds H_i
    let r: Vec<Scalar> = (0..n).map(|_| Scalar::random(rng)).collect();
    let mut commitments = vec![Point::identity(); n];
    for (i, &j) in permutation.iter().enumerate() {
        commitments[j] = Point(r[j] * g + hs[i]);
    }

    let mut transcript = Transcript::new(public_key, inputs, outputs);
    transcript.append(&commitments);
    let u = transcript.challenges(n);
    let u_prime: Vec<Scalar> = permutation.iter().map(|&j| u[j]).collect();

    // Commitment chain
    let r_hat: Vec<Scalar> = (0..n).map(|_| Scalar::random(rng)).collect();
    let mut chain = Vec::with_capacity(n);
    let mut previous = h;
    for i in 0..n {
        let next = r_hat[i] * g + u_prime[i] * previous;
        chain.push(Point(next));
        previous = next;
    }

    // v_i = Π_{j>i} u'_j
    let mut v = vec![Scalar::one(); n];
    for i in (0..n.saturating_sub(1)).rev() {
        v[i] = u_prime[i + 1] * v[i + 1];
    }

    let r_bar: Scalar = r.iter().sum();
    let r_hat_sum: Scalar = r_hat.iter().zip(&v).map(|(a, b)| a * b).sum();
    let r_tilde: Scalar = r.iter().zip(&u).map(|(a, b)| a * b).sum();
    let r_prime: Scalar = rhos.iter().zip(&u_prime).map(|(a, b)| a * b).sum();

    let w1 = Scalar::random(rng);
    let w2 = Scalar::random(rng);
    let w3 = Scalar::random(rng);
    let w4 = Scalar::random(rng);
    let w_hat: Vec<Scalar> = (0..n).map(|_| Scalar::random(rng)).collect();
    let w_prime: Vec<Scalar> = (0..n).map(|_| Scalar::random(rng)).collect();

    let t1 = w1 * g;
    let t2 = w2 * g;
    let mut t3 = w3 * g;
    let mut t4_k = -(w4 * g);
    let mut t4_c = -(w4 * pk);
    for i in 0..n {
        t3 += w_prime[i] * hs[i];
        t4_k += w_prime[i] * outputs[i].k.0;
        t4_c += w_prime[i] * outputs[i].c.0;
    }

    let mut t_hat = Vec::with_capacity(n);
    let mut previous = h;
    for i in 0..n {
        t_hat.push(Point(w_hat[i] * g + w_prime[i] * previous));
        previous = chain[i].0;
    }

    let (t1, t2, t3, t4_k, t4_c) = (Point(t1), Point(t2), Point(t3), Point(t4_k), Point(t4_c));

    transcript.append(&chain);
    transcript.append(&[t1, t2, t3, t4_k, t4_c]);
    transcript.append(&t_hat);
    let c = transcript.challenge();

    ShuffleProof {
        commitments,
        chain,
        t1,
        t2,
        t3,
        t4_k,
        t4_c,
        t_hat,
        s1: w1 + c * r_bar,
        s2: w2 + c * r_hat_sum,
        s3: w3 + c * r_tilde,
        s4: w4 + c * r_prime,
        s_hat: (0..n).map(|i| w_hat[i] + c * r_hat[i]).collect(),
        s_prime: (0..n).map(|i| w_prime[i] + c * u_prime[i]).collect(),
    }
}

fn verify_pairs(
    public_key: &Point,
    inputs: &[EgPair],
    outputs: &[EgPair],
    proof: &ShuffleProof,
) -> Result<(), Error> {
    let n = inputs.len();
    if n == 0
        || outputs.len() != n
        || proof.commitments.len() != n
        || proof.chain.len() != n
        || proof.t_hat.len() != n
        || proof.s_hat.len() != n
        || proof.s_prime.len() != n
    {
        return Err(Error::ShuffleVerificationFailed);
    }

    let g = Point::base().0;
    let pk = public_key.0;
    let (h, hs) = generators(n);

    let mut transcript = Transcript::new(public_key, inputs, outputs);
    transcript.append(&proof.commitments);
    let u = transcript.challenges(n);

    transcript.append(&proof.chain);
    transcript.append(&[proof.t1, proof.t2, proof.t3, proof.t4_k, proof.t4_c]);
    transcript.append(&proof.t_hat);
    let c = transcript.challenge();

    let u_product: Scalar = u.iter().product();

    let mut c_bar = EdwardsPoint::identity();
    let mut c_tilde = EdwardsPoint::identity();
    let mut k_tilde = EdwardsPoint::identity();
    let mut cc_tilde = EdwardsPoint::identity();
    for j in 0..n {
        c_bar += proof.commitments[j].0 - hs[j];
        c_tilde += u[j] * proof.commitments[j].0;
        k_tilde += u[j] * inputs[j].k.0;
        cc_tilde += u[j] * inputs[j].c.0;
    }
    let c_hat = proof.chain[n - 1].0 - u_product * h;

    let t1 = s_mul(&c, &c_bar, &proof.s1, &g);
    let t2 = s_mul(&c, &c_hat, &proof.s2, &g);

    let mut t3 = s_mul(&c, &c_tilde, &proof.s3, &g);
    let mut t4_k = -(c * k_tilde) - proof.s4 * g;
    let mut t4_c = -(c * cc_tilde) - proof.s4 * pk;
    for i in 0..n {
        t3 += proof.s_prime[i] * hs[i];
        t4_k += proof.s_prime[i] * outputs[i].k.0;
        t4_c += proof.s_prime[i] * outputs[i].c.0;
    }

    let mut previous = h;
    for i in 0..n {
        let expected = s_mul(&c, &proof.chain[i].0, &proof.s_hat[i], &g)
            + proof.s_prime[i] * previous;
        if expected != proof.t_hat[i].0 {
            return Err(Error::ShuffleVerificationFailed);
        }
        previous = proof.chain[i].0;
    }

    if t1 != proof.t1.0
        || t2 != proof.t2.0
        || t3 != proof.t3.0
        || t4_k != proof.t4_k.0
        || t4_c != proof.t4_c.0
    {
        return Err(Error::ShuffleVerificationFailed);
    }

    Ok(())
}

/// `s·base - c·y`
fn s_mul(c: &Scalar, y: &EdwardsPoint, s: &Scalar, base: &EdwardsPoint) -> EdwardsPoint {
    s * base - c * y
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ballots(rng: &mut rand::rngs::OsRng, pk: &Point, n: usize, chunks: usize) -> Vec<Ciphervote> {
        (0..n)
            .map(|i| {
                let data = format!("ballot {}", i).into_bytes();
                Ciphervote::encrypt(rng, pk, &data, chunks).unwrap()
            })
            .collect()
    }

    #[test]
    fn shuffle_and_verify() {
        let mut rng = rand::rngs::OsRng {};
        let secret = Scalar::random(&mut rng);
        let pk = Point::mul_base(&secret);

        let inputs = ballots(&mut rng, &pk, 5, 2);
        let e: Vec<Scalar> = (0..2).map(|_| Scalar::random(&mut rng)).collect();

        let shuffle = shuffle_sequences(&mut rng, &pk, &inputs).unwrap();
        let proof = shuffle.prove(&mut rng, &pk, &inputs, &e).unwrap();

        verify_sequences(&pk, &inputs, &shuffle.outputs, &e, &proof).unwrap();

        // The outputs decrypt to the same ballots, permuted
        let mut before: Vec<Vec<u8>> = inputs
            .iter()
            .map(|v| decrypt_ciphervote(&secret, v).unwrap())
            .collect();
        let mut after: Vec<Vec<u8>> = shuffle
            .outputs
            .iter()
            .map(|v| decrypt_ciphervote(&secret, v).unwrap())
            .collect();
        assert_ne!(shuffle.outputs, inputs);
        before.sort();
        after.sort();
        assert_eq!(before, after);

        // Serialized proofs still verify
        let json = serde_json::to_string(&proof).unwrap();
        let decoded: ShuffleProof = serde_json::from_str(&json).unwrap();
        verify_sequences(&pk, &inputs, &shuffle.outputs, &e, &decoded).unwrap();
    }

    #[test]
    fn tampering_is_detected() {
        let mut rng = rand::rngs::OsRng {};
        let pk = Point::mul_base(&Scalar::random(&mut rng));

        let inputs = ballots(&mut rng, &pk, 3, 1);
        let e = vec![Scalar::random(&mut rng)];

        let shuffle = shuffle_sequences(&mut rng, &pk, &inputs).unwrap();
        let proof = shuffle.prove(&mut rng, &pk, &inputs, &e).unwrap();

        // Replacing an output
        let mut outputs = shuffle.outputs.clone();
        outputs[0] = inputs[0].clone();
        assert!(verify_sequences(&pk, &inputs, &outputs, &e, &proof).is_err());

        // A different random vector
        let other_e = vec![Scalar::random(&mut rng)];
        assert!(verify_sequences(&pk, &inputs, &shuffle.outputs, &other_e, &proof).is_err());

        // A different public key
        let other_pk = Point::mul_base(&Scalar::random(&mut rng));
        assert!(verify_sequences(&other_pk, &inputs, &shuffle.outputs, &e, &proof).is_err());

        // A modified response
        let mut bad = proof.clone();
        bad.s1 += Scalar::one();
        assert!(verify_sequences(&pk, &inputs, &shuffle.outputs, &e, &bad).is_err());

        // A truncated proof
        let mut bad = proof;
        bad.s_hat.pop();
        assert!(verify_sequences(&pk, &inputs, &shuffle.outputs, &e, &bad).is_err());
    }

    #[test]
    fn shapes_are_checked() {
        let mut rng = rand::rngs::OsRng {};
        let pk = Point::mul_base(&Scalar::random(&mut rng));

        assert!(shuffle_sequences(&mut rng, &pk, &[]).is_err());

        let mut inputs = ballots(&mut rng, &pk, 3, 2);
        inputs[1].0.pop();
        assert!(shuffle_sequences(&mut rng, &pk, &inputs).is_err());
    }
}
