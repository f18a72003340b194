//! Joint-Feldman distributed key generation among the roster.
//!
//! Every node deals a random polynomial of degree `threshold - 1`, publishes
//! commitments to its coefficients and hands node `j` the evaluation at `j + 1`.
//! A node's key share is the sum of the evaluations it received; the form key is
//! the sum of the constant-term commitments. No node ever learns the form's
//! secret key.

use crate::NodeError;
use curve25519_dalek::scalar::Scalar;
use dvoting::*;
use rand::{CryptoRng, RngCore};
use std::collections::BTreeMap;

/// One dealer's contribution
#[derive(Debug, Clone)]
pub struct Deal {
    pub dealer: usize,

    /// `commitments[k] = a_k·G`
    pub commitments: Vec<Point>,

    /// `shares[j] = f(j + 1)`, for node `j` only
    pub shares: Vec<Scalar>,
}

/// A node taking part in the key generation
pub struct DkgParticipant {
    index: usize,
    roster_len: usize,
    threshold: usize,
    coefficients: Vec<Scalar>,
    received: BTreeMap<usize, (Vec<Point>, Scalar)>,
}

impl DkgParticipant {
    pub fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        index: usize,
        roster_len: usize,
        threshold: usize,
    ) -> Result<Self, NodeError> {
        if threshold == 0 || threshold > roster_len || index >= roster_len {
            return Err(NodeError::Dkg(format!(
                "node {} cannot take part in a {}-of-{} key generation",
                index, threshold, roster_len
            )));
        }

        Ok(DkgParticipant {
            index,
            roster_len,
            threshold,
            coefficients: (0..threshold).map(|_| Scalar::random(rng)).collect(),
            received: BTreeMap::new(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Commitments and shares for every node, this one included
    pub fn deal(&self) -> Deal {
        Deal {
            dealer: self.index,
            commitments: self.coefficients.iter().map(Point::mul_base).collect(),
            shares: (0..self.roster_len)
                .map(|j| evaluate(&self.coefficients, j))
                .collect(),
        }
    }

    /// Check the share a dealer sent us against its public commitments
    pub fn receive(&mut self, deal: &Deal) -> Result<(), NodeError> {
        if deal.commitments.len() != self.threshold {
            return Err(NodeError::InvalidDeal(deal.dealer));
        }
        let share = *deal
            .shares
            .get(self.index)
            .ok_or(NodeError::InvalidDeal(deal.dealer))?;

        if Point::mul_base(&share) != commitment_at(&deal.commitments, self.index) {
            return Err(NodeError::InvalidDeal(deal.dealer));
        }

        self.received
            .insert(deal.dealer, (deal.commitments.clone(), share));
        Ok(())
    }

    /// Combine the received shares once every node has dealt
    pub fn finish(self) -> Result<DkgShare, NodeError> {
        if self.received.len() != self.roster_len {
            return Err(NodeError::Dkg(format!(
                "received {} of {} deals",
                self.received.len(),
                self.roster_len
            )));
        }

        let secret: Scalar = self.received.values().map(|(_, s)| s).sum();
        let public_key = Point(
            self.received
                .values()
                .map(|(commitments, _)| commitments[0].0)
                .sum(),
        );

        log::debug!("dkg: node {} holds its key share", self.index);

        Ok(DkgShare {
            index: self.index,
            threshold: self.threshold,
            secret,
            public_key,
        })
    }
}

/// f(j + 1) for coefficients `a_0..a_{t-1}`
fn evaluate(coefficients: &[Scalar], j: usize) -> Scalar {
    let x = Scalar::from(j as u64 + 1);
    coefficients
        .iter()
        .rev()
        .fold(Scalar::zero(), |acc, a| acc * x + a)
}

/// Σ_k C_k·(j + 1)^k
fn commitment_at(commitments: &[Point], j: usize) -> Point {
    let x = Scalar::from(j as u64 + 1);
    Point(
        commitments
            .iter()
            .rev()
            .fold(Point::identity().0, |acc, c| acc * x + c.0),
    )
}

/// A node's share of a form's key
pub struct DkgShare {
    pub index: usize,
    pub threshold: usize,
    secret: Scalar,
    public_key: Point,
}

impl DkgShare {
    /// The form's public key
    pub fn public_key(&self) -> Point {
        self.public_key
    }

    /// The public counterpart of this node's share
    pub fn public_share(&self) -> Point {
        Point::mul_base(&self.secret)
    }

    /// Encrypt an encoded ballot under the form's key
    pub fn encrypt<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        encoded: &[u8],
        chunks: usize,
    ) -> Result<Ciphervote, NodeError> {
        Ok(Ciphervote::encrypt(rng, &self.public_key, encoded, chunks)?)
    }

    /// This node's partial decryption of one pair
    pub fn decrypt(&self, pair: &EgPair) -> Point {
        Point(self.secret * pair.k.0)
    }

    /// Partial decryptions of every chunk of every ballot
    pub fn compute_pubshares(&self, ballots: &[Ciphervote]) -> Vec<Vec<Point>> {
        ballots
            .iter()
            .map(|ballot| ballot.pairs().iter().map(|p| self.decrypt(p)).collect())
            .collect()
    }
}

/// Run the whole key generation in-process, as the roster would over the network
pub fn run_dkg<R: RngCore + CryptoRng>(
    rng: &mut R,
    roster_len: usize,
) -> Result<Vec<DkgShare>, NodeError> {
    let threshold = shuffle_threshold(roster_len);

    let mut participants = (0..roster_len)
        .map(|i| DkgParticipant::new(rng, i, roster_len, threshold))
        .collect::<Result<Vec<_>, _>>()?;

    let deals: Vec<Deal> = participants.iter().map(DkgParticipant::deal).collect();
    for participant in participants.iter_mut() {
        for deal in &deals {
            participant.receive(deal)?;
        }
    }

    participants
        .into_iter()
        .map(DkgParticipant::finish)
        .collect()
}
