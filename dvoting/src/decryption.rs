use crate::*;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;

/// Lagrange coefficients at zero for shares held by roster `indexes`.
///
/// Node `i` holds the evaluation of the key polynomial at `x = i + 1`.
pub fn lagrange_coefficients(indexes: &[usize]) -> Vec<Scalar> {
    let xs: Vec<Scalar> = indexes.iter().map(|i| Scalar::from(*i as u64 + 1)).collect();

    xs.iter()
        .enumerate()
        .map(|(i, xi)| {
            let mut num = Scalar::one();
            let mut den = Scalar::one();
            for (j, xj) in xs.iter().enumerate() {
                if i != j {
                    num *= xj;
                    den *= xj - xi;
                }
            }
            num * den.invert()
        })
        .collect()
}

/// Recover the plaintext ballots from the last shuffle and the submitted shares.
///
/// A ballot that fails to decode is replaced by the empty ballot.
pub fn combine_pubshares(
    ballots: &[Ciphervote],
    units: &PubsharesUnits,
    configuration: &Configuration,
    ballot_size: usize,
) -> Result<Vec<Ballot>, Error> {
    let lambdas = lagrange_coefficients(&units.indexes);

    let mut decrypted = Vec::with_capacity(ballots.len());
    for (b, ballot) in ballots.iter().enumerate() {
        let mut encoded = Vec::with_capacity(ballot_size);
        let mut valid = true;

        for (c, pair) in ballot.pairs().iter().enumerate() {
            let mut shared = EdwardsPoint::identity();
            for (lambda, shares) in lambdas.iter().zip(&units.pubshares) {
                let share = shares
                    .get(b)
                    .and_then(|s| s.get(c))
                    .ok_or_else(|| Error::PubsharesShape(format!("no share for chunk {}/{}", b, c)))?;
                shared += lambda * share.0;
            }

            match extract(&Point(pair.c.0 - shared)) {
                Ok(bytes) => encoded.extend(bytes),
                Err(_) => valid = false,
            }
        }

        if valid {
            decrypted.push(Ballot::parse_or_tombstone(&encoded, configuration, ballot_size));
        } else {
            log::debug!("ballot {} has a chunk with no embedded data", b);
            decrypted.push(Ballot::default());
        }
    }

    Ok(decrypted)
}

pub(crate) fn register_pubshares(ctx: &mut Context, tx: RegisterPubShares) -> Result<(), Error> {
    let mut form = ctx.load_form(&tx.form_id)?;
    form.require_status(FormStatus::ShuffledBallots)?;

    let node = form.roster.get(tx.index).ok_or(Error::IndexOutOfRange {
        index: tx.index,
        roster_len: form.roster.len(),
    })?;
    if node.public_key != tx.public_key {
        return Err(Error::NotRosterMember(tx.public_key.to_string()));
    }

    tx.public_key.verify(&tx.fingerprint(), &tx.signature)?;

    let ballots = form.final_ballots()?;
    let chunks = form.chunks_per_ballot();
    if tx.pubshares.len() != ballots.len() {
        return Err(Error::PubsharesShape(format!(
            "expected shares for {} ballots, found {}",
            ballots.len(),
            tx.pubshares.len()
        )));
    }
    if let Some(bad) = tx.pubshares.iter().find(|s| s.len() != chunks) {
        return Err(Error::PubsharesShape(format!(
            "expected {} shares per ballot, found {}",
            chunks,
            bad.len()
        )));
    }

    let units = &mut form.pubshares_units;
    if units.pub_keys.contains(&tx.public_key) {
        return Err(Error::DuplicatePubsharesKey(tx.public_key.to_string()));
    }
    if units.indexes.contains(&tx.index) {
        return Err(Error::DuplicatePubsharesIndex(tx.index));
    }

    units.pubshares.push(tx.pubshares);
    units.pub_keys.push(tx.public_key);
    units.indexes.push(tx.index);

    log::debug!(
        "form {}: {} of {} pubshares submitted",
        form.form_id,
        form.pubshares_units.len(),
        form.shuffle_threshold
    );

    if form.pubshares_units.len() == form.shuffle_threshold {
        form.status = FormStatus::PubSharesSubmitted;
    }

    ctx.save_form(&form)
}

pub(crate) fn combine_shares(ctx: &mut Context, tx: FormAction) -> Result<(), Error> {
    let mut form = ctx.load_form(&tx.form_id)?;
    require_form_admin(ctx.snapshot(), &form, &tx.user_id)?;
    form.require_status(FormStatus::PubSharesSubmitted)?;

    let units = &form.pubshares_units;
    if units.len() != form.shuffle_threshold {
        return Err(Error::NotEnoughShares {
            expected: form.shuffle_threshold,
            found: units.len(),
        });
    }
    if let Some(&index) = units.indexes.iter().find(|&&i| i >= form.roster.len()) {
        return Err(Error::IndexOutOfRange {
            index,
            roster_len: form.roster.len(),
        });
    }

    let ballots = combine_pubshares(
        form.final_ballots()?,
        units,
        &form.configuration,
        form.ballot_size,
    )?;

    let tombstones = ballots.iter().filter(|b| b.is_tombstone()).count();
    if tombstones > 0 {
        log::debug!("form {}: {} ballots could not be decoded", form.form_id, tombstones);
    }

    form.decrypted_ballots = ballots;
    form.status = FormStatus::ResultAvailable;

    ctx.save_form(&form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lagrange_recovers_the_secret() {
        let mut rng = rand::rngs::OsRng {};

        // f(x) = a0 + a1·x + a2·x²
        let coeffs: Vec<Scalar> = (0..3).map(|_| Scalar::random(&mut rng)).collect();
        let eval = |x: u64| {
            let x = Scalar::from(x);
            coeffs[0] + coeffs[1] * x + coeffs[2] * x * x
        };

        for indexes in &[vec![0, 1, 2], vec![4, 1, 3], vec![2, 0, 5]] {
            let lambdas = lagrange_coefficients(indexes);
            let secret: Scalar = indexes
                .iter()
                .zip(&lambdas)
                .map(|(i, l)| eval(*i as u64 + 1) * l)
                .sum();
            assert_eq!(secret, coeffs[0]);
        }
    }

    #[test]
    fn combine_tombstones_undecodable_ballots() {
        let mut rng = rand::rngs::OsRng {};
        let secret = Scalar::random(&mut rng);
        let pk = Point::mul_base(&secret);

        let configuration = Configuration {
            main_title: "t".into(),
            scaffold: vec![Subject {
                id: "c3Viag==".into(),
                selects: vec![Select {
                    id: "cTE=".into(),
                    title: "q".into(),
                    max_n: 1,
                    min_n: 1,
                    choices: vec!["a".into(), "b".into()],
                }],
                ..Default::default()
            }],
        };
        let size = configuration.max_ballot_size();
        let chunks = configuration.chunks_per_ballot();

        let ballots = vec![
            Ciphervote::encrypt(&mut rng, &pk, b"select:cTE=:true,false\n\n", chunks).unwrap(),
            Ciphervote::encrypt(&mut rng, &pk, b"select:cTE=:true,true\n\n", chunks).unwrap(),
        ];

        // A single share holder at index 0 with the full key
        let units = PubsharesUnits {
            pubshares: vec![ballots
                .iter()
                .map(|b| b.pairs().iter().map(|p| Point(secret * p.k.0)).collect())
                .collect()],
            pub_keys: vec![],
            indexes: vec![0],
        };

        // With a single share at x=1 the coefficient is 1
        let decrypted = combine_pubshares(&ballots, &units, &configuration, size).unwrap();
        assert_eq!(decrypted.len(), 2);
        assert_eq!(decrypted[0].select("cTE="), Some(&[true, false][..]));
        assert!(decrypted[1].is_tombstone());
    }
}
