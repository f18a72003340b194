use crate::*;
use curve25519_dalek::scalar::Scalar;
use digest::Digest;
use sha2::Sha256;

/// The random vector a shuffle of `shuffled_ballots` must be proven with.
///
/// Derived from the form, the round and the shuffled ballots, so a mixer
/// cannot choose it after seeing its proof.
pub fn derive_random_vector(
    form_id: &str,
    round: usize,
    shuffled_ballots: &[Ciphervote],
    chunks_per_ballot: usize,
) -> Vec<Scalar> {
    let mut hasher = Sha256::new();
    hasher.update(form_id.as_bytes());
    hasher.update((round as u64).to_be_bytes());
    for ballot in shuffled_ballots {
        ballot.fingerprint(&mut hasher);
    }

    let mut stream = semi_random_stream(&hasher.finalize());
    (0..chunks_per_ballot)
        .map(|_| Scalar::random(&mut stream))
        .collect()
}

/// Shuffle the ballots of a closed form and build the signed contribution for `round`
pub fn make_shuffle<R: rand::RngCore + rand::CryptoRng>(
    rng: &mut R,
    form: &Form,
    round: usize,
    signer: &NodeSigner,
) -> Result<ShuffleBallots, Error> {
    let pubkey = form
        .pubkey
        .ok_or_else(|| Error::MissingDkgKey(form.form_id.clone()))?;
    let inputs = form.shuffle_inputs(round)?;
    if inputs.len() < 2 {
        return Err(Error::NotEnoughBallots(inputs.len()));
    }

    let shuffle = shuffle_sequences(rng, &pubkey, inputs)?;
    let e = derive_random_vector(
        &form.form_id,
        round,
        &shuffle.outputs,
        form.chunks_per_ballot(),
    );
    let proof = shuffle.prove(rng, &pubkey, inputs, &e)?;

    Ok(ShuffleBallots::new(
        form.form_id.clone(),
        round,
        shuffle.outputs,
        proof,
        e,
        signer,
    ))
}

/// True if a transaction earlier in the block already shuffled this round
fn shuffled_earlier_in_block(step: &Step, form_id: &str, round: usize) -> bool {
    step.previous
        .iter()
        .filter(|tx| tx.is_form_transaction())
        .filter_map(|tx| match tx.form_transaction() {
            Ok(FormTransaction::ShuffleBallots(shuffle)) => Some(shuffle),
            _ => None,
        })
        .any(|shuffle| shuffle.form_id == form_id && shuffle.round == round)
}

pub(crate) fn shuffle_ballots(ctx: &mut Context, tx: ShuffleBallots) -> Result<(), Error> {
    let mut form = ctx.load_form(&tx.form_id)?;
    form.require_status(FormStatus::Closed)?;

    if shuffled_earlier_in_block(ctx.step(), &tx.form_id, tx.round) {
        return Err(Error::DuplicateShuffle);
    }

    let round = form.shuffle_instances.len();
    if tx.round != round {
        return Err(Error::RoundMismatch {
            expected: round,
            found: tx.round,
        });
    }

    // One contribution per roster member
    if !form.roster.contains(&tx.public_key) {
        return Err(Error::NotRosterMember(tx.public_key.to_string()));
    }
    if form
        .shuffle_instances
        .iter()
        .any(|s| s.shuffler_public_key == tx.public_key)
    {
        return Err(Error::ShufflerAlreadyContributed(tx.public_key.to_string()));
    }

    tx.public_key.verify(&tx.fingerprint(), &tx.signature)?;

    let chunks = form.chunks_per_ballot();
    let expected = derive_random_vector(&form.form_id, round, &tx.shuffled_ballots, chunks);
    if tx.random_vector != expected {
        return Err(Error::RandomVectorMismatch);
    }

    let inputs = form.shuffle_inputs(round)?;
    if inputs.len() < 2 {
        return Err(Error::NotEnoughBallots(inputs.len()));
    }

    if tx.shuffled_ballots.len() != inputs.len() {
        return Err(Error::ShuffleShape(format!(
            "expected {} ballots, found {}",
            inputs.len(),
            tx.shuffled_ballots.len()
        )));
    }
    if let Some(bad) = tx.shuffled_ballots.iter().find(|b| b.len() != chunks) {
        return Err(Error::ShuffleShape(format!(
            "expected {} chunks per ballot, found {}",
            chunks,
            bad.len()
        )));
    }

    let pubkey = form
        .pubkey
        .ok_or_else(|| Error::MissingDkgKey(form.form_id.clone()))?;
    verify_sequences(
        &pubkey,
        inputs,
        &tx.shuffled_ballots,
        &tx.random_vector,
        &tx.proof,
    )
    .map_err(|_| Error::ShuffleVerificationFailed)?;

    form.shuffle_instances.push(ShuffleInstance {
        shuffled_ballots: tx.shuffled_ballots,
        shuffle_proof: tx.proof,
        shuffler_public_key: tx.public_key,
    });

    log::debug!(
        "form {}: shuffle round {} of {} accepted",
        form.form_id,
        round + 1,
        form.shuffle_threshold
    );

    if form.shuffle_instances.len() == form.shuffle_threshold {
        form.status = FormStatus::ShuffledBallots;
    }

    ctx.save_form(&form)
}
