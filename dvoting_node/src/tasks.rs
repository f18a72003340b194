use crate::{DkgShare, NodeError};
use dvoting::*;
use rand::{CryptoRng, RngCore};

/// Work a node still owes a form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Shuffle,
    ComputePubshares,
}

/// What the node holding `node_key` should do next for `form`, if anything
pub fn pending_task(form: &Form, node_key: &NodePublicKey) -> Option<Task> {
    if !form.roster.contains(node_key) {
        return None;
    }

    match form.status {
        FormStatus::Closed => {
            let contributed = form
                .shuffle_instances
                .iter()
                .any(|s| &s.shuffler_public_key == node_key);
            if contributed {
                None
            } else {
                Some(Task::Shuffle)
            }
        }
        FormStatus::ShuffledBallots => {
            if form.pubshares_units.pub_keys.contains(node_key) {
                None
            } else {
                Some(Task::ComputePubshares)
            }
        }
        _ => None,
    }
}

/// Shuffle the latest ballots of a closed form for the next round
pub fn shuffle_transaction<R: RngCore + CryptoRng>(
    rng: &mut R,
    form: &Form,
    signer: &NodeSigner,
) -> Result<FormTransaction, NodeError> {
    let round = form.shuffle_instances.len();
    let shuffle = make_shuffle(rng, form, round, signer)?;

    log::debug!(
        "form {}: shuffled {} ballots for round {}",
        form.form_id,
        shuffle.shuffled_ballots.len(),
        round
    );

    Ok(FormTransaction::ShuffleBallots(shuffle))
}

/// Partially decrypt the final shuffle of a form with this node's key share
pub fn pubshares_transaction(
    form: &Form,
    share: &DkgShare,
    signer: &NodeSigner,
) -> Result<FormTransaction, NodeError> {
    let index = form
        .roster
        .index_of(&signer.public_key())
        .ok_or(NodeError::NotInRoster)?;
    if index != share.index {
        return Err(NodeError::Dkg(format!(
            "key share {} does not belong to roster position {}",
            share.index, index
        )));
    }

    let pubshares = share.compute_pubshares(form.final_ballots()?);

    Ok(FormTransaction::RegisterPubShares(RegisterPubShares::new(
        form.form_id.clone(),
        index,
        pubshares,
        signer,
    )))
}
