use crate::*;

/// Record an encrypted ballot. A revote replaces the voter's previous ballot.
pub(crate) fn cast_vote(ctx: &mut Context, tx: CastVote) -> Result<(), Error> {
    let mut form = ctx.load_form(&tx.form_id)?;
    form.require_not_terminal()?;
    form.require_status(FormStatus::Open)?;

    let expected = form.chunks_per_ballot();
    if tx.ballot.len() != expected {
        return Err(Error::WrongChunkCount {
            expected,
            found: tx.ballot.len(),
        });
    }

    if !form.may_vote(&tx.user_id) {
        return Err(Error::NotVoter(tx.user_id));
    }

    if form.suffragia.cast_vote(&tx.user_id, tx.ballot) {
        form.ballot_count += 1;
    } else {
        log::debug!("user {} revoted in form {}", tx.user_id, form.form_id);
    }

    ctx.save_form(&form)
}
