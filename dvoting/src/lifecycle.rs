use crate::*;

pub(crate) fn create_form(ctx: &mut Context, tx: CreateForm) -> Result<(), Error> {
    tx.configuration.validate()?;

    // The form ID is derived from the creating transaction
    let tx_id = ctx.step().current_id()?;
    let form_id = hex::encode(sha256(&tx_id.0));

    let roster = Roster::load(ctx.snapshot())?;
    let form = Form::new(form_id, tx.configuration, roster, tx.admin_id)?;

    let mut metadata = FormsMetadata::load(ctx.snapshot())?;
    metadata.add(&form.form_id)?;
    metadata.store(ctx.snapshot_mut())?;

    log::debug!(
        "form {} created with {} chunks per ballot and a shuffle threshold of {}",
        form.form_id,
        form.chunks_per_ballot(),
        form.shuffle_threshold
    );

    ctx.save_form(&form)
}

pub(crate) fn open_form(ctx: &mut Context, tx: OpenForm) -> Result<(), Error> {
    let mut form = ctx.load_form(&tx.form_id)?;
    form.require_not_terminal()?;
    form.require_status(FormStatus::Initial)?;

    // The DKG must have published the key before the form opens
    let pubkey = load_dkg_public_key(ctx.snapshot(), &form.form_id)?
        .ok_or_else(|| Error::MissingDkgKey(form.form_id.clone()))?;

    form.pubkey = Some(pubkey);
    form.status = FormStatus::Open;

    ctx.save_form(&form)
}

pub(crate) fn close_form(ctx: &mut Context, tx: FormAction) -> Result<(), Error> {
    let mut form = ctx.load_form(&tx.form_id)?;
    form.require_not_terminal()?;
    require_form_admin(ctx.snapshot(), &form, &tx.user_id)?;
    form.require_status(FormStatus::Open)?;

    if form.ballot_count < 2 {
        return Err(Error::NotEnoughBallots(form.ballot_count));
    }

    form.status = FormStatus::Closed;

    ctx.save_form(&form)
}

pub(crate) fn cancel_form(ctx: &mut Context, tx: FormAction) -> Result<(), Error> {
    let mut form = ctx.load_form(&tx.form_id)?;
    require_form_admin(ctx.snapshot(), &form, &tx.user_id)?;
    form.require_not_terminal()?;

    form.status = FormStatus::Canceled;

    ctx.save_form(&form)
}

/// Remove the form, its DKG key and its metadata entry
pub(crate) fn delete_form(ctx: &mut Context, tx: FormAction) -> Result<(), Error> {
    let form = ctx.load_form(&tx.form_id)?;
    require_form_admin(ctx.snapshot(), &form, &tx.user_id)?;

    let key = decode_form_id(&form.form_id)?;
    ctx.snapshot_mut().delete(&key)?;
    ctx.snapshot_mut()
        .delete(&dkg_public_key_key(&form.form_id))?;

    let mut metadata = FormsMetadata::load(ctx.snapshot())?;
    metadata.remove(&form.form_id);
    metadata.store(ctx.snapshot_mut())?;

    ctx.form_deleted(&form.form_id);
    Ok(())
}
