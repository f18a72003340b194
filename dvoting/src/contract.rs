use crate::*;
use std::sync::Arc;

/// What a command handler sees of one execution: the buffered state and the step
pub struct Context<'a> {
    snapshot: &'a mut dyn Snapshot,
    step: &'a Step,
    updates: Vec<(String, Option<FormGauges>)>,
}

impl<'a> Context<'a> {
    pub fn new(snapshot: &'a mut dyn Snapshot, step: &'a Step) -> Self {
        Context {
            snapshot,
            step,
            updates: vec![],
        }
    }

    pub fn snapshot(&self) -> &dyn Snapshot {
        &*self.snapshot
    }

    pub fn snapshot_mut(&mut self) -> &mut dyn Snapshot {
        &mut *self.snapshot
    }

    pub fn step(&self) -> &Step {
        self.step
    }

    pub fn load_form(&self, form_id: &str) -> Result<Form, Error> {
        Form::load(self.snapshot(), form_id)
    }

    /// Store the form and record its gauges for reporting once the step commits
    pub fn save_form(&mut self, form: &Form) -> Result<(), Error> {
        form.store(self.snapshot_mut())?;
        self.updates
            .push((form.form_id.clone(), Some(FormGauges::from(form))));
        Ok(())
    }

    pub fn form_deleted(&mut self, form_id: &str) {
        self.updates.push((form_id.to_owned(), None));
    }

    fn into_updates(self) -> Vec<(String, Option<FormGauges>)> {
        self.updates
    }
}

/// The form contract.
///
/// Executes one transaction at a time against a snapshot. A rejected
/// transaction leaves the snapshot untouched.
pub struct Contract {
    access: Box<dyn AccessControl + Send + Sync>,
    metrics: Arc<dyn Metrics + Send + Sync>,
}

impl Default for Contract {
    fn default() -> Self {
        Contract::new(Box::new(AllowAll), Arc::new(NoMetrics))
    }
}

impl Contract {
    pub fn new(
        access: Box<dyn AccessControl + Send + Sync>,
        metrics: Arc<dyn Metrics + Send + Sync>,
    ) -> Self {
        Contract { access, metrics }
    }

    /// Execute the current transaction of `step`
    pub fn execute(&self, snapshot: &mut dyn Snapshot, step: &Step) -> Result<(), ContractError> {
        let tx = &step.current;

        let result = self.run(snapshot, step);
        match &result {
            Ok(command) => log::info!(
                "transaction {} accepted: {}",
                tx.id().map(|id| id.to_string()).unwrap_or_default(),
                command
            ),
            Err(e) => log::warn!("transaction rejected: {}", e),
        }

        result.map(|_| ())
    }

    fn run(&self, snapshot: &mut dyn Snapshot, step: &Step) -> Result<Command, ContractError> {
        let tx = &step.current;

        self.access
            .check(&*snapshot, &Credential::form_contract(), &tx.identity)
            .map_err(|e| ContractError::new(None, e))?;

        let command = tx.command().map_err(|e| ContractError::new(None, e))?;
        let fail = |e: Error| ContractError::new(Some(command), e);

        let form_tx = tx.form_transaction().map_err(fail)?;

        // Handlers write to an overlay so that a failure leaves no partial state
        let (changes, updates) = {
            let mut overlay = Overlay::new(&*snapshot);
            let mut ctx = Context::new(&mut overlay, step);
            dispatch(&mut ctx, form_tx).map_err(fail)?;
            let updates = ctx.into_updates();
            (overlay.into_changes(), updates)
        };

        changes
            .apply(snapshot)
            .map_err(|e| fail(Error::Storage(e)))?;

        for (form_id, gauges) in updates {
            match gauges {
                Some(gauges) => self.metrics.form_updated(&form_id, gauges),
                None => self.metrics.form_deleted(&form_id),
            }
        }

        Ok(command)
    }
}

fn dispatch(ctx: &mut Context, tx: FormTransaction) -> Result<(), Error> {
    match tx {
        FormTransaction::CreateForm(tx) => crate::lifecycle::create_form(ctx, tx),
        FormTransaction::OpenForm(tx) => crate::lifecycle::open_form(ctx, tx),
        FormTransaction::CastVote(tx) => crate::vote::cast_vote(ctx, tx),
        FormTransaction::CloseForm(tx) => crate::lifecycle::close_form(ctx, tx),
        FormTransaction::ShuffleBallots(tx) => crate::mix::shuffle_ballots(ctx, tx),
        FormTransaction::RegisterPubShares(tx) => crate::decryption::register_pubshares(ctx, tx),
        FormTransaction::CombineShares(tx) => crate::decryption::combine_shares(ctx, tx),
        FormTransaction::CancelForm(tx) => crate::lifecycle::cancel_form(ctx, tx),
        FormTransaction::DeleteForm(tx) => crate::lifecycle::delete_form(ctx, tx),
        FormTransaction::AddAdmin(tx) => crate::acl::add_admin(ctx, tx),
        FormTransaction::RemoveAdmin(tx) => crate::acl::remove_admin(ctx, tx),
        FormTransaction::AddOwner(tx) => crate::acl::add_owner(ctx, tx),
        FormTransaction::RemoveOwner(tx) => crate::acl::remove_owner(ctx, tx),
        FormTransaction::AddVoter(tx) => crate::acl::add_voter(ctx, tx),
        FormTransaction::RemoveVoter(tx) => crate::acl::remove_voter(ctx, tx),
    }
}
