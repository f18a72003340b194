//! Actors submitting a node's contributions to a form.
//!
//! Each actor builds its transaction from the current form, submits it and waits
//! for the ledger to include it. A rejected or lost transaction is rebuilt from
//! the new state and submitted again, a bounded number of times. Dropping the
//! future cancels the actor between attempts; the ledger only ever sees whole
//! transactions.

use crate::*;
use dvoting::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Inclusion budget and retry bound shared by the actors
#[derive(Debug, Clone, Copy)]
pub struct ActorOptions {
    pub inclusion_timeout: Duration,
    pub max_retries: usize,
}

impl Default for ActorOptions {
    fn default() -> Self {
        ActorOptions {
            inclusion_timeout: Duration::from_millis(DEFAULT_INCLUSION_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl From<&Config> for ActorOptions {
    fn from(config: &Config) -> Self {
        ActorOptions {
            inclusion_timeout: config.inclusion_timeout,
            max_retries: config.max_retries,
        }
    }
}

/// Sign a form transaction with the node's ledger key, submit it and wait for its outcome
pub async fn submit_and_wait<S: Service + ?Sized>(
    service: &S,
    keys: &NodeKeys,
    tx: &FormTransaction,
    timeout: Duration,
) -> Result<TxId, NodeError> {
    let nonce = service.nonce(&keys.client_public())?;
    let ledger_tx = LedgerTransaction::form(&keys.client, nonce, tx)?;

    // Subscribe first so that the event cannot be missed
    let mut events = service.watch();
    let id = service.add(ledger_tx)?;

    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if event.id == id => {
                    return match event.result {
                        Ok(()) => Ok(id),
                        Err(reason) => Err(NodeError::Rejected { id, reason }),
                    }
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    log::warn!("missed {} ledger events while waiting for {}", n, id);
                    continue;
                }
                Err(RecvError::Closed) => return Err(NodeError::EventsClosed),
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(NodeError::Timeout(id)),
    }
}

/// Contributes this node's shuffle of a closed form
pub struct ShuffleActor<S: Service> {
    service: Arc<S>,
    keys: Arc<NodeKeys>,
    options: ActorOptions,
}

impl<S: Service> ShuffleActor<S> {
    pub fn new(service: Arc<S>, keys: Arc<NodeKeys>, options: ActorOptions) -> Self {
        ShuffleActor {
            service,
            keys,
            options,
        }
    }

    /// Returns once this node's shuffle is on the ledger or the form no longer needs one
    pub async fn shuffle(&self, form_id: &str) -> Result<(), NodeError> {
        let public_key = self.keys.signer.public_key();

        for attempt in 1..=self.options.max_retries {
            let form = self.service.form(form_id)?;
            match pending_task(&form, &public_key) {
                Some(Task::Shuffle) => {}
                _ if form.roster.contains(&public_key) => return Ok(()),
                _ => return Err(NodeError::NotInRoster),
            }

            // Proving is CPU bound
            let keys = self.keys.clone();
            let tx = tokio::task::spawn_blocking(move || {
                let mut rng = rand::rngs::OsRng {};
                shuffle_transaction(&mut rng, &form, &keys.signer)
            })
            .await??;

            match submit_and_wait(&*self.service, &self.keys, &tx, self.options.inclusion_timeout)
                .await
            {
                Ok(id) => {
                    log::info!("form {}: shuffle {} included", form_id, id);
                    return Ok(());
                }
                Err(e @ NodeError::Rejected { .. }) | Err(e @ NodeError::Timeout(_)) => {
                    log::warn!("form {}: shuffle attempt {} failed: {}", form_id, attempt, e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(NodeError::RetriesExhausted(self.options.max_retries))
    }
}

/// Publishes this node's decryption shares of a shuffled form
pub struct PubsharesActor<S: Service> {
    service: Arc<S>,
    keys: Arc<NodeKeys>,
    share: Arc<DkgShare>,
    options: ActorOptions,
}

impl<S: Service> PubsharesActor<S> {
    pub fn new(
        service: Arc<S>,
        keys: Arc<NodeKeys>,
        share: Arc<DkgShare>,
        options: ActorOptions,
    ) -> Self {
        PubsharesActor {
            service,
            keys,
            share,
            options,
        }
    }

    pub async fn compute_pubshares(&self, form_id: &str) -> Result<(), NodeError> {
        let public_key = self.keys.signer.public_key();

        for attempt in 1..=self.options.max_retries {
            let form = self.service.form(form_id)?;
            match pending_task(&form, &public_key) {
                Some(Task::ComputePubshares) => {}
                _ if form.roster.contains(&public_key) => return Ok(()),
                _ => return Err(NodeError::NotInRoster),
            }

            let keys = self.keys.clone();
            let share = self.share.clone();
            let tx = tokio::task::spawn_blocking(move || {
                pubshares_transaction(&form, &share, &keys.signer)
            })
            .await??;

            match submit_and_wait(&*self.service, &self.keys, &tx, self.options.inclusion_timeout)
                .await
            {
                Ok(id) => {
                    log::info!("form {}: pubshares {} included", form_id, id);
                    return Ok(());
                }
                Err(e @ NodeError::Rejected { .. }) | Err(e @ NodeError::Timeout(_)) => {
                    log::warn!(
                        "form {}: pubshares attempt {} failed: {}",
                        form_id,
                        attempt,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(NodeError::RetriesExhausted(self.options.max_retries))
    }
}
