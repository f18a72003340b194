use crate::{NodeError, Service, TxEvent};
use dvoting::*;
use ed25519_dalek::PublicKey;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 1024;

/// A single-replica ledger keeping its state in memory.
///
/// Transactions wait in the pool until a block is committed. With auto-commit
/// every added transaction is committed right away in a block of its own.
pub struct MemLedger {
    contract: Contract,
    state: Mutex<LedgerState>,
    events: broadcast::Sender<TxEvent>,
    auto_commit: bool,
}

#[derive(Default)]
struct LedgerState {
    snapshot: MemSnapshot,
    pool: Vec<LedgerTransaction>,
    nonces: HashMap<[u8; 32], u64>,
    height: u64,
}

impl MemLedger {
    pub fn new(contract: Contract) -> Self {
        MemLedger::build(contract, true)
    }

    /// A ledger that only commits on `commit_block`
    pub fn manual(contract: Contract) -> Self {
        MemLedger::build(contract, false)
    }

    fn build(contract: Contract, auto_commit: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        MemLedger {
            contract,
            state: Mutex::new(LedgerState::default()),
            events,
            auto_commit,
        }
    }

    fn lock(&self) -> Result<MutexGuard<LedgerState>, NodeError> {
        self.state.lock().map_err(|_| NodeError::Poisoned)
    }

    /// Write directly to the state, outside of any transaction
    pub fn update_state<F>(&self, f: F) -> Result<(), NodeError>
    where
        F: FnOnce(&mut dyn Snapshot) -> Result<(), Error>,
    {
        let mut state = self.lock()?;
        Ok(f(&mut state.snapshot)?)
    }

    /// Publish the roster nodes read when forms are created
    pub fn store_roster(&self, roster: &Roster) -> Result<(), NodeError> {
        self.update_state(|s| roster.store(s))
    }

    /// Publish the result of a form's key generation
    pub fn publish_dkg_key(&self, form_id: &str, public_key: &Point) -> Result<(), NodeError> {
        self.update_state(|s| publish_dkg_public_key(s, form_id, public_key))
    }

    /// A copy of the current state
    pub fn snapshot(&self) -> Result<MemSnapshot, NodeError> {
        Ok(self.lock()?.snapshot.clone())
    }

    pub fn height(&self) -> Result<u64, NodeError> {
        Ok(self.lock()?.height)
    }

    pub fn pending(&self) -> Result<usize, NodeError> {
        Ok(self.lock()?.pool.len())
    }

    /// Run every pooled transaction, in order, as one block
    pub fn commit_block(&self) -> Result<Vec<TxEvent>, NodeError> {
        let mut state = self.lock()?;
        let state = &mut *state;

        let pool = std::mem::take(&mut state.pool);
        let mut accepted: Vec<LedgerTransaction> = vec![];
        let mut events = Vec::with_capacity(pool.len());

        for tx in pool {
            let id = tx.id()?;

            let result = match tx.verify_signature() {
                Ok(()) => {
                    let step = Step {
                        previous: accepted.clone(),
                        current: tx,
                    };
                    let result = self.contract.execute(&mut state.snapshot, &step);
                    if result.is_ok() {
                        accepted.push(step.current);
                    }
                    result.map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            };

            events.push(TxEvent { id, result });
        }

        state.height += 1;
        log::debug!(
            "block {}: {} of {} transactions accepted",
            state.height,
            accepted.len(),
            events.len()
        );

        for event in &events {
            // No subscriber is not an error
            let _ = self.events.send(event.clone());
        }

        Ok(events)
    }
}

impl Service for MemLedger {
    fn add(&self, tx: LedgerTransaction) -> Result<TxId, NodeError> {
        let id = tx.id()?;
        self.lock()?.pool.push(tx);

        if self.auto_commit {
            self.commit_block()?;
        }
        Ok(id)
    }

    fn watch(&self) -> broadcast::Receiver<TxEvent> {
        self.events.subscribe()
    }

    fn form(&self, form_id: &str) -> Result<Form, NodeError> {
        Ok(Form::load(&self.lock()?.snapshot, form_id)?)
    }

    fn nonce(&self, identity: &PublicKey) -> Result<u64, NodeError> {
        let mut state = self.lock()?;
        let next = state.nonces.entry(identity.to_bytes()).or_insert(0);
        *next += 1;
        Ok(*next)
    }
}
